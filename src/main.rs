// pm_console - main.rs
// Loads configuration, initialises tracing and dispatches the CLI.

use clap::Parser;
use std::process::exit;
use tracing_subscriber::EnvFilter;

use pm_console::cli::{run, Cli};
use pm_console::config::load_config;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    if let Err(e) = run(cli, config).await {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}
