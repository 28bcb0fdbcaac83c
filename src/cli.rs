use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ConsoleConfig;
use crate::console::ConsoleState;
use crate::guard::{GuardDecision, RouteGuard};
use crate::navigation::{NavigationResolver, LOGIN_PATH};
use crate::role::Role;
use crate::route_table::{build_routes, RouteMode};
use crate::screens::ScreenRegistry;
use crate::session::{Identity, Session, SessionStore};
use crate::snapshot_store::MemorySnapshotStore;

/// Top-level CLI of the property-management console
#[derive(Parser)]
#[command(
    name = "pm_console",
    version,
    about = "Role-based access and route engine of the property-management console"
)]
pub struct Cli {
    /// Configuration file (defaults to ./pm_console.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Restore the persisted session and serve the console shell
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Keep the session snapshot in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Print the route table mounted for a role
    Routes {
        #[arg(long)]
        role: String,
    },

    /// Show the guard decision for a path (anonymous when no role is given)
    Check {
        #[arg(long)]
        role: Option<String>,
        path: String,
    },

    /// Validate the role registry against the screen registry
    Validate {
        /// Also print the effective role table as TOML
        #[arg(long)]
        print: bool,
    },
}

pub async fn run(cli: Cli, mut config: ConsoleConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            host,
            port,
            ephemeral,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(&config, ephemeral).await
        }
        Commands::Routes { role } => print_routes(&config, &Role::from(role)),
        Commands::Check { role, path } => check(&config, role.map(Role::from), &path),
        Commands::Validate { print } => validate(&config, print),
    }
}

async fn serve(config: &ConsoleConfig, ephemeral: bool) -> anyhow::Result<()> {
    let console = Arc::new(
        ConsoleState::from_config(config, ephemeral).context("failed to initialise console")?,
    );

    // Navigations answer "loading" until this finishes.
    let restoring = Arc::clone(&console);
    tokio::spawn(async move {
        match restoring.restore().await {
            Ok(true) => tracing::info!("previous session restored"),
            Ok(false) => tracing::info!("starting without a session"),
            Err(e) => tracing::error!(error = %e, "session restore failed"),
        }
    });

    crate::web::serve(console, &config.bind_addr()).await
}

fn print_routes(config: &ConsoleConfig, role: &Role) -> anyhow::Result<()> {
    let registry = config.role_registry()?;
    let screens = ScreenRegistry::standard();
    if !registry.contains_role(role) {
        println!("role '{role}' has no console access");
        return Ok(());
    }
    for binding in build_routes(role, &registry, &screens, config.route_mode)? {
        println!(
            "{:<14} {:<18} {}",
            binding.path,
            binding.screen.component(),
            binding.screen.title()
        );
    }
    println!("default: {}", NavigationResolver::new(&registry).default_path(role));
    Ok(())
}

fn check(config: &ConsoleConfig, role: Option<Role>, path: &str) -> anyhow::Result<()> {
    let registry = config.role_registry()?;
    let screens = ScreenRegistry::standard();
    if config.route_mode == RouteMode::Strict {
        registry.validate(&screens)?;
    }

    let session = match role {
        Some(role) => {
            let sessions = SessionStore::new(Arc::new(MemorySnapshotStore::new()));
            sessions.login(
                Identity {
                    role,
                    name: "cli".into(),
                    email: String::new(),
                    id: "cli".into(),
                },
                None,
            )?;
            sessions.current()?
        }
        None => Session::anonymous(),
    };

    let guard = RouteGuard::new(&registry, &screens).with_mode(config.route_mode);
    match guard.evaluate(&session, path) {
        GuardDecision::Render(binding) => {
            println!("render {} ({})", binding.path, binding.screen.component())
        }
        GuardDecision::RedirectToLogin => println!("redirect {LOGIN_PATH}"),
        GuardDecision::RedirectToDefault(target) => println!("redirect {target}"),
        GuardDecision::AccessDenied => println!("access denied"),
    }
    Ok(())
}

fn validate(config: &ConsoleConfig, print: bool) -> anyhow::Result<()> {
    let registry = config.role_registry()?;
    let defects = registry.defects(&ScreenRegistry::standard());

    if print {
        println!("{}", registry.to_toml_string()?);
    }
    for defect in &defects {
        eprintln!("defect: {defect}");
    }
    if !defects.is_empty() {
        bail!("{} role registry defect(s)", defects.len());
    }
    println!("role registry OK ({} roles)", registry.roles().len());
    Ok(())
}
