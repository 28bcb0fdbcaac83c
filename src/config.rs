// Console configuration: serialized defaults, then a TOML file, then
// PM_CONSOLE_* environment variables (nested keys split on "__").

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{ConsoleError, ConsoleResult};
use crate::role::Role;
use crate::role_registry::{RoleRegistry, RoleRoutes};
use crate::route_table::RouteMode;
use crate::snapshot_crypto::decode_base64_key;

pub const DEFAULT_CONFIG_FILE: &str = "pm_console.toml";
pub const ENV_PREFIX: &str = "PM_CONSOLE_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub host: String,
    pub port: u16,
    pub storage_path: PathBuf,
    #[serde(default)]
    pub storage_key_b64: Option<String>,
    pub auth_base_url: String,
    pub auth_timeout_secs: u64,
    #[serde(default)]
    pub route_mode: RouteMode,
    pub log_filter: String,
    /// Inline override of the built-in role table.
    #[serde(default)]
    pub roles: BTreeMap<Role, RoleRoutes>,
    /// Standalone role table file, used when `roles` is empty.
    #[serde(default)]
    pub roles_file: Option<PathBuf>,
}

fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pm_console")
        .join("session")
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            storage_path: default_storage_path(),
            storage_key_b64: None,
            auth_base_url: "http://localhost:8000/api".to_string(),
            auth_timeout_secs: 10,
            route_mode: RouteMode::Lenient,
            log_filter: "pm_console=info".to_string(),
            roles: BTreeMap::new(),
            roles_file: None,
        }
    }
}

impl ConsoleConfig {
    fn validate(&self) -> ConsoleResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConsoleError::config("host cannot be empty"));
        }
        if self.auth_base_url.trim().is_empty() {
            return Err(ConsoleError::config("auth_base_url cannot be empty"));
        }
        if self.auth_timeout_secs == 0 {
            return Err(ConsoleError::config("auth_timeout_secs must be positive"));
        }
        if let Some(encoded) = &self.storage_key_b64 {
            decode_base64_key(encoded)
                .map_err(|e| ConsoleError::config(format!("storage_key_b64: {e}")))?;
        }
        Ok(())
    }

    /// Decoded snapshot sealing key, if one is configured.
    pub fn storage_key(&self) -> ConsoleResult<Option<[u8; 32]>> {
        self.storage_key_b64
            .as_deref()
            .map(decode_base64_key)
            .transpose()
    }

    /// Role registry in effect: inline table, then role file, then the
    /// built-in table.
    pub fn role_registry(&self) -> ConsoleResult<RoleRegistry> {
        if !self.roles.is_empty() {
            return RoleRegistry::from_entries(self.roles.clone());
        }
        if let Some(path) = &self.roles_file {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ConsoleError::io(format!("read role table {}", path.display()), e))?;
            return RoleRegistry::from_toml_str(&content);
        }
        Ok(RoleRegistry::standard())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> ConsoleResult<ConsoleConfig> {
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config: ConsoleConfig = Figment::from(Serialized::defaults(ConsoleConfig::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed(env_prefix).split("__"))
        .extract()?;

    config.validate()?;
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> ConsoleResult<ConsoleConfig> {
    load_with_prefix(path, ENV_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role_registry::Landing;
    use crate::route_key::RouteKey;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let config =
            load_with_prefix(Some(Path::new("/nonexistent/pm_console.toml")), "PMC_T_DEFAULTS_").unwrap();
        assert_eq!(config.port, 8787);
        assert_eq!(config.route_mode, RouteMode::Lenient);
        assert!(config.storage_key().unwrap().is_none());
        assert!(config.role_registry().unwrap().contains_role(&Role::Staff));
    }

    #[test]
    fn file_values_override_defaults() {
        let file = write_config(
            r#"
            port = 9000
            route_mode = "strict"
            auth_base_url = "https://api.example.com"
            "#,
        );
        let config = load_with_prefix(Some(file.path()), "PMC_T_FILE_").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.route_mode, RouteMode::Strict);
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn env_overrides_file() {
        let file = write_config("port = 9000\n");
        std::env::set_var("PMC_T_ENV_PORT", "9100");
        let config = load_with_prefix(Some(file.path()), "PMC_T_ENV_").unwrap();
        std::env::remove_var("PMC_T_ENV_PORT");
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn invalid_storage_key_fails_fast() {
        let file = write_config("storage_key_b64 = \"c2hvcnQ=\"\n");
        let result = load_with_prefix(Some(file.path()), "PMC_T_KEY_");
        assert!(matches!(result, Err(ConsoleError::Config { .. })));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let file = write_config("auth_timeout_secs = 0\n");
        assert!(load_with_prefix(Some(file.path()), "PMC_T_TIMEOUT_").is_err());
    }

    #[test]
    fn inline_roles_replace_builtin_table() {
        let file = write_config(
            r#"
            [roles.staff]
            allowed = ["jobs"]
            default = "jobs"
            "#,
        );
        let config = load_with_prefix(Some(file.path()), "PMC_T_ROLES_").unwrap();
        let registry = config.role_registry().unwrap();
        assert_eq!(registry.default_route_key(&Role::Staff), Landing::Route(RouteKey::Jobs));
        assert!(!registry.contains_role(&Role::SuperUser));
    }

    #[test]
    fn roles_file_is_used_when_no_inline_table() {
        let roles = write_config(
            r#"
            [roles.tenant]
            allowed = ["tenant"]
            default = "tenant"
            "#,
        );
        let file = write_config(&format!("roles_file = {:?}\n", roles.path()));
        let config = load_with_prefix(Some(file.path()), "PMC_T_ROLEFILE_").unwrap();
        let registry = config.role_registry().unwrap();
        assert!(registry.contains_role(&Role::Tenant));
        assert!(!registry.contains_role(&Role::Staff));
    }
}
