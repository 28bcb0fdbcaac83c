use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::errors::{ConsoleError, ConsoleResult};
use crate::role::Role;
use crate::route_key::RouteKey;
use crate::screens::ScreenRegistry;

/// Where a role lands after login or after a disallowed navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Route(RouteKey),
    /// The role is not configured; the visitor belongs on the login screen.
    Login,
}

/// Per-role entry of the registry, as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRoutes {
    pub allowed: Vec<RouteKey>,
    pub default: RouteKey,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RoleTableFile {
    #[serde(default)]
    roles: BTreeMap<Role, RoleRoutes>,
}

/// Authoritative answer to "what can role X reach" and "where does role X
/// start". Immutable once built.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    allowed: HashMap<Role, Vec<RouteKey>>,
    defaults: HashMap<Role, RouteKey>,
}

impl RoleRegistry {
    /// Built-in permission table of the console.
    pub fn standard() -> Self {
        use RouteKey::*;

        let mut allowed: HashMap<Role, Vec<RouteKey>> = HashMap::new();
        let mut defaults: HashMap<Role, RouteKey> = HashMap::new();

        allowed.insert(
            Role::SuperUser,
            vec![
                Dashboard, Properties, Jobs, Contacts, Reports, Compliance, Payment, Region,
                Technician, Agencies,
            ],
        );
        defaults.insert(Role::SuperUser, Dashboard);

        allowed.insert(
            Role::Agency,
            vec![
                Dashboard, Properties, Jobs, Contacts, Reports, Compliance, Payment, Technician,
            ],
        );
        defaults.insert(Role::Agency, Dashboard);

        allowed.insert(
            Role::TeamMember,
            vec![
                Dashboard, Properties, Jobs, Contacts, Reports, Compliance, Region, Technician,
            ],
        );
        defaults.insert(Role::TeamMember, Dashboard);

        allowed.insert(Role::Staff, vec![Dashboard, Jobs, Contacts]);
        defaults.insert(Role::Staff, Dashboard);

        allowed.insert(Role::Tenant, vec![Tenant, Payment]);
        defaults.insert(Role::Tenant, Tenant);

        Self { allowed, defaults }
    }

    /// Build a registry from per-role entries.
    ///
    /// Duplicate keys are collapsed to their first occurrence. A default that
    /// is not part of the role's allowed set is rejected.
    pub fn from_entries<I>(entries: I) -> ConsoleResult<Self>
    where
        I: IntoIterator<Item = (Role, RoleRoutes)>,
    {
        let mut allowed = HashMap::new();
        let mut defaults = HashMap::new();

        for (role, routes) in entries {
            let mut keys: Vec<RouteKey> = Vec::with_capacity(routes.allowed.len());
            for key in routes.allowed {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            if !keys.contains(&routes.default) {
                return Err(ConsoleError::validation(
                    format!("roles.{role}.default"),
                    format!("default route '{}' is not in the allowed set", routes.default),
                ));
            }
            defaults.insert(role.clone(), routes.default);
            allowed.insert(role, keys);
        }

        Ok(Self { allowed, defaults })
    }

    /// Parse a `[roles.<role>]` table, e.g.
    ///
    /// ```toml
    /// [roles.staff]
    /// allowed = ["dashboard", "jobs", "contacts"]
    /// default = "dashboard"
    /// ```
    pub fn from_toml_str(input: &str) -> ConsoleResult<Self> {
        let file: RoleTableFile = toml::from_str(input)
            .map_err(|e| ConsoleError::config(format!("invalid role table: {e}")))?;
        if file.roles.is_empty() {
            return Err(ConsoleError::config("role table defines no roles"));
        }
        Self::from_entries(file.roles)
    }

    pub fn to_toml_string(&self) -> ConsoleResult<String> {
        let file = RoleTableFile {
            roles: self.entries().collect(),
        };
        toml::to_string_pretty(&file)
            .map_err(|e| ConsoleError::internal(format!("failed to render role table: {e}")))
    }

    /// Allowed keys for `role` in configured order; empty for an unknown role.
    pub fn allowed_route_keys(&self, role: &Role) -> &[RouteKey] {
        self.allowed.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_route_key_allowed(&self, role: &Role, key: RouteKey) -> bool {
        self.allowed_route_keys(role).contains(&key)
    }

    pub fn default_route_key(&self, role: &Role) -> Landing {
        match self.defaults.get(role) {
            Some(key) => Landing::Route(*key),
            None => Landing::Login,
        }
    }

    pub fn contains_role(&self, role: &Role) -> bool {
        self.allowed.contains_key(role)
    }

    /// Configured roles in a stable order.
    pub fn roles(&self) -> Vec<&Role> {
        let mut roles: Vec<&Role> = self.allowed.keys().collect();
        roles.sort();
        roles
    }

    fn entries(&self) -> impl Iterator<Item = (Role, RoleRoutes)> + '_ {
        self.allowed.iter().filter_map(|(role, keys)| {
            self.defaults.get(role).map(|default| {
                (
                    role.clone(),
                    RoleRoutes {
                        allowed: keys.clone(),
                        default: *default,
                    },
                )
            })
        })
    }

    /// Every configuration defect of this registry against `screens`.
    pub fn defects(&self, screens: &ScreenRegistry) -> Vec<ConsoleError> {
        let mut defects = Vec::new();
        for role in self.roles() {
            for key in self.allowed_route_keys(role) {
                if !screens.contains(*key) {
                    defects.push(ConsoleError::missing_screen(role.as_str(), key.as_str()));
                }
            }
            match self.defaults.get(role) {
                None => defects.push(ConsoleError::validation(
                    format!("roles.{role}.default"),
                    "role has no default route",
                )),
                Some(key) if !self.is_route_key_allowed(role, *key) => {
                    defects.push(ConsoleError::validation(
                        format!("roles.{role}.default"),
                        format!("default route '{key}' is not in the allowed set"),
                    ))
                }
                Some(_) => {}
            }
        }
        defects
    }

    /// Fail on the first configuration defect. Run at startup and in tests,
    /// never per request.
    pub fn validate(&self, screens: &ScreenRegistry) -> ConsoleResult<()> {
        match self.defects(screens).into_iter().next() {
            Some(defect) => Err(defect),
            None => Ok(()),
        }
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
