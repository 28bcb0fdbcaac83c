use crate::role::Role;
use crate::role_registry::{Landing, RoleRegistry};
use crate::route_key::RouteKey;

/// Public path of the login screen.
pub const LOGIN_PATH: &str = "/login";

/// Root path; never rendered, always redirected.
pub const ROOT_PATH: &str = "/";

/// Turns route keys and roles into concrete paths. Pure and total: a role
/// without a landing route resolves to [`LOGIN_PATH`].
#[derive(Debug, Clone, Copy)]
pub struct NavigationResolver<'a> {
    registry: &'a RoleRegistry,
}

impl<'a> NavigationResolver<'a> {
    pub fn new(registry: &'a RoleRegistry) -> Self {
        Self { registry }
    }

    pub fn path_for(&self, key: RouteKey) -> String {
        key.path()
    }

    pub fn landing_path(&self, landing: Landing) -> String {
        match landing {
            Landing::Route(key) => self.path_for(key),
            Landing::Login => LOGIN_PATH.to_string(),
        }
    }

    /// Canonical default path for `role`.
    pub fn default_path(&self, role: &Role) -> String {
        self.landing_path(self.registry.default_route_key(role))
    }

    /// Where a session without a role belongs, or the role's default.
    pub fn default_path_for(&self, role: Option<&Role>) -> String {
        match role {
            Some(role) => self.default_path(role),
            None => LOGIN_PATH.to_string(),
        }
    }

    /// Target of the post-login success handler.
    pub fn post_login_target(&self, role: &Role) -> String {
        self.default_path(role)
    }
}
