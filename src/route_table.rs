use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::errors::{ConsoleError, ConsoleResult, SafeReadLock, SafeWriteLock};
use crate::role::Role;
use crate::role_registry::RoleRegistry;
use crate::route_key::RouteKey;
use crate::screens::{ScreenRef, ScreenRegistry};

/// Concrete path → screen binding mounted for a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    pub key: RouteKey,
    pub path: String,
    pub screen: ScreenRef,
}

/// How the builder treats a granted key that has no screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    /// Omit the binding and log the defect.
    #[default]
    Lenient,
    /// Refuse to build the table.
    Strict,
}

/// Expand the allowed keys of `role` into bindings at `/{key}`, in registry
/// order. Output depends only on the arguments.
pub fn build_routes(
    role: &Role,
    registry: &RoleRegistry,
    screens: &ScreenRegistry,
    mode: RouteMode,
) -> ConsoleResult<Vec<RouteBinding>> {
    let mut bindings = Vec::new();
    for key in registry.allowed_route_keys(role) {
        match screens.get(*key) {
            Some(screen) => bindings.push(RouteBinding {
                key: *key,
                path: key.path(),
                screen: screen.clone(),
            }),
            None if mode == RouteMode::Strict => {
                return Err(ConsoleError::missing_screen(role.as_str(), key.as_str()));
            }
            None => {
                tracing::warn!(%role, key = %key, "route key has no screen binding, omitting");
            }
        }
    }
    Ok(bindings)
}

/// Memo of the last role's route table. Bindings are recomputed only when the
/// role changes.
#[derive(Debug, Default)]
pub struct RouteTableCache {
    current: RwLock<Option<(Role, Vec<RouteBinding>)>>,
}

impl RouteTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes_for(
        &self,
        role: &Role,
        registry: &RoleRegistry,
        screens: &ScreenRegistry,
        mode: RouteMode,
    ) -> ConsoleResult<Vec<RouteBinding>> {
        if let Some((cached_role, bindings)) = self.current.safe_read()?.as_ref() {
            if cached_role == role {
                return Ok(bindings.clone());
            }
        }

        let bindings = build_routes(role, registry, screens, mode)?;
        *self.current.safe_write()? = Some((role.clone(), bindings.clone()));
        tracing::debug!(%role, count = bindings.len(), "route table rebuilt");
        Ok(bindings)
    }

    pub fn cached_role(&self) -> Option<Role> {
        self.current
            .safe_read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|(role, _)| role.clone()))
    }

    pub fn clear(&self) -> ConsoleResult<()> {
        *self.current.safe_write()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> (RoleRegistry, ScreenRegistry) {
        (RoleRegistry::standard(), ScreenRegistry::standard())
    }

    #[test]
    fn one_binding_per_allowed_key() {
        let (registry, screens) = standard();
        for role in registry.roles() {
            let bindings = build_routes(role, &registry, &screens, RouteMode::Strict).unwrap();
            for key in registry.allowed_route_keys(role) {
                let path = format!("/{key}");
                assert_eq!(bindings.iter().filter(|b| b.path == path).count(), 1);
            }
            assert_eq!(bindings.len(), registry.allowed_route_keys(role).len());
        }
    }

    #[test]
    fn build_is_idempotent_and_ordered() {
        let (registry, screens) = standard();
        let first = build_routes(&Role::Agency, &registry, &screens, RouteMode::Lenient).unwrap();
        let second = build_routes(&Role::Agency, &registry, &screens, RouteMode::Lenient).unwrap();
        assert_eq!(first, second);
        let keys: Vec<RouteKey> = first.iter().map(|b| b.key).collect();
        assert_eq!(keys, registry.allowed_route_keys(&Role::Agency));
    }

    #[test]
    fn building_routes_does_not_load_screens() {
        let registry = RoleRegistry::standard();
        let screens = ScreenRegistry::standard().detached();
        let bindings = build_routes(&Role::Staff, &registry, &screens, RouteMode::Lenient).unwrap();
        assert!(bindings.iter().all(|b| !b.screen.is_loaded()));

        bindings[1].screen.load();
        assert!(screens.get(RouteKey::Jobs).unwrap().is_loaded());
    }

    #[test]
    fn unknown_role_builds_empty_table() {
        let (registry, screens) = standard();
        let bindings =
            build_routes(&Role::from("landlord"), &registry, &screens, RouteMode::Strict).unwrap();
        assert!(bindings.is_empty());
    }

    #[test]
    fn lenient_mode_omits_missing_screens() {
        let registry = RoleRegistry::standard();
        let screens = ScreenRegistry::standard().without(RouteKey::Jobs);
        let bindings = build_routes(&Role::Staff, &registry, &screens, RouteMode::Lenient).unwrap();
        let paths: Vec<&str> = bindings.iter().map(|b| b.path.as_str()).collect();
        assert_eq!(paths, vec!["/dashboard", "/contacts"]);
    }

    #[test]
    fn strict_mode_rejects_missing_screens() {
        let registry = RoleRegistry::standard();
        let screens = ScreenRegistry::standard().without(RouteKey::Jobs);
        let result = build_routes(&Role::Staff, &registry, &screens, RouteMode::Strict);
        assert!(matches!(result, Err(ConsoleError::MissingScreen { .. })));
    }

    #[test]
    fn cache_recomputes_only_on_role_change() {
        let (registry, screens) = standard();
        let cache = RouteTableCache::new();
        assert!(cache.cached_role().is_none());

        let staff = cache
            .routes_for(&Role::Staff, &registry, &screens, RouteMode::Lenient)
            .unwrap();
        assert_eq!(cache.cached_role(), Some(Role::Staff));
        let again = cache
            .routes_for(&Role::Staff, &registry, &screens, RouteMode::Lenient)
            .unwrap();
        assert_eq!(staff, again);

        let tenant = cache
            .routes_for(&Role::Tenant, &registry, &screens, RouteMode::Lenient)
            .unwrap();
        assert_eq!(cache.cached_role(), Some(Role::Tenant));
        assert_eq!(tenant[0].path, "/tenant");

        cache.clear().unwrap();
        assert!(cache.cached_role().is_none());
    }
}
