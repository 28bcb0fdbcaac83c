use crate::navigation::{NavigationResolver, ROOT_PATH};
use crate::role_registry::{Landing, RoleRegistry};
use crate::route_key::RouteKey;
use crate::route_table::{build_routes, RouteBinding, RouteMode};
use crate::screens::ScreenRegistry;
use crate::session::Session;

/// Terminal outcome of one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render(RouteBinding),
    RedirectToLogin,
    RedirectToDefault(String),
    /// Logged in, but the role has no landing route at all.
    AccessDenied,
}

impl GuardDecision {
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GuardDecision::RedirectToLogin => Some(crate::navigation::LOGIN_PATH),
            GuardDecision::RedirectToDefault(path) => Some(path),
            GuardDecision::Render(_) | GuardDecision::AccessDenied => None,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            GuardDecision::Render(_) => "render",
            GuardDecision::RedirectToLogin => "redirect_to_login",
            GuardDecision::RedirectToDefault(_) => "redirect_to_default",
            GuardDecision::AccessDenied => "access_denied",
        }
    }
}

/// Per-navigation decision function. Holds no state of its own; every
/// evaluation is derived from the session it is handed.
#[derive(Debug, Clone, Copy)]
pub struct RouteGuard<'a> {
    registry: &'a RoleRegistry,
    screens: &'a ScreenRegistry,
    mode: RouteMode,
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        ROOT_PATH
    } else {
        trimmed
    }
}

impl<'a> RouteGuard<'a> {
    pub fn new(registry: &'a RoleRegistry, screens: &'a ScreenRegistry) -> Self {
        Self {
            registry,
            screens,
            mode: RouteMode::default(),
        }
    }

    /// Build route tables in `mode`. A strict table that fails to build
    /// mounts nothing for the role.
    pub fn with_mode(mut self, mode: RouteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn evaluate(&self, session: &Session, requested_path: &str) -> GuardDecision {
        let routes = match session.role() {
            Some(role) => match build_routes(role, self.registry, self.screens, self.mode) {
                Ok(routes) => routes,
                Err(e) => {
                    tracing::warn!(error = %e, "route table unavailable for role");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.evaluate_with_routes(session, requested_path, &routes)
    }

    /// Evaluate against an already built route table for the session's role.
    pub fn evaluate_with_routes(
        &self,
        session: &Session,
        requested_path: &str,
        routes: &[RouteBinding],
    ) -> GuardDecision {
        let decision = self.decide(session, requested_path, routes);
        tracing::debug!(
            path = requested_path,
            role = ?session.role(),
            outcome = decision.outcome(),
            target = ?decision.redirect_target(),
            "route guard decision"
        );
        decision
    }

    fn decide(&self, session: &Session, requested_path: &str, routes: &[RouteBinding]) -> GuardDecision {
        let role = match session.role() {
            Some(role) if session.is_logged_in() => role,
            _ => return GuardDecision::RedirectToLogin,
        };

        let default_key = match self.registry.default_route_key(role) {
            Landing::Route(key) => key,
            Landing::Login => return GuardDecision::AccessDenied,
        };
        let resolver = NavigationResolver::new(self.registry);
        let to_default = GuardDecision::RedirectToDefault(resolver.path_for(default_key));

        let path = normalize(requested_path);
        if path == ROOT_PATH {
            return to_default;
        }

        let Some(key) = RouteKey::from_path(path) else {
            return to_default;
        };
        if !self.registry.is_route_key_allowed(role, key) {
            return to_default;
        }

        match routes.iter().find(|binding| binding.key == key) {
            Some(binding) => GuardDecision::Render(binding.clone()),
            // Granted but unmounted; sending the visitor to the same default
            // again would loop.
            None if key == default_key => GuardDecision::AccessDenied,
            None => to_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use crate::session::{Identity, SessionStore};
    use crate::snapshot_store::MemorySnapshotStore;
    use std::sync::Arc;

    fn session_for(role: Role) -> Session {
        let store = SessionStore::new(Arc::new(MemorySnapshotStore::new()));
        store
            .login(
                Identity {
                    role,
                    name: "Test".into(),
                    email: "test@example.com".into(),
                    id: "1".into(),
                },
                None,
            )
            .unwrap();
        store.current().unwrap()
    }

    fn fixtures() -> (RoleRegistry, ScreenRegistry) {
        (RoleRegistry::standard(), ScreenRegistry::standard())
    }

    #[test]
    fn anonymous_is_sent_to_login_for_every_path() {
        let (registry, screens) = fixtures();
        let guard = RouteGuard::new(&registry, &screens);
        let anonymous = Session::anonymous();
        for path in ["/", "", "/dashboard", "/payment", "/nowhere", "/jobs/12"] {
            assert_eq!(guard.evaluate(&anonymous, path), GuardDecision::RedirectToLogin);
        }
    }

    #[test]
    fn allowed_key_renders_bound_screen() {
        let (registry, screens) = fixtures();
        let guard = RouteGuard::new(&registry, &screens);
        match guard.evaluate(&session_for(Role::Staff), "/jobs") {
            GuardDecision::Render(binding) => {
                assert_eq!(binding.path, "/jobs");
                assert_eq!(binding.screen.component(), "JobsPage");
            }
            other => panic!("expected render, got {other:?}"),
        }
    }

    #[test]
    fn nested_paths_render_their_feature_area() {
        let (registry, screens) = fixtures();
        let guard = RouteGuard::new(&registry, &screens);
        let decision = guard.evaluate(&session_for(Role::Agency), "/properties/42/edit?tab=owner");
        assert!(matches!(decision, GuardDecision::Render(ref b) if b.key == RouteKey::Properties));
    }

    #[test]
    fn disallowed_and_unknown_paths_redirect_to_default() {
        let (registry, screens) = fixtures();
        let guard = RouteGuard::new(&registry, &screens);
        let staff = session_for(Role::Staff);
        for path in ["/payment", "/agencies", "/inbox", "/Jobs"] {
            assert_eq!(
                guard.evaluate(&staff, path),
                GuardDecision::RedirectToDefault("/dashboard".into())
            );
        }
    }

    #[test]
    fn root_redirects_to_role_default() {
        let (registry, screens) = fixtures();
        let guard = RouteGuard::new(&registry, &screens);
        assert_eq!(
            guard.evaluate(&session_for(Role::SuperUser), "/"),
            GuardDecision::RedirectToDefault("/dashboard".into())
        );
        assert_eq!(
            guard.evaluate(&session_for(Role::Tenant), "/"),
            GuardDecision::RedirectToDefault("/tenant".into())
        );
    }

    #[test]
    fn unknown_role_is_access_denied() {
        let (registry, screens) = fixtures();
        let guard = RouteGuard::new(&registry, &screens);
        let session = session_for(Role::from("landlord"));
        assert_eq!(guard.evaluate(&session, "/dashboard"), GuardDecision::AccessDenied);
        assert_eq!(guard.evaluate(&session, "/"), GuardDecision::AccessDenied);
    }

    #[test]
    fn unmounted_key_falls_back_to_default_without_rendering() {
        let registry = RoleRegistry::standard();
        let screens = ScreenRegistry::standard().without(RouteKey::Jobs);
        let guard = RouteGuard::new(&registry, &screens);
        assert_eq!(
            guard.evaluate(&session_for(Role::Staff), "/jobs"),
            GuardDecision::RedirectToDefault("/dashboard".into())
        );
    }

    #[test]
    fn unmounted_default_does_not_loop() {
        let registry = RoleRegistry::standard();
        let screens = ScreenRegistry::standard().without(RouteKey::Dashboard);
        let guard = RouteGuard::new(&registry, &screens);
        assert_eq!(
            guard.evaluate(&session_for(Role::Staff), "/dashboard"),
            GuardDecision::AccessDenied
        );
    }

    #[test]
    fn strict_guard_mounts_nothing_for_defective_role() {
        let registry = RoleRegistry::standard();
        let screens = ScreenRegistry::standard().without(RouteKey::Jobs);
        let staff = session_for(Role::Staff);

        let lenient = RouteGuard::new(&registry, &screens);
        assert!(matches!(lenient.evaluate(&staff, "/dashboard"), GuardDecision::Render(_)));

        let strict = RouteGuard::new(&registry, &screens).with_mode(RouteMode::Strict);
        assert_eq!(strict.evaluate(&staff, "/dashboard"), GuardDecision::AccessDenied);
        assert_eq!(
            strict.evaluate(&staff, "/jobs"),
            GuardDecision::RedirectToDefault("/dashboard".into())
        );
        assert!(matches!(
            strict.evaluate(&session_for(Role::Tenant), "/tenant"),
            GuardDecision::Render(_)
        ));
    }

    #[test]
    fn disallowed_key_never_renders_for_any_role() {
        let (registry, screens) = fixtures();
        let guard = RouteGuard::new(&registry, &screens);
        for role in Role::KNOWN.iter() {
            let session = session_for(role.clone());
            for key in RouteKey::ALL {
                let decision = guard.evaluate(&session, &key.path());
                if registry.is_route_key_allowed(role, key) {
                    assert!(matches!(decision, GuardDecision::Render(_)));
                } else {
                    assert!(matches!(decision, GuardDecision::RedirectToDefault(_)));
                }
            }
        }
    }
}
