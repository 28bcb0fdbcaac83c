use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Authenticator, Credentials, HttpAuthenticator};
use crate::config::ConsoleConfig;
use crate::errors::{ConsoleError, ConsoleResult};
use crate::guard::{GuardDecision, RouteGuard};
use crate::navigation::{NavigationResolver, LOGIN_PATH};
use crate::role_registry::RoleRegistry;
use crate::route_table::{RouteBinding, RouteMode, RouteTableCache};
use crate::screens::ScreenRegistry;
use crate::session::{ProfileUpdate, Session, SessionStore};
use crate::snapshot_store::{MemorySnapshotStore, SledSnapshotStore, SnapshotStore};

/// Result of a successful interactive login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    pub landing: String,
}

/// Everything one running console needs to answer navigations: the static
/// registries, the session store and the authentication collaborator.
pub struct ConsoleState {
    pub registry: RoleRegistry,
    pub screens: ScreenRegistry,
    pub route_mode: RouteMode,
    pub sessions: SessionStore,
    routes: RouteTableCache,
    authenticator: Arc<dyn Authenticator>,
}

impl ConsoleState {
    /// Wire a console. In strict mode a registry that grants a key without a
    /// screen is refused here; in lenient mode the defects are logged and the
    /// affected bindings are omitted later.
    pub fn new(
        registry: RoleRegistry,
        screens: ScreenRegistry,
        route_mode: RouteMode,
        storage: Arc<dyn SnapshotStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> ConsoleResult<Self> {
        match route_mode {
            RouteMode::Strict => registry.validate(&screens)?,
            RouteMode::Lenient => {
                for defect in registry.defects(&screens) {
                    tracing::warn!(%defect, "role registry defect");
                }
            }
        }

        Ok(Self {
            registry,
            screens,
            route_mode,
            sessions: SessionStore::new(storage),
            routes: RouteTableCache::new(),
            authenticator,
        })
    }

    /// Build from configuration. `ephemeral` keeps the snapshot in memory
    /// instead of on disk.
    pub fn from_config(config: &ConsoleConfig, ephemeral: bool) -> ConsoleResult<Self> {
        let storage: Arc<dyn SnapshotStore> = if ephemeral {
            Arc::new(MemorySnapshotStore::new())
        } else {
            if let Some(parent) = config.storage_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConsoleError::io("create storage directory", e))?;
            }
            Arc::new(SledSnapshotStore::open(
                &config.storage_path,
                config.storage_key()?,
            )?)
        };
        let authenticator = Arc::new(HttpAuthenticator::new(
            config.auth_base_url.clone(),
            Duration::from_secs(config.auth_timeout_secs),
        )?);

        Self::new(
            config.role_registry()?,
            ScreenRegistry::standard(),
            config.route_mode,
            storage,
            authenticator,
        )
    }

    pub fn resolver(&self) -> NavigationResolver<'_> {
        NavigationResolver::new(&self.registry)
    }

    pub fn guard(&self) -> RouteGuard<'_> {
        RouteGuard::new(&self.registry, &self.screens).with_mode(self.route_mode)
    }

    /// Run startup restoration. Must finish before [`Self::navigate`] is
    /// used for protected content.
    pub async fn restore(&self) -> ConsoleResult<bool> {
        self.sessions.restore().await
    }

    pub fn is_ready(&self) -> bool {
        self.sessions.is_ready()
    }

    /// Route table of the current session's role; empty when anonymous.
    pub fn current_routes(&self) -> ConsoleResult<Vec<RouteBinding>> {
        let session = self.sessions.current()?;
        match session.role() {
            Some(role) => self
                .routes
                .routes_for(role, &self.registry, &self.screens, self.route_mode),
            None => Ok(Vec::new()),
        }
    }

    /// Decide what to do with a requested path for the current session.
    pub fn navigate(&self, path: &str) -> ConsoleResult<GuardDecision> {
        let session = self.sessions.current()?;
        let routes = match session.role() {
            Some(role) => match self
                .routes
                .routes_for(role, &self.registry, &self.screens, self.route_mode)
            {
                Ok(routes) => routes,
                Err(e) => {
                    tracing::warn!(error = %e, "route table unavailable for role");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        Ok(self.guard().evaluate_with_routes(&session, path, &routes))
    }

    /// Where the current session belongs: its role's default, or login.
    pub fn landing_path(&self) -> ConsoleResult<String> {
        let session = self.sessions.current()?;
        Ok(self.resolver().default_path_for(session.role()))
    }

    /// Authenticate against the remote API and commit the session unless a
    /// newer login or logout happened meanwhile.
    pub async fn login(&self, credentials: &Credentials) -> ConsoleResult<LoginOutcome> {
        let ticket = self.sessions.begin_login()?;
        let grant = self.authenticator.login(credentials).await?;
        let applied = self
            .sessions
            .complete_login(ticket, grant.identity, Some(grant.token))?;
        if !applied {
            return Err(ConsoleError::auth("login superseded by a newer session change"));
        }

        let session = self.sessions.current()?;
        let landing = match session.role() {
            Some(role) => self.resolver().post_login_target(role),
            None => LOGIN_PATH.to_string(),
        };
        Ok(LoginOutcome { session, landing })
    }

    /// Notify the remote API (best effort) and reset the local session.
    pub async fn logout(&self) -> ConsoleResult<()> {
        if let Some(token) = self.sessions.token()? {
            if let Err(e) = self.authenticator.logout(&token).await {
                tracing::warn!(error = %e, "remote logout failed, clearing local session anyway");
            }
        }
        self.sessions.logout()?;
        self.routes.clear()
    }

    pub fn update_profile(&self, update: ProfileUpdate) -> ConsoleResult<Option<Session>> {
        if self.sessions.update_profile(update)? {
            Ok(Some(self.sessions.current()?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuthenticator;
    use crate::role::Role;
    use crate::route_key::RouteKey;
    use crate::session::Identity;

    fn console_with(screens: ScreenRegistry, mode: RouteMode) -> ConsoleResult<ConsoleState> {
        let auth = StaticAuthenticator::new().with_account(
            "pw",
            Identity {
                role: Role::Staff,
                name: "Lee".into(),
                email: "lee@example.com".into(),
                id: "s-1".into(),
            },
        );
        ConsoleState::new(
            RoleRegistry::standard(),
            screens,
            mode,
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(auth),
        )
    }

    #[test]
    fn strict_mode_refuses_inconsistent_registry() {
        let screens = ScreenRegistry::standard().without(RouteKey::Contacts);
        assert!(matches!(
            console_with(screens, RouteMode::Strict),
            Err(ConsoleError::MissingScreen { .. })
        ));
    }

    #[test]
    fn lenient_mode_starts_with_inconsistent_registry() {
        let screens = ScreenRegistry::standard().without(RouteKey::Contacts);
        assert!(console_with(screens, RouteMode::Lenient).is_ok());
    }

    #[tokio::test]
    async fn login_then_logout_round_trip() {
        let console = console_with(ScreenRegistry::standard(), RouteMode::Strict).unwrap();
        console.restore().await.unwrap();

        let outcome = console
            .login(&Credentials {
                email: "lee@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.landing, "/dashboard");
        assert_eq!(console.current_routes().unwrap().len(), 3);

        console.logout().await.unwrap();
        assert!(console.current_routes().unwrap().is_empty());
        assert_eq!(console.navigate("/jobs").unwrap(), GuardDecision::RedirectToLogin);
        assert_eq!(console.landing_path().unwrap(), "/login");
    }

    #[tokio::test]
    async fn failed_login_leaves_session_untouched() {
        let console = console_with(ScreenRegistry::standard(), RouteMode::Strict).unwrap();
        let err = console
            .login(&Credentials {
                email: "lee@example.com".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Auth { .. }));
        assert!(!console.sessions.current().unwrap().is_logged_in());
    }

    #[test]
    fn update_profile_requires_session() {
        let console = console_with(ScreenRegistry::standard(), RouteMode::Strict).unwrap();
        assert!(console.update_profile(ProfileUpdate::default()).unwrap().is_none());
    }
}
