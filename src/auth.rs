//! Authentication collaborator.
//!
//! The remote API owns users and passwords. The console only needs an
//! [`Identity`] and a token back from a successful login, and a best-effort
//! logout call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::{ConsoleError, ConsoleResult};
use crate::role::Role;
use crate::session::Identity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub token: String,
    pub identity: Identity,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ConsoleResult<AuthGrant>;

    async fn logout(&self, token: &str) -> ConsoleResult<()>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    role: Role,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(deserialize_with = "id_from_string_or_number")]
    id: String,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected user id: {other}"))),
    }
}

/// JSON-over-HTTP client for the remote authentication API.
pub struct HttpAuthenticator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthenticator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ConsoleResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsoleError::network("build_http_client", e))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn login(&self, credentials: &Credentials) -> ConsoleResult<AuthGrant> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await
            .map_err(|e| ConsoleError::network("auth_login", e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConsoleError::auth("invalid email or password"));
        }
        let response = response
            .error_for_status()
            .map_err(|e| ConsoleError::network("auth_login", e))?;

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ConsoleError::network("auth_login_body", e))?;
        if body.token.trim().is_empty() {
            return Err(ConsoleError::auth("authentication service returned an empty token"));
        }

        Ok(AuthGrant {
            token: body.token,
            identity: Identity {
                role: body.user.role,
                name: body.user.name,
                email: body.user.email,
                id: body.user.id,
            },
        })
    }

    async fn logout(&self, token: &str) -> ConsoleResult<()> {
        self.client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ConsoleError::network("auth_logout", e))?;
        Ok(())
    }
}

/// Fixed credential table, for demo mode and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticAuthenticator {
    accounts: HashMap<String, (String, Identity)>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, password: impl Into<String>, identity: Identity) -> Self {
        self.accounts
            .insert(identity.email.to_lowercase(), (password.into(), identity));
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn login(&self, credentials: &Credentials) -> ConsoleResult<AuthGrant> {
        match self.accounts.get(&credentials.email.to_lowercase()) {
            Some((password, identity)) if *password == credentials.password => Ok(AuthGrant {
                token: format!("static-{}", uuid::Uuid::new_v4()),
                identity: identity.clone(),
            }),
            _ => Err(ConsoleError::auth("invalid email or password")),
        }
    }

    async fn logout(&self, _token: &str) -> ConsoleResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> Identity {
        Identity {
            role: Role::Tenant,
            name: "Sam Okafor".into(),
            email: "sam@example.com".into(),
            id: "t-7".into(),
        }
    }

    #[tokio::test]
    async fn static_authenticator_accepts_known_credentials() {
        let auth = StaticAuthenticator::new().with_account("hunter2", tenant());
        let grant = auth
            .login(&Credentials {
                email: "SAM@example.com".into(),
                password: "hunter2".into(),
            })
            .await
            .unwrap();
        assert_eq!(grant.identity, tenant());
        assert!(grant.token.starts_with("static-"));
    }

    #[tokio::test]
    async fn static_authenticator_rejects_wrong_password() {
        let auth = StaticAuthenticator::new().with_account("hunter2", tenant());
        let err = auth
            .login(&Credentials {
                email: "sam@example.com".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Auth { .. }));
    }

    #[test]
    fn login_response_accepts_numeric_ids_and_role_aliases() {
        let body: LoginResponse = serde_json::from_str(
            r#"{"token":"abc","user":{"role":"property_manager","name":"P","email":"p@x","id":42}}"#,
        )
        .unwrap();
        assert_eq!(body.user.id, "42");
        assert_eq!(body.user.role, Role::Agency);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let auth = HttpAuthenticator::new("http://localhost:8000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(auth.url("/auth/login"), "http://localhost:8000/api/auth/login");
    }
}
