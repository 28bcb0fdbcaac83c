//! The single in-memory session of a running console and its synchronisation
//! with durable client storage.
//!
//! `SessionStore` is the only writer of the session. Every mutator replaces
//! the whole record and rewrites the persisted snapshot under one write
//! lock, so observers see either the old session or the new one, and
//! storage always ends up matching the last commit. A generation counter
//! orders competing writers: a login started before a newer login, logout
//! or restore commits nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::errors::{ConsoleResult, SafeReadLock, SafeWriteLock};
use crate::role::Role;
use crate::snapshot_store::{SnapshotStore, PROFILE_KEY, TOKEN_KEY};

/// Identity handed over by the authentication collaborator on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub id: String,
}

/// Cached profile persisted next to the auth token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Profile {
    fn is_structurally_valid(&self) -> bool {
        !self.role.as_str().trim().is_empty() && !self.id.trim().is_empty()
    }
}

/// Partial update of the non-identity profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Current authenticated identity. `is_logged_in` holds exactly when a role
/// is present; the fields are private so that cannot be broken from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    is_logged_in: bool,
    role: Option<Role>,
    name: String,
    email: String,
    id: String,
    phone: Option<String>,
    avatar: Option<String>,
    session_id: Option<Uuid>,
    logged_in_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    fn from_profile(profile: Profile) -> Self {
        Self {
            is_logged_in: true,
            role: Some(profile.role),
            name: profile.name,
            email: profile.email,
            id: profile.id,
            phone: profile.phone,
            avatar: profile.avatar,
            session_id: Some(Uuid::new_v4()),
            logged_in_at: Some(Utc::now()),
        }
    }

    fn from_identity(identity: Identity) -> Self {
        Self::from_profile(Profile {
            role: identity.role,
            name: identity.name,
            email: identity.email,
            id: identity.id,
            phone: None,
            avatar: None,
            saved_at: None,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn logged_in_at(&self) -> Option<DateTime<Utc>> {
        self.logged_in_at
    }

    fn profile(&self) -> Option<Profile> {
        let role = self.role.clone()?;
        Some(Profile {
            role,
            name: self.name.clone(),
            email: self.email.clone(),
            id: self.id.clone(),
            phone: self.phone.clone(),
            avatar: self.avatar.clone(),
            saved_at: Some(Utc::now()),
        })
    }
}

/// Proof of which session generation a pending login started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginTicket {
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    session: Session,
    token: Option<String>,
    generation: u64,
}

/// Owner of the process-wide session.
pub struct SessionStore {
    inner: RwLock<Inner>,
    storage: Arc<dyn SnapshotStore>,
    ready: AtomicBool,
}

/// Short SHA-256 prefix of a token, safe to log.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

/// What restoration found in storage.
enum Snapshot {
    Absent,
    /// Values were present but unusable; safe to remove.
    Broken,
    Usable(String, Profile),
}

fn read_snapshot(storage: &dyn SnapshotStore) -> Snapshot {
    let token = match storage.get(TOKEN_KEY) {
        Ok(Some(token)) if !token.trim().is_empty() => token,
        Ok(Some(_)) => {
            tracing::warn!("persisted token is empty");
            return Snapshot::Broken;
        }
        Ok(None) => return Snapshot::Absent,
        Err(e) => {
            tracing::warn!(error = %e, "could not read persisted token");
            return Snapshot::Absent;
        }
    };
    let raw_profile = match storage.get(PROFILE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::warn!("persisted token has no profile");
            return Snapshot::Broken;
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not read persisted profile");
            return Snapshot::Absent;
        }
    };
    match serde_json::from_str::<Profile>(&raw_profile) {
        Ok(profile) if profile.is_structurally_valid() => Snapshot::Usable(token, profile),
        Ok(_) => {
            tracing::warn!("persisted profile is missing role or id");
            Snapshot::Broken
        }
        Err(e) => {
            tracing::warn!(error = %e, "persisted profile does not deserialize");
            Snapshot::Broken
        }
    }
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SnapshotStore>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            storage,
            ready: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> ConsoleResult<Session> {
        Ok(self.inner.safe_read()?.session.clone())
    }

    pub fn token(&self) -> ConsoleResult<Option<String>> {
        Ok(self.inner.safe_read()?.token.clone())
    }

    /// Whether startup restoration has finished. Protected content must not
    /// be evaluated before this is true.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Replace the session wholesale. With a token the snapshot is persisted,
    /// without one any earlier snapshot is dropped. A storage failure is
    /// logged and leaves the in-memory session in place.
    pub fn login(&self, identity: Identity, token: Option<String>) -> ConsoleResult<()> {
        let session = Session::from_identity(identity);
        let mut inner = self.inner.safe_write()?;
        inner.generation += 1;
        inner.session = session;
        inner.token = token;
        tracing::info!(
            role = ?inner.session.role(),
            user_id = inner.session.id(),
            session_id = ?inner.session.session_id(),
            "session logged in"
        );
        self.sync_snapshot(&inner);
        Ok(())
    }

    /// Start a login round-trip. Any login begun earlier becomes stale.
    pub fn begin_login(&self) -> ConsoleResult<LoginTicket> {
        let mut inner = self.inner.safe_write()?;
        inner.generation += 1;
        Ok(LoginTicket {
            generation: inner.generation,
        })
    }

    /// Commit the result of a login round-trip if nothing newer has been
    /// committed or started since `ticket` was issued. Returns whether the
    /// result was applied.
    pub fn complete_login(
        &self,
        ticket: LoginTicket,
        identity: Identity,
        token: Option<String>,
    ) -> ConsoleResult<bool> {
        let session = Session::from_identity(identity);
        let mut inner = self.inner.safe_write()?;
        if inner.generation != ticket.generation {
            tracing::warn!(
                ticket = ticket.generation,
                current = inner.generation,
                "discarding stale login result"
            );
            return Ok(false);
        }
        inner.generation += 1;
        inner.session = session;
        inner.token = token;
        tracing::info!(role = ?inner.session.role(), user_id = inner.session.id(), "session logged in");
        self.sync_snapshot(&inner);
        Ok(true)
    }

    /// Reset to the empty session and drop the persisted snapshot.
    pub fn logout(&self) -> ConsoleResult<()> {
        let mut inner = self.inner.safe_write()?;
        inner.generation += 1;
        inner.session = Session::anonymous();
        inner.token = None;
        self.sync_snapshot(&inner);
        tracing::info!("session logged out");
        Ok(())
    }

    /// Rebuild the session from the persisted snapshot. A missing or broken
    /// snapshot leaves the session empty; a broken one is also cleared.
    /// Nothing is committed or cleared if the session changed while the
    /// snapshot was being read. Marks the store ready whatever the outcome.
    /// Returns whether a session was restored.
    pub async fn restore(&self) -> ConsoleResult<bool> {
        let started_at = self.inner.safe_read()?.generation;
        let storage = Arc::clone(&self.storage);
        let snapshot = tokio::task::spawn_blocking(move || read_snapshot(storage.as_ref()))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "snapshot read task failed");
                Snapshot::Absent
            });

        let restored = {
            let mut inner = self.inner.safe_write()?;
            if inner.generation != started_at {
                tracing::debug!("session changed during restore, keeping newer state");
                false
            } else {
                match snapshot {
                    Snapshot::Usable(token, profile) => {
                        let session = Session::from_profile(profile);
                        tracing::info!(
                            role = ?session.role(),
                            token = %token_fingerprint(&token),
                            "session restored from snapshot"
                        );
                        inner.generation += 1;
                        inner.session = session;
                        inner.token = Some(token);
                        true
                    }
                    Snapshot::Broken => {
                        if let Err(e) = self.storage.clear() {
                            tracing::warn!(error = %e, "failed to clear unusable snapshot");
                        }
                        false
                    }
                    Snapshot::Absent => {
                        tracing::debug!("no session snapshot");
                        false
                    }
                }
            }
        };

        self.ready.store(true, Ordering::Release);
        Ok(restored)
    }

    /// Merge name, phone and avatar. Role and login state are untouched.
    /// Returns false when there is no logged-in session to update.
    pub fn update_profile(&self, update: ProfileUpdate) -> ConsoleResult<bool> {
        let mut inner = self.inner.safe_write()?;
        if !inner.session.is_logged_in {
            return Ok(false);
        }
        if let Some(name) = update.name {
            inner.session.name = name;
        }
        if let Some(phone) = update.phone {
            inner.session.phone = Some(phone);
        }
        if let Some(avatar) = update.avatar {
            inner.session.avatar = Some(avatar);
        }
        self.sync_snapshot(&inner);
        Ok(true)
    }

    /// Make storage mirror `inner`. Callers hold the write lock, so snapshot
    /// writes land in the same order as the commits they belong to.
    fn sync_snapshot(&self, inner: &Inner) {
        let (Some(token), Some(profile)) = (inner.token.as_deref(), inner.session.profile()) else {
            if let Err(e) = self.storage.clear() {
                tracing::warn!(error = %e, "failed to clear persisted session snapshot");
            }
            return;
        };
        let result = serde_json::to_string(&profile)
            .map_err(Into::into)
            .and_then(|json| {
                self.storage.set(TOKEN_KEY, token)?;
                self.storage.set(PROFILE_KEY, &json)
            });
        match result {
            Ok(()) => tracing::debug!(token = %token_fingerprint(token), "session snapshot saved"),
            Err(e) => tracing::warn!(error = %e, "failed to persist session snapshot"),
        }
    }
}
