//! Error handling for the console access engine
//!
//! Access decisions themselves never fail: unknown roles, unknown paths and
//! unreadable snapshots all degrade to a safe outcome. `ConsoleError` covers
//! the layers around them (storage, network, configuration, startup
//! validation).

use thiserror::Error;

/// Main error type for the console engine
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage operation failed: {operation} - {source}")]
    Storage {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Authentication error: {message}")]
    Auth { message: String },

    #[error("Cryptographic operation failed: {message}")]
    Crypto { message: String },

    #[error("Mutex lock failed: {resource}")]
    MutexPoisoned { resource: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network operation failed: {operation}")]
    Network {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unknown route key: {key}")]
    UnknownRouteKey { key: String },

    #[error("Route key '{key}' granted to role '{role}' has no screen binding")]
    MissingScreen { role: String, key: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl ConsoleError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create an authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn network(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            operation: operation.into(),
            source,
        }
    }

    pub fn unknown_route_key(key: impl Into<String>) -> Self {
        Self::UnknownRouteKey { key: key.into() }
    }

    /// Create a missing-screen configuration defect
    pub fn missing_screen(role: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingScreen {
            role: role.into(),
            key: key.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Poison-safe read access for `RwLock`
pub trait SafeReadLock<T: ?Sized> {
    fn safe_read(&self) -> ConsoleResult<std::sync::RwLockReadGuard<'_, T>>;
}

impl<T: ?Sized> SafeReadLock<T> for std::sync::RwLock<T> {
    fn safe_read(&self) -> ConsoleResult<std::sync::RwLockReadGuard<'_, T>> {
        self.read().map_err(|_| ConsoleError::MutexPoisoned {
            resource: "rwlock_read".to_string(),
        })
    }
}

/// Poison-safe write access for `RwLock`
pub trait SafeWriteLock<T: ?Sized> {
    fn safe_write(&self) -> ConsoleResult<std::sync::RwLockWriteGuard<'_, T>>;
}

impl<T: ?Sized> SafeWriteLock<T> for std::sync::RwLock<T> {
    fn safe_write(&self) -> ConsoleResult<std::sync::RwLockWriteGuard<'_, T>> {
        self.write().map_err(|_| ConsoleError::MutexPoisoned {
            resource: "rwlock_write".to_string(),
        })
    }
}

impl From<sled::Error> for ConsoleError {
    fn from(err: sled::Error) -> Self {
        ConsoleError::storage("sled_operation", err)
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::serialization("json_operation", err)
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        ConsoleError::io("io_operation", err)
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        ConsoleError::network("http_request", err)
    }
}

impl From<figment::Error> for ConsoleError {
    fn from(err: figment::Error) -> Self {
        ConsoleError::config(err.to_string())
    }
}
