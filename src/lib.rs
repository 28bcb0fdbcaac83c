//! Library root for the `pm_console` crate: role-based access control and
//! dynamic route generation for the property-management console.

// Core error handling
pub mod api_errors;
pub mod errors;

// Roles, route keys and screens
pub mod role;
pub mod role_registry;
pub mod route_key;
pub mod screens;

// Routing
pub mod guard;
pub mod navigation;
pub mod route_table;

// Session & persistence
pub mod session;
pub mod snapshot_crypto;
pub mod snapshot_store;

// Authentication collaborator
pub mod auth;

// Configuration & CLI
pub mod cli;
pub mod config;

// Wiring & web shell
pub mod console;
pub mod web;

pub use console::ConsoleState;
pub use errors::{ConsoleError, ConsoleResult};
pub use guard::{GuardDecision, RouteGuard};
pub use navigation::NavigationResolver;
pub use role::Role;
pub use role_registry::{Landing, RoleRegistry};
pub use route_key::RouteKey;
pub use route_table::{build_routes, RouteBinding, RouteMode};
pub use screens::ScreenRegistry;
pub use session::{Identity, Session, SessionStore};
