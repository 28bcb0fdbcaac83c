use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConsoleError;

/// Symbolic name for a feature area of the console. Route keys are the unit
/// in which permissions are granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKey {
    Dashboard,
    Properties,
    Jobs,
    Contacts,
    Reports,
    Compliance,
    Payment,
    Region,
    Technician,
    Agencies,
    Tenant,
}

impl RouteKey {
    pub const ALL: [RouteKey; 11] = [
        RouteKey::Dashboard,
        RouteKey::Properties,
        RouteKey::Jobs,
        RouteKey::Contacts,
        RouteKey::Reports,
        RouteKey::Compliance,
        RouteKey::Payment,
        RouteKey::Region,
        RouteKey::Technician,
        RouteKey::Agencies,
        RouteKey::Tenant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKey::Dashboard => "dashboard",
            RouteKey::Properties => "properties",
            RouteKey::Jobs => "jobs",
            RouteKey::Contacts => "contacts",
            RouteKey::Reports => "reports",
            RouteKey::Compliance => "compliance",
            RouteKey::Payment => "payment",
            RouteKey::Region => "region",
            RouteKey::Technician => "technician",
            RouteKey::Agencies => "agencies",
            RouteKey::Tenant => "tenant",
        }
    }

    /// Mount path of this feature area, always `/{key}`.
    pub fn path(&self) -> String {
        format!("/{}", self.as_str())
    }

    /// Resolve the feature area a requested path belongs to.
    ///
    /// Only the first segment counts, so `/properties/42/edit` resolves to
    /// `Properties`. Query strings and fragments are ignored. The root path
    /// and unregistered segments yield `None`.
    pub fn from_path(path: &str) -> Option<RouteKey> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segment = path.trim_start_matches('/').split('/').next()?;
        segment.parse().ok()
    }
}

impl FromStr for RouteKey {
    type Err = ConsoleError;

    fn from_str(input: &str) -> Result<RouteKey, Self::Err> {
        RouteKey::ALL
            .into_iter()
            .find(|key| key.as_str() == input)
            .ok_or_else(|| ConsoleError::unknown_route_key(input))
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
