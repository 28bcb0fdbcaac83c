use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The authenticated user's category, assigned by the authentication
/// collaborator at login.
///
/// Role identifiers that the console does not know are kept verbatim in
/// `Unrecognized` rather than rejected, so a session carrying one simply has
/// no screens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    SuperUser,
    Agency,
    Staff,
    Tenant,
    TeamMember,
    Unrecognized(UnrecognizedRole),
}

/// Raw identifier of a role the console does not know. Only parsing
/// produces one, so it never spells a known role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnrecognizedRole(String);

impl UnrecognizedRole {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Role {
    /// Every role the console ships a configuration for.
    pub const KNOWN: [Role; 5] = [
        Role::SuperUser,
        Role::Agency,
        Role::Staff,
        Role::Tenant,
        Role::TeamMember,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Role::SuperUser => "super_user",
            Role::Agency => "agency",
            Role::Staff => "staff",
            Role::Tenant => "tenant",
            Role::TeamMember => "team_member",
            Role::Unrecognized(raw) => raw.as_str(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Unrecognized(_))
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(input: &str) -> Result<Role, Self::Err> {
        let normalized = input.trim().to_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "super_user" | "superuser" | "admin" => Role::SuperUser,
            "agency" | "property_manager" => Role::Agency,
            "staff" => Role::Staff,
            "tenant" => Role::Tenant,
            "team_member" => Role::TeamMember,
            _ => Role::Unrecognized(UnrecognizedRole(input.trim().to_string())),
        })
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(role) => role,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::from(raw.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
