//! Canonical roles and role resolution for Tilo RBAC

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;

/// A canonical, lower-cased role identifier.
///
/// Roles the dashboard knows about get their own variant; anything else is
/// kept verbatim (after normalization) in [`Role::Custom`] and receives an
/// empty capability set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Ceo,
    /// Mobile demo variant of the CEO console; inherits everything `ceo` has.
    MobileCeo,
    Client,
    NewClient,
    Analyst,
    Developer,
    Hr,
    Finance,
    Legal,
    Custom(String),
}

impl Role {
    /// Every role with a built-in meaning, in menu order
    pub const KNOWN: [Role; 10] = [
        Role::Admin,
        Role::Ceo,
        Role::MobileCeo,
        Role::Client,
        Role::NewClient,
        Role::Analyst,
        Role::Developer,
        Role::Hr,
        Role::Finance,
        Role::Legal,
    ];

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Ceo => "ceo",
            Role::MobileCeo => "mobile ceo",
            Role::Client => "client",
            Role::NewClient => "new client",
            Role::Analyst => "analyst",
            Role::Developer => "developer",
            Role::Hr => "hr",
            Role::Finance => "finance",
            Role::Legal => "legal",
            Role::Custom(s) => s,
        }
    }

    /// Whether this role has a built-in meaning
    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Custom(_))
    }
}

impl std::str::FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RoleResolver::normalize(s))
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        RoleResolver::normalize(&s)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        RoleResolver::normalize(s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalization and equivalence rules for roles
pub struct RoleResolver;

impl RoleResolver {
    /// Lower-case and trim a raw role string.
    ///
    /// Unrecognized strings are not rejected; they come back as
    /// [`Role::Custom`] holding the normalized text.
    pub fn normalize(raw: &str) -> Role {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "admin" => Role::Admin,
            "ceo" => Role::Ceo,
            "mobile ceo" => Role::MobileCeo,
            "client" => Role::Client,
            "new client" => Role::NewClient,
            "analyst" => Role::Analyst,
            "developer" => Role::Developer,
            "hr" => Role::Hr,
            "finance" => Role::Finance,
            "legal" => Role::Legal,
            _ => Role::Custom(lowered),
        }
    }

    /// Whether `role` may act as `target`.
    ///
    /// True when the roles are equal, or when `role` is `mobile ceo` and
    /// `target` is `ceo`. The relation is not symmetric.
    pub fn is_equivalent(role: &Role, target: &Role) -> bool {
        role == target || (*target == Role::Ceo && *role == Role::MobileCeo)
    }

    /// Human-readable label used by role switchers and the unauthorized page
    pub fn display_name(role: &Role) -> String {
        match role {
            Role::Admin => "Admin".to_string(),
            Role::Ceo => "CEO".to_string(),
            Role::MobileCeo => "Mobile CEO".to_string(),
            Role::Client => "Client".to_string(),
            Role::NewClient => "New Client".to_string(),
            Role::Analyst => "Analyst".to_string(),
            Role::Developer => "Developer".to_string(),
            Role::Hr => "HR".to_string(),
            Role::Finance => "Finance".to_string(),
            Role::Legal => "Legal".to_string(),
            Role::Custom(s) => s
                .split_whitespace()
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<String>>()
                .join(" "),
        }
    }
}
