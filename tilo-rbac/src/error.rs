//! Error types for Tilo RBAC

use thiserror::Error;

/// Errors that can occur in RBAC operations
///
/// An unrecognized role is not an error: it resolves to a custom role with an
/// empty capability set.
#[derive(Error, Debug)]
pub enum RbacError {
    #[error("Impersonation requires the admin role (session role: {role})")]
    NotAdmin { role: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Role '{role}' holds capability '{capability}' together with its restriction")]
    ConflictingRestriction { role: String, capability: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
