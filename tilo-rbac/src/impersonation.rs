//! Admin impersonation grants

use crate::error::RbacError;
use crate::roles::{Role, RoleResolver};
use crate::store::RoleStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

type RbacResult<T> = std::result::Result<T, RbacError>;

/// An admin session acting as another role.
///
/// Grants only influence client-zone decisions; they never widen access to
/// the admin zone or the CEO sub-zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationGrant {
    pub id: Uuid,
    pub acting_role: Role,
    pub target_role: Role,
    pub issued_at: DateTime<Utc>,
}

impl ImpersonationGrant {
    /// A fresh grant issued by an admin for `target_role`
    pub fn new(target_role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            acting_role: Role::Admin,
            target_role,
            issued_at: Utc::now(),
        }
    }

    /// Grants share the role cookie's lifetime
    pub fn is_expired(&self, lifetime_seconds: u64, now: DateTime<Utc>) -> bool {
        let age = (now - self.issued_at).num_seconds();
        age < 0 || age as u64 >= lifetime_seconds
    }
}

/// Begin, end and inspect impersonation on top of a [`RoleStore`]
pub struct ImpersonationOverlay<'a> {
    store: &'a RoleStore,
}

impl<'a> ImpersonationOverlay<'a> {
    pub fn new(store: &'a RoleStore) -> Self {
        Self { store }
    }

    /// Start acting as `target_role`.
    ///
    /// Fails with [`RbacError::NotAdmin`] unless the session role is exactly
    /// `admin`; equivalent roles do not carry impersonation rights.
    pub fn begin(&self, target_role: &str) -> RbacResult<ImpersonationGrant> {
        let target = RoleResolver::normalize(target_role);
        match self.store.issue_grant(target) {
            Ok(grant) => {
                info!(
                    grant = %grant.id,
                    target = %grant.target_role,
                    "Impersonation started"
                );
                Ok(grant)
            }
            Err(e) => {
                warn!(target = %target_role, error = %e, "Impersonation rejected");
                Err(e)
            }
        }
    }

    /// Stop impersonating; a no-op without an active grant
    pub fn end(&self) {
        if let Some(grant) = self.active_grant() {
            info!(grant = %grant.id, "Impersonation ended");
        }
        self.store.revoke_grant();
    }

    /// The grant currently in effect, if any
    pub fn active_grant(&self) -> Option<ImpersonationGrant> {
        self.store.snapshot().grant
    }
}
