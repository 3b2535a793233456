//! Role sessions and the per-navigation session context

use crate::capabilities::{CapabilityPolicy, CapabilitySet};
use crate::guard::{Checkpoint, Decision, RouteGuard};
use crate::impersonation::ImpersonationGrant;
use crate::roles::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session's role was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleSource {
    /// The edge-visible role cookie
    Cookie,
    /// The persistent local store
    LocalStore,
    /// No location held a role
    Default,
}

impl fmt::Display for RoleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleSource::Cookie => write!(f, "cookie"),
            RoleSource::LocalStore => write!(f, "local-store"),
            RoleSource::Default => write!(f, "default"),
        }
    }
}

/// The materialized role plus its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSession {
    pub role: Role,
    pub source: RoleSource,
}

impl RoleSession {
    pub fn new(role: Role, source: RoleSource) -> Self {
        Self { role, source }
    }
}

/// Everything an access decision needs, read once from the role store.
///
/// Built at the start of a request or navigation and passed to the guard and
/// the capability policy instead of letting each consumer read storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session: RoleSession,
    /// Active impersonation grant; only ever present for admin sessions
    pub grant: Option<ImpersonationGrant>,
    pub mobile_demo: bool,
}

impl SessionContext {
    pub fn role(&self) -> &Role {
        &self.session.role
    }

    /// Decide access to `path` at the given checkpoint
    pub fn authorize(&self, guard: &RouteGuard, checkpoint: Checkpoint, path: &str) -> Decision {
        guard.check(checkpoint, path, self.role(), self.grant.as_ref())
    }

    pub fn capabilities(&self, policy: &CapabilityPolicy) -> CapabilitySet {
        policy.capabilities_for(self.role())
    }
}
