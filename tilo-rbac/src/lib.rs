//! Role resolution and access control for the Tilo dashboard
//!
//! This crate decides who may see which part of the Tilo organizational
//! dashboard: the admin console, the CEO sub-zone, the client portal and the
//! Tilo assistant.
//!
//! # Components
//!
//! - **RoleStore**: the current role, persisted to the role cookie and a local
//!   store, with publish/subscribe change notification
//! - **RoleResolver**: case-insensitive normalization and the one-way
//!   `mobile ceo` → `ceo` equivalence
//! - **CapabilityPolicy**: static per-role feature flags, menu entries and
//!   restrictions
//! - **RouteGuard**: the single allow/redirect decision used by the edge and
//!   by zone layouts
//! - **ImpersonationOverlay**: admin-only grants that affect client-zone
//!   decisions
//!
//! # Quick Start
//!
//! ```rust
//! use tilo_rbac::prelude::*;
//!
//! let config = RbacConfig::default();
//! let store = RoleStore::in_memory(&config);
//! let guard = RouteGuard::new(&config);
//!
//! store.set("CEO");
//! let context = store.snapshot();
//! let decision = context.authorize(&guard, Checkpoint::Edge, "/admin/ceo/reports");
//! assert!(decision.is_allowed());
//! ```
//!
//! # Capabilities
//!
//! ```rust
//! use tilo_rbac::prelude::*;
//!
//! let policy = CapabilityPolicy::with_defaults();
//! assert!(policy.has_capability(&Role::MobileCeo, Capabilities::VIEW_FINANCIALS));
//! assert!(!policy.has_capability(&Role::Ceo, Capabilities::MOBILE_DEMO));
//! ```

pub mod capabilities;
pub mod config;
pub mod cookie;
pub mod error;
pub mod guard;
pub mod impersonation;
pub mod layout;
pub mod roles;
pub mod session;
pub mod storage;
pub mod store;

pub mod prelude {
    //! Common imports for Tilo RBAC

    pub use crate::capabilities::*;
    pub use crate::config::*;
    pub use crate::cookie::{CookieJar, CookieOptions};
    pub use crate::error::*;
    pub use crate::guard::*;
    pub use crate::impersonation::*;
    pub use crate::layout::LayoutGuard;
    pub use crate::roles::*;
    pub use crate::session::*;
    pub use crate::storage::*;
    pub use crate::store::RoleStore;

    // Common Result type
    pub type Result<T> = std::result::Result<T, RbacError>;
}

// Re-export major components at crate level
pub use error::RbacError;
pub use guard::RouteGuard;
pub use prelude::Result;
pub use store::RoleStore;
