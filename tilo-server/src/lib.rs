//! # Tilo Server
//!
//! The network-edge checkpoint for the Tilo dashboard: an axum router that
//! runs every request through the shared [`tilo_rbac::RouteGuard`] before any
//! page is served, plus the session endpoints used by the role switcher,
//! logout and admin impersonation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tilo_server::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = DashboardServer::builder()
//!         .with_config(RbacConfig::default())
//!         .with_bind_address("0.0.0.0")
//!         .with_port(3000)
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use builder::*;
pub use error::{Result, ServerError};
pub use server::*;

/// Common imports for dashboard server development
pub mod prelude {
    pub use crate::builder::*;
    pub use crate::error::{Result, ServerError};
    pub use crate::handlers::{ImpersonateRequest, PageView, RoleSwitchRequest, SessionView};
    pub use crate::middleware::edge_guard;
    pub use crate::server::*;
    pub use tilo_rbac::prelude::{
        Capabilities, CapabilityPolicy, Checkpoint, Decision, FileStorage, KeyValueStorage,
        MemoryStorage, RbacConfig, RbacError, Role, RoleSession, RoleSource, RouteClass,
        RouteGuard, ScopedStorage, SessionContext, UnauthorizedNotice,
    };

    pub use tokio;
}
