//! # Tilo - Role access control for the Tilo organizational dashboard
//!
//! This crate re-exports the functionality of the constituent crates:
//! - `tilo-rbac`: Role store, role resolution, capability policy, route guard
//!   and impersonation
//! - `tilo-server`: The axum edge checkpoint and session endpoints

pub use tilo_rbac as rbac;
pub use tilo_server as server;

/// Re-export commonly used items
pub mod prelude {
    #[allow(unused_imports)]
    pub use crate::rbac::prelude::*;
    pub use crate::server::{DashboardServer, DashboardServerBuilder, ServerError};
}
