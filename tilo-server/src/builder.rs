//! Builder pattern for creating dashboard servers.
//!
//! # Examples
//!
//! ```rust
//! use tilo_server::prelude::*;
//!
//! let server = DashboardServer::builder()
//!     .with_config(RbacConfig::development())
//!     .with_port(8080)
//!     .build()
//!     .unwrap();
//! let _app = server.router();
//! ```

use crate::error::Result;
use crate::server::{AppState, DashboardServer};
use axum::Router;
use std::sync::Arc;
use tilo_rbac::prelude::*;

/// Builder for [`DashboardServer`]
pub struct DashboardServerBuilder {
    config: RbacConfig,
    policy: Option<CapabilityPolicy>,
    local: Option<Arc<dyn KeyValueStorage>>,
    pages: Router,
    bind_address: String,
    port: u16,
}

impl DashboardServerBuilder {
    pub fn new() -> Self {
        Self {
            config: RbacConfig::default(),
            policy: None,
            local: None,
            pages: Router::new(),
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
        }
    }

    pub fn with_config(mut self, config: RbacConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a policy instead of the one derived from the config
    pub fn with_policy(mut self, policy: CapabilityPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Persistent local store; defaults to in-memory storage
    pub fn with_local_store(mut self, local: Arc<dyn KeyValueStorage>) -> Self {
        self.local = Some(local);
        self
    }

    /// Page routes served behind the edge checkpoint
    pub fn with_pages(mut self, pages: Router) -> Self {
        self.pages = self.pages.merge(pages);
        self
    }

    pub fn with_bind_address(mut self, address: &str) -> Self {
        self.bind_address = address.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn build(self) -> Result<DashboardServer> {
        self.config.validate()?;

        let policy = match self.policy {
            Some(policy) => policy,
            None => CapabilityPolicy::from_config(&self.config)?,
        };
        let local: Arc<dyn KeyValueStorage> = match self.local {
            Some(local) => local,
            None => Arc::new(MemoryStorage::new()),
        };

        let state = AppState::new(self.config, policy, local);
        Ok(DashboardServer::new(
            state,
            self.pages,
            self.bind_address,
            self.port,
        ))
    }
}

impl Default for DashboardServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
