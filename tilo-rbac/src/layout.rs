//! Client-side layout checkpoint
//!
//! A zone layout re-checks access after the page loaded, catching role
//! changes the edge checkpoint never saw. It listens to the role store
//! instead of waiting for a page reload.

use crate::guard::{Checkpoint, Decision, RouteGuard};
use crate::session::SessionContext;
use crate::store::RoleStore;
use std::sync::Arc;
use tokio::sync::watch;

/// Re-evaluates the current path whenever the role store publishes.
///
/// Dropping the guard unmounts it: pending notifications are discarded and no
/// stale decision is ever produced.
pub struct LayoutGuard {
    guard: Arc<RouteGuard>,
    path: String,
    sessions: watch::Receiver<SessionContext>,
}

impl LayoutGuard {
    pub fn new(guard: Arc<RouteGuard>, store: &RoleStore, path: &str) -> Self {
        Self {
            guard,
            path: path.to_string(),
            sessions: store.subscribe(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decision for the current path against the latest published session
    pub fn evaluate(&mut self) -> Decision {
        let context = self.sessions.borrow_and_update().clone();
        context.authorize(&self.guard, Checkpoint::ZoneLayout, &self.path)
    }

    /// Client-side navigation to another path
    pub fn navigate(&mut self, path: &str) -> Decision {
        self.path = path.to_string();
        self.evaluate()
    }

    /// Wait for the next role change and re-decide.
    ///
    /// Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Decision> {
        self.sessions.changed().await.ok()?;
        Some(self.evaluate())
    }
}
