//! Dashboard server: routes, shared state and the HTTP listener

use crate::builder::DashboardServerBuilder;
use crate::error::Result;
use crate::handlers;
use crate::middleware::edge_guard;
use axum::Router;
use axum::http::{HeaderMap, header};
use axum::routing::{get, post};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tilo_rbac::prelude::*;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// State shared by every request
pub struct AppState {
    pub config: RbacConfig,
    pub guard: Arc<RouteGuard>,
    pub policy: Arc<CapabilityPolicy>,
    /// Backend of the persistent local store, partitioned per client
    pub local: Arc<dyn KeyValueStorage>,
    client_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AppState {
    pub fn new(
        config: RbacConfig,
        policy: CapabilityPolicy,
        local: Arc<dyn KeyValueStorage>,
    ) -> Self {
        Self {
            guard: Arc::new(RouteGuard::new(&config)),
            policy: Arc::new(policy),
            local,
            config,
            client_locks: Mutex::new(HashMap::new()),
        }
    }

    /// A request-scoped role store over the request cookies.
    ///
    /// The local store is the partition named by the client cookie. A request
    /// without one gets a fresh, empty partition, and the new client id is
    /// queued on the returned jar, which collects the `Set-Cookie` headers
    /// for the response.
    pub fn store_for(&self, headers: &HeaderMap) -> (RoleStore, Arc<CookieJar>) {
        let cookie_header = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let jar = Arc::new(CookieJar::from_header(
            &cookie_header,
            CookieOptions::from(&self.config.cookie),
        ));

        let client_cookie = &self.config.cookie.client_cookie;
        let client_id = match jar.get(client_cookie) {
            Ok(Some(id)) if !id.trim().is_empty() => id,
            _ => {
                let id = Uuid::new_v4().to_string();
                if let Err(e) = jar.set(client_cookie, &id) {
                    warn!(error = %e, "Failed to queue client cookie");
                }
                id
            }
        };

        let local = Arc::new(ScopedStorage::new(self.local.clone(), &client_id));
        let store = RoleStore::new(&self.config, jar.clone(), local)
            .with_lock(self.client_lock(&client_id));
        (store, jar)
    }

    /// The lock shared by every in-flight request of one client
    fn client_lock(&self, client_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .client_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(client_id.to_string()).or_default().clone()
    }
}

/// The dashboard's access-control front door
pub struct DashboardServer {
    state: Arc<AppState>,
    pages: Router,
    bind_address: String,
    port: u16,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DashboardServer {
    /// Create a new server builder
    pub fn builder() -> DashboardServerBuilder {
        DashboardServerBuilder::new()
    }

    pub(crate) fn new(
        state: AppState,
        pages: Router,
        bind_address: String,
        port: u16,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            state: Arc::new(state),
            pages,
            bind_address,
            port,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The full router: session endpoints, pages, edge checkpoint, tracing
    pub fn router(&self) -> Router {
        let state = self.state.clone();
        let unauthorized_path = state.config.routes.unauthorized_path.clone();

        Router::new()
            .route(&unauthorized_path, get(handlers::unauthorized))
            .route("/session", get(handlers::current_session))
            .route("/session/role", post(handlers::switch_role))
            .route("/session/logout", post(handlers::logout))
            .route(
                "/session/impersonate",
                post(handlers::begin_impersonation).delete(handlers::end_impersonation),
            )
            .fallback(handlers::page)
            .with_state(state.clone())
            .merge(self.pages.clone())
            .layer(axum::middleware::from_fn_with_state(state, edge_guard))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on the configured address until [`DashboardServer::shutdown`]
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.bind_address, self.port);
        self.run_http(&addr).await
    }

    /// Serve on `addr` until [`DashboardServer::shutdown`]
    pub async fn run_http(&self, addr: &str) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Dashboard server listening on {}", addr);

        let mut shutdown_rx = self.shutdown_rx.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("Dashboard server stopped");
        Ok(())
    }

    /// Ask a running server to stop accepting connections
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}
