//! Dashboard Server Example
//!
//! Runs the edge checkpoint in front of a few placeholder pages.
//!
//! ```text
//! cargo run -p dashboard-server -- [config.json] [local-store.json]
//! ```
//!
//! Without a config file the development defaults are used. Switch roles
//! with `POST /session/role` and a body such as `{"role": "ceo"}`.

use anyhow::Result;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tilo_server::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            info!("Loading access configuration from {}", path);
            RbacConfig::from_file(&path)?
        }
        None => RbacConfig::development(),
    };
    let local_path = args.next().unwrap_or_else(|| "tilo-local-store.json".to_string());

    let pages = Router::new()
        .route("/admin/dashboard", get(|| async { "Admin dashboard" }))
        .route("/admin/ceo/reports", get(|| async { "CEO reports" }))
        .route("/client/home", get(|| async { "Client home" }))
        .route("/tilo", get(|| async { "Tilo assistant" }));

    let server = Arc::new(
        DashboardServer::builder()
            .with_config(config)
            .with_local_store(Arc::new(FileStorage::new(&local_path)))
            .with_pages(pages)
            .with_bind_address("127.0.0.1")
            .with_port(3000)
            .build()?,
    );

    let running = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            running.shutdown();
        }
    });

    println!("Dashboard server on http://127.0.0.1:3000");
    println!("Local store persisted to {}", local_path);
    server.run().await?;

    Ok(())
}
