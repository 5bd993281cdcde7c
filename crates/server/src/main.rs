//! HTTP entry point.
//!
//! Configuration comes from the environment: `CONCILIA_DB` (SQLite path,
//! default `concilia.db`) and `CONCILIA_ADDR` (bind address, default
//! `127.0.0.1:3414`). Log filtering follows `RUST_LOG`.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

mod error;
mod extract;
mod handlers;
mod router;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_path: PathBuf = std::env::var("CONCILIA_DB")
        .unwrap_or_else(|_| "concilia.db".to_string())
        .into();
    let addr = std::env::var("CONCILIA_ADDR").unwrap_or_else(|_| "127.0.0.1:3414".to_string());

    let pool = concilia_storage::create_pool(&db_path)
        .await
        .expect("failed to open database");

    let app = router::build_router(pool);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    tracing::info!(%addr, db = %db_path.display(), "concilia-server listening");

    axum::serve(listener, app).await.expect("server error");
}
