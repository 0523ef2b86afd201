//! REST surface: generic CRUD over every registered table under `/api/:table`.

mod error;
mod handlers;
mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    // The site frontend is served from another origin.
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/:table",
            get(handlers::list).post(handlers::insert).delete(handlers::delete_by_filter),
        )
        .route("/api/:table/upsert", post(handlers::upsert))
        .route(
            "/api/:table/:id",
            get(handlers::get_one).patch(handlers::update).delete(handlers::delete_one),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .with_state(state)
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
///
/// # Errors
/// Returns an error if the listener fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("listening on {addr}");
    }
    axum::serve(listener, build_router(state)).with_graceful_shutdown(shutdown).await?;
    log::info!("server stopped");
    Ok(())
}
