//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

pub use routes::create_router;

/// Build the application router with logging and tracing layers
pub fn build_router(pool: PgPool) -> Router {
    create_router()
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}
