pub mod config;
pub mod error;
pub mod metadata;
pub mod relay;
pub mod routes;
pub mod storage;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// The complete application with request tracing, ready to serve.
pub fn app(state: AppState) -> Router {
    routes::router(&state.config)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
