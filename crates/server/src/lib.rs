pub mod analysis;
pub mod clients;
pub mod config;
pub mod error;
pub mod routes;
pub mod stockfish;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clients::pgn_source::PgnSource;
use crate::config::Config;

/// Build the application router with its shared state attached.
pub fn build_router(config: Config, source: PgnSource) -> Router {
    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/analyze", post(routes::analyze::analyze))
        // Shared state
        .layer(Extension(config))
        .layer(Extension(source))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
