use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_short_url_handler, ping_handler, redirect_handler, shorten_batch_handler,
    shorten_handler, unsupported_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    /// Builds the router. A known path hit with the wrong method answers 400.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route(
                "/",
                post(create_short_url_handler).fallback(unsupported_handler),
            )
            .route("/ping", get(ping_handler).fallback(unsupported_handler))
            .route(
                "/api/shorten",
                post(shorten_handler).fallback(unsupported_handler),
            )
            .route(
                "/api/shorten/batch",
                post(shorten_batch_handler).fallback(unsupported_handler),
            )
            .route("/{key}", get(redirect_handler).fallback(unsupported_handler))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CompressionLayer::new())
                    .layer(RequestDecompressionLayer::new()),
            )
            .with_state(state)
    }
}
