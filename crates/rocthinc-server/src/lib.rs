//! HTTP surface: the billing webhook, license lookups, page export, and
//! a health probe.

pub mod config;
pub mod execute;
pub mod export;
pub mod handlers;
pub mod signature;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use execute::{Dispatcher, ExecuteError};
pub use handlers::AppState;

/// Build the router. Kept separate from `main` so tests can drive the
/// handlers without binding a socket.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/billing", post(handlers::billing_webhook))
        .route(
            "/export",
            post(handlers::export_page).get(handlers::export_page_query),
        )
        .route("/licenses/:email", get(handlers::get_license))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
