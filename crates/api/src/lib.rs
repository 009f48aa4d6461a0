//! HTTP host adapter for the tax workspace.
//!
//! Keeps an in-process order book and exposes tax computation, commit and
//! void per order, with structured logging (tracing) and Prometheus
//! metrics. Tax operations on one order are serialized through
//! [`state::OrderLocks`].

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tax_client::{HttpTaxServiceClient, InMemoryTaxService, TransportError};
use tax_engine::TaxService;
use tax_store::InMemoryTaxStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::{AppState, SharedTaxClient};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/line_items", post(routes::orders::add_line_item))
        .route(
            "/orders/{id}/tax",
            get(routes::tax::show).post(routes::tax::compute),
        )
        .route("/orders/{id}/tax/commit", post(routes::tax::commit))
        .route("/orders/{id}/tax/void", post(routes::tax::void))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the tax client the configuration asks for: the HTTP client when a
/// service URL is set, otherwise the in-memory flat-rate service.
pub fn create_tax_client(config: &Config) -> Result<SharedTaxClient, TransportError> {
    match &config.tax_service {
        Some(http) => {
            tracing::info!(base_url = %http.base_url, "using remote tax service");
            Ok(Arc::new(HttpTaxServiceClient::new(http.clone())?))
        }
        None => {
            tracing::warn!("TAX_SERVICE_URL not set; using in-memory tax service");
            Ok(Arc::new(InMemoryTaxService::default()))
        }
    }
}

/// Creates application state around the given tax client.
pub fn create_state(config: &Config, client: SharedTaxClient) -> Arc<AppState> {
    let tax = TaxService::new(config.tax.clone(), InMemoryTaxStore::new(), client);
    Arc::new(AppState::new(tax, config.ship_from.clone()))
}
