//! HTTP API server with observability for the reservation service.
//!
//! Provides REST endpoints for the reservation lifecycle, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use booking::{InMemoryPaymentGateway, PaymentGateway, ReservationLifecycleService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryReservationStore, ReservationStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Lifecycle service over type-erased store and gateway, chosen at start-up.
pub type ReservationService =
    ReservationLifecycleService<Arc<dyn ReservationStore>, Arc<dyn PaymentGateway>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub service: Arc<ReservationService>,
}

impl AppState {
    pub fn new(service: Arc<ReservationService>) -> Self {
        Self { service }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    use routes::reservations;

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health/live", get(routes::health::live))
        .route("/health/ready", get(routes::health::ready))
        .route(
            "/reservations",
            get(reservations::list).post(reservations::create),
        )
        .route("/reservations/upcoming", get(reservations::upcoming))
        .route("/reservations/range", get(reservations::by_date_range))
        .route("/reservations/status/{status}", get(reservations::by_status))
        .route(
            "/reservations/{id}",
            get(reservations::get)
                .put(reservations::update)
                .delete(reservations::delete),
        )
        .route("/reservations/{id}/status", patch(reservations::update_status))
        .route("/reservations/{id}/cancel", post(reservations::cancel))
        .route("/reservations/{id}/confirm", post(reservations::confirm))
        .route("/reservations/{id}/check-in", post(reservations::check_in))
        .route("/reservations/{id}/check-out", post(reservations::check_out))
        .route("/reservations/{id}/complete", post(reservations::complete))
        .route("/reservations/{id}/reject", post(reservations::reject))
        .route(
            "/customers/{id}/reservations",
            get(reservations::by_customer),
        )
        .route(
            "/properties/{id}/reservations",
            get(reservations::by_property),
        )
        .route(
            "/organizations/{id}/reservations",
            get(reservations::by_organization),
        )
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

/// Creates application state backed by the in-memory store and gateway.
///
/// Used for local runs without infrastructure and by the API tests.
pub fn create_default_state() -> (Arc<AppState>, InMemoryReservationStore, InMemoryPaymentGateway)
{
    let store = InMemoryReservationStore::new();
    let gateway = InMemoryPaymentGateway::new();
    let service = ReservationLifecycleService::new(
        Arc::new(store.clone()) as Arc<dyn ReservationStore>,
        Arc::new(gateway.clone()) as Arc<dyn PaymentGateway>,
    );
    (Arc::new(AppState::new(Arc::new(service))), store, gateway)
}
