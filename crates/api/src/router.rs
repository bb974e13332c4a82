//! Route table and middleware stack

use crate::handlers;
use crate::middleware::{metrics::track_metrics, rate_limit};
use crate::AppState;
use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    middleware,
    routing::{delete, get, put},
    BoxError, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_timeout))
        .timeout(state.config.request_timeout());

    let api_routes = Router::new()
        // Scheduler trigger (no auth)
        .route("/send-notifications", get(handlers::notifications::send_notifications))
        // Properties
        .route(
            "/properties",
            get(handlers::properties::list_properties).post(handlers::properties::create_property),
        )
        .route(
            "/properties/{id}",
            get(handlers::properties::get_property)
                .put(handlers::properties::update_property)
                .delete(handlers::properties::delete_property),
        )
        .route("/properties/{id}/vacant-units", get(handlers::properties::unit_occupancy))
        // Tenants
        .route(
            "/tenants",
            get(handlers::tenants::list_tenants).post(handlers::tenants::create_tenant),
        )
        .route(
            "/tenants/{id}",
            get(handlers::tenants::get_tenant)
                .put(handlers::tenants::update_tenant)
                .delete(handlers::tenants::delete_tenant),
        )
        // Payments
        .route(
            "/payments",
            get(handlers::payments::list_payments).post(handlers::payments::record_payment),
        )
        .route(
            "/payments/{id}",
            get(handlers::payments::get_payment).put(handlers::payments::update_payment),
        )
        .route("/payments/{id}/receipt.pdf", get(handlers::payments::receipt_pdf))
        // Reports
        .route("/reports/monthly", get(handlers::reports::monthly_report))
        .route("/reports/monthly.pdf", get(handlers::reports::monthly_report_pdf))
        .route("/dashboard", get(handlers::reports::dashboard))
        // Push devices
        .route("/devices/tokens", axum::routing::post(handlers::devices::register_token))
        .route("/devices/tokens/{token}", delete(handlers::devices::remove_token))
        // Landlords
        .route(
            "/landlords",
            get(handlers::landlords::list_landlords).post(handlers::landlords::create_landlord),
        )
        .route(
            "/landlords/{id}",
            put(handlers::landlords::update_landlord).delete(handlers::landlords::delete_landlord),
        );

    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(middleware::from_fn(track_metrics));

    let limits = &state.config.rate_limit;
    if limits.enabled {
        let limiter = rate_limit::create_rate_limiter(limits.requests_per_second, limits.burst);
        app = app.layer(middleware::from_fn_with_state(limiter, rate_limit::rate_limit_middleware));
    }

    app.layer(timeout)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

async fn handle_timeout(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Unhandled internal error: {}", err))
    }
}
