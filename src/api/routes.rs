//! Axum router wiring: a flat `Router::new().route(...)` list per concern,
//! `.with_state(..)`, then outer `tower` layers (CORS, request logging)
//! applied bottom-to-top.

use crate::api::handlers::{admin, markets, orders, positions, session};
use crate::api::state::AppState;
use crate::metrics;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn metrics_endpoint(handle: axum::extract::Extension<metrics::PrometheusHandle>) -> String {
    handle.0.render()
}

async fn fallback() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "NotFound", "message": "no such route" })))
}

pub fn build_router(state: AppState, prometheus_handle: metrics::PrometheusHandle) -> Router {
    let gateway_routes = Router::new()
        .route("/orders", post(orders::submit_order))
        .route("/orders/cancel", post(orders::cancel_order))
        .route("/orders/modify", post(orders::modify_order))
        .route("/session/init", post(session::init_session))
        .route("/session/revoke", post(session::revoke_session))
        .route("/markets", get(markets::list_markets))
        .route("/markets/:symbol/book", get(markets::market_book))
        .route("/positions/:trader", get(positions::get_positions))
        .with_state(state.clone());

    // Operator/admin surface: JWT bearer-gated, RBAC-checked per handler.
    // Distinct auth scheme from the gateway routes above, which verify
    // EIP-712 signatures instead.
    let admin_routes = Router::new()
        .route("/admin/markets/:symbol/pause", post(admin::pause_market))
        .route("/admin/markets/:symbol/resume", post(admin::resume_market))
        .route("/admin/signers", post(admin::set_signer_enabled))
        .route("/admin/kill-switch", post(admin::set_kill_switch))
        .route_layer(from_fn_with_state(state.jwt_handler.clone(), crate::auth::auth_middleware))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(gateway_routes)
        .merge(admin_routes)
        .fallback(fallback)
        .layer(axum::Extension(prometheus_handle))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
