use super::handlers;
use super::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 建立應用程式路由
///
/// - `GET  /health`
/// - `POST /api/upload-design` (multipart)
/// - `POST /api/source-vendors`
/// - `POST /api/procurement-plan`, `POST /api/procurement-plan/adjust`
/// - `POST /api/rfq`
/// - `POST /api/send-email`
/// - `POST /api/execute-payment`
/// - `GET  /api/orders`, `GET /api/orders/export`, `GET /api/orders/{id}`
pub fn create_router(state: Arc<AppState>) -> Router {
    // 前端在其他 port 上開發，放寬 CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // multipart 還有邊界與標頭，多留一點空間
    let body_limit = state.config.server.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/upload-design", post(handlers::upload_design))
        .route("/api/source-vendors", post(handlers::source_vendors))
        .route("/api/procurement-plan", post(handlers::procurement_plan))
        .route("/api/procurement-plan/adjust", post(handlers::adjust_plan))
        .route("/api/rfq", post(handlers::rfq))
        .route("/api/send-email", post(handlers::send_email))
        .route("/api/execute-payment", post(handlers::execute_payment))
        .route("/api/orders", get(handlers::list_orders))
        .route("/api/orders/export", get(handlers::export_orders))
        .route("/api/orders/{id}", get(handlers::get_order))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
