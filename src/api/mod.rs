use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request},
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::envelope::ApiResponse;
use crate::AppState;

pub mod handlers;
pub mod webhook;

/// Routes served under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/get_user_access_token", get(handlers::get_user_access_token))
        .route("/get_sign_parameters", get(handlers::get_sign_parameters))
        .route("/base/records", get(handlers::list_records))
        .route("/base/fields", get(handlers::get_fields))
        .route(
            "/base/record",
            post(handlers::create_record)
                .put(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .route("/base/records/batch_delete", post(handlers::batch_delete_records))
        .route("/message/send", post(handlers::send_message))
        .route("/org/users", get(handlers::list_org_users))
        .route("/webhook", post(webhook::webhook))
        .route("/pusher/config", get(handlers::pusher_config))
}

/// The full application: API routes, health check, 404 envelope, CORS,
/// tracing, and request ids.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api", api_router())
        .method_not_allowed_fallback(fallback_405)
        .fallback(fallback_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(middleware::from_fn(request_id_middleware))
}

/// Any origin, with credentials. A literal `*` cannot be combined with
/// credentials, so the request's origin is mirrored back.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}

async fn fallback_404(method: Method, uri: Uri) -> (StatusCode, Json<ApiResponse<()>>) {
    tracing::debug!(%method, path = uri.path(), "no route");
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::fail(format!("Route not found: {} {}", method, uri.path()))),
    )
}

// Nested routes see a stripped path, so report the one the client sent.
async fn fallback_405(method: Method, OriginalUri(uri): OriginalUri) -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ApiResponse::fail(format!("Method not allowed: {} {}", method, uri.path()))),
    )
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with gateway logs.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
