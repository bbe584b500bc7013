//! Diagnostic endpoints served by the `diaglog` binary.

use axum::Router;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use bytes::Bytes;
use chrono::{Local, SecondsFormat};
use serde_json::{Value, json};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::axum_middleware::DiagLogLayer;
use crate::config::{Config, is_wildcard};
use crate::logger::LogSink;
use crate::model::RequestDescriptor;
use crate::response::JsonResponse;
use crate::util::header_to_map;

/// Routes wrapped in CORS and, outermost, the transaction logging layer.
pub fn build_app(cfg: &Config, sink: impl LogSink) -> Router {
    let diag = DiagLogLayer::new(sink).capture_policy(cfg.capture_policy);

    routes().layer(cors_layer(cfg)).layer(diag)
}

pub fn routes() -> Router {
    Router::new()
        .route("/test", get(test_connection))
        .route("/echo", post(echo_content))
        .route("/headers", get(get_headers))
        .route("/info", get(get_request_info))
        .route("/info/{id}", get(get_request_info))
}

/// CORS policy from config.
///
/// A wildcard mirrors the request's origin, method or headers back, which
/// keeps credentialed requests allowed.
pub fn cors_layer(cfg: &Config) -> CorsLayer {
    let origins = if is_wildcard(&cfg.cors_origins) {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            cfg.cors_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    let methods = if is_wildcard(&cfg.cors_methods) {
        AllowMethods::mirror_request()
    } else {
        AllowMethods::list(
            cfg.cors_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok()),
        )
    };

    let headers = if is_wildcard(&cfg.cors_headers) {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(
            cfg.cors_headers
                .iter()
                .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}

fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Basic connectivity check.
pub async fn test_connection() -> JsonResponse {
    JsonResponse::ok(json!({
        "status": "success",
        "message": "Connection successful",
        "timestamp": timestamp(),
    }))
}

/// Echo the JSON body back. Reads the body stream, so behind the logging
/// layer it observes the replayed bytes.
pub async fn echo_content(body: Bytes) -> JsonResponse {
    match serde_json::from_slice::<Value>(&body) {
        Ok(data) => JsonResponse::ok(json!({
            "status": "success",
            "received_data": data,
            "timestamp": timestamp(),
        })),
        Err(_) => JsonResponse::with_status(
            StatusCode::BAD_REQUEST,
            json!({
                "status": "error",
                "message": "Invalid JSON format",
                "timestamp": timestamp(),
            }),
        ),
    }
}

pub async fn get_headers(headers: HeaderMap) -> JsonResponse {
    JsonResponse::ok(json!({
        "status": "success",
        "headers": header_to_map(&headers),
        "timestamp": timestamp(),
    }))
}

pub async fn get_request_info(request: RequestDescriptor) -> JsonResponse {
    JsonResponse::ok(json!({
        "status": "success",
        "request_info": request.to_json(),
        "timestamp": timestamp(),
    }))
}
