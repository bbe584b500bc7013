//! Response tagging.
//!
//! Whether the logger may read a response body is decided when the response
//! is built, not by inspecting it afterwards. [`JsonResponse`] attaches a
//! [`StructuredBody`] extension holding the serialized bytes it also sends;
//! every other response is opaque and may name itself with [`BodyKind`].

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::Value;

use crate::generalkey;

/// Serialized bytes of a structured response, shared with the body itself.
#[derive(Debug, Clone)]
pub struct StructuredBody(pub Bytes);

/// Type tag logged for an opaque response, e.g. `"StreamingResponse"`.
#[derive(Debug, Clone, Copy)]
pub struct BodyKind(pub &'static str);

/// A JSON response whose bytes are known up front.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    status: StatusCode,
    body: Value,
}

impl JsonResponse {
    pub fn ok(body: Value) -> Self {
        Self::with_status(StatusCode::OK, body)
    }

    pub fn with_status(status: StatusCode, body: Value) -> Self {
        JsonResponse { status, body }
    }
}

impl IntoResponse for JsonResponse {
    fn into_response(self) -> Response {
        let bytes = match serde_json::to_vec(&self.body) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to serialize response: {err}"),
                )
                    .into_response();
            }
        };

        let mut resp = Response::new(Body::from(bytes.clone()));
        *resp.status_mut() = self.status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(generalkey::JSON_CONTENT_TYPE),
        );
        resp.extensions_mut().insert(StructuredBody(bytes));
        resp
    }
}

/// Wrap an opaque body into a response tagged with `kind`.
pub fn opaque_response(status: StatusCode, kind: &'static str, body: Body) -> Response {
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp.extensions_mut().insert(BodyKind(kind));
    resp
}
