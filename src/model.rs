use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, FromRequestParts, MatchedPath, RawPathParams};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Response, StatusCode, header};
use bytes::Bytes;
use chrono::{DateTime, Local};
use serde_json::{Value, json};

use crate::body::BodyCapture;
use crate::generalkey;
use crate::response::{BodyKind, StructuredBody};
use crate::util::{full_url, header_to_map, pairs_to_map, query_pairs};

/// Read-only snapshot of an inbound request, taken when the middleware
/// receives it.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub client_host: Option<IpAddr>,
    pub query_params: Vec<(String, String)>,
    /// Empty unless the request matched a route with parameters.
    pub path_params: Vec<(String, String)>,
    pub matched_path: Option<String>,
}

impl RequestDescriptor {
    pub fn from_parts(parts: &Parts, path_params: Vec<(String, String)>) -> Self {
        RequestDescriptor {
            method: parts.method.clone(),
            url: full_url(&parts.uri, &parts.headers),
            headers: parts.headers.clone(),
            client_host: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
            query_params: query_pairs(&parts.uri),
            path_params,
            matched_path: parts
                .extensions
                .get::<MatchedPath>()
                .map(|p| p.as_str().to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "method": self.method.as_str(),
            "url": self.url,
            "client_host": self.client_host.map(|ip| ip.to_string()),
            "headers": header_to_map(&self.headers),
            "query_params": pairs_to_map(&self.query_params),
            "path_params": pairs_to_map(&self.path_params),
        })
    }
}

/// Path parameters of the matched route, empty when there are none.
pub(crate) async fn path_params(parts: &mut Parts) -> Vec<(String, String)> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Handlers can extract the descriptor directly. Behind the logging layer the
/// snapshot taken by the middleware is reused.
impl<S> FromRequestParts<S> for RequestDescriptor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<Arc<TransactionContext>>() {
            return Ok(ctx.request.clone());
        }

        let params = path_params(parts).await;
        Ok(RequestDescriptor::from_parts(parts, params))
    }
}

/// Per-request state published in request extensions by the middleware.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub request: RequestDescriptor,
    /// `None` when the capture policy skipped the body.
    pub body: Option<BodyCapture>,
}

/// How much of a response body the logger may look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Serialized bytes known at construction time.
    Structured(Bytes),
    /// Streamed or otherwise not inspectable; never consumed for logging.
    Opaque {
        kind: &'static str,
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl ResponseDescriptor {
    /// Describe a response without touching its body.
    pub fn from_response<B>(resp: &Response<B>) -> Self {
        let body = match resp.extensions().get::<StructuredBody>() {
            Some(StructuredBody(bytes)) => ResponseBody::Structured(bytes.clone()),
            None => ResponseBody::Opaque {
                kind: resp
                    .extensions()
                    .get::<BodyKind>()
                    .map(|BodyKind(kind)| *kind)
                    .unwrap_or(generalkey::DEFAULT_BODY_KIND),
                content_type: resp
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            },
        };

        ResponseDescriptor {
            status: resp.status(),
            body,
        }
    }
}

/// Wall-clock start plus monotonic elapsed time of one transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionTiming {
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl TransactionTiming {
    pub fn since(started_at: DateTime<Local>, start: Instant) -> Self {
        TransactionTiming {
            started_at,
            elapsed: start.elapsed(),
        }
    }

    /// Elapsed seconds with four decimals, e.g. `0.0123`.
    pub fn elapsed_secs(&self) -> String {
        format!("{:.4}", self.elapsed.as_secs_f64())
    }
}
