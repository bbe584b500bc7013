//! Transaction logging middleware for Axum.
//!
//! - [`DiagLogLayer`] (Tower Layer), installed once around every route
//! - [`TransactionContext`] stored in request extensions
//!
//! Per request the middleware walks [`Stage`]s in order: it snapshots and
//! logs the request (buffering the body when the [`CapturePolicy`] says so),
//! forwards it with a replayed body, times the handler, logs the response
//! without consuming opaque bodies, and returns the response untouched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use bytes::Bytes;
use chrono::{DateTime, Local};
use tower::{Layer, Service};

use crate::body::{BodyCapture, CaptureDecision, CapturePolicy, buffer_body};
use crate::error::CaptureError;
use crate::logger::LogSink;
use crate::model::{
    RequestDescriptor, ResponseDescriptor, TransactionContext, TransactionTiming, path_params,
};
use crate::transaction::TransactionLogger;

/// Main layer attached to the Axum router.
#[derive(Clone)]
pub struct DiagLogLayer {
    logger: TransactionLogger,
    policy: CapturePolicy,
}

impl DiagLogLayer {
    pub fn new(sink: impl LogSink) -> Self {
        Self::from_logger(TransactionLogger::new(sink))
    }

    pub fn from_logger(logger: TransactionLogger) -> Self {
        DiagLogLayer {
            logger,
            policy: CapturePolicy::default(),
        }
    }

    pub fn capture_policy(mut self, policy: CapturePolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<S> Layer<S> for DiagLogLayer {
    type Service = DiagLogMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DiagLogMiddleware {
            inner,
            logger: self.logger.clone(),
            policy: self.policy,
        }
    }
}

#[derive(Clone)]
pub struct DiagLogMiddleware<S> {
    inner: S,
    logger: TransactionLogger,
    policy: CapturePolicy,
}

/// Lifecycle of one transaction. Strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    RequestLogged,
    Forwarded,
    ResponseObtained,
    ResponseLogged,
    Returned,
}

/// Tracks the stage of an in-flight transaction and reports it if the
/// future is dropped before reaching [`Stage::Returned`].
struct InFlight {
    logger: TransactionLogger,
    method: Method,
    url: String,
    stage: Stage,
    handler_failed: bool,
}

impl InFlight {
    fn new(logger: &TransactionLogger, request: &RequestDescriptor) -> Self {
        InFlight {
            logger: logger.clone(),
            method: request.method.clone(),
            url: request.url.clone(),
            stage: Stage::Received,
            handler_failed: false,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "{next:?} after {:?}", self.stage);
        self.stage = next;
    }

    /// The handler returned an error; it is propagated, not a cancellation.
    fn handler_failed(&mut self) {
        self.handler_failed = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.stage != Stage::Returned && !self.handler_failed {
            self.logger.log_cancelled(&self.method, &self.url);
        }
    }
}

impl<S> Service<Request<Body>> for DiagLogMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Keep the service that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let logger = self.logger.clone();
        let policy = self.policy;

        Box::pin(async move {
            let start_instant = Instant::now();
            let started_at: DateTime<Local> = Local::now();

            let (mut parts, body) = req.into_parts();
            let params = path_params(&mut parts).await;
            let request = RequestDescriptor::from_parts(&parts, params);
            let mut in_flight = InFlight::new(&logger, &request);

            let decision = policy.decide(&parts.method, &parts.headers, &body);
            let (body, capture) = match decision {
                CaptureDecision::Read => {
                    let capture = capture_or_partial(body).await;
                    (capture.replay(), Some(capture))
                }
                CaptureDecision::Empty => (body, Some(BodyCapture::empty())),
                CaptureDecision::Skip => (body, None),
            };

            logger.log_request(&request, capture.as_ref().map(BodyCapture::classification));
            in_flight.advance(Stage::RequestLogged);

            parts.extensions.insert(Arc::new(TransactionContext {
                request,
                body: capture,
            }));
            let req_for_inner = Request::from_parts(parts, body);

            in_flight.advance(Stage::Forwarded);
            let resp = match inner.call(req_for_inner).await {
                Ok(resp) => resp,
                Err(err) => {
                    in_flight.handler_failed();
                    return Err(err);
                }
            };
            let timing = TransactionTiming::since(started_at, start_instant);
            in_flight.advance(Stage::ResponseObtained);

            logger.log_response(&ResponseDescriptor::from_response(&resp), &timing);
            in_flight.advance(Stage::ResponseLogged);

            in_flight.advance(Stage::Returned);
            Ok(resp)
        })
    }
}

/// Buffer the body; on a read failure keep whatever arrived.
async fn capture_or_partial(body: Body) -> BodyCapture {
    match buffer_body(body).await {
        Ok(bytes) => BodyCapture::new(bytes),
        Err(err) => {
            let partial = match &err {
                CaptureError::StreamRead { partial, .. } => partial.clone(),
                _ => Bytes::new(),
            };
            BodyCapture::failed(partial, &err)
        }
    }
}
