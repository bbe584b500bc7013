//! Turns request/response descriptors into log records.
//!
//! Every method here returns `()`: a failing sink is reported once more as an
//! error record and then to stderr, and never reaches the request path.

use std::sync::Arc;

use axum::http::Method;
use chrono::SecondsFormat;
use serde_json::Value;

use crate::classify::BodyClassification;
use crate::error::CaptureError;
use crate::logger::{Level, LogRecord, LogSink};
use crate::model::{RequestDescriptor, ResponseBody, ResponseDescriptor, TransactionTiming};
use crate::util::{header_to_map, pairs_to_map};

#[derive(Clone)]
pub struct TransactionLogger {
    sink: Arc<dyn LogSink>,
}

impl TransactionLogger {
    pub fn new(sink: impl LogSink) -> Self {
        TransactionLogger {
            sink: Arc::new(sink),
        }
    }

    pub fn from_shared(sink: Arc<dyn LogSink>) -> Self {
        TransactionLogger { sink }
    }

    /// Method, URL and headers always; the body only when it was captured.
    pub fn log_request(&self, req: &RequestDescriptor, body: Option<&BodyClassification>) {
        self.info(format!("Request: {} {}", req.method, req.url));

        let headers = Value::Object(header_to_map(&req.headers));
        match serde_json::to_string(&headers) {
            Ok(rendered) => self.info(format!("Headers: {rendered}")),
            Err(err) => {
                self.info("Headers: <unrenderable>");
                self.error(format!("Error rendering request headers: {err}"));
            }
        }

        if let Some(ip) = req.client_host {
            self.debug(format!("Client: {ip}"));
        }
        if !req.query_params.is_empty() {
            self.debug(format!(
                "Query params: {}",
                Value::Object(pairs_to_map(&req.query_params))
            ));
        }
        if !req.path_params.is_empty() {
            self.debug(format!(
                "Path params: {}",
                Value::Object(pairs_to_map(&req.path_params))
            ));
        }

        match body {
            Some(BodyClassification::Empty) => self.info("Request Body: <empty>"),
            Some(BodyClassification::Json(value)) => self.info(format!("Request Body: {value}")),
            Some(BodyClassification::RawText(text)) => {
                self.info(format!("Request Body (raw): {text}"))
            }
            Some(BodyClassification::Undecodable(err)) => {
                self.error(format!("Error reading request body: {err}"))
            }
            None => self.debug("Request Body: <not captured>"),
        }
    }

    /// Status and timing always; the body only for structured responses.
    pub fn log_response(&self, res: &ResponseDescriptor, timing: &TransactionTiming) {
        self.info(format!("Response status: {}", res.status.as_u16()));
        self.info(format!(
            "Process time: {} seconds (started {})",
            timing.elapsed_secs(),
            timing
                .started_at
                .to_rfc3339_opts(SecondsFormat::Millis, false)
        ));

        match &res.body {
            ResponseBody::Structured(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => self.info(format!("Response Body (JSON): {text}")),
                Err(err) => self.error(format!(
                    "Error reading JSON response body: {}",
                    CaptureError::Decode(err.to_string())
                )),
            },
            ResponseBody::Opaque { kind, content_type } => match content_type {
                Some(ct) => self.info(format!("Response Type: {kind} ({ct})")),
                None => self.info(format!("Response Type: {kind}")),
            },
        }
    }

    /// The pipeline future was dropped before the handler answered.
    pub fn log_cancelled(&self, method: &Method, url: &str) {
        self.warn(format!(
            "Transaction cancelled before response: {method} {url}"
        ));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Level::Debug, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Level::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, message.into());
    }

    fn emit(&self, level: Level, message: String) {
        if let Err(err) = self.sink.emit(LogRecord::now(level, message)) {
            self.report_sink_failure(err);
        }
    }

    fn report_sink_failure(&self, err: CaptureError) {
        let notice = LogRecord::now(Level::Error, format!("Failed to write log record: {err}"));
        if let Err(again) = self.sink.emit(notice) {
            eprintln!("diaglog_rs: {err}; error record also failed: {again}");
        }
    }
}
