//! diaglog_rs
//!
//! HTTP diagnostic service built around a request/response logging layer
//! for Axum.
//!
//! Key features:
//! - `DiagLogLayer` (Tower Layer): logs method, URL, headers and body of each
//!   request, forwards it with the body replayed from a single buffer, then
//!   logs status, processing time and (for structured responses) the body
//! - JSON / raw-text body classification that never fails
//! - Injected log sink: a worker-thread `Logger` (stdout + capped file) or an
//!   in-memory `MemorySink`
//! - Env-based config and a small set of diagnostic endpoints

pub mod app;
pub mod axum_middleware;
pub mod body;
pub mod classify;
pub mod config;
pub mod envkey;
pub mod error;
pub mod generalkey;
pub mod logger;
pub mod model;
pub mod response;
pub mod transaction;
pub mod util;

#[cfg(test)]
mod tests;

pub use crate::app::build_app;
pub use crate::axum_middleware::{DiagLogLayer, DiagLogMiddleware, Stage};
pub use crate::body::{BodyCapture, CapturePolicy, capture};
pub use crate::classify::{BodyClassification, classify};
pub use crate::config::Config;
pub use crate::error::CaptureError;
pub use crate::logger::{Level, LogFormat, LogRecord, LogSink, Logger, MemorySink};
pub use crate::model::{
    RequestDescriptor, ResponseBody, ResponseDescriptor, TransactionContext, TransactionTiming,
};
pub use crate::response::{BodyKind, JsonResponse, StructuredBody};
pub use crate::transaction::TransactionLogger;

/// Write a configuration back into the environment, the inverse of
/// [`Config::from_env`].
///
/// Must be called before any other thread reads the environment.
pub fn set_config(cfg: Config) {
    use crate::envkey;
    use std::env;

    // `set_var` is unsafe since edition 2024; call it before spawning threads.
    unsafe {
        env::set_var(envkey::HOST, cfg.host);
        env::set_var(envkey::PORT, cfg.port.to_string());
        env::set_var(envkey::LOG_LEVEL, cfg.log_level.to_string());
        env::set_var(envkey::LOG_FORMAT, cfg.log_format.to_string());
        match cfg.log_file {
            Some(path) => env::set_var(envkey::LOG_FILE, path),
            None => env::remove_var(envkey::LOG_FILE),
        }
        env::set_var(envkey::CORS_ORIGINS, cfg.cors_origins.join(","));
        env::set_var(envkey::CORS_METHODS, cfg.cors_methods.join(","));
        env::set_var(envkey::CORS_HEADERS, cfg.cors_headers.join(","));
        env::set_var(envkey::CAPTURE, cfg.capture_policy.to_string());
    }
}
