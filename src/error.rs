use bytes::Bytes;
use thiserror::Error;

/// Failures owned by the logging pipeline.
///
/// None of these ever reach the client: the middleware downgrades each one to
/// an error-level log record and keeps processing the request. Faults raised
/// by the wrapped handler are not represented here; they travel through the
/// inner service's own error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The request body stream failed before it was fully read.
    ///
    /// `partial` holds whatever arrived before the failure and is what the
    /// downstream handler receives.
    #[error("failed to read request body after {} bytes: {source}", .partial.len())]
    StreamRead {
        partial: Bytes,
        #[source]
        source: axum::Error,
    },

    /// Bytes could not be decoded as text or JSON.
    #[error("failed to decode body: {0}")]
    Decode(String),

    /// The log sink refused or failed to accept a record.
    #[error("log sink failure: {0}")]
    LogSink(String),
}
