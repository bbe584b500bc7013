//! Body buffering.
//!
//! A request body can be polled only once. [`capture`] drains it eagerly into
//! an immutable [`Bytes`] buffer; [`BodyCapture::replay`] then hands out fresh
//! [`Body`] values over the same buffer, each yielding every byte from the
//! start, so the logging layer and the downstream handler both see the full
//! body while the original stream is read exactly once.

use std::fmt;
use std::str::FromStr;

use axum::body::{Body, HttpBody};
use axum::http::{HeaderMap, Method, header};
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;

use crate::classify::{BodyClassification, classify};
use crate::error::CaptureError;

/// The one captured body of a request.
#[derive(Debug, Clone)]
pub struct BodyCapture {
    bytes: Bytes,
    classification: BodyClassification,
}

impl BodyCapture {
    /// Wrap fully read bytes and classify them.
    pub fn new(bytes: Bytes) -> Self {
        let classification = classify(&bytes);
        BodyCapture {
            bytes,
            classification,
        }
    }

    /// A body known to be empty without reading it.
    pub fn empty() -> Self {
        BodyCapture {
            bytes: Bytes::new(),
            classification: BodyClassification::Empty,
        }
    }

    /// A body whose stream failed; `partial` is what arrived before the failure.
    pub fn failed(partial: Bytes, err: &CaptureError) -> Self {
        BodyCapture {
            bytes: partial,
            classification: BodyClassification::Undecodable(err.to_string()),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn classification(&self) -> &BodyClassification {
        &self.classification
    }

    /// A new body stream over the captured bytes.
    ///
    /// Cloning [`Bytes`] only bumps a reference count, so every replay shares
    /// the same buffer and none of them touches the original stream.
    pub fn replay(&self) -> Body {
        Body::from(self.bytes.clone())
    }
}

/// Read `body` to completion, frame by frame.
///
/// On a stream error the bytes read so far are returned inside
/// [`CaptureError::StreamRead`] so the caller can still forward them.
pub async fn buffer_body(mut body: Body) -> Result<Bytes, CaptureError> {
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Some(data) = frame.data_ref() {
                    buf.extend_from_slice(data);
                }
            }
            Err(source) => {
                return Err(CaptureError::StreamRead {
                    partial: buf.freeze(),
                    source,
                });
            }
        }
    }

    Ok(buf.freeze())
}

/// Buffer and classify a body in one step.
pub async fn capture(body: Body) -> Result<BodyCapture, CaptureError> {
    buffer_body(body).await.map(BodyCapture::new)
}

/// Which requests get their body captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePolicy {
    /// Only `POST` bodies are read; every other method is forwarded untouched.
    PostOnly,
    /// Any method, unless the body is declared empty.
    #[default]
    NonEmpty,
    /// Every body is read, whatever its declared size.
    Always,
}

/// Outcome of [`CapturePolicy::decide`] for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDecision {
    /// Drain and replay the body.
    Read,
    /// Body is declared empty; classify as empty without polling it.
    Empty,
    /// Leave the body alone.
    Skip,
}

impl CapturePolicy {
    pub fn decide(&self, method: &Method, headers: &HeaderMap, body: &Body) -> CaptureDecision {
        match self {
            CapturePolicy::PostOnly if *method != Method::POST => CaptureDecision::Skip,
            CapturePolicy::Always => CaptureDecision::Read,
            _ if declared_empty(headers, body) => CaptureDecision::Empty,
            _ => CaptureDecision::Read,
        }
    }
}

/// `Content-Length: 0`, or a body that reports an exact size of zero.
fn declared_empty(headers: &HeaderMap, body: &Body) -> bool {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    match declared {
        Some(len) => len == 0,
        None => body.size_hint().exact() == Some(0),
    }
}

impl fmt::Display for CapturePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapturePolicy::PostOnly => "post-only",
            CapturePolicy::NonEmpty => "non-empty",
            CapturePolicy::Always => "always",
        })
    }
}

impl FromStr for CapturePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "post" | "post-only" => Ok(CapturePolicy::PostOnly),
            "non-empty" | "nonempty" => Ok(CapturePolicy::NonEmpty),
            "always" | "all" => Ok(CapturePolicy::Always),
            other => Err(format!("unknown capture policy: {other:?}")),
        }
    }
}
