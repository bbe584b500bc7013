//! Shared constants used across the middleware, logger and endpoints.

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default text template for a log line.
pub const DEFAULT_LOG_FORMAT: &str = "{timestamp} - {level} - {message}";

/// chrono format of the `{timestamp}` placeholder.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Value of `DIAGLOG_LOG_FORMAT__` selecting one JSON object per line.
pub const JSON_LOG_FORMAT: &str = "json";

/// Wildcard entry for CORS lists.
pub const WILDCARD: &str = "*";

/// Type tag logged for opaque responses that carry no [`BodyKind`](crate::response::BodyKind).
pub const DEFAULT_BODY_KIND: &str = "Body";

/// Content type set on structured responses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Marker appended to header values that are not visible ASCII.
pub const UNRENDERABLE_HEADER: &str = "[unrenderable header value]";
