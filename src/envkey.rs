//! Environment variable names read by [`Config::from_env`](crate::config::Config::from_env).

/// Bind host for the diagnostic server.
pub const HOST: &str = "DIAGLOG_HOST__";

/// Bind port for the diagnostic server.
pub const PORT: &str = "DIAGLOG_PORT__";

/// Minimum log level (`debug`, `info`, `warning`, `error`).
pub const LOG_LEVEL: &str = "DIAGLOG_LOG_LEVEL__";

/// Log line format: a text template or `json`.
pub const LOG_FORMAT: &str = "DIAGLOG_LOG_FORMAT__";

/// Optional path of a file that receives a copy of every log line.
pub const LOG_FILE: &str = "DIAGLOG_LOG_FILE__";

/// Comma-separated allowed CORS origins, `*` for any.
pub const CORS_ORIGINS: &str = "DIAGLOG_CORS_ORIGINS__";

/// Comma-separated allowed CORS methods, `*` for any.
pub const CORS_METHODS: &str = "DIAGLOG_CORS_METHODS__";

/// Comma-separated allowed CORS request headers, `*` for any.
pub const CORS_HEADERS: &str = "DIAGLOG_CORS_HEADERS__";

/// Request body capture policy (`post-only`, `non-empty`, `always`).
pub const CAPTURE: &str = "DIAGLOG_CAPTURE__";
