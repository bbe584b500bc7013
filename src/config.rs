use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::body::CapturePolicy;
use crate::envkey;
use crate::generalkey;
use crate::logger::{Level, LogFormat};

/// Runtime configuration of the diagnostic service.
///
/// Everything here lives outside the logging middleware itself: the
/// middleware only receives a sink and a [`CapturePolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: Level,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub cors_methods: Vec<String>,
    pub cors_headers: Vec<String>,
    pub capture_policy: CapturePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: generalkey::DEFAULT_HOST.to_string(),
            port: generalkey::DEFAULT_PORT,
            log_level: Level::Info,
            log_format: LogFormat::default(),
            log_file: None,
            cors_origins: vec![generalkey::WILDCARD.to_string()],
            cors_methods: vec![generalkey::WILDCARD.to_string()],
            cors_headers: vec![generalkey::WILDCARD.to_string()],
            capture_policy: CapturePolicy::default(),
        }
    }
}

impl Config {
    /// Defaults overlaid with whatever the environment provides.
    ///
    /// A variable that is missing, empty or unparsable leaves the default in place.
    pub fn from_env() -> Config {
        let mut cfg = Config::default();

        if let Some(host) = read_var(envkey::HOST) {
            cfg.host = host;
        }
        if let Some(port) = parse_var(envkey::PORT) {
            cfg.port = port;
        }
        if let Some(level) = parse_var(envkey::LOG_LEVEL) {
            cfg.log_level = level;
        }
        if let Some(format) = read_var(envkey::LOG_FORMAT) {
            if let Ok(format) = format.parse() {
                cfg.log_format = format;
            }
        }
        if let Some(path) = read_var(envkey::LOG_FILE) {
            cfg.log_file = Some(PathBuf::from(path));
        }
        if let Some(origins) = read_list(envkey::CORS_ORIGINS) {
            cfg.cors_origins = origins;
        }
        if let Some(methods) = read_list(envkey::CORS_METHODS) {
            cfg.cors_methods = methods;
        }
        if let Some(headers) = read_list(envkey::CORS_HEADERS) {
            cfg.cors_headers = headers;
        }
        if let Some(policy) = parse_var(envkey::CAPTURE) {
            cfg.capture_policy = policy;
        }

        cfg
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn read_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    read_var(key).and_then(|v| v.parse().ok())
}

/// Split a comma-separated list, dropping blank entries.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_list(key: &str) -> Option<Vec<String>> {
    let list = split_list(&read_var(key)?);
    if list.is_empty() { None } else { Some(list) }
}

/// True when a CORS list allows anything.
pub(crate) fn is_wildcard(list: &[String]) -> bool {
    list.iter().any(|v| v == generalkey::WILDCARD)
}
