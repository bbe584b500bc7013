//! Log sinks.
//!
//! The transaction logger never writes anywhere by itself; it hands each
//! [`LogRecord`] to a [`LogSink`] chosen at construction time.
//!
//! - [`Logger`] renders records to lines and passes them over an mpsc channel
//!   to one worker thread. The worker is the only writer: stdout, plus an
//!   optional log file capped in size (oldest lines trimmed from the top).
//! - [`MemorySink`] keeps records in memory.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use chrono::{DateTime, Local, SecondsFormat};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::Config;
use crate::error::CaptureError;
use crate::generalkey;

/// Default cap for the log file: 1GB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1 << 30;

/// Severity of a record. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            other => Err(format!("unknown log level: {other:?}")),
        }
    }
}

/// How a record becomes a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    /// Template with `{timestamp}`, `{level}` and `{message}` placeholders.
    Text(String),
    /// One JSON object per line.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text(generalkey::DEFAULT_LOG_FORMAT.to_string())
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text(template) => f.write_str(template),
            LogFormat::Json => f.write_str(generalkey::JSON_LOG_FORMAT),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("empty log format".to_string());
        }
        if s.trim().eq_ignore_ascii_case(generalkey::JSON_LOG_FORMAT) {
            return Ok(LogFormat::Json);
        }
        Ok(LogFormat::Text(s.to_string()))
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    #[serde(rename = "log.level")]
    level: &'a str,
    message: &'a str,
}

impl LogFormat {
    /// Render a record into a single output line (without the trailing newline).
    pub fn render(&self, record: &LogRecord) -> Result<String, CaptureError> {
        match self {
            LogFormat::Text(template) => {
                let timestamp = record
                    .timestamp
                    .format(generalkey::TIMESTAMP_FORMAT)
                    .to_string();
                // message last so its content is never treated as a placeholder
                Ok(template
                    .replace("{timestamp}", &timestamp)
                    .replace("{level}", record.level.as_str())
                    .replace("{message}", &record.message))
            }
            LogFormat::Json => {
                let line = JsonLine {
                    timestamp: record
                        .timestamp
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                    level: record.level.as_str(),
                    message: &record.message,
                };
                serde_json::to_string(&line).map_err(|err| CaptureError::LogSink(err.to_string()))
            }
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl LogRecord {
    pub fn now(level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

/// Destination for log records. Shared by every in-flight request, so
/// implementations must be safe under concurrent calls.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, record: LogRecord) -> Result<(), CaptureError>;
}

/// Options for [`Logger::new`].
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub level: Level,
    pub format: LogFormat,
    pub stdout: bool,
    pub file: Option<PathBuf>,
    pub max_file_bytes: u64,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        LoggerOptions {
            level: Level::Info,
            format: LogFormat::default(),
            stdout: true,
            file: None,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

enum Command {
    Line(String),
    Flush(Sender<()>),
}

/// Line-oriented sink backed by a single worker thread.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    level: Level,
    format: LogFormat,
    sender: Sender<Command>,
}

struct LineWriter {
    stdout: bool,
    file: Option<FileTarget>,
}

struct FileTarget {
    path: PathBuf,
    max_bytes: u64,
}

impl Logger {
    pub fn new(options: LoggerOptions) -> Logger {
        let (sender, receiver) = channel::<Command>();

        let writer = LineWriter {
            stdout: options.stdout,
            file: options.file.map(|path| FileTarget {
                path,
                max_bytes: options.max_file_bytes,
            }),
        };
        thread::spawn(move || worker_loop(writer, receiver));

        Logger {
            inner: Arc::new(LoggerInner {
                level: options.level,
                format: options.format,
                sender,
            }),
        }
    }

    pub fn from_config(cfg: &Config) -> Logger {
        Logger::new(LoggerOptions {
            level: cfg.log_level,
            format: cfg.log_format.clone(),
            file: cfg.log_file.clone(),
            ..LoggerOptions::default()
        })
    }

    pub fn level(&self) -> Level {
        self.inner.level
    }

    /// Emit a message, reporting sink failures to stderr.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        if let Err(err) = self.emit(LogRecord::now(level, message)) {
            eprintln!("diaglog_rs: failed to write log record: {err}");
        }
    }

    /// Block until the worker has written every line queued before this call.
    pub fn flush(&self) {
        let (done_tx, done_rx) = channel();
        if self.inner.sender.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl LogSink for Logger {
    fn emit(&self, record: LogRecord) -> Result<(), CaptureError> {
        if record.level < self.inner.level {
            return Ok(());
        }

        let line = self.inner.format.render(&record)?;

        self.inner
            .sender
            .send(Command::Line(line))
            .map_err(|err| CaptureError::LogSink(format!("log worker is gone: {err}")))
    }
}

fn worker_loop(writer: LineWriter, receiver: Receiver<Command>) {
    for command in receiver {
        match command {
            Command::Line(line) => writer.write_line(&line),
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

impl LineWriter {
    fn write_line(&self, line: &str) {
        if self.stdout {
            let mut out = io::stdout().lock();
            if let Err(err) = writeln!(out, "{line}") {
                eprintln!("diaglog_rs: failed to write log line to stdout: {err}");
            }
        }

        if let Some(file) = &self.file {
            if let Err(err) = file.append_line(line) {
                eprintln!(
                    "diaglog_rs: failed to write log line to file {:?}: {err}",
                    file.path
                );
            }
        }
    }
}

impl FileTarget {
    fn append_line(&self, line: &str) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        if bytes.len() as u64 > self.max_bytes {
            return Ok(());
        }

        self.ensure_capacity(bytes.len() as u64)?;

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(&bytes)?;
        Ok(())
    }

    fn ensure_capacity(&self, additional: u64) -> io::Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };

        let required = size + additional;
        if required <= self.max_bytes {
            return Ok(());
        }

        trim_oldest_lines(&self.path, required - self.max_bytes)
    }
}

/// Drop whole lines from the top of `path` until at least `bytes_to_free`
/// bytes are gone.
pub(crate) fn trim_oldest_lines(path: &Path, bytes_to_free: u64) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    let tmp_path = path.with_extension("tmp");
    let mut tmp = File::create(&tmp_path)?;

    let mut removed: u64 = 0;
    let mut buf = String::new();

    while removed < bytes_to_free && reader.read_line(&mut buf)? != 0 {
        removed += buf.len() as u64;
        buf.clear();
    }

    while reader.read_line(&mut buf)? != 0 {
        tmp.write_all(buf.as_bytes())?;
        buf.clear();
    }

    tmp.flush()?;
    drop(tmp);

    fs::rename(tmp_path, path)
}

/// Sink that keeps every record in memory, in emission order.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: LogRecord) -> Result<(), CaptureError> {
        self.records.lock().push(record);
        Ok(())
    }
}
