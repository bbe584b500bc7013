use std::fs;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::IntoResponse;
use bytes::Bytes;
use chrono::{Local, TimeZone};
use serde_json::{Value, json};
use tempfile::NamedTempFile;

use crate::body::{BodyCapture, CaptureDecision, CapturePolicy};
use crate::classify::{BodyClassification, classify};
use crate::config::{is_wildcard, split_list};
use crate::error::CaptureError;
use crate::logger::{Level, LogFormat, LogRecord, LogSink, Logger, LoggerOptions, trim_oldest_lines};
use crate::model::{RequestDescriptor, ResponseBody, ResponseDescriptor, TransactionTiming};
use crate::response::{BodyKind, JsonResponse, opaque_response};
use crate::util::{full_url, header_to_map, header_to_string, query_pairs};

fn record_at(level: Level, message: &str) -> LogRecord {
    LogRecord {
        timestamp: Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single().unwrap(),
        level,
        message: message.to_string(),
    }
}

#[test]
fn classify_empty_skips_json_parsing() {
    assert_eq!(classify(b""), BodyClassification::Empty);
}

#[test]
fn classify_valid_json() {
    assert_eq!(
        classify(br#"{"a":1,"b":[true,null]}"#),
        BodyClassification::Json(json!({"a": 1, "b": [true, null]}))
    );
    assert_eq!(classify(b"42"), BodyClassification::Json(json!(42)));
}

#[test]
fn classify_malformed_json_as_raw_text() {
    assert_eq!(
        classify(b"not-json"),
        BodyClassification::RawText("not-json".into())
    );
    assert_eq!(
        classify(br#"{"a":"#),
        BodyClassification::RawText(r#"{"a":"#.into())
    );
}

#[test]
fn classify_invalid_utf8_is_lossy() {
    match classify(b"ab\xffcd") {
        BodyClassification::RawText(text) => assert_eq!(text, "ab\u{FFFD}cd"),
        other => panic!("unexpected classification: {other:?}"),
    }
}

#[test]
fn capture_policy_decisions() {
    let mut headers = HeaderMap::new();
    let empty = Body::empty();
    let full = Body::from("x");

    assert_eq!(
        CapturePolicy::PostOnly.decide(&Method::PUT, &headers, &full),
        CaptureDecision::Skip
    );
    assert_eq!(
        CapturePolicy::PostOnly.decide(&Method::POST, &headers, &full),
        CaptureDecision::Read
    );
    assert_eq!(
        CapturePolicy::NonEmpty.decide(&Method::GET, &headers, &empty),
        CaptureDecision::Empty
    );
    assert_eq!(
        CapturePolicy::NonEmpty.decide(&Method::PUT, &headers, &full),
        CaptureDecision::Read
    );
    assert_eq!(
        CapturePolicy::Always.decide(&Method::GET, &headers, &empty),
        CaptureDecision::Read
    );

    headers.insert("content-length", HeaderValue::from_static("0"));
    assert_eq!(
        CapturePolicy::NonEmpty.decide(&Method::DELETE, &headers, &full),
        CaptureDecision::Empty
    );
}

#[test]
fn capture_policy_parses_and_displays() {
    for policy in [
        CapturePolicy::PostOnly,
        CapturePolicy::NonEmpty,
        CapturePolicy::Always,
    ] {
        assert_eq!(policy.to_string().parse::<CapturePolicy>(), Ok(policy));
    }
    assert_eq!("POST".parse(), Ok(CapturePolicy::PostOnly));
    assert_eq!("non_empty".parse(), Ok(CapturePolicy::NonEmpty));
    assert!("sometimes".parse::<CapturePolicy>().is_err());
}

#[test]
fn body_capture_failed_keeps_partial_bytes() {
    let err = CaptureError::Decode("boom".into());
    let capture = BodyCapture::failed(Bytes::from_static(b"par"), &err);
    assert_eq!(capture.bytes().as_ref(), b"par");
    assert!(matches!(
        capture.classification(),
        BodyClassification::Undecodable(msg) if msg.contains("boom")
    ));
}

#[test]
fn level_parsing_and_ordering() {
    assert_eq!("warn".parse(), Ok(Level::Warning));
    assert_eq!("WARNING".parse(), Ok(Level::Warning));
    assert_eq!(" Debug ".parse(), Ok(Level::Debug));
    assert!("verbose".parse::<Level>().is_err());
    assert!(Level::Debug < Level::Info);
    assert!(Level::Warning < Level::Error);
}

#[test]
fn text_format_renders_template() {
    let line = LogFormat::default()
        .render(&record_at(Level::Info, "Request: GET /"))
        .unwrap();
    assert_eq!(line, "2024-01-02 03:04:05,000 - INFO - Request: GET /");
}

#[test]
fn text_format_does_not_expand_placeholders_inside_message() {
    let format = LogFormat::Text("[{level}] {message}".into());
    let line = format
        .render(&record_at(Level::Error, "literal {level}"))
        .unwrap();
    assert_eq!(line, "[ERROR] literal {level}");
}

#[test]
fn json_format_renders_object() {
    let line = LogFormat::Json
        .render(&record_at(Level::Warning, "hello"))
        .unwrap();
    let value: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["log.level"], "WARNING");
    assert_eq!(value["message"], "hello");
    assert!(value["@timestamp"].as_str().unwrap().starts_with("2024-01-02T03:04:05"));
}

#[test]
fn log_format_parse() {
    assert_eq!("json".parse(), Ok(LogFormat::Json));
    assert_eq!(
        "{level}: {message}".parse(),
        Ok(LogFormat::Text("{level}: {message}".into()))
    );
    assert!("  ".parse::<LogFormat>().is_err());
}

#[test]
fn trim_oldest_lines_drops_from_top() {
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), "line-1\nline-2\nline-3\n").unwrap();

    trim_oldest_lines(file.path(), 8).unwrap();

    assert_eq!(fs::read_to_string(file.path()).unwrap(), "line-3\n");
}

#[test]
fn logger_file_is_capped() {
    let file = NamedTempFile::new().unwrap();
    let logger = Logger::new(LoggerOptions {
        format: LogFormat::Text("{message}".into()),
        stdout: false,
        file: Some(file.path().to_path_buf()),
        max_file_bytes: 12,
        ..LoggerOptions::default()
    });

    logger.emit(LogRecord::now(Level::Info, "aaaaa")).unwrap();
    logger.emit(LogRecord::now(Level::Info, "bbbbb")).unwrap();
    logger.emit(LogRecord::now(Level::Info, "ccccc")).unwrap();
    logger.flush();

    assert_eq!(fs::read_to_string(file.path()).unwrap(), "bbbbb\nccccc\n");
}

#[test]
fn header_to_map_joins_repeated_values() {
    let mut headers = HeaderMap::new();
    headers.append("accept", HeaderValue::from_static("text/html"));
    headers.append("accept", HeaderValue::from_static("application/json"));
    headers.insert("x-test", HeaderValue::from_static("123"));

    let map = header_to_map(&headers);
    assert_eq!(map["accept"], "text/html, application/json");
    assert_eq!(map["x-test"], "123");
}

#[test]
fn header_to_map_marks_unrenderable_values() {
    let mut headers = HeaderMap::new();
    headers.insert("x-bin", HeaderValue::from_bytes(b"ok\x80").unwrap());

    let map = header_to_map(&headers);
    let rendered = map["x-bin"].as_str().unwrap();
    assert!(rendered.starts_with("ok"));
    assert!(rendered.ends_with(crate::generalkey::UNRENDERABLE_HEADER));
}

#[test]
fn header_to_string_is_case_insensitive() {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", HeaderValue::from_static("agent-1"));
    assert_eq!(header_to_string(&headers, "user-agent"), "agent-1");
    assert_eq!(header_to_string(&headers, "missing"), "");
}

#[test]
fn full_url_uses_host_and_forwarded_proto() {
    let uri: Uri = "/info?x=1".parse().unwrap();
    let mut headers = HeaderMap::new();
    assert_eq!(full_url(&uri, &headers), "/info?x=1");

    headers.insert("host", HeaderValue::from_static("example.com:8000"));
    assert_eq!(full_url(&uri, &headers), "http://example.com:8000/info?x=1");

    headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
    assert_eq!(full_url(&uri, &headers), "https://example.com:8000/info?x=1");

    let absolute: Uri = "http://other.test/a".parse().unwrap();
    assert_eq!(full_url(&absolute, &headers), "http://other.test/a");
}

#[test]
fn query_pairs_decodes_percent_encoding() {
    let uri: Uri = "/info?name=a%20b&x=1&x=2".parse().unwrap();
    assert_eq!(
        query_pairs(&uri),
        vec![
            ("name".to_string(), "a b".to_string()),
            ("x".to_string(), "1".to_string()),
            ("x".to_string(), "2".to_string()),
        ]
    );
}

#[test]
fn request_descriptor_from_parts() {
    let req = Request::builder()
        .method(Method::PATCH)
        .uri("/items/7?verbose=true")
        .header("host", "localhost:8000")
        .body(())
        .unwrap();
    let (parts, _) = req.into_parts();

    let desc = RequestDescriptor::from_parts(&parts, vec![("id".into(), "7".into())]);
    assert_eq!(desc.method, Method::PATCH);
    assert_eq!(desc.url, "http://localhost:8000/items/7?verbose=true");
    assert_eq!(desc.client_host, None);
    assert_eq!(
        desc.query_params,
        vec![("verbose".to_string(), "true".to_string())]
    );

    let value = desc.to_json();
    assert_eq!(value["method"], "PATCH");
    assert_eq!(value["path_params"]["id"], "7");
    assert_eq!(value["client_host"], Value::Null);
    assert_eq!(value["headers"]["host"], "localhost:8000");
}

#[test]
fn json_response_is_tagged_structured() {
    let resp = JsonResponse::ok(json!({"status": "success"})).into_response();
    let desc = ResponseDescriptor::from_response(&resp);

    assert_eq!(desc.status, StatusCode::OK);
    assert_eq!(
        desc.body,
        ResponseBody::Structured(Bytes::from_static(br#"{"status":"success"}"#))
    );
    assert_eq!(resp.headers()["content-type"], "application/json");
}

#[test]
fn untagged_response_is_opaque() {
    let resp = (StatusCode::ACCEPTED, "plain").into_response();
    let desc = ResponseDescriptor::from_response(&resp);
    assert_eq!(desc.status, StatusCode::ACCEPTED);
    assert_eq!(
        desc.body,
        ResponseBody::Opaque {
            kind: "Body",
            content_type: Some("text/plain; charset=utf-8".into()),
        }
    );

    let resp = opaque_response(StatusCode::OK, "StreamingResponse", Body::empty());
    assert!(resp.extensions().get::<BodyKind>().is_some());
    assert!(matches!(
        ResponseDescriptor::from_response(&resp).body,
        ResponseBody::Opaque { kind: "StreamingResponse", content_type: None }
    ));
}

#[test]
fn timing_formats_four_decimals() {
    let timing = TransactionTiming {
        started_at: Local::now(),
        elapsed: Duration::from_micros(123_456),
    };
    assert_eq!(timing.elapsed_secs(), "0.1235");

    let timing = TransactionTiming::since(Local::now(), Instant::now());
    assert!(timing.elapsed >= Duration::ZERO);
}

#[test]
fn list_helpers() {
    assert_eq!(split_list(" a, ,b ,"), vec!["a".to_string(), "b".to_string()]);
    assert!(is_wildcard(&["x".to_string(), "*".to_string()]));
    assert!(!is_wildcard(&["x".to_string()]));
}
