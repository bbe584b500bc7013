use serde_json::Value;

/// What a captured body turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyClassification {
    /// Zero bytes.
    Empty,
    /// Strictly valid JSON.
    Json(Value),
    /// Anything else, decoded lossily as UTF-8.
    RawText(String),
    /// The body could not be read; carries the read error.
    Undecodable(String),
}

impl BodyClassification {
    pub fn is_empty(&self) -> bool {
        matches!(self, BodyClassification::Empty)
    }
}

/// Classify a byte buffer. Never fails.
///
/// Empty input short-circuits before JSON parsing. Invalid UTF-8 fails the
/// JSON parse and lands in [`BodyClassification::RawText`] with replacement
/// characters.
pub fn classify(bytes: &[u8]) -> BodyClassification {
    if bytes.is_empty() {
        return BodyClassification::Empty;
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => BodyClassification::Json(value),
        Err(_) => BodyClassification::RawText(String::from_utf8_lossy(bytes).into_owned()),
    }
}
