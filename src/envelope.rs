//! Input envelope produced by the labeling stage.
//!
//! Every key is optional at the serde level so that validation can name the
//! exact field that is missing instead of surfacing a generic parse error.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use std::io::Read;

use crate::error::{ArchiveError, Result};
use crate::models::FragmentRecord;

/// Raw JSON envelope. Unknown keys (e.g. `source_url`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputEnvelope {
    #[serde(default)]
    pub file_content: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub generated_title: Option<String>,
    #[serde(default)]
    pub search_keyword: Option<String>,
}

impl InputEnvelope {
    /// Check required fields and produce an immutable record.
    pub fn validate(self) -> Result<FragmentRecord> {
        let content = required("file_content", self.file_content)?;
        let generated_title = required("generated_title", self.generated_title)?;
        let source_repo_url = required("repo_url", self.repo_url)?;
        let source_file_path = required("file_path", self.file_path)?;
        let timestamp = required("timestamp", self.timestamp)?;

        if generated_title.trim().contains(&['\n', '\r'][..]) {
            return Err(ArchiveError::validation(
                "generated_title",
                "must be a single line",
            ));
        }

        if !is_iso8601(&timestamp) {
            return Err(ArchiveError::validation(
                "timestamp",
                format!("is not an ISO-8601 timestamp: '{}'", timestamp),
            ));
        }

        let search_keyword = self
            .search_keyword
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Ok(FragmentRecord {
            content,
            source_repo_url: source_repo_url.trim().to_string(),
            source_file_path: source_file_path.trim().to_string(),
            timestamp: timestamp.trim().to_string(),
            search_keyword,
            generated_title: generated_title.trim().to_string(),
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String> {
    match value {
        None => Err(ArchiveError::validation(field, "is missing")),
        Some(v) if v.trim().is_empty() => Err(ArchiveError::validation(field, "is empty")),
        Some(v) => Ok(v),
    }
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.fff]` taken as UTC.
fn is_iso8601(s: &str) -> bool {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

/// Parse an envelope from a reader (stdin or a file).
pub fn read_envelope<R: Read>(reader: R) -> Result<InputEnvelope> {
    serde_json::from_reader(reader).map_err(ArchiveError::Envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> InputEnvelope {
        InputEnvelope {
            file_content: Some("def f(): pass".to_string()),
            repo_url: Some("https://x/y".to_string()),
            file_path: Some("a.py".to_string()),
            timestamp: Some("2024-01-01T00:00:00Z".to_string()),
            generated_title: Some("A Study".to_string()),
            search_keyword: None,
        }
    }

    #[test]
    fn valid_envelope_becomes_record() {
        let record = full().validate().unwrap();
        assert_eq!(record.generated_title, "A Study");
        assert_eq!(record.keyword_or_unknown(), "unknown");
    }

    #[test]
    fn missing_title_is_rejected() {
        let mut env = full();
        env.generated_title = None;
        match env.validate() {
            Err(ArchiveError::Validation { field, .. }) => assert_eq!(field, "generated_title"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn blank_content_is_rejected() {
        let mut env = full();
        env.file_content = Some("   \n".to_string());
        match env.validate() {
            Err(ArchiveError::Validation { field, reason }) => {
                assert_eq!(field, "file_content");
                assert_eq!(reason, "is empty");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn multi_line_title_is_rejected() {
        let mut env = full();
        env.generated_title = Some("A Study\nof Things".to_string());
        assert!(env.validate().is_err());

        let mut env = full();
        env.generated_title = Some("A Study\n".to_string());
        assert_eq!(env.validate().unwrap().generated_title, "A Study");
    }

    #[test]
    fn timestamp_formats() {
        let mut env = full();
        env.timestamp = Some("2024-03-20T10:00:00.123456".to_string());
        assert!(env.validate().is_ok());

        let mut env = full();
        env.timestamp = Some("2024-03-20T10:00:00+02:00".to_string());
        assert!(env.validate().is_ok());

        let mut env = full();
        env.timestamp = Some("yesterday".to_string());
        assert!(env.validate().is_err());
    }

    #[test]
    fn blank_keyword_is_absent() {
        let mut env = full();
        env.search_keyword = Some("  ".to_string());
        assert_eq!(env.validate().unwrap().search_keyword, None);
    }

    #[test]
    fn reads_json_and_ignores_unknown_keys() {
        let json = r#"{"file_content":"x = 1","repo_url":"https://x/y","file_path":"a.py",
            "timestamp":"2024-01-01T00:00:00Z","generated_title":"T","source_url":"https://x/y/blob/a.py",
            "search_keyword":"pytorch"}"#;
        let record = read_envelope(json.as_bytes()).unwrap().validate().unwrap();
        assert_eq!(record.search_keyword.as_deref(), Some("pytorch"));
    }

    #[test]
    fn malformed_json_is_envelope_error() {
        let err = read_envelope("{not json".as_bytes()).unwrap_err();
        assert_eq!(err.stage(), "validate");
    }

    #[test]
    fn wrong_type_is_envelope_error() {
        let err = read_envelope(r#"{"file_content": 42}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, ArchiveError::Envelope(_)));
    }
}
