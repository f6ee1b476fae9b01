//! Ingest data model: the pre- and post-classification records flowing
//! through the pipeline.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Note,
    Clipboard,
    Browser,
    File,
    Terminal,
    ClaudeCode,
    InputMethod,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Note => "note",
            Source::Clipboard => "clipboard",
            Source::Browser => "browser",
            Source::File => "file",
            Source::Terminal => "terminal",
            Source::ClaudeCode => "claude-code",
            Source::InputMethod => "input-method",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source-specific metadata, modeled as a tagged record rather than a
/// loose string map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum IngestMeta {
    None,
    Browser { url: String, title: String },
    File { path: String, action: String, filename: String },
    Terminal { command: String, exit_code: i32, duration_ms: u64 },
}

/// Raw, pre-classification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestItem {
    pub text: String,
    pub source: Source,
    pub timestamp: DateTime<Local>,
    pub meta: IngestMeta,
}

impl IngestItem {
    pub fn new(text: impl Into<String>, source: Source) -> Self {
        Self {
            text: text.into(),
            source,
            timestamp: Local::now(),
            meta: IngestMeta::None,
        }
    }

    pub fn with_meta(mut self, meta: IngestMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_timestamp(mut self, ts: DateTime<Local>) -> Self {
        self.timestamp = ts;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    NewTask,
    TaskProgress,
    TaskDone,
}

/// IngestItem plus the classification results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub item: IngestItem,
    pub category: String,
    pub tags: Vec<String>,
    pub importance: u8,
    pub summary: String,
    pub action_type: Option<ActionType>,
    pub action_detail: Option<String>,
    pub related_todo_id: Option<String>,
}

impl ClassifiedItem {
    pub fn text(&self) -> &str {
        &self.item.text
    }

    pub fn source(&self) -> Source {
        self.item.source
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.item.timestamp
    }
}

/// Valid categories per the data model.
pub const CATEGORIES: &[&str] = &[
    "coding",
    "work",
    "learning",
    "communication",
    "browsing",
    "life",
];

pub fn is_valid_category(s: &str) -> bool {
    CATEGORIES.contains(&s)
}

/// `todo::store::generate_id` produces 8 lowercase hex chars; a
/// `related_todo_id` that doesn't match this shape can never resolve to a
/// real task file, so it's treated the same as no id at all.
pub fn is_valid_todo_id(s: &str) -> bool {
    s.len() == 8 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

pub fn truncate_summary(s: &str) -> String {
    s.chars().take(30).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_display() {
        assert_eq!(Source::ClaudeCode.as_str(), "claude-code");
        assert_eq!(Source::InputMethod.to_string(), "input-method");
    }

    #[test]
    fn test_truncate_summary() {
        let long = "a".repeat(50);
        assert_eq!(truncate_summary(&long).len(), 30);
    }

    #[test]
    fn test_is_valid_category() {
        assert!(is_valid_category("coding"));
        assert!(!is_valid_category("nonsense"));
    }

    #[test]
    fn test_is_valid_todo_id() {
        assert!(is_valid_todo_id("0a1b2c3d"));
        assert!(!is_valid_todo_id("0A1B2C3D"));
        assert!(!is_valid_todo_id("0a1b2c3"));
        assert!(!is_valid_todo_id("0a1b2c3dZ"));
        assert!(!is_valid_todo_id("not-a-hex-id"));
    }
}
