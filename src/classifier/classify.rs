//! Batch classification: builds a prompt, calls the LLM, parses the
//! response, and falls back to rules on any failure.

use serde::Deserialize;
use serde_json::Value;

use super::provider::{ChatMessage, LlmProvider};
use crate::ingest::types::{
    is_valid_category, is_valid_todo_id, truncate_summary, ActionType, ClassifiedItem, IngestItem,
    Source,
};
use crate::todo::schema::TodoSummary;

pub struct Classifier {
    provider: Box<dyn LlmProvider>,
}

#[derive(Debug, Deserialize, Default)]
struct RawClassification {
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    importance: Option<i64>,
    summary: Option<String>,
    action_type: Option<String>,
    action_detail: Option<String>,
    related_todo_id: Option<String>,
}

impl Classifier {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn classify(
        &self,
        batch: &[IngestItem],
        active_todos: &[TodoSummary],
    ) -> Vec<ClassifiedItem> {
        if batch.is_empty() {
            return Vec::new();
        }

        let prompt = build_user_prompt(batch, active_todos);
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

        match self.provider.complete(&messages).await {
            Ok(raw) => parse_batch_response(&raw, batch),
            Err(e) => {
                tracing::warn!("classifier call failed, using fallback: {}", e);
                batch.iter().map(|item| fallback_classify(item)).collect()
            }
        }
    }
}

const SYSTEM_PROMPT: &str = "You are an activity classifier. You will receive a JSON list of active \
to-do items and a batch of raw activity lines. Respond with ONLY a JSON array, one object per input \
line in the same order, each with fields: category (one of coding, work, learning, communication, \
browsing, life), tags (array of up to 5 short strings), importance (integer 1-5), summary (<=30 chars), \
action_type (one of new_task, task_progress, task_done, or null), action_detail (string or null), \
related_todo_id (8-char hex string or null). Output nothing but the JSON array.";

fn build_user_prompt(batch: &[IngestItem], active_todos: &[TodoSummary]) -> String {
    let todos_json = serde_json::to_string(active_todos).unwrap_or_else(|_| "[]".to_string());
    let mut lines = String::new();
    for item in batch {
        lines.push_str(&format!(
            "[{}, {}] {}\n",
            item.source,
            item.timestamp.format("%H:%M"),
            item.text.replace('\n', " ")
        ));
    }
    format!("Active to-dos:\n{todos_json}\n\nBatch:\n{lines}")
}

/// Strip a leading/trailing ```` ```json ```` or ```` ``` ```` fence if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches('\n');
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_batch_response(raw: &str, batch: &[IngestItem]) -> Vec<ClassifiedItem> {
    let stripped = strip_code_fence(raw);

    let parsed: Option<Vec<RawClassification>> = serde_json::from_str::<Value>(stripped)
        .ok()
        .and_then(|value| match value {
            Value::Array(_) => serde_json::from_value(value).ok(),
            _ => None,
        });

    let Some(entries) = parsed else {
        return batch.iter().map(fallback_classify).collect();
    };

    if entries.len() != batch.len() {
        return batch.iter().map(fallback_classify).collect();
    }

    batch
        .iter()
        .zip(entries.into_iter())
        .map(|(item, raw)| coerce_or_fallback(item, raw))
        .collect()
}

fn coerce_or_fallback(item: &IngestItem, raw: RawClassification) -> ClassifiedItem {
    let Some(category) = raw.category else {
        return fallback_classify(item);
    };

    let category = if is_valid_category(&category) {
        category
    } else {
        "work".to_string()
    };

    let importance = raw
        .importance
        .map(|n| n.clamp(1, 5) as u8)
        .unwrap_or(3);

    let summary = raw
        .summary
        .map(|s| truncate_summary(&s))
        .unwrap_or_else(|| truncate_summary(&item.text));

    let action_type = raw.action_type.as_deref().and_then(parse_action_type);
    let related_todo_id = raw.related_todo_id.filter(|id| is_valid_todo_id(id));

    ClassifiedItem {
        item: item.clone(),
        category,
        tags: raw.tags.into_iter().take(5).collect(),
        importance,
        summary,
        action_type,
        action_detail: raw.action_detail,
        related_todo_id,
    }
}

fn parse_action_type(s: &str) -> Option<ActionType> {
    match s {
        "new_task" => Some(ActionType::NewTask),
        "task_progress" => Some(ActionType::TaskProgress),
        "task_done" => Some(ActionType::TaskDone),
        _ => None,
    }
}

/// Rule-based fallback applied on any classifier failure path.
pub fn fallback_classify(item: &IngestItem) -> ClassifiedItem {
    let category = match item.source {
        Source::Terminal => "coding",
        Source::Browser => "browsing",
        Source::ClaudeCode => "coding",
        Source::InputMethod => "communication",
        _ => "work",
    };

    ClassifiedItem {
        item: item.clone(),
        category: category.to_string(),
        tags: Vec::new(),
        importance: 3,
        summary: truncate_summary(&item.text),
        action_type: None,
        action_detail: None,
        related_todo_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_terminal() {
        let item = IngestItem::new("git status", Source::Terminal);
        let c = fallback_classify(&item);
        assert_eq!(c.category, "coding");
        assert_eq!(c.importance, 3);
        assert_eq!(c.summary, "git status");
        assert!(c.action_type.is_none());
    }

    #[test]
    fn test_fallback_browser() {
        let item = IngestItem::new("reading docs", Source::Browser);
        assert_eq!(fallback_classify(&item).category, "browsing");
    }

    #[test]
    fn test_strip_code_fence() {
        let raw = "```json\n[{\"category\":\"work\"}]\n```";
        assert_eq!(strip_code_fence(raw), "[{\"category\":\"work\"}]");
    }

    #[test]
    fn test_parse_batch_length_mismatch_falls_back() {
        let batch = vec![
            IngestItem::new("a", Source::Note),
            IngestItem::new("b", Source::Terminal),
        ];
        let raw = r#"[{"category":"work"}]"#;
        let result = parse_batch_response(raw, &batch);
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].category, "coding");
    }

    #[test]
    fn test_parse_batch_valid_json() {
        let batch = vec![IngestItem::new("明天要写周报", Source::Note)];
        let raw = r#"[{"category":"work","tags":["planning"],"importance":4,"summary":"写周报","action_type":"new_task","action_detail":"写本周周报"}]"#;
        let result = parse_batch_response(raw, &batch);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].action_type, Some(ActionType::NewTask));
        assert_eq!(result[0].action_detail.as_deref(), Some("写本周周报"));
    }

    #[test]
    fn test_unknown_category_becomes_work() {
        let batch = vec![IngestItem::new("x", Source::Note)];
        let raw = r#"[{"category":"nonsense"}]"#;
        let result = parse_batch_response(raw, &batch);
        assert_eq!(result[0].category, "work");
    }

    #[test]
    fn test_malformed_related_todo_id_is_nulled() {
        let batch = vec![IngestItem::new("x", Source::Note)];
        let raw = r#"[{"category":"work","related_todo_id":"not-8-hex"}]"#;
        let result = parse_batch_response(raw, &batch);
        assert_eq!(result[0].related_todo_id, None);
    }

    #[test]
    fn test_valid_related_todo_id_is_kept() {
        let batch = vec![IngestItem::new("x", Source::Note)];
        let raw = r#"[{"category":"work","related_todo_id":"0a1b2c3d"}]"#;
        let result = parse_batch_response(raw, &batch);
        assert_eq!(result[0].related_todo_id.as_deref(), Some("0a1b2c3d"));
    }
}
