//! CRUD over `todos/active/` and `todos/done/`, grounded on the
//! directory-backed manager pattern. The vault files are the source of
//! truth (re-read on every call); per-id locking only guards concurrent
//! activity updates to the same file.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::schema::{Priority, TodoItem, TodoStatus, TodoSummary};
use crate::error::{Result, SoulAgentError};
use crate::vault::frontmatter::{self, ActivityEntry};
use crate::vault::store::{VaultStore, DIR_TODOS_ACTIVE, DIR_TODOS_DONE};

pub struct TodoStore {
    vault: Arc<VaultStore>,
    id_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TodoStore {
    pub fn new(vault: Arc<VaultStore>) -> Self {
        Self {
            vault,
            id_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Truncate to the first 8 chars (the length of a generated id), at a
    /// char boundary so an oversized or non-hex `id` can't panic the slice.
    fn id_prefix(id: &str) -> &str {
        let end = id.char_indices().nth(8).map(|(i, _)| i).unwrap_or(id.len());
        &id[..end]
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.id_locks
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn create(&self, text: &str, priority: Priority, auto_detected: bool) -> Result<String> {
        let now = Local::now();
        let id = generate_id(text, now.timestamp_nanos_opt().unwrap_or(0));

        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), id.clone());
        fields.insert("type".to_string(), "todo".to_string());
        fields.insert("status".to_string(), TodoStatus::Active.as_str().to_string());
        fields.insert(
            "auto_detected".to_string(),
            auto_detected.to_string(),
        );
        frontmatter::add_lifecycle(&mut fields, priority.as_str());

        let raw = frontmatter::build(&fields, text);
        self.vault
            .write(DIR_TODOS_ACTIVE, &format!("task-{id}.md"), &raw)?;

        Ok(id)
    }

    /// Ordered by priority ascending, then created date descending.
    pub fn list(&self, status: Option<TodoStatus>) -> Result<Vec<TodoItem>> {
        let mut items = Vec::new();
        if status != Some(TodoStatus::Done) {
            items.extend(self.load_dir(DIR_TODOS_ACTIVE)?);
        }
        if status != Some(TodoStatus::Active) {
            items.extend(self.load_dir(DIR_TODOS_DONE)?);
        }
        items.sort_by(|a, b| a.priority.cmp(&b.priority).then(b.created.cmp(&a.created)));
        Ok(items)
    }

    pub fn active_summaries(&self) -> Result<Vec<TodoSummary>> {
        Ok(self
            .load_dir(DIR_TODOS_ACTIVE)?
            .into_iter()
            .map(|t| TodoSummary {
                id: t.id,
                text: t.text,
            })
            .collect())
    }

    /// Locate the active file matching `id[:8]`, add an activity entry, and
    /// rewrite it. Returns whether a file was found.
    pub fn record_activity(&self, id: &str, source: &str, date: NaiveDate) -> Result<bool> {
        let id = Self::id_prefix(id);
        let _guard = self.lock_for(id);
        let filename = format!("task-{id}.md");
        let Some(raw) = self.vault.read(DIR_TODOS_ACTIVE, &filename)? else {
            return Ok(false);
        };

        let (mut fields, body) = frontmatter::parse(&raw);
        frontmatter::add_activity_entry(&mut fields, date, source);
        let updated = frontmatter::build(&fields, &body);
        self.vault.write(DIR_TODOS_ACTIVE, &filename, &updated)?;
        Ok(true)
    }

    /// Move a file from active to done, setting `status: done`.
    pub fn complete(&self, id: &str) -> Result<bool> {
        let id = Self::id_prefix(id);
        let _guard = self.lock_for(id);
        let filename = format!("task-{id}.md");
        let Some(raw) = self.vault.read(DIR_TODOS_ACTIVE, &filename)? else {
            return Ok(false);
        };

        let (mut fields, body) = frontmatter::parse(&raw);
        fields.insert("status".to_string(), TodoStatus::Done.as_str().to_string());
        let updated = frontmatter::build(&fields, &body);

        self.vault.write(DIR_TODOS_DONE, &filename, &updated)?;
        self.vault.delete(DIR_TODOS_ACTIVE, &filename)?;
        Ok(true)
    }

    pub fn stalled(&self, stale_days: i64) -> Result<Vec<TodoItem>> {
        let today = Local::now().date_naive();
        let threshold = today - chrono::Duration::days(stale_days);
        Ok(self
            .load_dir(DIR_TODOS_ACTIVE)?
            .into_iter()
            .filter(|t| t.effective_last_activity() <= threshold)
            .collect())
    }

    fn load_dir(&self, dir: &str) -> Result<Vec<TodoItem>> {
        let names = self.vault.list(dir)?;
        let mut items = Vec::new();
        for name in names {
            if let Some(raw) = self.vault.read(dir, &name)? {
                match parse_todo(&raw, dir == DIR_TODOS_DONE) {
                    Ok(item) => items.push(item),
                    Err(e) => tracing::warn!("skipping malformed todo {name}: {e}"),
                }
            }
        }
        Ok(items)
    }
}

fn parse_todo(raw: &str, done_dir: bool) -> Result<TodoItem> {
    let (fields, body) = frontmatter::parse(raw);
    let id = fields
        .get("id")
        .cloned()
        .ok_or_else(|| SoulAgentError::Vault("todo missing id".to_string()))?;

    let priority = fields
        .get("priority")
        .and_then(|p| Priority::parse(p))
        .unwrap_or(Priority::P2);

    let status = match fields.get("status").map(String::as_str) {
        Some("done") => TodoStatus::Done,
        _ if done_dir => TodoStatus::Done,
        _ => TodoStatus::Active,
    };

    let created = fields
        .get("created")
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or_else(|| Local::now().date_naive());

    let activity_log: Vec<ActivityEntry> = fields
        .get("activity_log")
        .map(|s| frontmatter::parse_activity_log(s))
        .unwrap_or_default();

    let last_activity = fields
        .get("last_activity")
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

    let auto_detected = fields
        .get("auto_detected")
        .map(|s| s == "true")
        .unwrap_or(false);

    Ok(TodoItem {
        id,
        priority,
        status,
        created,
        activity_log,
        last_activity,
        auto_detected,
        text: body.trim_end_matches('\n').to_string(),
    })
}

fn generate_id(text: &str, timestamp: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(timestamp.to_le_bytes());
    let digest = hasher.finalize();
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TodoStore {
        let dir = std::env::temp_dir().join(format!("todo-test-{}", uuid::Uuid::new_v4()));
        TodoStore::new(Arc::new(VaultStore::new(dir).unwrap()))
    }

    #[test]
    fn test_create_and_list() {
        let store = store();
        let id = store.create("write the report", Priority::P2, true).unwrap();
        assert_eq!(id.len(), 8);

        let items = store.list(Some(TodoStatus::Active)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "write the report");
        assert!(items[0].auto_detected);
        assert_eq!(items[0].priority, Priority::P2);
    }

    #[test]
    fn test_record_activity_then_complete() {
        let store = store();
        let id = store.create("ship the feature", Priority::P1, false).unwrap();
        let d = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(store.record_activity(&id, "note", d).unwrap());

        let active = store.list(Some(TodoStatus::Active)).unwrap();
        assert_eq!(active[0].last_activity, Some(d));

        assert!(store.complete(&id).unwrap());
        let active_after = store.list(Some(TodoStatus::Active)).unwrap();
        assert!(active_after.is_empty());
        let done = store.list(Some(TodoStatus::Done)).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].status, TodoStatus::Done);
    }

    #[test]
    fn test_stall_detection() {
        let store = store();
        let id = store.create("stale task", Priority::P2, true).unwrap();
        let stale_date = NaiveDate::from_ymd_opt(2026, 2, 25).unwrap();
        store.record_activity(&id, "note", stale_date).unwrap();

        // Fake "today" by computing the threshold directly against the
        // known last_activity rather than relying on wall-clock `today`.
        let items = store.list(Some(TodoStatus::Active)).unwrap();
        let threshold = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap() - chrono::Duration::days(3);
        assert!(items[0].effective_last_activity() <= threshold);
    }

    #[test]
    fn test_record_activity_missing_id_returns_false() {
        let store = store();
        let found = store
            .record_activity("deadbeef", "note", Local::now().date_naive())
            .unwrap();
        assert!(!found);
    }

    #[test]
    fn test_record_activity_matches_on_id_prefix() {
        let store = store();
        let id = store.create("overlong id test", Priority::P2, false).unwrap();
        let oversized = format!("{id}-trailing-garbage");
        let found = store
            .record_activity(&oversized, "note", Local::now().date_naive())
            .unwrap();
        assert!(found);
    }
}
