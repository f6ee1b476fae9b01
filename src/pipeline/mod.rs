//! Pipeline consumer: drains the ingest queue, classifies batches, and
//! fans results out to the daily log, vault store, and to-do store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;

use crate::classifier::Classifier;
use crate::dailylog::DailyLog;
use crate::ingest::{ActionType, ClassifiedItem, IngestQueue};
use crate::todo::{Priority, TodoStore};
use crate::vault::VaultStore;

pub struct Pipeline {
    queue: Arc<IngestQueue>,
    classifier: Arc<Classifier>,
    todo_store: Arc<TodoStore>,
    daily_log: Arc<DailyLog>,
    vault: Arc<VaultStore>,
}

impl Pipeline {
    pub fn new(
        queue: Arc<IngestQueue>,
        classifier: Arc<Classifier>,
        todo_store: Arc<TodoStore>,
        daily_log: Arc<DailyLog>,
        vault: Arc<VaultStore>,
    ) -> Self {
        Self {
            queue,
            classifier,
            todo_store,
            daily_log,
            vault,
        }
    }

    /// Runs until `shutdown` flips to `true`. On stop it drains one final
    /// batch before exiting.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let batch = self.queue.get_batch(Some(Duration::from_millis(0))).await;
                        if !batch.is_empty() {
                            self.process_batch(batch).await;
                        }
                        break;
                    }
                }
                batch = self.queue.get_batch(Some(Duration::from_secs(2))) => {
                    if !batch.is_empty() {
                        self.process_batch(batch).await;
                    }
                }
            }
        }
        tracing::info!("pipeline consumer stopped");
    }

    async fn process_batch(&self, batch: Vec<crate::ingest::IngestItem>) {
        let active_todos = self.todo_store.active_summaries().unwrap_or_else(|e| {
            tracing::warn!("failed to load active todos: {e}");
            Vec::new()
        });

        let classified = self.classifier.classify(&batch, &active_todos).await;
        for item in classified {
            self.apply_side_effects(&item);
        }
    }

    fn apply_side_effects(&self, c: &ClassifiedItem) {
        if let Err(e) = self.daily_log.append(
            c.text(),
            c.source().as_str(),
            c.timestamp(),
            Some(c.category.as_str()),
            &c.tags,
            c.importance,
        ) {
            tracing::warn!("daily log append failed: {e}");
        }

        if let Err(e) = self.vault.ingest_text(c.text(), c.source().as_str()) {
            tracing::warn!("vault ingest failed: {e}");
        }

        match c.action_type {
            Some(ActionType::NewTask) => {
                if let Some(detail) = &c.action_detail {
                    match self.todo_store.create(detail, Priority::P2, true) {
                        Ok(id) => tracing::info!("created todo {id} from {detail:?}"),
                        Err(e) => tracing::warn!("todo creation failed: {e}"),
                    }
                }
            }
            Some(ActionType::TaskProgress) | Some(ActionType::TaskDone) => {
                if let Some(id) = &c.related_todo_id {
                    let today = Local::now().date_naive();
                    match self.todo_store.record_activity(id, c.source().as_str(), today) {
                        Ok(found) if !found => {
                            tracing::warn!("related_todo_id {id} not found");
                        }
                        Err(e) => tracing::warn!("record_activity failed: {e}"),
                        _ => {}
                    }
                    if c.action_type == Some(ActionType::TaskDone) {
                        if let Err(e) = self.todo_store.complete(id) {
                            tracing::warn!("todo completion failed: {e}");
                        }
                    }
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::provider::{ChatMessage, LlmProvider};
    use crate::ingest::{IngestItem, Source};
    use async_trait::async_trait;

    struct FakeProvider {
        response: String,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, String> {
            Ok(self.response.clone())
        }
    }

    fn pipeline(response: &str) -> (Pipeline, Arc<IngestQueue>, Arc<VaultStore>, Arc<TodoStore>) {
        let dir = std::env::temp_dir().join(format!("pipeline-test-{}", uuid::Uuid::new_v4()));
        let vault = Arc::new(VaultStore::new(dir).unwrap());
        let queue = Arc::new(IngestQueue::new(10, Duration::from_secs(60), Duration::from_secs(60)));
        let todo_store = Arc::new(TodoStore::new(vault.clone()));
        let daily_log = Arc::new(DailyLog::new(vault.clone()));
        let classifier = Arc::new(Classifier::new(Box::new(FakeProvider {
            response: response.to_string(),
        })));
        let pipeline = Pipeline::new(queue.clone(), classifier, todo_store.clone(), daily_log, vault.clone());
        (pipeline, queue, vault, todo_store)
    }

    #[tokio::test]
    async fn test_new_task_creation() {
        let response = r#"[{"category":"work","tags":["planning"],"importance":4,"summary":"写周报","action_type":"new_task","action_detail":"写本周周报"}]"#;
        let (pipeline, queue, _vault, todo_store) = pipeline(response);
        queue.put(IngestItem::new("明天要写周报", Source::Note));
        let batch = queue.get_batch(Some(Duration::from_millis(10))).await;
        pipeline.process_batch(batch).await;

        let active = todo_store.list(Some(crate::todo::TodoStatus::Active)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].text, "写本周周报");
        assert!(active[0].auto_detected);
        assert_eq!(active[0].priority, Priority::P2);
    }
}
