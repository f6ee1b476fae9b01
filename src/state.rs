use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::RwLock;

use crate::api::terminal::TerminalBuffers;
use crate::classifier::{Classifier, OpenAiCompatibleProvider};
use crate::config::AppConfig;
use crate::dailylog::DailyLog;
use crate::error::Result;
use crate::ingest::IngestQueue;
use crate::todo::TodoStore;
use crate::vault::VaultStore;

/// Shared, explicitly-wired application state. Constructed once at
/// startup and cloned (cheaply, via `Arc`) into every task and handler
/// that needs it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<AppConfig>>,
    pub vault: Arc<VaultStore>,
    pub queue: Arc<IngestQueue>,
    pub todo_store: Arc<TodoStore>,
    pub daily_log: Arc<DailyLog>,
    pub classifier: Arc<Classifier>,
    pub terminal_buffers: Arc<TerminalBuffers>,
    pub started_at: DateTime<Local>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let vault = Arc::new(VaultStore::new(config.vault_path.clone())?);
        let queue = Arc::new(IngestQueue::new(
            config.queue.batch_size,
            Duration::from_secs(config.queue.flush_interval),
            Duration::from_secs(config.queue.dedup_window),
        ));
        let todo_store = Arc::new(TodoStore::new(vault.clone()));
        let daily_log = Arc::new(DailyLog::new(vault.clone()));
        let provider = Box::new(OpenAiCompatibleProvider::new(&config.llm));
        let classifier = Arc::new(Classifier::new(provider));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            vault,
            queue,
            todo_store,
            daily_log,
            classifier,
            terminal_buffers: Arc::new(TerminalBuffers::new()),
            started_at: Local::now(),
        })
    }
}
