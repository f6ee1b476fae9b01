//! Clipboard poller: emits when the clipboard text changes and is
//! non-empty, truncated to 10,000 chars.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::ingest::{IngestItem, IngestQueue, Source};

const POLL_INTERVAL: Duration = Duration::from_secs(3);
const MAX_LEN: usize = 10_000;

pub async fn run(queue: Arc<IngestQueue>, mut shutdown: watch::Receiver<bool>) {
    let mut last: Option<String> = None;
    let mut interval = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                match read_clipboard() {
                    Ok(text) if !text.is_empty() && last.as_deref() != Some(text.as_str()) => {
                        let emitted: String = text.chars().take(MAX_LEN).collect();
                        queue.put(IngestItem::new(emitted, Source::Clipboard));
                        last = Some(text);
                    }
                    Err(e) => {
                        tracing::debug!("clipboard read failed, skipping: {e}");
                    }
                    _ => {}
                }
            }
        }
    }
    tracing::info!("clipboard poller stopped");
}

fn read_clipboard() -> Result<String, String> {
    let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
    clipboard.get_text().map_err(|e| e.to_string())
}
