//! Browser history poller: copies each browser's SQLite history DB to a
//! temp file (the browser holds a write lock on the original), opens it
//! read-only, and selects rows newer than an in-memory cursor.
//!
//! Grounded on the copy-then-open-readonly rusqlite pattern used by the
//! archive/data-daemon workers in this codebase's wider ecosystem.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::watch;

use crate::ingest::{IngestItem, IngestMeta, IngestQueue, Source};

const POLL_INTERVAL: Duration = Duration::from_secs(300);

const BLOCKED_PREFIXES: &[&str] = &[
    "chrome://",
    "about:",
    "data:",
    "blob:",
    "file://",
    "chrome-extension://",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Browser {
    Chrome,
    Safari,
}

fn history_path(browser: Browser) -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    match browser {
        Browser::Chrome => Some(
            home.join("Library/Application Support/Google/Chrome/Default/History"),
        ),
        Browser::Safari => Some(home.join("Library/Safari/History.db")),
    }
}

struct Row {
    url: String,
    title: String,
    visit_time: i64,
}

fn query_new_rows(browser: Browser, path: &PathBuf, cursor: i64) -> Result<Vec<Row>, String> {
    let tmp = std::env::temp_dir().join(format!("soul-agent-history-{:?}.db", browser));
    std::fs::copy(path, &tmp).map_err(|e| e.to_string())?;

    let conn = Connection::open_with_flags(&tmp, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| e.to_string())?;

    let query = match browser {
        Browser::Chrome => {
            "SELECT url, title, last_visit_time FROM urls WHERE last_visit_time > ?1 ORDER BY last_visit_time ASC"
        }
        Browser::Safari => {
            "SELECT hi.url, hv.title, hv.visit_time FROM history_items hi \
             JOIN history_visits hv ON hv.history_item = hi.id \
             WHERE hv.visit_time > ?1 ORDER BY hv.visit_time ASC"
        }
    };

    let mut stmt = conn.prepare(query).map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map([cursor], |row| {
            Ok(Row {
                url: row.get(0)?,
                title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                visit_time: row.get(2)?,
            })
        })
        .map_err(|e| e.to_string())?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| e.to_string())?);
    }
    let _ = std::fs::remove_file(&tmp);
    Ok(out)
}

fn is_blocked(url: &str) -> bool {
    BLOCKED_PREFIXES.iter().any(|p| url.starts_with(p))
}

pub async fn run(queue: Arc<IngestQueue>, mut shutdown: watch::Receiver<bool>) {
    let mut cursors: HashMap<Browser, i64> = HashMap::new();
    let mut interval = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                for browser in [Browser::Chrome, Browser::Safari] {
                    poll_one(browser, &queue, &mut cursors);
                }
            }
        }
    }
    tracing::info!("browser history poller stopped");
}

fn poll_one(browser: Browser, queue: &Arc<IngestQueue>, cursors: &mut HashMap<Browser, i64>) {
    let Some(path) = history_path(browser) else {
        return;
    };
    if !path.exists() {
        return;
    }

    let cursor = *cursors.get(&browser).unwrap_or(&0);
    match query_new_rows(browser, &path, cursor) {
        Ok(rows) => {
            let mut max_visit = cursor;
            for row in rows {
                max_visit = max_visit.max(row.visit_time);
                if is_blocked(&row.url) {
                    continue;
                }
                let text = format!("{} — {}", row.title, row.url);
                queue.put(
                    IngestItem::new(text, Source::Browser).with_meta(IngestMeta::Browser {
                        url: row.url,
                        title: row.title,
                    }),
                );
            }
            cursors.insert(browser, max_visit);
        }
        Err(e) => tracing::debug!("browser history poll failed for {:?}: {}", browser, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_prefixes() {
        assert!(is_blocked("chrome://settings"));
        assert!(is_blocked("about:blank"));
        assert!(!is_blocked("https://example.com"));
    }
}
