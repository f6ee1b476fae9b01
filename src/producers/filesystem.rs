//! Filesystem watcher: watches the configured roots for created/modified
//! files, filters noise directories and binary extensions, and emits a
//! short preview of the new content.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;

use crate::ingest::{IngestItem, IngestMeta, IngestQueue, Source};

const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "__pycache__", ".venv", "venv", ".tox"];
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitkeep"];
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "zip", "tar", "gz", "exe", "dll", "so", "dylib",
    "pdf", "mp4", "mp3", "mov", "bin",
];

/// Minimum time since last modification before a preview is emitted, to
/// avoid reading a file mid-write.
const MIN_AGE: Duration = Duration::from_millis(500);

fn is_ignored(path: &Path) -> bool {
    if path
        .components()
        .any(|c| IGNORED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
    {
        return true;
    }
    if let Some(name) = path.file_name().map(|n| n.to_string_lossy()) {
        if IGNORED_FILES.contains(&name.as_ref()) {
            return true;
        }
    }
    if let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) {
        if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
    }
    false
}

fn action_for(kind: &EventKind) -> Option<&'static str> {
    match kind {
        EventKind::Create(_) => Some("created"),
        EventKind::Modify(_) => Some("modified"),
        _ => None,
    }
}

fn preview(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    Some(content.chars().take(500).collect())
}

pub async fn run(
    queue: Arc<IngestQueue>,
    watch_dirs: Vec<PathBuf>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (tx, rx) = std::sync::mpsc::channel::<notify::Result<Event>>();

    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!("failed to create filesystem watcher, disabling producer: {e}");
            return;
        }
    };

    for dir in &watch_dirs {
        if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
            tracing::warn!("failed to watch {:?}: {}", dir, e);
        }
    }

    // notify delivers on a std channel from its own OS thread; bridge it
    // into the async world with blocking receives on a dedicated task.
    let (async_tx, mut async_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    std::thread::spawn(move || {
        while let Ok(Ok(event)) = rx.recv() {
            if async_tx.send(event).is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            event = async_rx.recv() => {
                let Some(event) = event else { break };
                handle_event(&queue, event).await;
            }
        }
    }
    tracing::info!("filesystem watcher stopped");
}

async fn handle_event(queue: &Arc<IngestQueue>, event: Event) {
    let Some(action) = action_for(&event.kind) else {
        return;
    };

    for path in event.paths {
        if is_ignored(&path) {
            continue;
        }

        if let Ok(meta) = std::fs::metadata(&path) {
            if let Ok(modified) = meta.modified() {
                if modified.elapsed().map(|e| e < MIN_AGE).unwrap_or(false) {
                    tokio::time::sleep(MIN_AGE).await;
                }
            }
        }

        let Some(content) = preview(&path) else {
            continue;
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let text = format!("[{action}] {filename}: {content}");
        queue.put(
            IngestItem::new(text, Source::File).with_meta(IngestMeta::File {
                path: path.to_string_lossy().to_string(),
                action: action.to_string(),
                filename,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ignored_directory() {
        assert!(is_ignored(Path::new("/repo/node_modules/pkg/index.js")));
        assert!(is_ignored(Path::new("/repo/.git/HEAD")));
    }

    #[test]
    fn test_is_ignored_filename() {
        assert!(is_ignored(Path::new("/dir/.DS_Store")));
    }

    #[test]
    fn test_is_ignored_binary_extension() {
        assert!(is_ignored(Path::new("/dir/photo.png")));
        assert!(!is_ignored(Path::new("/dir/notes.md")));
    }
}
