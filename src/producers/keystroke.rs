//! Keystroke tap: buffers typed characters from a system-wide keyboard
//! event source, suppressing capture while a "dedicated" application
//! (terminal, tool client) is frontmost. Degrades silently if the OS
//! denies accessibility permission.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::ingest::{IngestItem, IngestQueue, Source};

const IDLE_FLUSH: Duration = Duration::from_secs(5);
const MIN_FLUSH_LEN: usize = 10;

/// Reports which application is currently frontmost. Behind a trait so
/// the producer's buffering/suppression logic is testable without a real
/// OS focus-tracking implementation.
pub trait FrontmostApp: Send + Sync {
    fn bundle_id(&self) -> Option<String>;
}

/// Best-effort stub: this pack's target platform has no generic "active
/// window" API, so dedicated-app suppression is a deterministic no-op
/// here. A real deployment supplies a platform-specific implementation.
pub struct NoFrontmostApp;

impl FrontmostApp for NoFrontmostApp {
    fn bundle_id(&self) -> Option<String> {
        None
    }
}

fn is_suppressed(frontmost: &dyn FrontmostApp, dedicated_apps: &[String]) -> bool {
    match frontmost.bundle_id() {
        Some(id) => dedicated_apps.iter().any(|d| d == &id),
        None => false,
    }
}

pub async fn run(
    queue: Arc<IngestQueue>,
    dedicated_apps: Vec<String>,
    frontmost: Arc<dyn FrontmostApp>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<char>();

    std::thread::spawn(move || {
        let callback = move |event: rdev::Event| {
            if let rdev::EventType::KeyPress(key) = event.event_type {
                if let Some(ch) = key_to_char(key) {
                    let _ = tx.send(ch);
                }
            }
        };
        if let Err(e) = rdev::listen(callback) {
            tracing::warn!("keystroke tap disabled, listen failed: {:?}", e);
        }
    });

    let mut buffer = String::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            ch = rx.recv() => {
                let Some(ch) = ch else { break };
                if is_suppressed(frontmost.as_ref(), &dedicated_apps) {
                    continue;
                }
                buffer.push(ch);
            }
            _ = tokio::time::sleep(IDLE_FLUSH), if !buffer.is_empty() => {
                flush(&queue, &mut buffer);
            }
        }
    }
    flush(&queue, &mut buffer);
    tracing::info!("keystroke tap stopped");
}

fn flush(queue: &Arc<IngestQueue>, buffer: &mut String) {
    if buffer.len() >= MIN_FLUSH_LEN {
        queue.put(IngestItem::new(buffer.clone(), Source::InputMethod));
    }
    buffer.clear();
}

fn key_to_char(key: rdev::Key) -> Option<char> {
    use rdev::Key::*;
    match key {
        Space => Some(' '),
        KeyA => Some('a'),
        KeyB => Some('b'),
        KeyC => Some('c'),
        KeyD => Some('d'),
        KeyE => Some('e'),
        KeyF => Some('f'),
        KeyG => Some('g'),
        KeyH => Some('h'),
        KeyI => Some('i'),
        KeyJ => Some('j'),
        KeyK => Some('k'),
        KeyL => Some('l'),
        KeyM => Some('m'),
        KeyN => Some('n'),
        KeyO => Some('o'),
        KeyP => Some('p'),
        KeyQ => Some('q'),
        KeyR => Some('r'),
        KeyS => Some('s'),
        KeyT => Some('t'),
        KeyU => Some('u'),
        KeyV => Some('v'),
        KeyW => Some('w'),
        KeyX => Some('x'),
        KeyY => Some('y'),
        KeyZ => Some('z'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedApp(Option<String>);
    impl FrontmostApp for FixedApp {
        fn bundle_id(&self) -> Option<String> {
            self.0.clone()
        }
    }

    #[test]
    fn test_suppression_when_dedicated_app_frontmost() {
        let app = FixedApp(Some("com.apple.Terminal".to_string()));
        let dedicated = vec!["com.apple.Terminal".to_string()];
        assert!(is_suppressed(&app, &dedicated));
    }

    #[test]
    fn test_no_suppression_for_other_apps() {
        let app = FixedApp(Some("com.apple.Safari".to_string()));
        let dedicated = vec!["com.apple.Terminal".to_string()];
        assert!(!is_suppressed(&app, &dedicated));
    }

    #[test]
    fn test_flush_below_min_length_drops() {
        let queue = Arc::new(IngestQueue::new(
            10,
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let mut buffer = "short".to_string();
        flush(&queue, &mut buffer);
        assert_eq!(queue.pending_count(), 0);
        assert!(buffer.is_empty());
    }
}
