//! Terminal-command sink: buffers commands per shell session (keyed by a
//! token supplied by the shell hook) and flushes either on 5s idle or
//! once 10 commands accumulate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::ingest::{IngestItem, IngestMeta, IngestQueue, Source};

const MAX_COMMANDS: usize = 10;
const IDLE_FLUSH: Duration = Duration::from_secs(5);

struct Session {
    commands: Vec<CommandEntry>,
    last_activity: Instant,
}

#[derive(Clone)]
struct CommandEntry {
    command: String,
    exit_code: i32,
    duration_ms: u64,
}

pub struct TerminalBuffers {
    sessions: Mutex<HashMap<String, Session>>,
}

impl TerminalBuffers {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Record a command; flushes immediately if the session reaches
    /// `MAX_COMMANDS`.
    pub fn add_command(
        &self,
        queue: &IngestQueue,
        token: &str,
        command: String,
        exit_code: i32,
        duration_ms: u64,
    ) {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(token.to_string()).or_insert_with(|| Session {
            commands: Vec::new(),
            last_activity: Instant::now(),
        });
        session.commands.push(CommandEntry {
            command,
            exit_code,
            duration_ms,
        });
        session.last_activity = Instant::now();

        if session.commands.len() >= MAX_COMMANDS {
            let commands = std::mem::take(&mut session.commands);
            sessions.remove(token);
            drop(sessions);
            flush_commands(queue, commands);
        }
    }

    /// Flush any session idle for at least `IDLE_FLUSH`. Called from a
    /// periodic sweep task.
    pub fn sweep_idle(&self, queue: &IngestQueue) {
        let mut to_flush = Vec::new();
        {
            let mut sessions = self.sessions.lock();
            let now = Instant::now();
            let idle_tokens: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| !s.commands.is_empty() && now.duration_since(s.last_activity) >= IDLE_FLUSH)
                .map(|(k, _)| k.clone())
                .collect();
            for token in idle_tokens {
                if let Some(session) = sessions.remove(&token) {
                    to_flush.push(session.commands);
                }
            }
        }
        for commands in to_flush {
            flush_commands(queue, commands);
        }
    }
}

impl Default for TerminalBuffers {
    fn default() -> Self {
        Self::new()
    }
}

fn flush_commands(queue: &IngestQueue, commands: Vec<CommandEntry>) {
    if commands.is_empty() {
        return;
    }
    let summary = commands
        .iter()
        .map(|c| format!("{} (exit {})", c.command, c.exit_code))
        .collect::<Vec<_>>()
        .join("; ");

    let last = commands.last().unwrap();
    queue.put(IngestItem::new(summary, Source::Terminal).with_meta(IngestMeta::Terminal {
        command: last.command.clone(),
        exit_code: last.exit_code,
        duration_ms: last.duration_ms,
    }));
}

pub async fn run_sweep(
    queue: Arc<IngestQueue>,
    buffers: Arc<TerminalBuffers>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                buffers.sweep_idle(&queue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_at_max_commands() {
        let queue = IngestQueue::new(100, Duration::from_secs(60), Duration::from_secs(60));
        let buffers = TerminalBuffers::new();
        for i in 0..MAX_COMMANDS {
            buffers.add_command(&queue, "tok", format!("cmd-{i}"), 0, 10);
        }
        assert_eq!(queue.pending_count(), 1);
    }
}
