//! Configuration schema for the daemon.
//!
//! Serialized as JSON (see `storage.rs`); field names match the external
//! configuration file format exactly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_http_port() -> u16 {
    8330
}

fn default_batch_size() -> usize {
    10
}

fn default_flush_interval() -> u64 {
    60
}

fn default_dedup_window() -> u64 {
    60
}

fn default_watch_dirs() -> Vec<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    vec![
        home.join("Desktop"),
        home.join("Documents"),
        home.join("Downloads"),
    ]
}

fn default_daily_time() -> String {
    "20:00".to_string()
}

fn default_stale_days() -> i64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_api_base() -> String {
    "https://api.deepseek.com/v1".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: String::new(),
            api_base: default_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,
    #[serde(default = "default_dedup_window")]
    pub dedup_window: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval: default_flush_interval(),
            dedup_window: default_dedup_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputHookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub dedicated_apps: Vec<String>,
}

impl Default for InputHookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dedicated_apps: vec![
                "com.apple.Terminal".to_string(),
                "com.googlecode.iterm2".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    #[serde(default = "default_daily_time")]
    pub daily_time: String,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            daily_time: default_daily_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoConfig {
    #[serde(default = "default_stale_days")]
    pub stale_days: i64,
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self {
            stale_days: default_stale_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub vault_path: PathBuf,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default = "default_watch_dirs")]
    pub watch_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub input_hook: InputHookConfig,
    #[serde(default)]
    pub insight: InsightConfig,
    #[serde(default)]
    pub todo: TodoConfig,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        let vault_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("soul-vault");
        Self {
            vault_path,
            llm: LlmConfig::default(),
            queue: QueueConfig::default(),
            watch_dirs: default_watch_dirs(),
            input_hook: InputHookConfig::default(),
            insight: InsightConfig::default(),
            todo: TodoConfig::default(),
            http_port: default_http_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.queue.batch_size, 10);
        assert_eq!(cfg.queue.flush_interval, 60);
        assert_eq!(cfg.insight.daily_time, "20:00");
        assert_eq!(cfg.http_port, 8330);
    }

    #[test]
    fn test_round_trip() {
        let cfg = AppConfig::default();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vault_path, cfg.vault_path);
        assert_eq!(back.queue.batch_size, cfg.queue.batch_size);
    }
}
