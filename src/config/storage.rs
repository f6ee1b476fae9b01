use crate::config::schema::AppConfig;
use crate::error::{Result, SoulAgentError};
use std::path::PathBuf;

/// Directory where the config file, PID file, and logs live.
pub fn get_state_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("soul-agent")
}

pub fn get_config_path() -> PathBuf {
    get_state_dir().join("config.json")
}

/// Overlay `DEEPSEEK_API_KEY` onto a loaded or freshly-defaulted config,
/// per spec: the env var is substituted into config at load, unconditionally
/// of whether a config file already existed on disk.
fn apply_env_overrides(mut config: AppConfig) -> AppConfig {
    if config.llm.api_key.is_empty() {
        if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
            config.llm.api_key = key;
        }
    }
    config
}

/// Load the config file, applying environment-variable overrides. Falls
/// back to `AppConfig::default()` if the file is missing; an existing
/// but malformed file is a fatal startup error (the user needs to know
/// before the daemon silently runs with the wrong vault path).
pub fn load_config() -> Result<AppConfig> {
    let path = get_config_path();
    let config = if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw)?
    } else {
        AppConfig::default()
    };

    Ok(apply_env_overrides(config))
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let path = get_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| SoulAgentError::Config(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Create the config file with defaults if one does not already exist.
pub fn init_config() -> Result<AppConfig> {
    let path = get_config_path();
    if !path.exists() {
        let config = AppConfig::default();
        save_config(&config)?;
        Ok(apply_env_overrides(config))
    } else {
        load_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path() {
        let path = get_config_path();
        assert!(path.to_string_lossy().contains("soul-agent"));
    }

    #[test]
    fn test_default_config_loads_without_file() {
        // load_config falls back to defaults when nothing is on disk at
        // whatever path get_config_path() resolves to in the test sandbox;
        // this just checks it never errors.
        let cfg = load_config().unwrap();
        assert_eq!(cfg.queue.batch_size, 10);
    }
}
