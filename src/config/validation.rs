use crate::config::schema::AppConfig;
use crate::error::{Result, SoulAgentError};

/// Validate a loaded/edited config before it is used to construct app
/// state. Mirrors the "fatal at startup" error class: an invalid vault
/// path or nonsensical queue parameters should abort the process.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.vault_path.as_os_str().is_empty() {
        return Err(SoulAgentError::Validation(
            "vault_path must not be empty".to_string(),
        ));
    }
    if config.queue.batch_size == 0 {
        return Err(SoulAgentError::Validation(
            "queue.batch_size must be > 0".to_string(),
        ));
    }
    if !is_valid_hh_mm(&config.insight.daily_time) {
        return Err(SoulAgentError::Validation(format!(
            "insight.daily_time must be HH:MM, got {}",
            config.insight.daily_time
        )));
    }
    Ok(())
}

fn is_valid_hh_mm(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return false;
    }
    match (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
        (Ok(h), Ok(m)) => h < 24 && m < 60,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_daily_time() {
        let mut config = AppConfig::default();
        config.insight.daily_time = "25:99".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = AppConfig::default();
        config.queue.batch_size = 0;
        assert!(validate_config(&config).is_err());
    }
}
