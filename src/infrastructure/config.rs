use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
pub const DEFAULT_STORAGE_KEY: &str = "@pomodoro-timer: cycles-state-1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    pub app_name: String,
    pub timezone: String,
    pub storage_key: String,
    pub tick_interval_ms: u64,
    pub min_minutes: u32,
    pub max_minutes: u32,
    pub minutes_step: u32,
    #[serde(default)]
    pub task_suggestions: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            app_name: "Pomodoro Timer".to_string(),
            timezone: "UTC".to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            tick_interval_ms: 1_000,
            min_minutes: 5,
            max_minutes: 60,
            minutes_step: 5,
            task_suggestions: vec![
                "Project 1".to_string(),
                "Project 2".to_string(),
                "Project 3".to_string(),
            ],
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.storage_key.trim().is_empty() {
            return Err(InfraError::InvalidConfig(
                "storageKey must not be empty".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(InfraError::InvalidConfig(
                "tickIntervalMs must be > 0".to_string(),
            ));
        }
        if self.min_minutes == 0 || self.min_minutes > self.max_minutes {
            return Err(InfraError::InvalidConfig(format!(
                "minutes range {}..={} is invalid",
                self.min_minutes, self.max_minutes
            )));
        }
        if self.minutes_step == 0 {
            return Err(InfraError::InvalidConfig(
                "minutesStep must be > 0".to_string(),
            ));
        }
        self.time_zone()?;
        Ok(())
    }

    pub fn time_zone(&self) -> Result<Tz, InfraError> {
        self.timezone.trim().parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("invalid timezone '{}': {error}", self.timezone))
        })
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let raw = read_config(&config_dir.join(APP_JSON))?;
    let config: AppConfig = serde_json::from_value(raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_CONFIG: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_CONFIG.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "pomodoro-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn default_config_is_written_and_loaded() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let config = load_app_config(&dir.path).expect("load config");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempConfigDir::new();
        let mut custom = AppConfig::default();
        custom.timezone = "Asia/Tokyo".to_string();
        fs::write(
            dir.path.join(APP_JSON),
            serde_json::to_string(&custom).expect("serialize config"),
        )
        .expect("write config");

        ensure_default_configs(&dir.path).expect("ensure defaults");
        let loaded = load_app_config(&dir.path).expect("load config");
        assert_eq!(loaded.timezone, "Asia/Tokyo");
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema": 2}"#).expect("write config");

        match load_app_config(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_timezone_and_range_are_rejected() {
        let mut config = AppConfig::default();
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.min_minutes = 90;
        assert!(config.validate().is_err());
    }
}
