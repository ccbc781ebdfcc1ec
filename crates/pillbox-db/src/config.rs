//! # Application Configuration
//!
//! Where the database lives, how many requests each repository runs at
//! once, and the default log filter.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     PILLBOX_DB_PATH=/data/pillbox.db                                    │
//! │     PILLBOX_MEDICATION_WORKERS=4                                        │
//! │     PILLBOX_RECORD_WORKERS=2                                            │
//! │     PILLBOX_LOG=info,pillbox=debug                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/pillbox/pillbox.toml (Linux)                              │
//! │     ~/Library/Application Support/com.pillbox.pillbox/pillbox.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     pillbox.db in the platform data dir, 4 / 2 workers                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/home/me/.local/share/pillbox/pillbox.db"
//! max_connections = 5
//!
//! [workers]
//! medication = 4
//! records = 2
//!
//! [logging]
//! filter = "info,pillbox=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::pool::DbConfig;

/// Log filter used when neither the config nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_FILTER: &str = "info,pillbox=debug,sqlx=warn";

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `pillbox.db` in the platform data dir.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Apply pending migrations on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "pillbox", "pillbox")
        .map(|dirs| dirs.data_dir().join("pillbox.db"))
        .unwrap_or_else(|| PathBuf::from("pillbox.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            run_migrations: true,
        }
    }
}

/// `[workers]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Concurrent medication requests.
    #[serde(default = "default_medication_workers")]
    pub medication: usize,

    /// Concurrent intake record, health diary and user requests (each).
    #[serde(default = "default_record_workers")]
    pub records: usize,
}

fn default_medication_workers() -> usize {
    4
}

fn default_record_workers() -> usize {
    2
}

impl Default for WorkerSettings {
    fn default() -> Self {
        WorkerSettings {
            medication: default_medication_workers(),
            records: default_record_workers(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// App Configuration
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub workers: WorkerSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (pillbox.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Saves configuration to file, creating the parent directory.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers.medication == 0 {
            return Err(ConfigError::Invalid(
                "workers.medication must be greater than 0".into(),
            ));
        }

        if self.workers.records == 0 {
            return Err(ConfigError::Invalid(
                "workers.records must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// The pool configuration this app config describes.
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .run_migrations(self.database.run_migrations)
            .medication_workers(self.workers.medication)
            .record_workers(self.workers.records)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("PILLBOX_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(workers) = var("PILLBOX_MEDICATION_WORKERS") {
            match workers.parse::<usize>() {
                Ok(n) => self.workers.medication = n,
                Err(_) => warn!(value = %workers, "Ignoring invalid PILLBOX_MEDICATION_WORKERS"),
            }
        }

        if let Some(workers) = var("PILLBOX_RECORD_WORKERS") {
            match workers.parse::<usize>() {
                Ok(n) => self.workers.records = n,
                Err(_) => warn!(value = %workers, "Ignoring invalid PILLBOX_RECORD_WORKERS"),
            }
        }

        if let Some(filter) = var("PILLBOX_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pillbox", "pillbox")
            .map(|dirs| dirs.config_dir().join("pillbox.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.workers.medication, 4);
        assert_eq!(config.workers.records, 2);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
        assert!(config.database.path.ends_with("pillbox.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.workers.medication = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.workers.medication = 1;
        config.workers.records = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [workers]
            medication = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.workers.medication, 8);
        assert_eq!(config.workers.records, 2);
        assert!(config.database.run_migrations);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PILLBOX_DB_PATH", "/tmp/override.db"),
            ("PILLBOX_RECORD_WORKERS", "3"),
            ("PILLBOX_MEDICATION_WORKERS", "many"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.workers.records, 3);
        assert_eq!(config.workers.medication, 4);

        let db = config.to_db_config();
        assert_eq!(db.database_path, PathBuf::from("/tmp/override.db"));
        assert_eq!(db.record_workers, 3);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pillbox.toml");

        let mut config = AppConfig::default();
        config.database.path = dir.path().join("pillbox.db");
        config.logging.filter = "warn".to_string();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[workers]"));

        let loaded: AppConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded, config);
    }
}
