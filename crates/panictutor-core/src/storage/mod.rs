mod config;
pub mod credentials;
pub mod database;
pub mod kv;

pub use config::{
    Config, CredentialBackend, GenerationConfig, MonitorConfig, NotificationsConfig,
    RetentionConfig, ScheduleConfig, TimetableConfig,
};
pub use credentials::ApiKeyStore;
pub use database::SqliteKvStore;
pub use kv::{KvStore, MemoryKvStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the directory holding `config.toml` and `panictutor.db`.
///
/// `PANICTUTOR_HOME` wins when set. Otherwise `~/.config/panictutor[-dev]/`
/// based on `PANICTUTOR_ENV` (set it to `dev` for a scratch directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("PANICTUTOR_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("PANICTUTOR_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("panictutor-dev")
            } else {
                base_dir.join("panictutor")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
