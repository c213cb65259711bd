mod config;
pub mod database;

pub use config::{BehaviorConfig, Config, TimerConfig};
pub use database::{Database, WorkoutRecord, WorkoutStats};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the directory holding `config.toml` and the history database.
///
/// `FITROUND_DATA_DIR` wins when set. Otherwise `~/.config/fitround[-dev]/`
/// based on FITROUND_ENV; set FITROUND_ENV=dev to use the development
/// directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FITROUND_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FITROUND_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("fitround-dev")
            } else {
                base_dir.join("fitround")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
