mod config;
mod state;

pub use config::Config;
pub use state::{
    FocusSession, JsonFileStore, MemoryStore, PersistentState, StatePatch, StateStore, Task,
    TaskStatus, TemporaryAllows,
};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/bounce[-dev]/` based on BOUNCE_ENV.
///
/// Set BOUNCE_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("BOUNCE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("bounce-dev")
    } else {
        base_dir.join("bounce")
    };

    std::fs::create_dir_all(&dir).map_err(|e| StorageError::DataDir(e.to_string()))?;
    Ok(dir)
}
