//! Configuration loader for Mnemo.
//!
//! Reads `config.toml` from the data directory (`~/.mnemo/` by default) and
//! deserializes it into [`MnemoConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use mnemo_types::config::MnemoConfig;

/// Resolve the data directory from `MNEMO_DATA_DIR`, falling back to
/// `~/.mnemo`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MNEMO_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemo")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`MnemoConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> MnemoConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return MnemoConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return MnemoConfig::default();
        }
    };

    match toml::from_str::<MnemoConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            MnemoConfig::default()
        }
    }
}

/// Path of the SQLite database file inside the data directory.
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("mnemo.db")
}

/// SQLite connection URL for the database file.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", database_path(data_dir).display())
}

/// Path of the LanceDB vector store inside the data directory.
pub fn vector_store_path(data_dir: &Path) -> PathBuf {
    data_dir.join("vector_store")
}

/// Path of the backups directory inside the data directory.
pub fn backups_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("backups")
}
