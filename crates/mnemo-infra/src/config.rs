//! Configuration loader for mnemo.
//!
//! Reads `config.toml` from the data directory (`~/.mnemo/` in production)
//! and deserializes it into [`MemoryConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use mnemo_types::config::MemoryConfig;

/// Resolve the data directory: `MNEMO_DATA_DIR`, else `~/.mnemo`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MNEMO_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemo")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`MemoryConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_memory_config(data_dir: &Path) -> MemoryConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return MemoryConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return MemoryConfig::default();
        }
    };

    match toml::from_str::<MemoryConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            MemoryConfig::default()
        }
    }
}

/// Database URL: the configured one, else `sqlite://{data_dir}/mnemo.db`.
pub fn resolve_database_url(config: &MemoryConfig, data_dir: &Path) -> String {
    config
        .database_url
        .clone()
        .unwrap_or_else(|| format!("sqlite://{}/mnemo.db", data_dir.display()))
}
