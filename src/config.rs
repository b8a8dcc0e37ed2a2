use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from `archivist.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Root directory containing `projects/` (supports `~` expansion).
    pub root: String,
    /// Directory holding the index DB, backups, and scratch files.
    pub data_dir: String,
    /// Default log level when `RUST_LOG` is not set.
    pub log_level: String,

    pub sqlite: SqliteConfig,
    pub backup: BackupConfig,
    pub runtime: RuntimeConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            root: "~/.claude".to_string(),
            data_dir: "~/.local/share/archivist".to_string(),
            log_level: "info".to_string(),
            sqlite: SqliteConfig::default(),
            backup: BackupConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Resolve `root`, expanding `~`.
    pub fn resolved_root(&self) -> PathBuf {
        expand_tilde(&self.root)
    }

    /// Resolve `data_dir`, expanding `~`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.data_dir)
    }

    /// Path to the index database inside `data_dir`.
    pub fn db_path(&self) -> PathBuf {
        self.resolved_data_dir().join("index.db")
    }

    /// Path to the backup root inside `data_dir`.
    pub fn backup_root(&self) -> PathBuf {
        self.resolved_data_dir().join("backups")
    }

    pub fn resolved_log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub cache_size_mb: u32,
    pub mmap_size_mb: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            cache_size_mb: 64,
            mmap_size_mb: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub interval_minutes: u32,
    pub max_backups: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            max_backups: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub scrollback_bytes: usize,
    pub spawn_timeout_ms: u64,
    pub client_backpressure_bytes: usize,
    /// External binary resumed as the PTY child (spec §4.7: "a
    /// pseudo-terminal-backed external binary").
    pub child_program: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scrollback_bytes: 1024 * 1024,
            spawn_timeout_ms: 5000,
            client_backpressure_bytes: 4 * 1024 * 1024,
            child_program: "claude".to_string(),
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Returns the default config file path: `~/.archivist/archivist.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".archivist")
        .join("archivist.toml")
}

/// Load configuration from a TOML file.
///
/// - If `path` is `Some`, reads that file (errors if missing or invalid).
/// - If `path` is `None`, tries the default path; returns defaults if the file doesn't exist.
pub fn load_config(path: Option<&Path>) -> Result<CoreConfig> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path(),
    };

    if !config_path.exists() {
        if path.is_some() {
            anyhow::bail!("config file not found: {}", config_path.display());
        }
        return Ok(CoreConfig::default());
    }

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config file: {}", config_path.display()))?;

    let config: CoreConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", config_path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.sqlite.cache_size_mb, 64);
        assert_eq!(config.backup.interval_minutes, 60);
        assert_eq!(config.runtime.spawn_timeout_ms, 5000);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/foo/bar");
        assert!(expanded.to_string_lossy().ends_with("foo/bar"));
        assert!(!expanded.to_string_lossy().starts_with('~'));

        let plain = expand_tilde("/absolute/path");
        assert_eq!(plain, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_load_missing_default_returns_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.backup.max_backups, 10);
    }

    #[test]
    fn test_load_explicit_missing_errors() {
        let result = load_config(Some(Path::new("/nonexistent/archivist.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
            log_level = "debug"

            [backup]
            interval_minutes = 30
        "#;
        let config: CoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backup.interval_minutes, 30);
        // Unset fields get defaults
        assert_eq!(config.sqlite.cache_size_mb, 64);
        assert_eq!(config.backup.max_backups, 10);
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path
            .to_string_lossy()
            .ends_with(".archivist/archivist.toml"));
    }
}
