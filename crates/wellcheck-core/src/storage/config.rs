//! TOML-based application configuration.
//!
//! Stores:
//! - the backing-store key for quiz progress
//! - auto-save switch and interval
//! - content locale and an optional question bank file
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::content::{ContentLibrary, FALLBACK_LOCALE};
use crate::error::{ConfigError, ContentError};
use crate::persistence::{AutoSave, DEFAULT_AUTOSAVE_INTERVAL_SECS, DEFAULT_STORAGE_KEY};

/// Progress storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_key")]
    pub key: String,
}

/// Auto-save configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Question content configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_locale")]
    pub locale: String,
    /// TOML question bank replacing the built-in one.
    #[serde(default)]
    pub bank_path: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.into()
}
fn default_true() -> bool {
    true
}
fn default_interval_secs() -> u64 {
    DEFAULT_AUTOSAVE_INTERVAL_SECS as u64
}
fn default_locale() -> String {
    FALLBACK_LOCALE.into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: default_storage_key(),
        }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            bank_path: None,
        }
    }
}

impl AppConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or the
    /// defaults cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there when it does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or the
    /// defaults cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk, returning defaults on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Dot-separated keys of every leaf value.
    pub fn keys(&self) -> Vec<String> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<String>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let path = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&path, v, out);
                    }
                }
                _ => out.push(prefix.to_string()),
            }
        }

        let mut keys = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut keys);
        }
        keys
    }

    /// Set a config value by key in memory. Call [`AppConfig::save`] to
    /// persist.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value has the wrong type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Auto-save policy described by this config.
    pub fn autosave_policy(&self) -> AutoSave {
        if self.autosave.enabled {
            let secs = i64::try_from(self.autosave.interval_secs).unwrap_or(i64::MAX);
            AutoSave::new(chrono::Duration::seconds(secs.max(1)))
        } else {
            AutoSave::disabled()
        }
    }

    /// Question bank named by `content.bank_path`, or the built-in one.
    ///
    /// # Errors
    /// Returns an error if the bank cannot be read or parsed.
    pub fn content_library(&self) -> Result<ContentLibrary, ContentError> {
        match self.content.bank_path.as_deref() {
            Some(path) if !path.is_empty() => ContentLibrary::load(Path::new(path)),
            _ => ContentLibrary::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::QuestionBank;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = AppConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: AppConfig = toml::from_str("[autosave]\nenabled = false\n").unwrap();
        assert!(!parsed.autosave.enabled);
        assert_eq!(parsed.autosave.interval_secs, 10);
        assert_eq!(parsed.storage.key, DEFAULT_STORAGE_KEY);
        assert_eq!(parsed.content.locale, "en");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.get("autosave.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("autosave.interval_secs").as_deref(), Some("10"));
        assert_eq!(cfg.get("storage.key").as_deref(), Some("wellcheck-progress"));
        assert!(cfg.get("autosave.missing_key").is_none());
        assert!(cfg.get("autosave").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = AppConfig::default();
        cfg.set("autosave.enabled", "false").unwrap();
        cfg.set("autosave.interval_secs", "30").unwrap();
        cfg.set("content.locale", "de").unwrap();
        cfg.set("content.bank_path", "/tmp/bank.toml").unwrap();

        assert!(!cfg.autosave.enabled);
        assert_eq!(cfg.autosave.interval_secs, 30);
        assert_eq!(cfg.content.locale, "de");
        assert_eq!(cfg.content.bank_path.as_deref(), Some("/tmp/bank.toml"));
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = AppConfig::default();
        let err = cfg.set("autosave.nonexistent_key", "1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
        assert!(cfg.set("", "1").is_err());
        assert!(cfg.set("autosave", "1").is_err());
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = AppConfig::default();
        let err = cfg.set("autosave.enabled", "not_a_bool").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(cfg.set("autosave.interval_secs", "-3").is_err());
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn keys_lists_every_leaf() {
        let keys = AppConfig::default().keys();
        assert!(keys.contains(&"storage.key".to_string()));
        assert!(keys.contains(&"autosave.interval_secs".to_string()));
        assert!(keys.contains(&"content.locale".to_string()));
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(path.exists());

        let mut changed = cfg;
        changed.set("storage.key", "other").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap().storage.key, "other");
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "autosave = 5").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn autosave_policy_follows_config() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.autosave_policy().interval(), chrono::Duration::seconds(10));
        cfg.autosave.enabled = false;
        assert!(!cfg.autosave_policy().is_enabled());
    }

    #[test]
    fn content_library_defaults_to_builtin() {
        let cfg = AppConfig::default();
        let library = cfg.content_library().unwrap();
        assert!(!library.questions("stage1", "en").is_empty());
    }
}
