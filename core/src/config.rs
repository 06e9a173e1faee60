//! Configuration
//!
//! Loaded from `formcoach.toml`, looked up in this order:
//!
//! 1. Current directory (`./formcoach.toml`)
//! 2. User config directory (`~/.config/formcoach/formcoach.toml`)
//!
//! If neither exists the defaults apply. Environment variables then
//! override individual values:
//!
//! - `FORMCOACH_BASE_URL` → `store.base_url`
//! - `FORMCOACH_TIMEOUT_SECS` → `store.timeout_secs`
//! - `FORMCOACH_TOKEN` → `token`
//! - `FORMCOACH_LOG_FILE` → `log.file`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::counter::ThresholdConfig;
use crate::error::{CoachError, Result};
use crate::exercise::ExerciseKind;
use crate::store::{Credential, StoreConfig};

pub const CONFIG_FILE_NAME: &str = "formcoach.toml";

/// Logging settings consumed by the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub level: String,
    /// Append log lines here as well as to stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Bearer token for the store; anonymous when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub store: StoreConfig,
    pub squat: ThresholdConfig,
    pub pushup: ThresholdConfig,
    pub log: LogConfig,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            token: None,
            store: StoreConfig::default(),
            squat: ExerciseKind::Squat.default_thresholds(),
            pushup: ExerciseKind::Pushup.default_thresholds(),
            log: LogConfig::default(),
        }
    }
}

impl CoachConfig {
    /// Load from the standard locations, apply the environment, validate
    pub fn load() -> Result<Self> {
        let config = Self::load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Self::load`] but without validation, for commands that
    /// inspect or repair a broken configuration
    pub fn load_unvalidated() -> Result<Self> {
        Self::resolve(Self::find_config_file().as_deref(), |key| std::env::var(key).ok())
    }

    /// `path` (or the defaults) with overrides from `lookup` applied
    pub fn resolve<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::load_from(path)?
            }
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Parse one file; missing keys take their defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write as pretty TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// First existing config file in lookup order
    pub fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|path| path.exists())
    }

    /// `<config dir>/formcoach/formcoach.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        if let Some(dir) = dirs::config_dir() {
            return Some(dir.join("formcoach").join(CONFIG_FILE_NAME));
        }
        home::home_dir().map(|home| home.join(".config").join("formcoach").join(CONFIG_FILE_NAME))
    }

    /// Apply `FORMCOACH_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FORMCOACH_BASE_URL") {
            self.store.base_url = url;
        }
        if let Some(raw) = lookup("FORMCOACH_TIMEOUT_SECS") {
            self.store.timeout_secs = raw.trim().parse().map_err(|_| CoachError::InvalidConfig {
                message: format!("FORMCOACH_TIMEOUT_SECS is not a number: {}", raw),
            })?;
        }
        if let Some(token) = lookup("FORMCOACH_TOKEN") {
            self.token = Some(token).filter(|t| !t.trim().is_empty());
        }
        if let Some(file) = lookup("FORMCOACH_LOG_FILE") {
            self.log.file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.squat.validate()?;
        self.pushup.validate()?;
        self.store.parsed_base_url()?;
        if self.store.timeout_secs == 0 {
            return Err(CoachError::InvalidConfig {
                message: "store.timeout_secs must be greater than 0".to_string(),
            });
        }
        self.credential()?;
        Ok(())
    }

    pub fn thresholds_for(&self, exercise: ExerciseKind) -> ThresholdConfig {
        match exercise {
            ExerciseKind::Squat => self.squat,
            ExerciseKind::Pushup => self.pushup,
        }
    }

    /// The configured token as a credential, if any
    pub fn credential(&self) -> Result<Option<Credential>> {
        self.token
            .as_deref()
            .map(|token| Credential::new(token))
            .transpose()
            .map_err(CoachError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CoachConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds_for(ExerciseKind::Pushup), ThresholdConfig::PUSHUP);
        assert!(config.credential().unwrap().is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
token = "abc"

[store]
base_url = "https://coach.example.com/api"

[squat]
up_threshold = 155.0
down_threshold = 100.0
"#,
        )
        .unwrap();

        let config = CoachConfig::load_from(&path).unwrap();
        assert_eq!(config.store.base_url, "https://coach.example.com/api");
        assert_eq!(config.store.timeout_secs, StoreConfig::default().timeout_secs);
        assert_eq!(config.squat.down_threshold, 100.0);
        assert_eq!(config.pushup, ThresholdConfig::PUSHUP);
        assert_eq!(config.credential().unwrap().unwrap().token(), "abc");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = CoachConfig::default();
        config.pushup = ThresholdConfig::new(165.0, 85.0).unwrap();
        config.log.file = Some(PathBuf::from("/tmp/formcoach.log"));

        config.save(&path).unwrap();
        assert_eq!(CoachConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CoachConfig::default();
        config
            .apply_overrides(env(&[
                ("FORMCOACH_BASE_URL", "https://other.example.com"),
                ("FORMCOACH_TIMEOUT_SECS", "3"),
                ("FORMCOACH_TOKEN", "tok"),
            ]))
            .unwrap();
        assert_eq!(config.store.base_url, "https://other.example.com");
        assert_eq!(config.store.timeout_secs, 3);
        assert_eq!(config.token.as_deref(), Some("tok"));

        config.apply_overrides(env(&[("FORMCOACH_TOKEN", "  ")])).unwrap();
        assert!(config.token.is_none());

        let err = config
            .apply_overrides(env(&[("FORMCOACH_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, CoachError::InvalidConfig { .. }));
    }

    #[test]
    fn test_resolve_keeps_invalid_values_for_inspection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[pushup]\nup_threshold = 80.0\ndown_threshold = 120.0\n",
        )
        .unwrap();

        let config = CoachConfig::resolve(Some(&path), env(&[("FORMCOACH_TOKEN", "tok")])).unwrap();
        assert_eq!(config.pushup.up_threshold, 80.0);
        assert_eq!(config.token.as_deref(), Some("tok"));
        assert!(matches!(config.validate(), Err(CoachError::InvalidThresholds { .. })));

        let defaults = CoachConfig::resolve(None, env(&[])).unwrap();
        assert_eq!(defaults, CoachConfig::default());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = CoachConfig::default();
        config.squat = ThresholdConfig {
            up_threshold: 100.0,
            down_threshold: 120.0,
        };
        assert!(matches!(config.validate(), Err(CoachError::InvalidThresholds { .. })));

        let mut config = CoachConfig::default();
        config.store.base_url = "ftp://nope".to_string();
        assert!(matches!(config.validate(), Err(CoachError::InvalidConfig { .. })));

        let mut config = CoachConfig::default();
        config.token = Some("bad\ntoken".to_string());
        assert!(matches!(config.validate(), Err(CoachError::Store(_))));
    }
}
