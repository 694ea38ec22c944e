//! Engine configuration.
//!
//! Values come from, in increasing priority: built-in defaults,
//! `.easel/config.yaml`, and the `EASEL_*` environment variables.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EaselError, Result};

pub const CONFIG_FILE: &str = "config.yaml";

/// Environment override for [`EaselConfig::autosave_delay_ms`].
pub const ENV_AUTOSAVE_MS: &str = "EASEL_AUTOSAVE_MS";
/// Environment override for [`EaselConfig::storage_key`].
pub const ENV_STORAGE_KEY: &str = "EASEL_STORAGE_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EaselConfig {
    /// Quiet period after the last edit before the note collection is written.
    pub autosave_delay_ms: u64,
    /// Title given to new notes and to imported notes without one.
    pub default_title: String,
    /// Key the whole note collection is stored under.
    pub storage_key: String,
    /// Upscale factor for raster export.
    pub raster_scale: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Ingested images wider than this are scaled down on placement.
    pub max_image_width: u32,
}

impl Default for EaselConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: 500,
            default_title: "Untitled note".to_string(),
            storage_key: "canvas-notes".to_string(),
            raster_scale: 2,
            canvas_width: 1200,
            canvas_height: 800,
            max_image_width: 480,
        }
    }
}

impl EaselConfig {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    /// Load `config.yaml` from the project directory if it exists, then
    /// apply environment overrides.
    pub fn load(easel_dir: &Path) -> Result<Self> {
        Self::load_with(easel_dir, |key| env::var(key).ok())
    }

    /// Same as [`EaselConfig::load`] with overrides read through `lookup`.
    pub fn load_with<F>(easel_dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = easel_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&contents)
                .map_err(|e| EaselError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };

        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Apply `EASEL_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_AUTOSAVE_MS) {
            self.autosave_delay_ms = raw.trim().parse().map_err(|_| {
                EaselError::Config(format!("{} must be a number of milliseconds, got '{}'", ENV_AUTOSAVE_MS, raw))
            })?;
        }

        if let Some(key) = lookup(ENV_STORAGE_KEY) {
            if key.trim().is_empty() {
                return Err(EaselError::Config(format!("{} must not be empty", ENV_STORAGE_KEY)));
            }
            self.storage_key = key;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EaselConfig::default();
        assert_eq!(config.autosave_delay(), Duration::from_millis(500));
        assert_eq!(config.storage_key, "canvas-notes");
        assert_eq!(config.raster_scale, 2);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "autosave_delay_ms: 50\ndefault_title: Sketch\n").unwrap();

        let config = EaselConfig::load_with(tmp.path(), |_| None).unwrap();
        assert_eq!(config.autosave_delay_ms, 50);
        assert_eq!(config.default_title, "Sketch");
        assert_eq!(config.canvas_width, 1200);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "autosave_delay_ms: [oops\n").unwrap();

        let result = EaselConfig::load_with(tmp.path(), |_| None);
        assert!(matches!(result, Err(EaselError::Config(_))));
    }

    #[test]
    fn test_env_override_beats_yaml() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "autosave_delay_ms: 50\n").unwrap();

        let config = EaselConfig::load_with(tmp.path(), |key| {
            (key == ENV_AUTOSAVE_MS).then(|| "900".to_string())
        })
        .unwrap();
        assert_eq!(config.autosave_delay_ms, 900);
        assert_eq!(config.storage_key, "canvas-notes");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> =
            [(ENV_AUTOSAVE_MS, "1500"), (ENV_STORAGE_KEY, "sketches")].into_iter().collect();

        let mut config = EaselConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.autosave_delay_ms, 1500);
        assert_eq!(config.storage_key, "sketches");
    }

    #[test]
    fn test_bad_env_override_rejected() {
        let mut config = EaselConfig::default();
        let result = config.apply_overrides(|key| (key == ENV_AUTOSAVE_MS).then(|| "soon".to_string()));
        assert!(matches!(result, Err(EaselError::Config(_))));
        assert_eq!(config.autosave_delay_ms, 500);
    }

    #[test]
    fn test_serialization() {
        let config = EaselConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: EaselConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
