//! Settings for the `bounce` command
//!
//! Loaded from `config.toml`:
//! ```toml
//! [bounce]
//! throttle_wait_ms = 300
//! max_delay_ms = 3000
//!
//! [split]
//! on = "commit"
//! include_current = false
//! ```
//! Command-line flags override file values.

use anyhow::{Context, Result};
use bounce_core::BounceOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Effective settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Timing windows
    pub bounce: BounceOptions,
    /// Control-hook split rule
    pub split: SplitRule,
}

/// When the control hook splits a chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRule {
    /// Split when an event's first argument equals this word
    pub on: Option<String>,
    /// Keep the triggering event in the committed chain
    pub include_current: bool,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub throttle_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub split_on: Option<String>,
    pub split_include: bool,
}

/// Default settings file: `<config dir>/bounce/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bounce").join("config.toml"))
}

impl Settings {
    /// Parse a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse settings {}", path.display()))?;
        Ok(settings)
    }

    /// Load `explicit` if given, else the default file if it exists, else
    /// built-in defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match config_file_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply command-line values on top of the file
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(ms) = overrides.throttle_ms {
            self.bounce.throttle_wait_ms = ms;
        }
        if let Some(ms) = overrides.max_delay_ms {
            self.bounce.max_delay_ms = Some(ms);
        }
        if let Some(word) = &overrides.split_on {
            self.split.on = Some(word.clone());
        }
        if overrides.split_include {
            self.split.include_current = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bounce.validate().context("Invalid [bounce] settings")?;
        if self.split.on.as_deref().is_some_and(str::is_empty) {
            anyhow::bail!("Invalid [split] settings: `on` must not be empty");
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[bounce]\nthrottle_wait_ms = 120\nmax_delay_ms = 900\n\n\
             [split]\non = \"commit\"\ninclude_current = true\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.bounce.throttle_wait_ms, 120);
        assert_eq!(settings.bounce.max_delay_ms, Some(900));
        assert_eq!(settings.split.on.as_deref(), Some("commit"));
        assert!(settings.split.include_current);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bounce]\nmax_delay_ms = 50\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.bounce.throttle_wait_ms, 300);
        assert_eq!(settings.split, SplitRule::default());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load_or_default(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_win() {
        let mut settings = Settings::default();
        settings.apply(&Overrides {
            throttle_ms: Some(40),
            max_delay_ms: Some(400),
            split_on: Some("sync".to_string()),
            split_include: true,
        });
        assert_eq!(settings.bounce.throttle_wait_ms, 40);
        assert_eq!(settings.bounce.max_delay_ms, Some(400));
        assert_eq!(settings.split.on.as_deref(), Some("sync"));
        assert!(settings.split.include_current);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut settings = Settings::default();
        settings.apply(&Overrides {
            throttle_ms: Some(0),
            ..Overrides::default()
        });
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut settings = Settings::default();
        settings.split.on = Some("save".to_string());
        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
