//! Engine settings persisted as YAML.
//!
//! Settings are read from `RTS_SETTINGS_PATH` when set, otherwise from
//! `<config_dir>/rts/settings.yaml`. A missing file yields the defaults; an
//! unreadable or invalid one is an error, since a silently ignored slot range
//! or timeout would change how commands are released.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use dirs_next::config_dir;
use rts_types::RetryPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::expand_tilde;

/// Environment variable allowing callers to override the settings file path.
pub const SETTINGS_PATH_ENV: &str = "RTS_SETTINGS_PATH";

/// Default filename inside the configuration directory.
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// Error surfaced when settings cannot be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Inclusive range of slot numbers a scheduler may allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub first: u32,
    pub last: u32,
}

impl SlotRange {
    pub fn contains(&self, slot: u32) -> bool {
        (self.first..=self.last).contains(&slot)
    }

    pub fn capacity(&self) -> usize {
        (self.last.saturating_sub(self.first) as usize) + 1
    }
}

impl Default for SlotRange {
    fn default() -> Self {
        Self { first: 128, last: 135 }
    }
}

/// Tunables for a scheduler instance and its dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub slot_range: SlotRange,
    /// Upper bound on a single subsystem submission.
    pub dispatch_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Priority used when a load request does not carry one. Lower values release first on ties.
    pub default_priority: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slot_range: SlotRange::default(),
            dispatch_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            default_priority: 100,
        }
    }
}

impl EngineSettings {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Rejects combinations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.slot_range.first > self.slot_range.last {
            return Err(SettingsError::Invalid(format!(
                "slot_range.first ({}) exceeds slot_range.last ({})",
                self.slot_range.first, self.slot_range.last
            )));
        }
        if self.dispatch_timeout_ms == 0 {
            return Err(SettingsError::Invalid("dispatch_timeout_ms must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SettingsError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Loads settings from the default location.
pub fn load_settings() -> Result<EngineSettings, SettingsError> {
    load_settings_from(&default_settings_path())
}

/// Loads settings from an explicit path, falling back to defaults when the file is absent.
pub fn load_settings_from(path: &Path) -> Result<EngineSettings, SettingsError> {
    let settings = match fs::read_to_string(path) {
        Ok(data) => serde_yaml::from_str::<EngineSettings>(&data)?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "settings file not found; using defaults");
            EngineSettings::default()
        }
        Err(error) => return Err(SettingsError::Io(error)),
    };
    settings.validate()?;
    Ok(settings)
}

/// Resolves the settings path from the environment or the config directory.
pub fn default_settings_path() -> PathBuf {
    if let Ok(path) = env::var(SETTINGS_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rts")
        .join(SETTINGS_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&temp_dir.path().join("absent.yaml")).expect("defaults");
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.slot_range.capacity(), 8);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.yaml");
        fs::write(&path, "dispatch_timeout_ms: 250\nretry:\n  max_attempts: 3\n  backoff_ms: 10\n").unwrap();

        let settings = load_settings_from(&path).expect("settings");
        assert_eq!(settings.dispatch_timeout(), Duration::from_millis(250));
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.backoff_ms, 10);
        assert_eq!(settings.slot_range, SlotRange::default());
    }

    #[test]
    fn rejects_inverted_slot_range() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.yaml");
        fs::write(&path, "slot_range:\n  first: 140\n  last: 135\n").unwrap();

        let error = load_settings_from(&path).expect_err("inverted range");
        assert!(matches!(error, SettingsError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.yaml");
        fs::write(&path, "slot_range: [not, a, map]\n").unwrap();

        assert!(matches!(load_settings_from(&path), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn environment_overrides_settings_path() {
        temp_env::with_var(SETTINGS_PATH_ENV, Some("/tmp/rts-test/settings.yaml"), || {
            assert_eq!(default_settings_path(), PathBuf::from("/tmp/rts-test/settings.yaml"));
        });
    }
}
