//! Server configuration at ~/.config/calmcp/config.toml

use anyhow::{Context, Result};
use calmcp_core::constants::{
    DEFAULT_DUPLICATE_TOLERANCE_MINUTES, DEFAULT_SEARCH_WINDOW_DAYS, MAX_SEARCH_WINDOW_DAYS,
};
use calmcp_core::date_range::WeekStart;
use calmcp_core::{Consent, EngineSettings, Zone};
use chrono::{Duration, Weekday};
use serde::Deserialize;
use std::path::{Path, PathBuf};

static DEFAULT_STORE_PATH: &str = "~/.local/share/calmcp/store.json";

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

fn granted() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// IANA zone name. Absent means the process's local zone.
    pub time_zone: Option<String>,

    /// What `week_starts_on = "system"` means in requests.
    pub week_starts_on: Option<String>,

    pub duplicate_tolerance_minutes: Option<i64>,

    pub search_window_days: Option<i64>,

    #[serde(default)]
    pub access: AccessConfig,
}

/// Consent the file store answers access requests with.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "granted")]
    pub events: bool,
    #[serde(default = "granted")]
    pub reminders: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        AccessConfig {
            events: true,
            reminders: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            store_path: default_store_path(),
            time_zone: None,
            week_starts_on: None,
            duplicate_tolerance_minutes: None,
            search_window_days: None,
            access: AccessConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("calmcp");
        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, or from the default location. A missing file
    /// means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Store path with `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store_path).into_owned())
    }

    pub fn consent(&self) -> Consent {
        Consent {
            events: self.access.events,
            reminders: self.access.reminders,
        }
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let zone = match &self.time_zone {
            Some(name) => Zone::from_name(name).context("Invalid time_zone in config")?,
            None => Zone::System,
        };

        let week_start_default = match &self.week_starts_on {
            Some(name) => name
                .parse::<WeekStart>()
                .context("Invalid week_starts_on in config")?
                .first_day(Weekday::Mon),
            None => Weekday::Mon,
        };

        let duplicate_tolerance_minutes = self
            .duplicate_tolerance_minutes
            .unwrap_or(DEFAULT_DUPLICATE_TOLERANCE_MINUTES);
        if duplicate_tolerance_minutes < 0
            || Duration::try_minutes(duplicate_tolerance_minutes).is_none()
        {
            anyhow::bail!("duplicate_tolerance_minutes is out of range");
        }

        let search_window_days = self.search_window_days.unwrap_or(DEFAULT_SEARCH_WINDOW_DAYS);
        if !(1..=MAX_SEARCH_WINDOW_DAYS).contains(&search_window_days) {
            anyhow::bail!("search_window_days must be between 1 and {MAX_SEARCH_WINDOW_DAYS}");
        }

        Ok(EngineSettings {
            zone,
            week_start_default,
            duplicate_tolerance_minutes,
            search_window_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        let settings = config.engine_settings().unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(config.consent(), Consent::default());
    }

    #[test]
    fn reads_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
store_path = "/tmp/calmcp/store.json"
time_zone = "Europe/Berlin"
week_starts_on = "sunday"
duplicate_tolerance_minutes = 10
search_window_days = 90

[access]
reminders = false
"#,
        )
        .unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("/tmp/calmcp/store.json"));
        assert!(config.consent().events);
        assert!(!config.consent().reminders);

        let settings = config.engine_settings().unwrap();
        assert_eq!(settings.zone, Zone::from_name("Europe/Berlin").unwrap());
        assert_eq!(settings.week_start_default, Weekday::Sun);
        assert_eq!(settings.duplicate_tolerance_minutes, 10);
        assert_eq!(settings.search_window_days, 90);
    }

    #[test]
    fn unknown_zone_is_rejected() {
        let config = ServerConfig {
            time_zone: Some("Mars/Olympus".into()),
            ..ServerConfig::default()
        };
        assert!(config.engine_settings().is_err());
    }

    #[test]
    fn search_window_is_bounded() {
        for days in [0, MAX_SEARCH_WINDOW_DAYS + 1, i64::MAX] {
            let config = ServerConfig {
                search_window_days: Some(days),
                ..ServerConfig::default()
            };
            assert!(config.engine_settings().is_err(), "{days} accepted");
        }
    }

    #[test]
    fn tilde_expands_to_home() {
        let config = ServerConfig::default();
        let path = config.store_path();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".local/share/calmcp/store.json"));
    }
}
