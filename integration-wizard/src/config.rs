// Runtime settings for the wizard engine and its proof-mode binary.
//
// Layering (later wins): built-in defaults, then an optional TOML file, then
// `INTEGRATION_WIZARD__*` environment variables.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "integration-wizard.toml";
pub const CONFIG_PATH_ENV: &str = "INTEGRATION_WIZARD_CONFIG";
pub const ENV_PREFIX: &str = "INTEGRATION_WIZARD";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WizardSettings {
    /// Overrides log folder discovery when set.
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub log_to_stdout: bool,
    /// How long a notification stays visible.
    pub notification_duration_ms: u64,
    /// Upper bound for one asynchronous step validation.
    pub validation_timeout_ms: u64,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "debug".to_string(),
            log_to_stdout: true,
            notification_duration_ms: 5000,
            validation_timeout_ms: 10_000,
        }
    }
}

impl WizardSettings {
    /// Load settings from `INTEGRATION_WIZARD_CONFIG` (or `./integration-wizard.toml`)
    /// and the environment. A missing file is not an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        Self::load_from(Some(&path))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let settings = builder
            .build()
            .context("Failed to read wizard settings")?
            .try_deserialize::<WizardSettings>()
            .context("Invalid wizard settings")?;
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Invalid wizard settings TOML")
    }

    /// Unknown level names fall back to debug.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level
            .trim()
            .parse()
            .unwrap_or(LevelFilter::Debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_need_no_file() {
        let settings = WizardSettings::default();
        assert_eq!(settings.log_level, "debug");
        assert!(settings.log_to_stdout);
        assert_eq!(settings.notification_duration_ms, 5000);
        assert_eq!(settings.validation_timeout_ms, 10_000);
        assert!(settings.log_dir.is_none());
    }

    #[test]
    fn toml_overrides_only_named_keys() {
        let settings = WizardSettings::from_toml_str(
            r#"
            log_level = "warn"
            validation_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(settings.level_filter(), LevelFilter::Warn);
        assert_eq!(settings.validation_timeout_ms, 250);
        assert_eq!(settings.notification_duration_ms, 5000);
    }

    #[test]
    fn load_from_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "log_dir = \"/var/log/wizard\"").unwrap();
        writeln!(file, "log_to_stdout = false").unwrap();

        let settings = WizardSettings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.log_dir, Some(PathBuf::from("/var/log/wizard")));
        assert!(!settings.log_to_stdout);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = WizardSettings::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.notification_duration_ms, 5000);
    }

    #[test]
    fn unknown_level_is_debug() {
        let settings = WizardSettings {
            log_level: "chatty".into(),
            ..WizardSettings::default()
        };
        assert_eq!(settings.level_filter(), LevelFilter::Debug);
    }
}
