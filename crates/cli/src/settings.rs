//! Settings: `hass-run.yaml` files, then `HASS_RUN_*` environment variables, then CLI flags

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use hass_run_core::AppError;

const CONFIG_FILE_NAME: &str = "hass-run.yaml";
const ENV_PREFIX: &str = "HASS_RUN";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// HomeAssistant base URL (e.g., `https://hass.example`)
    pub host: Option<String>,
    /// Long-lived access token
    pub bearer: Option<String>,
    /// Write logs to `<log_dir>/hass-run.log` instead of stderr
    pub log_dir: Option<PathBuf>,
}

/// Values given on the command line; they win over every other source
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub bearer: Option<String>,
}

/// HomeAssistant connection settings required by `run`
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub bearer: String,
}

impl Settings {
    /// Load settings from the default search path and the process environment
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::load_from(&search_dirs(), None, overrides)
    }

    /// Load settings from `dirs` (lowest priority first) and `env`
    ///
    /// `env` replaces the process environment when set.
    pub fn load_from(
        dirs: &[PathBuf],
        env: Option<Map<String, String>>,
        overrides: &Overrides,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        for dir in dirs {
            builder = builder.add_source(
                File::from(dir.join(CONFIG_FILE_NAME))
                    .format(FileFormat::Yaml)
                    .required(false),
            );
        }

        builder = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).source(env))
            .set_override_option("host", overrides.host.clone())?
            .set_override_option("bearer", overrides.bearer.clone())?;

        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Host and bearer, both required
    pub fn endpoint(&self) -> std::result::Result<Endpoint, AppError> {
        let host = non_empty(self.host.as_deref()).ok_or_else(|| {
            AppError::Config(
                "HomeAssistant host is not set (--host, HASS_RUN_HOST or `host` in hass-run.yaml)"
                    .to_string(),
            )
        })?;
        let bearer = non_empty(self.bearer.as_deref()).ok_or_else(|| {
            AppError::Config(
                "HomeAssistant bearer is not set (--bearer, HASS_RUN_BEARER or `bearer` in hass-run.yaml)"
                    .to_string(),
            )
        })?;

        Ok(Endpoint {
            host: host.trim_end_matches('/').to_string(),
            bearer: bearer.to_string(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// `/etc`, then the home directory, then the working directory
fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("/etc")];
    if let Some(base) = directories::BaseDirs::new() {
        dirs.push(base.home_dir().to_path_buf());
    }
    dirs.push(Path::new(".").to_path_buf());
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn no_env() -> Option<Map<String, String>> {
        Some(Map::new())
    }

    #[test]
    fn test_later_directories_win() {
        let system = tempdir().unwrap();
        let local = tempdir().unwrap();
        fs::write(
            system.path().join(CONFIG_FILE_NAME),
            "host: https://system.example\nbearer: SYSTEM\n",
        )
        .unwrap();
        fs::write(local.path().join(CONFIG_FILE_NAME), "host: https://local.example\n").unwrap();

        let settings = Settings::load_from(
            &[system.path().to_path_buf(), local.path().to_path_buf()],
            no_env(),
            &Overrides::default(),
        )
        .unwrap();

        assert_eq!(settings.host.as_deref(), Some("https://local.example"));
        assert_eq!(settings.bearer.as_deref(), Some("SYSTEM"));
    }

    #[test]
    fn test_environment_then_flags() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "host: https://file.example\nbearer: FILE\nlog_dir: /var/log/hass-run\n",
        )
        .unwrap();
        let mut env = Map::new();
        env.insert("HASS_RUN_HOST".to_string(), "https://env.example".to_string());
        env.insert("HASS_RUN_BEARER".to_string(), "ENV".to_string());

        let settings = Settings::load_from(
            &[dir.path().to_path_buf()],
            Some(env),
            &Overrides {
                host: None,
                bearer: Some("FLAG".to_string()),
            },
        )
        .unwrap();

        assert_eq!(settings.host.as_deref(), Some("https://env.example"));
        assert_eq!(settings.bearer.as_deref(), Some("FLAG"));
        assert_eq!(settings.log_dir, Some(PathBuf::from("/var/log/hass-run")));
    }

    #[test]
    fn test_missing_files_are_optional() {
        let dir = tempdir().unwrap();

        let settings =
            Settings::load_from(&[dir.path().to_path_buf()], no_env(), &Overrides::default())
                .unwrap();

        assert!(settings.host.is_none());
        assert!(settings.endpoint().is_err());
    }

    #[test]
    fn test_endpoint_requires_both_values() {
        let settings = Settings {
            host: Some("https://hass.example/".to_string()),
            bearer: Some("  ".to_string()),
            log_dir: None,
        };
        let err = settings.endpoint().unwrap_err();
        assert!(matches!(err, AppError::Config(ref message) if message.contains("bearer")));

        let settings = Settings {
            bearer: Some("TOKEN".to_string()),
            ..settings
        };
        let endpoint = settings.endpoint().unwrap();
        assert_eq!(endpoint.host, "https://hass.example");
        assert_eq!(endpoint.bearer, "TOKEN");
    }
}
