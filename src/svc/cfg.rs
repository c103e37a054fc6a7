//! # Configuration module
//!
//! This module provide utilities and helpers to interact with the configuration

use std::{path::PathBuf, time::Duration};

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

// -----------------------------------------------------------------------------
// Constants

pub const PUBLIC_ENDPOINT: &str = "https://api.scalechamp.com";

pub const CREATE_POLL_ATTEMPTS: i64 = 36;
pub const CREATE_POLL_INTERVAL: i64 = 10;
pub const UPDATE_POLL_ATTEMPTS: i64 = 50;
pub const UPDATE_POLL_INTERVAL: i64 = 5;

// -----------------------------------------------------------------------------
// Api structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Api {
    #[serde(rename = "endpoint")]
    pub endpoint: String,
    #[serde(rename = "token")]
    pub token: String,
}

// -----------------------------------------------------------------------------
// Poll structure

/// bounds a poll loop, `interval` is expressed in seconds
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Poll {
    #[serde(rename = "attempts")]
    pub attempts: u32,
    #[serde(rename = "interval")]
    pub interval: u64,
}

impl Poll {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

// -----------------------------------------------------------------------------
// Polling structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Polling {
    #[serde(rename = "create")]
    pub create: Poll,
    #[serde(rename = "update")]
    pub update: Poll,
}

// -----------------------------------------------------------------------------
// ConfigurationError enum

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("failed to load file '{0:?}', {1}")]
    File(PathBuf, ConfigError),
    #[error("failed to load configuration, {0}")]
    Cast(ConfigError),
    #[error("failed to set default for key '{0}', {1}")]
    Default(String, ConfigError),
}

// -----------------------------------------------------------------------------
// Configuration structures

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Configuration {
    #[serde(rename = "api")]
    pub api: Api,
    #[serde(rename = "polling")]
    pub polling: Polling,
}

impl TryFrom<PathBuf> for Configuration {
    type Error = ConfigurationError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        let config = defaults()?
            .add_source(environment())
            .add_source(File::from(path.to_owned()).required(true))
            .build()
            .map_err(|err| ConfigurationError::File(path, err))?;

        config.try_deserialize().map_err(ConfigurationError::Cast)
    }
}

impl Configuration {
    pub fn try_default() -> Result<Self, ConfigurationError> {
        let mut paths = vec![
            PathBuf::from(format!("/usr/share/{}/config", env!("CARGO_PKG_NAME"))),
            PathBuf::from(format!("/etc/{}/config", env!("CARGO_PKG_NAME"))),
        ];

        if let Ok(home) = std::env::var("HOME") {
            paths.push(PathBuf::from(format!(
                "{}/.config/{}/config",
                home,
                env!("CARGO_PKG_NAME")
            )));
            paths.push(PathBuf::from(format!(
                "{}/.local/share/{}/config",
                home,
                env!("CARGO_PKG_NAME")
            )));
        }

        paths.push(PathBuf::from("config"));

        let mut builder = defaults()?.add_source(environment());
        for path in paths {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(ConfigurationError::Cast)
    }

    /// logs the effective configuration, the api token is never written
    pub fn help(&self) {
        info!(
            endpoint = &self.api.endpoint,
            token = !self.api.token.is_empty(),
            "Use scalechamp api endpoint"
        );
        info!(
            attempts = self.polling.create.attempts,
            interval = self.polling.create.interval,
            "Poll instance state after creation"
        );
        info!(
            attempts = self.polling.update.attempts,
            interval = self.polling.update.interval,
            "Poll instance state after update"
        );
    }
}

// -----------------------------------------------------------------------------
// helpers

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigurationError> {
    let defaults: [(&str, config::Value); 6] = [
        ("api.endpoint", PUBLIC_ENDPOINT.into()),
        ("api.token", "".into()),
        ("polling.create.attempts", CREATE_POLL_ATTEMPTS.into()),
        ("polling.create.interval", CREATE_POLL_INTERVAL.into()),
        ("polling.update.attempts", UPDATE_POLL_ATTEMPTS.into()),
        ("polling.update.interval", UPDATE_POLL_INTERVAL.into()),
    ];

    let mut builder = Config::builder();
    for (key, value) in defaults {
        builder = builder
            .set_default(key, value)
            .map_err(|err| ConfigurationError::Default(key.to_string(), err))?;
    }

    Ok(builder)
}

fn environment() -> Environment {
    Environment::with_prefix(&env!("CARGO_PKG_NAME").replace('-', "_"))
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::PathBuf, time::Duration};

    use tempfile::Builder;

    use super::*;

    #[test]
    fn file_overrides_defaults() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
token = "s3cr3t"

[polling.update]
attempts = 3
interval = 1
"#
        )
        .unwrap();

        let config = Configuration::try_from(file.path().to_path_buf()).unwrap();

        assert_eq!(config.api.endpoint, PUBLIC_ENDPOINT);
        assert_eq!(config.api.token, "s3cr3t");
        assert_eq!(config.polling.create.attempts, 36);
        assert_eq!(config.polling.create.interval(), Duration::from_secs(10));
        assert_eq!(config.polling.update.attempts, 3);
        assert_eq!(config.polling.update.interval(), Duration::from_secs(1));
    }

    #[test]
    fn file_overrides_environment() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
token = "from-file"
"#
        )
        .unwrap();

        std::env::set_var("SCALECHAMP_PROVIDER_API__TOKEN", "from-env");
        std::env::set_var("SCALECHAMP_PROVIDER_POLLING__UPDATE__INTERVAL", "9");
        let config = Configuration::try_from(file.path().to_path_buf());
        std::env::remove_var("SCALECHAMP_PROVIDER_API__TOKEN");
        std::env::remove_var("SCALECHAMP_PROVIDER_POLLING__UPDATE__INTERVAL");

        let config = config.unwrap();
        assert_eq!(config.api.token, "from-file");
        assert_eq!(config.polling.update.interval(), Duration::from_secs(9));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/scalechamp-provider/config.toml");

        assert!(matches!(
            Configuration::try_from(path),
            Err(ConfigurationError::File(_, _))
        ));
    }
}
