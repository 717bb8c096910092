// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration.

use std::path::Path;
use std::time::Duration;

use poser_registry::{Detail, Registry, WITHDRAW_URL};
use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};

/// Configuration for the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long to wait for a registry response, in milliseconds
    pub timeout_ms: u64,

    /// Smallest request id
    pub id_min: u64,

    /// Largest request id
    pub id_max: u64,

    /// URL prefix of modules that may never be posed
    pub internal_prefix: Option<String>,

    /// URL wrapper modules import `withdraw` from
    pub withdraw_url: String,

    /// Query parameter carrying the pose ordinal
    pub parameter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            id_min: 1,
            id_max: 100_000,
            internal_prefix: None,
            withdraw_url: WITHDRAW_URL.to_string(),
            parameter: "pose".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, then apply the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|error| {
            LoaderError::Invalid(
                Detail::new("InvalidConfig")
                    .label(path.display().to_string())
                    .message(error.to_string()),
            )
        })?;
        let mut config: Config = serde_json::from_str(&content).map_err(|error| {
            LoaderError::Invalid(
                Detail::new("InvalidConfig")
                    .label(path.display().to_string())
                    .message(error.to_string()),
            )
        })?;
        config.load_from_env();
        Ok(config)
    }

    /// Default configuration with the environment applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from environment variables.
    fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("POSER_") {
                self.set(&config_key.to_lowercase(), &value);
            }
        }
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "timeout_ms" => {
                if let Ok(n) = value.parse() {
                    self.timeout_ms = n;
                }
            }
            "internal_prefix" => {
                self.internal_prefix = (!value.is_empty()).then(|| value.to_string());
            }
            "withdraw_url" => self.withdraw_url = value.to_string(),
            _ => {}
        }
    }

    /// Registry response timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// An empty registry refusing poses of the modules this loader treats
    /// as internal.
    pub fn registry<V: Clone>(&self) -> Registry<V> {
        let registry = Registry::new().with_withdraw_url(&self.withdraw_url);
        match &self.internal_prefix {
            Some(prefix) => registry.with_internal_prefix(prefix),
            None => registry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!((config.id_min, config.id_max), (1, 100_000));
        assert_eq!(config.parameter, "pose");
    }

    #[test]
    fn test_registry_refuses_internal_modules() {
        let config = Config {
            internal_prefix: Some("file:///poser/".to_owned()),
            withdraw_url: "file:///withdraw.mjs".to_owned(),
            ..Config::default()
        };
        let registry = config.registry::<u8>();
        for url in ["file:///withdraw.mjs", "file:///poser/a.mjs"] {
            let error = registry.deposit(url, None, false).unwrap_err();
            assert_eq!(error.code(), "ForbiddenPose");
        }
        assert_eq!(registry.deposit("file:///a.mjs", None, false).unwrap(), 1);
    }

    #[test]
    fn test_set() {
        let mut config = Config::default();
        config.set("timeout_ms", "250");
        config.set("timeout_ms", "soon");
        config.set("internal_prefix", "file:///poser/");
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.internal_prefix.as_deref(), Some("file:///poser/"));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"id_max": 8, "withdraw_url": "file:///withdraw.mjs"}}"#).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.id_max, 8);
        assert_eq!(config.id_min, 1);
        assert_eq!(config.withdraw_url, "file:///withdraw.mjs");
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "id_max = 8").unwrap();
        let error = Config::load(file.path()).unwrap_err();
        assert_eq!(error.code(), Some("InvalidConfig"));
    }
}
