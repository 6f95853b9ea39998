use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-gc.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database_path: Option<Utf8PathBuf>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub allow_unreleased: Option<bool>,
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub database_path: Utf8PathBuf,
    pub site: Option<String>,
    pub allow_unreleased: bool,
    pub busy_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            site: None,
            allow_unreleased: false,
            busy_timeout_ms: default_busy_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl CatalogConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<CatalogConfig, CatalogError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| CatalogError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| CatalogError::ConfigParse(err.to_string()))?
        } else if path.is_some() {
            return Err(CatalogError::MissingConfig(config_path));
        } else {
            Config::default()
        };

        let resolved = Self::resolve_config(config);
        Ok(Self::apply_overrides(resolved, |key| std::env::var(key).ok()))
    }

    pub fn resolve_config(config: Config) -> CatalogConfig {
        let defaults = CatalogConfig::default();
        CatalogConfig {
            database_path: config.database_path.unwrap_or(defaults.database_path),
            site: config.site.or(defaults.site),
            allow_unreleased: config.allow_unreleased.unwrap_or(defaults.allow_unreleased),
            busy_timeout_ms: config.busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
            retry: config.retry.unwrap_or(defaults.retry),
        }
    }

    pub fn apply_overrides<F>(mut config: CatalogConfig, lookup: F) -> CatalogConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("METADATA_DB") {
            config.database_path = Utf8PathBuf::from(path);
        }
        if let Some(site) = lookup("ENSEMBL_SITE") {
            let site = site.trim().to_string();
            config.site = (!site.is_empty()).then_some(site);
        }
        if let Some(flag) = lookup("ALLOW_UNRELEASED") {
            config.allow_unreleased = parse_boolean_var(&flag);
        }
        if let Some(timeout) = lookup("BUSY_TIMEOUT_MS") {
            match timeout.trim().parse::<u64>() {
                Ok(value) => config.busy_timeout_ms = value,
                Err(_) => tracing::warn!(value = %timeout, "ignoring unparsable BUSY_TIMEOUT_MS"),
            }
        }
        config
    }
}

/// Lenient boolean: the usual negative spellings and the empty string are
/// false, anything else is true.
pub fn parse_boolean_var(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    !(lowered.is_empty() || matches!(lowered.as_str(), "f" | "false" | "no" | "none" | "0" | "n"))
}

pub fn default_database_path() -> Utf8PathBuf {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.data_dir()
                    .join("kira-genome-catalog")
                    .join("catalog.sqlite"),
            )
            .ok()
        })
        .unwrap_or_else(|| Utf8PathBuf::from("catalog.sqlite"))
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    50
}

fn default_busy_timeout_ms() -> u64 {
    250
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_config_fills_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default());
        assert!(!resolved.allow_unreleased);
        assert_eq!(resolved.retry.max_attempts, 3);
        assert_eq!(resolved.busy_timeout_ms, 250);
        assert!(resolved.database_path.ends_with("catalog.sqlite"));
    }

    #[test]
    fn boolean_vars() {
        for falsy in ["", "0", "no", "None", "F", "false", "n"] {
            assert!(!parse_boolean_var(falsy), "{falsy:?}");
        }
        for truthy in ["1", "yes", "true", "on"] {
            assert!(parse_boolean_var(truthy), "{truthy:?}");
        }
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 10,
        };
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
    }
}
