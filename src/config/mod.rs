// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{Result, RouterError};
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file (`path`, or `~/.llm-router/config.toml`)
    /// 3. Defaults (lowest)
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = path
            .map(str::to_string)
            .unwrap_or_else(Self::default_config_path);

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            // Load from config file if it exists
            .add_source(File::with_name(&file).required(path.is_some()))
            // Override with environment variables, e.g. LLM_ROUTER_CACHE__BACKEND=remote
            .add_source(
                Environment::with_prefix("LLM_ROUTER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| RouterError::Config(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| RouterError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject combinations the cache cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_seconds > MAX_TTL_SECONDS {
            return Err(RouterError::Config(format!(
                "cache.ttl_seconds {} exceeds the maximum of {}",
                self.cache.ttl_seconds, MAX_TTL_SECONDS
            )));
        }
        if self.usage.per_call_path.trim().is_empty() {
            return Err(RouterError::Config("usage.per_call_path is empty".to_string()));
        }
        if self.usage.daily_path.trim().is_empty() {
            return Err(RouterError::Config("usage.daily_path is empty".to_string()));
        }
        if self.usage.per_call_path == self.usage.daily_path {
            return Err(RouterError::Config(
                "usage.per_call_path and usage.daily_path must differ".to_string(),
            ));
        }
        Ok(())
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".llm-router")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.cache.backend, BackendKind::Local);
        assert_eq!(config.cache.ttl_seconds, 86_400);
        assert!(config.cache.remote_url.is_none());
        assert!(config.usage.per_call_path.ends_with("calls.jsonl"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut temp = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            temp,
            r#"
[cache]
backend = "remote"
ttl_seconds = 60
remote_url = "redis://127.0.0.1:6379/0"

[usage]
per_call_path = "/tmp/llm-router/calls.jsonl"
daily_path = "/tmp/llm-router/daily.json"
"#
        )
        .unwrap();

        let config = AppConfig::load(temp.path().to_str()).unwrap();
        assert_eq!(config.cache.backend, BackendKind::Remote);
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(
            config.cache.remote_url.as_deref(),
            Some("redis://127.0.0.1:6379/0")
        );
        assert_eq!(config.usage.daily_path, "/tmp/llm-router/daily.json");
        assert_eq!(config.cache.version_tag, "v1");
    }

    #[test]
    fn test_validate_rejects_shared_paths() {
        let mut config = AppConfig::default();
        config.usage.daily_path = config.usage.per_call_path.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_ttl() {
        let mut config = AppConfig::default();
        config.cache.ttl_seconds = MAX_TTL_SECONDS;
        assert!(config.validate().is_ok());

        config.cache.ttl_seconds = 10_000_000_000_000;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
