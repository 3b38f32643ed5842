use super::DrainpoolConfig;
use super::smart_load;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use std::path::Path;

/// Embedded defaults, the lowest configuration layer
pub const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Prefix of environment overrides, e.g. `DRAINPOOL_POOL__WORKERS=8`
pub const ENV_PREFIX: &str = "DRAINPOOL_";

impl DrainpoolConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_custom_config(None)
    }

    /// Load configuration, using only `custom_config` (plus defaults and env)
    /// when a path is given
    pub fn load_with_custom_config(custom_config: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(custom_config, ENV_PREFIX)?)
    }

    pub(crate) fn figment(custom_config: Option<&Path>, env_prefix: &str) -> Result<Figment> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(custom_path) = custom_config {
            if !custom_path.exists() {
                anyhow::bail!("Config file not found: {}", custom_path.display());
            }
            tracing::debug!("Loading config from {}", custom_path.display());
            figment = figment.merge(smart_load::auto(custom_path));
        } else {
            // Standard priority: user config -> project config
            if let Some(user_config) = Self::user_config_path() {
                figment = figment
                    .merge(Toml::file(format!("{user_config}.toml")))
                    .merge(Json::file(format!("{user_config}.json")))
                    .merge(Yaml::file(format!("{user_config}.yaml")))
                    .merge(Yaml::file(format!("{user_config}.yml")));
            }
            figment = figment
                .merge(Toml::file("drainpool.toml"))
                .merge(Json::file("drainpool.json"))
                .merge(Yaml::file("drainpool.yaml"))
                .merge(Yaml::file("drainpool.yml"));
        }

        // Environment variables always have highest priority
        Ok(figment.merge(Env::prefixed(env_prefix).split("__")))
    }

    pub(crate) fn from_figment(figment: Figment) -> Result<Self> {
        let config: DrainpoolConfig = figment
            .extract()
            .context("Failed to parse configuration")?;
        config.validate()?;
        tracing::trace!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Base path of the user config, without extension
    fn user_config_path() -> Option<String> {
        std::env::var("HOME")
            .ok()
            .map(|home| format!("{home}/.config/drainpool/config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ProgressMode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_loads_defaults() {
        let figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));
        let config = DrainpoolConfig::from_figment(figment).expect("Should load default config");

        assert_eq!(config.pool.workers, 50);
        assert_eq!(config.pool.thread_percentage, 75);
        assert_eq!(config.pool.capacity(), None);
        assert_eq!(config.progress.mode, ProgressMode::Log);
        assert_eq!(config.progress.log_every, 5);
        assert_eq!(config.demo.items, 200);
        assert_eq!(config.demo.delay_ms, 1000);
        assert_eq!(config.demo.fail_every, 0);
    }

    #[test]
    fn test_custom_toml_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pool.toml");
        fs::write(&path, "[pool]\nworkers = 3\n\n[progress]\nmode = \"bar\"\n").unwrap();

        let config =
            DrainpoolConfig::from_figment(DrainpoolConfig::figment(Some(&path), "DRAINPOOL_TEST_NONE_").unwrap())
                .unwrap();
        assert_eq!(config.pool.workers, 3);
        assert_eq!(config.progress.mode, ProgressMode::Bar);
        // untouched keys keep their defaults
        assert_eq!(config.progress.log_every, 5);
    }

    #[test]
    fn test_custom_yaml_and_json() {
        let dir = TempDir::new().unwrap();

        let yaml = dir.path().join("pool.yml");
        fs::write(&yaml, "demo:\n  items: 42\n").unwrap();
        let config =
            DrainpoolConfig::from_figment(DrainpoolConfig::figment(Some(&yaml), "DRAINPOOL_TEST_NONE_").unwrap())
                .unwrap();
        assert_eq!(config.demo.items, 42);

        let json = dir.path().join("pool.json");
        fs::write(&json, r#"{"progress": {"mode": "silent"}}"#).unwrap();
        let config =
            DrainpoolConfig::from_figment(DrainpoolConfig::figment(Some(&json), "DRAINPOOL_TEST_NONE_").unwrap())
                .unwrap();
        assert_eq!(config.progress.mode, ProgressMode::Silent);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pool.toml");
        fs::write(&path, "[pool]\nworkers = 3\n").unwrap();

        // Unique prefix keeps this test independent of the real environment
        unsafe {
            std::env::set_var("DRAINPOOL_TEST_ENV_POOL__WORKERS", "9");
        }
        let config =
            DrainpoolConfig::from_figment(DrainpoolConfig::figment(Some(&path), "DRAINPOOL_TEST_ENV_").unwrap())
                .unwrap();
        unsafe {
            std::env::remove_var("DRAINPOOL_TEST_ENV_POOL__WORKERS");
        }

        assert_eq!(config.pool.workers, 9);
    }

    #[test]
    fn test_missing_custom_config_fails() {
        let result = DrainpoolConfig::load_with_custom_config(Some(Path::new("does-not-exist.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pool.toml");
        fs::write(&path, "[progress]\nlog_every = 0\n").unwrap();

        let result =
            DrainpoolConfig::from_figment(DrainpoolConfig::figment(Some(&path), "DRAINPOOL_TEST_NONE_").unwrap());
        assert!(result.is_err());
    }
}
