//! Configuration loading.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::{MetagraphConfig, BUILTIN_PLUGIN, LOG_LEVELS};

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load and validate configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<MetagraphConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: MetagraphConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &MetagraphConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.planner.max_translation_hops == 0 {
        return Err(ConfigError::Invalid(
            "planner.max_translation_hops must be > 0".to_string(),
        ));
    }

    if config.scheduler.max_parallel == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.max_parallel must be > 0".to_string(),
        ));
    }

    let level = config.observability.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "observability.log_level '{}' must be one of {}",
            config.observability.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    validate_plugins(config)?;

    Ok(())
}

fn validate_plugins(config: &MetagraphConfig) -> Result<(), ConfigError> {
    for (idx, name) in config.plugins.enabled.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "plugins.enabled[].name must not be empty".to_string(),
            ));
        }
        if name == BUILTIN_PLUGIN {
            return Err(ConfigError::Invalid(format!(
                "plugins.enabled must not list '{}', it is always registered first",
                BUILTIN_PLUGIN
            )));
        }
        if config.plugins.enabled[..idx].contains(name) {
            return Err(ConfigError::Invalid(format!(
                "plugins.enabled lists '{}' more than once",
                name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchedulerKind;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_validate_config_accepts_defaults() {
        let config = MetagraphConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.plugins.enabled.len(), 5);
        assert_eq!(config.scheduler.kind, SchedulerKind::Parallel);
    }

    #[test]
    fn test_load_config_fills_missing_sections() {
        let file = write_config(
            "version: 2\nscheduler:\n  kind: sequential\nplugins:\n  enabled: [core_python]\n",
        );
        let config = load_config(file.path()).expect("load");
        assert_eq!(config.version, 2);
        assert_eq!(config.scheduler.kind, SchedulerKind::Sequential);
        assert_eq!(config.scheduler.max_parallel, 4);
        assert_eq!(config.planner.max_translation_hops, 8);
        assert_eq!(config.plugins.enabled, vec!["core_python".to_string()]);
        assert_eq!(config.app.name, "metagraph");
    }

    #[test]
    fn test_load_config_rejects_zero_hops() {
        let file = write_config("planner:\n  max_translation_hops: 0\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_config_rejects_unknown_scheduler() {
        let file = write_config("scheduler:\n  kind: threaded\n");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_config_rejects_duplicate_plugin() {
        let mut config = MetagraphConfig::default();
        config.plugins.enabled = vec!["core_numpy".to_string(), "core_numpy".to_string()];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_config_rejects_builtin_plugin() {
        let mut config = MetagraphConfig::default();
        config.plugins.enabled.insert(0, "core".to_string());
        let err = validate_config(&config).expect_err("core listed");
        assert!(err.to_string().contains("always registered first"));
    }

    #[test]
    fn test_load_config_checks_log_level() {
        let file = write_config("observability:
  log_level: DEBUG
");
        assert!(load_config(file.path()).is_ok());

        let file = write_config("observability:
  log_level: chatty
");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Invalid(message)) if message.contains("log_level")
        ));
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("metagraph.yaml");
        assert!(matches!(load_config(&missing), Err(ConfigError::Io(_))));
    }
}
