use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub const ENV_WORKER_COUNT: &str = "SCRIPTQ_WORKER_COUNT";
pub const ENV_LOG_LEVEL: &str = "SCRIPTQ_LOG_LEVEL";

/// Reads, schema-checks and validates a JSON config file. `SCRIPTQ_*`
/// environment variables override the file's values.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&text)
}

pub fn load_config_from_str(text: &str) -> Result<Config, ConfigError> {
    let raw: serde_json::Value = serde_json::from_str(text)?;
    check_against_schema(&raw)?;

    let mut config = serde_json::from_value::<Config>(raw)?;
    config.apply_env_overrides()?;
    validate_config(&config)?;
    Ok(config)
}

fn check_against_schema(raw: &serde_json::Value) -> Result<(), ConfigError> {
    let schema = serde_json::from_str::<serde_json::Value>(SCHEMA_JSON).map_err(|e| {
        ConfigError::Validation {
            message: format!("embedded config schema is not valid JSON: {}", e),
        }
    })?;
    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("embedded config schema does not compile: {}", e),
    })?;

    let problems = validator
        .iter_errors(raw)
        .map(|e| e.to_string())
        .collect::<Vec<_>>();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::SchemaValidation {
            errors: problems.join("; "),
        })
    }
}

pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "workerCount must be at least 1".to_string(),
        });
    }

    if config.evaluator.program.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "evaluator.program must not be empty".to_string(),
        });
    }

    if config.events.capacity == 0 {
        return Err(ConfigError::Validation {
            message: "events.capacity must be at least 1".to_string(),
        });
    }

    Ok(())
}

impl Config {
    /// Applies `SCRIPTQ_WORKER_COUNT` and `SCRIPTQ_LOG_LEVEL` on top of the
    /// loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var(ENV_WORKER_COUNT) {
            self.worker_count = match value.trim().parse::<usize>() {
                Ok(count) if count > 0 => count,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: ENV_WORKER_COUNT.to_string(),
                        value,
                    })
                }
            };
        }

        if let Ok(value) = std::env::var(ENV_LOG_LEVEL) {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidEnv {
                    name: ENV_LOG_LEVEL.to_string(),
                    value,
                });
            }
            self.logging.level = value.trim().to_string();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.worker_count, 10);
        assert_eq!(config.evaluator.program, "sh");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    #[serial]
    fn test_full_config() {
        let config = load_config_from_str(
            r#"{
                "version": "1.0",
                "workerCount": 4,
                "evaluator": { "program": "node", "args": ["-"], "pollIntervalMs": 25 },
                "events": { "capacity": 32 },
                "logging": { "level": "debug", "format": "json" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.worker_count, 4);
        assert_eq!(config.evaluator.program, "node");
        assert_eq!(config.evaluator.args, vec!["-".to_string()]);
        assert_eq!(config.evaluator.poll_interval_ms, 25);
        assert_eq!(config.events.capacity, 32);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_schema_rejects_zero_workers() {
        let err = load_config_from_str(r#"{ "version": "1.0", "workerCount": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    #[serial]
    fn test_schema_rejects_unknown_fields() {
        let err = load_config_from_str(r#"{ "version": "1.0", "threads": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    #[serial]
    fn test_unsupported_version() {
        let err = load_config_from_str(r#"{ "version": "2.0" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    #[serial]
    fn test_invalid_json() {
        let err = load_config_from_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "version": "1.0", "workerCount": 2 }}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.worker_count, 2);
    }

    #[test]
    #[serial]
    fn test_load_missing_file() {
        let err = load_config("/nonexistent/scriptq.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var(ENV_WORKER_COUNT, "3");
        std::env::set_var(ENV_LOG_LEVEL, "scriptq=trace");

        let mut config = Config::default();
        let result = config.apply_env_overrides();

        std::env::remove_var(ENV_WORKER_COUNT);
        std::env::remove_var(ENV_LOG_LEVEL);

        result.unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.logging.level, "scriptq=trace");
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_zero_workers() {
        std::env::set_var(ENV_WORKER_COUNT, "0");

        let mut config = Config::default();
        let result = config.apply_env_overrides();

        std::env::remove_var(ENV_WORKER_COUNT);

        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
        assert_eq!(config.worker_count, 10);
    }

    #[test]
    #[serial]
    fn test_no_env_leaves_config_untouched() {
        std::env::remove_var(ENV_WORKER_COUNT);
        std::env::remove_var(ENV_LOG_LEVEL);

        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_load_applies_env_overrides() {
        std::env::set_var(ENV_WORKER_COUNT, "7");

        let result = load_config_from_str(r#"{ "version": "1.0", "workerCount": 2 }"#);

        std::env::remove_var(ENV_WORKER_COUNT);

        assert_eq!(result.unwrap().worker_count, 7);
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid_env_override() {
        std::env::set_var(ENV_WORKER_COUNT, "many");

        let result = load_config_from_str(r#"{ "version": "1.0" }"#);

        std::env::remove_var(ENV_WORKER_COUNT);

        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }
}
