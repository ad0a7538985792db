//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use scriptq::config::{Config, EvaluatorConfig, LogFormat};

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with small, test-friendly defaults.
    pub fn new() -> Self {
        Self {
            config: Config {
                worker_count: 2,
                ..Config::default()
            },
        }
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn program(mut self, program: &str, args: &[&str]) -> Self {
        self.config.evaluator = EvaluatorConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..self.config.evaluator
        };
        self
    }

    pub fn json_logs(mut self) -> Self {
        self.config.logging.format = LogFormat::Json;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    /// Serialize the config into `dir/name` and return the path.
    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let json = serde_json::to_string_pretty(&self.config).expect("Failed to serialize config");
        std::fs::write(&path, json).expect("Failed to write config file");
        path
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
