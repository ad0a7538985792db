pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, ENV_LOG_LEVEL, ENV_WORKER_COUNT};
pub use schema::{Config, EvaluatorConfig, EventsConfig, LogFormat, LoggingConfig};
