pub mod loader;
pub mod schema;

pub use loader::{discover, load_from_path, load_from_str, ConfigError, ConfigSource};
pub use schema::{MarkerConfig, PatcherConfig, ValidationError, ValidationIssue, WriteConfig};

/// File name looked up in the current directory when no config is given.
pub const DEFAULT_CONFIG_FILE: &str = "region-patcher.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "REGION_PATCHER_CONFIG";
