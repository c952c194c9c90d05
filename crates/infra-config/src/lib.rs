// gnnlaunch Infrastructure - Settings persistence
// Implements: SettingsRepository (defaults < TOML file < GNNLAUNCH__* env)

pub mod error;
pub mod repository;
pub mod values;

pub use error::ConfigError;
pub use repository::{default_config_path, FileSettingsRepository, CONFIG_FILE_NAME, ENV_PREFIX};
pub use values::set_value;
