//! Configuration: tunables from disk, backend settings from the environment.

pub mod loader;
pub mod resolver;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use resolver::{
    BackendSettings, ConfigurationResolver, EnvSettings, MapSettings, SettingsSource,
};
pub use schema::CoreConfig;
