//! Layered configuration for the `timetable` binary.

use std::path::Path;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use timetable_engine::EngineOptions;

/// Default file looked up in the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "timetable.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineOptions,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// Load defaults, then the TOML file, then `TIMETABLE_*` variables
    /// (`TIMETABLE_ENGINE__TIMEZONE=Africa/Lagos`). Later sources win.
    ///
    /// An explicit `path` must exist; the default file is optional.
    ///
    /// # Errors
    /// Returns an error if a source cannot be read or the merged values do
    /// not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Ok(Config::builder()
            .set_default("logging.level", "warn")?
            .add_source(file)
            .add_source(
                Environment::with_prefix("TIMETABLE")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?)
    }
}
