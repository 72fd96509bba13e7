use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::engine::EngineConfig;
use crate::plugin::{PluginDescriptor, builtin_catalog};
use crate::timing::ArpeggioConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub arpeggio: ArpeggioConfig,
    pub engine: EngineConfig,
    pub plugins: Vec<PluginDescriptor>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            arpeggio: ArpeggioConfig::default(),
            engine: EngineConfig::default(),
            plugins: builtin_catalog(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arpeggio.validate()?;
        let engine = &self.engine;
        if engine.sample_rate == 0 || engine.ticks_per_beat == 0 || engine.bpm <= 0.0 {
            return Err(ConfigError::Invalid(
                "sample rate, ticks per beat and bpm must be positive".into(),
            ));
        }
        if engine.block_size == 0 || engine.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "block size and event capacity must be positive".into(),
            ));
        }
        // setup events, the tail of one chunk and the next chunk can be queued at once
        let needed = 1 + 2 * self.arpeggio.events_per_chunk();
        if engine.event_capacity < needed {
            return Err(ConfigError::Invalid(format!(
                "event capacity {} cannot hold {needed} queued arpeggio events",
                engine.event_capacity
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        let settings: Settings = ron::from_str(&ron_string)?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Loads `path` when given, the defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
