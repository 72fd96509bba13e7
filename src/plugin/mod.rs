mod monitor;
mod register;
mod scanner;
mod synthesizer;

pub use monitor::MidiMonitor;
pub use register::{InstanceId, InstanceRegister, PluginInstanceHandle, SharedInstance};
pub use scanner::{CatalogScanner, PluginScanner, builtin_catalog};
pub use synthesizer::Synthesizer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{OscillatorSynth, Patch};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginType {
    Unknown,
    Instrument,
    MidiMonitor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub plugin_type: PluginType,
    /// Sound of an `Instrument`; the default patch is used when absent.
    #[serde(default)]
    pub patch: Option<Patch>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, plugin_type: PluginType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plugin_type,
            patch: None,
        }
    }

    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patch = Some(patch);
        self
    }

    pub fn create_instance(&self) -> Result<Box<dyn PluginInstance>, PluginError> {
        match self.plugin_type {
            PluginType::Instrument => Ok(Box::new(OscillatorSynth::new(
                self.name.clone(),
                self.patch.clone().unwrap_or_default(),
            ))),
            PluginType::MidiMonitor => Ok(Box::new(MidiMonitor::new(self.name.clone()))),
            PluginType::Unknown => Err(PluginError::UnknownType {
                name: self.name.clone(),
            }),
        }
    }
}

/// A live plugin that consumes MIDI and renders mono audio.
pub trait PluginInstance: Send {
    fn name(&self) -> &str;

    fn handle_event(&mut self, event: &Event);

    /// Overwrites `output` with the next block of audio.
    fn process(&mut self, output: &mut [f32], sample_rate: f32);

    fn reset(&mut self);

    /// Name/value pairs shown by the editor view.
    fn parameters(&self) -> Vec<(String, f32)> {
        Vec::new()
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin type for '{name}'")]
    UnknownType { name: String },
}
