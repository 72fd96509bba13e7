use super::{PluginInstanceHandle, SharedInstance};
use crate::events::Event;

/// Drives a plugin instance as the sound source of a track.
#[derive(Clone)]
pub struct Synthesizer {
    name: String,
    instance: SharedInstance,
}

impl Synthesizer {
    pub fn create(handle: &PluginInstanceHandle) -> Self {
        Self {
            name: format!("{}#{}", handle.descriptor.id, handle.id),
            instance: handle.instance.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle_event(&self, event: &Event) {
        self.instance.lock().handle_event(event);
    }

    pub fn process(&self, output: &mut [f32], sample_rate: f32) {
        self.instance.lock().process(output, sample_rate);
    }

    pub fn reset(&self) {
        self.instance.lock().reset();
    }
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer").field("name", &self.name).finish()
    }
}
