use super::PluginInstance;
use crate::events::Event;

/// Prints every event it receives and stays silent.
pub struct MidiMonitor {
    name: String,
    received: u64,
    notes_held: u32,
}

impl MidiMonitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: 0,
            notes_held: 0,
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

impl PluginInstance for MidiMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_event(&mut self, event: &Event) {
        self.received += 1;
        if event.is_note_on() {
            self.notes_held += 1;
        } else if event.is_note_off() {
            self.notes_held = self.notes_held.saturating_sub(1);
        }
        tracing::info!(target: "midi", "[{:>6}] {event}", self.received);
    }

    fn process(&mut self, output: &mut [f32], _sample_rate: f32) {
        output.fill(0.0);
    }

    fn reset(&mut self) {
        self.received = 0;
        self.notes_held = 0;
    }

    fn parameters(&self) -> Vec<(String, f32)> {
        vec![
            ("received".into(), self.received as f32),
            ("held".into(), self.notes_held as f32),
        ]
    }
}
