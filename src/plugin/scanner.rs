use super::{PluginDescriptor, PluginType};
use crate::audio::{ADSRConfig, OscConfig, Patch, Wave};

pub trait PluginScanner {
    fn scan(&self) -> Vec<PluginDescriptor>;
}

/// Serves a fixed list of descriptors, usually read from the settings file.
#[derive(Debug, Clone)]
pub struct CatalogScanner {
    catalog: Vec<PluginDescriptor>,
}

impl CatalogScanner {
    pub fn new(catalog: Vec<PluginDescriptor>) -> Self {
        Self { catalog }
    }
}

impl Default for CatalogScanner {
    fn default() -> Self {
        Self::new(builtin_catalog())
    }
}

impl PluginScanner for CatalogScanner {
    fn scan(&self) -> Vec<PluginDescriptor> {
        tracing::debug!(plugins = self.catalog.len(), "scanned plugin catalog");
        self.catalog.clone()
    }
}

pub fn builtin_catalog() -> Vec<PluginDescriptor> {
    let square_lead = Patch {
        oscillators: vec![
            OscConfig {
                wave: Wave::Square,
                gain: 0.3,
                semitone: 0,
            },
            OscConfig {
                wave: Wave::Square,
                gain: 0.15,
                semitone: -12,
            },
        ],
        adsr: ADSRConfig {
            attack: 0.01,
            decay: 0.2,
            sustain: 0.4,
            release: 0.3,
        },
        gain: 0.4,
    };

    vec![
        PluginDescriptor::new("test-synth", "Test Synth", PluginType::Instrument)
            .with_patch(Patch::default()),
        PluginDescriptor::new("square-lead", "Square Lead", PluginType::Instrument)
            .with_patch(square_lead),
        PluginDescriptor::new("midi-monitor", "MIDI Monitor", PluginType::MidiMonitor),
    ]
}
