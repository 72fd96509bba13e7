use serde::{Deserialize, Serialize};

use super::ADSRConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wave {
    Sine,
    Square,
    Saw,
}

impl Wave {
    /// One sample of the waveform at `phase` in `[0, 1)`.
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Wave::Sine => (phase * 2.0 * std::f32::consts::PI).sin(),
            Wave::Square => {
                if phase < 0.5 {
                    -1.0
                } else {
                    1.0
                }
            }
            Wave::Saw => phase * 2.0 - 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscConfig {
    pub wave: Wave,
    pub gain: f32,
    pub semitone: i8,
}

/// Sound of an oscillator instrument plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patch {
    pub oscillators: Vec<OscConfig>,
    pub adsr: ADSRConfig,
    pub gain: f32,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            oscillators: vec![
                OscConfig {
                    wave: Wave::Sine,
                    gain: 0.6,
                    semitone: 0,
                },
                OscConfig {
                    wave: Wave::Saw,
                    gain: 0.15,
                    semitone: 12,
                },
            ],
            adsr: ADSRConfig::default(),
            gain: 0.5,
        }
    }
}
