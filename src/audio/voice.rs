use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ADSRConfig {
    /// Seconds
    pub attack: f32,
    /// Seconds
    pub decay: f32,
    /// 0.0 -> 1.0
    pub sustain: f32,
    /// Seconds
    pub release: f32,
}

impl Default for ADSRConfig {
    fn default() -> Self {
        Self {
            attack: 0.005,
            decay: 0.08,
            sustain: 0.7,
            release: 0.12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeState {
    Attack { time: f32 },
    Decay { time: f32 },
    Sustain,
    Release { time: f32 },
}

fn progress(time: f32, length: f32) -> f32 {
    if length == 0.0 {
        1.0
    } else {
        (time / length).min(1.0)
    }
}

/// A sounding note of an oscillator instrument.
#[derive(Debug, Clone)]
pub struct Voice {
    pub velocity: u8,
    pub state: EnvelopeState,
    /// Level reached when the note was released.
    level: f32,
    pub phases: Vec<f32>,
}

impl Voice {
    pub fn new(velocity: u8, num_oscillators: usize) -> Self {
        Self {
            velocity,
            state: EnvelopeState::Attack { time: 0.0 },
            level: 0.0,
            phases: vec![0.0; num_oscillators],
        }
    }

    pub fn envelope(&self, adsr: &ADSRConfig) -> f32 {
        match self.state {
            EnvelopeState::Attack { time } => progress(time, adsr.attack),
            EnvelopeState::Decay { time } => {
                1.0 - (1.0 - adsr.sustain) * progress(time, adsr.decay)
            }
            EnvelopeState::Sustain => adsr.sustain,
            EnvelopeState::Release { time } => self.level * (1.0 - progress(time, adsr.release)),
        }
    }

    pub fn release(&mut self, adsr: &ADSRConfig) {
        if matches!(self.state, EnvelopeState::Release { .. }) {
            return;
        }
        self.level = self.envelope(adsr);
        self.state = EnvelopeState::Release { time: 0.0 };
    }

    pub fn is_finished(&self, adsr: &ADSRConfig) -> bool {
        matches!(self.state, EnvelopeState::Release { time } if time >= adsr.release)
    }

    /// Moves the envelope forward by `dt` seconds.
    pub fn advance(&mut self, adsr: &ADSRConfig, dt: f32) {
        self.state = match self.state {
            EnvelopeState::Attack { time } if time + dt >= adsr.attack => {
                EnvelopeState::Decay { time: 0.0 }
            }
            EnvelopeState::Attack { time } => EnvelopeState::Attack { time: time + dt },
            EnvelopeState::Decay { time } if time + dt >= adsr.decay => EnvelopeState::Sustain,
            EnvelopeState::Decay { time } => EnvelopeState::Decay { time: time + dt },
            EnvelopeState::Sustain => EnvelopeState::Sustain,
            EnvelopeState::Release { time } => EnvelopeState::Release { time: time + dt },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_walks_through_stages() {
        let adsr = ADSRConfig {
            attack: 0.1,
            decay: 0.1,
            sustain: 0.5,
            release: 0.2,
        };
        let mut voice = Voice::new(100, 1);
        assert_eq!(voice.envelope(&adsr), 0.0);

        voice.advance(&adsr, 0.05);
        assert!((voice.envelope(&adsr) - 0.5).abs() < 1e-6);

        voice.advance(&adsr, 0.05);
        assert_eq!(voice.state, EnvelopeState::Decay { time: 0.0 });
        assert_eq!(voice.envelope(&adsr), 1.0);

        voice.advance(&adsr, 0.1);
        assert_eq!(voice.state, EnvelopeState::Sustain);
        assert_eq!(voice.envelope(&adsr), 0.5);

        voice.release(&adsr);
        assert_eq!(voice.envelope(&adsr), 0.5);
        voice.advance(&adsr, 0.1);
        assert!((voice.envelope(&adsr) - 0.25).abs() < 1e-6);
        assert!(!voice.is_finished(&adsr));
        voice.advance(&adsr, 0.1);
        assert!(voice.is_finished(&adsr));
    }
}
