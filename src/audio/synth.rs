use std::collections::HashMap;

use super::{Patch, Voice, midi_to_freq};
use crate::events::{Event, MidiMessage};
use crate::plugin::PluginInstance;

/// Polyphonic oscillator instrument, one voice per pitch.
pub struct OscillatorSynth {
    name: String,
    patch: Patch,
    program: u8,
    voices: HashMap<u8, Voice>,
}

impl OscillatorSynth {
    pub fn new(name: impl Into<String>, patch: Patch) -> Self {
        Self {
            name: name.into(),
            patch,
            program: 0,
            voices: HashMap::new(),
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    fn note_on(&mut self, pitch: u8, velocity: u8) {
        let voice = Voice::new(velocity, self.patch.oscillators.len());
        self.voices.insert(pitch, voice);
    }

    fn note_off(&mut self, pitch: u8) {
        if let Some(voice) = self.voices.get_mut(&pitch) {
            voice.release(&self.patch.adsr);
        }
    }
}

impl PluginInstance for OscillatorSynth {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_event(&mut self, event: &Event) {
        match event.message {
            MidiMessage::NoteOn { pitch, velocity: 0 } => self.note_off(pitch),
            MidiMessage::NoteOn { pitch, velocity } => self.note_on(pitch, velocity),
            MidiMessage::NoteOff { pitch, .. } => self.note_off(pitch),
            MidiMessage::ProgramChange { program } => {
                self.program = program;
                self.voices.clear();
            }
        }
    }

    fn process(&mut self, output: &mut [f32], sample_rate: f32) {
        output.fill(0.0);
        if output.is_empty() {
            return;
        }

        let adsr = &self.patch.adsr;
        for (pitch, voice) in &mut self.voices {
            let envelope = voice.envelope(adsr);
            let velocity_scale = voice.velocity as f32 / 127.0;

            for (osc, phase) in self.patch.oscillators.iter().zip(voice.phases.iter_mut()) {
                let note = (*pitch as i16 + osc.semitone as i16).clamp(0, 127) as u8;
                let step = midi_to_freq(note) / sample_rate;
                let amplitude = envelope * velocity_scale * osc.gain * self.patch.gain;

                for sample in output.iter_mut() {
                    *sample += osc.wave.sample(*phase) * amplitude;
                    *phase += step;
                    if *phase >= 1.0 {
                        *phase -= 1.0;
                    }
                }
            }

            voice.advance(adsr, output.len() as f32 / sample_rate);
        }

        self.voices.retain(|_, voice| !voice.is_finished(adsr));
    }

    fn reset(&mut self) {
        self.voices.clear();
    }

    fn parameters(&self) -> Vec<(String, f32)> {
        let adsr = &self.patch.adsr;
        vec![
            ("program".into(), self.program as f32),
            ("oscillators".into(), self.patch.oscillators.len() as f32),
            ("gain".into(), self.patch.gain),
            ("attack".into(), adsr.attack),
            ("decay".into(), adsr.decay),
            ("sustain".into(), adsr.sustain),
            ("release".into(), adsr.release),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48000.0;

    fn peak(buffer: &[f32]) -> f32 {
        buffer.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn note_sounds_then_dies_out() {
        let mut synth = OscillatorSynth::new("test", Patch::default());
        let mut buffer = vec![0.0; 512];

        synth.process(&mut buffer, SAMPLE_RATE);
        assert_eq!(peak(&buffer), 0.0);

        synth.handle_event(&Event::note_on(0, 60, 100));
        assert_eq!(synth.active_voices(), 1);
        synth.process(&mut buffer, SAMPLE_RATE);
        synth.process(&mut buffer, SAMPLE_RATE);
        assert!(peak(&buffer) > 0.01);

        synth.handle_event(&Event::note_off(0, 60, 100));
        for _ in 0..40 {
            synth.process(&mut buffer, SAMPLE_RATE);
        }
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn program_change_silences_voices() {
        let mut synth = OscillatorSynth::new("test", Patch::default());
        synth.handle_event(&Event::note_on(0, 60, 100));
        synth.handle_event(&Event::note_on(0, 64, 100));
        assert_eq!(synth.active_voices(), 2);

        synth.handle_event(&Event::program_change(0, 5));
        assert_eq!(synth.active_voices(), 0);
        assert!(synth.parameters().contains(&("program".to_string(), 5.0)));
    }
}
