use std::fmt;

/// Time unit shared by event timestamps and chunk boundaries.
pub type Tick = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8, velocity: u8 },
    ProgramChange { program: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub channel: u8,
    pub message: MidiMessage,
}

impl Event {
    pub fn note_on(channel: u8, pitch: u8, velocity: u8) -> Self {
        Self {
            channel,
            message: MidiMessage::NoteOn { pitch, velocity },
        }
    }

    pub fn note_off(channel: u8, pitch: u8, velocity: u8) -> Self {
        Self {
            channel,
            message: MidiMessage::NoteOff { pitch, velocity },
        }
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self {
            channel,
            message: MidiMessage::ProgramChange { program },
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self.message, MidiMessage::NoteOn { .. })
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self.message, MidiMessage::NoteOff { .. })
    }

    /// Pitch of a note event, `None` for anything else.
    pub fn pitch(&self) -> Option<u8> {
        match self.message {
            MidiMessage::NoteOn { pitch, .. } | MidiMessage::NoteOff { pitch, .. } => Some(pitch),
            MidiMessage::ProgramChange { .. } => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel = self.channel;
        match self.message {
            MidiMessage::NoteOn { pitch, velocity } => {
                write!(f, "Note ON  ch={channel} note={pitch} vel={velocity}")
            }
            MidiMessage::NoteOff { pitch, velocity } => {
                write!(f, "Note OFF ch={channel} note={pitch} vel={velocity}")
            }
            MidiMessage::ProgramChange { program } => {
                write!(f, "Program  ch={channel} prog={program}")
            }
        }
    }
}

/// An event placed on the renderer's sample timeline.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub sample_timestamp: u64,
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_only_for_notes() {
        assert_eq!(Event::note_on(0, 60, 100).pitch(), Some(60));
        assert_eq!(Event::note_off(0, 61, 100).pitch(), Some(61));
        assert_eq!(Event::program_change(0, 3).pitch(), None);
    }

    #[test]
    fn display_matches_monitor_format() {
        assert_eq!(
            Event::note_on(1, 64, 100).to_string(),
            "Note ON  ch=1 note=64 vel=100"
        );
        assert_eq!(
            Event::program_change(0, 0).to_string(),
            "Program  ch=0 prog=0"
        );
    }
}
