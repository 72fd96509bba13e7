use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::state_machine::{StreamState, Transition};
use super::{Chunk, ChunkSource, InitData, StreamError, Track};
use crate::events::{Event, Tick};
use crate::settings::ConfigError;

/// Scale degrees of the test arpeggio, in semitones above [`BASE_PITCH`].
pub const ARPEGGIO_DEGREES: [u8; 12] = [0, 4, 7, 12, 16, 19, 24, 19, 16, 12, 7, 4];
pub const BASE_PITCH: u8 = 60;
/// Length of one chunk in ticks.
pub const CHUNK_DURATION: Tick = 4440;
/// Pulls past this tick close the stream.
pub const STREAM_HORIZON: Tick = 20000;
pub const NOTE_VELOCITY: u8 = 100;
pub const TRANSPOSE_LOW: i32 = -10;
pub const TRANSPOSE_HIGH: i32 = 11;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpeggioConfig {
    pub base_pitch: u8,
    pub degrees: Vec<u8>,
    pub chunk_duration: Tick,
    pub horizon: Tick,
    pub velocity: u8,
    pub channel: u8,
    pub program: u8,
    /// Inclusive range the pitch cursor cycles through.
    pub transpose_low: i32,
    pub transpose_high: i32,
}

impl Default for ArpeggioConfig {
    fn default() -> Self {
        Self {
            base_pitch: BASE_PITCH,
            degrees: ARPEGGIO_DEGREES.to_vec(),
            chunk_duration: CHUNK_DURATION,
            horizon: STREAM_HORIZON,
            velocity: NOTE_VELOCITY,
            channel: 0,
            program: 0,
            transpose_low: TRANSPOSE_LOW,
            transpose_high: TRANSPOSE_HIGH,
        }
    }
}

impl ArpeggioConfig {
    pub fn note_duration(&self) -> Tick {
        if self.degrees.is_empty() {
            return 0;
        }
        self.chunk_duration / self.degrees.len() as Tick
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.degrees.is_empty() {
            return invalid("arpeggio has no notes".into());
        }
        if self.note_duration() == 0 {
            return invalid(format!(
                "chunk duration {} is too short for {} notes",
                self.chunk_duration,
                self.degrees.len()
            ));
        }
        if self.transpose_low > self.transpose_high {
            return invalid(format!(
                "transpose range {}..={} is empty",
                self.transpose_low, self.transpose_high
            ));
        }
        if self.channel > 15 {
            return invalid(format!("channel {} is not a MIDI channel", self.channel));
        }
        if self.program > 127 || self.velocity > 127 {
            return invalid("program and velocity must be within 0..=127".into());
        }
        if self
            .horizon
            .checked_add(self.chunk_duration.saturating_mul(2))
            .is_none()
        {
            return invalid(format!("horizon {} overflows the tick range", self.horizon));
        }

        // the first chunk plays untransposed
        let low = self.transpose_low.min(0) as i64;
        let high = self.transpose_high.max(0) as i64;
        let min_degree = self.degrees.iter().copied().min().unwrap_or(0) as i64;
        let max_degree = self.degrees.iter().copied().max().unwrap_or(0) as i64;
        let lowest = self.base_pitch as i64 + min_degree + low;
        let highest = self.base_pitch as i64 + max_degree + high;
        if lowest < 0 || highest > 127 {
            return invalid(format!(
                "arpeggio spans pitches {lowest}..={highest}, outside the MIDI range"
            ));
        }

        Ok(())
    }

    fn pitch(&self, degree: u8, offset: i32) -> u8 {
        (self.base_pitch as i64 + degree as i64 + offset as i64).clamp(0, 127) as u8
    }

    /// Note-ons plus note-offs in one chunk.
    pub fn events_per_chunk(&self) -> usize {
        self.degrees.len() * 2
    }

    /// Builds the arpeggio chunk starting at `tick`, transposed by `offset`.
    ///
    /// Chunks after the first start with a one-note rest so they do not
    /// overlap the tail of the previous chunk.
    pub fn build_chunk(&self, tick: Tick, offset: i32) -> Chunk {
        let note_duration = self.note_duration();
        let mut chunk = Chunk::new(tick, tick + self.chunk_duration);

        let mut note_time = if tick > 0 { tick + note_duration } else { tick };
        for &degree in &self.degrees {
            let pitch = self.pitch(degree, offset);
            chunk.insert(note_time, Event::note_on(self.channel, pitch, self.velocity));
            note_time += note_duration;
            chunk.insert(note_time, Event::note_off(self.channel, pitch, self.velocity));
        }

        chunk
    }
}

/// Transposition offset that walks up one semitone per chunk and wraps
/// from `high` back to `low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchCursor {
    value: Option<i32>,
    low: i32,
    high: i32,
}

impl PitchCursor {
    /// The first [`advance`](Self::advance) yields `low`.
    pub fn new(low: i32, high: i32) -> Self {
        Self {
            value: None,
            low,
            high,
        }
    }

    pub fn advance(&mut self) -> i32 {
        let next = match self.value {
            Some(value) if value < self.high => value + 1,
            _ => self.low,
        };
        self.value = Some(next);
        next
    }

    /// Offset of the last chunk produced, `None` before the first.
    pub fn current(&self) -> Option<i32> {
        self.value
    }

    pub fn period(&self) -> usize {
        (self.high as i64 - self.low as i64 + 1).max(0) as usize
    }
}

/// One arpeggio streaming session.
#[derive(Debug, Clone)]
pub struct ArpeggioGenerator {
    config: ArpeggioConfig,
    cursor: PitchCursor,
    state: StreamState,
}

impl ArpeggioGenerator {
    pub fn new(config: ArpeggioConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cursor = PitchCursor::new(config.transpose_low, config.transpose_high);
        Ok(Self {
            config,
            cursor,
            state: StreamState::Idle,
        })
    }

    pub fn config(&self) -> &ArpeggioConfig {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn pitch_offset(&self) -> Option<i32> {
        self.cursor.current()
    }

    /// Starts the session: one track with one channel, a program change at
    /// tick 0, and the untransposed chunk at tick 0.
    pub fn initialize(&mut self) -> Result<InitData, StreamError> {
        self.state = self.state.initialize()?;

        let channel = self.config.channel;
        let first = self.config.build_chunk(0, 0);
        let mut chunks = BTreeMap::new();
        chunks.insert(first.begin_tick, first);

        tracing::info!(
            notes = self.config.degrees.len(),
            chunk_duration = self.config.chunk_duration,
            horizon = self.config.horizon,
            "arpeggio session started"
        );

        Ok(InitData {
            tracks: vec![Track {
                num: 0,
                channels: vec![channel],
            }],
            init_events: vec![Event::program_change(channel, self.config.program)],
            chunks,
            synth_map: BTreeMap::new(),
        })
    }
}

impl ChunkSource for ArpeggioGenerator {
    fn request(&mut self, tick: Tick) -> Option<Chunk> {
        let (state, transition) = self.state.on_request(tick, self.config.horizon);
        self.state = state;

        match transition {
            Transition::Produce => {
                let offset = self.cursor.advance();
                let chunk = self.config.build_chunk(tick, offset);
                tracing::debug!(
                    begin = chunk.begin_tick,
                    end = chunk.end_tick,
                    offset,
                    "arpeggio chunk"
                );
                Some(chunk)
            }
            Transition::Close => {
                tracing::info!(tick, horizon = self.config.horizon, "arpeggio stream closed");
                None
            }
            Transition::Ignore => {
                tracing::warn!(tick, state = ?self.state, "ignoring chunk request");
                None
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}
