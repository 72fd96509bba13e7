use crate::events::{ScheduledEvent, Tick};
use crate::plugin::Synthesizer;
use crate::timing::{
    self, ChunkSource, EventConsumer, EventProducer, InitData, SchedulerError, TickClock,
};
use crossbeam::channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use ringbuf::{
    HeapRb,
    traits::{Consumer, Observer, Split},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub bpm: f32,
    pub ticks_per_beat: u32,
    /// Frames rendered per block.
    pub block_size: usize,
    /// Capacity of the scheduled event queue.
    pub event_capacity: usize,
    /// Seconds rendered after the last event so releases can ring out.
    pub tail_seconds: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            bpm: 120.0,
            ticks_per_beat: 480,
            block_size: 256,
            event_capacity: 4096,
            tail_seconds: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn clock(&self) -> TickClock {
        TickClock {
            ticks_per_beat: self.ticks_per_beat,
            bpm: self.bpm,
            sample_rate: self.sample_rate,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to write audio: {0}")]
    Wav(#[from] hound::Error),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// A MIDI stream plus the synthesizers that voice its tracks.
pub struct MidiSource {
    init: InitData,
    stream: Box<dyn ChunkSource>,
    synths: BTreeMap<u16, Synthesizer>,
}

impl MidiSource {
    pub fn new(init: InitData, stream: impl ChunkSource + 'static) -> Self {
        Self {
            init,
            stream: Box::new(stream),
            synths: BTreeMap::new(),
        }
    }

    pub fn load_synth(&mut self, track: u16, synth: Synthesizer) {
        self.init.synth_map.insert(track, synth.name().to_string());
        self.synths.insert(track, synth);
    }

    pub fn init_data(&self) -> &InitData {
        &self.init
    }

    pub fn stream_mut(&mut self) -> &mut dyn ChunkSource {
        self.stream.as_mut()
    }

    fn synth_for_channel(&self, channel: u8) -> Option<&Synthesizer> {
        let track = self.init.track_for_channel(channel)?;
        self.synths.get(&track)
    }
}

impl std::fmt::Debug for MidiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiSource")
            .field("tracks", &self.init.tracks.len())
            .field("synth_map", &self.init.synth_map)
            .field("closed", &self.stream.is_closed())
            .finish()
    }
}

#[derive(Debug)]
pub enum EngineCommand {
    Play(MidiSource),
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineUpdate {
    PlaybackState { playing: bool },
    ChunkReceived { begin_tick: Tick, end_tick: Tick },
    StreamClosed,
    Finished { frames: u64 },
    Stopped { frames: u64 },
    Error { message: String },
}

pub trait AudioEngine {
    /// Starts playing `source`. Progress is reported asynchronously.
    fn play(&self, source: MidiSource);
}

pub struct EngineHandle {
    pub command_tx: Sender<EngineCommand>,
    pub update_rx: Receiver<EngineUpdate>,
}

impl AudioEngine for EngineHandle {
    fn play(&self, source: MidiSource) {
        if self.command_tx.send(EngineCommand::Play(source)).is_err() {
            tracing::error!("audio engine is not running");
        }
    }
}

pub trait AudioSink: Send {
    fn write(&mut self, block: &[f32]) -> Result<(), EngineError>;
    fn finish(&mut self) -> Result<(), EngineError>;
}

/// Writes mono 32-bit float WAV. Each playback rewrites the file.
pub struct WavSink {
    path: PathBuf,
    spec: hound::WavSpec,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn new(path: impl AsRef<Path>, sample_rate: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            spec: hound::WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
            writer: None,
        }
    }
}

impl AudioSink for WavSink {
    fn write(&mut self, block: &[f32]) -> Result<(), EngineError> {
        if self.writer.is_none() {
            self.writer = Some(hound::WavWriter::create(&self.path, self.spec)?);
        }
        if let Some(writer) = self.writer.as_mut() {
            for &sample in block {
                writer.write_sample(sample)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            tracing::info!(path = %self.path.display(), "wrote rendered audio");
        }
        Ok(())
    }
}

/// Collects rendered samples in memory; clones share the buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    samples: Arc<Mutex<Vec<f32>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<f32> {
        self.samples.lock().clone()
    }
}

impl AudioSink for MemorySink {
    fn write(&mut self, block: &[f32]) -> Result<(), EngineError> {
        self.samples.lock().extend_from_slice(block);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

pub fn spawn_engine(config: EngineConfig, sink: Box<dyn AudioSink>) -> EngineHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();

    std::thread::spawn(move || {
        engine_thread(config, sink, command_rx, update_tx);
    });

    EngineHandle {
        command_tx,
        update_rx,
    }
}

fn engine_thread(
    config: EngineConfig,
    mut sink: Box<dyn AudioSink>,
    command_rx: Receiver<EngineCommand>,
    update_tx: Sender<EngineUpdate>,
) {
    loop {
        match command_rx.recv() {
            Ok(EngineCommand::Play(source)) => {
                tracing::info!(?source, "starting playback");
                let _ = update_tx.send(EngineUpdate::PlaybackState { playing: true });

                let mut playback = Playback::new(&config, source);
                match playback.run(sink.as_mut(), &command_rx, &update_tx) {
                    Ok(update) => {
                        tracing::info!(?update, "playback ended");
                        let _ = update_tx.send(update);
                    }
                    Err(e) => {
                        tracing::error!(%e, "playback failed");
                        let _ = update_tx.send(EngineUpdate::Error {
                            message: format!("Playback failed: {}", e),
                        });
                    }
                }

                let _ = update_tx.send(EngineUpdate::PlaybackState { playing: false });
            }

            Ok(EngineCommand::Stop) => {
                let _ = update_tx.send(EngineUpdate::PlaybackState { playing: false });
            }

            Err(crossbeam::channel::RecvError) => break,
        }
    }
    tracing::debug!("engine thread finished");
}

struct Playback<'a> {
    config: &'a EngineConfig,
    clock: TickClock,
    source: MidiSource,
    producer: EventProducer,
    consumer: EventConsumer,
    pending_event: Option<ScheduledEvent>,
    stream_open: bool,
    next_tick: Tick,
    position: u64,
    scratch: Vec<f32>,
}

impl<'a> Playback<'a> {
    fn new(config: &'a EngineConfig, source: MidiSource) -> Self {
        let ring = HeapRb::<ScheduledEvent>::new(config.event_capacity.max(1));
        let (producer, consumer) = ring.split();
        let stream_open = !source.stream.is_closed();
        let next_tick = source.init.next_tick();
        Self {
            config,
            clock: config.clock(),
            source,
            producer,
            consumer,
            pending_event: None,
            stream_open,
            next_tick,
            position: 0,
            scratch: vec![0.0; config.block_size.max(1)],
        }
    }

    fn run(
        &mut self,
        sink: &mut dyn AudioSink,
        command_rx: &Receiver<EngineCommand>,
        update_tx: &Sender<EngineUpdate>,
    ) -> Result<EngineUpdate, EngineError> {
        timing::schedule_init_events(&self.source.init.init_events, &mut self.producer)?;
        for chunk in self.source.init.chunks.values() {
            timing::schedule_chunk_events(chunk, &self.clock, &mut self.producer)?;
        }

        let block_size = self.config.block_size.max(1);
        let tail = (self.config.tail_seconds.max(0.0) * self.config.sample_rate as f32) as u64;
        let mut block = vec![0.0; block_size];
        let mut finish_at: Option<u64> = None;

        let outcome = loop {
            match command_rx.try_recv() {
                Ok(EngineCommand::Stop) => {
                    break EngineUpdate::Stopped {
                        frames: self.position,
                    };
                }
                Ok(EngineCommand::Play(_)) => {
                    tracing::warn!("already playing, ignoring play request");
                    let _ = update_tx.send(EngineUpdate::Error {
                        message: "Engine is already playing".into(),
                    });
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            let block_end = self.position + block_size as u64;
            self.pull_chunks(block_end, update_tx)?;
            self.render_block(&mut block);
            sink.write(&block)?;
            self.position = block_end;

            if finish_at.is_none() && self.is_drained() {
                finish_at = Some(self.position + tail);
            }
            if finish_at.is_some_and(|end| self.position >= end) {
                break EngineUpdate::Finished {
                    frames: self.position,
                };
            }
        };

        sink.finish()?;
        for synth in self.source.synths.values() {
            synth.reset();
        }
        Ok(outcome)
    }

    fn is_drained(&self) -> bool {
        !self.stream_open && self.pending_event.is_none() && self.consumer.is_empty()
    }

    /// Requests chunks until the queued events cover the block ending at
    /// `block_end`.
    fn pull_chunks(
        &mut self,
        block_end: u64,
        update_tx: &Sender<EngineUpdate>,
    ) -> Result<(), EngineError> {
        while self.stream_open && self.clock.tick_to_sample(self.next_tick) < block_end {
            match self.source.stream.request(self.next_tick) {
                Some(chunk) => {
                    timing::schedule_chunk_events(&chunk, &self.clock, &mut self.producer)?;
                    let _ = update_tx.send(EngineUpdate::ChunkReceived {
                        begin_tick: chunk.begin_tick,
                        end_tick: chunk.end_tick,
                    });
                    self.next_tick = chunk.end_tick.max(self.next_tick + 1);
                }
                None => {
                    tracing::debug!(tick = self.next_tick, "midi stream closed");
                    self.stream_open = false;
                    let _ = update_tx.send(EngineUpdate::StreamClosed);
                }
            }
        }
        Ok(())
    }

    fn render_block(&mut self, block: &mut [f32]) {
        let block_end = self.position + block.len() as u64;

        let mut events: Vec<ScheduledEvent> = Vec::with_capacity(64);
        if let Some(ev) = self.pending_event.take() {
            if ev.sample_timestamp < block_end {
                events.push(ev);
            } else {
                self.pending_event = Some(ev);
            }
        }

        while self.pending_event.is_none() {
            match self.consumer.try_pop() {
                Some(ev) if ev.sample_timestamp < block_end => events.push(ev),
                Some(ev) => {
                    self.pending_event = Some(ev);
                    break;
                }
                None => break,
            }
        }

        events.sort_by_key(|e| e.sample_timestamp);

        let mut frame = 0;
        for scheduled in &events {
            let at = (scheduled.sample_timestamp.saturating_sub(self.position) as usize)
                .min(block.len());
            if at > frame {
                self.mix(&mut block[frame..at]);
                frame = at;
            }
            match self.source.synth_for_channel(scheduled.event.channel) {
                Some(synth) => synth.handle_event(&scheduled.event),
                None => tracing::trace!(event = %scheduled.event, "no synth for channel"),
            }
        }
        self.mix(&mut block[frame..]);
    }

    fn mix(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        if output.is_empty() {
            return;
        }
        let sample_rate = self.config.sample_rate as f32;
        let scratch = &mut self.scratch[..output.len()];
        for synth in self.source.synths.values() {
            synth.process(scratch, sample_rate);
            for (out, sample) in output.iter_mut().zip(scratch.iter()) {
                *out += *sample;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::plugin::{InstanceRegister, PluginDescriptor, PluginType};
    use crate::timing::{ArpeggioConfig, ArpeggioGenerator, Chunk};
    use std::time::Duration;

    fn test_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 8000,
            block_size: 128,
            tail_seconds: 0.25,
            ..Default::default()
        }
    }

    fn synth(plugin_type: PluginType) -> Synthesizer {
        let register = InstanceRegister::new();
        let id = register
            .register(&PluginDescriptor::new("synth", "Synth", plugin_type))
            .unwrap();
        Synthesizer::create(&register.instance(id).unwrap())
    }

    fn collect_until_done(handle: &EngineHandle) -> Vec<EngineUpdate> {
        let mut updates = Vec::new();
        loop {
            let update = handle
                .update_rx
                .recv_timeout(Duration::from_secs(30))
                .expect("engine went quiet");
            let done = update == EngineUpdate::PlaybackState { playing: false };
            updates.push(update);
            if done {
                return updates;
            }
        }
    }

    #[test]
    fn renders_arpeggio_until_stream_closes() {
        let config = test_config();
        let clock = config.clock();
        let sink = MemorySink::new();
        let engine = spawn_engine(config, Box::new(sink.clone()));

        let mut generator = ArpeggioGenerator::new(ArpeggioConfig::default()).unwrap();
        let init = generator.initialize().unwrap();
        let mut source = MidiSource::new(init, generator);
        source.load_synth(0, synth(PluginType::Instrument));
        assert_eq!(source.init_data().synth_map[&0], "synth#0");

        engine.play(source);
        let updates = collect_until_done(&engine);

        let chunks: Vec<_> = updates
            .iter()
            .filter_map(|u| match u {
                EngineUpdate::ChunkReceived { begin_tick, .. } => Some(*begin_tick),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec![4440, 8880, 13320, 17760]);
        assert!(updates.contains(&EngineUpdate::StreamClosed));

        let frames = updates
            .iter()
            .find_map(|u| match u {
                EngineUpdate::Finished { frames } => Some(*frames),
                _ => None,
            })
            .unwrap();
        // last note-off of the final chunk, plus the tail
        assert!(frames >= clock.tick_to_sample(17760 + 370 * 13) + 2000);

        let samples = sink.samples();
        assert_eq!(samples.len() as u64, frames);
        assert!(samples.iter().any(|s| s.abs() > 0.01));
        let tail = &samples[samples.len() - 100..];
        assert!(tail.iter().all(|s| s.abs() < 1e-3));
    }

    struct Endless;

    impl ChunkSource for Endless {
        fn request(&mut self, tick: Tick) -> Option<Chunk> {
            let mut chunk = Chunk::new(tick, tick + 480);
            chunk.insert(tick, Event::note_on(0, 60, 90));
            chunk.insert(tick + 240, Event::note_off(0, 60, 90));
            Some(chunk)
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[test]
    fn stop_interrupts_playback() {
        let engine = spawn_engine(test_config(), Box::new(MemorySink::new()));
        let mut source = MidiSource::new(InitData::default(), Endless);
        source.load_synth(0, synth(PluginType::MidiMonitor));

        engine.play(source);
        engine.command_tx.send(EngineCommand::Stop).unwrap();
        let updates = collect_until_done(&engine);
        assert!(
            updates
                .iter()
                .any(|u| matches!(u, EngineUpdate::Stopped { .. }))
        );
    }
}
