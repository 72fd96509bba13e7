use std::collections::BTreeMap;
use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender};
use thiserror::Error;

use super::{Chunk, StreamState};
use crate::events::{Event, Tick};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub num: u16,
    pub channels: Vec<u8>,
}

/// Everything a consumer needs before the first pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitData {
    pub tracks: Vec<Track>,
    pub init_events: Vec<Event>,
    pub chunks: BTreeMap<Tick, Chunk>,
    /// Track number to synthesizer name.
    pub synth_map: BTreeMap<u16, String>,
}

impl InitData {
    /// Tick at which the consumer should issue its first pull.
    pub fn next_tick(&self) -> Tick {
        self.chunks.values().map(|c| c.end_tick).max().unwrap_or(0)
    }

    pub fn track_for_channel(&self, channel: u8) -> Option<u16> {
        self.tracks
            .iter()
            .find(|t| t.channels.contains(&channel))
            .map(|t| t.num)
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream already started (state {0:?})")]
    AlreadyStarted(StreamState),
    #[error("stream sink is closed")]
    SinkClosed,
}

/// Pull side of a chunk stream. The consumer decides the pace.
pub trait ChunkSource: Send {
    /// Returns the chunk starting at `tick`, or `None` once the stream has
    /// nothing more to give.
    fn request(&mut self, tick: Tick) -> Option<Chunk>;

    fn is_closed(&self) -> bool;
}

/// Push side of a chunk stream.
pub trait ChunkSink {
    fn send(&mut self, chunk: Chunk) -> Result<(), StreamError>;
    fn close(&mut self);
}

pub struct ChannelSink {
    tx: Option<Sender<Chunk>>,
}

impl ChannelSink {
    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

impl ChunkSink for ChannelSink {
    fn send(&mut self, chunk: Chunk) -> Result<(), StreamError> {
        let tx = self.tx.as_ref().ok_or(StreamError::SinkClosed)?;
        tx.send(chunk).map_err(|_| StreamError::SinkClosed)
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

pub fn chunk_channel() -> (ChannelSink, Receiver<Chunk>) {
    let (tx, rx) = crossbeam::channel::unbounded();
    (ChannelSink { tx: Some(tx) }, rx)
}

/// Services one pull: delivers the chunk for `tick` or closes the sink.
/// Returns whether the stream is still open.
pub fn pump<S, K>(source: &mut S, tick: Tick, sink: &mut K) -> Result<bool, StreamError>
where
    S: ChunkSource + ?Sized,
    K: ChunkSink + ?Sized,
{
    match source.request(tick) {
        Some(chunk) => {
            sink.send(chunk)?;
            Ok(true)
        }
        None => {
            if !source.is_closed() {
                tracing::warn!(tick, "source produced nothing while open, closing sink");
            }
            sink.close();
            Ok(false)
        }
    }
}

/// Consumer end of a stream served on another thread.
pub struct StreamHandle {
    request_tx: Option<Sender<Tick>>,
    chunk_rx: Receiver<Chunk>,
    closed: bool,
    thread: Option<JoinHandle<()>>,
}

/// Moves `source` onto a dedicated thread that answers tick requests.
pub fn spawn_stream_server<S>(mut source: S) -> StreamHandle
where
    S: ChunkSource + 'static,
{
    let (request_tx, request_rx) = crossbeam::channel::unbounded::<Tick>();
    let (mut sink, chunk_rx) = chunk_channel();

    let thread = std::thread::spawn(move || {
        for tick in request_rx.iter() {
            match pump(&mut source, tick, &mut sink) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    tracing::debug!(%err, "stream consumer went away");
                    break;
                }
            }
        }
        tracing::debug!("stream server finished");
    });

    StreamHandle {
        request_tx: Some(request_tx),
        chunk_rx,
        closed: false,
        thread: Some(thread),
    }
}

impl ChunkSource for StreamHandle {
    fn request(&mut self, tick: Tick) -> Option<Chunk> {
        if self.closed {
            return None;
        }
        let delivered = self
            .request_tx
            .as_ref()
            .and_then(|tx| tx.send(tick).ok())
            .and_then(|_| self.chunk_rx.recv().ok());
        if delivered.is_none() {
            self.closed = true;
            self.request_tx = None;
        }
        delivered
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.request_tx = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{ArpeggioConfig, ArpeggioGenerator};

    fn generator() -> (ArpeggioGenerator, InitData) {
        let mut generator = ArpeggioGenerator::new(ArpeggioConfig::default()).unwrap();
        let init = generator.initialize().unwrap();
        (generator, init)
    }

    #[test]
    fn pump_sends_then_closes() {
        let (mut source, _) = generator();
        let (mut sink, rx) = chunk_channel();

        assert!(pump(&mut source, 4440, &mut sink).unwrap());
        assert_eq!(rx.try_recv().unwrap().begin_tick, 4440);

        assert!(!pump(&mut source, 20001, &mut sink).unwrap());
        assert!(sink.is_closed());
        assert!(rx.recv().is_err());
        assert!(matches!(
            sink.send(Chunk::new(0, 1)),
            Err(StreamError::SinkClosed)
        ));
    }

    #[test]
    fn served_stream_matches_direct_pulls() {
        let (mut direct, init) = generator();
        let mut served = spawn_stream_server(generator().0);

        let mut tick = init.next_tick();
        assert_eq!(tick, 4440);
        loop {
            let expected = direct.request(tick);
            let actual = served.request(tick);
            assert_eq!(expected, actual);
            match actual {
                Some(chunk) => tick = chunk.end_tick,
                None => break,
            }
        }
        assert!(served.is_closed());
        assert!(served.request(0).is_none());
        // 4440, 8880, 13320, 17760 are served; 22200 closes
        assert_eq!(tick, 22200);
    }

    #[test]
    fn track_lookup() {
        let (_, init) = generator();
        assert_eq!(init.track_for_channel(0), Some(0));
        assert_eq!(init.track_for_channel(3), None);
    }
}
