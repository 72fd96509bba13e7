mod arpeggio;
mod chunk;
mod scheduler;
mod state_machine;
mod stream;

pub use arpeggio::{
    ARPEGGIO_DEGREES, ArpeggioConfig, ArpeggioGenerator, BASE_PITCH, CHUNK_DURATION,
    NOTE_VELOCITY, PitchCursor, STREAM_HORIZON, TRANSPOSE_HIGH, TRANSPOSE_LOW,
};
pub use chunk::Chunk;
pub use scheduler::{
    EventConsumer, EventProducer, SchedulerError, TickClock, schedule_chunk_events,
    schedule_init_events,
};
pub use state_machine::{StreamState, Transition};
pub use stream::{
    ChannelSink, ChunkSink, ChunkSource, InitData, StreamError, StreamHandle, Track,
    chunk_channel, pump, spawn_stream_server,
};
