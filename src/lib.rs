pub mod audio;
pub mod devtools;
pub mod engine;
pub mod events;
pub mod interactive;
pub mod plugin;
pub mod settings;
pub mod timing;

pub use devtools::{DevTools, DevToolsError, InstanceEditorModel};
pub use engine::{
    AudioEngine, AudioSink, EngineCommand, EngineConfig, EngineHandle, EngineUpdate, MemorySink,
    MidiSource, WavSink, spawn_engine,
};
pub use events::{Event, MidiMessage, Tick};
pub use interactive::{Interactive, Navigator, UriQuery};
pub use settings::{ConfigError, Settings};
