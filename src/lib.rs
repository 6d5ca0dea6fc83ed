// src/lib.rs
//
// Library entry point for the browser bindings and native tools.

mod clock;
mod config;
mod document;
mod engine;
mod error;
mod event;
mod graph;
mod host;
mod keyboard;
mod note;
mod observer;
mod parameter;
mod playback;
mod recorder;
mod state;
mod timer;
mod voice;

#[cfg(feature = "web")]
mod wasm;

// Re-export key types for Rust consumers
pub use clock::Clock;
pub use config::{EngineConfig, KeyboardConfig, PlaybackConfig};
pub use document::{RecordingDocument, deserialize, from_json, serialize, serialize_at, to_json};
pub use engine::SynthEngine;
pub use error::{
    ConfigError, FormatError, InitializationError, KeyboardError, NoteOutOfRange, ParamError,
    PlaybackEventError, ScheduleError,
};
pub use event::{KeyTransition, NoteEvent, RecordedEvent};
pub use graph::{AudioGraph, ToneId};
pub use host::{AudioHost, OfflineHost, OutputSpec, UnavailableHost};
pub use keyboard::{Keyboard, LifecycleSignal};
pub use note::{HIGHEST_NOTE, LOWEST_NOTE, Note, frequency_of};
pub use observer::{Notification, NotificationLog, TimedNotification, VoiceObserver};
pub use parameter::GainParam;
pub use playback::PlaybackScheduler;
pub use recorder::{EventRecorder, RecorderState};
pub use state::{EngineReadback, EngineState, FORMAT_VERSION, RecordingSession};
pub use timer::{TimerHandle, TimerQueue};
pub use voice::{VoiceId, VoiceState};
