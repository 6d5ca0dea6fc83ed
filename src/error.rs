// src/error.rs
//
// Error types for the engine, the recording document and the app context.
//
// Nothing here is fatal: the worst user-visible outcome is "no sound",
// recoverable by initializing again after the next user gesture.

use thiserror::Error;

use crate::graph::ToneId;

/// The host audio subsystem could not be opened.
///
/// Not retried automatically; the caller waits for another user gesture.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InitializationError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("audio output reported an unusable format ({sample_rate} Hz, {channels} channels)")]
    InvalidOutput { sample_rate: f64, channels: u16 },
}

/// A recording document could not be loaded.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("recording is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("recording has no `events` field")]
    MissingEvents,

    #[error("recording `events` must be an array")]
    EventsNotASequence,
}

/// One recorded event could not be replayed. Playback skips it and continues.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("event #{index} cannot be replayed: {reason}")]
pub struct PlaybackEventError {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("note {note} is outside the playable range {lowest}..={highest}")]
pub struct NoteOutOfRange {
    pub note: i64,
    pub lowest: u8,
    pub highest: u8,
}

/// Rejected automation on a gain parameter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("automation value {0} is not finite")]
    NonFiniteValue(f32),

    #[error("automation time {0} is not a finite, non-negative instant")]
    InvalidTime(f64),

    #[error("exponential ramp target must be positive, got {0}")]
    NonPositiveExponentialTarget(f32),
}

/// Failure while scheduling a voice on the audio graph.
///
/// The engine never propagates these; it degrades to local cleanup of the
/// affected voice.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("tone {0:?} is no longer connected")]
    Disconnected(ToneId),

    #[error(transparent)]
    Param(#[from] ParamError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config field `{field}` has invalid value {value}")]
    Invalid { field: &'static str, value: f64 },
}

/// Errors surfaced by the keyboard context to its UI layer.
#[derive(Debug, Error)]
pub enum KeyboardError {
    #[error("there is no recording to save")]
    NothingToSave,

    #[error(transparent)]
    Format(#[from] FormatError),
}
