// src/state/session.rs
//
// Recording snapshots and engine readback.
//
// A RecordingSession is the document-level representation of one take.
// Once the recorder hands it out it is never mutated again; playback,
// save and load share it behind an `Rc`.

use chrono::{DateTime, Utc};

use crate::event::{NoteEvent, RecordedEvent};

/// Version tag written into new recording documents.
pub const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    /// Format version (any value is accepted on load).
    version: String,

    /// When the take was finished or the document was written.
    created_at: DateTime<Utc>,

    /// Events in recorded order.
    events: Vec<RecordedEvent>,
}

impl RecordingSession {
    pub fn new(events: Vec<RecordedEvent>, created_at: DateTime<Utc>) -> Self {
        Self::with_version(FORMAT_VERSION, events, created_at)
    }

    pub fn with_version(
        version: impl Into<String>,
        events: Vec<RecordedEvent>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: version.into(),
            created_at,
            events,
        }
    }

    /// Build a session from well-formed note events.
    pub fn from_note_events(events: Vec<NoteEvent>, created_at: DateTime<Utc>) -> Self {
        Self::new(events.into_iter().map(RecordedEvent::Note).collect(), created_at)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Well-formed events only, in recorded order.
    pub fn note_events(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter().filter_map(|entry| match entry {
            RecordedEvent::Note(event) => Some(event),
            RecordedEvent::Malformed { .. } => None,
        })
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the last event that has one; 0 for an empty session.
    pub fn duration(&self) -> f64 {
        self.events
            .iter()
            .rev()
            .find_map(RecordedEvent::timestamp)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Waiting for a user gesture to open the audio output.
    #[default]
    Uninitialized,
    /// Output graph allocated; notes can be played.
    Ready,
}

/// Read-only engine state for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineReadback {
    pub state: EngineState,

    /// Number of voices in the voice map (sounding or releasing).
    pub active_voices: usize,

    /// Tones still connected to the output, including panic fades.
    pub connected_tones: usize,

    /// Cleanup callbacks not yet fired.
    pub pending_cleanups: usize,

    /// Output sample rate once initialized.
    pub sample_rate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;
    use serde_json::json;

    #[test]
    fn duration_is_last_timestamp() {
        let note = Note::new(60).unwrap();
        let session = RecordingSession::from_note_events(
            vec![
                NoteEvent::On {
                    note,
                    velocity: 0.5,
                    timestamp: 0.0,
                },
                NoteEvent::Off {
                    note,
                    timestamp: 480.0,
                },
            ],
            Utc::now(),
        );
        assert_eq!(session.duration(), 480.0);
        assert_eq!(session.event_count(), 2);
        assert_eq!(session.version(), FORMAT_VERSION);
    }

    #[test]
    fn empty_session_has_zero_duration() {
        let session = RecordingSession::new(Vec::new(), Utc::now());
        assert!(session.is_empty());
        assert_eq!(session.duration(), 0.0);
    }

    #[test]
    fn duration_skips_trailing_entries_without_timestamp() {
        let note = Note::new(62).unwrap();
        let session = RecordingSession::new(
            vec![
                RecordedEvent::Note(NoteEvent::Off {
                    note,
                    timestamp: 90.0,
                }),
                RecordedEvent::Malformed {
                    raw: json!({"type": "noteOn"}),
                    reason: "missing field `note`".into(),
                },
            ],
            Utc::now(),
        );
        assert_eq!(session.duration(), 90.0);
        assert_eq!(session.note_events().count(), 1);
    }
}
