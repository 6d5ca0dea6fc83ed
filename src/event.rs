// src/event.rs

use crate::error::PlaybackEventError;
use crate::note::Note;

/// ===============================
/// Input-side transitions
/// ===============================

/// A key transition as delivered by input capture.
///
/// Input capture has already removed key-repeat: a held key produces one
/// `pressed: true` and, later, one `pressed: false`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyTransition {
    pub note: Note,
    pub velocity: f64,
    pub pressed: bool,
}

impl KeyTransition {
    pub fn press(note: Note, velocity: f64) -> Self {
        Self {
            note,
            velocity,
            pressed: true,
        }
    }

    pub fn release(note: Note) -> Self {
        Self {
            note,
            velocity: 0.0,
            pressed: false,
        }
    }
}

/// ===============================
/// Recorded events
/// ===============================

/// A note event stamped relative to the start of its recording.
///
/// These events:
/// - are immutable once recorded
/// - carry milliseconds since recording start, not wall-clock time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteEvent {
    On {
        note: Note,
        velocity: f64,
        timestamp: f64,
    },

    Off {
        note: Note,
        timestamp: f64,
    },
}

impl NoteEvent {
    pub fn from_transition(transition: KeyTransition, timestamp: f64) -> Self {
        if transition.pressed {
            NoteEvent::On {
                note: transition.note,
                velocity: transition.velocity,
                timestamp,
            }
        } else {
            NoteEvent::Off {
                note: transition.note,
                timestamp,
            }
        }
    }

    #[inline]
    pub fn note(&self) -> Note {
        match *self {
            NoteEvent::On { note, .. } | NoteEvent::Off { note, .. } => note,
        }
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        match *self {
            NoteEvent::On { timestamp, .. } | NoteEvent::Off { timestamp, .. } => timestamp,
        }
    }

    /// Note-off events carry velocity 0.
    #[inline]
    pub fn velocity(&self) -> f64 {
        match *self {
            NoteEvent::On { velocity, .. } => velocity,
            NoteEvent::Off { .. } => 0.0,
        }
    }
}

/// One entry of a recording.
///
/// Loaded documents are only checked structurally, so an entry may be
/// `Malformed`; it keeps its raw JSON and fails when it is replayed.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    Note(NoteEvent),

    Malformed {
        raw: serde_json::Value,
        reason: String,
    },
}

impl RecordedEvent {
    /// Timestamp of the entry, when it has a usable one.
    pub fn timestamp(&self) -> Option<f64> {
        match self {
            RecordedEvent::Note(event) => Some(event.timestamp()),
            RecordedEvent::Malformed { raw, .. } => raw
                .get("timestamp")
                .and_then(serde_json::Value::as_f64)
                .filter(|t| t.is_finite()),
        }
    }

    /// The replayable event, or the reason this entry cannot be replayed.
    pub fn to_note_event(&self, index: usize) -> Result<NoteEvent, PlaybackEventError> {
        match self {
            RecordedEvent::Note(event) => Ok(*event),
            RecordedEvent::Malformed { reason, .. } => Err(PlaybackEventError {
                index,
                reason: reason.clone(),
            }),
        }
    }
}

impl From<NoteEvent> for RecordedEvent {
    fn from(event: NoteEvent) -> Self {
        RecordedEvent::Note(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transitions_map_to_tagged_events() {
        let note = Note::new(60).unwrap();

        let on = NoteEvent::from_transition(KeyTransition::press(note, 0.8), 12.0);
        assert_eq!(
            on,
            NoteEvent::On {
                note,
                velocity: 0.8,
                timestamp: 12.0
            }
        );

        let off = NoteEvent::from_transition(KeyTransition::release(note), 40.0);
        assert_eq!(off, NoteEvent::Off { note, timestamp: 40.0 });
        assert_eq!(off.velocity(), 0.0);
    }

    #[test]
    fn malformed_entries_fail_on_replay() {
        let entry = RecordedEvent::Malformed {
            raw: json!({"type": "noteOn", "timestamp": 250}),
            reason: "missing field `note`".into(),
        };
        assert_eq!(entry.timestamp(), Some(250.0));

        let err = entry.to_note_event(3).unwrap_err();
        assert_eq!(err.index, 3);
        assert!(err.reason.contains("note"));
    }

    #[test]
    fn malformed_entry_without_timestamp() {
        let entry = RecordedEvent::Malformed {
            raw: json!("garbage"),
            reason: "not an object".into(),
        };
        assert_eq!(entry.timestamp(), None);
    }
}
