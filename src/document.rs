// src/document.rs
//
// Recording session <-> JSON document.
//
// ```json
// {
//   "version": "1.0",
//   "date": "2026-10-18T09:30:00.000Z",
//   "duration": 500,
//   "eventCount": 2,
//   "events": [
//     {"type": "noteOn", "note": 60, "velocity": 0.5, "timestamp": 0},
//     {"type": "noteOff", "note": 60, "velocity": 0, "timestamp": 500}
//   ]
// }
// ```
//
// Loading only checks the document's structure. Events that do not decode
// are kept verbatim and fail when they are replayed.

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FormatError;
use crate::event::{NoteEvent, RecordedEvent};
use crate::note::Note;
use crate::state::{FORMAT_VERSION, RecordingSession};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingDocument {
    pub version: String,
    /// ISO-8601 instant the document was written.
    pub date: String,
    pub duration: f64,
    pub event_count: usize,
    pub events: Vec<Value>,
}

/// One event as it appears on disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WireEvent {
    NoteOn {
        note: i64,
        velocity: f64,
        timestamp: f64,
    },
    NoteOff {
        note: i64,
        #[serde(default)]
        velocity: f64,
        timestamp: f64,
    },
}

impl From<NoteEvent> for WireEvent {
    fn from(event: NoteEvent) -> Self {
        match event {
            NoteEvent::On {
                note,
                velocity,
                timestamp,
            } => WireEvent::NoteOn {
                note: note.id() as i64,
                velocity,
                timestamp,
            },
            NoteEvent::Off { note, timestamp } => WireEvent::NoteOff {
                note: note.id() as i64,
                velocity: 0.0,
                timestamp,
            },
        }
    }
}

impl TryFrom<WireEvent> for NoteEvent {
    type Error = String;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        match wire {
            WireEvent::NoteOn {
                note,
                velocity,
                timestamp,
            } => Ok(NoteEvent::On {
                note: Note::new(note).map_err(|e| e.to_string())?,
                velocity,
                timestamp,
            }),
            WireEvent::NoteOff {
                note, timestamp, ..
            } => Ok(NoteEvent::Off {
                note: Note::new(note).map_err(|e| e.to_string())?,
                timestamp,
            }),
        }
    }
}

/// Document for `session`, dated now.
pub fn serialize(session: &RecordingSession) -> RecordingDocument {
    serialize_at(session, Utc::now())
}

/// Document for `session` with an explicit date. Fully deterministic.
pub fn serialize_at(session: &RecordingSession, date: DateTime<Utc>) -> RecordingDocument {
    let events = session.events().iter().map(encode_event).collect();

    RecordingDocument {
        version: session.version().to_owned(),
        date: date.to_rfc3339_opts(SecondsFormat::Millis, true),
        duration: session.duration(),
        event_count: session.event_count(),
        events,
    }
}

pub fn to_json(session: &RecordingSession) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(&serialize(session))?)
}

/// Rebuild a session from a parsed document.
pub fn deserialize(document: &Value) -> Result<RecordingSession, FormatError> {
    let events = match document.get("events") {
        None | Some(Value::Null) => return Err(FormatError::MissingEvents),
        Some(Value::Array(events)) => events,
        Some(_) => return Err(FormatError::EventsNotASequence),
    };

    let version = match document.get("version") {
        Some(Value::String(version)) => version.clone(),
        None | Some(Value::Null) => FORMAT_VERSION.to_owned(),
        Some(other) => other.to_string(),
    };

    let created_at = document
        .get("date")
        .and_then(Value::as_str)
        .and_then(|date| DateTime::parse_from_rfc3339(date).ok())
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or_else(|| {
            debug!("recording has no usable date, stamping it now");
            Utc::now()
        });

    let events: Vec<RecordedEvent> = events.iter().map(decode_event).collect();
    let malformed = events
        .iter()
        .filter(|e| matches!(e, RecordedEvent::Malformed { .. }))
        .count();
    if malformed > 0 {
        debug!("loaded recording with {malformed} malformed event(s)");
    }

    Ok(RecordingSession::with_version(version, events, created_at))
}

pub fn from_json(text: &str) -> Result<RecordingSession, FormatError> {
    let document: Value = serde_json::from_str(text)?;
    deserialize(&document)
}

fn encode_event(entry: &RecordedEvent) -> Value {
    match entry {
        RecordedEvent::Note(event) => {
            serde_json::to_value(WireEvent::from(*event)).unwrap_or(Value::Null)
        }
        RecordedEvent::Malformed { raw, .. } => raw.clone(),
    }
}

fn decode_event(raw: &Value) -> RecordedEvent {
    let decoded = serde_json::from_value::<WireEvent>(raw.clone())
        .map_err(|e| e.to_string())
        .and_then(NoteEvent::try_from);

    match decoded {
        Ok(event) => RecordedEvent::Note(event),
        Err(reason) => RecordedEvent::Malformed {
            raw: raw.clone(),
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn note(id: i64) -> Note {
        Note::new(id).unwrap()
    }

    fn take() -> RecordingSession {
        RecordingSession::from_note_events(
            vec![
                NoteEvent::On {
                    note: note(60),
                    velocity: 0.5,
                    timestamp: 0.0,
                },
                NoteEvent::On {
                    note: note(64),
                    velocity: 0.8,
                    timestamp: 120.5,
                },
                NoteEvent::Off {
                    note: note(60),
                    timestamp: 500.0,
                },
            ],
            Utc::now(),
        )
    }

    #[test]
    fn document_layout() {
        let date = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        let document = serde_json::to_value(serialize_at(&take(), date)).unwrap();

        assert_eq!(document["version"], "1.0");
        assert_eq!(document["date"], "2026-10-18T09:30:00.000Z");
        assert_eq!(document["duration"], 500.0);
        assert_eq!(document["eventCount"], 3);
        assert_eq!(
            document["events"][2],
            json!({"type": "noteOff", "note": 60, "velocity": 0.0, "timestamp": 500.0})
        );
    }

    #[test]
    fn serialized_events_load_back() {
        let original = take();
        let text = to_json(&original).unwrap();
        let loaded = from_json(&text).unwrap();

        assert_eq!(loaded.events(), original.events());
        assert_eq!(loaded.version(), original.version());
    }

    #[test]
    fn serialize_is_deterministic_for_a_fixed_date() {
        let date = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let session = take();
        assert_eq!(serialize_at(&session, date), serialize_at(&session, date));
    }

    #[test]
    fn missing_or_invalid_events_are_format_errors() {
        assert!(matches!(
            deserialize(&json!({"version": "1.0"})),
            Err(FormatError::MissingEvents)
        ));
        assert!(matches!(
            deserialize(&json!({"events": {"0": {}}})),
            Err(FormatError::EventsNotASequence)
        ));
        assert!(matches!(deserialize(&json!([1, 2])), Err(FormatError::MissingEvents)));
        assert!(matches!(from_json("{"), Err(FormatError::Json(_))));
    }

    #[test]
    fn any_version_is_accepted() {
        let session = deserialize(&json!({"version": 7, "events": []})).unwrap();
        assert_eq!(session.version(), "7");

        let session = deserialize(&json!({"version": "0.9-beta", "events": []})).unwrap();
        assert_eq!(session.version(), "0.9-beta");
    }

    #[test]
    fn bad_events_are_kept_for_playback_to_reject() {
        let document = json!({
            "events": [
                {"type": "noteOn", "note": 60, "velocity": 0.5, "timestamp": 0},
                {"type": "noteOn", "note": 12, "velocity": 0.5, "timestamp": 10},
                {"type": "chord", "timestamp": 20},
                "noise"
            ]
        });
        let session = deserialize(&document).unwrap();
        assert_eq!(session.event_count(), 4);
        assert_eq!(session.note_events().count(), 1);
        assert_eq!(session.duration(), 20.0);

        // Unknown entries survive a save unchanged.
        let saved = serialize(&session);
        assert_eq!(saved.events[3], json!("noise"));
        assert_eq!(saved.events[2], json!({"type": "chord", "timestamp": 20}));
    }

    #[test]
    fn note_off_without_velocity_decodes() {
        let session =
            deserialize(&json!({"events": [{"type": "noteOff", "note": 72, "timestamp": 3}]}))
                .unwrap();
        assert_eq!(
            session.events(),
            &[RecordedEvent::Note(NoteEvent::Off {
                note: note(72),
                timestamp: 3.0
            })]
        );
    }
}
