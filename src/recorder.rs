// src/recorder.rs

use chrono::Utc;
use log::{debug, info, warn};

use crate::event::{KeyTransition, NoteEvent};
use crate::state::RecordingSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
}

/// Captures key transitions relative to the instant recording started.
///
/// Events are appended in arrival order and never re-sorted; the recorder
/// trusts its caller's clock to be monotonic.
#[derive(Debug, Default)]
pub struct EventRecorder {
    state: RecorderState,
    started_at: f64,
    events: Vec<NoteEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> RecorderState {
        self.state
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Begin a new take at `now`. Returns `false` if a take is already running.
    pub fn start(&mut self, now: f64) -> bool {
        if self.is_recording() {
            warn!("recording already in progress");
            return false;
        }

        self.events.clear();
        self.started_at = now;
        self.state = RecorderState::Recording;
        info!("recording started at {now:.1} ms");
        true
    }

    /// Finish the take and hand out its immutable snapshot.
    pub fn stop(&mut self) -> Option<RecordingSession> {
        if !self.is_recording() {
            warn!("stop requested while not recording");
            return None;
        }

        self.state = RecorderState::Idle;
        let events = std::mem::take(&mut self.events);
        info!("recording stopped with {} event(s)", events.len());
        Some(RecordingSession::from_note_events(events, Utc::now()))
    }

    /// Append `transition` if recording. `raw_timestamp` is on the same clock
    /// that was passed to `start`.
    pub fn record(&mut self, transition: KeyTransition, raw_timestamp: f64) -> bool {
        if !self.is_recording() {
            return false;
        }

        let timestamp = raw_timestamp - self.started_at;
        let event = NoteEvent::from_transition(transition, timestamp);
        debug!("recorded {event:?}");
        self.events.push(event);
        true
    }

    /// Events captured so far in the running take.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;

    #[test]
    fn timestamps_are_relative_to_start() {
        let note = Note::new(60).unwrap();
        let mut recorder = EventRecorder::new();
        assert!(recorder.start(1_000.0));

        recorder.record(KeyTransition::press(note, 0.5), 1_000.0);
        recorder.record(KeyTransition::release(note), 1_250.0);

        let session = recorder.stop().unwrap();
        let stamps: Vec<f64> = session.note_events().map(NoteEvent::timestamp).collect();
        assert_eq!(stamps, vec![0.0, 250.0]);
        assert_eq!(session.duration(), 250.0);
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn ignores_input_while_idle() {
        let mut recorder = EventRecorder::new();
        let note = Note::new(62).unwrap();
        assert!(!recorder.record(KeyTransition::press(note, 1.0), 5.0));
        assert!(recorder.stop().is_none());
    }

    #[test]
    fn second_start_keeps_running_take() {
        let note = Note::new(64).unwrap();
        let mut recorder = EventRecorder::new();
        recorder.start(0.0);
        recorder.record(KeyTransition::press(note, 0.7), 10.0);

        assert!(!recorder.start(50.0));
        assert_eq!(recorder.event_count(), 1);

        recorder.record(KeyTransition::release(note), 60.0);
        let session = recorder.stop().unwrap();
        assert_eq!(session.duration(), 60.0);
    }

    #[test]
    fn new_take_starts_empty() {
        let note = Note::new(65).unwrap();
        let mut recorder = EventRecorder::new();
        recorder.start(0.0);
        recorder.record(KeyTransition::press(note, 0.7), 10.0);
        recorder.stop();

        recorder.start(500.0);
        assert_eq!(recorder.event_count(), 0);
        assert!(recorder.stop().unwrap().is_empty());
    }

    #[test]
    fn keeps_arrival_order() {
        let a = Note::new(60).unwrap();
        let b = Note::new(67).unwrap();
        let mut recorder = EventRecorder::new();
        recorder.start(0.0);
        recorder.record(KeyTransition::press(a, 0.5), 30.0);
        recorder.record(KeyTransition::press(b, 0.5), 30.0);
        recorder.record(KeyTransition::release(a), 40.0);

        let session = recorder.stop().unwrap();
        let notes: Vec<u8> = session.note_events().map(|e| e.note().id()).collect();
        assert_eq!(notes, vec![60, 67, 60]);
    }
}
