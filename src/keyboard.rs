// src/keyboard.rs
//
// Application context: owns the engine, the recorder, the player and the
// current take. Hosts talk to this type only.
//
// Time only moves when the host calls `tick`; every deferred callback in the
// engine and the player fires from there, in due-time order.

use std::rc::Rc;

use log::{debug, info};

use crate::clock::Clock;
use crate::config::KeyboardConfig;
use crate::document::{self, RecordingDocument};
use crate::engine::SynthEngine;
use crate::error::{FormatError, InitializationError, KeyboardError};
use crate::event::KeyTransition;
use crate::host::AudioHost;
use crate::note::Note;
use crate::observer::VoiceObserver;
use crate::playback::PlaybackScheduler;
use crate::recorder::EventRecorder;
use crate::state::{EngineReadback, RecordingSession};

/// Host visibility changes that must silence the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    Hidden,
    Unloading,
}

pub struct Keyboard {
    clock: Clock,
    engine: SynthEngine,
    recorder: EventRecorder,
    player: PlaybackScheduler,

    /// Last finished or loaded recording.
    take: Option<Rc<RecordingSession>>,
}

impl Keyboard {
    pub fn new(config: KeyboardConfig, observer: Rc<dyn VoiceObserver>) -> Self {
        Self::with_clock(config, Clock::new(), observer)
    }

    pub fn with_clock(
        config: KeyboardConfig,
        clock: Clock,
        observer: Rc<dyn VoiceObserver>,
    ) -> Self {
        let engine = SynthEngine::new(config.engine, clock.clone(), Rc::clone(&observer));
        let player = PlaybackScheduler::new(config.playback, observer);

        Self {
            clock,
            engine,
            recorder: EventRecorder::new(),
            player,
            take: None,
        }
    }

    /// Open audio output. Call from a user gesture; safe to call again.
    pub fn initialize(&mut self, host: &mut dyn AudioHost) -> Result<(), InitializationError> {
        self.engine.initialize(host)
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    pub fn state(&self) -> EngineReadback {
        self.engine.state()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn engine(&self) -> &SynthEngine {
        &self.engine
    }

    pub fn player(&self) -> &PlaybackScheduler {
        &self.player
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    /* ---------- live input ---------- */

    /// Route one transition from input capture to the recorder and the engine.
    pub fn handle_key(&mut self, transition: KeyTransition) -> bool {
        self.recorder.record(transition, self.clock.now());

        if transition.pressed {
            self.engine.note_on(transition.note, transition.velocity)
        } else {
            self.engine.note_off(transition.note)
        }
    }

    pub fn press(&mut self, note: Note, velocity: f64) -> bool {
        self.handle_key(KeyTransition::press(note, velocity))
    }

    pub fn release(&mut self, note: Note) -> bool {
        self.handle_key(KeyTransition::release(note))
    }

    /// Route a transition that happened at host time `at`.
    ///
    /// Callbacks due by `at` fire first, so the transition is recorded and
    /// played at its own instant rather than at the last tick.
    pub fn handle_key_at(&mut self, transition: KeyTransition, at: f64) -> bool {
        self.tick(at);
        self.handle_key(transition)
    }

    pub fn press_at(&mut self, note: Note, velocity: f64, at: f64) -> bool {
        self.handle_key_at(KeyTransition::press(note, velocity), at)
    }

    pub fn release_at(&mut self, note: Note, at: f64) -> bool {
        self.handle_key_at(KeyTransition::release(note), at)
    }

    /// Emergency stop: cancels playback and silences every voice.
    pub fn panic(&mut self) {
        if !self.player.stop(&mut self.engine) {
            self.engine.stop_all_notes();
        }
    }

    /* ---------- recording ---------- */

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn start_recording(&mut self) -> bool {
        if !self.recorder.is_recording() {
            self.stop_playback();
        }
        self.recorder.start(self.clock.now())
    }

    /// Finish the take; it becomes the current take even if empty.
    pub fn stop_recording(&mut self) -> Option<Rc<RecordingSession>> {
        let session = Rc::new(self.recorder.stop()?);
        self.take = Some(Rc::clone(&session));
        Some(session)
    }

    pub fn take(&self) -> Option<&Rc<RecordingSession>> {
        self.take.as_ref()
    }

    /* ---------- playback ---------- */

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    /// Play the current take.
    pub fn play(&mut self) -> bool {
        match self.take.clone() {
            Some(session) => self.play_session(session),
            None => {
                debug!("no take to play");
                false
            }
        }
    }

    pub fn play_session(&mut self, session: Rc<RecordingSession>) -> bool {
        self.player.play(session, self.clock.now())
    }

    pub fn stop_playback(&mut self) -> bool {
        self.player.stop(&mut self.engine)
    }

    /* ---------- save / load ---------- */

    /// The current take as a document.
    pub fn save_document(&self) -> Result<RecordingDocument, KeyboardError> {
        match &self.take {
            Some(take) if !take.is_empty() => Ok(document::serialize(take)),
            _ => Err(KeyboardError::NothingToSave),
        }
    }

    pub fn save(&self) -> Result<String, KeyboardError> {
        let document = self.save_document()?;
        let text = serde_json::to_string_pretty(&document).map_err(FormatError::from)?;
        Ok(text)
    }

    /// Replace the current take with `text`. On error the take is untouched.
    pub fn load(&mut self, text: &str) -> Result<Rc<RecordingSession>, KeyboardError> {
        let session = Rc::new(document::from_json(text)?);
        info!("loaded recording with {} event(s)", session.event_count());
        self.take = Some(Rc::clone(&session));
        Ok(session)
    }

    /* ---------- time ---------- */

    /// Advance the clock to `now`, firing every deferred callback due by then.
    ///
    /// Returns the number of callbacks fired. At equal due times engine
    /// cleanups run before playback events.
    pub fn tick(&mut self, now: f64) -> usize {
        let mut fired = 0;

        loop {
            let cleanup = self.engine.next_due().filter(|due| *due <= now);
            let replay = self.player.next_due().filter(|due| *due <= now);

            let (due, is_cleanup) = match (cleanup, replay) {
                (None, None) => break,
                (Some(c), Some(r)) if c <= r => (c, true),
                (Some(c), None) => (c, true),
                (_, Some(r)) => (r, false),
            };

            self.clock.advance_to(due);
            if is_cleanup {
                self.engine.run_next_due(due);
            } else {
                self.player.run_next_due(due, &mut self.engine);
            }
            fired += 1;
        }

        self.clock.advance_to(now);
        self.engine.prune_finished();
        fired
    }

    /// Render audio at the current clock position.
    pub fn render(&mut self, output: &mut [f32]) {
        self.engine.render(output);
    }

    /* ---------- lifecycle ---------- */

    pub fn handle_lifecycle(&mut self, signal: LifecycleSignal) {
        info!("host lifecycle: {signal:?}, silencing");
        self.panic();
    }

    pub fn host_became_hidden(&mut self) {
        self.handle_lifecycle(LifecycleSignal::Hidden);
    }

    pub fn host_unloading(&mut self) {
        self.handle_lifecycle(LifecycleSignal::Unloading);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{OfflineHost, UnavailableHost};

    fn note(id: i64) -> Note {
        Note::new(id).unwrap()
    }

    fn keyboard() -> Keyboard {
        let mut keyboard = Keyboard::new(KeyboardConfig::default(), Rc::new(()));
        keyboard.initialize(&mut OfflineHost::default()).unwrap();
        keyboard
    }

    #[test]
    fn recording_captures_live_input() {
        let mut kb = keyboard();
        kb.tick(1_000.0);
        assert!(kb.start_recording());
        kb.press(note(60), 0.6);
        kb.tick(1_300.0);
        kb.release(note(60));

        let take = kb.stop_recording().unwrap();
        assert_eq!(take.event_count(), 2);
        assert_eq!(take.duration(), 300.0);
        assert!(Rc::ptr_eq(kb.take().unwrap(), &take));
    }

    #[test]
    fn timestamped_input_is_recorded_at_its_own_time() {
        let mut kb = keyboard();
        kb.tick(0.0);
        assert!(kb.start_recording());
        assert!(kb.press_at(note(60), 0.6, 300.0));
        assert!(kb.release_at(note(60), 600.0));

        let take = kb.stop_recording().unwrap();
        let stamps: Vec<f64> = take.events().iter().filter_map(|e| e.timestamp()).collect();
        assert_eq!(stamps, vec![300.0, 600.0]);
        assert_eq!(kb.clock().now(), 600.0);
    }

    #[test]
    fn input_still_sounds_without_recording() {
        let mut kb = keyboard();
        assert!(kb.press(note(64), 0.5));
        assert_eq!(kb.state().active_voices, 1);
        assert!(kb.stop_recording().is_none());
    }

    #[test]
    fn failed_initialize_can_be_retried() {
        let mut kb = Keyboard::new(KeyboardConfig::default(), Rc::new(()));
        assert!(kb.initialize(&mut UnavailableHost::new("blocked")).is_err());
        assert!(!kb.press(note(60), 0.5));
        assert!(kb.initialize(&mut OfflineHost::default()).is_ok());
        assert!(kb.press(note(60), 0.5));
    }

    #[test]
    fn save_requires_a_non_empty_take() {
        let mut kb = keyboard();
        assert!(matches!(kb.save(), Err(KeyboardError::NothingToSave)));

        kb.start_recording();
        kb.stop_recording();
        assert!(matches!(kb.save(), Err(KeyboardError::NothingToSave)));
    }

    #[test]
    fn failed_load_keeps_current_take() {
        let mut kb = keyboard();
        kb.start_recording();
        kb.press(note(60), 0.5);
        kb.stop_recording();
        let before = Rc::clone(kb.take().unwrap());

        assert!(kb.load(r#"{"version": "1.0"}"#).is_err());
        assert!(Rc::ptr_eq(kb.take().unwrap(), &before));

        let saved = kb.save().unwrap();
        let loaded = kb.load(&saved).unwrap();
        assert_eq!(loaded.events(), before.events());
    }

    #[test]
    fn recording_stops_running_playback() {
        let mut kb = keyboard();
        kb.load(
            r#"{"events": [
                {"type": "noteOn", "note": 60, "velocity": 0.5, "timestamp": 0},
                {"type": "noteOff", "note": 60, "velocity": 0, "timestamp": 400}
            ]}"#,
        )
        .unwrap();
        assert!(kb.play());
        kb.tick(100.0);
        assert_eq!(kb.state().active_voices, 1);

        assert!(kb.start_recording());
        assert!(!kb.is_playing());
        assert_eq!(kb.state().active_voices, 0);
        assert_eq!(kb.player().pending_callbacks(), 0);
    }

    #[test]
    fn tick_fires_cleanups_and_replay_in_time_order() {
        let mut kb = keyboard();
        kb.press(note(60), 0.5);
        kb.release(note(60));
        kb.load(
            r#"{"events": [{"type": "noteOn", "note": 60, "velocity": 0.5, "timestamp": 200}]}"#,
        )
        .unwrap();
        kb.play();

        // Cleanup of the live voice and the replayed note-on share t = 200.
        assert_eq!(kb.tick(200.0), 2);
        assert_eq!(kb.state().active_voices, 1);
        assert_eq!(kb.clock().now(), 200.0);
    }

    #[test]
    fn lifecycle_signals_silence_everything() {
        let mut kb = keyboard();
        kb.press(note(60), 0.5);
        kb.press(note(67), 0.5);
        kb.host_became_hidden();
        assert_eq!(kb.state().active_voices, 0);

        kb.load(r#"{"events": [{"type": "noteOn", "note": 62, "velocity": 0.5, "timestamp": 50}]}"#)
            .unwrap();
        kb.play();
        kb.host_unloading();
        assert!(!kb.is_playing());
        kb.tick(1_000.0);
        assert_eq!(kb.state().active_voices, 0);
    }
}
