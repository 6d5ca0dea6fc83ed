// src/playback.rs
//
// Replays a recording against the engine on the virtual timeline.
//
// A run schedules one timer per recorded event up front. The run owns its
// timer queue, so stopping is a single `cancel_all` plus a panic on the
// engine; nothing scheduled by a dead run can fire afterwards.

use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::engine::SynthEngine;
use crate::event::NoteEvent;
use crate::observer::VoiceObserver;
use crate::state::RecordingSession;
use crate::timer::TimerQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackTask {
    /// Replay the event at this index of the session.
    Event(usize),
    /// Grace delay after the last event has elapsed.
    Finish,
}

struct PlaybackRun {
    session: Rc<RecordingSession>,
    timers: TimerQueue<PlaybackTask>,
    started_at: f64,
    /// Index of the event whose callback fires last.
    last_index: usize,
}

pub struct PlaybackScheduler {
    config: PlaybackConfig,
    observer: Rc<dyn VoiceObserver>,
    run: Option<PlaybackRun>,
}

impl PlaybackScheduler {
    pub fn new(config: PlaybackConfig, observer: Rc<dyn VoiceObserver>) -> Self {
        Self {
            config,
            observer,
            run: None,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.run.is_some()
    }

    /// Session of the running playback, if any.
    pub fn session(&self) -> Option<&Rc<RecordingSession>> {
        self.run.as_ref().map(|run| &run.session)
    }

    /// Milliseconds since the running playback started.
    pub fn elapsed(&self, now: f64) -> Option<f64> {
        self.run.as_ref().map(|run| now - run.started_at)
    }

    /// Schedule every event of `session` relative to `now`.
    ///
    /// No-op when already playing or when the session has no events.
    pub fn play(&mut self, session: Rc<RecordingSession>, now: f64) -> bool {
        if self.is_playing() {
            debug!("playback already running");
            return false;
        }
        if session.is_empty() {
            debug!("nothing to play");
            return false;
        }

        let mut timers = TimerQueue::new();
        let mut due = now;
        let mut last_due = f64::NEG_INFINITY;
        let mut last_index = 0;

        for (index, entry) in session.events().iter().enumerate() {
            // Entries without a usable timestamp replay right after their
            // predecessor.
            if let Some(timestamp) = entry.timestamp() {
                due = now + timestamp.max(0.0);
            }
            timers.schedule(due, PlaybackTask::Event(index));

            // Equal due times fire in recorded order, so the later index wins.
            if due >= last_due {
                last_due = due;
                last_index = index;
            }
        }

        info!(
            "playback of {} event(s) started at {now:.1} ms",
            session.event_count()
        );
        self.run = Some(PlaybackRun {
            session,
            timers,
            started_at: now,
            last_index,
        });
        true
    }

    /// Cancel the running playback and silence the engine.
    pub fn stop(&mut self, engine: &mut SynthEngine) -> bool {
        let Some(mut run) = self.run.take() else {
            return false;
        };

        let cancelled = run.timers.cancel_all();
        engine.stop_all_notes();
        info!("playback stopped, {cancelled} pending callback(s) cancelled");
        true
    }

    pub fn next_due(&self) -> Option<f64> {
        self.run.as_ref().and_then(|run| run.timers.next_due())
    }

    pub fn pending_callbacks(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.timers.len())
    }

    /// Fire the earliest callback due at `now`. Returns `false` if none was due.
    pub fn run_next_due(&mut self, now: f64, engine: &mut SynthEngine) -> bool {
        let Some(run) = self.run.as_mut() else {
            return false;
        };
        let Some((due, _, task)) = run.timers.pop_due(now) else {
            return false;
        };

        match task {
            PlaybackTask::Event(index) => {
                let replayed = run
                    .session
                    .events()
                    .get(index)
                    .map(|entry| entry.to_note_event(index));

                match replayed {
                    Some(Ok(NoteEvent::On { note, velocity, .. })) => {
                        engine.note_on(note, velocity);
                        self.observer.voice_activated(note);
                    }
                    Some(Ok(NoteEvent::Off { note, .. })) => {
                        engine.note_off(note);
                        self.observer.voice_deactivated(note);
                    }
                    Some(Err(err)) => warn!("skipping: {err}"),
                    None => warn!("recorded event #{index} vanished"),
                }

                if index == run.last_index {
                    run.timers
                        .schedule(due + self.config.grace_ms, PlaybackTask::Finish);
                }
            }
            PlaybackTask::Finish => {
                info!("playback finished");
                self.run = None;
            }
        }
        true
    }
}
