// src/engine.rs

use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{InitializationError, ScheduleError};
use crate::graph::{AudioGraph, Tone};
use crate::host::AudioHost;
use crate::note::Note;
use crate::observer::VoiceObserver;
use crate::state::{EngineReadback, EngineState};
use crate::timer::TimerQueue;
use crate::voice::{Voice, VoiceId, VoiceState};

/// Deferred removal of a released voice.
#[derive(Debug, Clone, Copy)]
struct Cleanup {
    note: Note,
    voice: VoiceId,
}

/// Polyphonic synthesis engine.
///
/// Owns the output graph, the voice map and the cleanup timers; nothing
/// else mutates them. Every envelope change first cancels whatever was
/// scheduled before it, so a stale ramp can never fire on a voice that has
/// moved on.
pub struct SynthEngine {
    config: EngineConfig,

    clock: Clock,

    /// Allocated on first successful `initialize`.
    graph: Option<AudioGraph>,

    /// At most one voice per note.
    voices: BTreeMap<Note, Voice>,

    cleanups: TimerQueue<Cleanup>,

    observer: Rc<dyn VoiceObserver>,

    next_voice_id: VoiceId,
}

impl SynthEngine {
    /// An invalid `config` is replaced by the defaults.
    pub fn new(config: EngineConfig, clock: Clock, observer: Rc<dyn VoiceObserver>) -> Self {
        let config = match config.validate() {
            Ok(()) => config.clamped(),
            Err(err) => {
                warn!("unusable engine config ({err}), falling back to defaults");
                EngineConfig::default()
            }
        };

        Self {
            config,
            clock,
            graph: None,
            voices: BTreeMap::new(),
            cleanups: TimerQueue::new(),
            observer,
            next_voice_id: 0,
        }
    }

    /// Open the audio output and allocate the graph. Idempotent.
    pub fn initialize(&mut self, host: &mut dyn AudioHost) -> Result<(), InitializationError> {
        if self.graph.is_some() {
            debug!("engine already initialized");
            return Ok(());
        }

        let spec = host.open_output()?;
        if !spec.is_usable() {
            return Err(InitializationError::InvalidOutput {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
            });
        }

        info!(
            "audio output ready: {} Hz, {} channel(s)",
            spec.sample_rate, spec.channels
        );
        self.graph = Some(AudioGraph::new(spec));
        Ok(())
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.graph.is_some()
    }

    pub fn state(&self) -> EngineReadback {
        EngineReadback {
            state: if self.is_ready() {
                EngineState::Ready
            } else {
                EngineState::Uninitialized
            },
            active_voices: self.voices.len(),
            connected_tones: self.graph.as_ref().map_or(0, AudioGraph::tone_count),
            pending_cleanups: self.cleanups.len(),
            sample_rate: self.graph.as_ref().map(|g| g.spec().sample_rate),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a voice for `note`.
    ///
    /// Returns `false` without side effects when the engine is not
    /// initialized or `note` already has a voice (sounding or releasing).
    pub fn note_on(&mut self, note: Note, velocity: f64) -> bool {
        let Some(graph) = self.graph.as_mut() else {
            warn!("note_on({note}) before the engine was initialized");
            return false;
        };

        if self.voices.contains_key(&note) {
            debug!("{note} already has a voice, ignoring note-on");
            return false;
        }

        let velocity = if velocity.is_nan() {
            0.0
        } else {
            velocity.clamp(0.0, 1.0)
        };

        let now = self.clock.now();
        let tone = graph.add_tone(note.frequency(), now);
        let scheduled = graph
            .tone_mut(tone)
            .ok_or(ScheduleError::Disconnected(tone))
            .and_then(|t| schedule_attack(t, &self.config, velocity as f32, now));

        if let Err(err) = scheduled {
            warn!("could not start {note}: {err}");
            graph.disconnect(tone);
            return false;
        }

        let id = self.next_voice_id;
        self.next_voice_id += 1;
        self.voices
            .insert(note, Voice::new(id, note, velocity, tone, now));

        debug!("voice {id} on {note} (velocity {velocity:.2}) at {now:.1} ms");
        self.observer.active_voice_count_changed(self.voices.len());
        true
    }

    /// Release the voice for `note`.
    ///
    /// The release ramp starts from whatever gain the envelope has reached
    /// right now, not from the nominal sustain level.
    pub fn note_off(&mut self, note: Note) -> bool {
        let Some(graph) = self.graph.as_mut() else {
            return false;
        };

        let Some(voice) = self.voices.get_mut(&note) else {
            debug!("note_off({note}) without a voice");
            return false;
        };

        if voice.is_releasing() {
            debug!("{note} is already releasing");
            return false;
        }

        let now = self.clock.now();
        let end = now + self.config.release_ms;
        let scheduled = graph
            .tone_mut(voice.tone)
            .ok_or(ScheduleError::Disconnected(voice.tone))
            .and_then(|tone| schedule_release(tone, self.config.release_floor, now, end));

        match scheduled {
            Ok(()) => {
                let handle = self.cleanups.schedule(
                    end,
                    Cleanup {
                        note,
                        voice: voice.id,
                    },
                );
                voice.begin_release(handle);
                debug!("voice {} on {note} releasing until {end:.1} ms", voice.id);
                true
            }
            Err(err) => {
                warn!("release of {note} failed, dropping the voice: {err}");
                self.force_cleanup(note);
                true
            }
        }
    }

    /// Drop a voice whose release could not be scheduled.
    fn force_cleanup(&mut self, note: Note) {
        let Some(mut voice) = self.voices.remove(&note) else {
            return;
        };
        if let Some(handle) = voice.take_cleanup() {
            self.cleanups.cancel(handle);
        }
        if let Some(graph) = self.graph.as_mut() {
            graph.disconnect(voice.tone);
        }
        self.observer.active_voice_count_changed(self.voices.len());
    }

    /// Panic: silence everything.
    ///
    /// Each tone gets a short forced fade and is then disconnected by the
    /// graph; the voice map and every pending cleanup are cleared before
    /// this returns.
    pub fn stop_all_notes(&mut self) {
        let now = self.clock.now();
        let end = now + self.config.panic_fade_ms;
        let voices = std::mem::take(&mut self.voices);
        let silenced = voices.len();

        for (note, mut voice) in voices {
            if let Some(handle) = voice.take_cleanup() {
                self.cleanups.cancel(handle);
            }

            let Some(graph) = self.graph.as_mut() else {
                continue;
            };

            let faded = graph
                .tone_mut(voice.tone)
                .ok_or(ScheduleError::Disconnected(voice.tone))
                .and_then(|tone| schedule_fade_out(tone, now, end));

            if let Err(err) = faded {
                debug!("hard-stopping {note}: {err}");
                graph.disconnect(voice.tone);
            }
        }

        debug_assert!(self.cleanups.is_empty());

        if silenced > 0 {
            info!("stopped {silenced} voice(s)");
            self.observer.active_voice_count_changed(0);
        }
    }

    /// Due time of the next cleanup.
    pub fn next_due(&self) -> Option<f64> {
        self.cleanups.next_due()
    }

    /// Fire the earliest cleanup due at `now`. Returns `false` if none was due.
    pub fn run_next_due(&mut self, now: f64) -> bool {
        let Some((_, handle, task)) = self.cleanups.pop_due(now) else {
            return false;
        };

        // Only the voice this cleanup was scheduled for may be removed.
        let is_current = self
            .voices
            .get(&task.note)
            .is_some_and(|v| v.id == task.voice && v.cleanup() == Some(handle));

        if !is_current {
            debug!("stale cleanup for {} ignored", task.note);
            return true;
        }

        if let Some(voice) = self.voices.remove(&task.note) {
            if let Some(graph) = self.graph.as_mut() {
                graph.disconnect(voice.tone);
            }
            debug!("voice {} on {} released", voice.id, task.note);
            self.observer.active_voice_count_changed(self.voices.len());
        }
        true
    }

    /// Let the graph drop tones whose oscillators have stopped.
    pub fn prune_finished(&mut self) -> usize {
        let now = self.clock.now();
        self.graph.as_mut().map_or(0, |graph| graph.prune(now))
    }

    /// Render from the current clock position. Silence before initialization.
    pub fn render(&mut self, output: &mut [f32]) {
        match self.graph.as_mut() {
            Some(graph) => graph.render(self.clock.now(), output),
            None => output.fill(0.0),
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn has_voice(&self, note: Note) -> bool {
        self.voices.contains_key(&note)
    }

    pub fn voice_state(&self, note: Note) -> Option<VoiceState> {
        self.voices.get(&note).map(|v| v.state)
    }

    /// Envelope gain of the voice for `note` at the current clock time.
    pub fn voice_gain(&self, note: Note) -> Option<f32> {
        let voice = self.voices.get(&note)?;
        let tone = self.graph.as_ref()?.tone(voice.tone)?;
        Some(tone.gain().value_at(self.clock.now()))
    }

    /// Tones still connected to the output, including panic fades.
    pub fn connected_tones(&self) -> usize {
        self.graph.as_ref().map_or(0, AudioGraph::tone_count)
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }
}

/// Attack to `velocity` over the attack time, then decay towards the
/// sustain level, arriving at `decay_ms` after note-on.
fn schedule_attack(
    tone: &mut Tone,
    config: &EngineConfig,
    velocity: f32,
    now: f64,
) -> Result<(), ScheduleError> {
    let sustain = velocity * config.sustain_ratio as f32;
    let gain = tone.gain_mut();
    gain.cancel_scheduled_values(now);
    gain.set_value_at_time(0.0, now)?;
    gain.linear_ramp_to_value_at_time(velocity, now + config.attack_ms)?;
    gain.exponential_ramp_to_value_at_time(sustain, now + config.decay_ms)?;
    Ok(())
}

/// Anchor the current gain, ramp it down to `floor` and stop the oscillator.
fn schedule_release(tone: &mut Tone, floor: f32, now: f64, end: f64) -> Result<(), ScheduleError> {
    let gain = tone.gain_mut();
    let current = gain.value_at(now);
    gain.cancel_scheduled_values(now);
    gain.set_value_at_time(current, now)?;
    gain.exponential_ramp_to_value_at_time(floor, end)?;
    tone.stop_at(end)?;
    Ok(())
}

/// Forced linear fade to silence for the panic path.
fn schedule_fade_out(tone: &mut Tone, now: f64, end: f64) -> Result<(), ScheduleError> {
    let gain = tone.gain_mut();
    let current = gain.value_at(now);
    gain.cancel_scheduled_values(now);
    gain.set_value_at_time(current, now)?;
    gain.linear_ramp_to_value_at_time(0.0, end)?;
    tone.stop_at(end)?;
    Ok(())
}
