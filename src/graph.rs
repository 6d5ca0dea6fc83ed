//! Audio output graph: per-voice tone chains feeding one master output.
//!
//! Each tone is an oscillator followed by its own gain stage. The master
//! output sums every connected tone at a fixed unity gain. A tone whose
//! oscillator has a scheduled stop time is dropped by the graph itself once
//! that time has passed, so a hard disconnect never depends on a callback.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use crate::error::ParamError;
use crate::host::OutputSpec;
use crate::parameter::GainParam;

/// Identifies one tone chain inside the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToneId(u32);

/// Sine oscillator with start/stop instants (milliseconds).
#[derive(Debug, Clone)]
pub struct Oscillator {
    frequency: f64,
    phase: f64,
    start: f64,
    stop: Option<f64>,
}

impl Oscillator {
    fn new(frequency: f64, start: f64) -> Self {
        Self {
            frequency,
            phase: 0.0,
            start,
            stop: None,
        }
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    #[inline]
    pub fn stop_time(&self) -> Option<f64> {
        self.stop
    }

    #[inline]
    fn is_running_at(&self, time: f64) -> bool {
        time >= self.start && self.stop.is_none_or(|stop| time < stop)
    }
}

/// Oscillator → gain chain for one voice.
#[derive(Debug, Clone)]
pub struct Tone {
    oscillator: Oscillator,
    gain: GainParam,
}

impl Tone {
    #[inline]
    pub fn oscillator(&self) -> &Oscillator {
        &self.oscillator
    }

    #[inline]
    pub fn gain(&self) -> &GainParam {
        &self.gain
    }

    #[inline]
    pub fn gain_mut(&mut self) -> &mut GainParam {
        &mut self.gain
    }

    /// Schedule the oscillator to stop at `time`. An earlier stop already
    /// scheduled wins.
    pub fn stop_at(&mut self, time: f64) -> Result<(), ParamError> {
        if !time.is_finite() || time < 0.0 {
            return Err(ParamError::InvalidTime(time));
        }
        self.oscillator.stop = Some(match self.oscillator.stop {
            Some(existing) => existing.min(time),
            None => time,
        });
        Ok(())
    }
}

pub struct AudioGraph {
    spec: OutputSpec,
    master_gain: f32,
    tones: BTreeMap<ToneId, Tone>,
    next_id: u32,
}

impl AudioGraph {
    pub fn new(spec: OutputSpec) -> Self {
        Self {
            spec,
            master_gain: 1.0,
            tones: BTreeMap::new(),
            next_id: 0,
        }
    }

    #[inline]
    pub fn spec(&self) -> OutputSpec {
        self.spec
    }

    #[inline]
    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Create a tone whose oscillator starts at `start` with a silent gain.
    pub fn add_tone(&mut self, frequency: f64, start: f64) -> ToneId {
        let id = ToneId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.tones.insert(
            id,
            Tone {
                oscillator: Oscillator::new(frequency, start),
                gain: GainParam::new(0.0),
            },
        );
        id
    }

    pub fn tone(&self, id: ToneId) -> Option<&Tone> {
        self.tones.get(&id)
    }

    pub fn tone_mut(&mut self, id: ToneId) -> Option<&mut Tone> {
        self.tones.get_mut(&id)
    }

    /// Disconnect and release a tone immediately.
    pub fn disconnect(&mut self, id: ToneId) -> bool {
        self.tones.remove(&id).is_some()
    }

    /// Drop every tone whose oscillator stop time is at or before `now`.
    pub fn prune(&mut self, now: f64) -> usize {
        let before = self.tones.len();
        self.tones
            .retain(|_, tone| tone.oscillator.stop.is_none_or(|stop| stop > now));
        before - self.tones.len()
    }

    pub fn tone_count(&self) -> usize {
        self.tones.len()
    }

    /// Render interleaved frames starting at `start` (milliseconds).
    ///
    /// Every channel carries the same mono mix. Trailing samples that do not
    /// form a whole frame are zeroed.
    pub fn render(&mut self, start: f64, output: &mut [f32]) {
        output.fill(0.0);

        let channels = self.spec.channels.max(1) as usize;
        let frames = output.len() / channels;
        let sample_rate = self.spec.sample_rate;
        let ms_per_frame = 1_000.0 / sample_rate;

        for tone in self.tones.values_mut() {
            let increment = tone.oscillator.frequency / sample_rate;

            for frame in 0..frames {
                let time = start + frame as f64 * ms_per_frame;
                if !tone.oscillator.is_running_at(time) {
                    continue;
                }

                let sample = (tone.oscillator.phase * TAU).sin() as f32 * tone.gain.value_at(time);
                tone.oscillator.phase = (tone.oscillator.phase + increment).fract();

                // Mono mix goes to the first channel, copied below.
                output[frame * channels] += sample;
            }
        }

        for frame in 0..frames {
            let base = frame * channels;
            let mixed = output[base] * self.master_gain;
            output[base..base + channels].fill(mixed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> AudioGraph {
        AudioGraph::new(OutputSpec {
            sample_rate: 48_000.0,
            channels: 1,
        })
    }

    #[test]
    fn silent_without_tones() {
        let mut graph = graph();
        assert_eq!(graph.master_gain(), 1.0);
        let mut out = vec![1.0; 64];
        graph.render(0.0, &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn renders_a_gained_sine() {
        let mut graph = graph();
        let id = graph.add_tone(440.0, 0.0);
        graph
            .tone_mut(id)
            .unwrap()
            .gain_mut()
            .set_value_at_time(0.5, 0.0)
            .unwrap();

        let mut out = vec![0.0; 480];
        graph.render(0.0, &mut out);

        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.45 && peak <= 0.5 + 1e-6, "peak {peak}");
    }

    #[test]
    fn stereo_output_duplicates_the_mix() {
        let mut graph = AudioGraph::new(OutputSpec {
            sample_rate: 48_000.0,
            channels: 2,
        });
        let id = graph.add_tone(220.0, 0.0);
        graph
            .tone_mut(id)
            .unwrap()
            .gain_mut()
            .set_value_at_time(1.0, 0.0)
            .unwrap();

        let mut out = vec![0.0; 64];
        graph.render(0.0, &mut out);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn stopped_tones_are_pruned() {
        let mut graph = graph();
        let stopping = graph.add_tone(440.0, 0.0);
        let holding = graph.add_tone(220.0, 0.0);
        graph.tone_mut(stopping).unwrap().stop_at(50.0).unwrap();

        assert_eq!(graph.prune(49.0), 0);
        assert_eq!(graph.prune(50.0), 1);
        assert!(graph.tone(stopping).is_none());
        assert!(graph.tone(holding).is_some());
    }

    #[test]
    fn earlier_stop_wins() {
        let mut graph = graph();
        let id = graph.add_tone(440.0, 0.0);
        let tone = graph.tone_mut(id).unwrap();
        tone.stop_at(100.0).unwrap();
        tone.stop_at(300.0).unwrap();
        assert_eq!(tone.oscillator().stop_time(), Some(100.0));
        assert!(tone.stop_at(f64::NAN).is_err());
    }

    #[test]
    fn oscillator_is_silent_before_start() {
        let mut graph = graph();
        let id = graph.add_tone(440.0, 10.0);
        graph
            .tone_mut(id)
            .unwrap()
            .gain_mut()
            .set_value_at_time(1.0, 0.0)
            .unwrap();

        // 5 ms at 48 kHz = 240 frames, all before the start time.
        let mut out = vec![0.0; 240];
        graph.render(0.0, &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }
}
