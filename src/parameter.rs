// src/parameter.rs
//
// Gain automation timeline.
//
// A GainParam holds a sorted list of automation events and evaluates them
// at arbitrary instants, the way a browser AudioParam does:
// - a set-value event holds its value until the next event
// - a ramp event interpolates from the previous event to its own end time
// - cancelling drops every event at or after the cancel time
//
// Times are milliseconds on the shared clock.

use crate::error::ParamError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
}

impl Automation {
    #[inline]
    fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. }
            | Automation::LinearRamp { time, .. }
            | Automation::ExponentialRamp { time, .. } => time,
        }
    }

    #[inline]
    fn value(&self) -> f32 {
        match *self {
            Automation::SetValue { value, .. }
            | Automation::LinearRamp { value, .. }
            | Automation::ExponentialRamp { value, .. } => value,
        }
    }
}

/// A scheduled gain value.
#[derive(Debug, Clone)]
pub struct GainParam {
    default_value: f32,
    events: Vec<Automation>,
}

impl GainParam {
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::with_capacity(4),
        }
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at_time(&mut self, value: f32, time: f64) -> Result<(), ParamError> {
        check_value(value)?;
        check_time(time)?;
        self.insert(Automation::SetValue { time, value });
        Ok(())
    }

    /// Ramp linearly from the previous event to `value`, arriving at `end_time`.
    pub fn linear_ramp_to_value_at_time(
        &mut self,
        value: f32,
        end_time: f64,
    ) -> Result<(), ParamError> {
        check_value(value)?;
        check_time(end_time)?;
        self.insert(Automation::LinearRamp {
            time: end_time,
            value,
        });
        Ok(())
    }

    /// Ramp exponentially from the previous event to `value`, arriving at
    /// `end_time`. Exponential curves cannot reach zero, so `value` must be
    /// positive.
    pub fn exponential_ramp_to_value_at_time(
        &mut self,
        value: f32,
        end_time: f64,
    ) -> Result<(), ParamError> {
        check_value(value)?;
        check_time(end_time)?;
        if value <= 0.0 {
            return Err(ParamError::NonPositiveExponentialTarget(value));
        }
        self.insert(Automation::ExponentialRamp {
            time: end_time,
            value,
        });
        Ok(())
    }

    /// Drop every event scheduled at or after `cancel_time`.
    ///
    /// A ramp still in progress at `cancel_time` is dropped too; callers that
    /// want continuity capture `value_at(cancel_time)` first and set it back.
    pub fn cancel_scheduled_values(&mut self, cancel_time: f64) {
        self.events.retain(|e| e.time() < cancel_time);
    }

    /// Evaluate the automation at `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        let idx = self.events.partition_point(|e| e.time() <= time);

        let (start_time, start_value) = match idx {
            0 => (0.0, self.default_value),
            _ => {
                let prev = &self.events[idx - 1];
                (prev.time(), prev.value())
            }
        };

        match self.events.get(idx) {
            Some(&Automation::LinearRamp { time: end, value }) => {
                let progress = ((time - start_time) / (end - start_time)) as f32;
                start_value + (value - start_value) * progress
            }
            Some(&Automation::ExponentialRamp { time: end, value }) => {
                // Held when the curve would cross or start from zero.
                if start_value <= 0.0 || value <= 0.0 {
                    return start_value;
                }
                let progress = (time - start_time) / (end - start_time);
                start_value * ((value / start_value) as f64).powf(progress) as f32
            }
            _ => start_value,
        }
    }

    pub fn scheduled_len(&self) -> usize {
        self.events.len()
    }

    fn insert(&mut self, event: Automation) {
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }
}

#[inline]
fn check_value(value: f32) -> Result<(), ParamError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParamError::NonFiniteValue(value))
    }
}

#[inline]
fn check_time(time: f64) -> Result<(), ParamError> {
    if time.is_finite() && time >= 0.0 {
        Ok(())
    } else {
        Err(ParamError::InvalidTime(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn holds_default_without_events() {
        let gain = GainParam::new(1.0);
        assert_eq!(gain.value_at(0.0), 1.0);
        assert_eq!(gain.value_at(1_000.0), 1.0);
    }

    #[test]
    fn linear_ramp_interpolates() {
        let mut gain = GainParam::new(0.0);
        gain.set_value_at_time(0.0, 100.0).unwrap();
        gain.linear_ramp_to_value_at_time(0.8, 110.0).unwrap();

        assert!(approx(gain.value_at(100.0), 0.0));
        assert!(approx(gain.value_at(105.0), 0.4));
        assert!(approx(gain.value_at(110.0), 0.8));
        assert!(approx(gain.value_at(500.0), 0.8));
    }

    #[test]
    fn exponential_ramp_interpolates_geometrically() {
        let mut gain = GainParam::new(0.0);
        gain.set_value_at_time(1.0, 0.0).unwrap();
        gain.exponential_ramp_to_value_at_time(0.25, 100.0).unwrap();

        assert!(approx(gain.value_at(50.0), 0.5));
        assert!(approx(gain.value_at(100.0), 0.25));
    }

    #[test]
    fn exponential_ramp_from_zero_holds() {
        let mut gain = GainParam::new(0.0);
        gain.set_value_at_time(0.0, 0.0).unwrap();
        gain.exponential_ramp_to_value_at_time(0.5, 100.0).unwrap();
        assert_eq!(gain.value_at(50.0), 0.0);
    }

    #[test]
    fn rejects_exponential_target_of_zero() {
        let mut gain = GainParam::new(0.0);
        assert_eq!(
            gain.exponential_ramp_to_value_at_time(0.0, 10.0),
            Err(ParamError::NonPositiveExponentialTarget(0.0))
        );
        assert_eq!(gain.scheduled_len(), 0);
    }

    #[test]
    fn rejects_bad_times_and_values() {
        let mut gain = GainParam::new(0.0);
        assert!(gain.set_value_at_time(f32::NAN, 0.0).is_err());
        assert!(gain.set_value_at_time(0.5, -1.0).is_err());
        assert!(gain.linear_ramp_to_value_at_time(0.5, f64::INFINITY).is_err());
    }

    #[test]
    fn cancel_drops_future_events_including_running_ramp() {
        let mut gain = GainParam::new(0.0);
        gain.set_value_at_time(0.0, 0.0).unwrap();
        gain.linear_ramp_to_value_at_time(1.0, 10.0).unwrap();
        gain.exponential_ramp_to_value_at_time(0.7, 300.0).unwrap();

        let captured = gain.value_at(150.0);
        gain.cancel_scheduled_values(150.0);
        assert_eq!(gain.scheduled_len(), 2);

        // Without re-anchoring the curve snaps back to the last kept event.
        assert!(approx(gain.value_at(150.0), 1.0));

        gain.set_value_at_time(captured, 150.0).unwrap();
        assert!(approx(gain.value_at(150.0), captured));
    }
}
