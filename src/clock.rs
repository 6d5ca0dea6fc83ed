// src/clock.rs
//
// Shared virtual timeline.

use std::cell::Cell;
use std::rc::Rc;

/// Monotonic millisecond clock shared by every component of one keyboard.
///
/// The host moves it forward (from `performance.now()`, an audio callback,
/// or an offline render loop); nothing in the core reads wall-clock time
/// for scheduling.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    now: Rc<Cell<f64>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(ms)),
        }
    }

    /// Current position in milliseconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.now.get()
    }

    /// Move the clock forward. Attempts to move it backwards are ignored.
    pub fn advance_to(&self, ms: f64) {
        if ms.is_finite() && ms > self.now.get() {
            self.now.set(ms);
        } else if ms < self.now.get() {
            log::debug!("ignoring clock rewind from {} to {}", self.now.get(), ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_timeline() {
        let clock = Clock::new();
        let view = clock.clone();
        clock.advance_to(250.0);
        assert_eq!(view.now(), 250.0);
    }

    #[test]
    fn never_moves_backwards() {
        let clock = Clock::starting_at(100.0);
        clock.advance_to(40.0);
        clock.advance_to(f64::NAN);
        assert_eq!(clock.now(), 100.0);
    }
}
