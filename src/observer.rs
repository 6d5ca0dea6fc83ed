// src/observer.rs
//
// Notifications from the core to the visual rendering layer.
//
// The core never touches rendering directly; it only calls these hooks.

use std::cell::RefCell;

use serde::Serialize;

use crate::clock::Clock;
use crate::note::Note;

/// Receives activate/deactivate/voice-count notifications.
///
/// Methods take `&self`: the core is single-threaded and observers that keep
/// state use interior mutability.
pub trait VoiceObserver {
    fn voice_activated(&self, _note: Note) {}

    fn voice_deactivated(&self, _note: Note) {}

    fn active_voice_count_changed(&self, _count: usize) {}
}

/// Observer that ignores everything.
impl VoiceObserver for () {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    VoiceActivated { note: Note },
    VoiceDeactivated { note: Note },
    ActiveVoiceCountChanged { count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedNotification {
    /// Clock time (ms) when the notification was emitted.
    pub at: f64,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Buffers notifications for hosts that poll instead of receiving callbacks.
pub struct NotificationLog {
    clock: Clock,
    entries: RefCell<Vec<TimedNotification>>,
}

impl NotificationLog {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Take everything buffered so far.
    pub fn drain(&self) -> Vec<TimedNotification> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    /// Copy of everything buffered so far.
    pub fn snapshot(&self) -> Vec<TimedNotification> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn push(&self, notification: Notification) {
        self.entries.borrow_mut().push(TimedNotification {
            at: self.clock.now(),
            notification,
        });
    }
}

impl VoiceObserver for NotificationLog {
    fn voice_activated(&self, note: Note) {
        self.push(Notification::VoiceActivated { note });
    }

    fn voice_deactivated(&self, note: Note) {
        self.push(Notification::VoiceDeactivated { note });
    }

    fn active_voice_count_changed(&self, count: usize) {
        self.push(Notification::ActiveVoiceCountChanged { count });
    }
}
