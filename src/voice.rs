use crate::graph::ToneId;
use crate::note::Note;
use crate::timer::TimerHandle;

pub type VoiceId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Attack, decay or sustain.
    Sounding,
    /// Release ramp scheduled; cleanup pending.
    Releasing,
}

/// A voice represents one sounding note.
///
/// Voices do NOT own audio nodes directly; the graph owns the tone and the
/// voice refers to it by id. A releasing voice owns the handle of its own
/// pending cleanup, so cancelling the voice cancels the cleanup with it.
#[derive(Debug)]
pub struct Voice {
    pub id: VoiceId,
    pub note: Note,
    pub velocity: f64,
    pub tone: ToneId,
    pub started_at: f64,
    pub state: VoiceState,
    cleanup: Option<TimerHandle>,
}

impl Voice {
    #[inline]
    pub fn new(id: VoiceId, note: Note, velocity: f64, tone: ToneId, started_at: f64) -> Self {
        Self {
            id,
            note,
            velocity,
            tone,
            started_at,
            state: VoiceState::Sounding,
            cleanup: None,
        }
    }

    #[inline]
    pub fn is_releasing(&self) -> bool {
        self.state == VoiceState::Releasing
    }

    /// Enter the release phase with its pending cleanup.
    pub fn begin_release(&mut self, cleanup: TimerHandle) {
        self.state = VoiceState::Releasing;
        self.cleanup = Some(cleanup);
    }

    #[inline]
    pub fn cleanup(&self) -> Option<TimerHandle> {
        self.cleanup
    }

    pub fn take_cleanup(&mut self) -> Option<TimerHandle> {
        self.cleanup.take()
    }
}
