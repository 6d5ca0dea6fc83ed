// src/host.rs
//
// The seam to the platform audio subsystem.

use crate::error::InitializationError;

/// Format of the physical output the engine renders into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSpec {
    /// Sample rate in Hz (e.g., 44100.0, 48000.0).
    pub sample_rate: f64,
    /// Interleaved channel count.
    pub channels: u16,
}

impl OutputSpec {
    pub fn is_usable(&self) -> bool {
        self.sample_rate.is_finite() && self.sample_rate > 0.0 && self.channels > 0
    }
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            channels: 1,
        }
    }
}

/// Opens the audio output. Browsers only allow this after a user gesture,
/// so callers may see a failure and try again later.
pub trait AudioHost {
    fn open_output(&mut self) -> Result<OutputSpec, InitializationError>;
}

/// Always-available host for offline rendering and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineHost {
    spec: OutputSpec,
}

impl OfflineHost {
    pub fn new(spec: OutputSpec) -> Self {
        Self { spec }
    }
}

impl AudioHost for OfflineHost {
    fn open_output(&mut self) -> Result<OutputSpec, InitializationError> {
        Ok(self.spec)
    }
}

/// Host whose audio subsystem cannot be created.
#[derive(Debug, Clone)]
pub struct UnavailableHost {
    reason: String,
}

impl UnavailableHost {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl AudioHost for UnavailableHost {
    fn open_output(&mut self) -> Result<OutputSpec, InitializationError> {
        Err(InitializationError::Unavailable(self.reason.clone()))
    }
}
