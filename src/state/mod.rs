// src/state/mod.rs
//
// Snapshot state shared between the core and its collaborators.
//
// Key principles:
// - Recording sessions are immutable once handed out
// - Readback is a plain copy; reading it never touches the engine

mod session;

pub use session::*;
