//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --no-default-features --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { keytone_init, KeytoneKeyboard } from './keytone.js';
//!
//! await init();
//! keytone_init();
//!
//! const keyboard = new KeytoneKeyboard();
//!
//! // Browsers only allow audio after a gesture.
//! button.onclick = () => {
//!     const ctx = new AudioContext();
//!     keyboard.initialize(ctx.sampleRate, 1);
//! };
//!
//! // Pass each event's own timestamp; due callbacks fire before it lands.
//! keyboard.press(60, 0.8, event.timeStamp);
//! keyboard.release(60, performance.now());
//! const events = JSON.parse(keyboard.drain_notifications());
//! ```

use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::clock::Clock;
use crate::config::KeyboardConfig;
use crate::error::InitializationError;
use crate::host::{AudioHost, OutputSpec};
use crate::keyboard::Keyboard;
use crate::note::Note;
use crate::observer::NotificationLog;
use crate::state::EngineState;

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn keytone_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Audio output
// ═══════════════════════════════════════════════════════════════════════════

/// Output opened on the JavaScript side. A sample rate of 0 means the
/// AudioContext could not be created.
struct BrowserOutput {
    sample_rate: f64,
    channels: u16,
}

impl AudioHost for BrowserOutput {
    fn open_output(&mut self) -> Result<OutputSpec, InitializationError> {
        if self.sample_rate == 0.0 {
            return Err(InitializationError::Unavailable(
                "AudioContext could not be created".into(),
            ));
        }
        Ok(OutputSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Readback Data
// ═══════════════════════════════════════════════════════════════════════════

/// Readback data from the engine (for UI meters/displays).
#[wasm_bindgen]
#[derive(Clone, Copy, Default)]
pub struct KeytoneReadback {
    /// Whether the audio output has been opened.
    pub ready: bool,
    /// Voices in the voice map, sounding or releasing.
    pub active_voices: u32,
    /// Tones still connected to the output.
    pub connected_tones: u32,
    /// Whether a take is being recorded.
    pub recording: bool,
    /// Whether a take is being replayed.
    pub playing: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Keyboard
// ═══════════════════════════════════════════════════════════════════════════

/// The keyboard core for one page. Notifications are buffered and polled
/// with `drain_notifications`.
#[wasm_bindgen]
pub struct KeytoneKeyboard {
    inner: Keyboard,
    notifications: Rc<NotificationLog>,
}

#[wasm_bindgen]
impl KeytoneKeyboard {
    /// Create a keyboard with default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> KeytoneKeyboard {
        Self::build(KeyboardConfig::default())
    }

    /// Create a keyboard from a JSON configuration document.
    pub fn with_config(config_json: &str) -> Result<KeytoneKeyboard, JsValue> {
        let config = KeyboardConfig::from_json_str(config_json).map_err(to_js)?;
        Ok(Self::build(config))
    }

    /// Open the audio output with the AudioContext's format. Call from a
    /// user gesture; safe to call again after a failure.
    pub fn initialize(&mut self, sample_rate: f64, channels: u16) -> Result<(), JsValue> {
        let mut output = BrowserOutput {
            sample_rate,
            channels,
        };
        self.inner.initialize(&mut output).map_err(to_js)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state().state == EngineState::Ready
    }

    pub fn readback(&self) -> KeytoneReadback {
        let state = self.inner.state();
        KeytoneReadback {
            ready: state.state == EngineState::Ready,
            active_voices: state.active_voices as u32,
            connected_tones: state.connected_tones as u32,
            recording: self.inner.is_recording(),
            playing: self.inner.is_playing(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────────

    /// Key down at host time `now_ms`. Returns whether a new voice started.
    pub fn press(&mut self, note: i32, velocity: f64, now_ms: f64) -> Result<bool, JsValue> {
        let note = Note::new(note as i64).map_err(to_js)?;
        Ok(self.inner.press_at(note, velocity, now_ms))
    }

    /// Key up at host time `now_ms`. Returns whether a voice started releasing.
    pub fn release(&mut self, note: i32, now_ms: f64) -> Result<bool, JsValue> {
        let note = Note::new(note as i64).map_err(to_js)?;
        Ok(self.inner.release_at(note, now_ms))
    }

    /// Silence everything and cancel playback.
    pub fn panic(&mut self) {
        self.inner.panic();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Time and audio
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance to `now_ms`, firing due callbacks. Returns how many fired.
    pub fn tick(&mut self, now_ms: f64) -> u32 {
        self.inner.tick(now_ms) as u32
    }

    /// Render one block at the current time (AudioWorklet process()).
    pub fn render(&mut self, output: &mut [f32]) {
        self.inner.render(output);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recording / playback
    // ─────────────────────────────────────────────────────────────────────────

    pub fn start_recording(&mut self, now_ms: f64) -> bool {
        self.inner.tick(now_ms);
        self.inner.start_recording()
    }

    /// Returns the number of events in the finished take, or -1 if not recording.
    pub fn stop_recording(&mut self, now_ms: f64) -> i32 {
        self.inner.tick(now_ms);
        self.inner
            .stop_recording()
            .map_or(-1, |take| take.event_count() as i32)
    }

    pub fn is_recording(&self) -> bool {
        self.inner.is_recording()
    }

    pub fn play(&mut self, now_ms: f64) -> bool {
        self.inner.tick(now_ms);
        self.inner.play()
    }

    pub fn stop_playback(&mut self) -> bool {
        self.inner.stop_playback()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.is_playing()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Save / load
    // ─────────────────────────────────────────────────────────────────────────

    /// Current take as a JSON document.
    pub fn save(&self) -> Result<String, JsValue> {
        self.inner.save().map_err(to_js)
    }

    /// Replace the current take. Returns its event count.
    pub fn load(&mut self, document: &str) -> Result<u32, JsValue> {
        let take = self.inner.load(document).map_err(to_js)?;
        Ok(take.event_count() as u32)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle / notifications
    // ─────────────────────────────────────────────────────────────────────────

    /// Call on `visibilitychange` when the page becomes hidden.
    pub fn host_became_hidden(&mut self) {
        self.inner.host_became_hidden();
    }

    /// Call on `pagehide` / `beforeunload`.
    pub fn host_unloading(&mut self) {
        self.inner.host_unloading();
    }

    /// Notifications since the last call, as a JSON array.
    pub fn drain_notifications(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.notifications.drain()).map_err(to_js)
    }
}

impl KeytoneKeyboard {
    fn build(config: KeyboardConfig) -> KeytoneKeyboard {
        let clock = Clock::new();
        let notifications = Rc::new(NotificationLog::new(clock.clone()));
        let inner = Keyboard::with_clock(config, clock, notifications.clone());
        KeytoneKeyboard {
            inner,
            notifications,
        }
    }
}

impl Default for KeytoneKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}
