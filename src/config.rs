// src/config.rs
//
// Tunables for the engine and the playback scheduler.
//
// All fields have defaults, so a config document only needs the values it
// overrides:
//
// ```json
// { "engine": { "releaseMs": 250 }, "playback": { "graceMs": 400 } }
// ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_ATTACK_MS: f64 = 10.0;
/// Decay target, measured from note-on.
pub const DEFAULT_DECAY_MS: f64 = 300.0;
pub const DEFAULT_SUSTAIN_RATIO: f64 = 0.7;
pub const DEFAULT_RELEASE_MS: f64 = 200.0;
pub const MIN_RELEASE_MS: f64 = 100.0;
pub const MAX_RELEASE_MS: f64 = 300.0;
pub const DEFAULT_PANIC_FADE_MS: f64 = 50.0;
pub const MAX_PANIC_FADE_MS: f64 = 100.0;
/// Exponential ramps cannot reach zero; release ends here.
pub const DEFAULT_RELEASE_FLOOR: f32 = 0.0001;
pub const DEFAULT_GRACE_MS: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub attack_ms: f64,
    pub decay_ms: f64,
    pub sustain_ratio: f64,
    pub release_ms: f64,
    pub panic_fade_ms: f64,
    pub release_floor: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attack_ms: DEFAULT_ATTACK_MS,
            decay_ms: DEFAULT_DECAY_MS,
            sustain_ratio: DEFAULT_SUSTAIN_RATIO,
            release_ms: DEFAULT_RELEASE_MS,
            panic_fade_ms: DEFAULT_PANIC_FADE_MS,
            release_floor: DEFAULT_RELEASE_FLOOR,
        }
    }
}

impl EngineConfig {
    pub fn with_release_ms(mut self, release_ms: f64) -> Self {
        self.release_ms = release_ms;
        self.clamped()
    }

    /// Reject values that cannot describe an envelope.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("attackMs", self.attack_ms)?;
        positive("decayMs", self.decay_ms)?;
        positive("releaseMs", self.release_ms)?;
        positive("panicFadeMs", self.panic_fade_ms)?;
        positive("releaseFloor", self.release_floor as f64)?;

        if self.decay_ms <= self.attack_ms {
            return Err(ConfigError::Invalid {
                field: "decayMs",
                value: self.decay_ms,
            });
        }
        if !(self.sustain_ratio > 0.0 && self.sustain_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "sustainRatio",
                value: self.sustain_ratio,
            });
        }
        Ok(())
    }

    /// Pull release and panic-fade durations into their supported ranges.
    pub fn clamped(mut self) -> Self {
        let release = self.release_ms.clamp(MIN_RELEASE_MS, MAX_RELEASE_MS);
        if release != self.release_ms {
            log::warn!(
                "release {} ms outside {MIN_RELEASE_MS}..={MAX_RELEASE_MS} ms, using {release} ms",
                self.release_ms
            );
            self.release_ms = release;
        }

        let fade = self.panic_fade_ms.min(MAX_PANIC_FADE_MS);
        if fade != self.panic_fade_ms {
            log::warn!(
                "panic fade {} ms above {MAX_PANIC_FADE_MS} ms, using {fade} ms",
                self.panic_fade_ms
            );
            self.panic_fade_ms = fade;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    /// Delay after the last replayed event before playback reports stopped.
    pub grace_ms: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            grace_ms: DEFAULT_GRACE_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub engine: EngineConfig,
    pub playback: PlaybackConfig,
}

impl KeyboardConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(Self {
            engine: config.engine.clamped(),
            playback: config.playback,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        let grace = self.playback.grace_ms;
        if !grace.is_finite() || grace < 0.0 {
            return Err(ConfigError::Invalid {
                field: "graceMs",
                value: grace,
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = KeyboardConfig::from_json_str("{}").unwrap();
        assert_eq!(config, KeyboardConfig::default());
        assert_eq!(config.engine.release_ms, 200.0);
        assert_eq!(config.playback.grace_ms, 500.0);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config =
            KeyboardConfig::from_json_str(r#"{"engine": {"releaseMs": 250}}"#).unwrap();
        assert_eq!(config.engine.release_ms, 250.0);
        assert_eq!(config.engine.attack_ms, DEFAULT_ATTACK_MS);
    }

    #[test]
    fn release_and_panic_fade_are_clamped() {
        let config = KeyboardConfig::from_json_str(
            r#"{"engine": {"releaseMs": 2000, "panicFadeMs": 400}}"#,
        )
        .unwrap();
        assert_eq!(config.engine.release_ms, MAX_RELEASE_MS);
        assert_eq!(config.engine.panic_fade_ms, MAX_PANIC_FADE_MS);

        assert_eq!(EngineConfig::default().with_release_ms(20.0).release_ms, MIN_RELEASE_MS);
    }

    #[test]
    fn rejects_unusable_values() {
        assert!(matches!(
            KeyboardConfig::from_json_str(r#"{"engine": {"sustainRatio": 0}}"#),
            Err(ConfigError::Invalid { field: "sustainRatio", .. })
        ));
        assert!(matches!(
            KeyboardConfig::from_json_str(r#"{"playback": {"graceMs": -1}}"#),
            Err(ConfigError::Invalid { field: "graceMs", .. })
        ));
        assert!(matches!(
            KeyboardConfig::from_json_str("not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
