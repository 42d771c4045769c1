//! Synthesis engine configuration types
//!
//! Pure data with no synthesis logic, so the audio-free core and the cpal
//! engine share one definition. Supplied once at engine construction and
//! read-only afterwards.

/// ADSR envelope parameters in milliseconds
///
/// - `attack_ms`: time to ramp from near-zero to the note's velocity
/// - `decay_ms`: time to fall from the peak to `velocity * sustain_level`
/// - `sustain_level`: level to hold while the note is held (0.0-1.0, NOT time)
/// - `release_ms`: time to fall from the current level to silence
/// - `min_note_ms`: shortest audible duration; earlier releases are deferred
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdsrParams {
    pub attack_ms: f32,
    pub decay_ms: f32,
    pub sustain_level: f32,
    pub release_ms: f32,
    pub min_note_ms: f32,
}

impl AdsrParams {
    /// Create custom ADSR parameters
    pub fn new(attack_ms: f32, decay_ms: f32, sustain_level: f32, release_ms: f32) -> Self {
        Self {
            attack_ms: attack_ms.max(1.0), // Minimum 1ms to avoid clicks
            decay_ms: decay_ms.max(0.0),
            sustain_level: sustain_level.clamp(0.0, 1.0),
            release_ms: release_ms.max(1.0), // Minimum 1ms to avoid clicks
            min_note_ms: 50.0,
        }
    }

    /// Percussive keyboard envelope: fast attack, settling sustain
    pub fn keyboard() -> Self {
        Self::new(10.0, 100.0, 0.7, 200.0)
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self::keyboard()
    }
}

/// Which synthesis strategy the engine should use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendPreference {
    /// Probe at startup: sampled when a bank can be rendered, else harmonic
    #[default]
    Auto,
    /// Additive fundamental + decaying harmonics
    Harmonic,
    /// Pre-rendered base samples pitched by playback rate
    Sampled,
}

/// Construction-time configuration for the synthesis engine
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Number of voices that may sound simultaneously
    pub max_polyphony: usize,
    pub adsr: AdsrParams,
    /// Preferred sample rate; the device's native rate wins if they differ
    pub sample_rate: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub backend: BackendPreference,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_polyphony: 10,
            adsr: AdsrParams::default(),
            sample_rate: 44_100.0,
            backend: BackendPreference::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adsr_params_clamping() {
        let params = AdsrParams::new(0.0, -1.0, 1.5, 0.0);
        assert!(params.attack_ms >= 1.0);
        assert!(params.decay_ms >= 0.0);
        assert!(params.sustain_level <= 1.0);
        assert!(params.release_ms >= 1.0);
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_polyphony, 10);
        assert_eq!(config.backend, BackendPreference::Auto);
        assert_eq!(config.adsr.min_note_ms, 50.0);
    }
}
