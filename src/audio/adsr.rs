//! ADSR (Attack, Decay, Sustain, Release) envelope generator
//!
//! Provides sample-accurate amplitude envelopes with exponential curves.
//! The peak of the attack is the triggering note's velocity, so a soft press
//! blooms to a soft level and a hard press to a loud one; decay settles at
//! `velocity * sustain_level`.
//!
//! # Example
//! ```ignore
//! let mut env = AdsrEnvelope::new(AdsrParams::default(), 44100.0);
//! env.trigger(0.8); // Start attack toward level 0.8
//!
//! // In audio callback:
//! let amplitude = env.next_sample();
//!
//! // When note should stop:
//! env.release(); // Ramp to silence from the current level
//! ```

use etude_core::types::AdsrParams;

/// ADSR envelope stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Not active, output is 0
    Idle,
    /// Rising from near-zero to the velocity peak
    Attack,
    /// Falling from the peak to the sustain level
    Decay,
    /// Holding at `peak * sustain_level` while the note is held
    Sustain,
    /// Falling from the current level to 0 after note-off
    Release,
}

/// Per-sample ADSR envelope generator
///
/// Uses exponential curves for natural-sounding amplitude changes; all stage
/// coefficients are precomputed, so `next_sample` is branch-plus-multiply and
/// triggering allocates nothing.
pub struct AdsrEnvelope {
    params: AdsrParams,
    stage: EnvelopeStage,
    level: f32,
    /// Attack target, set from the note's velocity at trigger time
    peak: f32,
    sample_rate: f32,

    attack_coeff: f32,
    decay_coeff: f32,
    release_coeff: f32,
}

impl AdsrEnvelope {
    pub fn new(params: AdsrParams, sample_rate: f32) -> Self {
        let mut env = Self {
            params,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            peak: 0.0,
            sample_rate,
            attack_coeff: 0.0,
            decay_coeff: 0.0,
            release_coeff: 0.0,
        };
        env.recalculate_coefficients();
        env
    }

    /// Recalculate exponential coefficients from the ms-domain parameters
    fn recalculate_coefficients(&mut self) {
        // Exponential envelope formula: level = level + (target - level) * coeff
        // To reach ~99.9% of target in `time_ms`:
        // coeff = 1 - exp(-6.9 / (time_s * sample_rate)), since exp(-6.9) ~ 0.001
        let time_constant = 6.9;
        let sample_rate = self.sample_rate;
        let coeff = |time_ms: f32| -> f32 {
            if time_ms > 0.0 {
                1.0 - (-time_constant / (time_ms / 1000.0 * sample_rate)).exp()
            } else {
                1.0 // Instant
            }
        };
        self.attack_coeff = coeff(self.params.attack_ms);
        self.decay_coeff = coeff(self.params.decay_ms);
        self.release_coeff = coeff(self.params.release_ms);
    }

    /// Start the attack toward the given velocity peak (0.0-1.0)
    ///
    /// The level is not reset, so retriggering mid-release continues smoothly
    /// from wherever the tail is.
    pub fn trigger(&mut self, velocity: f32) {
        self.peak = velocity.clamp(0.0, 1.0);
        self.stage = EnvelopeStage::Attack;
    }

    /// Begin the release phase from the current level
    ///
    /// Whatever stage the envelope is in, the ramp continues from `level`,
    /// which is what prevents an audible click on early release.
    pub fn release(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Immediate stop with no release tail (hard retrigger and eviction)
    pub fn force_stop(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Check if envelope has finished (released and faded out)
    pub fn is_finished(&self) -> bool {
        self.stage == EnvelopeStage::Idle
            || (self.stage == EnvelopeStage::Release && self.level < 0.0001)
    }

    pub fn is_active(&self) -> bool {
        !self.is_finished()
    }

    /// Generate the next amplitude sample (0.0-1.0)
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Attack => {
                self.level += (self.peak - self.level) * self.attack_coeff;
                if self.level >= self.peak * 0.999 {
                    self.level = self.peak;
                    self.stage = EnvelopeStage::Decay;
                }
            }

            EnvelopeStage::Decay => {
                let target = self.peak * self.params.sustain_level;
                self.level += (target - self.level) * self.decay_coeff;
                if (self.level - target).abs() < 0.001 {
                    self.level = target;
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                self.level = self.peak * self.params.sustain_level;
            }

            EnvelopeStage::Release => {
                self.level += (0.0 - self.level) * self.release_coeff;
                if self.level < 0.0001 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn envelope() -> AdsrEnvelope {
        AdsrEnvelope::new(AdsrParams::default(), SAMPLE_RATE)
    }

    #[test]
    fn test_envelope_idle_start() {
        let env = envelope();
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_envelope_trigger_starts_attack() {
        let mut env = envelope();
        env.trigger(1.0);
        assert_eq!(env.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn test_envelope_attack_rises() {
        let mut env = envelope();
        env.trigger(1.0);

        let initial = env.level();
        for _ in 0..100 {
            env.next_sample();
        }
        assert!(env.level() > initial, "Level should rise during attack");
    }

    #[test]
    fn test_peak_tracks_velocity() {
        let mut env = envelope();
        env.trigger(0.5);

        // 10ms attack at 44100Hz = 441 samples; run well past it
        let mut max = 0.0f32;
        for _ in 0..4000 {
            max = max.max(env.next_sample());
        }
        assert!(max <= 0.5 + 1e-6, "Peak {} exceeded velocity", max);
        assert!(max > 0.45, "Peak {} never approached velocity", max);
    }

    #[test]
    fn test_envelope_sustain_level() {
        let params = AdsrParams::new(1.0, 10.0, 0.6, 100.0);
        let mut env = AdsrEnvelope::new(params, SAMPLE_RATE);
        env.trigger(1.0);

        for _ in 0..5000 {
            env.next_sample();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert!((env.level() - 0.6).abs() < 0.01);
    }

    #[test]
    fn test_sustain_scales_with_velocity() {
        let params = AdsrParams::new(1.0, 10.0, 0.5, 100.0);
        let mut env = AdsrEnvelope::new(params, SAMPLE_RATE);
        env.trigger(0.8);

        for _ in 0..5000 {
            env.next_sample();
        }
        assert!((env.level() - 0.4).abs() < 0.01);
    }

    #[test]
    fn test_envelope_release_continues_from_current_level() {
        // Note-off during a slow attack must not jump
        let params = AdsrParams::new(100.0, 100.0, 0.7, 100.0);
        let mut env = AdsrEnvelope::new(params, SAMPLE_RATE);
        env.trigger(1.0);

        for _ in 0..10 {
            env.next_sample();
        }
        let level_before_release = env.level();
        env.release();

        assert_eq!(env.stage(), EnvelopeStage::Release);
        assert!((env.level() - level_before_release).abs() < 0.01);
    }

    #[test]
    fn test_envelope_finishes() {
        let params = AdsrParams::new(1.0, 10.0, 0.5, 10.0);
        let mut env = AdsrEnvelope::new(params, SAMPLE_RATE);
        env.trigger(1.0);

        for _ in 0..2000 {
            env.next_sample();
        }
        env.release();
        for _ in 0..5000 {
            env.next_sample();
        }
        assert!(env.is_finished(), "Envelope should be finished");
    }

    #[test]
    fn test_force_stop_silences_immediately() {
        let mut env = envelope();
        env.trigger(1.0);
        for _ in 0..1000 {
            env.next_sample();
        }
        env.force_stop();
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.next_sample(), 0.0);
    }

    #[test]
    fn test_output_range() {
        let mut env = envelope();
        env.trigger(1.0);
        for _ in 0..10000 {
            let sample = env.next_sample();
            assert!(
                (0.0..=1.0).contains(&sample),
                "Sample {} out of range",
                sample
            );
        }
        env.release();
        for _ in 0..10000 {
            let sample = env.next_sample();
            assert!(
                (0.0..=1.0).contains(&sample),
                "Sample {} out of range",
                sample
            );
        }
    }
}
