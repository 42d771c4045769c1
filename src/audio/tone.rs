//! Tone sources: how a pitch becomes a waveform
//!
//! Two strategies, selected through `SynthesisBackend` at engine startup:
//! an additive harmonic stack (fundamental plus rolled-off overtones) and
//! playback-rate-pitched pre-rendered samples. Both produce one sample per
//! call with no allocation on the synthesis path.

use std::f32::consts::PI;
use std::sync::Arc;

use etude_core::pitch_to_frequency;

/// Fundamental plus four overtones
pub const PARTIAL_COUNT: usize = 5;

/// Spectral rolloff: each overtone is roughly half the previous one
pub(crate) const PARTIAL_AMPS: [f32; PARTIAL_COUNT] = [1.0, 0.5, 0.25, 0.12, 0.06];

/// Additive tone: fundamental + decaying harmonics at the target frequency
pub struct HarmonicTone {
    phases: [f32; PARTIAL_COUNT],
    /// Per-partial phase increment (cycles per sample)
    increments: [f32; PARTIAL_COUNT],
    /// Per-partial amplitude, zeroed for partials above Nyquist
    amps: [f32; PARTIAL_COUNT],
    /// Normalizes the partial sum back to unit peak
    norm: f32,
}

impl HarmonicTone {
    pub fn new(pitch: u8, sample_rate: f32) -> Self {
        let fundamental = pitch_to_frequency(pitch) as f32;
        let nyquist = sample_rate / 2.0;

        let mut increments = [0.0; PARTIAL_COUNT];
        let mut amps = [0.0; PARTIAL_COUNT];
        let mut amp_sum = 0.0;
        for k in 0..PARTIAL_COUNT {
            let freq = fundamental * (k + 1) as f32;
            if freq < nyquist {
                increments[k] = freq / sample_rate;
                amps[k] = PARTIAL_AMPS[k];
                amp_sum += PARTIAL_AMPS[k];
            }
        }

        Self {
            phases: [0.0; PARTIAL_COUNT],
            increments,
            amps,
            norm: if amp_sum > 0.0 { 1.0 / amp_sum } else { 0.0 },
        }
    }

    /// Generate the next sample in -1.0..=1.0
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let mut value = 0.0;
        for k in 0..PARTIAL_COUNT {
            if self.amps[k] > 0.0 {
                value += self.amps[k] * (2.0 * PI * self.phases[k]).sin();
                self.phases[k] += self.increments[k];
                if self.phases[k] >= 1.0 {
                    self.phases[k] -= 1.0;
                }
            }
        }
        value * self.norm
    }
}

/// One pre-rendered base tone, shared by every voice that plays it
pub struct PitchSample {
    /// Semitone id the sample was rendered at
    pub base_pitch: u8,
    /// Mono frames at the engine sample rate
    pub frames: Vec<f32>,
}

/// Plays a `PitchSample` at a rate that transposes it to the target pitch
///
/// `rate = 2^((pitch - base) / 12)`; fractional positions are linearly
/// interpolated. Past the end of the sample the tone is silent (the ADSR
/// release usually gets there first).
pub struct SampledTone {
    sample: Arc<PitchSample>,
    position: f32,
    rate: f32,
}

impl SampledTone {
    pub fn new(sample: Arc<PitchSample>, pitch: u8) -> Self {
        let rate = 2f32.powf((pitch as f32 - sample.base_pitch as f32) / 12.0);
        Self {
            sample,
            position: 0.0,
            rate,
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Generate the next sample, advancing by the playback rate
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let frames = &self.sample.frames;
        let index = self.position as usize;
        if index + 1 >= frames.len() {
            return 0.0;
        }
        let frac = self.position - index as f32;
        let value = frames[index] * (1.0 - frac) + frames[index + 1] * frac;
        self.position += self.rate;
        value
    }
}

/// A voice's tone generator, dispatched without boxing
pub enum Tone {
    /// Unconfigured voice slot
    Silent,
    Harmonic(HarmonicTone),
    Sampled(SampledTone),
}

impl Tone {
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self {
            Tone::Silent => 0.0,
            Tone::Harmonic(t) => t.next_sample(),
            Tone::Sampled(t) => t.next_sample(),
        }
    }
}
