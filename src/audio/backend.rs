//! Synthesis backend selection
//!
//! A `SynthesisBackend` turns a pitch into a `Tone`. Implementations are
//! swappable and chosen once at engine startup by capability probing, not by
//! conditional compilation: sampled playback needs a rendered bank, additive
//! synthesis always works and is the fallback.

use std::sync::Arc;

use etude_core::pitch_to_frequency;
use etude_core::types::BackendPreference;

use super::tone::{HarmonicTone, PitchSample, SampledTone, Tone, PARTIAL_AMPS, PARTIAL_COUNT};

/// Strategy for realizing pitches as waveforms
pub trait SynthesisBackend: Send {
    fn name(&self) -> &'static str;

    /// Build a tone generator for the given pitch
    ///
    /// Called on the note-trigger path: implementations must not allocate
    /// (cloning an `Arc` into a `SampledTone` is fine).
    fn build_tone(&self, pitch: u8, sample_rate: f32) -> Tone;
}

/// Additive synthesis: fundamental plus decaying harmonics
pub struct HarmonicSynthesis;

impl SynthesisBackend for HarmonicSynthesis {
    fn name(&self) -> &'static str {
        "harmonic"
    }

    fn build_tone(&self, pitch: u8, sample_rate: f32) -> Tone {
        Tone::Harmonic(HarmonicTone::new(pitch, sample_rate))
    }
}

/// Base pitches the sample bank is rendered at, one per octave (C2..C6)
const BASE_PITCHES: [u8; 5] = [36, 48, 60, 72, 84];

/// Rendered length of each base sample in seconds
const SAMPLE_SECONDS: f32 = 2.0;

/// Sample playback: a small bank of pre-rendered base tones, transposed by
/// playback-rate scaling with the nearest base winning
pub struct SampledSynthesis {
    /// Sorted by base pitch
    bank: Vec<Arc<PitchSample>>,
}

impl SampledSynthesis {
    /// Render the bank at the engine sample rate
    ///
    /// Returns None when rendering cannot produce a usable bank (degenerate
    /// sample rate), which makes `probe` fall back to additive synthesis.
    pub fn render(sample_rate: f32) -> Option<Self> {
        if !(8_000.0..=192_000.0).contains(&sample_rate) {
            return None;
        }
        let bank = BASE_PITCHES
            .iter()
            .map(|&pitch| Arc::new(render_base_sample(pitch, sample_rate)))
            .collect();
        Some(Self { bank })
    }

    /// The base sample closest to the target pitch
    fn nearest(&self, pitch: u8) -> &Arc<PitchSample> {
        self.bank
            .iter()
            .min_by_key(|s| (s.base_pitch as i32 - pitch as i32).abs())
            .expect("bank is never empty")
    }
}

impl SynthesisBackend for SampledSynthesis {
    fn name(&self) -> &'static str {
        "sampled"
    }

    fn build_tone(&self, pitch: u8, _sample_rate: f32) -> Tone {
        Tone::Sampled(SampledTone::new(self.nearest(pitch).clone(), pitch))
    }
}

/// Render one decaying base tone: the harmonic stack with per-partial
/// exponential decay baked in, normalized to a safe peak
fn render_base_sample(pitch: u8, sample_rate: f32) -> PitchSample {
    let fundamental = pitch_to_frequency(pitch) as f32;
    let nyquist = sample_rate / 2.0;
    let frame_count = (SAMPLE_SECONDS * sample_rate) as usize;

    let mut frames = vec![0.0f32; frame_count];
    let mut peak = 0.0f32;
    for (i, frame) in frames.iter_mut().enumerate() {
        let t = i as f32 / sample_rate;
        let mut value = 0.0;
        for k in 0..PARTIAL_COUNT {
            let freq = fundamental * (k + 1) as f32;
            if freq < nyquist {
                // Higher partials die faster, like a struck string
                let decay = (-t * (3.0 + k as f32)).exp();
                let phase = 2.0 * std::f32::consts::PI * freq * t;
                value += PARTIAL_AMPS[k] * decay * phase.sin();
            }
        }
        *frame = value;
        peak = peak.max(value.abs());
    }

    if peak > 0.0 {
        let scale = 0.9 / peak;
        for frame in &mut frames {
            *frame *= scale;
        }
    }

    PitchSample {
        base_pitch: pitch,
        frames,
    }
}

/// Choose a backend at startup
///
/// `Auto` prefers the sampled bank and falls back to additive synthesis when
/// the bank cannot be rendered.
pub fn probe(preference: BackendPreference, sample_rate: f32) -> Box<dyn SynthesisBackend> {
    match preference {
        BackendPreference::Harmonic => Box::new(HarmonicSynthesis),
        BackendPreference::Sampled | BackendPreference::Auto => {
            match SampledSynthesis::render(sample_rate) {
                Some(backend) => Box::new(backend),
                None => Box::new(HarmonicSynthesis),
            }
        }
    }
}
