//! A single sounding note: tone source plus amplitude envelope
//!
//! Voices live in the pool's fixed table and are reconfigured in place on
//! trigger. A generation counter guards against stale handles releasing a
//! slot that has since been reused for another note.

use etude_core::types::AdsrParams;

use super::adsr::AdsrEnvelope;
use super::tone::Tone;

pub struct Voice {
    pitch: u8,
    tone: Tone,
    envelope: AdsrEnvelope,
    started_at_ms: f64,
    generation: u32,
    active: bool,
    /// Samples left before a deferred release fires (minimum-duration rule)
    deferred_release: Option<u32>,
}

impl Voice {
    /// Create an idle voice slot
    pub fn idle(adsr: AdsrParams, sample_rate: f32) -> Self {
        Self {
            pitch: 0,
            tone: Tone::Silent,
            envelope: AdsrEnvelope::new(adsr, sample_rate),
            started_at_ms: 0.0,
            generation: 0,
            active: false,
            deferred_release: None,
        }
    }

    /// Reconfigure this slot for a new note
    pub fn start(&mut self, pitch: u8, velocity: f32, tone: Tone, now_ms: f64, generation: u32) {
        self.pitch = pitch;
        self.tone = tone;
        self.started_at_ms = now_ms;
        self.generation = generation;
        self.active = true;
        self.deferred_release = None;
        self.envelope.trigger(velocity);
    }

    /// Begin the release ramp, deferring it if the note has not yet sounded
    /// for `min_note_ms` (extremely fast taps must still be audible)
    pub fn request_release(&mut self, now_ms: f64, min_note_ms: f32, sample_rate: f32) {
        if !self.active {
            return;
        }
        let elapsed_ms = (now_ms - self.started_at_ms) as f32;
        if elapsed_ms < min_note_ms {
            let remaining = ((min_note_ms - elapsed_ms) / 1000.0 * sample_rate) as u32;
            self.deferred_release = Some(remaining.max(1));
        } else {
            self.envelope.release();
        }
    }

    /// Hard stop with no tail (retrigger, eviction, release_all)
    pub fn force_stop(&mut self) {
        self.envelope.force_stop();
        self.tone = Tone::Silent;
        self.active = false;
        self.deferred_release = None;
    }

    /// Generate the next sample; frees the slot once the envelope finishes
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }
        if let Some(remaining) = self.deferred_release {
            if remaining <= 1 {
                self.deferred_release = None;
                self.envelope.release();
            } else {
                self.deferred_release = Some(remaining - 1);
            }
        }

        let value = self.tone.next_sample() * self.envelope.next_sample();
        if self.envelope.is_finished() {
            self.active = false;
            self.tone = Tone::Silent;
        }
        value
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn started_at_ms(&self) -> f64 {
        self.started_at_ms
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// True once the release ramp has been requested (or deferred)
    pub fn is_releasing(&self) -> bool {
        use super::adsr::EnvelopeStage;
        self.deferred_release.is_some() || self.envelope.stage() == EnvelopeStage::Release
    }
}
