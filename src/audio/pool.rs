//! Voice pool: bounded polyphony with oldest-first eviction
//!
//! The pool owns a fixed table of `max_polyphony` voices allocated once at
//! construction. Triggering reconfigures a slot in place - a free one when
//! available, otherwise the oldest-started voice is evicted - so the note-on
//! path never allocates. Retriggering a pitch that is already sounding hard
//! stops the old voice first, which keeps rapid repeats from stacking.

use etude_core::types::EngineConfig;

use super::backend::SynthesisBackend;
use super::voice::Voice;

/// Ticket for releasing a specific triggered note
///
/// Carries the slot's generation so a handle kept past the voice's natural
/// death (or eviction) quietly does nothing instead of cutting off whatever
/// note reused the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoiceHandle {
    index: usize,
    generation: u32,
}

pub struct VoicePool {
    voices: Vec<Voice>,
    backend: Box<dyn SynthesisBackend>,
    sample_rate: f32,
    min_note_ms: f32,
    /// Headroom so a full table does not clip when summed
    master_gain: f32,
    next_generation: u32,
}

impl VoicePool {
    /// Pre-allocate the voice table; no allocation happens after this
    pub fn new(config: &EngineConfig, backend: Box<dyn SynthesisBackend>, sample_rate: f32) -> Self {
        let max_polyphony = config.max_polyphony.max(1);
        let voices = (0..max_polyphony)
            .map(|_| Voice::idle(config.adsr, sample_rate))
            .collect();

        Self {
            voices,
            backend,
            sample_rate,
            min_note_ms: config.adsr.min_note_ms,
            master_gain: 1.0 / (max_polyphony as f32).sqrt(),
            next_generation: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Number of currently sounding voices
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Start a note, retriggering or evicting as needed
    pub fn trigger(&mut self, pitch: u8, velocity: f32, now_ms: f64) -> VoiceHandle {
        // Hard retrigger: a voice already sounding this pitch is stopped with
        // no fade before the new one starts
        for voice in &mut self.voices {
            if voice.is_active() && voice.pitch() == pitch {
                voice.force_stop();
            }
        }

        let index = match self.voices.iter().position(|v| !v.is_active()) {
            Some(free) => free,
            None => {
                // Table full: evict the oldest-started voice, any pitch
                let oldest = self
                    .voices
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        a.started_at_ms()
                            .partial_cmp(&b.started_at_ms())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                self.voices[oldest].force_stop();
                oldest
            }
        };

        self.next_generation = self.next_generation.wrapping_add(1);
        let generation = self.next_generation;
        let tone = self.backend.build_tone(pitch, self.sample_rate);
        self.voices[index].start(pitch, velocity, tone, now_ms, generation);

        VoiceHandle { index, generation }
    }

    /// Release the note a handle refers to; stale handles are no-ops
    pub fn release(&mut self, handle: VoiceHandle, now_ms: f64) {
        let Some(voice) = self.voices.get_mut(handle.index) else {
            return;
        };
        if voice.generation() == handle.generation && voice.is_active() {
            voice.request_release(now_ms, self.min_note_ms, self.sample_rate);
        }
    }

    /// Release every sounding voice of a pitch (manual note-off path)
    pub fn release_pitch(&mut self, pitch: u8, now_ms: f64) {
        for voice in &mut self.voices {
            if voice.is_active() && voice.pitch() == pitch {
                voice.request_release(now_ms, self.min_note_ms, self.sample_rate);
            }
        }
    }

    /// Stop every voice immediately, with no release tail
    ///
    /// Used on pause/stop, where silence must be guaranteed before the state
    /// transition completes.
    pub fn release_all(&mut self) {
        for voice in &mut self.voices {
            voice.force_stop();
        }
    }

    /// Mix one mono output sample from all active voices
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let mut sum = 0.0;
        for voice in &mut self.voices {
            sum += voice.next_sample();
        }
        sum * self.master_gain
    }
}

#[cfg(test)]
mod tests {
    use super::super::backend::HarmonicSynthesis;
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn pool(max_polyphony: usize) -> VoicePool {
        let config = EngineConfig {
            max_polyphony,
            ..EngineConfig::default()
        };
        VoicePool::new(&config, Box::new(HarmonicSynthesis), SAMPLE_RATE)
    }

    #[test]
    fn test_trigger_activates_a_voice() {
        let mut p = pool(10);
        assert_eq!(p.active_count(), 0);
        p.trigger(60, 0.8, 0.0);
        assert_eq!(p.active_count(), 1);
    }

    #[test]
    fn test_polyphony_never_exceeds_table_size() {
        let mut p = pool(10);
        for i in 0..25 {
            p.trigger(40 + i, 0.8, i as f64 * 10.0);
            assert!(p.active_count() <= 10);
        }
        assert_eq!(p.active_count(), 10);
    }

    #[test]
    fn test_capacity_evicts_exactly_the_oldest_voice() {
        let mut p = pool(3);
        p.trigger(60, 0.8, 100.0);
        p.trigger(62, 0.8, 50.0); // oldest by start time
        p.trigger(64, 0.8, 200.0);

        p.trigger(65, 0.8, 300.0);
        assert_eq!(p.active_count(), 3);
        let sounding: Vec<u8> = p
            .voices
            .iter()
            .filter(|v| v.is_active())
            .map(|v| v.pitch())
            .collect();
        assert!(!sounding.contains(&62), "oldest-started voice survived");
        assert!(sounding.contains(&60));
        assert!(sounding.contains(&64));
        assert!(sounding.contains(&65));
    }

    #[test]
    fn test_same_pitch_retrigger_does_not_stack() {
        let mut p = pool(10);
        for i in 0..8 {
            p.trigger(60, 0.8, i as f64 * 5.0);
        }
        assert_eq!(p.active_count(), 1);
    }

    #[test]
    fn test_release_all_guarantees_silence() {
        let mut p = pool(10);
        for i in 0..5 {
            p.trigger(60 + i, 0.8, 0.0);
        }
        p.release_all();
        assert_eq!(p.active_count(), 0);
        assert_eq!(p.next_sample(), 0.0);
    }

    #[test]
    fn test_stale_handle_is_a_no_op() {
        let mut p = pool(1);
        let first = p.trigger(60, 0.8, 0.0);
        // Same slot is reused for the next note
        let _second = p.trigger(62, 0.8, 10.0);

        p.release(first, 5_000.0);
        // The new note must still be sounding: the stale handle did nothing
        assert_eq!(p.active_count(), 1);
        assert!(!p.voices[0].is_releasing());
    }

    #[test]
    fn test_release_by_handle_and_pitch() {
        let mut p = pool(10);
        let handle = p.trigger(60, 0.8, 0.0);
        p.trigger(64, 0.8, 0.0);

        p.release(handle, 1_000.0);
        assert!(p.voices[0].is_releasing());

        p.release_pitch(64, 1_000.0);
        let releasing = p.voices.iter().filter(|v| v.is_releasing()).count();
        assert_eq!(releasing, 2);
    }

    #[test]
    fn test_mix_is_bounded() {
        let mut p = pool(10);
        for i in 0..10 {
            p.trigger(48 + i * 3, 1.0, 0.0);
        }
        for _ in 0..8000 {
            let s = p.next_sample();
            assert!(s.abs() <= 10.0f32.sqrt() + 1e-3, "mix {} out of headroom", s);
        }
    }
}
