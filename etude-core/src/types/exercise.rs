//! Exercise definition: the reference passage plus its scoring parameters
//!
//! Loaded once from content (JSON when the `serde` feature is enabled) and
//! treated as read-only by the whole core.

use crate::types::note::ExpectedNote;

/// Time signature, e.g. 4/4 or 6/8
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSignature {
    pub beats_per_bar: u8,
    pub beat_unit: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats_per_bar: 4,
            beat_unit: 4,
        }
    }
}

/// Which completion condition may end an attempt early
///
/// The full-duration timeout (last note's end plus a grace window) always
/// applies; early exit additionally completes once the player has produced at
/// least as many on-events as there are required notes and the clock has
/// reached the last note's start. Whichever condition holds first wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompletionPolicy {
    /// Only the full-duration timeout completes the attempt
    WaitForFullDuration,
    /// Enough notes played + past the last note's start completes early
    #[default]
    AllowEarlyExit,
}

/// Tunable scoring parameters for an exercise
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoringConfig {
    /// Perfect window: offsets up to this score 100
    pub tolerance_ms: f64,
    /// Good window: offsets up to this score at least 70
    pub grace_ms: f64,
    /// Minimum overall score to pass the exercise
    pub passing_score: f64,
    /// Ascending thresholds for 1, 2 and 3 stars
    pub star_thresholds: [f64; 3],
    /// Fixed compensation subtracted from touch-sourced timestamps
    pub touch_latency_ms: f64,
    /// Whether an attempt may complete before the full timeout
    #[cfg_attr(feature = "serde", serde(default))]
    pub completion: CompletionPolicy,
    /// Extra beats past the last note's end before the timeout fires
    pub completion_grace_beats: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: 50.0,
            grace_ms: 150.0,
            passing_score: 80.0,
            star_thresholds: [70.0, 85.0, 95.0],
            touch_latency_ms: 30.0,
            completion: CompletionPolicy::default(),
            completion_grace_beats: 1.0,
        }
    }
}

/// A reference passage with tempo, count-in and scoring parameters
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Exercise {
    pub title: String,
    /// Tempo in beats per minute
    pub tempo_bpm: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub time_signature: TimeSignature,
    /// Count-in length in beats; the clock starts at minus this many beats
    pub count_in_beats: f64,
    /// Key signature name, cosmetic only (e.g. "C major")
    #[cfg_attr(feature = "serde", serde(default))]
    pub key_signature: Option<String>,
    /// The reference notes, ordered by `start_beat`
    pub notes: Vec<ExpectedNote>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub scoring: ScoringConfig,
}

impl Exercise {
    /// Milliseconds per beat at this exercise's tempo
    pub fn ms_per_beat(&self) -> f64 {
        60_000.0 / self.tempo_bpm
    }

    /// Number of notes that count toward completeness
    pub fn required_note_count(&self) -> usize {
        self.notes.iter().filter(|n| !n.is_optional).count()
    }

    /// Start beat of the last expected note (0 for an empty exercise)
    pub fn last_note_start_beat(&self) -> f64 {
        self.notes
            .iter()
            .map(|n| n.start_beat)
            .fold(0.0, f64::max)
    }

    /// End beat of the latest-ending expected note (0 for an empty exercise)
    pub fn last_note_end_beat(&self) -> f64 {
        self.notes.iter().map(|n| n.end_beat()).fold(0.0, f64::max)
    }

    /// Beat past which the full-duration timeout completes the attempt
    pub fn timeout_beat(&self) -> f64 {
        self.last_note_end_beat() + self.scoring.completion_grace_beats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter_notes() -> Exercise {
        Exercise {
            title: "test".to_string(),
            tempo_bpm: 120.0,
            time_signature: TimeSignature::default(),
            count_in_beats: 4.0,
            key_signature: None,
            notes: vec![
                ExpectedNote::new(60, 0.0, 1.0),
                ExpectedNote::new(62, 1.0, 1.0),
                ExpectedNote::new(64, 2.0, 1.0),
                ExpectedNote::new(65, 3.0, 1.0),
            ],
            scoring: ScoringConfig::default(),
        }
    }

    #[test]
    fn test_ms_per_beat() {
        let ex = quarter_notes();
        assert_eq!(ex.ms_per_beat(), 500.0);
    }

    #[test]
    fn test_span_queries() {
        let ex = quarter_notes();
        assert_eq!(ex.last_note_start_beat(), 3.0);
        assert_eq!(ex.last_note_end_beat(), 4.0);
        assert_eq!(ex.timeout_beat(), 5.0);
    }

    #[test]
    fn test_required_count_excludes_optional() {
        let mut ex = quarter_notes();
        ex.notes[3].is_optional = true;
        assert_eq!(ex.required_note_count(), 3);
    }

    #[test]
    fn test_default_scoring_config() {
        let cfg = ScoringConfig::default();
        assert_eq!(cfg.tolerance_ms, 50.0);
        assert_eq!(cfg.grace_ms, 150.0);
        assert!(cfg.star_thresholds.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(cfg.completion, CompletionPolicy::AllowEarlyExit);
    }
}
