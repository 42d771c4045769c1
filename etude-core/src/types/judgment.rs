//! Judgment and score records produced by the matcher and scorer

/// The scored outcome of matching (or failing to match) one note
///
/// Exactly one judgment exists per played on-event, plus one per expected
/// note that was never matched. Matching is a partial bijection: an expected
/// note maps to at most one played event and vice versa, so at most one of
/// `is_extra` / `is_missed` is set.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteJudgment {
    /// Index into the exercise's note list, None for an extra note
    pub expected: Option<usize>,
    /// Index into the attempt's event log, None for a missed note
    pub played: Option<usize>,
    /// Pitch of whichever side exists (both, when matched)
    pub pitch: u8,
    /// Signed played-minus-expected offset in ms (0 for missed notes)
    pub timing_offset_ms: f64,
    /// 0-100 per the timing curve (0 for missed and extra notes)
    pub timing_score: f64,
    /// Optional dynamics dimension; unset when no target velocity exists
    pub velocity_score: Option<f64>,
    pub pitch_correct: bool,
    /// Played note with no expected counterpart
    pub is_extra: bool,
    /// Expected note with no played counterpart
    pub is_missed: bool,
    /// Held length in ms, when the off-event was observed
    pub duration_ms: Option<f64>,
}

impl NoteJudgment {
    /// A judgment that matched a played event to an expected note
    pub fn matched(
        expected: usize,
        played: usize,
        pitch: u8,
        timing_offset_ms: f64,
        timing_score: f64,
    ) -> Self {
        Self {
            expected: Some(expected),
            played: Some(played),
            pitch,
            timing_offset_ms,
            timing_score,
            velocity_score: None,
            pitch_correct: true,
            is_extra: false,
            is_missed: false,
            duration_ms: None,
        }
    }

    /// A played event with no expected counterpart
    pub fn extra(played: usize, pitch: u8) -> Self {
        Self {
            expected: None,
            played: Some(played),
            pitch,
            timing_offset_ms: 0.0,
            timing_score: 0.0,
            velocity_score: None,
            pitch_correct: false,
            is_extra: true,
            is_missed: false,
            duration_ms: None,
        }
    }

    /// An expected note that was never played
    pub fn missed(expected: usize, pitch: u8) -> Self {
        Self {
            expected: Some(expected),
            played: None,
            pitch,
            timing_offset_ms: 0.0,
            timing_score: 0.0,
            velocity_score: None,
            pitch_correct: false,
            is_extra: false,
            is_missed: true,
            duration_ms: None,
        }
    }

    /// True when this judgment pairs an expected note with a played event
    pub fn is_matched(&self) -> bool {
        self.expected.is_some() && self.played.is_some()
    }
}

/// Per-dimension breakdown of an attempt score, each 0-100
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoreBreakdown {
    /// Required notes hit with the correct pitch, as a percentage
    pub accuracy: f64,
    /// Mean timing score over matched notes
    pub timing: f64,
    /// Matched / required, as a percentage
    pub completeness: f64,
    /// Penalty for stray notes; the weighted sum uses its inverse
    pub extra_note_penalty: f64,
    /// How closely held durations tracked the notated ones
    pub duration_accuracy: f64,
}

/// The finalized result of one attempt
///
/// Computed once at completion and immutable afterwards; handed to the
/// external progress collaborator.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttemptScore {
    /// Weighted overall score, clamped to 0-100
    pub overall: f64,
    /// 0-3 stars from the exercise's ascending thresholds
    pub stars: u8,
    pub breakdown: ScoreBreakdown,
    /// All judgments, in the order they were produced
    pub judgments: Vec<NoteJudgment>,
    pub is_new_high_score: bool,
    pub is_passed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_judgment_flags() {
        let j = NoteJudgment::matched(0, 3, 60, -12.0, 98.0);
        assert!(j.is_matched());
        assert!(j.pitch_correct);
        assert!(!j.is_extra);
        assert!(!j.is_missed);
    }

    #[test]
    fn test_extra_and_missed_are_mutually_exclusive() {
        let extra = NoteJudgment::extra(5, 71);
        assert!(extra.is_extra && !extra.is_missed && !extra.is_matched());

        let missed = NoteJudgment::missed(2, 64);
        assert!(missed.is_missed && !missed.is_extra && !missed.is_matched());
    }
}
