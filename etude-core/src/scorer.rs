//! Aggregate scorer: reduces judgments to a single attempt score
//!
//! Pure reduction over the matcher's output. The same judgment list always
//! produces the same `AttemptScore`, which is what makes recorded attempts
//! replayable by external consumers.

use crate::matcher::NoteMatcher;
use crate::types::{
    AttemptScore, Exercise, NoteJudgment, PlayedNoteEvent, ScoreBreakdown,
};

/// Dimension weights of the overall score
const WEIGHT_ACCURACY: f64 = 0.35;
const WEIGHT_TIMING: f64 = 0.30;
const WEIGHT_COMPLETENESS: f64 = 0.10;
const WEIGHT_EXTRA: f64 = 0.10;
const WEIGHT_DURATION: f64 = 0.15;

/// Reduce a finalized judgment list to an attempt score
///
/// `previous_high` is the best overall score for the same exercise, if any;
/// a new high requires strictly beating it.
pub fn score(
    exercise: &Exercise,
    judgments: &[NoteJudgment],
    previous_high: Option<f64>,
) -> AttemptScore {
    let required = exercise.required_note_count();

    let is_required = |j: &NoteJudgment| {
        j.expected
            .map(|i| !exercise.notes[i].is_optional)
            .unwrap_or(false)
    };

    let matched_required = judgments
        .iter()
        .filter(|j| j.is_matched() && is_required(j))
        .count();

    // Matching only ever pairs identical pitches, so these two coincide
    // today; they are separate dimensions and computed independently.
    let accuracy = percentage(matched_required, required);
    let completeness = percentage(matched_required, required);

    let matched: Vec<&NoteJudgment> = judgments.iter().filter(|j| j.is_matched()).collect();
    let timing = if matched.is_empty() {
        // Nothing matched: worst case, unless there was nothing to match
        if required == 0 { 100.0 } else { 0.0 }
    } else {
        matched.iter().map(|j| j.timing_score).sum::<f64>() / matched.len() as f64
    };

    let extras = judgments.iter().filter(|j| j.is_extra).count();
    let extra_note_penalty =
        (100.0 * extras as f64 / required.max(1) as f64).min(100.0);

    // Duration accuracy only covers matched notes whose off-event was seen;
    // with no duration data at all the dimension is neutral.
    let ms_per_beat = exercise.ms_per_beat();
    let mut duration_samples = 0usize;
    let mut duration_sum = 0.0;
    for j in &matched {
        let (Some(expected_index), Some(played_ms)) = (j.expected, j.duration_ms) else {
            continue;
        };
        let expected_ms = exercise.notes[expected_index].duration_beats * ms_per_beat;
        if expected_ms <= 0.0 {
            continue;
        }
        let ratio = (played_ms.min(expected_ms) / played_ms.max(expected_ms)).clamp(0.0, 1.0);
        duration_sum += 100.0 * ratio;
        duration_samples += 1;
    }
    let duration_accuracy = if duration_samples == 0 {
        100.0
    } else {
        duration_sum / duration_samples as f64
    };

    let overall = (WEIGHT_ACCURACY * accuracy
        + WEIGHT_TIMING * timing
        + WEIGHT_COMPLETENESS * completeness
        + WEIGHT_EXTRA * (100.0 - extra_note_penalty)
        + WEIGHT_DURATION * duration_accuracy)
        .clamp(0.0, 100.0);

    let stars = exercise
        .scoring
        .star_thresholds
        .iter()
        .filter(|&&threshold| overall + 1e-9 >= threshold)
        .count() as u8;

    AttemptScore {
        overall,
        stars,
        breakdown: ScoreBreakdown {
            accuracy,
            timing,
            completeness,
            extra_note_penalty,
            duration_accuracy,
        },
        judgments: judgments.to_vec(),
        is_new_high_score: previous_high.map(|p| overall > p).unwrap_or(true),
        is_passed: overall + 1e-9 >= exercise.scoring.passing_score,
    }
}

/// Replay a recorded event log through the matcher and scorer
///
/// `epoch_ms` is the wall-clock time of beat 0 as recorded with the log.
/// Feeding the same exercise, epoch and events always yields an identical
/// `AttemptScore` - the determinism contract external consumers rely on.
pub fn score_attempt(
    exercise: &Exercise,
    epoch_ms: f64,
    events: &[PlayedNoteEvent],
    previous_high: Option<f64>,
) -> AttemptScore {
    let mut matcher = NoteMatcher::new(exercise);
    matcher.set_epoch(epoch_ms);
    for event in events {
        matcher.on_event(event.clone());
    }
    matcher.finalize();
    score(exercise, matcher.judgments(), previous_high)
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        100.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExpectedNote, InputSource, PlayedNoteEvent, ScoringConfig, TimeSignature};

    fn four_quarters() -> Exercise {
        Exercise {
            title: "test".to_string(),
            tempo_bpm: 120.0,
            time_signature: TimeSignature::default(),
            count_in_beats: 0.0,
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

    fn on(pitch: u8, timestamp_ms: f64) -> PlayedNoteEvent {
        PlayedNoteEvent::on(pitch, 0.8, timestamp_ms, InputSource::Controller)
    }

    #[test]
    fn test_perfect_attempt_scores_100() {
        let ex = four_quarters();
        let events: Vec<PlayedNoteEvent> = ex
            .notes
            .iter()
            .map(|n| on(n.pitch, n.start_beat * 500.0))
            .collect();
        let result = score_attempt(&ex, 0.0, &events, None);

        assert!((result.overall - 100.0).abs() < 1e-9);
        assert_eq!(result.stars, 3);
        assert!(result.is_passed);
        assert!(result.is_new_high_score);
        assert!((result.breakdown.accuracy - 100.0).abs() < 1e-9);
        assert!((result.breakdown.timing - 100.0).abs() < 1e-9);
        assert_eq!(result.breakdown.extra_note_penalty, 0.0);
    }

    #[test]
    fn test_half_played_attempt_fails() {
        let ex = four_quarters();
        let events = vec![on(60, 0.0), on(62, 500.0)];
        let result = score_attempt(&ex, 0.0, &events, None);

        assert!((result.breakdown.completeness - 50.0).abs() < 1e-9);
        assert!((result.breakdown.accuracy - 50.0).abs() < 1e-9);
        // Timing over the matched notes is still perfect
        assert!((result.breakdown.timing - 100.0).abs() < 1e-9);
        // 0.35*50 + 0.30*100 + 0.10*50 + 0.10*100 + 0.15*100 = 77.5
        assert!((result.overall - 77.5).abs() < 1e-9);
        assert!(!result.is_passed);
    }

    #[test]
    fn test_extra_note_penalizes_only_its_dimension() {
        let ex = four_quarters();
        let mut events: Vec<PlayedNoteEvent> = ex
            .notes
            .iter()
            .map(|n| on(n.pitch, n.start_beat * 500.0))
            .collect();
        let clean = score_attempt(&ex, 0.0, &events, None);

        events.push(on(71, 1250.0)); // stray B4, matches nothing
        let with_extra = score_attempt(&ex, 0.0, &events, None);

        assert_eq!(
            with_extra
                .judgments
                .iter()
                .filter(|j| j.is_extra)
                .count(),
            1
        );
        assert_eq!(with_extra.breakdown.accuracy, clean.breakdown.accuracy);
        assert_eq!(with_extra.breakdown.timing, clean.breakdown.timing);
        assert!(with_extra.breakdown.extra_note_penalty > 0.0);
        assert!(with_extra.overall < clean.overall);
        // One stray note in a four-note exercise: penalty 25, overall -2.5
        assert!((with_extra.breakdown.extra_note_penalty - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_accuracy_from_held_notes() {
        let ex = four_quarters();
        let mut events = Vec::new();
        for n in &ex.notes {
            events.push(on(n.pitch, n.start_beat * 500.0));
            // Held exactly half the notated length
            events.push(PlayedNoteEvent::off(
                n.pitch,
                n.start_beat * 500.0 + 250.0,
                InputSource::Controller,
            ));
        }
        let result = score_attempt(&ex, 0.0, &events, None);
        assert!((result.breakdown.duration_accuracy - 50.0).abs() < 1e-9);
        // Everything else is perfect: 0.85*100 + 0.15*50 = 92.5
        assert!((result.overall - 92.5).abs() < 1e-9);
        assert_eq!(result.stars, 2);
    }

    #[test]
    fn test_optional_notes_do_not_count_against_completeness() {
        let mut ex = four_quarters();
        ex.notes[3].is_optional = true;
        let events = vec![on(60, 0.0), on(62, 500.0), on(64, 1000.0)];
        let result = score_attempt(&ex, 0.0, &events, None);
        assert!((result.breakdown.completeness - 100.0).abs() < 1e-9);
        // The skipped optional note is still recorded as missed
        assert_eq!(result.judgments.iter().filter(|j| j.is_missed).count(), 1);
    }

    #[test]
    fn test_high_score_is_strict() {
        let ex = four_quarters();
        let events: Vec<PlayedNoteEvent> = ex
            .notes
            .iter()
            .map(|n| on(n.pitch, n.start_beat * 500.0))
            .collect();
        let tied = score_attempt(&ex, 0.0, &events, Some(100.0));
        assert!(!tied.is_new_high_score);
        let beaten = score_attempt(&ex, 0.0, &events, Some(99.0));
        assert!(beaten.is_new_high_score);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let ex = four_quarters();
        let events = vec![
            on(60, 12.0),
            PlayedNoteEvent::on(62, 0.6, 533.0, InputSource::Touch),
            on(65, 1390.0),
            on(71, 800.0),
            PlayedNoteEvent::off(60, 430.0, InputSource::Controller),
        ];
        let first = score_attempt(&ex, 0.0, &events, Some(50.0));
        let second = score_attempt(&ex, 0.0, &events, Some(50.0));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_exercise_is_vacuously_perfect() {
        let mut ex = four_quarters();
        ex.notes.clear();
        let result = score_attempt(&ex, 0.0, &[], None);
        assert!((result.overall - 100.0).abs() < 1e-9);
    }
}
