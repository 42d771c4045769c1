//! Note matcher: assigns played events to expected notes
//!
//! Consumes the attempt's timestamped event stream and reconciles it against
//! the exercise's ordered reference notes. Each played on-event is assigned
//! to at most one expected note (nearest-in-time among unmatched notes of the
//! same pitch, within a bounded window) or recorded as an extra note;
//! unmatched expected notes become missed judgments at finalization.
//!
//! The matcher is deterministic: no clock reads, no randomness. Replaying the
//! same event log against the same exercise and epoch reproduces the same
//! judgments exactly.

use std::collections::{HashMap, VecDeque};

use crate::types::{
    Exercise, ExpectedNote, InputSource, NoteEventKind, NoteJudgment, PlayedNoteEvent,
    ScoringConfig,
};

/// Score a timing offset against the perfect/good windows
///
/// - within `tolerance` -> 100
/// - `tolerance..=grace` -> linear from 100 down to 70
/// - `grace..=2*grace` -> exponential decay `70 * e^(-(offset-grace)/grace)`
/// - beyond `2*grace` -> 0 (such events are not match candidates anyway)
///
/// Monotonically non-increasing in `|offset_ms|`.
pub fn timing_score(offset_ms: f64, tolerance_ms: f64, grace_ms: f64) -> f64 {
    let offset = offset_ms.abs();
    if offset <= tolerance_ms {
        100.0
    } else if offset <= grace_ms {
        let span = grace_ms - tolerance_ms;
        if span <= 0.0 {
            70.0
        } else {
            100.0 - 30.0 * (offset - tolerance_ms) / span
        }
    } else if offset <= 2.0 * grace_ms {
        70.0 * (-(offset - grace_ms) / grace_ms).exp()
    } else {
        0.0
    }
}

/// Per-attempt matcher state
pub struct NoteMatcher {
    ms_per_beat: f64,
    config: ScoringConfig,
    expected: Vec<ExpectedNote>,
    matched: Vec<bool>,
    /// Wall-clock ms of beat 0; set when the clock enters Playing and again
    /// after every resume (the epoch shifts with the rebased t0)
    epoch_ms: f64,
    /// Append-only per-attempt event log
    events: Vec<PlayedNoteEvent>,
    judgments: Vec<NoteJudgment>,
    /// Judgment indices with no off-event yet, FIFO per pitch so overlapping
    /// same-pitch presses resolve in press order
    open_by_pitch: HashMap<u8, VecDeque<usize>>,
    on_event_count: usize,
    finalized: bool,
}

impl NoteMatcher {
    pub fn new(exercise: &Exercise) -> Self {
        Self {
            ms_per_beat: exercise.ms_per_beat(),
            config: exercise.scoring.clone(),
            expected: exercise.notes.clone(),
            matched: vec![false; exercise.notes.len()],
            epoch_ms: 0.0,
            events: Vec::new(),
            judgments: Vec::new(),
            open_by_pitch: HashMap::new(),
            on_event_count: 0,
            finalized: false,
        }
    }

    /// Set the wall-clock ms corresponding to beat 0
    pub fn set_epoch(&mut self, epoch_ms: f64) {
        self.epoch_ms = epoch_ms;
    }

    /// Number of on-events consumed so far (drives early-exit completion)
    pub fn on_event_count(&self) -> usize {
        self.on_event_count
    }

    /// The append-only event log, including any synthesized off-events
    pub fn events(&self) -> &[PlayedNoteEvent] {
        &self.events
    }

    pub fn judgments(&self) -> &[NoteJudgment] {
        &self.judgments
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Event timestamp relative to beat 0, with touch latency compensated
    fn adjusted_ms(&self, event: &PlayedNoteEvent) -> f64 {
        let compensation = match event.source {
            InputSource::Touch => self.config.touch_latency_ms,
            InputSource::Controller => 0.0,
        };
        event.timestamp_ms - self.epoch_ms - compensation
    }

    /// Consume one played event
    pub fn on_event(&mut self, event: PlayedNoteEvent) {
        if self.finalized {
            return;
        }
        match event.kind {
            NoteEventKind::On => self.on_note_on(event),
            NoteEventKind::Off => self.on_note_off(event),
        }
    }

    fn on_note_on(&mut self, event: PlayedNoteEvent) {
        let adjusted = self.adjusted_ms(&event);
        let pitch = event.pitch;
        let event_index = self.events.len();
        self.events.push(event);
        self.on_event_count += 1;

        // Nearest unmatched expected note of the same pitch, bounded to
        // 2x grace so a stray press can never match across the whole piece.
        // Ties go to the earlier note, which keeps assignment deterministic
        // for simultaneous same-pitch chord notes.
        let window = 2.0 * self.config.grace_ms;
        let mut best: Option<(usize, f64)> = None;
        for (i, note) in self.expected.iter().enumerate() {
            if self.matched[i] || note.pitch != pitch {
                continue;
            }
            let offset = adjusted - note.start_beat * self.ms_per_beat;
            if offset.abs() > window {
                continue;
            }
            match best {
                Some((_, best_offset)) if offset.abs() >= best_offset.abs() => {}
                _ => best = Some((i, offset)),
            }
        }

        let judgment_index = self.judgments.len();
        match best {
            Some((i, offset)) => {
                self.matched[i] = true;
                let score = timing_score(offset, self.config.tolerance_ms, self.config.grace_ms);
                self.judgments
                    .push(NoteJudgment::matched(i, event_index, pitch, offset, score));
            }
            None => {
                self.judgments.push(NoteJudgment::extra(event_index, pitch));
            }
        }
        self.open_by_pitch
            .entry(pitch)
            .or_default()
            .push_back(judgment_index);
    }

    fn on_note_off(&mut self, event: PlayedNoteEvent) {
        let off_ms = event.timestamp_ms;
        let pitch = event.pitch;
        self.events.push(event);

        let open = match self.open_by_pitch.get_mut(&pitch) {
            Some(queue) => queue.pop_front(),
            None => None,
        };
        // An off-event with no open judgment (e.g. the press predated the
        // attempt) is logged but backfills nothing.
        if let Some(judgment_index) = open {
            let judgment = &mut self.judgments[judgment_index];
            if let Some(on_index) = judgment.played {
                let duration = (off_ms - self.events[on_index].timestamp_ms).max(0.0);
                judgment.duration_ms = Some(duration);
                self.events[on_index].duration_ms = Some(duration);
            }
        }
    }

    /// Close every still-open note by synthesizing its off-event at `now_ms`
    ///
    /// The synthesized events go through the normal log, so replaying the
    /// recorded event list reproduces the exact same durations.
    pub fn close_open_durations(&mut self, now_ms: f64) {
        if self.finalized {
            return;
        }
        let mut open_pitches: Vec<u8> = self
            .open_by_pitch
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(&pitch, _)| pitch)
            .collect();
        // Fixed order keeps the recorded log identical from run to run
        open_pitches.sort_unstable();
        for pitch in open_pitches {
            while self
                .open_by_pitch
                .get(&pitch)
                .map(|q| !q.is_empty())
                .unwrap_or(false)
            {
                // Source is irrelevant for off-events; Controller is neutral
                self.on_note_off(PlayedNoteEvent::off(pitch, now_ms, InputSource::Controller));
            }
        }
    }

    /// Convert every never-matched expected note into a missed judgment
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        for (i, note) in self.expected.iter().enumerate() {
            if !self.matched[i] {
                self.judgments.push(NoteJudgment::missed(i, note.pitch));
            }
        }
        self.finalized = true;
    }
}
