//! # Etude Core
//!
//! Audio-free core of the etude practice engine: the data model, the beat
//! clock state machine, the note matcher and the aggregate scorer. Everything
//! here is pure and deterministic - no threads, no device handles, no clock
//! reads - so the scoring pipeline can be driven identically from the
//! real-time session and from recorded replays.
//!
//! ## Features
//!
//! - **serde**: JSON (de)serialization for exercises, events and scores
//!
//! ## Example
//!
//! ```ignore
//! use etude_core::scorer::score_attempt;
//!
//! let result = score_attempt(&exercise, epoch_ms, &recorded_events, None);
//! println!("{} ({} stars)", result.overall, result.stars);
//! ```

pub mod clock;
pub mod matcher;
pub mod scorer;
pub mod types;

// Re-export commonly used types
pub use clock::{BeatClock, ClockError, ClockState};
pub use matcher::{timing_score, NoteMatcher};
pub use scorer::{score, score_attempt};
pub use types::{
    pitch_name, pitch_to_frequency, AdsrParams, AttemptScore, BackendPreference, CompletionPolicy,
    EngineConfig, Exercise, ExpectedNote, Hand, InputSource, NoteEventKind, NoteJudgment,
    PlayedNoteEvent, ScoreBreakdown, ScoringConfig, TimeSignature,
};
