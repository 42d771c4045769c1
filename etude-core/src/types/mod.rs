// etude-core/src/types/mod.rs

pub mod engine_config;
pub mod exercise;
pub mod judgment;
pub mod note;

pub use engine_config::{AdsrParams, BackendPreference, EngineConfig};
pub use exercise::{CompletionPolicy, Exercise, ScoringConfig, TimeSignature};
pub use judgment::{AttemptScore, NoteJudgment, ScoreBreakdown};
pub use note::{
    pitch_name, pitch_to_frequency, ExpectedNote, Hand, InputSource, NoteEventKind,
    PlayedNoteEvent,
};
