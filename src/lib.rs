//! # Etude
//!
//! Real-time performance core for an instrument-practice application: a
//! low-latency polyphonic synthesis engine and a deterministic note-matching
//! scorer, tied together by a beat-clock-driven practice session.
//!
//! The surrounding product (screens, persistence, sync, coaching) is an
//! external consumer: it feeds timestamped note events in and receives a
//! finalized [`AttemptScore`](etude_core::types::AttemptScore) out.
//!
//! ## Modules
//!
//! - `audio`: ADSR voices, the bounded voice pool, synthesis backends and the
//!   cpal output stream.
//! - `clock`: the transport clock thread driving the pure beat-clock state
//!   machine from `etude_core`.
//! - `session`: the practice session, which serializes clock ticks and input
//!   events into one timeline and emits the final score.
//! - `time`: the shared monotonic millisecond epoch.
//!
//! Pure logic (types, matching, scoring) lives in the `etude-core` crate so
//! it can be reused without audio dependencies.

pub mod audio;
pub mod clock;
pub mod session;
pub mod time;

// Re-export commonly used types
pub use audio::{EngineError, EngineStatus, SynthEngine, SynthHandle, VoiceHandle};
pub use clock::{ClockTick, TransportClock};
pub use session::{PracticeSession, SessionCommand, SessionHandle};
pub use time::MonotonicEpoch;

pub use etude_core as core;
