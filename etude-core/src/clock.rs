//! Beat clock state machine
//!
//! Converts wall-clock elapsed time and tempo into a signed beat position and
//! owns the Idle -> CountIn -> Playing <-> Paused -> Completed lifecycle.
//! The machine is pure: callers feed it `now_ms` from whatever monotonic
//! source drives them, which keeps every transition unit-testable and puts
//! the tick thread (which owns the real cadence) in the host crate.
//!
//! Negative beats are the count-in; beat 0 is where the reference passage
//! begins and where scoring starts accepting input.

use thiserror::Error;

/// Lifecycle states of an attempt's clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    /// No attempt in progress, beat pinned at the start of the count-in
    Idle,
    /// Counting in, beat is negative
    CountIn,
    /// The reference passage is running, beat >= 0
    Playing,
    /// Frozen mid-attempt; elapsed time is preserved for resume
    Paused,
    /// The attempt ended; beat is frozen at the completion point
    Completed,
}

/// A transition was requested from a state that does not allow it
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("invalid clock transition: {op} while {from:?}")]
pub struct ClockError {
    pub from: ClockState,
    pub op: &'static str,
}

/// Pure beat-position clock for one exercise tempo
#[derive(Clone, Debug)]
pub struct BeatClock {
    tempo_bpm: f64,
    count_in_beats: f64,
    state: ClockState,
    /// Wall-clock ms at the start of the count-in (rebased on resume)
    t0_ms: f64,
    /// Elapsed ms captured when pausing or completing
    frozen_elapsed_ms: f64,
    /// State to restore on resume (pausing is legal during the count-in too)
    paused_from: ClockState,
}

impl BeatClock {
    /// Create an idle clock for the given tempo and count-in length
    pub fn new(tempo_bpm: f64, count_in_beats: f64) -> Self {
        Self {
            tempo_bpm,
            count_in_beats: count_in_beats.max(0.0),
            state: ClockState::Idle,
            t0_ms: 0.0,
            frozen_elapsed_ms: 0.0,
            paused_from: ClockState::CountIn,
        }
    }

    /// Milliseconds per beat at this clock's tempo
    pub fn ms_per_beat(&self) -> f64 {
        60_000.0 / self.tempo_bpm
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    /// Elapsed ms since the count-in began, honoring pause/completion freezes
    fn elapsed_ms(&self, now_ms: f64) -> f64 {
        match self.state {
            ClockState::Idle => 0.0,
            ClockState::CountIn | ClockState::Playing => now_ms - self.t0_ms,
            ClockState::Paused | ClockState::Completed => self.frozen_elapsed_ms,
        }
    }

    /// Current beat position; negative during the count-in
    pub fn beat_at(&self, now_ms: f64) -> f64 {
        self.elapsed_ms(now_ms) / self.ms_per_beat() - self.count_in_beats
    }

    /// Wall-clock ms corresponding to beat 0 (valid while ticking)
    ///
    /// This is the epoch the matcher subtracts from event timestamps; it
    /// shifts on resume along with `t0`, so expected-time math stays aligned.
    pub fn beat_zero_ms(&self) -> f64 {
        self.t0_ms + self.count_in_beats * self.ms_per_beat()
    }

    /// Begin the count-in; beat jumps to `-count_in_beats`
    pub fn start(&mut self, now_ms: f64) -> Result<(), ClockError> {
        if self.state != ClockState::Idle {
            return Err(ClockError {
                from: self.state,
                op: "start",
            });
        }
        self.t0_ms = now_ms;
        self.frozen_elapsed_ms = 0.0;
        self.state = ClockState::CountIn;
        Ok(())
    }

    /// Advance the state machine; promotes CountIn to Playing when the beat
    /// crosses 0. Returns the state after the tick.
    pub fn tick(&mut self, now_ms: f64) -> ClockState {
        if self.state == ClockState::CountIn && self.beat_at(now_ms) >= 0.0 {
            self.state = ClockState::Playing;
        }
        self.state
    }

    /// Freeze the clock, preserving elapsed time
    pub fn pause(&mut self, now_ms: f64) -> Result<(), ClockError> {
        match self.state {
            ClockState::CountIn | ClockState::Playing => {
                self.frozen_elapsed_ms = now_ms - self.t0_ms;
                self.paused_from = self.state;
                self.state = ClockState::Paused;
                Ok(())
            }
            _ => Err(ClockError {
                from: self.state,
                op: "pause",
            }),
        }
    }

    /// Resume from a pause, rebasing `t0` so elapsed time is preserved
    ///
    /// `t0 = now - paused_elapsed` is the one invariant everything downstream
    /// depends on: any drift here compounds into the timing offset of every
    /// subsequent note.
    pub fn resume(&mut self, now_ms: f64) -> Result<(), ClockError> {
        if self.state != ClockState::Paused {
            return Err(ClockError {
                from: self.state,
                op: "resume",
            });
        }
        self.t0_ms = now_ms - self.frozen_elapsed_ms;
        self.state = self.paused_from;
        Ok(())
    }

    /// Declare the attempt complete, freezing the beat position
    pub fn complete(&mut self, now_ms: f64) -> Result<(), ClockError> {
        if self.state != ClockState::Playing {
            return Err(ClockError {
                from: self.state,
                op: "complete",
            });
        }
        self.frozen_elapsed_ms = now_ms - self.t0_ms;
        self.state = ClockState::Completed;
        Ok(())
    }

    /// Return to Idle, invalidating any pending completion
    pub fn stop(&mut self) {
        self.state = ClockState::Idle;
        self.t0_ms = 0.0;
        self.frozen_elapsed_ms = 0.0;
        self.paused_from = ClockState::CountIn;
    }
}
