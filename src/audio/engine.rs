//! Synthesis engine facade
//!
//! One engine outlives many attempts: it is constructed once, initialized
//! once, and handed around as an explicitly owned service (no module-level
//! singleton). `SynthEngine` owns the cpal stream and must stay on the thread
//! that created it; cloneable `SynthHandle`s carry the triggering surface to
//! the session thread and anyone else who wants to make noise.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use thiserror::Error;

use etude_core::types::EngineConfig;

use super::backend::{self, HarmonicSynthesis};
use super::output::{AudioOutput, NegotiatedOutput};
use super::pool::{VoiceHandle, VoicePool};
use crate::time::MonotonicEpoch;

/// Errors from the note-triggering surface
#[derive(Debug, Error)]
pub enum EngineError {
    /// `initialize()` has not succeeded; callers should degrade to silent
    /// mode rather than abort the attempt
    #[error("synthesis engine not initialized")]
    NotInitialized,
}

/// Snapshot of the engine for UI consumers
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineStatus {
    pub ready: bool,
    /// Estimated output latency in ms (0 when not ready)
    pub output_latency_ms: f64,
}

pub struct SynthEngine {
    config: EngineConfig,
    epoch: MonotonicEpoch,
    /// Shared with the audio callback and every handle
    pool: Arc<Mutex<VoicePool>>,
    ready: Arc<AtomicBool>,
    /// f64 latency estimate stored as bits for atomic access
    latency_bits: Arc<AtomicU64>,
    output: Option<AudioOutput>,
}

impl SynthEngine {
    /// Create an engine; it makes no sound until `initialize()` succeeds
    pub fn new(config: EngineConfig, epoch: MonotonicEpoch) -> Self {
        // Placeholder pool at the configured rate; initialize() rebuilds it
        // against the device's actual rate with the probed backend
        let pool = VoicePool::new(&config, Box::new(HarmonicSynthesis), config.sample_rate);
        Self {
            config,
            epoch,
            pool: Arc::new(Mutex::new(pool)),
            ready: Arc::new(AtomicBool::new(false)),
            latency_bits: Arc::new(AtomicU64::new(0f64.to_bits())),
            output: None,
        }
    }

    /// Prepare the audio backend and pre-allocate the voice table
    ///
    /// Must complete before any `play_note` call. Failure is non-fatal to the
    /// caller's attempt: the engine simply stays not-ready and scoring runs
    /// silently.
    pub fn initialize(&mut self) -> Result<()> {
        if self.ready.load(Ordering::Relaxed) {
            return Ok(());
        }

        let negotiated = NegotiatedOutput::negotiate()?;
        let sample_rate = negotiated.sample_rate();

        let synthesis = backend::probe(self.config.backend, sample_rate);
        {
            let mut pool = self.pool.lock().unwrap();
            *pool = VoicePool::new(&self.config, synthesis, sample_rate);
        }

        let output = negotiated.start(Arc::clone(&self.pool))?;
        self.latency_bits
            .store(output.latency_ms().to_bits(), Ordering::Relaxed);
        self.output = Some(output);
        self.ready.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Cloneable triggering surface for other threads
    pub fn handle(&self) -> SynthHandle {
        SynthHandle {
            pool: Arc::clone(&self.pool),
            ready: Arc::clone(&self.ready),
            latency_bits: Arc::clone(&self.latency_bits),
            epoch: self.epoch,
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.handle().status()
    }
}

/// Thread-safe handle to the running engine
#[derive(Clone)]
pub struct SynthHandle {
    pool: Arc<Mutex<VoicePool>>,
    ready: Arc<AtomicBool>,
    latency_bits: Arc<AtomicU64>,
    epoch: MonotonicEpoch,
}

impl SynthHandle {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            ready: self.is_ready(),
            output_latency_ms: f64::from_bits(self.latency_bits.load(Ordering::Relaxed)),
        }
    }

    /// Start a note now; errors if the engine was never initialized
    pub fn play_note(&self, pitch: u8, velocity: f32) -> Result<VoiceHandle, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotInitialized);
        }
        let now_ms = self.epoch.now_ms();
        let mut pool = self.pool.lock().unwrap();
        Ok(pool.trigger(pitch, velocity, now_ms))
    }

    /// Release one triggered note by its handle; stale handles are no-ops
    pub fn release(&self, handle: VoiceHandle) {
        let now_ms = self.epoch.now_ms();
        self.pool.lock().unwrap().release(handle, now_ms);
    }

    /// Release every sounding voice of a pitch (manual note-off)
    pub fn release_note(&self, pitch: u8) {
        let now_ms = self.epoch.now_ms();
        self.pool.lock().unwrap().release_pitch(pitch, now_ms);
    }

    /// Stop everything immediately; used on pause/stop
    pub fn release_all(&self) {
        self.pool.lock().unwrap().release_all();
    }

    /// Currently sounding voices (diagnostics)
    pub fn active_voices(&self) -> usize {
        self.pool.lock().unwrap().active_count()
    }
}
