//! Transport clock for attempt playback
//!
//! Runs the pure `BeatClock` state machine on a dedicated thread with a
//! ~16ms internal cadence and broadcasts tick events to all subscribers.
//! Observer notifications are throttled to ~20Hz, except on state-machine
//! edges (CountIn -> Playing above all), which bypass the throttle: downstream
//! consumers gate "accept input for scoring" on that transition.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use etude_core::clock::{BeatClock, ClockState};

use crate::time::MonotonicEpoch;

/// Internal tick cadence
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Minimum spacing of non-edge observer notifications (~20Hz)
const NOTIFY_INTERVAL_MS: f64 = 50.0;

/// A clock event broadcast to all subscribers
#[derive(Clone, Debug)]
pub struct ClockTick {
    /// Monotonically increasing event number
    pub seq: u64,
    /// Beat position; negative during the count-in
    pub beat: f64,
    pub state: ClockState,
    /// Timestamp of this tick on the shared epoch timeline
    pub now_ms: f64,
    /// True when this tick reports a state-machine edge; such ticks are
    /// delivered immediately, never throttled
    pub is_edge: bool,
}

/// Commands that can be sent to the clock thread
#[derive(Debug)]
enum TransportCommand {
    Start,
    Pause,
    Resume,
    Complete,
    Stop,
    AddSubscriber(Sender<ClockTick>),
    Shutdown,
}

/// Handle to the clock thread
pub struct TransportClock {
    command_tx: Sender<TransportCommand>,
    /// Current state encoded for lock-free reads
    state: Arc<AtomicU8>,
    /// Current beat as f64 bits
    beat_bits: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl TransportClock {
    /// Spawn the clock thread for one exercise tempo
    pub fn new(tempo_bpm: f64, count_in_beats: f64, epoch: MonotonicEpoch) -> Self {
        let (command_tx, command_rx) = unbounded();
        let state = Arc::new(AtomicU8::new(encode_state(ClockState::Idle)));
        let beat_bits = Arc::new(AtomicU64::new((-count_in_beats).to_bits()));

        let state_clone = state.clone();
        let beat_clone = beat_bits.clone();
        let thread = thread::spawn(move || {
            ClockThread::new(
                BeatClock::new(tempo_bpm, count_in_beats),
                epoch,
                command_rx,
                state_clone,
                beat_clone,
            )
            .run();
        });

        TransportClock {
            command_tx,
            state,
            beat_bits,
            thread: Some(thread),
        }
    }

    /// Create a new subscriber that will receive tick events
    pub fn subscribe(&self) -> Receiver<ClockTick> {
        let (tx, rx) = unbounded();
        let _ = self.command_tx.send(TransportCommand::AddSubscriber(tx));
        rx
    }

    /// Begin the count-in
    pub fn start(&self) {
        let _ = self.command_tx.send(TransportCommand::Start);
    }

    pub fn pause(&self) {
        let _ = self.command_tx.send(TransportCommand::Pause);
    }

    pub fn resume(&self) {
        let _ = self.command_tx.send(TransportCommand::Resume);
    }

    /// Declare the attempt complete (Playing -> Completed)
    pub fn complete(&self) {
        let _ = self.command_tx.send(TransportCommand::Complete);
    }

    /// Return to Idle, invalidating any pending completion
    pub fn stop(&self) {
        let _ = self.command_tx.send(TransportCommand::Stop);
    }

    /// Last published state (lock-free)
    pub fn state(&self) -> ClockState {
        decode_state(self.state.load(Ordering::Relaxed))
    }

    /// Last published beat position (lock-free)
    pub fn beat(&self) -> f64 {
        f64::from_bits(self.beat_bits.load(Ordering::Relaxed))
    }
}

impl Drop for TransportClock {
    fn drop(&mut self) {
        let _ = self.command_tx.send(TransportCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn encode_state(state: ClockState) -> u8 {
    match state {
        ClockState::Idle => 0,
        ClockState::CountIn => 1,
        ClockState::Playing => 2,
        ClockState::Paused => 3,
        ClockState::Completed => 4,
    }
}

fn decode_state(value: u8) -> ClockState {
    match value {
        1 => ClockState::CountIn,
        2 => ClockState::Playing,
        3 => ClockState::Paused,
        4 => ClockState::Completed,
        _ => ClockState::Idle,
    }
}

/// Internal clock thread
struct ClockThread {
    clock: BeatClock,
    epoch: MonotonicEpoch,
    command_rx: Receiver<TransportCommand>,
    subscribers: Vec<Sender<ClockTick>>,
    state_out: Arc<AtomicU8>,
    beat_out: Arc<AtomicU64>,
    seq: u64,
    last_notified_ms: f64,
    last_state: ClockState,
}

impl ClockThread {
    fn new(
        clock: BeatClock,
        epoch: MonotonicEpoch,
        command_rx: Receiver<TransportCommand>,
        state_out: Arc<AtomicU8>,
        beat_out: Arc<AtomicU64>,
    ) -> Self {
        Self {
            clock,
            epoch,
            command_rx,
            subscribers: Vec::new(),
            state_out,
            beat_out,
            seq: 0,
            last_notified_ms: f64::NEG_INFINITY,
            last_state: ClockState::Idle,
        }
    }

    fn run(&mut self) {
        loop {
            let ticking = matches!(
                self.clock.state(),
                ClockState::CountIn | ClockState::Playing
            );

            if ticking {
                // Drain pending commands without blocking the cadence
                loop {
                    match self.command_rx.try_recv() {
                        Ok(cmd) => {
                            if self.handle_command(cmd) {
                                return;
                            }
                        }
                        Err(_) => break,
                    }
                }

                let now = self.epoch.now_ms();
                let state = self.clock.tick(now);
                self.publish(now);

                let is_edge = state != self.last_state;
                if is_edge || now - self.last_notified_ms >= NOTIFY_INTERVAL_MS {
                    self.emit(now, is_edge);
                }
                self.last_state = state;

                thread::sleep(TICK_INTERVAL);
            } else {
                // Blocking wait for commands while Idle/Paused/Completed
                match self.command_rx.recv() {
                    Ok(cmd) => {
                        if self.handle_command(cmd) {
                            return;
                        }
                    }
                    Err(_) => return, // Channel closed
                }
            }
        }
    }

    /// Handle a command, returns true on shutdown
    fn handle_command(&mut self, cmd: TransportCommand) -> bool {
        let now = self.epoch.now_ms();
        let result = match cmd {
            TransportCommand::Start => self.clock.start(now),
            TransportCommand::Pause => self.clock.pause(now),
            TransportCommand::Resume => self.clock.resume(now),
            TransportCommand::Complete => self.clock.complete(now),
            TransportCommand::Stop => {
                self.clock.stop();
                Ok(())
            }
            TransportCommand::AddSubscriber(tx) => {
                self.subscribers.push(tx);
                return false;
            }
            TransportCommand::Shutdown => return true,
        };

        match result {
            Ok(()) => {
                // Every successful transition is an edge: report immediately
                self.publish(now);
                self.emit(now, true);
                self.last_state = self.clock.state();
            }
            Err(e) => eprintln!("transport clock: {}", e),
        }
        false
    }

    /// Update the lock-free mirrors
    fn publish(&self, now_ms: f64) {
        self.state_out
            .store(encode_state(self.clock.state()), Ordering::Relaxed);
        self.beat_out
            .store(self.clock.beat_at(now_ms).to_bits(), Ordering::Relaxed);
    }

    /// Broadcast to all subscribers, dropping disconnected ones
    fn emit(&mut self, now_ms: f64, is_edge: bool) {
        self.seq += 1;
        let tick = ClockTick {
            seq: self.seq,
            beat: self.clock.beat_at(now_ms),
            state: self.clock.state(),
            now_ms,
            is_edge,
        };
        self.subscribers.retain(|tx| tx.send(tick.clone()).is_ok());
        self.last_notified_ms = now_ms;
    }
}
