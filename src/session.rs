//! Practice session: the composition root of an attempt
//!
//! Wires the transport clock, the synthesis engine and the note matcher
//! together. Clock ticks and input events are serialized through one
//! `select!` loop, so the judgment list and the voice table are only ever
//! mutated from a single timeline - no cross-locking between the audio path
//! and the scoring path.
//!
//! Per input event: the voice pool is triggered first (sound never waits on
//! scoring), then the event is forwarded to the matcher iff the clock is in
//! Playing. When a completion condition fires the session closes open note
//! durations, finalizes the matcher, scores the attempt and emits the result
//! exactly once.

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::thread;

use etude_core::clock::ClockState;
use etude_core::scorer;
use etude_core::types::{
    AttemptScore, CompletionPolicy, Exercise, NoteEventKind, PlayedNoteEvent,
};
use etude_core::NoteMatcher;

use crate::audio::SynthHandle;
use crate::clock::{ClockTick, TransportClock};
use crate::time::MonotonicEpoch;

/// Commands that can be sent to the session thread
#[derive(Debug)]
pub enum SessionCommand {
    /// Start (or restart) an attempt: fresh matcher, clock into count-in
    Begin,
    /// A raw input event from a controller or touch surface
    NoteEvent(PlayedNoteEvent),
    Pause,
    Resume,
    /// Abandon the attempt without scoring it
    Stop,
    Shutdown,
}

/// Handle for driving a running session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn begin(&self) {
        let _ = self.command_tx.send(SessionCommand::Begin);
    }

    /// Feed one input event (sound immediately, scoring while Playing)
    pub fn note_event(&self, event: PlayedNoteEvent) {
        let _ = self.command_tx.send(SessionCommand::NoteEvent(event));
    }

    pub fn pause(&self) {
        let _ = self.command_tx.send(SessionCommand::Pause);
    }

    pub fn resume(&self) {
        let _ = self.command_tx.send(SessionCommand::Resume);
    }

    pub fn stop(&self) {
        let _ = self.command_tx.send(SessionCommand::Stop);
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }
}

pub struct PracticeSession;

impl PracticeSession {
    /// Spawn a session thread for one exercise
    ///
    /// Returns the driving handle and the channel on which the final
    /// `AttemptScore` of each attempt is delivered. The engine handle may be
    /// not-ready (audio init failed); the session then scores silently.
    pub fn spawn(
        exercise: Exercise,
        synth: SynthHandle,
        epoch: MonotonicEpoch,
        previous_high: Option<f64>,
    ) -> (SessionHandle, Receiver<AttemptScore>) {
        let (command_tx, command_rx) = unbounded();
        let (score_tx, score_rx) = unbounded();

        thread::spawn(move || {
            let clock = TransportClock::new(exercise.tempo_bpm, exercise.count_in_beats, epoch);
            let tick_rx = clock.subscribe();
            SessionLoop {
                exercise,
                synth,
                epoch,
                clock,
                tick_rx,
                command_rx,
                score_tx,
                previous_high,
                matcher: None,
                clock_state: ClockState::Idle,
                attempt_done: false,
            }
            .run();
        });

        (SessionHandle { command_tx }, score_rx)
    }
}

/// Internal session loop running in its own thread
struct SessionLoop {
    exercise: Exercise,
    synth: SynthHandle,
    epoch: MonotonicEpoch,
    clock: TransportClock,
    tick_rx: Receiver<ClockTick>,
    command_rx: Receiver<SessionCommand>,
    score_tx: Sender<AttemptScore>,
    previous_high: Option<f64>,
    /// Present while an attempt is live or just finished
    matcher: Option<NoteMatcher>,
    /// Last observed clock state; Pause/Stop update it synchronously so the
    /// barrier holds before the clock thread's edge tick arrives
    clock_state: ClockState,
    attempt_done: bool,
}

impl SessionLoop {
    fn run(mut self) {
        loop {
            select! {
                recv(self.command_rx) -> msg => match msg {
                    Ok(cmd) => {
                        if self.handle_command(cmd) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(self.tick_rx) -> msg => match msg {
                    Ok(tick) => self.process_tick(&tick),
                    Err(_) => break,
                },
            }
        }
        self.synth.release_all();
        self.clock.stop();
    }

    /// Handle a command, returns true on shutdown
    fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Begin => {
                // Restarting mid-attempt discards the previous one
                self.clock.stop();
                self.synth.release_all();
                self.matcher = Some(NoteMatcher::new(&self.exercise));
                self.attempt_done = false;
                self.clock_state = ClockState::Idle;
                self.clock.start();
            }
            SessionCommand::NoteEvent(event) => self.handle_event(event),
            SessionCommand::Pause => {
                if matches!(self.clock_state, ClockState::CountIn | ClockState::Playing) {
                    self.clock.pause();
                    // Hard barrier: silence and no further judgments until
                    // resume, even for events already queued behind us
                    self.clock_state = ClockState::Paused;
                    self.synth.release_all();
                    if let Some(matcher) = self.matcher.as_mut() {
                        matcher.close_open_durations(self.epoch.now_ms());
                    }
                }
            }
            SessionCommand::Resume => {
                if self.clock_state == ClockState::Paused {
                    self.clock.resume();
                    // Scoring stays gated until the clock's Playing edge
                }
            }
            SessionCommand::Stop => {
                self.clock.stop();
                self.clock_state = ClockState::Idle;
                self.synth.release_all();
                // The attempt is abandoned: no score is emitted
                self.matcher = None;
                self.attempt_done = false;
            }
            SessionCommand::Shutdown => return true,
        }
        false
    }

    fn handle_event(&mut self, event: PlayedNoteEvent) {
        // Audio first: sound must never wait on scoring. A not-ready engine
        // (no audio device) degrades to silence while scoring continues.
        if self.synth.is_ready() {
            match event.kind {
                NoteEventKind::On => {
                    let _ = self.synth.play_note(event.pitch, event.velocity);
                }
                NoteEventKind::Off => self.synth.release_note(event.pitch),
            }
        }

        if self.clock_state == ClockState::Playing && !self.attempt_done {
            if let Some(matcher) = self.matcher.as_mut() {
                matcher.on_event(event);
            }
        }
    }

    fn process_tick(&mut self, tick: &ClockTick) {
        self.clock_state = tick.state;

        if tick.state != ClockState::Playing {
            return;
        }
        if tick.is_edge {
            // Entering Playing (count-in done, or resumed): re-anchor the
            // matcher's epoch to the clock's current notion of beat 0
            let epoch_ms = tick.now_ms - tick.beat * self.exercise.ms_per_beat();
            if let Some(matcher) = self.matcher.as_mut() {
                matcher.set_epoch(epoch_ms);
            }
        }
        self.check_completion(tick);
    }

    fn check_completion(&mut self, tick: &ClockTick) {
        if self.attempt_done {
            return;
        }
        let Some(matcher) = self.matcher.as_ref() else {
            return;
        };

        let timed_out = tick.beat > self.exercise.timeout_beat();
        let early_exit = self.exercise.scoring.completion == CompletionPolicy::AllowEarlyExit
            && matcher.on_event_count() >= self.exercise.required_note_count()
            && tick.beat >= self.exercise.last_note_start_beat();

        if timed_out || early_exit {
            self.finalize(tick.now_ms);
        }
    }

    /// Close the attempt and emit its score exactly once
    fn finalize(&mut self, now_ms: f64) {
        let Some(matcher) = self.matcher.as_mut() else {
            return;
        };
        self.clock.complete();
        matcher.close_open_durations(now_ms);
        matcher.finalize();

        let score = scorer::score(&self.exercise, matcher.judgments(), self.previous_high);
        if self.score_tx.send(score).is_err() {
            eprintln!("practice session: score receiver dropped");
        }
        self.attempt_done = true;
    }
}
