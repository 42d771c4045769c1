//! Scripted demo: load an exercise, run one attempt, print the score
//!
//! Simulates a slightly imperfect player against a four-note exercise. Works
//! without an audio device too - the engine degrades to silence and the
//! attempt is still scored.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;

use etude::core::pitch_name;
use etude::core::types::{EngineConfig, Exercise, InputSource, PlayedNoteEvent};
use etude::{MonotonicEpoch, PracticeSession, SynthEngine};

const EXERCISE_JSON: &str = r#"{
    "title": "C major opening",
    "tempo_bpm": 120.0,
    "count_in_beats": 2.0,
    "key_signature": "C major",
    "notes": [
        { "pitch": 60, "start_beat": 0.0, "duration_beats": 1.0 },
        { "pitch": 62, "start_beat": 1.0, "duration_beats": 1.0 },
        { "pitch": 64, "start_beat": 2.0, "duration_beats": 1.0 },
        { "pitch": 65, "start_beat": 3.0, "duration_beats": 1.0 }
    ]
}"#;

fn main() -> Result<()> {
    let exercise: Exercise = serde_json::from_str(EXERCISE_JSON)?;
    println!(
        "{} {} at {} BPM, {} notes",
        "Exercise:".bold(),
        exercise.title,
        exercise.tempo_bpm,
        exercise.notes.len()
    );

    let epoch = MonotonicEpoch::new();
    let mut engine = SynthEngine::new(EngineConfig::default(), epoch);
    match engine.initialize() {
        Ok(()) => {
            let status = engine.status();
            println!(
                "Audio ready, estimated output latency {:.1} ms",
                status.output_latency_ms
            );
        }
        Err(e) => {
            println!("{} {} (scoring continues silently)", "No audio:".yellow(), e);
        }
    }

    let (session, scores) =
        PracticeSession::spawn(exercise.clone(), engine.handle(), epoch, Some(82.0));
    session.begin();

    // Count-in, then the scripted performance: each note held for most of
    // its beat, with whatever timing jitter the sleeps introduce
    let ms_per_beat = exercise.ms_per_beat();
    thread::sleep(Duration::from_millis(
        (exercise.count_in_beats * ms_per_beat) as u64,
    ));

    for note in &exercise.notes {
        println!("  playing {}", pitch_name(note.pitch));
        session.note_event(PlayedNoteEvent::on(
            note.pitch,
            0.8,
            epoch.now_ms(),
            InputSource::Controller,
        ));
        thread::sleep(Duration::from_millis((ms_per_beat * 0.8) as u64));
        session.note_event(PlayedNoteEvent::off(
            note.pitch,
            epoch.now_ms(),
            InputSource::Controller,
        ));
        thread::sleep(Duration::from_millis((ms_per_beat * 0.2) as u64));
    }

    let score = scores
        .recv_timeout(Duration::from_secs(10))
        .map_err(|_| anyhow::anyhow!("no score emitted"))?;

    println!();
    println!("{}", "=== Attempt score ===".bold());
    println!("overall      {:>6.1}", score.overall);
    println!("accuracy     {:>6.1}", score.breakdown.accuracy);
    println!("timing       {:>6.1}", score.breakdown.timing);
    println!("completeness {:>6.1}", score.breakdown.completeness);
    println!("extras       {:>6.1}", score.breakdown.extra_note_penalty);
    println!("duration     {:>6.1}", score.breakdown.duration_accuracy);
    println!(
        "stars        {}",
        "*".repeat(score.stars as usize).yellow().bold()
    );
    println!(
        "result       {}",
        if score.is_passed {
            "PASSED".green().bold()
        } else {
            "NOT PASSED".red().bold()
        }
    );
    if score.is_new_high_score {
        println!("{}", "new high score!".cyan());
    }

    session.shutdown();
    Ok(())
}
