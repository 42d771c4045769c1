//! Note types shared by the matcher, scorer and synthesis engine
//!
//! Pitches are MIDI-style semitone ids (60 = Middle C, 69 = A4). Played
//! events carry monotonic millisecond timestamps in the same clock domain as
//! the beat clock's epoch.

/// Which hand a notated note belongs to (piano-style exercises)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hand {
    Left,
    Right,
}

/// One note of the reference passage
///
/// Immutable once the exercise is loaded; the core only ever reads these.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpectedNote {
    /// Semitone id (0-127, MIDI numbering)
    pub pitch: u8,
    /// Onset position in beats from beat 0 (count-in is negative territory)
    pub start_beat: f64,
    /// Notated length in beats
    pub duration_beats: f64,
    /// Optional hand annotation (cosmetic to the core)
    #[cfg_attr(feature = "serde", serde(default))]
    pub hand: Option<Hand>,
    /// Optional fingering annotation (cosmetic to the core)
    #[cfg_attr(feature = "serde", serde(default))]
    pub fingering: Option<u8>,
    /// Optional notes are excluded from completeness requirements
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_optional: bool,
}

impl ExpectedNote {
    /// Create a plain (non-optional, unannotated) expected note
    pub fn new(pitch: u8, start_beat: f64, duration_beats: f64) -> Self {
        Self {
            pitch,
            start_beat,
            duration_beats,
            hand: None,
            fingering: None,
            is_optional: false,
        }
    }

    /// Beat position where this note ends
    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.duration_beats
    }
}

/// Kind of a played event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteEventKind {
    On,
    Off,
}

/// Where a played event came from
///
/// Touch input carries a known extra latency and is compensated during
/// matching; controller input is taken at face value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputSource {
    Controller,
    Touch,
}

/// One timestamped event from the player
///
/// Appended to an append-only per-attempt log. The only mutation the core
/// performs is backfilling `duration_ms` on an on-event when its matching
/// off-event arrives.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlayedNoteEvent {
    pub kind: NoteEventKind,
    /// Semitone id (0-127)
    pub pitch: u8,
    /// Normalized velocity (0.0-1.0)
    pub velocity: f32,
    /// Monotonic milliseconds, same domain as the beat clock epoch
    pub timestamp_ms: f64,
    pub source: InputSource,
    /// Held length in ms, backfilled when the matching off-event arrives
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration_ms: Option<f64>,
}

impl PlayedNoteEvent {
    /// Convenience constructor for an on-event
    pub fn on(pitch: u8, velocity: f32, timestamp_ms: f64, source: InputSource) -> Self {
        Self {
            kind: NoteEventKind::On,
            pitch,
            velocity,
            timestamp_ms,
            source,
            duration_ms: None,
        }
    }

    /// Convenience constructor for an off-event
    pub fn off(pitch: u8, timestamp_ms: f64, source: InputSource) -> Self {
        Self {
            kind: NoteEventKind::Off,
            pitch,
            velocity: 0.0,
            timestamp_ms,
            source,
            duration_ms: None,
        }
    }
}

/// Convert a semitone id to frequency in Hz (equal temperament, A4 = 440)
pub fn pitch_to_frequency(pitch: u8) -> f64 {
    440.0 * 2f64.powf((pitch as f64 - 69.0) / 12.0)
}

/// Human-readable name for a semitone id, e.g. 60 -> "C4"
pub fn pitch_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_to_frequency_reference_points() {
        // A4 = 440Hz
        assert!((pitch_to_frequency(69) - 440.0).abs() < 1e-9);
        // A5 = 880Hz
        assert!((pitch_to_frequency(81) - 880.0).abs() < 1e-9);
        // Middle C ~ 261.63Hz
        assert!((pitch_to_frequency(60) - 261.6255653).abs() < 1e-3);
    }

    #[test]
    fn test_pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(69), "A4");
        assert_eq!(pitch_name(61), "C#4");
        assert_eq!(pitch_name(21), "A0");
    }

    #[test]
    fn test_expected_note_end_beat() {
        let note = ExpectedNote::new(60, 2.0, 1.5);
        assert_eq!(note.end_beat(), 3.5);
    }

    #[test]
    fn test_event_constructors() {
        let on = PlayedNoteEvent::on(64, 0.8, 1234.0, InputSource::Touch);
        assert_eq!(on.kind, NoteEventKind::On);
        assert_eq!(on.duration_ms, None);

        let off = PlayedNoteEvent::off(64, 1734.0, InputSource::Touch);
        assert_eq!(off.kind, NoteEventKind::Off);
        assert_eq!(off.velocity, 0.0);
    }
}
