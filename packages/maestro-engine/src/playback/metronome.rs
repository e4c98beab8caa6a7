//! Metronome click track.
//!
//! One click per beat at the metronome tempo. The first beat of every bar is accented
//! with a higher pitch, where the bar length comes from the meter numerator.

use serde::Serialize;

use crate::duration::DurationCategory;
use crate::header::Meter;
use crate::parser::TimedNote;
use crate::pitch::{NotePitch, SpelledPitch};
use crate::theory::{Accidental, NoteLetter};

pub const MIN_BPM: u32 = 40;
pub const MAX_BPM: u32 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metronome {
    bpm: u32,
    beats_per_bar: u32,
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new(120)
    }
}

impl Metronome {
    /// A metronome in 4/4; `bpm` is clamped to 40..=240
    pub fn new(bpm: u32) -> Self {
        Self {
            bpm: bpm.clamp(MIN_BPM, MAX_BPM),
            beats_per_bar: 4,
        }
    }

    pub fn with_meter(mut self, meter: &Meter) -> Self {
        self.beats_per_bar = meter.beats.max(1);
        self
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn is_accented(&self, beat: u32) -> bool {
        beat % self.beats_per_bar == 0
    }

    /// C3 on the downbeat, G2 otherwise
    pub fn click_pitch(&self, beat: u32) -> SpelledPitch {
        if self.is_accented(beat) {
            SpelledPitch::new(NoteLetter::C, Accidental::Natural, 3)
        } else {
            SpelledPitch::new(NoteLetter::G, Accidental::Natural, 2)
        }
    }

    /// `beats` sixteenth-note clicks, one on every beat
    pub fn track(&self, beats: u32) -> Vec<TimedNote> {
        (0..beats)
            .map(|beat| TimedNote {
                pitch: NotePitch::Tone(self.click_pitch(beat)),
                duration_category: DurationCategory::Sixteenth,
                duration_beats: DurationCategory::Sixteenth.beats(),
                start_beat: f64::from(beat),
            })
            .collect()
    }

    /// Enough clicks to cover `total_beats`
    pub fn track_covering(&self, total_beats: f64) -> Vec<TimedNote> {
        if !total_beats.is_finite() || total_beats <= 0.0 {
            return Vec::new();
        }
        self.track(total_beats.ceil() as u32)
    }

    /// Position within the bar, counted from zero, after `elapsed_secs` of clicking
    pub fn current_beat(&self, elapsed_secs: f64) -> u32 {
        if !elapsed_secs.is_finite() || elapsed_secs <= 0.0 {
            return 0;
        }
        let beats = (elapsed_secs * f64::from(self.bpm) / 60.0).floor() as u64;
        (beats % u64::from(self.beats_per_bar)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(notes: &[TimedNote]) -> Vec<String> {
        notes.iter().map(|n| n.pitch.to_string()).collect()
    }

    #[test]
    fn test_downbeat_accent_follows_meter() {
        let common = Metronome::new(100);
        assert_eq!(
            names(&common.track(6)),
            vec!["C3", "G2", "G2", "G2", "C3", "G2"]
        );

        let waltz = Metronome::new(100).with_meter(&"3/4".parse().unwrap());
        assert_eq!(
            names(&waltz.track(7)),
            vec!["C3", "G2", "G2", "C3", "G2", "G2", "C3"]
        );
    }

    #[test]
    fn test_clicks_fall_on_every_beat() {
        let notes = Metronome::default().track(3);
        let starts: Vec<f64> = notes.iter().map(|n| n.start_beat).collect();
        assert_eq!(starts, vec![0.0, 1.0, 2.0]);
        assert!(notes
            .iter()
            .all(|n| n.duration_category == DurationCategory::Sixteenth));
    }

    #[test]
    fn test_bpm_is_clamped() {
        assert_eq!(Metronome::new(10).bpm(), 40);
        assert_eq!(Metronome::new(500).bpm(), 240);
        let mut metronome = Metronome::new(90);
        metronome.set_bpm(300);
        assert_eq!(metronome.bpm(), 240);
    }

    #[test]
    fn test_current_beat_wraps_at_bar() {
        let metronome = Metronome::new(120);
        assert_eq!(metronome.current_beat(0.0), 0);
        assert_eq!(metronome.current_beat(0.6), 1);
        assert_eq!(metronome.current_beat(1.9), 3);
        assert_eq!(metronome.current_beat(2.0), 0);
        assert_eq!(metronome.current_beat(f64::NAN), 0);
    }

    #[test]
    fn test_track_covering_rounds_up() {
        let metronome = Metronome::default();
        assert_eq!(metronome.track_covering(4.5).len(), 5);
        assert!(metronome.track_covering(0.0).is_empty());
    }
}
