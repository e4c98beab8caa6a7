//! Duration-aware single-line parser and the plain note-list reader.
//!
//! [`parse_abc_with_durations`] reads an ABC document the same way the full parser does but
//! keeps rests as explicit `rest` entries. It uses the standard octave convention without
//! voice clamping and spells every pitch with sharps or naturals, which is all the audio
//! trigger accepts.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::abc::{collect_events, fold_events, Context, Placement, RestPolicy};
use super::{Diagnostic, DiagnosticKind, ParsedVoice, TimedNote, Timeline};
use crate::duration::{NoteDuration, UnitLength};
use crate::lexer::tokenize_document;
use crate::pitch::{NotePitch, SpelledPitch};

static NOTE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Ga-g])(#|b)?(\d)?$").unwrap());

/// Parse a single-line ABC document, keeping rests as entries.
pub fn parse_abc_with_durations(abc: &str) -> ParsedVoice {
    if abc.trim().is_empty() {
        return ParsedVoice::default();
    }

    let mut diagnostics = Vec::new();
    let context = Context::from_document(
        abc,
        Placement::SharpsOnly,
        UnitLength::default(),
        &mut diagnostics,
    );
    let events = collect_events(&tokenize_document(abc), &context, &mut diagnostics);
    fold_events(events, RestPolicy::Entry, diagnostics)
}

/// Seconds from the first beat to the end of the last note at `tempo` quarter notes per minute
pub fn total_duration_seconds(notes: &[TimedNote], tempo: f64) -> f64 {
    if tempo <= 0.0 {
        return 0.0;
    }
    let end_beat = notes.iter().map(TimedNote::end_beat).fold(0.0, f64::max);
    end_beat * 60.0 / tempo
}

/// Read a whitespace-separated list such as `C4 E4 Bb3` as consecutive quarter notes.
///
/// A name without an octave digit sits in octave 4. Anything that is not a note name is
/// skipped with a diagnostic.
pub fn parse_note_list(melody: &str) -> ParsedVoice {
    let mut timeline = Timeline::new();

    for token in melody.split_whitespace() {
        let Some(caps) = NOTE_NAME.captures(token) else {
            debug!(token, "skipping non-note in melody");
            timeline.diagnose(
                Diagnostic::new(DiagnosticKind::SkippedToken, "not a note name").with_token(token),
            );
            continue;
        };
        let name = format!(
            "{}{}{}",
            caps[1].to_ascii_uppercase(),
            caps.get(2).map_or("", |m| m.as_str()),
            caps.get(3).map_or("4", |m| m.as_str())
        );
        match name.parse::<SpelledPitch>() {
            Ok(pitch) => timeline.push(
                NotePitch::Tone(pitch.to_sharp_spelling()),
                NoteDuration::from_beats(1.0),
            ),
            Err(err) => timeline.diagnose(
                Diagnostic::new(DiagnosticKind::SkippedToken, err.to_string()).with_token(token),
            ),
        }
    }

    timeline.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::DurationCategory;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn names(voice: &ParsedVoice) -> Vec<String> {
        voice.notes.iter().map(|n| n.pitch.to_string()).collect()
    }

    #[test]
    fn test_rests_become_entries() {
        let voice = parse_abc_with_durations("C4 z4 D4");
        assert_eq!(names(&voice), vec!["C4", "rest", "D4"]);
        assert_relative_eq!(voice.notes[1].start_beat, 2.0);
        assert_relative_eq!(voice.notes[1].duration_beats, 2.0);
        assert_relative_eq!(voice.notes[2].start_beat, 4.0);
        assert_eq!(voice.notes[1].duration_category, DurationCategory::Half);
    }

    #[test]
    fn test_pitches_fold_to_sharps() {
        let voice = parse_abc_with_durations("K:C\n_B _C ^B _e");
        assert_eq!(names(&voice), vec!["A#4", "B3", "C5", "D#5"]);
    }

    #[test]
    fn test_key_accidentals_apply() {
        let voice = parse_abc_with_durations("X:1\nK:F\nL:1/4\nB F c");
        assert_eq!(names(&voice), vec!["A#4", "F4", "C5"]);
        assert_relative_eq!(voice.total_beats, 3.0);
    }

    #[test]
    fn test_out_of_range_pitch_falls_back_to_middle_c() {
        let voice = parse_abc_with_durations("c'''''' D");
        assert_eq!(names(&voice), vec!["C4", "D4"]);
        assert_eq!(voice.diagnostics.len(), 1);
        assert_eq!(voice.diagnostics[0].kind, DiagnosticKind::FallbackPitch);
    }

    #[test]
    fn test_total_duration_seconds() {
        let voice = parse_abc_with_durations("L:1/4\nC D z2");
        assert_relative_eq!(total_duration_seconds(&voice.notes, 120.0), 2.0);
        assert_relative_eq!(total_duration_seconds(&voice.notes, 0.0), 0.0);
        assert_relative_eq!(total_duration_seconds(&[], 90.0), 0.0);
    }

    #[test]
    fn test_note_list() {
        let voice = parse_note_list("C4 e4  Bb3 hello G");
        assert_eq!(names(&voice), vec!["C4", "E4", "A#3", "G4"]);
        assert_relative_eq!(voice.notes[3].start_beat, 3.0);
        assert!(voice
            .notes
            .iter()
            .all(|n| n.duration_category == DurationCategory::Quarter));
        assert_eq!(voice.diagnostics.len(), 1);
        assert_eq!(voice.diagnostics[0].token.as_deref(), Some("hello"));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_abc_with_durations("").is_empty());
        assert!(parse_note_list("   ").is_empty());
    }
}
