//! Integration tests for the Maestro engine
//!
//! Exercises the public API end to end: notation in, timed notes, documents and playback
//! plans out.

use approx::assert_relative_eq;
use maestro::duration::{duration_from_length, DURATION_TABLE};
use maestro::playback::{Instrument, PlaybackPlan};
use maestro::{
    combine_parts, parse_abc, parse_abc_with_durations, parse_solfa, resolve_pitch,
    transpose_abc, transpose_melody, ComponentDirective, KeySignature, PitchConvention, Song,
    SolfaOptions, SpelledPitch, UnitLength, VoicePart,
};
use pretty_assertions::assert_eq;

#[test]
fn test_soprano_scale_in_eighths() {
    let voice = parse_abc("X:1\nL:1/8\nK:C\nC D E F G A B c", VoicePart::Soprano);

    assert_eq!(
        voice.pitches(),
        vec!["C5", "D5", "E5", "F5", "G5", "A5", "B5", "C6"]
    );
    for (i, note) in voice.notes.iter().enumerate() {
        assert_relative_eq!(note.duration_beats, 0.5);
        assert_relative_eq!(note.start_beat, i as f64 * 0.5);
    }
    assert!(voice.diagnostics.is_empty());
}

#[test]
fn test_melody_transposition_up_a_tone() {
    assert_eq!(transpose_melody("C4 E4 G4", "C", "D"), "D4 F#4 A4");
}

#[test]
fn test_solfa_dash_extends_previous_note() {
    let voice = parse_solfa("d - r", &SolfaOptions::default());

    assert_eq!(voice.pitches(), vec!["C4", "D4"]);
    assert_relative_eq!(voice.notes[0].duration_beats, 2.0);
    assert_relative_eq!(voice.notes[1].duration_beats, 1.0);
    assert_relative_eq!(voice.notes[1].start_beat, 2.0);
}

#[test]
fn test_rest_handling_differs_between_parsers() {
    let full = parse_abc("C4 z4 D4", VoicePart::Alto);
    assert_eq!(full.notes.len(), 2);
    assert_relative_eq!(full.notes[1].start_beat - full.notes[0].end_beat(), 2.0);

    let simple = parse_abc_with_durations("C4 z4 D4");
    assert_eq!(simple.notes.len(), 3);
    assert!(simple.notes[1].pitch.is_rest());
    assert_eq!(simple.notes[1].pitch.to_string(), "rest");
}

#[test]
fn test_every_duration_round_trips() {
    for unit in [UnitLength::default(), UnitLength::QUARTER] {
        for entry in DURATION_TABLE {
            let multiplier = entry.beats() / (unit.fraction() * 4.0);
            let resolved = duration_from_length(multiplier, unit);
            assert_eq!(resolved.category, entry);
            assert_relative_eq!(resolved.beats, entry.beats(), epsilon = 1e-9);
        }
    }
}

#[test]
fn test_notes_follow_each_other_without_gaps() {
    let abc = "X:1\nL:1/8\nK:D\nA2 B/ c/ d3/2 e/ | (3fed c>B A2- | A4 ^G2 =F2 |]";
    for part in VoicePart::ALL {
        let voice = parse_abc(abc, part);
        assert!(!voice.is_empty());
        for pair in voice.notes.windows(2) {
            assert_relative_eq!(pair[1].start_beat, pair[0].end_beat(), epsilon = 1e-9);
        }
        assert_relative_eq!(voice.total_beats, 9.5, epsilon = 1e-9);
    }
}

#[test]
fn test_transposition_round_trip_restores_pitches() {
    let melody = "C4 Eb4 G4 Bb3 F#5 A";
    for (from, to) in [("C", "D"), ("C", "B"), ("G", "Eb"), ("F", "F#")] {
        let there = transpose_melody(melody, from, to);
        let back = transpose_melody(&there, to, from);

        let midi = |list: &str| -> Vec<i32> {
            list.split_whitespace()
                .map(|name| {
                    let name = if name.ends_with(|c: char| c.is_ascii_digit()) {
                        name.to_string()
                    } else {
                        format!("{}4", name)
                    };
                    name.parse::<SpelledPitch>().unwrap().midi()
                })
                .collect()
        };
        assert_eq!(midi(&back), midi(melody), "{} -> {} -> {}", from, to, from);
    }
}

#[test]
fn test_abc_transposition_round_trip() {
    let abc = "X:1\nL:1/4\nK:G\nG A B c | d2 ^c d |]";
    let there = transpose_abc(abc, "G", "Bb");
    assert!(there.contains("K:Bb"));
    let back = transpose_abc(&there, "Bb", "G");

    let original = parse_abc_with_durations(abc);
    let restored = parse_abc_with_durations(&back);
    assert_eq!(restored.pitches(), original.pitches());
}

#[test]
fn test_octave_clamping_stays_in_range() {
    let key = KeySignature::default();
    for part in VoicePart::ALL {
        let range = part.range();
        for token in ["C,,,,", "C,", "C", "c", "c'", "c''''"] {
            let pitch = resolve_pitch(token, &key, part, PitchConvention::VoiceRelative).unwrap();
            assert!(
                (range.min..=range.max).contains(&pitch.octave),
                "{} in {} resolved to {}",
                token,
                part,
                pitch
            );
        }
    }
}

#[test]
fn test_combination_arity() {
    let empty = Song::new("s", "Song", "C", 100, "4/4");
    assert_eq!(combine_parts(&empty), "");

    let solo = empty
        .clone()
        .with_part(VoicePart::Alto, "X:1\nL:1/4\nK:C\nE F G |]");
    assert_eq!(combine_parts(&solo), "X:1\nL:1/4\nK:C\nE F G |]");

    let full = VoicePart::ALL
        .into_iter()
        .fold(empty, |song, part| song.with_part(part, "L:1/4\nK:C\nC D E F |]"));
    let combined = combine_parts(&full);
    assert_eq!(combined.matches("\nV:").count(), 4);
    assert!(combined.contains("%%staves {S A} {T B}"));
}

#[test]
fn test_song_to_playback_plan() {
    let song = Song::new("hymn", "Hymn", "D", 60, "4/4")
        .with_part(VoicePart::Soprano, "L:1/4\nK:D\nf e d2 |]")
        .with_part(VoicePart::Bass, "L:1/4\nK:D\nD,2 A,,2 |]");

    let soprano = song.voice_notes(VoicePart::Soprano).notes;
    let bass = song.voice_notes(VoicePart::Bass).notes;
    let plan = PlaybackPlan::build(
        &[
            (Instrument::Voice(VoicePart::Soprano), soprano.as_slice()),
            (Instrument::Voice(VoicePart::Bass), bass.as_slice()),
            (Instrument::Accompaniment, bass.as_slice()),
        ],
        f64::from(song.tempo),
        0.5,
    );

    assert_eq!(plan.triggers.len(), 7);
    assert_relative_eq!(plan.end_secs, 4.0);
    assert_relative_eq!(plan.stop_at_secs, 4.5);
    assert_eq!(plan.triggers[0].pitch.to_string(), "F#6");
}

#[test]
fn test_directive_to_notes() {
    let directive = ComponentDirective::from_json(
        r#"{"component_type":"composer","props":{"abc_notation":"X:1\nM:6/8\nL:1/8\nK:F\nF2 B c3","key":"F"}}"#,
    )
    .unwrap();
    let voice = directive.props.playable_notes();
    assert_eq!(voice.pitches(), vec!["F4", "A#4", "C5"]);
    assert_relative_eq!(voice.total_beats, 3.0);
}
