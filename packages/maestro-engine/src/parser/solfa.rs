//! # Tonic Sol-fa Parser
//!
//! Reads movable-do text such as `d : - | r . m , f | s'` into timed notes.
//!
//! ## Tokens
//! - syllable (`d de r re ma m f fe s se la l ta t`): one pulse (a quarter note) unless a
//!   subdivision marker came directly before it. Trailing `'` raises an octave, trailing `,`
//!   lowers one.
//! - `.` half pulse, `,` quarter pulse, `'` triplet pulse: applies to the next token only
//! - `-`: lengthens the previous note by the pending subdivision (one pulse by default)
//! - `|` bar lines are removed and `:` beat separators act as spaces
//!
//! The pending subdivision resets after every consumed token, so a marker must sit right
//! before the syllable it modifies. A marker lost to an unrecognized token is reported as
//! [`DiagnosticKind::DroppedSubdivision`].
//!
//! ## Pitch
//! ```text
//! frequency = base(key) * 2^(steps / 12) * 2^octave
//! ```
//! and the frequency is rounded to the nearest equal-tempered note against A4 = 440 Hz.

use serde::Serialize;
use tracing::{debug, warn};

use super::{Diagnostic, DiagnosticKind, ParsedVoice, Timeline};
use crate::duration::NoteDuration;
use crate::pitch::{NotePitch, SpelledPitch};

/// Frequency of Do used for keys missing from [`KEY_BASE_FREQUENCIES`]
pub const DEFAULT_BASE_FREQUENCY: f64 = 261.63;

/// Frequency of Do per key. Keys from G upward sit in octave 3 to suit choir ranges.
pub const KEY_BASE_FREQUENCIES: [(&str, f64); 17] = [
    ("C", 261.63),
    ("C#", 277.18),
    ("Db", 277.18),
    ("D", 293.66),
    ("D#", 311.13),
    ("Eb", 311.13),
    ("E", 329.63),
    ("F", 349.23),
    ("F#", 369.99),
    ("Gb", 369.99),
    ("G", 196.00),
    ("G#", 207.65),
    ("Ab", 207.65),
    ("A", 220.00),
    ("A#", 233.08),
    ("Bb", 233.08),
    ("B", 246.94),
];

/// One chromatic sol-fa syllable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SolfaSyllable {
    pub syllable: &'static str,
    pub name: &'static str,
    /// Semitones above Do
    pub steps: i32,
}

const SYLLABLES: [SolfaSyllable; 14] = [
    SolfaSyllable { syllable: "d", name: "Do", steps: 0 },
    SolfaSyllable { syllable: "de", name: "De", steps: 1 },
    SolfaSyllable { syllable: "r", name: "Ray", steps: 2 },
    SolfaSyllable { syllable: "re", name: "Re", steps: 3 },
    SolfaSyllable { syllable: "ma", name: "Ma", steps: 3 },
    SolfaSyllable { syllable: "m", name: "Me", steps: 4 },
    SolfaSyllable { syllable: "f", name: "Fah", steps: 5 },
    SolfaSyllable { syllable: "fe", name: "Fe", steps: 6 },
    SolfaSyllable { syllable: "s", name: "Soh", steps: 7 },
    SolfaSyllable { syllable: "se", name: "Se", steps: 8 },
    SolfaSyllable { syllable: "la", name: "La", steps: 8 },
    SolfaSyllable { syllable: "l", name: "Lah", steps: 9 },
    SolfaSyllable { syllable: "ta", name: "Ta", steps: 10 },
    SolfaSyllable { syllable: "t", name: "Te", steps: 11 },
];

/// Every syllable the parser understands, in chromatic order
pub fn syllables() -> Vec<SolfaSyllable> {
    SYLLABLES.to_vec()
}

fn lookup(syllable: &str) -> Option<&'static SolfaSyllable> {
    let lower = syllable.to_ascii_lowercase();
    SYLLABLES.iter().find(|entry| entry.syllable == lower)
}

/// Frequency of Do in the given key
pub fn key_base_frequency(root_key: &str) -> f64 {
    let key = root_key.trim();
    KEY_BASE_FREQUENCIES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, freq)| *freq)
        .unwrap_or_else(|| {
            warn!(key, "no sol-fa base frequency for key, using C");
            DEFAULT_BASE_FREQUENCY
        })
}

/// Frequency of a syllable in a key, shifted by whole octaves.
/// Returns `None` for an unknown syllable.
pub fn solfa_to_frequency(syllable: &str, root_key: &str, octave_shift: i32) -> Option<f64> {
    let entry = lookup(syllable)?;
    let frequency = key_base_frequency(root_key) * 2f64.powf(entry.steps as f64 / 12.0);
    Some(frequency * 2f64.powi(octave_shift))
}

/// Nearest equal-tempered pitch (sharp spelling). Non-positive frequencies give middle C.
pub fn frequency_to_note_name(frequency: f64) -> SpelledPitch {
    if frequency <= 0.0 || !frequency.is_finite() {
        return SpelledPitch::MIDDLE_C;
    }
    let midi = (12.0 * (frequency / 440.0).log2() + 69.0).round() as i32;
    SpelledPitch::from_midi(midi)
}

/// Options for [`parse_solfa`]
#[derive(Debug, Clone, PartialEq)]
pub struct SolfaOptions {
    pub root_key: String,
    /// Octave shift applied to every syllable before its own `'` and `,` marks
    pub default_octave: i32,
}

impl Default for SolfaOptions {
    fn default() -> Self {
        Self {
            root_key: "C".to_string(),
            default_octave: 0,
        }
    }
}

impl SolfaOptions {
    pub fn in_key(root_key: impl Into<String>) -> Self {
        Self {
            root_key: root_key.into(),
            ..Self::default()
        }
    }
}

fn subdivision(token: &str) -> Option<f64> {
    match token {
        "." => Some(0.5),
        "," => Some(0.25),
        "'" => Some(1.0 / 3.0),
        _ => None,
    }
}

/// Split trailing octave marks off a syllable: `'` raises, `,` lowers.
fn split_octave_marks(token: &str) -> (&str, i32) {
    let mut shift = 0;
    let mut syllable = token;
    while let Some(rest) = syllable.strip_suffix('\'') {
        shift += 1;
        syllable = rest;
    }
    while let Some(rest) = syllable.strip_suffix(',') {
        shift -= 1;
        syllable = rest;
    }
    (syllable, shift)
}

/// Parse a sol-fa string into timed notes.
pub fn parse_solfa(solfa: &str, options: &SolfaOptions) -> ParsedVoice {
    let cleaned = solfa.replace('|', "").replace(':', " ");
    let mut timeline = Timeline::new();
    let mut pending = 1.0;

    for token in cleaned.split_whitespace() {
        if let Some(beats) = subdivision(token) {
            pending = beats;
            continue;
        }

        let beats = std::mem::replace(&mut pending, 1.0);

        if token == "-" {
            if !timeline.extend_last(beats) {
                debug!("extension with no note before it");
                timeline.diagnose(
                    Diagnostic::new(DiagnosticKind::SkippedToken, "extension with no note before it")
                        .with_token(token),
                );
            }
            continue;
        }

        let (syllable, shift) = split_octave_marks(token);
        let Some(frequency) = solfa_to_frequency(syllable, &options.root_key, options.default_octave + shift)
        else {
            debug!(token, "skipping unknown sol-fa token");
            timeline.diagnose(
                Diagnostic::new(DiagnosticKind::SkippedToken, "unknown sol-fa syllable")
                    .with_token(token),
            );
            if beats != 1.0 {
                timeline.diagnose(
                    Diagnostic::new(
                        DiagnosticKind::DroppedSubdivision,
                        format!("subdivision of {:.3} beats was consumed by an unknown token", beats),
                    )
                    .with_token(token),
                );
            }
            continue;
        };

        timeline.push(
            NotePitch::Tone(frequency_to_note_name(frequency)),
            NoteDuration::from_beats(beats),
        );
    }

    timeline.finish()
}
