//! Diatonic harmonization in parallel thirds.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::pitch::SpelledPitch;
use crate::theory::KeySignature;

static NOTE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Ga-g])(##|#|bb|b)?(\d)?$").unwrap());

/// The scale tone two letters above `pitch` in `key`
pub fn third_above(pitch: SpelledPitch, key: &KeySignature) -> SpelledPitch {
    let (letter, carry) = pitch.letter.step(2);
    SpelledPitch::new(
        letter,
        key.implied_accidental(letter),
        pitch.octave.saturating_add(carry as i8),
    )
}

/// Pair every note of a note list with the third above it, interleaved:
/// `C4 D4` in C becomes `C4 E4 D4 F4`.
///
/// Names without an octave sit in octave 4. Rests and anything unreadable are dropped.
pub fn harmonize_in_thirds(melody: &str, key: &KeySignature) -> String {
    melody
        .split_whitespace()
        .filter_map(|token| {
            let caps = NOTE_NAME.captures(token)?;
            let name = format!(
                "{}{}{}",
                caps[1].to_ascii_uppercase(),
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("4", |m| m.as_str())
            );
            match name.parse::<SpelledPitch>() {
                Ok(pitch) => Some(pitch),
                Err(err) => {
                    debug!(token, %err, "not harmonizing token");
                    None
                }
            }
        })
        .flat_map(|pitch| [pitch, third_above(pitch, key)])
        .map(|pitch| pitch.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
