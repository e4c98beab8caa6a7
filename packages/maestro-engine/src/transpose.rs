//! Key-to-key transposition of note lists and ABC documents.
//!
//! The interval is the raw difference between the two keys' slots in the 12-entry pitch-class
//! table, so C to B moves up eleven semitones rather than down one.
//!
//! Note lists come back in sharp spelling. ABC documents are respelled for the target key:
//! scale tones lose their marks and everything else gets an explicit `^`, `_` or `=`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use crate::header::{is_header_line, AbcHeader};
use crate::pitch::{PitchToken, SpelledPitch};
use crate::theory::{pitch_class, sharp_name, Accidental, KeySignature, NoteLetter, FLAT_NAMES};

static MELODY_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Ga-g])(#|b)?(\d)?$").unwrap());

static KEY_ROOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*K:\s*)([A-G])(#|b)?").unwrap());

/// Body tokens: chord symbols, spans that must not change, and notes
static BODY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?P<chord>"[^"]*")"#,
        r"|(?P<keep>![^!]*!|\+[^+]*\+|\[[A-Za-z]:[^\]]*\]|%.*$)",
        r"|(?P<note>(?P<acc>\^\^|\^|__|_|=)?(?P<letter>[A-Ga-g])(?P<oct>[,']*))",
    ))
    .unwrap()
});

static CHORD_SYMBOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-G][#b]?(?:m|maj|min|dim|aug|sus|add|M|\+|o|\d|/|\(|$)").unwrap()
});

static CHORD_ROOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|/)([A-G])(#|b)?").unwrap());

/// Slot of a key's tonic in the pitch-class table; accepts `D`, `Bb`, `F#m`, `A minor`.
fn key_slot(key: &str) -> Option<i32> {
    pitch_class(key).or_else(|| {
        key.parse::<KeySignature>()
            .ok()
            .map(|k| k.tonic_pitch_class())
    })
}

/// Semitones from one key to another, in `-11..=11`.
/// An unreadable key counts as C.
pub fn semitone_delta(from: &str, to: &str) -> i32 {
    let slot = |key: &str| {
        key_slot(key).unwrap_or_else(|| {
            warn!(key, "unknown key for transposition, treating as C");
            0
        })
    };
    slot(to) - slot(from)
}

/// Transpose a whitespace-separated note list such as `C4 E4 G4`.
///
/// Other tokens are kept as written. A note with no octave digit keeps none unless the
/// shift wraps it into another octave.
pub fn transpose_melody(melody: &str, from: &str, to: &str) -> String {
    let delta = semitone_delta(from, to);
    melody
        .split_whitespace()
        .map(|token| transpose_melody_token(token, delta).unwrap_or_else(|| token.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn transpose_melody_token(token: &str, delta: i32) -> Option<String> {
    if delta == 0 {
        return None;
    }
    let caps = MELODY_NOTE.captures(token)?;
    let letter = caps[1].chars().next().and_then(NoteLetter::from_char)?;
    let accidental = Accidental::from_suffix(caps.get(2).map_or("", |m| m.as_str()))?;
    // letter plus offset, so `B#4` lands on C5 and `Cb4` on B3
    let shifted = letter.semitone() + accidental.semitone_offset() + delta;
    let carry = shifted.div_euclid(12);
    let new_name = sharp_name(shifted);

    let octave = match caps.get(3) {
        Some(digit) => Some(digit.as_str().parse::<i32>().ok()? + carry),
        None if carry == 0 => None,
        None => Some(4 + carry),
    };
    Some(match octave {
        Some(octave) => format!("{}{}", new_name, octave),
        None => new_name.to_string(),
    })
}

/// Transpose an ABC document from one key to another.
///
/// The first `K:` root is replaced (its mode and clauses stay), every note is shifted and
/// respelled for the new key, and chord symbol roots move with it. Lengths, rests, bar lines,
/// decorations, comments and other header lines are not touched.
pub fn transpose_abc(abc: &str, from: &str, to: &str) -> String {
    let delta = semitone_delta(from, to);
    if delta == 0 {
        return abc.to_string();
    }

    let header = AbcHeader::parse(abc);
    let source = header
        .key_signature()
        .ok()
        .filter(|_| header.key.is_some())
        .or_else(|| from.parse().ok())
        .unwrap_or_default();
    let target = KeySignature::on_pitch_class(source.tonic_pitch_class() + delta, source.mode);

    let mut key_rewritten = false;
    abc.lines()
        .map(|line| {
            if is_header_line(line) {
                if !key_rewritten && KEY_ROOT.is_match(line) && header.key_signature().is_ok() {
                    key_rewritten = true;
                    let tonic = target.tonic_name();
                    return KEY_ROOT
                        .replace(line, |caps: &Captures| format!("{}{}", &caps[1], tonic))
                        .into_owned();
                }
                return line.to_string();
            }
            transpose_body_line(line, delta, &source, &target)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn transpose_body_line(line: &str, delta: i32, source: &KeySignature, target: &KeySignature) -> String {
    BODY_TOKEN
        .replace_all(line, |caps: &Captures| {
            if let Some(chord) = caps.name("chord") {
                return transpose_chord_symbol(chord.as_str(), delta, target);
            }
            if caps.name("keep").is_some() {
                return caps[0].to_string();
            }
            let letter = caps["letter"].chars().next().unwrap_or('C');
            let acc = caps.name("acc").map_or("", |m| m.as_str());
            let oct = caps.name("oct").map_or("", |m| m.as_str());
            match PitchToken::from_parts(acc, letter, oct) {
                Ok(token) => {
                    let sounding = SpelledPitch::new(
                        token.letter,
                        token.sounding_accidental(source),
                        token.standard_octave(),
                    );
                    write_abc_note(sounding.midi() + delta, target)
                }
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Spell a MIDI number as an ABC note in `key`, standard octaves
fn write_abc_note(midi: i32, key: &KeySignature) -> String {
    let pc = midi.rem_euclid(12);
    let (letter, accidental, mark) = match key.scale_spelling(pc) {
        Some((letter, accidental)) => (letter, accidental, ""),
        None => {
            let (letter, accidental) = spell_pitch_class(pc, key.prefers_flats());
            (letter, accidental, accidental.abc_mark())
        }
    };
    let octave = (midi - letter.semitone() - accidental.semitone_offset()).div_euclid(12) - 1;

    let mut out = String::from(mark);
    if octave >= 5 {
        out.push(letter.as_char().to_ascii_lowercase());
        out.push_str(&"'".repeat((octave - 5) as usize));
    } else {
        out.push(letter.as_char());
        out.push_str(&",".repeat((4 - octave) as usize));
    }
    out
}

fn spell_pitch_class(pc: i32, flats: bool) -> (NoteLetter, Accidental) {
    let name = if flats {
        FLAT_NAMES[pc.rem_euclid(12) as usize]
    } else {
        sharp_name(pc)
    };
    let mut chars = name.chars();
    let letter = chars.next().and_then(NoteLetter::from_char).unwrap_or_default();
    let accidental = Accidental::from_suffix(chars.as_str()).unwrap_or_default();
    (letter, accidental)
}

/// Move the root (and slash bass) of a quoted chord symbol. Annotations are left alone.
fn transpose_chord_symbol(symbol: &str, delta: i32, target: &KeySignature) -> String {
    let inner = symbol.trim_matches('"');
    if !CHORD_SYMBOL.is_match(inner) {
        return symbol.to_string();
    }
    let moved = CHORD_ROOT.replace_all(inner, |caps: &Captures| {
        let name = format!("{}{}", &caps[2], caps.get(3).map_or("", |m| m.as_str()));
        match pitch_class(&name) {
            Some(pc) => {
                let (letter, accidental) = spell_pitch_class(pc + delta, target.prefers_flats());
                format!("{}{}{}", &caps[1], letter, accidental.suffix())
            }
            None => caps[0].to_string(),
        }
    });
    format!("\"{}\"", moved)
}
