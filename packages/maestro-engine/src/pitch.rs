//! # Pitch Resolver
//!
//! Turns note tokens (`^F`, `c'`, `B,,`) into absolute, spelled pitches.
//!
//! ## Octave conventions
//! ABC letter case means different octaves to different consumers, so the convention is
//! always passed explicitly as a [`PitchConvention`]:
//! - `VoiceRelative` - uppercase sits at the voice's default octave, lowercase one above.
//!   Soprano `C` is C5 and `c` is C6; bass `C` is C3.
//! - `Standard` - uppercase is octave 4, lowercase octave 5, regardless of voice.
//!
//! Each `'` raises the result an octave and each `,` lowers it. A resolved octave outside the
//! voice's range is clamped into it, never rejected.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MaestroError;
use crate::theory::{sharp_name, Accidental, KeySignature, NoteLetter};
use crate::voice::VoicePart;

static NOTE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\^\^|\^|__|_|=)?([A-Ga-g])([,']*)$").unwrap());

static PITCH_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Ga-g])(##|#|bb|b)?(-?\d+)$").unwrap());

/// Which octave an ABC letter's case selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PitchConvention {
    #[default]
    VoiceRelative,
    Standard,
}

impl PitchConvention {
    pub fn base_octave(self, lowercase: bool, voice: VoicePart) -> i8 {
        let upper = match self {
            PitchConvention::VoiceRelative => voice.range().default,
            PitchConvention::Standard => 4,
        };
        if lowercase {
            upper + 1
        } else {
            upper
        }
    }
}

impl FromStr for PitchConvention {
    type Err = MaestroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "voice-relative" => Ok(PitchConvention::VoiceRelative),
            "standard" => Ok(PitchConvention::Standard),
            other => Err(MaestroError::ConfigError(format!(
                "unknown pitch convention '{}'",
                other
            ))),
        }
    }
}

/// An absolute pitch with its spelling kept (`Bb4` is not `A#4`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpelledPitch {
    pub letter: NoteLetter,
    pub accidental: Accidental,
    pub octave: i8,
}

impl SpelledPitch {
    /// Fallback for pitches that cannot be mapped
    pub const MIDDLE_C: SpelledPitch = SpelledPitch {
        letter: NoteLetter::C,
        accidental: Accidental::Natural,
        octave: 4,
    };

    pub fn new(letter: NoteLetter, accidental: Accidental, octave: i8) -> Self {
        Self {
            letter,
            accidental,
            octave,
        }
    }

    /// MIDI note number (C4 = 60)
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.letter.semitone() + self.accidental.semitone_offset()
    }

    /// Sharp-or-natural spelling of a MIDI note number
    pub fn from_midi(midi: i32) -> Self {
        let name = sharp_name(midi);
        let mut chars = name.chars();
        let letter = chars.next().and_then(NoteLetter::from_char).unwrap_or_default();
        let accidental = Accidental::from_suffix(chars.as_str()).unwrap_or_default();
        Self {
            letter,
            accidental,
            octave: (midi.div_euclid(12) - 1) as i8,
        }
    }

    /// Respell using only sharps and naturals: `Bb4` becomes `A#4`, `Cb4` becomes `B3`,
    /// `B#4` becomes `C5`.
    pub fn to_sharp_spelling(self) -> Self {
        Self::from_midi(self.midi())
    }

    /// Equal-tempered frequency, A4 = 440 Hz
    pub fn frequency(&self) -> f64 {
        440.0 * 2f64.powf((self.midi() - 69) as f64 / 12.0)
    }
}

impl fmt::Display for SpelledPitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.letter, self.accidental.suffix(), self.octave)
    }
}

impl FromStr for SpelledPitch {
    type Err = MaestroError;

    /// Parse a pitch name such as `F#4`, `Bb3` or `c5`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MaestroError::InvalidNote {
            token: s.to_string(),
        };
        let caps = PITCH_NAME.captures(s.trim()).ok_or_else(invalid)?;
        let letter = caps[1]
            .chars()
            .next()
            .and_then(NoteLetter::from_char)
            .ok_or_else(invalid)?;
        let accidental =
            Accidental::from_suffix(caps.get(2).map_or("", |m| m.as_str())).ok_or_else(invalid)?;
        let octave: i8 = caps[3].parse().map_err(|_| invalid())?;
        Ok(Self::new(letter, accidental, octave))
    }
}

/// Pitch of a timed note: a spelled tone or the `rest` sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum NotePitch {
    Rest,
    Tone(SpelledPitch),
}

impl NotePitch {
    pub fn is_rest(&self) -> bool {
        matches!(self, NotePitch::Rest)
    }

    pub fn tone(&self) -> Option<SpelledPitch> {
        match self {
            NotePitch::Rest => None,
            NotePitch::Tone(p) => Some(*p),
        }
    }
}

impl fmt::Display for NotePitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotePitch::Rest => f.write_str("rest"),
            NotePitch::Tone(p) => p.fmt(f),
        }
    }
}

impl From<NotePitch> for String {
    fn from(pitch: NotePitch) -> Self {
        pitch.to_string()
    }
}

impl TryFrom<String> for NotePitch {
    type Error = MaestroError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "rest" {
            Ok(NotePitch::Rest)
        } else {
            value.parse().map(NotePitch::Tone)
        }
    }
}

impl From<SpelledPitch> for NotePitch {
    fn from(pitch: SpelledPitch) -> Self {
        NotePitch::Tone(pitch)
    }
}

/// A note token split into its parts, before key and octave resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchToken {
    pub accidental: Option<Accidental>,
    pub letter: NoteLetter,
    pub lowercase: bool,
    pub octave_shift: i8,
}

impl PitchToken {
    /// Build from the pieces a tokenizer captured: accidental mark, letter, octave marks.
    pub fn from_parts(
        accidental: &str,
        letter: char,
        octave_modifiers: &str,
    ) -> Result<Self, MaestroError> {
        let invalid = || MaestroError::InvalidNote {
            token: format!("{}{}{}", accidental, letter, octave_modifiers),
        };
        let accidental = if accidental.is_empty() {
            None
        } else {
            Some(Accidental::from_abc(accidental).ok_or_else(invalid)?)
        };
        let note_letter = NoteLetter::from_char(letter).ok_or_else(invalid)?;

        let mut octave_shift: i8 = 0;
        for modifier in octave_modifiers.chars() {
            match modifier {
                '\'' => octave_shift = octave_shift.saturating_add(1),
                ',' => octave_shift = octave_shift.saturating_sub(1),
                _ => return Err(invalid()),
            }
        }

        Ok(Self {
            accidental,
            letter: note_letter,
            lowercase: letter.is_ascii_lowercase(),
            octave_shift,
        })
    }

    /// Explicit accidental, or the one the key implies for this letter
    pub fn sounding_accidental(&self, key: &KeySignature) -> Accidental {
        self.accidental
            .unwrap_or_else(|| key.implied_accidental(self.letter))
    }

    /// Octave under [`PitchConvention::Standard`], which needs no voice
    pub fn standard_octave(&self) -> i8 {
        let base: i8 = if self.lowercase { 5 } else { 4 };
        base.saturating_add(self.octave_shift)
    }

    /// Octave before any clamping
    pub fn octave(&self, voice: VoicePart, convention: PitchConvention) -> i8 {
        convention
            .base_octave(self.lowercase, voice)
            .saturating_add(self.octave_shift)
    }

    /// Resolve to an absolute pitch, clamped into the voice's range.
    pub fn resolve(
        &self,
        key: &KeySignature,
        voice: VoicePart,
        convention: PitchConvention,
    ) -> SpelledPitch {
        let octave = voice.range().clamp(self.octave(voice, convention));
        SpelledPitch::new(self.letter, self.sounding_accidental(key), octave)
    }
}

impl FromStr for PitchToken {
    type Err = MaestroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = NOTE_TOKEN
            .captures(s)
            .ok_or_else(|| MaestroError::InvalidNote {
                token: s.to_string(),
            })?;
        let letter = caps[2].chars().next().unwrap_or('C');
        PitchToken::from_parts(
            caps.get(1).map_or("", |m| m.as_str()),
            letter,
            &caps[3],
        )
    }
}

/// Resolve a single ABC note token against a key for a voice.
///
/// Fails only when the token is not `[accidental]letter[octave marks]`.
pub fn resolve_pitch(
    token: &str,
    key: &KeySignature,
    voice: VoicePart,
    convention: PitchConvention,
) -> Result<SpelledPitch, MaestroError> {
    let parsed: PitchToken = token.parse()?;
    Ok(parsed.resolve(key, voice, convention))
}
