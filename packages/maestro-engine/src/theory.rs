//! # Music Theory Primitives
//!
//! Note letters, accidentals, modes and key signatures shared by every parser.
//!
//! ## Key Concepts
//!
//! ### Pitch classes
//! A pitch class is a semitone offset from C in `0..12`. Enharmonic spellings share a slot
//! (`C#` and `Db` are both 1). Canonical output spelling is sharp-only, see [`SHARP_NAMES`].
//!
//! ### Key signatures
//! A key is stored as its tonic, its mode and its position on the circle of fifths:
//! positive `fifths` counts sharps, negative counts flats, zero is C major / A minor.
//! Letters that carry no explicit accidental take the key's implied accidental:
//! - Order of sharps: F C G D A E B
//! - Order of flats: B E A D G C F

use std::fmt;
use std::str::FromStr;

use crate::error::MaestroError;

/// Canonical sharp spelling for each pitch class.
pub const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Flat spelling for each pitch class (naturals repeated).
pub const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

const SHARP_ORDER: [NoteLetter; 7] = [
    NoteLetter::F,
    NoteLetter::C,
    NoteLetter::G,
    NoteLetter::D,
    NoteLetter::A,
    NoteLetter::E,
    NoteLetter::B,
];

const FLAT_ORDER: [NoteLetter; 7] = [
    NoteLetter::B,
    NoteLetter::E,
    NoteLetter::A,
    NoteLetter::D,
    NoteLetter::G,
    NoteLetter::C,
    NoteLetter::F,
];

/// Look up a note name in the 12-slot enharmonic table.
///
/// Accepts `C`, `C#`, `Db`, ... with an uppercase or lowercase letter.
/// Returns `None` for anything else, including spellings such as `Cb` or `E#`
/// that the table does not list.
pub fn pitch_class(name: &str) -> Option<i32> {
    let mut chars = name.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let rest: String = chars.collect();
    let normalized = format!("{}{}", letter, rest);

    SHARP_NAMES
        .iter()
        .position(|n| *n == normalized)
        .or_else(|| FLAT_NAMES.iter().position(|n| *n == normalized))
        .map(|idx| idx as i32)
}

/// Sharp spelling of a pitch class (wraps out-of-range values).
pub fn sharp_name(pitch_class: i32) -> &'static str {
    SHARP_NAMES[pitch_class.rem_euclid(12) as usize]
}

/// Note letters A through G
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NoteLetter {
    #[default]
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteLetter {
    pub const ALL: [NoteLetter; 7] = [
        NoteLetter::C,
        NoteLetter::D,
        NoteLetter::E,
        NoteLetter::F,
        NoteLetter::G,
        NoteLetter::A,
        NoteLetter::B,
    ];

    /// Case-insensitive letter lookup
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteLetter::C),
            'D' => Some(NoteLetter::D),
            'E' => Some(NoteLetter::E),
            'F' => Some(NoteLetter::F),
            'G' => Some(NoteLetter::G),
            'A' => Some(NoteLetter::A),
            'B' => Some(NoteLetter::B),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            NoteLetter::C => 'C',
            NoteLetter::D => 'D',
            NoteLetter::E => 'E',
            NoteLetter::F => 'F',
            NoteLetter::G => 'G',
            NoteLetter::A => 'A',
            NoteLetter::B => 'B',
        }
    }

    /// Semitone offset of the natural letter from C
    pub fn semitone(self) -> i32 {
        match self {
            NoteLetter::C => 0,
            NoteLetter::D => 2,
            NoteLetter::E => 4,
            NoteLetter::F => 5,
            NoteLetter::G => 7,
            NoteLetter::A => 9,
            NoteLetter::B => 11,
        }
    }

    /// Position in the C-to-B letter cycle (C = 0)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Step `steps` letters up (or down), returning the new letter and
    /// how many times the walk crossed the B/C octave boundary.
    pub fn step(self, steps: i32) -> (NoteLetter, i32) {
        let raw = self.index() as i32 + steps;
        let letter = NoteLetter::ALL[raw.rem_euclid(7) as usize];
        (letter, raw.div_euclid(7))
    }

    /// Position of the natural letter on the circle of fifths, C = 0
    fn fifths_position(self) -> i32 {
        match self {
            NoteLetter::F => -1,
            NoteLetter::C => 0,
            NoteLetter::G => 1,
            NoteLetter::D => 2,
            NoteLetter::A => 3,
            NoteLetter::E => 4,
            NoteLetter::B => 5,
        }
    }
}

impl fmt::Display for NoteLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Accidentals, natural meaning "no alteration"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Accidental {
    DoubleFlat,
    Flat,
    #[default]
    Natural,
    Sharp,
    DoubleSharp,
}

impl Accidental {
    pub fn semitone_offset(self) -> i32 {
        match self {
            Accidental::DoubleFlat => -2,
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::DoubleSharp => 2,
        }
    }

    pub fn from_offset(offset: i32) -> Option<Self> {
        match offset {
            -2 => Some(Accidental::DoubleFlat),
            -1 => Some(Accidental::Flat),
            0 => Some(Accidental::Natural),
            1 => Some(Accidental::Sharp),
            2 => Some(Accidental::DoubleSharp),
            _ => None,
        }
    }

    /// ABC accidental marks: `^^ ^ = _ __`
    pub fn from_abc(mark: &str) -> Option<Self> {
        match mark {
            "^^" => Some(Accidental::DoubleSharp),
            "^" => Some(Accidental::Sharp),
            "=" => Some(Accidental::Natural),
            "_" => Some(Accidental::Flat),
            "__" => Some(Accidental::DoubleFlat),
            _ => None,
        }
    }

    pub fn abc_mark(self) -> &'static str {
        match self {
            Accidental::DoubleFlat => "__",
            Accidental::Flat => "_",
            Accidental::Natural => "=",
            Accidental::Sharp => "^",
            Accidental::DoubleSharp => "^^",
        }
    }

    /// Suffix used in pitch names (`F#4`, `Bb3`); empty for natural
    pub fn suffix(self) -> &'static str {
        match self {
            Accidental::DoubleFlat => "bb",
            Accidental::Flat => "b",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::DoubleSharp => "##",
        }
    }

    /// Inverse of [`Accidental::suffix`]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "bb" => Some(Accidental::DoubleFlat),
            "b" => Some(Accidental::Flat),
            "" => Some(Accidental::Natural),
            "#" => Some(Accidental::Sharp),
            "##" => Some(Accidental::DoubleSharp),
            _ => None,
        }
    }
}

/// Mode for key signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
}

impl Mode {
    /// Fifths to add to the major key on the same tonic
    pub fn fifths_offset(self) -> i32 {
        match self {
            Mode::Lydian => 1,
            Mode::Major => 0,
            Mode::Mixolydian => -1,
            Mode::Dorian => -2,
            Mode::Minor => -3,
            Mode::Phrygian => -4,
            Mode::Locrian => -5,
        }
    }

    /// Reads the mode word of an ABC `K:` field. Only the first three letters count.
    pub fn from_word(word: &str) -> Option<Self> {
        let lower = word.to_ascii_lowercase();
        if lower.is_empty() {
            return Some(Mode::Major);
        }
        if lower == "m" {
            return Some(Mode::Minor);
        }
        let prefix: String = lower.chars().take(3).collect();
        match prefix.as_str() {
            "maj" | "ion" => Some(Mode::Major),
            "min" | "aeo" => Some(Mode::Minor),
            "dor" => Some(Mode::Dorian),
            "phr" => Some(Mode::Phrygian),
            "lyd" => Some(Mode::Lydian),
            "mix" => Some(Mode::Mixolydian),
            "loc" => Some(Mode::Locrian),
            _ => None,
        }
    }

    /// Suffix written after the tonic in a `K:` field
    pub fn suffix(self) -> &'static str {
        match self {
            Mode::Major => "",
            Mode::Minor => "m",
            Mode::Dorian => "dor",
            Mode::Phrygian => "phr",
            Mode::Lydian => "lyd",
            Mode::Mixolydian => "mix",
            Mode::Locrian => "loc",
        }
    }
}

/// Key signature: tonic, mode and number of sharps (positive) or flats (negative)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySignature {
    pub tonic: NoteLetter,
    pub tonic_accidental: Accidental,
    pub mode: Mode,
    pub fifths: i8, // -7 to +7 (flats to sharps)
}

impl Default for KeySignature {
    fn default() -> Self {
        Self {
            tonic: NoteLetter::C,
            tonic_accidental: Accidental::Natural,
            mode: Mode::Major,
            fifths: 0,
        }
    }
}

impl KeySignature {
    /// Build a key from its parts, rejecting keys beyond seven sharps or flats.
    pub fn new(
        tonic: NoteLetter,
        tonic_accidental: Accidental,
        mode: Mode,
    ) -> Result<Self, MaestroError> {
        let fifths =
            tonic.fifths_position() + 7 * tonic_accidental.semitone_offset() + mode.fifths_offset();
        if !(-7..=7).contains(&fifths) {
            return Err(MaestroError::UnknownKey(format!(
                "{}{}{}",
                tonic,
                tonic_accidental.suffix(),
                mode.suffix()
            )));
        }
        Ok(Self {
            tonic,
            tonic_accidental,
            mode,
            fifths: fifths as i8,
        })
    }

    /// Key on the given tonic pitch class, spelled with the fewest accidentals.
    /// Ties go to the flat spelling.
    pub fn on_pitch_class(pitch_class: i32, mode: Mode) -> Self {
        let pc = pitch_class.rem_euclid(12);
        let candidates = [FLAT_NAMES[pc as usize], SHARP_NAMES[pc as usize]];
        candidates
            .iter()
            .filter_map(|name| {
                let mut chars = name.chars();
                let letter = chars.next().and_then(NoteLetter::from_char)?;
                let accidental = Accidental::from_suffix(chars.as_str())?;
                KeySignature::new(letter, accidental, mode).ok()
            })
            .min_by_key(|key| key.fifths.unsigned_abs())
            .unwrap_or_default()
    }

    /// Returns the accidental a letter takes in this key when written without one.
    pub fn implied_accidental(&self, letter: NoteLetter) -> Accidental {
        let count = self.fifths.unsigned_abs() as usize;
        if self.fifths > 0 && SHARP_ORDER[..count].contains(&letter) {
            Accidental::Sharp
        } else if self.fifths < 0 && FLAT_ORDER[..count].contains(&letter) {
            Accidental::Flat
        } else {
            Accidental::Natural
        }
    }

    /// Tonic as a pitch name without octave, e.g. `Bb`
    pub fn tonic_name(&self) -> String {
        format!("{}{}", self.tonic, self.tonic_accidental.suffix())
    }

    pub fn tonic_pitch_class(&self) -> i32 {
        (self.tonic.semitone() + self.tonic_accidental.semitone_offset()).rem_euclid(12)
    }

    pub fn prefers_flats(&self) -> bool {
        self.fifths < 0
    }

    /// The scale letter (with its implied accidental) that sounds this pitch class,
    /// if the pitch class belongs to the key.
    pub fn scale_spelling(&self, pitch_class: i32) -> Option<(NoteLetter, Accidental)> {
        let pc = pitch_class.rem_euclid(12);
        NoteLetter::ALL.iter().find_map(|&letter| {
            let accidental = self.implied_accidental(letter);
            let sounding = (letter.semitone() + accidental.semitone_offset()).rem_euclid(12);
            (sounding == pc).then_some((letter, accidental))
        })
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tonic_name(), self.mode.suffix())
    }
}

impl FromStr for KeySignature {
    type Err = MaestroError;

    /// Parse a key like `G`, `Bb`, `F#m`, `A minor`, `D mix`.
    /// Also supports sharp/flat count notation: `#`, `##`, ... or `bb`, `bbb`, ...
    /// (a lone `b` is B major). Trailing ABC clause words such as `clef=bass` are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let unknown = || MaestroError::UnknownKey(trimmed.to_string());

        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Self::default());
        }

        if trimmed.chars().all(|c| c == '#') {
            let count = trimmed.len();
            return match count {
                1..=7 => Ok(Self::on_fifths(count as i8)),
                _ => Err(unknown()),
            };
        }
        if trimmed.len() >= 2 && trimmed.chars().all(|c| c == 'b') {
            let count = trimmed.len();
            return match count {
                2..=7 => Ok(Self::on_fifths(-(count as i8))),
                _ => Err(unknown()),
            };
        }

        let mut chars = trimmed.chars();
        let tonic = chars.next().and_then(NoteLetter::from_char).ok_or_else(unknown)?;
        let rest = chars.as_str();
        let (tonic_accidental, rest) = match rest.chars().next() {
            Some('#') => (Accidental::Sharp, &rest[1..]),
            Some('b') => (Accidental::Flat, &rest[1..]),
            _ => (Accidental::Natural, rest),
        };

        let mode_word = rest
            .split_whitespace()
            .next()
            .filter(|word| !word.contains('='))
            .unwrap_or("");
        let mode = Mode::from_word(mode_word).ok_or_else(unknown)?;

        KeySignature::new(tonic, tonic_accidental, mode).map_err(|_| unknown())
    }
}

impl KeySignature {
    /// Major key with the given number of sharps (positive) or flats (negative)
    fn on_fifths(fifths: i8) -> Self {
        // Walk the circle of fifths from C: +7 semitones per sharp
        let pitch_class = (i32::from(fifths) * 7).rem_euclid(12);
        let spelled = Self::on_pitch_class(pitch_class, Mode::Major);
        if spelled.fifths == fifths {
            return spelled;
        }
        // Enharmonic keys (F#/Gb, C#/Db, Cb/B) need the spelling that matches the count
        let names = if fifths < 0 { &FLAT_NAMES } else { &SHARP_NAMES };
        let name = match (fifths, names[pitch_class as usize]) {
            (-7, _) => "Cb",
            (_, name) => name,
        };
        let mut chars = name.chars();
        let tonic = chars.next().and_then(NoteLetter::from_char).unwrap_or_default();
        let tonic_accidental = Accidental::from_suffix(chars.as_str()).unwrap_or_default();
        Self {
            tonic,
            tonic_accidental,
            mode: Mode::Major,
            fifths,
        }
    }
}
