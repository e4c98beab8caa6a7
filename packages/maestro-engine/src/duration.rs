//! # Duration Engine
//!
//! Maps notation length tokens to beat counts and quantized duration categories.
//!
//! ## Two answers per note
//! Every resolved length carries both:
//! - `beats` - the exact length in quarter-note beats, used for scheduling
//! - `category` - the nearest standard note value, used for articulation and display
//!
//! The category is a lossy label. Timing must always be computed from `beats`: a
//! quintuplet eighth is 0.4 beats long even though it is labelled `Eighth`.
//!
//! ## Length arithmetic
//! ```text
//! beats = multiplier * unit_fraction * 4
//! ```
//! where `unit_fraction` is the ABC `L:` field (1/8 by default) and `multiplier` comes from
//! the token after the note: `2`, `3/2`, `/2`, `/`, `//`, or nothing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MaestroError;

/// Standard note values, longest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DurationCategory {
    Breve,           // 8 beats
    DottedWhole,     // 6
    Whole,           // 4
    DottedHalf,      // 3
    Half,            // 2
    DottedQuarter,   // 1.5
    Quarter,         // 1
    DottedEighth,    // 0.75
    Eighth,          // 0.5
    DottedSixteenth, // 0.375
    EighthTriplet,   // 1/3
    Sixteenth,       // 0.25
    ThirtySecond,    // 0.125
}

/// Quantization table, ordered descending so the first of two equally close entries wins
pub const DURATION_TABLE: [DurationCategory; 13] = [
    DurationCategory::Breve,
    DurationCategory::DottedWhole,
    DurationCategory::Whole,
    DurationCategory::DottedHalf,
    DurationCategory::Half,
    DurationCategory::DottedQuarter,
    DurationCategory::Quarter,
    DurationCategory::DottedEighth,
    DurationCategory::Eighth,
    DurationCategory::DottedSixteenth,
    DurationCategory::EighthTriplet,
    DurationCategory::Sixteenth,
    DurationCategory::ThirtySecond,
];

impl DurationCategory {
    /// Length in quarter-note beats
    pub fn beats(self) -> f64 {
        match self {
            DurationCategory::Breve => 8.0,
            DurationCategory::DottedWhole => 6.0,
            DurationCategory::Whole => 4.0,
            DurationCategory::DottedHalf => 3.0,
            DurationCategory::Half => 2.0,
            DurationCategory::DottedQuarter => 1.5,
            DurationCategory::Quarter => 1.0,
            DurationCategory::DottedEighth => 0.75,
            DurationCategory::Eighth => 0.5,
            DurationCategory::DottedSixteenth => 0.375,
            DurationCategory::EighthTriplet => 1.0 / 3.0,
            DurationCategory::Sixteenth => 0.25,
            DurationCategory::ThirtySecond => 0.125,
        }
    }

    /// Trigger code understood by the audio backend.
    /// The backend has no breve, so a breve triggers as a whole note.
    pub fn code(self) -> &'static str {
        match self {
            DurationCategory::Breve => "1n",
            DurationCategory::DottedWhole => "1n.",
            DurationCategory::Whole => "1n",
            DurationCategory::DottedHalf => "2n.",
            DurationCategory::Half => "2n",
            DurationCategory::DottedQuarter => "4n.",
            DurationCategory::Quarter => "4n",
            DurationCategory::DottedEighth => "8n.",
            DurationCategory::Eighth => "8n",
            DurationCategory::DottedSixteenth => "16n.",
            DurationCategory::EighthTriplet => "8t",
            DurationCategory::Sixteenth => "16n",
            DurationCategory::ThirtySecond => "32n",
        }
    }

    /// Nearest table entry by absolute difference; ties go to the longer value.
    pub fn quantize(beats: f64) -> Self {
        let mut best = DurationCategory::ThirtySecond;
        let mut min_diff = f64::INFINITY;
        for entry in DURATION_TABLE {
            let diff = (beats - entry.beats()).abs();
            if diff < min_diff {
                min_diff = diff;
                best = entry;
            }
        }
        best
    }

    /// Wall-clock length of this category at the given tempo
    pub fn seconds(self, bpm: f64) -> f64 {
        self.beats() * 60.0 / bpm
    }
}

impl fmt::Display for DurationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A resolved note length: category for articulation, beats for scheduling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteDuration {
    pub category: DurationCategory,
    pub beats: f64,
}

impl NoteDuration {
    pub fn from_beats(beats: f64) -> Self {
        Self {
            category: DurationCategory::quantize(beats),
            beats,
        }
    }
}

/// Base note length from an ABC `L:` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct UnitLength {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for UnitLength {
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: 8,
        }
    }
}

impl UnitLength {
    pub const QUARTER: UnitLength = UnitLength {
        numerator: 1,
        denominator: 4,
    };

    /// Fraction of a whole note
    pub fn fraction(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for UnitLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for UnitLength {
    type Err = MaestroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MaestroError::MetadataError(format!("unit length must be N/D, got '{}'", s));
        let (num, den) = s.trim().split_once('/').ok_or_else(invalid)?;
        let numerator: u32 = num.trim().parse().map_err(|_| invalid())?;
        let denominator: u32 = den.trim().parse().map_err(|_| invalid())?;
        if numerator == 0 || denominator == 0 {
            return Err(invalid());
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl From<UnitLength> for String {
    fn from(unit: UnitLength) -> Self {
        unit.to_string()
    }
}

impl TryFrom<String> for UnitLength {
    type Error = MaestroError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parse a length suffix into a multiplier of the unit length.
///
/// Handles: `` (=1), `2` (=2), `/2` (=0.5), `/` (=0.5), `3/2` (=1.5), `//` (=0.25), `3/` (=1.5).
/// Returns `None` for malformed or zero lengths; callers fall back to a multiplier of 1.
pub fn parse_length(token: &str) -> Option<f64> {
    if token.is_empty() {
        return Some(1.0);
    }

    let Some(slash_idx) = token.find('/') else {
        let n: u32 = token.parse().ok()?;
        return (n > 0).then_some(n as f64);
    };

    let num_str = &token[..slash_idx];
    let after = &token[slash_idx..];
    let slash_count = after.chars().take_while(|c| *c == '/').count() as u32;
    let den_str = &after[slash_count as usize..];

    let numerator: u32 = if num_str.is_empty() { 1 } else { num_str.parse().ok()? };
    // `/` halves, `//` quarters; an explicit denominator replaces the first halving
    let denominator: u32 = if den_str.is_empty() {
        2u32.checked_pow(slash_count)?
    } else {
        let den: u32 = den_str.parse().ok()?;
        den.checked_mul(2u32.checked_pow(slash_count - 1)?)?
    };

    if numerator == 0 || denominator == 0 {
        return None;
    }
    Some(numerator as f64 / denominator as f64)
}

/// Resolve a multiplier against a unit length: `beats = multiplier * unit * 4`.
pub fn duration_from_length(multiplier: f64, unit: UnitLength) -> NoteDuration {
    NoteDuration::from_beats(multiplier * unit.fraction() * 4.0)
}
