//! Choir voice parts and their natural ranges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MaestroError;

/// Octave range used to place and clamp a voice's pitches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceRange {
    pub min: i8,
    pub max: i8,
    pub default: i8,
}

impl VoiceRange {
    /// Clamp an octave into the range. Never fails.
    pub fn clamp(&self, octave: i8) -> i8 {
        octave.clamp(self.min, self.max)
    }
}

/// One of the four SATB roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePart {
    Soprano,
    Alto,
    Tenor,
    Bass,
}

impl VoicePart {
    /// Score order, top stave first
    pub const ALL: [VoicePart; 4] = [
        VoicePart::Soprano,
        VoicePart::Alto,
        VoicePart::Tenor,
        VoicePart::Bass,
    ];

    pub fn range(self) -> VoiceRange {
        match self {
            VoicePart::Soprano => VoiceRange { min: 4, max: 6, default: 5 },
            VoicePart::Alto => VoiceRange { min: 3, max: 5, default: 4 },
            VoicePart::Tenor => VoiceRange { min: 3, max: 5, default: 4 },
            VoicePart::Bass => VoiceRange { min: 2, max: 4, default: 3 },
        }
    }

    /// Voice id used in `V:` fields and `%%staves` directives
    pub fn abc_id(self) -> &'static str {
        match self {
            VoicePart::Soprano => "S",
            VoicePart::Alto => "A",
            VoicePart::Tenor => "T",
            VoicePart::Bass => "B",
        }
    }

    pub fn clef(self) -> &'static str {
        match self {
            VoicePart::Soprano | VoicePart::Alto => "treble",
            VoicePart::Tenor => "treble-8", // sounds an octave below written
            VoicePart::Bass => "bass",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VoicePart::Soprano => "Soprano",
            VoicePart::Alto => "Alto",
            VoicePart::Tenor => "Tenor",
            VoicePart::Bass => "Bass",
        }
    }

    /// Match a `V:` voice id: `S`, `Sop`, `soprano`, `T1`... Case-insensitive, first letter decides.
    pub fn from_voice_id(id: &str) -> Option<Self> {
        match id.trim().chars().next()?.to_ascii_uppercase() {
            'S' => Some(VoicePart::Soprano),
            'A' => Some(VoicePart::Alto),
            'T' => Some(VoicePart::Tenor),
            'B' => Some(VoicePart::Bass),
            _ => None,
        }
    }
}

impl fmt::Display for VoicePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VoicePart::Soprano => "soprano",
            VoicePart::Alto => "alto",
            VoicePart::Tenor => "tenor",
            VoicePart::Bass => "bass",
        })
    }
}

impl FromStr for VoicePart {
    type Err = MaestroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soprano" | "s" => Ok(VoicePart::Soprano),
            "alto" | "a" => Ok(VoicePart::Alto),
            "tenor" | "t" => Ok(VoicePart::Tenor),
            "bass" | "b" => Ok(VoicePart::Bass),
            other => Err(MaestroError::MetadataError(format!(
                "unknown voice part '{}'",
                other
            ))),
        }
    }
}
