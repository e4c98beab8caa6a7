//! ABC header fields and voice sections.
//!
//! Only the fields the engine acts on are read: `T:` title, `C:` composer, `M:` meter,
//! `L:` unit length, `Q:` tempo and `K:` key. Every other header line is kept verbatim by
//! the text-level operations (transposition, score combination) and ignored here.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::duration::UnitLength;
use crate::error::MaestroError;
use crate::theory::KeySignature;
use crate::voice::VoicePart;

static FIELD_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z]):\s*(.*?)\s*$").unwrap());

static INLINE_VOICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[V:\s*([^\]\s]+)[^\]]*\]\s*(.*)$").unwrap());

static TEMPO_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)\s*=\s*(\d+(?:\.\d+)?)").unwrap());

static TEMPO_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").unwrap());

/// True for field lines (`K:G`, `w:lyrics`) and `%%` directives, which carry no notes.
pub fn is_header_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("%%") || FIELD_LINE.is_match(trimmed)
}

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meter {
    pub beats: u32,
    pub beat_type: u32,
}

impl Default for Meter {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl Meter {
    /// 6/8, 9/8, 12/8 and friends
    pub fn is_compound(&self) -> bool {
        self.beats > 3 && self.beats % 3 == 0
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

impl FromStr for Meter {
    type Err = MaestroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "C" => return Ok(Meter::default()),
            "C|" => {
                return Ok(Meter {
                    beats: 2,
                    beat_type: 2,
                })
            }
            _ => {}
        }
        let invalid =
            || MaestroError::MetadataError(format!("time signature must be in format N/D, got '{}'", s));
        let (beats, beat_type) = trimmed.split_once('/').ok_or_else(invalid)?;
        let beats: u32 = beats.trim().parse().map_err(|_| invalid())?;
        let beat_type: u32 = beat_type.trim().parse().map_err(|_| invalid())?;
        if beats == 0 || beat_type == 0 {
            return Err(invalid());
        }
        Ok(Meter { beats, beat_type })
    }
}

/// Tempo marking: `bpm` counts of the `beat` note value per minute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    pub bpm: f64,
    pub beat: UnitLength,
}

impl Tempo {
    /// Convert to quarter note BPM.
    /// `Q:3/8=60` (dotted quarter = 60) is 90 quarter notes per minute.
    pub fn to_quarter_note_bpm(&self) -> f64 {
        self.bpm * self.beat.fraction() * 4.0
    }
}

impl FromStr for Tempo {
    type Err = MaestroError;

    /// Accepts `1/4=100`, `"Allegro" 3/8=60` and bare `100` (quarter notes).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(caps) = TEMPO_FRACTION.captures(s) {
            let numerator: u32 = caps[1].parse().unwrap_or(1);
            let denominator: u32 = caps[2].parse().unwrap_or(4);
            let bpm: f64 = caps[3].parse().unwrap_or(0.0);
            if numerator > 0 && denominator > 0 && bpm > 0.0 {
                return Ok(Tempo {
                    bpm,
                    beat: UnitLength {
                        numerator,
                        denominator,
                    },
                });
            }
        } else if let Some(caps) = TEMPO_BARE.captures(s) {
            let bpm: f64 = caps[1].parse().unwrap_or(0.0);
            if bpm > 0.0 {
                return Ok(Tempo {
                    bpm,
                    beat: UnitLength::QUARTER,
                });
            }
        }
        Err(MaestroError::MetadataError(format!("unreadable tempo '{}'", s)))
    }
}

/// Header fields of an ABC document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbcHeader {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub meter: Option<Meter>,
    pub unit: Option<UnitLength>,
    pub tempo: Option<Tempo>,
    /// Raw `K:` value, resolved lazily so an unknown key can be reported by the parser
    pub key: Option<String>,
}

impl AbcHeader {
    /// Read header fields from anywhere in the document; the first occurrence of each wins.
    /// Unreadable `M:`, `L:` and `Q:` values are treated as absent.
    pub fn parse(abc: &str) -> Self {
        let mut header = AbcHeader::default();
        for line in abc.lines() {
            let Some(caps) = FIELD_LINE.captures(line.trim_start()) else {
                continue;
            };
            let value = caps[2].to_string();
            match &caps[1] {
                "T" if header.title.is_none() => header.title = Some(value),
                "C" if header.composer.is_none() => header.composer = Some(value),
                "M" if header.meter.is_none() => header.meter = value.parse().ok(),
                "L" if header.unit.is_none() => {
                    header.unit = value.parse().ok();
                    if header.unit.is_none() {
                        debug!(value = %value, "ignoring unreadable unit length");
                    }
                }
                "Q" if header.tempo.is_none() => header.tempo = value.parse().ok(),
                "K" if header.key.is_none() => header.key = Some(value),
                _ => {}
            }
        }
        header
    }

    pub fn unit_or_default(&self) -> UnitLength {
        self.unit.unwrap_or_default()
    }

    /// Key from the `K:` field; C major when absent
    pub fn key_signature(&self) -> Result<KeySignature, MaestroError> {
        match &self.key {
            Some(raw) => raw.parse(),
            None => Ok(KeySignature::default()),
        }
    }
}

/// One voice of a combined multi-voice document
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSection {
    pub id: String,
    pub part: Option<VoicePart>,
    /// Stand-alone document: shared header, voice header lines, then the voice's body
    pub document: String,
}

#[derive(Default)]
struct SectionLines {
    headers: Vec<String>,
    body: Vec<String>,
}

/// Split a document with `V:` voices into one stand-alone document per voice.
///
/// Header lines before the first voice are shared. A voice's own header lines
/// (a `K:` or `L:` inside its section) override the shared field of the same letter.
/// Music written before the first voice marker belongs to the first voice.
/// Returns an empty list when the document declares no voices.
pub fn split_voices(abc: &str) -> Vec<VoiceSection> {
    let mut shared: Vec<String> = Vec::new();
    let mut order: Vec<String> = Vec::new();
    let mut sections: Vec<SectionLines> = Vec::new();
    let mut current: Option<usize> = None;
    let mut leading: Vec<String> = Vec::new();

    for line in abc.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("V:") {
            let id = rest.split_whitespace().next().unwrap_or("");
            current = Some(section_index(id, &mut order, &mut sections));
            continue;
        }
        if let Some(caps) = INLINE_VOICE.captures(trimmed) {
            let idx = section_index(&caps[1], &mut order, &mut sections);
            current = Some(idx);
            if !caps[2].trim().is_empty() {
                sections[idx].body.push(caps[2].to_string());
            }
            continue;
        }
        match current {
            None => {
                if is_header_line(trimmed) {
                    shared.push(line.to_string());
                } else if !trimmed.is_empty() && !trimmed.starts_with('%') {
                    leading.push(line.to_string());
                }
            }
            Some(idx) if is_header_line(trimmed) => sections[idx].headers.push(line.to_string()),
            Some(idx) => sections[idx].body.push(line.to_string()),
        }
    }

    if let (Some(first), Some(id)) = (sections.first_mut(), order.first()) {
        if !leading.is_empty() {
            warn!(
                lines = leading.len(),
                voice = %id,
                "music before the first voice marker, giving it to that voice"
            );
            leading.append(&mut first.body);
            first.body = leading;
        }
    }

    order
        .into_iter()
        .zip(sections)
        .map(|(id, lines)| {
            let own_fields: Vec<char> = lines
                .headers
                .iter()
                .filter_map(|h| field_letter(h))
                .collect();
            let mut document: Vec<String> = shared
                .iter()
                .filter(|h| field_letter(h).map_or(true, |f| !own_fields.contains(&f)))
                .cloned()
                .collect();
            document.extend(lines.headers);
            document.extend(lines.body);
            VoiceSection {
                part: VoicePart::from_voice_id(&id),
                id,
                document: document.join("\n"),
            }
        })
        .collect()
}

/// Stand-alone document for one voice part of a combined document, if it declares one.
pub fn voice_document(abc: &str, part: VoicePart) -> Option<String> {
    split_voices(abc)
        .into_iter()
        .find(|section| section.part == Some(part))
        .map(|section| section.document)
}

fn section_index(id: &str, order: &mut Vec<String>, sections: &mut Vec<SectionLines>) -> usize {
    match order.iter().position(|known| known == id) {
        Some(idx) => idx,
        None => {
            order.push(id.to_string());
            sections.push(SectionLines::default());
            sections.len() - 1
        }
    }
}

fn field_letter(line: &str) -> Option<char> {
    FIELD_LINE
        .captures(line.trim_start())
        .and_then(|caps| caps[1].chars().next())
}
