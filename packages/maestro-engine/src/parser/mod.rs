//! # Parser Module
//!
//! Converts notation strings into timed note sequences.
//!
//! ## Parsers
//! - [`abc`] - full ABC parser: key signatures, voice ranges, ties, tuplets, broken rhythm.
//!   Rests only advance the clock.
//! - [`melody`] - duration-aware single-line parser: rests become explicit `rest` entries and
//!   every pitch is spelled with sharps only. Also the plain note-list fallback.
//! - [`solfa`] - tonic sol-fa with extension and subdivision markers.
//!
//! ## Shared Output
//! Every parser returns a [`ParsedVoice`]: the notes, the final time cursor and any
//! [`Diagnostic`]s collected on the way. Parsers never fail on bad music text. Unknown tokens
//! are skipped, malformed lengths count as one unit and unknown keys fall back to C, and each
//! of those leaves a diagnostic behind.
//!
//! ## Timing
//! All parsers fold their token list through a [`Timeline`]. Within one voice the start of a
//! note is the running sum of everything before it:
//! ```text
//! note[i].start_beat == note[i-1].start_beat + note[i-1].duration_beats   (+ any rest gap)
//! ```

pub mod abc;
pub mod melody;
pub mod solfa;

use serde::{Deserialize, Serialize};

use crate::duration::{DurationCategory, NoteDuration};
use crate::pitch::NotePitch;

/// One pitched (or rest) event on a voice's timeline.
///
/// `duration_category` is for articulation and display; `duration_beats` drives scheduling.
/// The two can disagree (a quintuplet eighth is labelled `Eighth` but lasts 0.4 beats), and
/// timing must always come from `duration_beats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedNote {
    pub pitch: NotePitch,
    pub duration_category: DurationCategory,
    pub duration_beats: f64,
    pub start_beat: f64,
}

impl TimedNote {
    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.duration_beats
    }
}

/// Output of every parser
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedVoice {
    pub notes: Vec<TimedNote>,
    pub total_beats: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedVoice {
    /// Pitch names only, rests dropped
    pub fn pitches(&self) -> Vec<String> {
        self.notes
            .iter()
            .filter_map(|n| n.pitch.tone())
            .map(|p| p.to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// Unrecognized text was dropped
    SkippedToken,
    /// A sol-fa subdivision marker was discarded before reaching a pitch
    DroppedSubdivision,
    /// A malformed or zero length counted as one unit
    DefaultedLength,
    /// The key could not be read and C major was used
    UnknownKey,
    /// A pitch could not be placed and middle C was used
    FallbackPitch,
    /// A tie joined two different pitches and was ignored
    UnmatchedTie,
}

/// Non-fatal parse anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Position in the cleaned input, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            token: None,
            offset: None,
        }
    }

    pub fn at(mut self, token: &str, offset: usize) -> Self {
        self.token = Some(token.to_string());
        self.offset = Some(offset);
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// Running time cursor shared by the parsers
#[derive(Debug, Default)]
pub struct Timeline {
    notes: Vec<TimedNote>,
    cursor: f64,
    diagnostics: Vec<Diagnostic>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Append an event at the cursor and advance past it
    pub fn push(&mut self, pitch: NotePitch, duration: NoteDuration) {
        self.notes.push(TimedNote {
            pitch,
            duration_category: duration.category,
            duration_beats: duration.beats,
            start_beat: self.cursor,
        });
        self.cursor += duration.beats;
    }

    /// Advance the cursor without emitting anything
    pub fn rest(&mut self, beats: f64) {
        self.cursor += beats;
    }

    /// Lengthen the last emitted note in place. Returns false when there is none.
    pub fn extend_last(&mut self, beats: f64) -> bool {
        let Some(last) = self.notes.last_mut() else {
            return false;
        };
        last.duration_beats += beats;
        last.duration_category = DurationCategory::quantize(last.duration_beats);
        self.cursor += beats;
        true
    }

    pub fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn finish(self) -> ParsedVoice {
        ParsedVoice {
            notes: self.notes,
            total_beats: self.cursor,
            diagnostics: self.diagnostics,
        }
    }
}
