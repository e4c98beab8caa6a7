//! # Score Combination and Rendering
//!
//! Text-level operations that produce ABC documents for a notation renderer:
//!
//! - [`combine_parts`] stacks the voice parts of a [`Song`] into one multi-stave document.
//! - [`melody_to_abc`] writes a plain note list as a one-voice document.
//! - [`render_with_fallback`] hands a document to a [`NotationRenderer`] and falls back to an
//!   empty staff when the renderer rejects it.
//!
//! None of these re-parse the music. Voices with different lengths are combined as written.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::MaestroError;
use crate::header::is_header_line;
use crate::song::Song;

static BASE_UNIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"L:\s*1/(\d+)").unwrap());

static MELODY_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^([A-G])(#|b)?(\d)?$").unwrap());

static NOTE_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Ga-g]").unwrap());

/// Combine a song's parts into one document with a stave per voice.
///
/// No parts gives an empty string and a single part is returned as written.
pub fn combine_parts(song: &Song) -> String {
    let active = song.active_parts();
    let first = match active.as_slice() {
        [] => return String::new(),
        [only] => return song.part(*only).unwrap_or_default().to_string(),
        [first, ..] => song.part(*first).unwrap_or_default(),
    };

    let base_unit = BASE_UNIT
        .captures(first)
        .map_or("8", |caps| caps.get(1).map_or("8", |m| m.as_str()));

    let mut combined = String::from("X:1\n");
    combined.push_str(&format!("T:{}\n", song.title));
    if let Some(composer) = song.composer.as_deref().filter(|c| !c.is_empty()) {
        combined.push_str(&format!("C:{}\n", composer));
    }
    combined.push_str(&format!("M:{}\n", song.time_signature));
    combined.push_str(&format!("L:1/{}\n", base_unit));
    combined.push_str(&format!("Q:1/4={}\n", song.tempo));
    combined.push_str(&format!("K:{}\n", song.key));

    let ids: Vec<&str> = active.iter().map(|part| part.abc_id()).collect();
    if let [s, a, t, b] = ids.as_slice() {
        combined.push_str(&format!("%%staves {{{} {}}} {{{} {}}}\n", s, a, t, b));
    } else {
        let staves: Vec<String> = ids.iter().map(|id| format!("[{}]", id)).collect();
        combined.push_str(&format!("%%staves {}\n", staves.join(" ")));
    }

    for part in active {
        let body = extract_music_body(song.part(part).unwrap_or_default());
        combined.push_str(&format!(
            "V:{} clef={} name=\"{}\"\n",
            part.abc_id(),
            part.clef(),
            part.label()
        ));
        combined.push_str(&body);
        combined.push('\n');
    }

    debug!(song = %song.id, voices = ids.len(), "combined parts into score");
    combined
}

/// The document without its field lines and `%%` directives, trimmed
pub fn extract_music_body(abc: &str) -> String {
    abc.lines()
        .filter(|line| !is_header_line(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Number of bar line characters in the body
pub fn count_measures(abc: &str) -> usize {
    extract_music_body(abc).matches('|').count()
}

/// Write a note list such as `C4 E4 G4 C5` as a one-voice ABC document in quarter notes.
///
/// Tokens that are not note names are copied into the body as they are, so a caller can mix
/// in ABC such as `z` or `C2`. Notes are grouped four to a bar. Returns an empty string when
/// the input contains no note letter at all.
pub fn melody_to_abc(melody: &str, key: &str, meter: &str, tempo: u32) -> String {
    let raw = melody.trim();
    if raw.is_empty() || !NOTE_LETTER.is_match(raw) {
        return String::new();
    }

    let tokens: Vec<String> = raw.split_whitespace().map(melody_token_to_abc).collect();
    let bars: Vec<String> = tokens.chunks(4).map(|bar| bar.join(" ")).collect();

    format!(
        "X:1\nT:Your Composition\nK:{}\nM:{}\nL:1/4\nQ:1/4={}\n| {} |]",
        key,
        meter,
        tempo,
        bars.join(" | ")
    )
}

fn melody_token_to_abc(token: &str) -> String {
    let Some(caps) = MELODY_NOTE.captures(token) else {
        return token.to_string();
    };
    let letter = &caps[1];
    let octave: u32 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(4);

    let mut note = String::new();
    match caps.get(2).map(|m| m.as_str()) {
        Some("#") => note.push('^'),
        Some("b") => note.push('_'),
        _ => {}
    }
    if octave >= 5 {
        note.push_str(&letter.to_ascii_lowercase());
        note.push_str(&"'".repeat((octave - 5) as usize));
    } else {
        note.push_str(&letter.to_ascii_uppercase());
        note.push_str(&",".repeat((4 - octave) as usize));
    }
    note
}

/// An empty staff in the given key and meter
pub fn fallback_document(key: &str, meter: &str) -> String {
    format!("X:1\nT:Composition\nK:{}\nM:{}\nL:1/4\n| z4 |]", key, meter)
}

/// Something that draws an ABC document
pub trait NotationRenderer {
    fn render(&mut self, document: &str) -> Result<(), MaestroError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The document was drawn
    Rendered,
    /// The document was empty; an empty staff was drawn
    Placeholder,
    /// The document was rejected; an empty staff was drawn instead
    Fallback { error: String },
}

/// Render `document`, or an empty staff if there is nothing to draw or the renderer fails.
///
/// Only when the empty staff itself cannot be drawn does this return an error.
pub fn render_with_fallback<R: NotationRenderer + ?Sized>(
    renderer: &mut R,
    document: &str,
    key: &str,
    meter: &str,
) -> Result<RenderOutcome, MaestroError> {
    let fallback = fallback_document(key, meter);

    if document.trim().is_empty() {
        renderer
            .render(&fallback)
            .map_err(|e| MaestroError::RenderError(e.to_string()))?;
        return Ok(RenderOutcome::Placeholder);
    }

    match renderer.render(document) {
        Ok(()) => Ok(RenderOutcome::Rendered),
        Err(err) => {
            warn!(%err, "rendering failed, drawing empty staff");
            renderer
                .render(&fallback)
                .map_err(|e| MaestroError::RenderError(e.to_string()))?;
            Ok(RenderOutcome::Fallback {
                error: err.to_string(),
            })
        }
    }
}
