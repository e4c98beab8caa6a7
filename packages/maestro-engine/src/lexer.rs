//! # ABC Body Lexer
//!
//! Tokenizes the music body of an ABC document in two steps:
//!
//! 1. [`music_body`] drops everything that carries no timing: header lines, `%` comments,
//!    chord symbols, decorations, grace notes, inline fields, bar lines, repeat and volta
//!    markers, and chord brackets. Repeats are not expanded.
//! 2. [`tokenize`] makes a single regex pass over what is left and produces the complete
//!    token list. Timing is computed afterwards by folding over that list.
//!
//! ## Token Types
//! - `Note` - accidental, letter, octave marks and raw length suffix (`^f'3/2`)
//! - `Rest` - `z` or invisible `x` with a raw length suffix
//! - `Tie` - `-` after a note
//! - `BrokenRhythm` - `>`, `>>`, `<`...
//! - `Tuplet` - `(3`, `(3:2`, `(3:2:3`
//! - `Unknown` - anything else; the parser reports and skips it

use once_cell::sync::Lazy;
use regex::Regex;

use crate::header::is_header_line;
use crate::pitch::PitchToken;

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"%.*$").unwrap());

/// Chord symbols and annotations, `!decorations!`, `+decorations+`, `{grace}` and `[K:inline]` fields
static NON_TIMING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""[^"]*"|![^!\s]*!|\+[^+\s]*\+|\{[^}]*\}|\[[A-Za-z]:[^\]]*\]"#).unwrap()
});

/// Bar lines, repeats and volta numbers
static BARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\||\|\]|\[\d+|:*\|+:*(?:\d+(?:[,-]\d+)*)?|::").unwrap()
});

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<tuplet>\((?P<p>[2-9])(?::(?P<q>\d*))?(?::(?P<r>\d*))?)",
        r"|(?P<note>(?P<acc>\^\^|\^|__|_|=)?(?P<letter>[A-Ga-g])(?P<oct>[,']*)(?P<len>\d*/*\d*))",
        r"|(?P<rest>[zx](?P<rlen>\d*/*\d*))",
        r"|(?P<tie>-)",
        r"|(?P<broken>>+|<+)",
        r"|(?P<ignored>[()~.`\\\s]|[HLMOPSTuvy])",
        r"|(?P<other>\S)",
    ))
    .unwrap()
});

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Note { pitch: PitchToken, length: String },
    Rest { length: String },
    Tie,
    /// `>` lengthens the first note (`longer_first`), `<` the second
    BrokenRhythm { count: u32, longer_first: bool },
    Tuplet { p: u32, q: Option<u32>, r: Option<u32> },
    Unknown,
}

/// A located token
#[derive(Debug, Clone, PartialEq)]
pub struct AbcToken {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset into the cleaned music body
    pub offset: usize,
}

/// The note-bearing text of a document, with all structural markup replaced by spaces.
/// Chord brackets are removed outright so `[CEG]2` reads as `CEG2`.
pub fn music_body(abc: &str) -> String {
    let joined = abc
        .lines()
        .filter(|line| !is_header_line(line))
        .map(|line| COMMENT.replace(line, "").into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    let without_markup = NON_TIMING.replace_all(&joined, " ");
    let without_bars = BARS.replace_all(&without_markup, " ");
    without_bars.replace(|c: char| c == '[' || c == ']', "")
}

/// Tokenize a cleaned music body. Whitespace, slurs and single-character ornaments are dropped.
pub fn tokenize(body: &str) -> Vec<AbcToken> {
    let mut tokens = Vec::new();

    for caps in TOKEN.captures_iter(body) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if caps.name("ignored").is_some() {
            continue;
        }

        let kind = if caps.name("tuplet").is_some() {
            let number = |name: &str| {
                caps.name(name)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .filter(|n| *n > 0)
            };
            TokenKind::Tuplet {
                p: number("p").unwrap_or(3),
                q: number("q"),
                r: number("r"),
            }
        } else if caps.name("note").is_some() {
            let accidental = caps.name("acc").map_or("", |m| m.as_str());
            let letter = caps
                .name("letter")
                .and_then(|m| m.as_str().chars().next())
                .unwrap_or('C');
            let octave = caps.name("oct").map_or("", |m| m.as_str());
            match PitchToken::from_parts(accidental, letter, octave) {
                Ok(pitch) => TokenKind::Note {
                    pitch,
                    length: caps.name("len").map_or("", |m| m.as_str()).to_string(),
                },
                Err(_) => TokenKind::Unknown,
            }
        } else if caps.name("rest").is_some() {
            TokenKind::Rest {
                length: caps.name("rlen").map_or("", |m| m.as_str()).to_string(),
            }
        } else if caps.name("tie").is_some() {
            TokenKind::Tie
        } else if let Some(m) = caps.name("broken") {
            TokenKind::BrokenRhythm {
                count: m.as_str().len() as u32,
                longer_first: m.as_str().starts_with('>'),
            }
        } else {
            TokenKind::Unknown
        };

        tokens.push(AbcToken {
            kind,
            text: whole.as_str().to_string(),
            offset: whole.start(),
        });
    }

    tokens
}

/// Clean and tokenize a whole document
pub fn tokenize_document(abc: &str) -> Vec<AbcToken> {
    tokenize(&music_body(abc))
}
