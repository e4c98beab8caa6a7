//! Full ABC parser.
//!
//! Reads `K:`, `L:` and `M:` from the document, tokenizes the music body once and folds the
//! tokens into a timeline. Pitches are resolved for one voice part and clamped into its range.
//! Rests advance the clock but are not emitted.
//!
//! The event collection and folding steps are shared with the duration-aware parser in
//! [`super::melody`], which differs only in pitch placement and rest policy.

use tracing::{debug, warn};

use super::{Diagnostic, DiagnosticKind, ParsedVoice, Timeline};
use crate::duration::{parse_length, NoteDuration, UnitLength};
use crate::header::{split_voices, AbcHeader, Meter};
use crate::lexer::{tokenize_document, AbcToken, TokenKind};
use crate::pitch::{NotePitch, PitchConvention, PitchToken, SpelledPitch};
use crate::theory::KeySignature;
use crate::voice::VoicePart;

/// Knobs for [`parse_abc_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbcOptions {
    pub convention: PitchConvention,
    /// Unit length when the document has no `L:` field
    pub default_unit: UnitLength,
}

/// Parse one voice of an ABC document with the voice-relative octave convention.
///
/// When the document declares `V:` voices, only the section for `voice` is read; a document
/// that declares voices but not this one yields an empty result.
pub fn parse_abc(abc: &str, voice: VoicePart) -> ParsedVoice {
    parse_abc_with(abc, voice, AbcOptions::default())
}

pub fn parse_abc_with(abc: &str, voice: VoicePart, options: AbcOptions) -> ParsedVoice {
    if abc.trim().is_empty() {
        return ParsedVoice::default();
    }

    let sections = split_voices(abc);
    let document = if sections.is_empty() {
        abc.to_string()
    } else {
        match sections.into_iter().find(|section| section.part == Some(voice)) {
            Some(section) => section.document,
            None => {
                debug!(voice = %voice, "document has no section for voice");
                return ParsedVoice::default();
            }
        }
    };

    let mut diagnostics = Vec::new();
    let context = Context::from_document(
        &document,
        Placement::Voice {
            voice,
            convention: options.convention,
        },
        options.default_unit,
        &mut diagnostics,
    );
    let events = collect_events(&tokenize_document(&document), &context, &mut diagnostics);
    fold_events(events, RestPolicy::Gap, diagnostics)
}

/// How note tokens become absolute pitches
#[derive(Debug, Clone, Copy)]
pub(crate) enum Placement {
    /// Resolve for a voice and clamp into its range
    Voice {
        voice: VoicePart,
        convention: PitchConvention,
    },
    /// Standard octaves, respelled with sharps, no clamping
    SharpsOnly,
}

/// Document-level settings every token is read against
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub key: KeySignature,
    pub unit: UnitLength,
    pub meter: Meter,
    pub placement: Placement,
}

impl Context {
    pub(crate) fn from_document(
        abc: &str,
        placement: Placement,
        default_unit: UnitLength,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let header = AbcHeader::parse(abc);
        let key = match header.key_signature() {
            Ok(key) => key,
            Err(err) => {
                let raw = header.key.clone().unwrap_or_default();
                warn!(key = %raw, "unknown key signature, using C major");
                diagnostics.push(
                    Diagnostic::new(DiagnosticKind::UnknownKey, err.to_string()).with_token(&raw),
                );
                KeySignature::default()
            }
        };
        Self {
            key,
            unit: header.unit.unwrap_or(default_unit),
            meter: header.meter.unwrap_or_default(),
            placement,
        }
    }

    fn place(
        &self,
        token: &PitchToken,
        text: &str,
        offset: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> SpelledPitch {
        match self.placement {
            Placement::Voice { voice, convention } => token.resolve(&self.key, voice, convention),
            Placement::SharpsOnly => {
                let written = SpelledPitch::new(
                    token.letter,
                    token.sounding_accidental(&self.key),
                    token.standard_octave(),
                );
                let folded = written.to_sharp_spelling();
                if (0..=9).contains(&folded.octave) {
                    folded
                } else {
                    warn!(token = text, "pitch out of range, using middle C");
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::FallbackPitch,
                            format!("octave {} is out of range", folded.octave),
                        )
                        .at(text, offset),
                    );
                    SpelledPitch::MIDDLE_C
                }
            }
        }
    }
}

/// A note or rest with its final length, before ties are merged
#[derive(Debug, Clone)]
pub(crate) struct Event {
    pub pitch: NotePitch,
    pub beats: f64,
    /// Followed by `-`
    pub tied: bool,
    pub text: String,
    pub offset: usize,
}

/// What happens to rests when folding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RestPolicy {
    /// Advance the cursor only
    Gap,
    /// Emit a `rest` entry
    Entry,
}

/// Default tuplet `q` for a given `p`
fn tuplet_q(p: u32, meter: &Meter) -> u32 {
    match p {
        2 | 4 | 8 => 3,
        3 | 6 => 2,
        _ if meter.is_compound() => 3,
        _ => 2,
    }
}

/// Resolve pitches and lengths, applying tuplets and broken rhythm.
pub(crate) fn collect_events(
    tokens: &[AbcToken],
    context: &Context,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::with_capacity(tokens.len());
    // (factor, notes remaining)
    let mut tuplet: Option<(f64, u32)> = None;
    let mut pending_broken: Option<f64> = None;

    for token in tokens {
        let (pitch, length) = match &token.kind {
            TokenKind::Note { pitch, length } => (
                NotePitch::Tone(context.place(pitch, &token.text, token.offset, diagnostics)),
                length,
            ),
            TokenKind::Rest { length } => (NotePitch::Rest, length),
            TokenKind::Tie => {
                match events.last_mut() {
                    Some(last) if !last.pitch.is_rest() => last.tied = true,
                    _ => diagnostics.push(
                        Diagnostic::new(DiagnosticKind::UnmatchedTie, "tie without a note before it")
                            .at(&token.text, token.offset),
                    ),
                }
                continue;
            }
            TokenKind::BrokenRhythm {
                count,
                longer_first,
            } => {
                let short = 0.5f64.powi(*count as i32);
                let long = 2.0 - short;
                match events.last_mut() {
                    Some(last) => {
                        last.beats *= if *longer_first { long } else { short };
                        pending_broken = Some(if *longer_first { short } else { long });
                    }
                    None => {
                        debug!(token = %token.text, "broken rhythm with no note before it");
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticKind::SkippedToken,
                                "broken rhythm with no note before it",
                            )
                            .at(&token.text, token.offset),
                        );
                    }
                }
                continue;
            }
            TokenKind::Tuplet { p, q, r } => {
                let q = q.unwrap_or_else(|| tuplet_q(*p, &context.meter));
                tuplet = Some((q as f64 / *p as f64, r.unwrap_or(*p)));
                continue;
            }
            TokenKind::Unknown => {
                debug!(token = %token.text, offset = token.offset, "skipping unrecognized token");
                diagnostics.push(
                    Diagnostic::new(DiagnosticKind::SkippedToken, "unrecognized token")
                        .at(&token.text, token.offset),
                );
                continue;
            }
        };

        let multiplier = parse_length(length).unwrap_or_else(|| {
            debug!(token = %token.text, "malformed length, using one unit");
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DefaultedLength,
                    format!("length '{}' counts as one unit", length),
                )
                .at(&token.text, token.offset),
            );
            1.0
        });

        let mut beats = multiplier * context.unit.fraction() * 4.0;
        if let Some(factor) = pending_broken.take() {
            beats *= factor;
        }
        if let Some((factor, remaining)) = tuplet {
            beats *= factor;
            tuplet = (remaining > 1).then_some((factor, remaining - 1));
        }

        events.push(Event {
            pitch,
            beats,
            tied: false,
            text: token.text.clone(),
            offset: token.offset,
        });
    }

    events
}

/// Merge ties and lay the events out on a timeline.
pub(crate) fn fold_events(
    events: Vec<Event>,
    rests: RestPolicy,
    diagnostics: Vec<Diagnostic>,
) -> ParsedVoice {
    let mut timeline = Timeline::new();
    for diagnostic in diagnostics {
        timeline.diagnose(diagnostic);
    }

    // MIDI number of a note still waiting for its tie partner
    let mut open_tie: Option<i32> = None;

    for event in events {
        if let Some(midi) = open_tie.take() {
            match event.pitch.tone() {
                Some(pitch) if pitch.midi() == midi => {
                    timeline.extend_last(event.beats);
                    if event.tied {
                        open_tie = Some(midi);
                    }
                    continue;
                }
                _ => timeline.diagnose(
                    Diagnostic::new(
                        DiagnosticKind::UnmatchedTie,
                        "tie does not lead to the same pitch",
                    )
                    .at(&event.text, event.offset),
                ),
            }
        }

        match event.pitch {
            NotePitch::Tone(pitch) => {
                timeline.push(event.pitch, NoteDuration::from_beats(event.beats));
                if event.tied {
                    open_tie = Some(pitch.midi());
                }
            }
            NotePitch::Rest => match rests {
                RestPolicy::Gap => timeline.rest(event.beats),
                RestPolicy::Entry => {
                    timeline.push(NotePitch::Rest, NoteDuration::from_beats(event.beats))
                }
            },
        }
    }

    if open_tie.is_some() {
        timeline.diagnose(Diagnostic::new(
            DiagnosticKind::UnmatchedTie,
            "tie at the end of the voice",
        ));
    }

    timeline.finish()
}
