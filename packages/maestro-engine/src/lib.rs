//! # Maestro
//!
//! Turns choir notation (ABC documents, sol-fa, plain note lists) into timed note events
//! and schedules them on an audio backend.
//!
//! ```rust
//! use maestro::{parse_abc, VoicePart};
//!
//! let voice = parse_abc("X:1\nK:G\nL:1/4\nG A B c", VoicePart::Soprano);
//! assert_eq!(voice.pitches(), vec!["G5", "A5", "B5", "C6"]);
//! assert_eq!(voice.total_beats, 4.0);
//! ```

pub mod config;
pub mod directive;
pub mod duration;
pub mod error;
pub mod harmony;
pub mod header;
pub mod lexer;
pub mod parser;
pub mod pitch;
pub mod playback;
pub mod score;
pub mod song;
pub mod theory;
pub mod transpose;
pub mod voice;

pub use config::{EngineConfig, GainRange, DEFAULT_TEMPO, TRAILING_MARGIN_SECS};
pub use directive::{ChatReply, ComponentDirective, ComponentType, DirectiveProps};
pub use duration::{DurationCategory, NoteDuration, UnitLength};
pub use error::*;
pub use harmony::harmonize_in_thirds;
pub use parser::abc::{parse_abc, parse_abc_with, AbcOptions};
pub use parser::melody::{parse_abc_with_durations, parse_note_list, total_duration_seconds};
pub use parser::solfa::{parse_solfa, SolfaOptions};
pub use parser::{Diagnostic, DiagnosticKind, ParsedVoice, TimedNote};
pub use pitch::{resolve_pitch, NotePitch, PitchConvention, SpelledPitch};
pub use score::{combine_parts, melody_to_abc, render_with_fallback, NotationRenderer, RenderOutcome};
pub use song::{Song, SongLibrary, Transcription};
pub use theory::KeySignature;
pub use transpose::{transpose_abc, transpose_melody};
pub use voice::VoicePart;
