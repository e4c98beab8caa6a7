//! # Playback Module
//!
//! Schedule parsed voices on an external audio backend.
//!
//! ## Sub-modules
//! - `types` - Instrument, ScheduledTrigger, PlaybackOutcome
//! - `engine` - Pure planning from timed notes to triggers on one clock
//! - `synth` - Oscillator and envelope profile per instrument
//! - `mixer` - Mute, solo and volume per voice
//! - `metronome` - Click track with an accented downbeat
//! - `scheduler` - The async scheduler and the [`AudioBackend`] seam
//!
//! ## Timing
//!
//! A note at `start_beat` fires `start_beat * 60 / bpm` seconds after the transport starts
//! and is held for its duration category. The transport stops `margin` seconds after the
//! latest note ends, so the final release can ring out.
//!
//! ## Example
//! ```rust
//! use maestro::parser::abc::parse_abc;
//! use maestro::playback::{Instrument, PlaybackPlan};
//! use maestro::VoicePart;
//!
//! let soprano = parse_abc("L:1/4\nC D E2", VoicePart::Soprano);
//! let plan = PlaybackPlan::build(
//!     &[(Instrument::Voice(VoicePart::Soprano), soprano.notes.as_slice())],
//!     120.0,
//!     0.5,
//! );
//!
//! assert_eq!(plan.triggers.len(), 3);
//! assert_eq!(plan.triggers[2].code, "2n");
//! assert_eq!(plan.end_secs, 2.0);
//! assert_eq!(plan.stop_at_secs, 2.5);
//! ```

mod engine;
mod metronome;
mod mixer;
mod scheduler;
mod synth;
mod types;

#[cfg(test)]
mod tests;

pub use engine::PlaybackPlan;
pub use metronome::{Metronome, MAX_BPM, MIN_BPM};
pub use mixer::{AccompanimentChannel, MixerState, VoiceChannel};
pub use scheduler::{AudioBackend, PlaybackScheduler, ACCOMPANIMENT_SOLO_DB};
pub use synth::{Envelope, Oscillator, SynthProfile, Voicing};
pub use types::{BackendState, Instrument, PlaybackOutcome, ScheduledTrigger};
