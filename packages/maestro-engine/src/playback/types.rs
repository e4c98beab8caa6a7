//! Playback type definitions
//!
//! Instruments, the triggers handed to the audio backend, and the outcome of a play call.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::duration::DurationCategory;
use crate::pitch::SpelledPitch;
use crate::voice::VoicePart;

/// A synthesis voice owned by the playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub enum Instrument {
    /// One of the four choir parts
    Voice(VoicePart),
    /// Organ doubling the bass line
    Accompaniment,
    /// Single-line synth for composed melodies
    Melody,
    /// Metronome click
    Click,
}

impl Instrument {
    pub const ALL: [Instrument; 7] = [
        Instrument::Voice(VoicePart::Soprano),
        Instrument::Voice(VoicePart::Alto),
        Instrument::Voice(VoicePart::Tenor),
        Instrument::Voice(VoicePart::Bass),
        Instrument::Accompaniment,
        Instrument::Melody,
        Instrument::Click,
    ];
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Voice(part) => write!(f, "{}", part),
            Instrument::Accompaniment => f.write_str("accompaniment"),
            Instrument::Melody => f.write_str("melody"),
            Instrument::Click => f.write_str("click"),
        }
    }
}

impl From<Instrument> for String {
    fn from(instrument: Instrument) -> Self {
        instrument.to_string()
    }
}

/// Readiness of the backend's output context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendState {
    Running,
    Suspended,
}

/// One note trigger on the shared transport clock.
///
/// `start_secs` is measured from the transport's zero point; `release_secs` is how long the
/// note is held before its envelope releases.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTrigger {
    pub instrument: Instrument,
    #[serde(serialize_with = "serialize_pitch")]
    pub pitch: SpelledPitch,
    pub category: DurationCategory,
    /// Backend duration code such as `4n` or `8t`
    pub code: &'static str,
    pub start_secs: f64,
    pub release_secs: f64,
}

fn serialize_pitch<S: Serializer>(pitch: &SpelledPitch, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(pitch)
}

/// How a play call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackOutcome {
    /// Every note played and the trailing margin elapsed
    Completed,
    /// A newer play call took over the transport
    Superseded,
    /// `stop_all` was called
    Stopped,
}
