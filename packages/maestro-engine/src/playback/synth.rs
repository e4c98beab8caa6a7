//! Synthesis profiles per instrument.
//!
//! The four choir voices use plain oscillators with envelopes shaped for their register.
//! The accompaniment is an FM organ, the melody synth is a brighter triangle and the
//! metronome click is a short membrane hit.

use serde::Serialize;

use super::types::Instrument;
use crate::voice::VoicePart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Oscillator {
    Sine,
    Triangle,
    /// Triangle built from the first eight partials
    Triangle8,
    Square,
}

/// ADSR envelope; times in seconds, sustain as a level in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Envelope {
    pub const fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "method")]
pub enum Voicing {
    Subtractive {
        oscillator: Oscillator,
    },
    Fm {
        harmonicity: f64,
        modulation_index: f64,
        carrier: Oscillator,
        modulator: Oscillator,
        modulation_envelope: Envelope,
    },
    /// Sine with a fast downward pitch sweep over `octaves`
    Membrane {
        pitch_decay: f64,
        octaves: f64,
        oscillator: Oscillator,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SynthProfile {
    pub voicing: Voicing,
    pub envelope: Envelope,
    /// Level the instrument is created at, before any mixer gain
    pub volume_db: f64,
}

impl SynthProfile {
    pub fn for_instrument(instrument: Instrument) -> Self {
        match instrument {
            Instrument::Voice(part) => Self::voice(part),
            Instrument::Accompaniment => SynthProfile {
                voicing: Voicing::Fm {
                    harmonicity: 2.0,
                    modulation_index: 3.0,
                    carrier: Oscillator::Sine,
                    modulator: Oscillator::Square,
                    modulation_envelope: Envelope::new(0.02, 0.1, 0.5, 0.5),
                },
                envelope: Envelope::new(0.01, 0.2, 0.8, 1.0),
                volume_db: -12.0,
            },
            Instrument::Melody => SynthProfile {
                voicing: Voicing::Subtractive {
                    oscillator: Oscillator::Triangle8,
                },
                envelope: Envelope::new(0.02, 0.1, 0.3, 0.8),
                volume_db: -6.0,
            },
            Instrument::Click => SynthProfile {
                voicing: Voicing::Membrane {
                    pitch_decay: 0.008,
                    octaves: 2.0,
                    oscillator: Oscillator::Sine,
                },
                envelope: Envelope::new(0.001, 0.1, 0.0, 0.1),
                volume_db: -10.0,
            },
        }
    }

    fn voice(part: VoicePart) -> Self {
        let (oscillator, envelope) = match part {
            VoicePart::Soprano => (Oscillator::Sine, Envelope::new(0.08, 0.15, 0.7, 0.8)),
            VoicePart::Alto => (Oscillator::Sine, Envelope::new(0.07, 0.18, 0.65, 0.7)),
            VoicePart::Tenor => (Oscillator::Triangle, Envelope::new(0.06, 0.15, 0.6, 0.6)),
            VoicePart::Bass => (Oscillator::Triangle, Envelope::new(0.05, 0.2, 0.55, 0.5)),
        };
        SynthProfile {
            voicing: Voicing::Subtractive { oscillator },
            envelope,
            volume_db: -8.0,
        }
    }
}
