//! Per-voice mixer state: mute, solo and volume.
//!
//! A voice is audible when it is not muted and either nothing is soloed or it is.
//! Volumes are on a 0-100 scale and map linearly to decibels through a [`GainRange`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{EngineConfig, GainRange};
use crate::voice::VoicePart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoiceChannel {
    pub muted: bool,
    pub solo: bool,
    pub volume: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccompanimentChannel {
    pub muted: bool,
    pub volume: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerState {
    voices: BTreeMap<VoicePart, VoiceChannel>,
    accompaniment: AccompanimentChannel,
    master_volume: u8,
    #[serde(skip)]
    voice_gain: GainRange,
    #[serde(skip)]
    master_gain: GainRange,
}

impl Default for MixerState {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, 100) as u8
}

impl MixerState {
    pub fn new(config: &EngineConfig) -> Self {
        let channel = VoiceChannel {
            muted: false,
            solo: false,
            volume: config.default_voice_volume.min(100),
        };
        Self {
            voices: VoicePart::ALL.into_iter().map(|part| (part, channel)).collect(),
            accompaniment: AccompanimentChannel {
                muted: false,
                volume: config.default_accompaniment_volume.min(100),
            },
            master_volume: 80,
            voice_gain: config.voice_gain,
            master_gain: config.master_gain,
        }
    }

    pub fn voice(&self, part: VoicePart) -> VoiceChannel {
        self.voices.get(&part).copied().unwrap_or(VoiceChannel {
            muted: false,
            solo: false,
            volume: 0,
        })
    }

    pub fn accompaniment(&self) -> AccompanimentChannel {
        self.accompaniment
    }

    pub fn master_volume(&self) -> u8 {
        self.master_volume
    }

    fn channel_mut(&mut self, part: VoicePart) -> &mut VoiceChannel {
        self.voices.entry(part).or_insert(VoiceChannel {
            muted: false,
            solo: false,
            volume: 0,
        })
    }

    /// Flip mute; returns the new state
    pub fn toggle_mute(&mut self, part: VoicePart) -> bool {
        let channel = self.channel_mut(part);
        channel.muted = !channel.muted;
        channel.muted
    }

    /// Flip solo; returns the new state
    pub fn toggle_solo(&mut self, part: VoicePart) -> bool {
        let channel = self.channel_mut(part);
        channel.solo = !channel.solo;
        channel.solo
    }

    pub fn set_volume(&mut self, part: VoicePart, volume: i32) {
        self.channel_mut(part).volume = clamp_volume(volume);
    }

    pub fn set_accompaniment_volume(&mut self, volume: i32) {
        self.accompaniment.volume = clamp_volume(volume);
    }

    pub fn toggle_accompaniment_mute(&mut self) -> bool {
        self.accompaniment.muted = !self.accompaniment.muted;
        self.accompaniment.muted
    }

    pub fn set_master_volume(&mut self, volume: i32) {
        self.master_volume = clamp_volume(volume);
    }

    pub fn any_solo(&self) -> bool {
        self.voices.values().any(|channel| channel.solo)
    }

    pub fn is_audible(&self, part: VoicePart) -> bool {
        let channel = self.voice(part);
        !channel.muted && (!self.any_solo() || channel.solo)
    }

    /// Gain for a voice, `-inf` when it should not be heard
    pub fn voice_gain_db(&self, part: VoicePart) -> f64 {
        if !self.is_audible(part) {
            return f64::NEG_INFINITY;
        }
        self.voice_gain.gain_db(self.voice(part).volume)
    }

    /// Organ gain. Solo on a voice does not silence the organ; only its own mute does.
    pub fn accompaniment_gain_db(&self) -> f64 {
        if self.accompaniment.muted {
            return f64::NEG_INFINITY;
        }
        self.voice_gain.gain_db(self.accompaniment.volume)
    }

    pub fn master_gain_db(&self) -> f64 {
        if self.master_volume == 0 {
            return f64::NEG_INFINITY;
        }
        self.master_gain.gain_db(self.master_volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_gains() {
        let mixer = MixerState::default();
        assert_relative_eq!(mixer.voice_gain_db(VoicePart::Alto), -12.0);
        assert_relative_eq!(mixer.accompaniment_gain_db(), -15.5);
        assert_relative_eq!(mixer.master_gain_db(), -12.0);
    }

    #[test]
    fn test_mute_and_solo() {
        let mut mixer = MixerState::default();
        assert!(mixer.toggle_mute(VoicePart::Tenor));
        assert!(!mixer.is_audible(VoicePart::Tenor));
        assert_eq!(mixer.voice_gain_db(VoicePart::Tenor), f64::NEG_INFINITY);

        assert!(mixer.toggle_solo(VoicePart::Soprano));
        assert!(mixer.is_audible(VoicePart::Soprano));
        assert!(!mixer.is_audible(VoicePart::Alto));

        // a muted soloist stays silent
        mixer.toggle_solo(VoicePart::Tenor);
        assert!(!mixer.is_audible(VoicePart::Tenor));

        mixer.toggle_solo(VoicePart::Soprano);
        mixer.toggle_solo(VoicePart::Tenor);
        assert!(!mixer.any_solo());
        assert!(mixer.is_audible(VoicePart::Alto));
        assert!(mixer.accompaniment_gain_db().is_finite());
    }

    #[test]
    fn test_volume_clamping() {
        let mut mixer = MixerState::default();
        mixer.set_volume(VoicePart::Bass, 250);
        assert_eq!(mixer.voice(VoicePart::Bass).volume, 100);
        assert_relative_eq!(mixer.voice_gain_db(VoicePart::Bass), -5.0);
        mixer.set_volume(VoicePart::Bass, -3);
        assert_relative_eq!(mixer.voice_gain_db(VoicePart::Bass), -40.0);
    }

    #[test]
    fn test_accompaniment_and_master() {
        let mut mixer = MixerState::default();
        mixer.set_accompaniment_volume(100);
        assert_relative_eq!(mixer.accompaniment_gain_db(), -5.0);
        assert!(mixer.toggle_accompaniment_mute());
        assert_eq!(mixer.accompaniment_gain_db(), f64::NEG_INFINITY);

        mixer.set_master_volume(0);
        assert_eq!(mixer.master_gain_db(), f64::NEG_INFINITY);
        mixer.set_master_volume(100);
        assert_relative_eq!(mixer.master_gain_db(), 0.0);
    }
}
