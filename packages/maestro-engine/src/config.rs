//! Engine configuration, read from YAML.
//!
//! ```yaml
//! default-tempo: 92
//! trailing-margin-secs: 0.75
//! voice-gain:
//!   floor-db: -40
//!   span-db: 35
//! pitch-convention: standard
//! default-unit: 1/4
//! ```
//!
//! Every key is optional; missing keys take the defaults of [`EngineConfig::default`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::duration::UnitLength;
use crate::error::MaestroError;
use crate::parser::abc::AbcOptions;
use crate::pitch::PitchConvention;

/// Tempo used when a song or request carries none
pub const DEFAULT_TEMPO: u32 = 100;

/// Seconds of silence after the last note before playback stops
pub const TRAILING_MARGIN_SECS: f64 = 0.5;

/// Linear map from a 0-100 volume to decibels: `floor + v / 100 * span`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GainRange {
    pub floor_db: f64,
    pub span_db: f64,
}

impl GainRange {
    pub const VOICE: GainRange = GainRange {
        floor_db: -40.0,
        span_db: 35.0,
    };

    pub const MASTER: GainRange = GainRange {
        floor_db: -60.0,
        span_db: 60.0,
    };

    pub fn gain_db(&self, volume: u8) -> f64 {
        self.floor_db + f64::from(volume.min(100)) * self.span_db / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineConfig {
    pub default_tempo: u32,
    pub trailing_margin_secs: f64,
    pub voice_gain: GainRange,
    pub master_gain: GainRange,
    pub default_voice_volume: u8,
    pub default_accompaniment_volume: u8,
    pub pitch_convention: PitchConvention,
    pub default_unit: UnitLength,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_tempo: DEFAULT_TEMPO,
            trailing_margin_secs: TRAILING_MARGIN_SECS,
            voice_gain: GainRange::VOICE,
            master_gain: GainRange::MASTER,
            default_voice_volume: 80,
            default_accompaniment_volume: 70,
            pitch_convention: PitchConvention::default(),
            default_unit: UnitLength::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(content: &str) -> Result<Self, MaestroError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MaestroError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MaestroError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<(), MaestroError> {
        if self.default_tempo == 0 {
            return Err(MaestroError::ConfigError(
                "default-tempo must be positive".to_string(),
            ));
        }
        if self.trailing_margin_secs.is_nan() || self.trailing_margin_secs < 0.0 {
            return Err(MaestroError::ConfigError(
                "trailing-margin-secs must not be negative".to_string(),
            ));
        }
        if self.default_voice_volume > 100 || self.default_accompaniment_volume > 100 {
            return Err(MaestroError::ConfigError(
                "volumes are on a 0-100 scale".to_string(),
            ));
        }
        Ok(())
    }

    /// Parser options for the full ABC parser
    pub fn abc_options(&self) -> AbcOptions {
        AbcOptions {
            convention: self.pitch_convention,
            default_unit: self.default_unit,
        }
    }
}
