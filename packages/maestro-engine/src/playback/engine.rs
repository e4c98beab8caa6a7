//! Playback plan generation
//!
//! Turns timed notes from one or more instruments into triggers on a single clock. All
//! instruments share the zero point, so notes on the same beat in different voices get the
//! same `start_secs`.

use serde::Serialize;
use tracing::warn;

use super::types::{Instrument, ScheduledTrigger};
use crate::config::DEFAULT_TEMPO;
use crate::parser::TimedNote;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackPlan {
    pub bpm: f64,
    /// Ordered by start time; simultaneous triggers keep track order
    pub triggers: Vec<ScheduledTrigger>,
    /// End of the last note or rest
    pub end_secs: f64,
    /// When the transport is stopped
    pub stop_at_secs: f64,
}

impl PlaybackPlan {
    /// Schedule every track at `tempo` quarter notes per minute.
    ///
    /// Rests produce no trigger but still count toward the end time. A tempo that is not a
    /// positive number falls back to the default tempo.
    pub fn build(tracks: &[(Instrument, &[TimedNote])], tempo: f64, margin_secs: f64) -> Self {
        let bpm = if tempo.is_finite() && tempo > 0.0 {
            tempo
        } else {
            warn!(tempo, "invalid tempo, using default");
            f64::from(DEFAULT_TEMPO)
        };
        let seconds_per_beat = 60.0 / bpm;

        let mut triggers = Vec::new();
        let mut end_beat: f64 = 0.0;

        for (instrument, notes) in tracks {
            for note in notes.iter() {
                end_beat = end_beat.max(note.end_beat());
                let Some(pitch) = note.pitch.tone() else {
                    continue;
                };
                triggers.push(ScheduledTrigger {
                    instrument: *instrument,
                    pitch,
                    category: note.duration_category,
                    code: note.duration_category.code(),
                    start_secs: note.start_beat * seconds_per_beat,
                    release_secs: note.duration_category.seconds(bpm),
                });
            }
        }
        triggers.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        let end_secs = end_beat * seconds_per_beat;
        Self {
            bpm,
            triggers,
            end_secs,
            stop_at_secs: end_secs + margin_secs.max(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Instruments that have at least one trigger, in first-use order
    pub fn instruments(&self) -> Vec<Instrument> {
        let mut seen = Vec::new();
        for trigger in &self.triggers {
            if !seen.contains(&trigger.instrument) {
                seen.push(trigger.instrument);
            }
        }
        seen
    }
}
