//! An [`AudioBackend`] that writes every call to the log instead of making sound.

use async_trait::async_trait;
use maestro::playback::{AudioBackend, BackendState, Instrument, ScheduledTrigger, SynthProfile};
use maestro::MaestroError;
use tracing::{debug, info};

/// Logs backend calls and counts triggers. Starts suspended, like a fresh output context.
#[derive(Debug)]
pub struct LoggingBackend {
    state: BackendState,
    triggers: usize,
    loaded: Vec<Instrument>,
}

impl LoggingBackend {
    pub fn new() -> Self {
        Self {
            state: BackendState::Suspended,
            triggers: 0,
            loaded: Vec::new(),
        }
    }

    /// Triggers received since the last `cancel_all`
    pub fn triggers(&self) -> usize {
        self.triggers
    }

    pub fn loaded(&self) -> &[Instrument] {
        &self.loaded
    }
}

impl Default for LoggingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioBackend for LoggingBackend {
    fn state(&self) -> BackendState {
        self.state
    }

    async fn resume(&mut self) -> Result<(), MaestroError> {
        info!("audio context resumed");
        self.state = BackendState::Running;
        Ok(())
    }

    async fn load_instrument(
        &mut self,
        instrument: Instrument,
        profile: &SynthProfile,
    ) -> Result<(), MaestroError> {
        debug!(%instrument, volume_db = profile.volume_db, "load instrument");
        self.loaded.push(instrument);
        Ok(())
    }

    async fn set_bpm(&mut self, bpm: f64) -> Result<(), MaestroError> {
        debug!(bpm, "set bpm");
        Ok(())
    }

    async fn trigger(&mut self, trigger: &ScheduledTrigger) -> Result<(), MaestroError> {
        debug!(
            instrument = %trigger.instrument,
            pitch = %trigger.pitch,
            code = trigger.code,
            at = trigger.start_secs,
            "trigger"
        );
        self.triggers += 1;
        Ok(())
    }

    async fn set_volume_db(&mut self, instrument: Instrument, db: f64) -> Result<(), MaestroError> {
        debug!(%instrument, db, "set volume");
        Ok(())
    }

    async fn set_master_volume_db(&mut self, db: f64) -> Result<(), MaestroError> {
        debug!(db, "set master volume");
        Ok(())
    }

    async fn start(&mut self) -> Result<(), MaestroError> {
        info!(triggers = self.triggers, "transport started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), MaestroError> {
        debug!("transport stopped");
        Ok(())
    }

    async fn cancel_all(&mut self) -> Result<(), MaestroError> {
        self.triggers = 0;
        Ok(())
    }

    async fn reset_position(&mut self) -> Result<(), MaestroError> {
        Ok(())
    }

    async fn release_all(&mut self) -> Result<(), MaestroError> {
        Ok(())
    }
}
