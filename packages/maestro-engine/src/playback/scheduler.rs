//! Playback scheduler
//!
//! Drives an [`AudioBackend`] through one shared transport. A play call loads the
//! instruments on first use, clears whatever was scheduled before, pushes every trigger
//! of its [`PlaybackPlan`], starts the transport and then waits for the auto-stop point.
//!
//! Only one play call owns the transport at a time. Starting another one cancels the
//! first, whose future resolves with [`PlaybackOutcome::Superseded`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::engine::PlaybackPlan;
use super::metronome::Metronome;
use super::mixer::MixerState;
use super::synth::SynthProfile;
use super::types::{BackendState, Instrument, PlaybackOutcome, ScheduledTrigger};
use crate::config::EngineConfig;
use crate::duration::DurationCategory;
use crate::error::MaestroError;
use crate::parser::TimedNote;
use crate::pitch::{NotePitch, SpelledPitch};
use crate::voice::VoicePart;

/// Organ level while it plays on its own
pub const ACCOMPANIMENT_SOLO_DB: f64 = -8.0;

/// Synthesis and transport, as seen by the scheduler
#[async_trait]
pub trait AudioBackend: Send {
    /// Whether the output context is running
    fn state(&self) -> BackendState;

    /// Bring a suspended output context to running
    async fn resume(&mut self) -> Result<(), MaestroError>;

    /// Create the synth for an instrument. Called once per instrument per session.
    async fn load_instrument(
        &mut self,
        instrument: Instrument,
        profile: &SynthProfile,
    ) -> Result<(), MaestroError>;

    async fn set_bpm(&mut self, bpm: f64) -> Result<(), MaestroError>;

    async fn trigger(&mut self, trigger: &ScheduledTrigger) -> Result<(), MaestroError>;

    async fn set_volume_db(&mut self, instrument: Instrument, db: f64) -> Result<(), MaestroError>;

    async fn set_master_volume_db(&mut self, db: f64) -> Result<(), MaestroError>;

    async fn start(&mut self) -> Result<(), MaestroError>;

    async fn stop(&mut self) -> Result<(), MaestroError>;

    /// Drop every scheduled trigger
    async fn cancel_all(&mut self) -> Result<(), MaestroError>;

    /// Move the transport back to zero
    async fn reset_position(&mut self) -> Result<(), MaestroError>;

    /// Release every sounding note
    async fn release_all(&mut self) -> Result<(), MaestroError>;
}

struct Session<B> {
    backend: B,
    loaded: bool,
}

impl<B: AudioBackend> Session<B> {
    async fn ensure_loaded(&mut self) -> Result<(), MaestroError> {
        if self.loaded {
            return Ok(());
        }
        for instrument in Instrument::ALL {
            let profile = SynthProfile::for_instrument(instrument);
            self.backend.load_instrument(instrument, &profile).await?;
        }
        self.loaded = true;
        Ok(())
    }

    async fn ensure_running(&mut self) -> Result<(), MaestroError> {
        if self.backend.state() != BackendState::Running {
            debug!("audio backend suspended, resuming");
            self.backend.resume().await?;
        }
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), MaestroError> {
        self.backend.cancel_all().await?;
        self.backend.stop().await?;
        self.backend.reset_position().await?;
        self.backend.release_all().await
    }

    async fn apply_mixer(&mut self, mixer: &MixerState) -> Result<(), MaestroError> {
        for part in VoicePart::ALL {
            self.backend
                .set_volume_db(Instrument::Voice(part), mixer.voice_gain_db(part))
                .await?;
        }
        self.backend
            .set_volume_db(Instrument::Accompaniment, mixer.accompaniment_gain_db())
            .await?;
        self.backend.set_master_volume_db(mixer.master_gain_db()).await
    }

    /// Everything between taking the transport and starting it
    async fn schedule(
        &mut self,
        plan: &PlaybackPlan,
        mixer: &MixerState,
        accompaniment_solo: bool,
    ) -> Result<(), MaestroError> {
        self.ensure_loaded().await?;
        self.ensure_running().await?;
        self.clear().await?;
        self.apply_mixer(mixer).await?;
        if accompaniment_solo {
            self.backend
                .set_volume_db(Instrument::Accompaniment, ACCOMPANIMENT_SOLO_DB)
                .await?;
        }
        self.backend.set_bpm(plan.bpm).await?;
        for trigger in &plan.triggers {
            self.backend.trigger(trigger).await?;
        }
        self.backend.start().await
    }
}

struct ActivePlay {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Transport {
    active: Option<ActivePlay>,
    generation: u64,
}

pub struct PlaybackScheduler<B> {
    session: Arc<Mutex<Session<B>>>,
    mixer: Mutex<MixerState>,
    transport: Mutex<Transport>,
    margin_secs: f64,
}

impl<B: AudioBackend> PlaybackScheduler<B> {
    pub fn new(backend: B, config: &EngineConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session {
                backend,
                loaded: false,
            })),
            mixer: Mutex::new(MixerState::new(config)),
            transport: Mutex::new(Transport::default()),
            margin_secs: config.trailing_margin_secs,
        }
    }

    /// Run `f` against the backend
    pub async fn with_backend<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        let session = self.session.lock().await;
        f(&session.backend)
    }

    /// Whether a play call currently owns the transport
    pub async fn is_playing(&self) -> bool {
        self.transport.lock().await.active.is_some()
    }

    pub async fn mixer(&self) -> MixerState {
        self.mixer.lock().await.clone()
    }

    /// Play one choir part
    #[instrument(skip(self, notes), fields(notes = notes.len()))]
    pub async fn play_voice(
        &self,
        part: VoicePart,
        notes: &[TimedNote],
        tempo: f64,
    ) -> Result<PlaybackOutcome, MaestroError> {
        let plan = PlaybackPlan::build(&[(Instrument::Voice(part), notes)], tempo, self.margin_secs);
        self.run(plan, false).await
    }

    /// Play every given part together, with the organ doubling the bass line when asked
    #[instrument(skip(self, parts), fields(parts = parts.len()))]
    pub async fn play_all(
        &self,
        parts: &BTreeMap<VoicePart, Vec<TimedNote>>,
        tempo: f64,
        with_organ: bool,
    ) -> Result<PlaybackOutcome, MaestroError> {
        let mut tracks: Vec<(Instrument, &[TimedNote])> = parts
            .iter()
            .map(|(part, notes)| (Instrument::Voice(*part), notes.as_slice()))
            .collect();
        if with_organ {
            if let Some(bass) = parts.get(&VoicePart::Bass).filter(|n| !n.is_empty()) {
                tracks.push((Instrument::Accompaniment, bass.as_slice()));
            }
        }
        let plan = PlaybackPlan::build(&tracks, tempo, self.margin_secs);
        self.run(plan, false).await
    }

    /// Play the organ alone at a fixed level; the mixer level comes back afterwards
    #[instrument(skip(self, notes), fields(notes = notes.len()))]
    pub async fn play_accompaniment_only(
        &self,
        notes: &[TimedNote],
        tempo: f64,
    ) -> Result<PlaybackOutcome, MaestroError> {
        let plan = PlaybackPlan::build(&[(Instrument::Accompaniment, notes)], tempo, self.margin_secs);
        self.run(plan, true).await
    }

    /// Play a composed melody on the melody synth
    #[instrument(skip(self, notes), fields(notes = notes.len()))]
    pub async fn play_melody(
        &self,
        notes: &[TimedNote],
        tempo: f64,
    ) -> Result<PlaybackOutcome, MaestroError> {
        let plan = PlaybackPlan::build(&[(Instrument::Melody, notes)], tempo, self.margin_secs);
        self.run(plan, false).await
    }

    /// Click `beats` beats on the metronome synth
    #[instrument(skip(self))]
    pub async fn play_metronome(
        &self,
        metronome: &Metronome,
        beats: u32,
    ) -> Result<PlaybackOutcome, MaestroError> {
        let clicks = metronome.track(beats);
        let plan = PlaybackPlan::build(
            &[(Instrument::Click, clicks.as_slice())],
            f64::from(metronome.bpm()),
            self.margin_secs,
        );
        self.run(plan, false).await
    }

    /// Play a plan built elsewhere, such as voices together with a click track
    #[instrument(skip(self, plan), fields(triggers = plan.triggers.len()))]
    pub async fn play_plan(&self, plan: PlaybackPlan) -> Result<PlaybackOutcome, MaestroError> {
        self.run(plan, false).await
    }

    /// Play pitch names such as `["C4", "E4"]` as consecutive quarter notes.
    /// An unreadable name is skipped but keeps its beat.
    #[instrument(skip(self, pitches), fields(pitches = pitches.len()))]
    pub async fn play_pitches(
        &self,
        part: VoicePart,
        pitches: &[String],
        tempo: f64,
    ) -> Result<PlaybackOutcome, MaestroError> {
        let notes: Vec<TimedNote> = pitches
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                let pitch = name.trim().parse::<SpelledPitch>().ok()?;
                Some(TimedNote {
                    pitch: NotePitch::Tone(pitch),
                    duration_category: DurationCategory::Quarter,
                    duration_beats: 1.0,
                    start_beat: index as f64,
                })
            })
            .collect();
        self.play_voice(part, &notes, tempo).await
    }

    /// Stop everything. A pending play call resolves with [`PlaybackOutcome::Stopped`].
    #[instrument(skip(self))]
    pub async fn stop_all(&self) -> Result<(), MaestroError> {
        if let Some(active) = self.transport.lock().await.active.take() {
            active.token.cancel();
        }
        self.session.lock().await.clear().await?;
        info!("playback stopped");
        Ok(())
    }

    /// Push the current mixer gains to the backend
    pub async fn apply_mixer(&self) -> Result<(), MaestroError> {
        let mixer = self.mixer.lock().await.clone();
        let mut session = self.session.lock().await;
        session.ensure_loaded().await?;
        session.apply_mixer(&mixer).await
    }

    async fn update_mixer<R>(&self, f: impl FnOnce(&mut MixerState) -> R) -> Result<R, MaestroError> {
        let result = f(&mut *self.mixer.lock().await);
        self.apply_mixer().await?;
        Ok(result)
    }

    pub async fn toggle_mute(&self, part: VoicePart) -> Result<bool, MaestroError> {
        self.update_mixer(|mixer| mixer.toggle_mute(part)).await
    }

    pub async fn toggle_solo(&self, part: VoicePart) -> Result<bool, MaestroError> {
        self.update_mixer(|mixer| mixer.toggle_solo(part)).await
    }

    pub async fn set_volume(&self, part: VoicePart, volume: i32) -> Result<(), MaestroError> {
        self.update_mixer(|mixer| mixer.set_volume(part, volume)).await
    }

    pub async fn set_accompaniment_volume(&self, volume: i32) -> Result<(), MaestroError> {
        self.update_mixer(|mixer| mixer.set_accompaniment_volume(volume))
            .await
    }

    pub async fn toggle_accompaniment_mute(&self) -> Result<bool, MaestroError> {
        self.update_mixer(|mixer| mixer.toggle_accompaniment_mute())
            .await
    }

    pub async fn set_master_volume(&self, volume: i32) -> Result<(), MaestroError> {
        self.update_mixer(|mixer| mixer.set_master_volume(volume)).await
    }

    /// Make a new play the owner of the transport, cancelling the previous owner.
    /// Returns the new generation and whether another play was cut off.
    async fn take_transport(&self, token: &CancellationToken) -> (u64, bool) {
        let mut transport = self.transport.lock().await;
        transport.generation += 1;
        let current = transport.generation;
        let previous = transport.active.replace(ActivePlay {
            generation: current,
            token: token.clone(),
        });
        let superseded = match previous {
            Some(previous) => {
                info!(superseded = previous.generation, "superseding active playback");
                previous.token.cancel();
                true
            }
            None => false,
        };
        (current, superseded)
    }

    /// Give up the transport if `generation` still owns it
    async fn release_transport(&self, generation: u64) {
        let mut transport = self.transport.lock().await;
        if transport.active.as_ref().map(|a| a.generation) == Some(generation) {
            transport.active = None;
        }
    }

    async fn run(&self, plan: PlaybackPlan, accompaniment_solo: bool) -> Result<PlaybackOutcome, MaestroError> {
        let token = CancellationToken::new();
        let (generation, superseded) = self.take_transport(&token).await;

        if plan.is_empty() {
            debug!("nothing to play");
            self.release_transport(generation).await;
            if superseded {
                self.session.lock().await.clear().await?;
            }
            return Ok(PlaybackOutcome::Completed);
        }

        let mixer = self.mixer.lock().await.clone();
        let scheduled = {
            let mut session = self.session.lock().await;
            let result = session.schedule(&plan, &mixer, accompaniment_solo).await;
            if result.is_err() {
                if let Err(e) = session.clear().await {
                    warn!(error = %e, "could not clear backend after a failed schedule");
                }
            }
            result
        };
        if let Err(e) = scheduled {
            self.release_transport(generation).await;
            return Err(e);
        }
        info!(
            generation,
            triggers = plan.triggers.len(),
            end_secs = plan.end_secs,
            "playback started"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                let transport = self.transport.lock().await;
                let outcome = match &transport.active {
                    Some(active) if active.generation != generation => PlaybackOutcome::Superseded,
                    _ => PlaybackOutcome::Stopped,
                };
                debug!(generation, ?outcome, "playback cancelled");
                return Ok(outcome);
            }
            _ = tokio::time::sleep(Duration::from_secs_f64(plan.stop_at_secs)) => {}
        }

        // Holding the transport keeps a newer play from scheduling while this one clears.
        let mut transport = self.transport.lock().await;
        match &transport.active {
            Some(active) if active.generation == generation => {}
            Some(_) => {
                debug!(generation, "superseded at the stop point");
                return Ok(PlaybackOutcome::Superseded);
            }
            None => return Ok(PlaybackOutcome::Stopped),
        }
        transport.active = None;

        let mut session = self.session.lock().await;
        session.clear().await?;
        if accompaniment_solo {
            let level = self.mixer.lock().await.accompaniment_gain_db();
            session
                .backend
                .set_volume_db(Instrument::Accompaniment, level)
                .await?;
        }
        info!(generation, "playback finished");
        Ok(PlaybackOutcome::Completed)
    }
}
