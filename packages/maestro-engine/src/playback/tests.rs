use super::*;
use crate::config::EngineConfig;
use crate::error::MaestroError;
use crate::parser::abc::parse_abc;
use crate::parser::melody::parse_abc_with_durations;
use crate::parser::TimedNote;
use crate::voice::VoicePart;
use approx::assert_relative_eq;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Resume,
    Load(Instrument),
    Bpm(f64),
    Trigger(Instrument, String, f64),
    Volume(Instrument, f64),
    Master(f64),
    Start,
    Stop,
    CancelAll,
    ResetPosition,
    ReleaseAll,
}

struct RecordingBackend {
    state: BackendState,
    calls: Vec<Call>,
    /// Triggers to refuse before accepting again
    failing_triggers: usize,
}

impl RecordingBackend {
    fn running() -> Self {
        Self {
            state: BackendState::Running,
            calls: Vec::new(),
            failing_triggers: 0,
        }
    }

    fn suspended() -> Self {
        Self {
            state: BackendState::Suspended,
            ..Self::running()
        }
    }
}

#[async_trait]
impl AudioBackend for RecordingBackend {
    fn state(&self) -> BackendState {
        self.state
    }

    async fn resume(&mut self) -> Result<(), MaestroError> {
        self.state = BackendState::Running;
        self.calls.push(Call::Resume);
        Ok(())
    }

    async fn load_instrument(
        &mut self,
        instrument: Instrument,
        _profile: &SynthProfile,
    ) -> Result<(), MaestroError> {
        self.calls.push(Call::Load(instrument));
        Ok(())
    }

    async fn set_bpm(&mut self, bpm: f64) -> Result<(), MaestroError> {
        self.calls.push(Call::Bpm(bpm));
        Ok(())
    }

    async fn trigger(&mut self, trigger: &ScheduledTrigger) -> Result<(), MaestroError> {
        if self.failing_triggers > 0 {
            self.failing_triggers -= 1;
            return Err(MaestroError::BackendError("no voices left".to_string()));
        }
        self.calls.push(Call::Trigger(
            trigger.instrument,
            trigger.pitch.to_string(),
            trigger.start_secs,
        ));
        Ok(())
    }

    async fn set_volume_db(&mut self, instrument: Instrument, db: f64) -> Result<(), MaestroError> {
        self.calls.push(Call::Volume(instrument, db));
        Ok(())
    }

    async fn set_master_volume_db(&mut self, db: f64) -> Result<(), MaestroError> {
        self.calls.push(Call::Master(db));
        Ok(())
    }

    async fn start(&mut self) -> Result<(), MaestroError> {
        self.calls.push(Call::Start);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), MaestroError> {
        self.calls.push(Call::Stop);
        Ok(())
    }

    async fn cancel_all(&mut self) -> Result<(), MaestroError> {
        self.calls.push(Call::CancelAll);
        Ok(())
    }

    async fn reset_position(&mut self) -> Result<(), MaestroError> {
        self.calls.push(Call::ResetPosition);
        Ok(())
    }

    async fn release_all(&mut self) -> Result<(), MaestroError> {
        self.calls.push(Call::ReleaseAll);
        Ok(())
    }
}

const CLEAR: [Call; 4] = [Call::CancelAll, Call::Stop, Call::ResetPosition, Call::ReleaseAll];

fn scheduler(backend: RecordingBackend) -> PlaybackScheduler<RecordingBackend> {
    PlaybackScheduler::new(backend, &EngineConfig::default())
}

async fn calls(scheduler: &PlaybackScheduler<RecordingBackend>) -> Vec<Call> {
    scheduler.with_backend(|b| b.calls.clone()).await
}

fn triggers(calls: &[Call]) -> Vec<(Instrument, String, f64)> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Trigger(instrument, pitch, at) => Some((*instrument, pitch.clone(), *at)),
            _ => None,
        })
        .collect()
}

fn position(calls: &[Call], wanted: &Call) -> usize {
    calls
        .iter()
        .position(|call| call == wanted)
        .unwrap_or_else(|| panic!("{:?} was never called", wanted))
}

fn soprano(abc: &str) -> Vec<TimedNote> {
    parse_abc(abc, VoicePart::Soprano).notes
}

// ============================================================================
// Planning
// ============================================================================

#[test]
fn test_plan_timing_at_tempo() {
    let notes = soprano("L:1/4\nC D E2 F/2");
    let plan = PlaybackPlan::build(
        &[(Instrument::Voice(VoicePart::Soprano), notes.as_slice())],
        120.0,
        0.5,
    );

    let starts: Vec<f64> = plan.triggers.iter().map(|t| t.start_secs).collect();
    assert_eq!(starts, vec![0.0, 0.5, 1.0, 2.0]);
    let codes: Vec<&str> = plan.triggers.iter().map(|t| t.code).collect();
    assert_eq!(codes, vec!["4n", "4n", "2n", "8n"]);
    assert_relative_eq!(plan.triggers[2].release_secs, 1.0);
    assert_relative_eq!(plan.end_secs, 2.25);
    assert_relative_eq!(plan.stop_at_secs, 2.75);
}

#[test]
fn test_plan_rests_count_toward_end_only() {
    let notes = parse_abc_with_durations("L:1/4\nC D z4").notes;
    let plan = PlaybackPlan::build(&[(Instrument::Melody, notes.as_slice())], 60.0, 0.5);
    assert_eq!(plan.triggers.len(), 2);
    assert_relative_eq!(plan.end_secs, 6.0);
    assert_relative_eq!(plan.stop_at_secs, 6.5);
}

#[test]
fn test_plan_aligns_voices_on_one_clock() {
    let upper = soprano("L:1/4\nE2 D2");
    let lower = parse_abc("L:1/4\nC,4 G,,2", VoicePart::Bass).notes;
    let plan = PlaybackPlan::build(
        &[
            (Instrument::Voice(VoicePart::Soprano), upper.as_slice()),
            (Instrument::Voice(VoicePart::Bass), lower.as_slice()),
        ],
        60.0,
        0.5,
    );

    assert_eq!(plan.triggers.len(), 4);
    assert_eq!(plan.triggers[0].instrument, Instrument::Voice(VoicePart::Soprano));
    assert_eq!(plan.triggers[1].instrument, Instrument::Voice(VoicePart::Bass));
    assert_eq!(plan.triggers[0].start_secs, plan.triggers[1].start_secs);
    assert_relative_eq!(plan.end_secs, 6.0);
    assert_eq!(
        plan.instruments(),
        vec![
            Instrument::Voice(VoicePart::Soprano),
            Instrument::Voice(VoicePart::Bass)
        ]
    );
}

#[test]
fn test_plan_invalid_tempo_uses_default() {
    let notes = soprano("L:1/4\nC");
    let plan = PlaybackPlan::build(&[(Instrument::Melody, notes.as_slice())], 0.0, 0.5);
    assert_relative_eq!(plan.bpm, 100.0);
    assert_relative_eq!(plan.end_secs, 0.6);
}

#[test]
fn test_synth_profiles() {
    let bass = SynthProfile::for_instrument(Instrument::Voice(VoicePart::Bass));
    assert_eq!(
        bass.voicing,
        Voicing::Subtractive {
            oscillator: Oscillator::Triangle
        }
    );
    assert_relative_eq!(bass.envelope.release, 0.5);
    assert_relative_eq!(bass.volume_db, -8.0);

    let organ = SynthProfile::for_instrument(Instrument::Accompaniment);
    assert!(matches!(
        organ.voicing,
        Voicing::Fm { harmonicity, modulator: Oscillator::Square, .. } if harmonicity == 2.0
    ));
    assert_relative_eq!(organ.volume_db, -12.0);

    let melody = SynthProfile::for_instrument(Instrument::Melody);
    assert_relative_eq!(melody.envelope.sustain, 0.3);

    let click = SynthProfile::for_instrument(Instrument::Click);
    assert!(matches!(click.voicing, Voicing::Membrane { octaves, .. } if octaves == 2.0));
    assert_relative_eq!(click.volume_db, -10.0);
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_empty_input_completes_without_backend() {
    let scheduler = scheduler(RecordingBackend::suspended());
    let outcome = scheduler
        .play_voice(VoicePart::Alto, &[], 100.0)
        .await
        .unwrap();
    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert!(calls(&scheduler).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_play_voice_runs_full_sequence() {
    let scheduler = scheduler(RecordingBackend::suspended());
    let notes = soprano("L:1/4\nC D E2");

    let started = Instant::now();
    let outcome = scheduler
        .play_voice(VoicePart::Soprano, &notes, 60.0)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert!(elapsed >= Duration::from_millis(4500));
    assert!(elapsed < Duration::from_millis(4600));

    let calls = calls(&scheduler).await;
    let loads = calls.iter().filter(|c| matches!(c, Call::Load(_))).count();
    assert_eq!(loads, Instrument::ALL.len());

    let resume = position(&calls, &Call::Resume);
    let clear = position(&calls, &Call::CancelAll);
    let bpm = position(&calls, &Call::Bpm(60.0));
    let start = position(&calls, &Call::Start);
    assert!(resume < clear && clear < bpm && bpm < start);
    assert_eq!(&calls[clear..clear + 4], &CLEAR);
    assert_eq!(&calls[calls.len() - 4..], &CLEAR);

    assert_eq!(
        triggers(&calls),
        vec![
            (Instrument::Voice(VoicePart::Soprano), "C5".to_string(), 0.0),
            (Instrument::Voice(VoicePart::Soprano), "D5".to_string(), 1.0),
            (Instrument::Voice(VoicePart::Soprano), "E5".to_string(), 2.0),
        ]
    );
    assert!(calls[bpm + 1..start].iter().all(|c| matches!(c, Call::Trigger(..))));
}

#[tokio::test(start_paused = true)]
async fn test_running_backend_is_not_resumed() {
    let scheduler = scheduler(RecordingBackend::running());
    scheduler
        .play_voice(VoicePart::Tenor, &soprano("C"), 100.0)
        .await
        .unwrap();
    assert!(!calls(&scheduler).await.contains(&Call::Resume));
}

#[tokio::test(start_paused = true)]
async fn test_new_play_supersedes_active_one() {
    let scheduler = scheduler(RecordingBackend::running());
    let long = soprano("L:1/4\nC8");
    let short = soprano("L:1/4\nG");

    let (first, second) = tokio::join!(
        scheduler.play_voice(VoicePart::Soprano, &long, 60.0),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            scheduler.play_voice(VoicePart::Alto, &short, 60.0).await
        }
    );

    assert_eq!(first.unwrap(), PlaybackOutcome::Superseded);
    assert_eq!(second.unwrap(), PlaybackOutcome::Completed);

    // the second play cleared the transport before scheduling its own note
    let calls = calls(&scheduler).await;
    let second_bpm = calls
        .iter()
        .rposition(|c| matches!(c, Call::Bpm(_)))
        .unwrap();
    assert_eq!(&calls[second_bpm - 4 - 6..second_bpm - 6], &CLEAR);
    assert_eq!(
        triggers(&calls).last().unwrap(),
        &(Instrument::Voice(VoicePart::Alto), "G5".to_string(), 0.0)
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_all_resolves_stopped() {
    let scheduler = scheduler(RecordingBackend::running());
    let notes = soprano("L:1/4\nC8");

    let started = Instant::now();
    let (outcome, stopped) = tokio::join!(scheduler.play_voice(VoicePart::Bass, &notes, 60.0), async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        scheduler.stop_all().await
    });

    stopped.unwrap();
    assert_eq!(outcome.unwrap(), PlaybackOutcome::Stopped);
    assert!(started.elapsed() < Duration::from_secs(3));
    let calls = calls(&scheduler).await;
    assert_eq!(&calls[calls.len() - 4..], &CLEAR);
}

#[tokio::test(start_paused = true)]
async fn test_play_all_doubles_bass_with_organ() {
    let scheduler = scheduler(RecordingBackend::running());
    let mut parts = BTreeMap::new();
    parts.insert(VoicePart::Soprano, soprano("L:1/4\nE D"));
    parts.insert(VoicePart::Bass, parse_abc("L:1/4\nC, G,", VoicePart::Bass).notes);

    let outcome = scheduler.play_all(&parts, 120.0, true).await.unwrap();
    assert_eq!(outcome, PlaybackOutcome::Completed);

    let played = triggers(&calls(&scheduler).await);
    let organ: Vec<_> = played
        .iter()
        .filter(|(i, _, _)| *i == Instrument::Accompaniment)
        .map(|(_, pitch, at)| (pitch.clone(), *at))
        .collect();
    let bass: Vec<_> = played
        .iter()
        .filter(|(i, _, _)| *i == Instrument::Voice(VoicePart::Bass))
        .map(|(_, pitch, at)| (pitch.clone(), *at))
        .collect();
    assert_eq!(organ, bass);
    assert_eq!(organ, vec![("C2".to_string(), 0.0), ("G2".to_string(), 0.5)]);
}

#[tokio::test(start_paused = true)]
async fn test_play_all_without_organ() {
    let scheduler = scheduler(RecordingBackend::running());
    let mut parts = BTreeMap::new();
    parts.insert(VoicePart::Bass, parse_abc("C,", VoicePart::Bass).notes);

    scheduler.play_all(&parts, 100.0, false).await.unwrap();
    assert!(triggers(&calls(&scheduler).await)
        .iter()
        .all(|(i, _, _)| *i != Instrument::Accompaniment));
}

#[tokio::test(start_paused = true)]
async fn test_accompaniment_only_restores_mixer_level() {
    let scheduler = scheduler(RecordingBackend::running());
    let notes = parse_abc("L:1/4\nC, E, G,", VoicePart::Bass).notes;

    let outcome = scheduler.play_accompaniment_only(&notes, 90.0).await.unwrap();
    assert_eq!(outcome, PlaybackOutcome::Completed);

    let calls = calls(&scheduler).await;
    let boost = position(&calls, &Call::Volume(Instrument::Accompaniment, ACCOMPANIMENT_SOLO_DB));
    assert!(boost < position(&calls, &Call::Start));
    assert_eq!(
        calls.last(),
        Some(&Call::Volume(Instrument::Accompaniment, -15.5))
    );
}

#[tokio::test(start_paused = true)]
async fn test_play_pitches_keeps_beats() {
    let scheduler = scheduler(RecordingBackend::running());
    let pitches: Vec<String> = ["C4", "??", "G4"].iter().map(|s| s.to_string()).collect();
    scheduler
        .play_pitches(VoicePart::Alto, &pitches, 60.0)
        .await
        .unwrap();

    let played = triggers(&calls(&scheduler).await);
    assert_eq!(
        played,
        vec![
            (Instrument::Voice(VoicePart::Alto), "C4".to_string(), 0.0),
            (Instrument::Voice(VoicePart::Alto), "G4".to_string(), 2.0),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_play_melody_uses_melody_synth() {
    let scheduler = scheduler(RecordingBackend::running());
    let notes = parse_abc_with_durations("L:1/4\n^F z A").notes;
    scheduler.play_melody(&notes, 100.0).await.unwrap();

    let played = triggers(&calls(&scheduler).await);
    assert_eq!(played.len(), 2);
    assert!(played.iter().all(|(i, _, _)| *i == Instrument::Melody));
    assert_eq!(played[1].1, "A4");
    assert_relative_eq!(played[1].2, 1.2);
}

#[tokio::test(start_paused = true)]
async fn test_metronome_clicks_on_click_synth() {
    let scheduler = scheduler(RecordingBackend::running());
    let metronome = Metronome::new(120).with_meter(&"3/4".parse().unwrap());

    let outcome = scheduler.play_metronome(&metronome, 4).await.unwrap();
    assert_eq!(outcome, PlaybackOutcome::Completed);

    let played = triggers(&calls(&scheduler).await);
    assert_eq!(
        played,
        vec![
            (Instrument::Click, "C3".to_string(), 0.0),
            (Instrument::Click, "G2".to_string(), 0.5),
            (Instrument::Click, "G2".to_string(), 1.0),
            (Instrument::Click, "C3".to_string(), 1.5),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_play_plan_mixes_voice_and_click() {
    let scheduler = scheduler(RecordingBackend::running());
    let notes = soprano("L:1/4\nE D C2");
    let clicks = Metronome::new(60).track_covering(4.0);
    let plan = PlaybackPlan::build(
        &[
            (Instrument::Voice(VoicePart::Soprano), notes.as_slice()),
            (Instrument::Click, clicks.as_slice()),
        ],
        60.0,
        0.5,
    );

    assert_eq!(scheduler.play_plan(plan).await.unwrap(), PlaybackOutcome::Completed);
    let played = triggers(&calls(&scheduler).await);
    assert_eq!(played.iter().filter(|t| t.0 == Instrument::Click).count(), 4);
    assert_eq!(played.len(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_mixer_changes_reach_backend() {
    let scheduler = scheduler(RecordingBackend::running());

    assert!(scheduler.toggle_solo(VoicePart::Alto).await.unwrap());
    let calls_after_solo = calls(&scheduler).await;
    assert!(calls_after_solo.contains(&Call::Volume(
        Instrument::Voice(VoicePart::Soprano),
        f64::NEG_INFINITY
    )));
    assert!(calls_after_solo.contains(&Call::Volume(Instrument::Voice(VoicePart::Alto), -12.0)));

    scheduler.set_master_volume(0).await.unwrap();
    assert_eq!(
        calls(&scheduler).await.last(),
        Some(&Call::Master(f64::NEG_INFINITY))
    );

    scheduler.set_volume(VoicePart::Alto, 100).await.unwrap();
    assert_eq!(scheduler.mixer().await.voice(VoicePart::Alto).volume, 100);

    // instruments are created once per session
    let loads = calls(&scheduler)
        .await
        .iter()
        .filter(|c| matches!(c, Call::Load(_)))
        .count();
    assert_eq!(loads, Instrument::ALL.len());
}

#[tokio::test(start_paused = true)]
async fn test_backend_error_propagates_and_cleans_up() {
    let mut backend = RecordingBackend::running();
    backend.failing_triggers = 1;
    let scheduler = scheduler(backend);

    let err = scheduler
        .play_voice(VoicePart::Soprano, &soprano("C D"), 100.0)
        .await
        .unwrap_err();
    assert!(matches!(err, MaestroError::BackendError(_)));

    let calls_after_failure = calls(&scheduler).await;
    assert!(!calls_after_failure.contains(&Call::Start));
    assert_eq!(&calls_after_failure[calls_after_failure.len() - 4..], &CLEAR);
    assert!(!scheduler.is_playing().await);

    // the failed call no longer owns the transport, so nothing is superseded
    let outcome = scheduler
        .play_voice(VoicePart::Soprano, &soprano("C D"), 100.0)
        .await
        .unwrap();
    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert!(!scheduler.is_playing().await);
}

#[tokio::test(start_paused = true)]
async fn test_empty_play_stops_active_one() {
    let scheduler = scheduler(RecordingBackend::running());
    let long = soprano("L:1/4\nC8");

    let (first, second) = tokio::join!(
        scheduler.play_voice(VoicePart::Soprano, &long, 60.0),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            scheduler.play_voice(VoicePart::Alto, &[], 60.0).await
        }
    );

    assert_eq!(first.unwrap(), PlaybackOutcome::Superseded);
    assert_eq!(second.unwrap(), PlaybackOutcome::Completed);
    assert!(!scheduler.is_playing().await);

    let calls = calls(&scheduler).await;
    let start = position(&calls, &Call::Start);
    assert_eq!(&calls[start + 1..], &CLEAR);
}

#[tokio::test(start_paused = true)]
async fn test_finishing_play_leaves_successor_alone() {
    // the successor starts on the very tick the first play reaches its stop point
    for _ in 0..40 {
        let scheduler = scheduler(RecordingBackend::running());
        let first_notes = soprano("L:1/4\nC");
        let second_notes = soprano("L:1/4\nG2");

        let (first, second) = tokio::join!(
            scheduler.play_voice(VoicePart::Soprano, &first_notes, 60.0),
            async {
                tokio::time::sleep(Duration::from_secs_f64(1.5)).await;
                scheduler.play_voice(VoicePart::Alto, &second_notes, 60.0).await
            }
        );

        let first = first.unwrap();
        assert!(
            matches!(first, PlaybackOutcome::Completed | PlaybackOutcome::Superseded),
            "{:?}",
            first
        );
        assert_eq!(second.unwrap(), PlaybackOutcome::Completed);

        // after the second transport starts, only its own final clear follows
        let calls = calls(&scheduler).await;
        let last_start = calls.iter().rposition(|c| *c == Call::Start).unwrap();
        assert_eq!(&calls[last_start + 1..], &CLEAR);
        assert_eq!(
            triggers(&calls).last().unwrap(),
            &(Instrument::Voice(VoicePart::Alto), "G5".to_string(), 0.0)
        );
    }
}
