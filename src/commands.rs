//! One function per subcommand, plus the text renderings used when `--json` is off.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{anyhow, Result};
use maestro::header::Meter;
use maestro::playback::{Instrument, Metronome, PlaybackPlan};
use maestro::{
    combine_parts, harmonize_in_thirds, parse_abc_with, parse_abc_with_durations, parse_solfa,
    transpose_abc, transpose_melody, AbcOptions, EngineConfig, KeySignature, ParsedVoice, Song,
    SongLibrary, SolfaOptions, TimedNote, VoicePart,
};
use serde::Serialize;

/// Parse an ABC document for one voice, either with the full parser or the
/// duration-aware one.
pub fn parse_document(abc: &str, voice: VoicePart, durations: bool, options: AbcOptions) -> ParsedVoice {
    if durations {
        parse_abc_with_durations(abc)
    } else {
        parse_abc_with(abc, voice, options)
    }
}

pub fn solfa(text: &str, key: &str, octave: i32) -> ParsedVoice {
    let options = SolfaOptions {
        root_key: key.to_string(),
        default_octave: octave,
    };
    parse_solfa(text, &options)
}

/// Transpose a note list, or a whole ABC document when `is_abc` is set
pub fn transpose(input: &str, from: &str, to: &str, is_abc: bool) -> String {
    if is_abc {
        transpose_abc(input, from, to)
    } else {
        transpose_melody(input, from, to)
    }
}

pub fn harmonize(melody: &str, key: &str) -> Result<String> {
    let key: KeySignature = key.parse()?;
    Ok(harmonize_in_thirds(melody, &key))
}

pub fn find_song<'a>(library: &'a SongLibrary, id: &str) -> Result<&'a Song> {
    library.get(id).ok_or_else(|| {
        let known: Vec<&str> = library.list().iter().map(|s| s.id.as_str()).collect();
        anyhow!("no song '{}' (known: {})", id, known.join(", "))
    })
}

/// The combined multi-voice document for a song
pub fn combine(library: &SongLibrary, id: &str) -> Result<String> {
    let song = find_song(library, id)?;
    let document = combine_parts(song);
    if document.is_empty() {
        return Err(anyhow!("song '{}' has no parts", id));
    }
    Ok(document)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSummary {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    pub key: String,
    pub tempo: u32,
    pub time_signature: String,
    pub parts: Vec<VoicePart>,
}

pub fn song_summaries(library: &SongLibrary) -> Vec<SongSummary> {
    library
        .list()
        .iter()
        .map(|song| SongSummary {
            id: song.id.clone(),
            title: song.title.clone(),
            composer: song.composer.clone(),
            key: song.key.clone(),
            tempo: song.tempo,
            time_signature: song.time_signature.clone(),
            parts: song.active_parts(),
        })
        .collect()
}

/// Timed notes for every part of a song that has any
pub fn song_tracks(song: &Song, config: &EngineConfig) -> BTreeMap<VoicePart, Vec<TimedNote>> {
    VoicePart::ALL
        .into_iter()
        .map(|part| (part, song.voice_notes_with(part, config.abc_options()).notes))
        .filter(|(_, notes)| !notes.is_empty())
        .collect()
}

/// What goes into a song's playback plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanOptions {
    /// Overrides the song's own tempo
    pub tempo: Option<u32>,
    /// Organ doubling the bass line
    pub organ: bool,
    /// Metronome click under the voices
    pub click: bool,
    /// Only this part
    pub voice: Option<VoicePart>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            tempo: None,
            organ: true,
            click: false,
            voice: None,
        }
    }
}

/// The schedule `play` runs
pub fn plan_song(song: &Song, options: PlanOptions, config: &EngineConfig) -> PlaybackPlan {
    let mut tracks = song_tracks(song, config);
    if let Some(voice) = options.voice {
        tracks.retain(|part, _| *part == voice);
    }
    let tempo = options.tempo.unwrap_or(song.tempo);

    let mut inputs: Vec<(Instrument, &[TimedNote])> = tracks
        .iter()
        .map(|(part, notes)| (Instrument::Voice(*part), notes.as_slice()))
        .collect();
    if options.organ && options.voice.is_none() {
        if let Some(bass) = tracks.get(&VoicePart::Bass) {
            inputs.push((Instrument::Accompaniment, bass.as_slice()));
        }
    }

    let clicks = if options.click {
        let total_beats = tracks
            .values()
            .flat_map(|notes| notes.last())
            .map(|note| note.end_beat())
            .fold(0.0, f64::max);
        let meter = song.time_signature.parse::<Meter>().unwrap_or_default();
        Metronome::new(tempo).with_meter(&meter).track_covering(total_beats)
    } else {
        Vec::new()
    };
    if !clicks.is_empty() {
        inputs.push((Instrument::Click, clicks.as_slice()));
    }

    PlaybackPlan::build(&inputs, f64::from(tempo), config.trailing_margin_secs)
}

pub fn format_voice(voice: &ParsedVoice) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>8}  {:>8}  {:<6}  {}", "start", "beats", "pitch", "length");
    for note in &voice.notes {
        let _ = writeln!(
            out,
            "{:>8.3}  {:>8.3}  {:<6}  {}",
            note.start_beat, note.duration_beats, note.pitch, note.duration_category
        );
    }
    let _ = writeln!(out, "total: {} beats", voice.total_beats);
    for diagnostic in &voice.diagnostics {
        let _ = writeln!(
            out,
            "warning: {}{}",
            diagnostic.message,
            diagnostic
                .token
                .as_deref()
                .map(|t| format!(" ('{}')", t))
                .unwrap_or_default()
        );
    }
    out
}

pub fn format_songs(songs: &[SongSummary]) -> String {
    let mut out = String::new();
    for song in songs {
        let parts: Vec<String> = song.parts.iter().map(|p| p.to_string()).collect();
        let _ = writeln!(
            out,
            "{:<16} {:<28} {:<4} {:>4} bpm  {:<5} {}",
            song.id,
            song.title,
            song.key,
            song.tempo,
            song.time_signature,
            parts.join(",")
        );
    }
    out
}

pub fn format_plan(plan: &PlaybackPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} bpm, {} triggers", plan.bpm, plan.triggers.len());
    for trigger in &plan.triggers {
        let _ = writeln!(
            out,
            "{:>8.3}s  {:<14} {:<5} {:<3} {:.3}s",
            trigger.start_secs, trigger.instrument, trigger.pitch, trigger.code, trigger.release_secs
        );
    }
    let _ = writeln!(out, "ends {:.3}s, stops {:.3}s", plan.end_secs, plan.stop_at_secs);
    out
}
