//! # Songs and the Song Library
//!
//! A [`Song`] is reference data: metadata plus up to four ABC parts. Songs are never
//! changed in place. Transposing one yields a new value, and the [`SongLibrary`] only ever
//! appends.
//!
//! ## Library files
//! Libraries are YAML sequences:
//! ```yaml
//! - id: amazing-grace
//!   title: Amazing Grace
//!   composer: John Newton
//!   key: G
//!   tempo: 80
//!   time-signature: 3/4
//!   parts:
//!     soprano: |
//!       L:1/4
//!       K:G
//!       D | G2 B/G/ | B2 A | G2 E | D2
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DEFAULT_TEMPO;
use crate::error::MaestroError;
use crate::header::Meter;
use crate::parser::abc::{parse_abc_with, AbcOptions};
use crate::parser::melody::parse_note_list;
use crate::parser::ParsedVoice;
use crate::theory::KeySignature;
use crate::transpose::{transpose_abc, transpose_melody};
use crate::voice::VoicePart;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    pub key: String,
    pub tempo: u32,
    pub time_signature: String,
    /// ABC document per voice part
    #[serde(default)]
    pub parts: BTreeMap<VoicePart, String>,
    /// Flat pitch names per part, used when a part has no ABC
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub part_notes: BTreeMap<VoicePart, Vec<String>>,
}

impl Song {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        key: impl Into<String>,
        tempo: u32,
        time_signature: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            composer: None,
            key: key.into(),
            tempo,
            time_signature: time_signature.into(),
            parts: BTreeMap::new(),
            part_notes: BTreeMap::new(),
        }
    }

    pub fn with_composer(mut self, composer: impl Into<String>) -> Self {
        self.composer = Some(composer.into());
        self
    }

    pub fn with_part(mut self, part: VoicePart, abc: impl Into<String>) -> Self {
        self.parts.insert(part, abc.into());
        self
    }

    pub fn with_part_notes(mut self, part: VoicePart, notes: Vec<String>) -> Self {
        self.part_notes.insert(part, notes);
        self
    }

    /// Check the metadata a library would otherwise choke on later
    pub fn validate(&self) -> Result<(), MaestroError> {
        if self.id.trim().is_empty() {
            return Err(MaestroError::MetadataError("song id is empty".to_string()));
        }
        if self.tempo == 0 {
            return Err(MaestroError::MetadataError(format!(
                "song '{}' has a tempo of zero",
                self.id
            )));
        }
        self.time_signature.parse::<Meter>()?;
        self.key.parse::<KeySignature>()?;
        Ok(())
    }

    /// ABC for a part; blank strings count as missing
    pub fn part(&self, part: VoicePart) -> Option<&str> {
        self.parts
            .get(&part)
            .map(String::as_str)
            .filter(|abc| !abc.trim().is_empty())
    }

    /// Parts that have ABC, top stave first
    pub fn active_parts(&self) -> Vec<VoicePart> {
        VoicePart::ALL
            .into_iter()
            .filter(|part| self.part(*part).is_some())
            .collect()
    }

    /// Timed notes for one part.
    ///
    /// Reads the part's ABC when there is any, otherwise plays the flat pitch list as
    /// consecutive quarter notes.
    pub fn voice_notes(&self, part: VoicePart) -> ParsedVoice {
        self.voice_notes_with(part, AbcOptions::default())
    }

    pub fn voice_notes_with(&self, part: VoicePart, options: AbcOptions) -> ParsedVoice {
        if let Some(abc) = self.part(part) {
            return parse_abc_with(abc, part, options);
        }
        match self.part_notes.get(&part) {
            Some(notes) if !notes.is_empty() => {
                debug!(song = %self.id, part = %part, "no ABC for part, using pitch list");
                parse_note_list(&notes.join(" "))
            }
            _ => ParsedVoice::default(),
        }
    }

    /// A copy of this song in another key. The original is left as it was.
    pub fn transposed(&self, to: &str) -> Song {
        let parts = self
            .parts
            .iter()
            .map(|(part, abc)| (*part, transpose_abc(abc, &self.key, to)))
            .collect();
        let part_notes = self
            .part_notes
            .iter()
            .map(|(part, notes)| {
                let moved = transpose_melody(&notes.join(" "), &self.key, to);
                (*part, moved.split_whitespace().map(str::to_string).collect())
            })
            .collect();
        Song {
            key: to.trim().to_string(),
            parts,
            part_notes,
            ..self.clone()
        }
    }

    /// Build a song from a transcription result
    pub fn from_transcription(
        id: impl Into<String>,
        transcription: Transcription,
    ) -> Result<Song, MaestroError> {
        let abc = [
            (VoicePart::Soprano, transcription.soprano_abc),
            (VoicePart::Alto, transcription.alto_abc),
            (VoicePart::Tenor, transcription.tenor_abc),
            (VoicePart::Bass, transcription.bass_abc),
        ];
        let notes = [
            (VoicePart::Soprano, transcription.soprano_notes),
            (VoicePart::Alto, transcription.alto_notes),
            (VoicePart::Tenor, transcription.tenor_notes),
            (VoicePart::Bass, transcription.bass_notes),
        ];

        let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        let song = Song {
            id: id.into(),
            title: non_blank(transcription.title).unwrap_or_else(|| "Untitled".to_string()),
            composer: non_blank(transcription.composer),
            key: non_blank(transcription.key_signature).unwrap_or_else(|| "C".to_string()),
            tempo: transcription.tempo.filter(|t| *t > 0).unwrap_or(DEFAULT_TEMPO),
            time_signature: non_blank(transcription.time_signature)
                .unwrap_or_else(|| "4/4".to_string()),
            parts: abc
                .into_iter()
                .filter_map(|(part, abc)| non_blank(abc).map(|abc| (part, abc)))
                .collect(),
            part_notes: notes
                .into_iter()
                .filter_map(|(part, notes)| notes.filter(|n| !n.is_empty()).map(|n| (part, n)))
                .collect(),
        };
        song.validate()?;
        Ok(song)
    }
}

/// Result shape of the file transcription service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transcription {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub key_signature: Option<String>,
    pub time_signature: Option<String>,
    pub tempo: Option<u32>,
    pub soprano_abc: Option<String>,
    pub alto_abc: Option<String>,
    pub tenor_abc: Option<String>,
    pub bass_abc: Option<String>,
    pub soprano_notes: Option<Vec<String>>,
    pub alto_notes: Option<Vec<String>>,
    pub tenor_notes: Option<Vec<String>>,
    pub bass_notes: Option<Vec<String>>,
}

impl Transcription {
    pub fn from_json(json: &str) -> Result<Self, MaestroError> {
        serde_json::from_str(json).map_err(|e| MaestroError::MetadataError(e.to_string()))
    }
}

/// Append-only song store
#[derive(Debug, Clone, Default)]
pub struct SongLibrary {
    songs: Vec<Song>,
}

impl SongLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a song. Fails if the id is taken or the metadata is unusable.
    pub fn add(&mut self, song: Song) -> Result<(), MaestroError> {
        if self.get(&song.id).is_some() {
            return Err(MaestroError::DuplicateSong(song.id));
        }
        song.validate()?;
        info!(id = %song.id, title = %song.title, "added song to library");
        self.songs.push(song);
        Ok(())
    }

    /// Songs in insertion order
    pub fn list(&self) -> &[Song] {
        &self.songs
    }

    pub fn get(&self, id: &str) -> Option<&Song> {
        self.songs.iter().find(|song| song.id == id)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Load a YAML sequence of songs
    pub fn from_yaml(content: &str) -> Result<Self, MaestroError> {
        let mut library = Self::new();
        library.extend_from_yaml(content)?;
        Ok(library)
    }

    /// Append every song of a YAML sequence
    pub fn extend_from_yaml(&mut self, content: &str) -> Result<(), MaestroError> {
        let songs: Vec<Song> = serde_yaml::from_str(content)
            .map_err(|e| MaestroError::MetadataError(e.to_string()))?;
        for song in songs {
            self.add(song)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn hymn() -> Song {
        Song::new("hymn", "Hymn", "C", 90, "4/4")
            .with_part(VoicePart::Soprano, "L:1/4\nK:C\nE D C2 |]")
            .with_part(VoicePart::Bass, "L:1/4\nK:C\nC, G, C,2 |]")
    }

    #[test]
    fn test_active_parts_skip_blank() {
        let song = hymn().with_part(VoicePart::Alto, "  \n");
        assert_eq!(song.active_parts(), vec![VoicePart::Soprano, VoicePart::Bass]);
    }

    #[test]
    fn test_voice_notes_from_abc() {
        let notes = hymn().voice_notes(VoicePart::Soprano);
        assert_eq!(notes.pitches(), vec!["E5", "D5", "C5"]);
        assert_relative_eq!(notes.total_beats, 4.0);
    }

    #[test]
    fn test_voice_notes_fall_back_to_pitch_list() {
        let song = hymn().with_part_notes(
            VoicePart::Tenor,
            vec!["E3".to_string(), "G3".to_string()],
        );
        let notes = song.voice_notes(VoicePart::Tenor);
        assert_eq!(notes.pitches(), vec!["E3", "G3"]);
        assert_relative_eq!(notes.notes[1].start_beat, 1.0);
        assert!(song.voice_notes(VoicePart::Alto).is_empty());
    }

    #[test]
    fn test_transposed_returns_new_song() {
        let song = hymn().with_part_notes(VoicePart::Alto, vec!["G4".to_string()]);
        let up = song.transposed("D");
        assert_eq!(song.key, "C");
        assert_eq!(up.key, "D");
        assert_eq!(up.parts[&VoicePart::Soprano], "L:1/4\nK:D\nF E D2 |]");
        assert_eq!(up.part_notes[&VoicePart::Alto], vec!["A4"]);
        assert_eq!(up.id, song.id);
    }

    #[test]
    fn test_from_transcription() {
        let transcription = Transcription::from_json(
            r#"{"title":"Upload","keySignature":"F","timeSignature":"3/4",
                "sopranoAbc":"K:F\nF A c","altoAbc":"","bassNotes":["F2","C3"]}"#,
        )
        .unwrap();
        let song = Song::from_transcription("upload-1", transcription).unwrap();
        assert_eq!(song.tempo, DEFAULT_TEMPO);
        assert_eq!(song.active_parts(), vec![VoicePart::Soprano]);
        assert!(!song.parts.contains_key(&VoicePart::Alto));
        assert_eq!(song.part_notes[&VoicePart::Bass], vec!["F2", "C3"]);
        assert_eq!(song.composer, None);
    }

    #[test]
    fn test_from_transcription_rejects_bad_metadata() {
        let transcription = Transcription {
            time_signature: Some("waltz".to_string()),
            ..Transcription::default()
        };
        let err = Song::from_transcription("bad", transcription).unwrap_err();
        assert!(matches!(err, MaestroError::MetadataError(_)));
    }

    #[test]
    fn test_library_rejects_duplicates() {
        let mut library = SongLibrary::new();
        library.add(hymn()).unwrap();
        let err = library.add(hymn().with_composer("Someone")).unwrap_err();
        assert!(matches!(err, MaestroError::DuplicateSong(id) if id == "hymn"));
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("hymn").unwrap().composer, None);
    }

    #[test]
    fn test_library_from_yaml() {
        let yaml = r#"
- id: round
  title: Row Row
  key: D
  tempo: 96
  time-signature: 6/8
  parts:
    soprano: "K:D\nD3 D3"
- id: canon
  title: Canon
  composer: Pachelbel
  key: D
  tempo: 60
  time-signature: 4/4
"#;
        let library = SongLibrary::from_yaml(yaml).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.list()[0].id, "round");
        assert_eq!(library.get("canon").unwrap().composer.as_deref(), Some("Pachelbel"));
        assert!(library.get("canon").unwrap().parts.is_empty());
        assert!(SongLibrary::from_yaml("- id: x").is_err());
    }
}
