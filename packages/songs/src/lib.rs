//! Built-in reference songs, embedded from `library/*.yaml` at build time.

use maestro::SongLibrary;
use tracing::warn;

include!(concat!(env!("OUT_DIR"), "/songs.rs"));

/// Names of the embedded library files, without extension
pub fn song_sources() -> Vec<&'static str> {
    SONG_SOURCES.iter().map(|(name, _)| *name).collect()
}

/// Raw YAML of one embedded file
pub fn song_source(name: &str) -> Option<&'static str> {
    SONG_SOURCES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, content)| *content)
}

/// Load every embedded song into a fresh library.
///
/// A file that fails to load is logged and skipped so one bad entry does not hide the rest.
pub fn builtin_library() -> SongLibrary {
    let mut library = SongLibrary::new();
    for (name, content) in SONG_SOURCES {
        if let Err(e) = library.extend_from_yaml(content) {
            warn!(file = name, error = %e, "skipping song file");
        }
    }
    library
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro::VoicePart;

    #[test]
    fn test_all_files_embedded() {
        assert_eq!(
            song_sources(),
            vec!["amazing-grace", "anthem-in-a", "chorale-in-g", "hymn-in-d"]
        );
        assert!(song_source("amazing-grace").unwrap().contains("John Newton"));
        assert!(song_source("missing").is_none());
    }

    #[test]
    fn test_builtin_library_loads() {
        let library = builtin_library();
        assert_eq!(library.len(), 4);

        let grace = library.get("amazing-grace").unwrap();
        assert_eq!(grace.composer.as_deref(), Some("John Newton"));
        assert_eq!(grace.key, "G");
        assert_eq!(grace.time_signature, "3/4");
        assert_eq!(grace.tempo, 80);
    }

    #[test]
    fn test_every_song_has_four_parts() {
        for song in builtin_library().list() {
            assert!(song.validate().is_ok(), "{}", song.id);
            assert_eq!(song.active_parts().len(), 4, "{}", song.id);
            for part in VoicePart::ALL {
                let voice = song.voice_notes(part);
                assert!(!voice.is_empty(), "{} {}", song.id, part);
                assert!(
                    voice.diagnostics.is_empty(),
                    "{} {}: {:?}",
                    song.id,
                    part,
                    voice.diagnostics
                );
            }
        }
    }

    #[test]
    fn test_amazing_grace_pickup() {
        let library = builtin_library();
        let soprano = library
            .get("amazing-grace")
            .unwrap()
            .voice_notes(VoicePart::Soprano);
        assert_eq!(&soprano.pitches()[..3], &["D5", "G5", "B5"]);
    }
}
