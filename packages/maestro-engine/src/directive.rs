//! Structured directives returned by the chat assistant.
//!
//! A reply may carry a `{component_type, props}` object telling the client which practice
//! component to open. The props are model output and are treated as untrusted text: a bad
//! melody yields fewer notes, never an error.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_TEMPO;
use crate::error::MaestroError;
use crate::parser::melody::{parse_abc_with_durations, parse_note_list};
use crate::parser::solfa::{parse_solfa, SolfaOptions};
use crate::parser::ParsedVoice;
use crate::score::melody_to_abc;
use crate::voice::VoicePart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentType {
    PanicPractice,
    Composer,
    TheoryTeacher,
    FullScore,
    UploadSheet,
    None,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectiveProps {
    #[serde(alias = "songTitle", skip_serializing_if = "Option::is_none")]
    pub song_title: Option<String>,
    #[serde(alias = "voicePart", skip_serializing_if = "Option::is_none")]
    pub voice_part: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub melody: Option<String>,
    #[serde(alias = "abcNotation", skip_serializing_if = "Option::is_none")]
    pub abc_notation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solfa: Option<String>,
    #[serde(alias = "timeSignature", skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(alias = "highlightNotes", skip_serializing_if = "Vec::is_empty")]
    pub highlight_notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDirective {
    pub component_type: ComponentType,
    #[serde(default)]
    pub props: DirectiveProps,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ComponentDirective {
    pub fn from_json(json: &str) -> Result<Self, MaestroError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether the assistant asked for a component at all
    pub fn is_actionable(&self) -> bool {
        self.component_type != ComponentType::None
    }
}

impl DirectiveProps {
    pub fn key_or_default(&self) -> &str {
        non_blank(&self.key).unwrap_or("C")
    }

    pub fn time_signature_or_default(&self) -> &str {
        non_blank(&self.time_signature).unwrap_or("4/4")
    }

    pub fn tempo_or_default(&self) -> u32 {
        self.tempo.filter(|t| *t > 0).unwrap_or(DEFAULT_TEMPO)
    }

    /// The voice part named in the props, if it is one
    pub fn voice(&self) -> Option<VoicePart> {
        non_blank(&self.voice_part).and_then(|v| v.parse().ok())
    }

    /// Notes to play for this directive.
    ///
    /// Tries the ABC document, then the melody written as ABC, then sol-fa, then the melody
    /// as a bare note list. The first source that yields any note wins.
    pub fn playable_notes(&self) -> ParsedVoice {
        if let Some(abc) = non_blank(&self.abc_notation) {
            let voice = parse_abc_with_durations(abc);
            if has_tones(&voice) {
                return voice;
            }
            debug!("abc notation in directive produced no notes");
        }

        let melody = non_blank(&self.melody);
        if let Some(melody) = melody {
            let abc = melody_to_abc(
                melody,
                self.key_or_default(),
                self.time_signature_or_default(),
                self.tempo_or_default(),
            );
            let voice = parse_abc_with_durations(&abc);
            if has_tones(&voice) {
                return voice;
            }
        }

        if let Some(solfa) = non_blank(&self.solfa) {
            let voice = parse_solfa(solfa, &SolfaOptions::in_key(self.key_or_default()));
            if has_tones(&voice) {
                return voice;
            }
        }

        melody.map(parse_note_list).unwrap_or_default()
    }
}

fn has_tones(voice: &ParsedVoice) -> bool {
    voice.notes.iter().any(|note| !note.pitch.is_rest())
}

/// A full chat reply: text plus an optional directive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub component: Option<ReplyComponent>,
}

/// Directive as embedded in a chat reply, where the component name is under `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyComponent {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default)]
    pub props: DirectiveProps,
}

impl ChatReply {
    pub fn from_json(json: &str) -> Result<Self, MaestroError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn directive(&self) -> Option<ComponentDirective> {
        self.component
            .as_ref()
            .filter(|c| c.component_type != ComponentType::None)
            .map(|c| ComponentDirective {
                component_type: c.component_type,
                props: c.props.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_directive() {
        let directive = ComponentDirective::from_json(
            r#"{"component_type":"composer","props":{"melody":"C D E","timeSignature":"3/4","voicePart":"alto","tempo":72}}"#,
        )
        .unwrap();
        assert_eq!(directive.component_type, ComponentType::Composer);
        assert_eq!(directive.props.time_signature.as_deref(), Some("3/4"));
        assert_eq!(directive.props.voice(), Some(VoicePart::Alto));
        assert_eq!(directive.props.tempo_or_default(), 72);
        assert!(directive.is_actionable());
    }

    #[test]
    fn test_unknown_component_type_still_parses() {
        let directive =
            ComponentDirective::from_json(r#"{"component_type":"karaoke","props":{}}"#).unwrap();
        assert_eq!(directive.component_type, ComponentType::Unknown);
        assert!(directive.props.playable_notes().is_empty());
    }

    #[test]
    fn test_malformed_json_is_a_directive_error() {
        let err = ComponentDirective::from_json("{component_type: composer").unwrap_err();
        assert!(matches!(err, MaestroError::DirectiveError(_)));
    }

    #[test]
    fn test_abc_notation_wins() {
        let props = DirectiveProps {
            abc_notation: Some("X:1\nL:1/4\nK:G\nF G z A".to_string()),
            melody: Some("C D".to_string()),
            ..DirectiveProps::default()
        };
        let voice = props.playable_notes();
        assert_eq!(voice.pitches(), vec!["F#4", "G4", "A4"]);
        assert!(voice.notes[2].pitch.is_rest());
    }

    #[test]
    fn test_melody_is_written_as_abc_first() {
        let props = DirectiveProps {
            abc_notation: Some("   ".to_string()),
            melody: Some("C4 Eb4 G4 C5".to_string()),
            key: Some("Cm".to_string()),
            ..DirectiveProps::default()
        };
        let voice = props.playable_notes();
        assert_eq!(voice.pitches(), vec!["C4", "D#4", "G4", "C5"]);
        assert_relative_eq!(voice.total_beats, 4.0);
    }

    #[test]
    fn test_solfa_fallback() {
        let props = DirectiveProps {
            solfa: Some("d r m".to_string()),
            key: Some("D".to_string()),
            ..DirectiveProps::default()
        };
        assert_eq!(props.playable_notes().pitches(), vec!["D4", "E4", "F#4"]);
    }

    #[test]
    fn test_garbage_props_yield_nothing() {
        let props = DirectiveProps {
            abc_notation: Some("!!!".to_string()),
            melody: Some("1 2 3".to_string()),
            solfa: Some("xyz".to_string()),
            ..DirectiveProps::default()
        };
        assert!(props.playable_notes().notes.is_empty());
    }

    #[test]
    fn test_chat_reply() {
        let reply = ChatReply::from_json(
            r#"{"content":"Here you go!","component":{"type":"full-score","props":{"songTitle":"Amazing Grace"}}}"#,
        )
        .unwrap();
        let directive = reply.directive().unwrap();
        assert_eq!(directive.component_type, ComponentType::FullScore);
        assert_eq!(directive.props.song_title.as_deref(), Some("Amazing Grace"));

        let reply = ChatReply::from_json(r#"{"content":"Hi","component":null}"#).unwrap();
        assert!(reply.directive().is_none());
    }
}
