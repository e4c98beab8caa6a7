//! # Error Types
//!
//! This module defines the fatal error type for the Maestro engine.
//!
//! Parsing music text never fails with one of these. Malformed notes, lengths and keys
//! inside a music body degrade to defaults and are reported as
//! [`Diagnostic`](crate::parser::Diagnostic)s on the parse result instead. The variants
//! below cover the places where a caller handed the engine something structurally wrong:
//! a single note token that is not a note, an impossible key name, bad metadata or
//! configuration, or a collaborator (renderer, audio backend) that refused to work.
//!
//! ## Usage
//! ```rust
//! use maestro::{resolve_pitch, KeySignature, MaestroError, PitchConvention, VoicePart};
//!
//! let key = KeySignature::default();
//! match resolve_pitch("^F'", &key, VoicePart::Alto, PitchConvention::Standard) {
//!     Ok(pitch) => println!("resolved {}", pitch),
//!     Err(MaestroError::InvalidNote { token }) => eprintln!("not a note: {}", token),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaestroError {
    /// A standalone note token did not match the letter grammar.
    ///
    /// # Example
    /// ```
    /// # use maestro::MaestroError;
    /// let err = MaestroError::InvalidNote { token: "H2".to_string() };
    /// assert_eq!(err.to_string(), "Invalid note token 'H2'");
    /// ```
    #[error("Invalid note token '{token}'")]
    InvalidNote { token: String },

    /// Key name that does not describe a key signature.
    ///
    /// # Example
    /// ```
    /// # use maestro::MaestroError;
    /// let err = MaestroError::UnknownKey("H#".to_string());
    /// assert_eq!(err.to_string(), "Unknown key signature: H#");
    /// ```
    #[error("Unknown key signature: {0}")]
    UnknownKey(String),

    /// Invalid song or transcription metadata.
    ///
    /// # Example
    /// ```
    /// # use maestro::MaestroError;
    /// let err = MaestroError::MetadataError("time signature must be in format N/D".to_string());
    /// assert_eq!(err.to_string(), "Invalid metadata: time signature must be in format N/D");
    /// ```
    #[error("Invalid metadata: {0}")]
    MetadataError(String),

    /// Engine configuration could not be read.
    ///
    /// # Example
    /// ```
    /// # use maestro::MaestroError;
    /// let err = MaestroError::ConfigError("default-tempo: invalid type".to_string());
    /// assert_eq!(err.to_string(), "Invalid configuration: default-tempo: invalid type");
    /// ```
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A chat directive was not JSON of the expected shape.
    ///
    /// # Example
    /// ```
    /// # use maestro::MaestroError;
    /// let err = MaestroError::DirectiveError("missing field `component_type`".to_string());
    /// assert_eq!(err.to_string(), "Invalid directive: missing field `component_type`");
    /// ```
    #[error("Invalid directive: {0}")]
    DirectiveError(String),

    /// A song with this id is already in the library.
    ///
    /// # Example
    /// ```
    /// # use maestro::MaestroError;
    /// let err = MaestroError::DuplicateSong("amazing-grace".to_string());
    /// assert_eq!(err.to_string(), "Song 'amazing-grace' already exists");
    /// ```
    #[error("Song '{0}' already exists")]
    DuplicateSong(String),

    /// Neither the document nor the fallback staff could be rendered.
    ///
    /// # Example
    /// ```
    /// # use maestro::MaestroError;
    /// let err = MaestroError::RenderError("surface detached".to_string());
    /// assert_eq!(err.to_string(), "Unable to render staff: surface detached");
    /// ```
    #[error("Unable to render staff: {0}")]
    RenderError(String),

    /// The audio backend refused an operation.
    ///
    /// # Example
    /// ```
    /// # use maestro::MaestroError;
    /// let err = MaestroError::BackendError("context closed".to_string());
    /// assert_eq!(err.to_string(), "Audio backend error: context closed");
    /// ```
    #[error("Audio backend error: {0}")]
    BackendError(String),
}

impl From<serde_yaml::Error> for MaestroError {
    fn from(err: serde_yaml::Error) -> Self {
        MaestroError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for MaestroError {
    fn from(err: serde_json::Error) -> Self {
        MaestroError::DirectiveError(err.to_string())
    }
}
