//! Command implementations behind the `maestro` binary.
//!
//! Every command returns plain data so the binary can print it either as JSON or as a
//! table. Nothing here parses music itself; it wires the engine and the built-in song
//! library together.

pub mod backend;
pub mod commands;

pub use backend::LoggingBackend;
pub use commands::*;
