//! Shared types for debgo.
//!
//! Everything here is pure data plus the decoders that produce it: deb822
//! decoding ([`control`]), Debian version ordering ([`version`]), the
//! `Release` record ([`release`]) and the source package record built from a
//! `Sources` paragraph ([`source`]).

pub mod control;
pub mod hash;
pub mod release;
pub mod source;
pub mod types;
pub mod version;

// Re-exports
pub use control::ControlError;
pub use hash::*;
pub use release::ReleaseRecord;
pub use source::{SourceError, SourcePackage, SourceRecord};
pub use types::*;
pub use version::{DebVersion, VersionError};
