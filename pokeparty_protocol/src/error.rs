// Error types for the wire layer.
//
// `FrameError` covers both the framed codec and the plain-text handshake
// line. Variants split into two classes: `Io` (the stream failed or ended
// early) and protocol violations (the peer sent something this side refuses
// to interpret). Both are fatal to the connection that produced them.
//
// `RosterError` reports a Roster Selection that breaks the selection
// invariants when checked against a catalogue (see `roster.rs`).

use std::io;

use thiserror::Error;

/// Failure reading or writing a frame or handshake line.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The underlying stream failed, was closed, or ended mid-message.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A declared or outgoing frame length exceeds the configured limit.
    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    TooLarge { len: u64, max: u32 },

    /// The handshake line ran past the allowed length without a newline.
    #[error("handshake line exceeds {max} bytes")]
    NameTooLong { max: usize },

    /// The handshake line is not valid UTF-8.
    #[error("handshake line is not valid UTF-8")]
    NotUtf8,
}

impl FrameError {
    /// True for errors caused by what the peer sent, as opposed to the
    /// transport failing underneath.
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, FrameError::Io(_))
    }
}

/// A Roster Selection that does not fit the catalogue it claims to draw from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("roster must contain exactly {expected} creatures, got {got}")]
    WrongSize { expected: usize, got: usize },

    #[error("unknown type {0:?}")]
    UnknownType(String),

    #[error("{creature:?} is not a member of type {type_name:?}")]
    NotAMember { type_name: String, creature: String },
}
