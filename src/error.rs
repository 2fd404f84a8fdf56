use std::io;

use thiserror::Error;

/// Errors surfaced by the protocol core and the session drivers.
///
/// The core never retries: every error carries the protocol step at which it
/// occurred and terminates the session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An index or length field disagrees with local state.
    #[error("protocol desynchronisation at {step}: {detail}")]
    Desync { step: &'static str, detail: String },

    /// Wire parsing of a message or an embedded integer failed.
    #[error("decode failure at {step}: {detail}")]
    Decode { step: &'static str, detail: String },

    /// Caller supplied an input outside the comparison domain. Raised at the
    /// entry point, before any byte is written to the socket.
    #[error("input outside the {bit_length}-bit domain at {step}")]
    OutOfRange { step: &'static str, bit_length: usize },

    /// A decrypted value fell outside its legal plaintext range.
    #[error("cryptographic inconsistency at {step}: {detail}")]
    Inconsistent { step: &'static str, detail: String },

    /// Peer disconnected or the transport failed mid-protocol.
    #[error("transport closed at {step}")]
    Transport { step: &'static str },

    #[error("i/o failure")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    pub fn desync(step: &'static str, detail: impl Into<String>) -> Self {
        ProtocolError::Desync { step, detail: detail.into() }
    }

    pub fn decode(step: &'static str, detail: impl Into<String>) -> Self {
        ProtocolError::Decode { step, detail: detail.into() }
    }

    pub fn inconsistent(step: &'static str, detail: impl Into<String>) -> Self {
        ProtocolError::Inconsistent { step, detail: detail.into() }
    }
}
