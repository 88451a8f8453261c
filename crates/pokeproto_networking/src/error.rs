//! # Networking Error Types
//!
//! All errors that can occur on the wire: socket failures, malformed
//! messages, and handshake outcomes.

use std::io;
use std::net::IpAddr;

use thiserror::Error;

/// Errors that can occur in the networking layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// Socket-level failure.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// A required field was absent from a decoded message.
    #[error("{kind} is missing required field `{field}`")]
    MissingField {
        /// Message kind token.
        kind: &'static str,
        /// Field key.
        field: &'static str,
    },

    /// A field was present but its value could not be interpreted.
    #[error("{kind} has invalid value for `{field}`")]
    InvalidField {
        /// Message kind token.
        kind: &'static str,
        /// Field key.
        field: &'static str,
    },

    /// The `message_type` token is not in the catalog.
    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    /// A message of one kind arrived where another was required.
    #[error("expected {expected}, got {got}")]
    UnexpectedKind {
        /// Kind the caller was waiting for.
        expected: &'static str,
        /// Kind that arrived.
        got: &'static str,
    },

    /// A reliable send was attempted with a message that carries no sequence number.
    #[error("{0} carries no sequence number and cannot be sent reliably")]
    Unsequenced(&'static str),

    /// Every port in the fallback range was taken.
    #[error("could not bind {ip} on ports {first_port}..+{attempts}")]
    BindExhausted {
        /// Address that was tried.
        ip: IpAddr,
        /// First port tried.
        first_port: u16,
        /// Number of ports tried.
        attempts: u16,
    },

    /// The host explicitly refused the handshake.
    #[error("handshake rejected by host")]
    HandshakeRejected,

    /// No host answered discovery within the listen window.
    #[error("no host found within {window_ms} ms")]
    DiscoveryTimeout {
        /// Listen window that elapsed.
        window_ms: u64,
    },

    /// No handshake answer arrived within the retry budget.
    #[error("handshake timed out after {attempts} attempts")]
    HandshakeTimeout {
        /// Requests sent before giving up.
        attempts: u32,
    },

    /// The inbound reader stopped.
    #[error("inbound channel closed")]
    InboxClosed,
}

/// Result type for networking operations.
pub type NetResult<T> = Result<T, NetError>;
