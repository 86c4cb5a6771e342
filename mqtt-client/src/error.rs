//! The session-level error type.
//!
//! `mqtt_core::Error` never carries an `Io` variant (see its own doc
//! comment); this is the boundary that folds a protocol error, a transport
//! error, and the one session-local failure (`connection_timed_out`, spec
//! §7 "Session errors") into a single type callers can match on.

use thiserror::Error;

/// Everything a `ClientSession<T>` call can fail with, generic over the
/// transport's own error type `E`.
#[derive(Debug, Error)]
pub enum SessionError<E: std::fmt::Debug + std::fmt::Display> {
    #[error(transparent)]
    Protocol(#[from] mqtt_core::Error),

    #[error("transport error: {0}")]
    Transport(E),

    /// No PINGRESP arrived within the ping response timeout (spec §4.8).
    #[error("connection timed out waiting for PINGRESP")]
    ConnectionTimedOut,
}

impl<E> SessionError<E> {
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, SessionError::Protocol(e) if e.is_protocol_error())
    }
}
