//! Transport-level error taxonomy.
//!
//! Each variant's `Display` renders the stable `PLT-*` code from the wire
//! protocol doc followed by a short human message, so callers can log or
//! show the error without re-deriving the code from the variant name.

use thiserror::Error;

/// Errors surfaced by [`crate::transport::Connection`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("PLT-C001: no compatible plotter found")]
    NoDeviceFound,

    #[error("PLT-C002: port already in use")]
    PortInUse,

    #[error("PLT-C003: permission denied opening port")]
    PermissionDenied,

    #[error("PLT-C004: device disconnected")]
    DeviceDisconnected,

    #[error("PLT-C005: device not responding")]
    NotResponding,

    #[error("PLT-X001: response timed out")]
    ResponseTimeout,

    #[error("PLT-X002: malformed or unexpected response: {0}")]
    InvalidResponse(String),

    #[error("PLT-X003: command rejected: error:{code}")]
    CommandRejected { code: u32 },
}

impl TransportError {
    /// True for errors `open()` should retry on with backoff (§7 propagation
    /// policy — everything except NoDevice/PermissionDenied, which are
    /// fatal immediately).
    pub fn is_retryable_on_open(&self) -> bool {
        !matches!(
            self,
            TransportError::NoDeviceFound | TransportError::PermissionDenied
        )
    }
}
