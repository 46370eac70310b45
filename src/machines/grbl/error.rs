//! GRBL protocol-level error taxonomy, layered on top of transport errors.

use super::state::AlarmCode;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by [`super::protocol::GrblProtocol`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GrblError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("PLT-G001: controller in alarm state {code:?} at {position:?}")]
    Alarm {
        code: AlarmCode,
        position: Option<(f64, f64, f64)>,
    },

    #[error("PLT-M001: homing failed")]
    HomingFailed,

    #[error("PLT-M002: motion timed out")]
    MotionTimeout,

    #[error("PLT-U001: physical pause button pressed")]
    PauseButtonPressed,
}
