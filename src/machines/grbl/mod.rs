//! GRBL v1.1 / DrawCore protocol module.
//!
//! **Public API:** [`GrblProtocol`] — initialize, pen up/down, homing,
//! motion, status query, emergency stop, status broadcast. Built on a
//! [`crate::transport::Connection`]; generic over the same [`SerialDuplex`](crate::transport::SerialDuplex)
//! realization the transport uses, so it runs unmodified against
//! `NativePort` or a test `MockDuplex`.

mod commands;
mod config;
mod error;
mod parser;
mod protocol;
mod state;

pub use commands::*;
pub use config::*;
pub use error::*;
pub use parser::*;
pub use protocol::GrblProtocol;
pub use state::*;
