//! Driver for GRBL-based pen plotters (iDraw 2.0 / DrawCore firmware).
//!
//! Four layers, bottom-up: [`transport`] (serial link + streaming flow
//! control), [`machines::grbl`] (protocol-aware motion/pen/status
//! operations), [`pathcompiler`] (SVG → [`pathcompiler::PlotCommand`]), and
//! [`executor`] (drives a command list to completion on a connected
//! machine).

pub mod executor;
pub mod machines;
pub mod pathcompiler;
pub mod transport;

pub use executor::{PlotExecutor, PlotProgress};
pub use machines::grbl::{GrblProtocol, MachineStatus, PenState};
pub use machines::session;
pub use pathcompiler::{fabric_to_commands, svg_to_commands, CompileOptions, PlotCommand};
pub use transport::{Connection, PortDescriptor, TransportError};
