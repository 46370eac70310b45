//! Machine-specific protocol layers. Currently only [`grbl`], the GRBL v1.1
//! dialect spoken by the iDraw 2.0 / DrawCore controllers this crate targets.

pub mod grbl;
pub mod session;
