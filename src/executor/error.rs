//! Plot executor error taxonomy: wraps the GRBL layer's errors, adding
//! nothing of its own (the executor has no wire-protocol concerns of its
//! own that could fail independently).

use crate::machines::grbl::GrblError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutorError {
    #[error(transparent)]
    Grbl(#[from] GrblError),

    #[error("plot cancelled")]
    Cancelled,
}
