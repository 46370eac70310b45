//! Path compiler error taxonomy.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("invalid svg: {0}")]
    InvalidSvg(String),

    #[error("unsupported path command: {0}")]
    UnsupportedPathCommand(char),
}
