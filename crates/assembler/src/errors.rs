//! Unified error type for the assembler pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::encoder::EncodeError;
use crate::parser::ParseError;
use crate::symbols::SymbolError;

/// Any failure while assembling a source file.
///
/// Phase errors display as `line N: message`.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Source file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Pass 1 parse failure.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Pass 1 symbol failure.
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    /// Pass 2 encoding failure.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl AssembleError {
    /// 1-based source line of the error, when it has one.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::Io { .. } => None,
            Self::Parse(error) => Some(error.line),
            Self::Symbol(error) => Some(error.line),
            Self::Encode(error) => Some(error.line),
        }
    }
}
