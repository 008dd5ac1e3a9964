//! Crate-level error type.
//!
//! Each module keeps its own `thiserror` enum; this one aggregates them and
//! maps every failure to a category and a process exit status.

use thiserror::Error;

use crate::disasm::DisasmError;
use crate::formats::pe::PeError;
use crate::io::error::IoError;

/// Main error type for pedisasm operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Header validation and directory walking
    #[error(transparent)]
    Pe(#[from] PeError),

    /// File loading
    #[error(transparent)]
    Io(#[from] IoError),

    /// Configuration loading or serialization
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Disasm(#[from] DisasmError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(IoError::StdIo(err))
    }
}

/// Result type alias for pedisasm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad signatures, unsupported machine, truncated headers
    Format,
    /// An RVA or offset found while walking directories does not resolve
    Resolution,
    Io,
    Config,
    Disassembly,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Pe(err) if err.is_resolution() => ErrorKind::Resolution,
            Error::Pe(_) => ErrorKind::Format,
            Error::Io(_) => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
            Error::Disasm(_) => ErrorKind::Disassembly,
        }
    }

    /// Process exit status; every format error gets its own.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Pe(PeError::InvalidDosSignature) => 10,
            Error::Pe(PeError::InvalidNtSignature) => 11,
            Error::Pe(PeError::UnsupportedArchitecture { .. }) => 12,
            Error::Pe(PeError::TruncatedHeader { .. }) => 13,
            Error::Pe(_) => 14,
            Error::Io(_) => 3,
            Error::Config(_) => 4,
            Error::Disasm(_) => 5,
        }
    }
}
