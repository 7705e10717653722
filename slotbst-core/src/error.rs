use std::fmt::{Display, Formatter};

use crate::{controller, engine, freelist, snapshot, store, tree};

/// A `Result` type that all API calls in SlotBST will return.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible error cases that can be returned by API calls in SlotBST.
///
/// A value missing from the tree is not an error, lookups and deletions report it as
/// part of their regular result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Every slot is in use, the command was not applied.
    OutOfCapacity,
    /// The input (e.g., value, slot, capacity) is invalid.
    InputInvalid,
    /// Another command is still in flight.
    Busy,
    /// An internal invariant does not hold anymore (e.g., a double release, a cyclic link).
    EngineCorrupted,
    /// The snapshot is not in the expected format or state.
    SnapshotInvalid,
    /// An error occurred during an I/O operation.
    IO,
}

#[derive(Debug)]
pub struct Error {
    code: ErrorCode,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl Display for ErrorCode {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::OutOfCapacity => "out of capacity",
            Self::InputInvalid => "invalid input argument",
            Self::Busy => "engine is busy",
            Self::EngineCorrupted => "engine state is corrupted",
            Self::SnapshotInvalid => "invalid snapshot",
            Self::IO => "IO error",
        })
    }
}

impl Error {
    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[inline]
    fn new(code: ErrorCode, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            code,
            source: Box::new(source),
        }
    }
}

impl Display for Error {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.source)
    }
}

impl std::error::Error for Error {
    #[inline]
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<tree::OutOfCapacity> for Error {
    #[inline]
    fn from(value: tree::OutOfCapacity) -> Self {
        Self::new(ErrorCode::OutOfCapacity, value)
    }
}

impl From<engine::InputInvalid> for Error {
    #[inline]
    fn from(value: engine::InputInvalid) -> Self {
        Self::new(ErrorCode::InputInvalid, value)
    }
}

impl From<controller::Busy> for Error {
    #[inline]
    fn from(value: controller::Busy) -> Self {
        Self::new(ErrorCode::Busy, value)
    }
}

impl From<store::Error> for Error {
    #[inline]
    fn from(value: store::Error) -> Self {
        Self::new(ErrorCode::EngineCorrupted, value)
    }
}

impl From<freelist::Error> for Error {
    #[inline]
    fn from(value: freelist::Error) -> Self {
        Self::new(ErrorCode::EngineCorrupted, value)
    }
}

impl From<tree::Cycle> for Error {
    #[inline]
    fn from(value: tree::Cycle) -> Self {
        Self::new(ErrorCode::EngineCorrupted, value)
    }
}

impl From<tree::Inconsistency> for Error {
    #[inline]
    fn from(value: tree::Inconsistency) -> Self {
        Self::new(ErrorCode::EngineCorrupted, value)
    }
}

impl From<snapshot::ValidationError> for Error {
    #[inline]
    fn from(value: snapshot::ValidationError) -> Self {
        Self::new(ErrorCode::SnapshotInvalid, value)
    }
}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorCode::IO, value)
    }
}
