use std::fmt;
use thiserror::Error;

/// Failure categories of a single build invocation.
///
/// Every variant terminates the invocation; the binary maps all of them to
/// the same non-zero exit status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BfuzzError {
    /// Bad command-line shape: wildcard package path, invalid entry-function
    /// name, too many positional arguments.
    #[error("usage error: {0}")]
    Usage(String),

    /// The target package could not be resolved to exactly one fuzzable
    /// library package, or no suitable entry function was found in it.
    #[error("{0}")]
    Resolution(String),

    /// Rendering the harness source failed. Indicates a defect in the tool.
    #[error("failed to generate harness: {0}")]
    Generation(String),

    /// Temporary file handling or the compiler subprocess failed.
    #[error("{0}")]
    Build(String),
}

/// Kind tag for a [`BfuzzError`], without the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`BfuzzError::Usage`].
    Usage,
    /// See [`BfuzzError::Resolution`].
    Resolution,
    /// See [`BfuzzError::Generation`].
    Generation,
    /// See [`BfuzzError::Build`].
    Build,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => write!(f, "usage"),
            Self::Resolution => write!(f, "resolution"),
            Self::Generation => write!(f, "generation"),
            Self::Build => write!(f, "build"),
        }
    }
}

impl BfuzzError {
    /// The category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) => ErrorKind::Usage,
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Build(_) => ErrorKind::Build,
        }
    }

    /// Process exit status for this error.
    ///
    /// All failures share status 1.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Convenience type alias for pipeline operations.
pub type BfuzzResult<T> = Result<T, BfuzzError>;
