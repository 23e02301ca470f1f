use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure conditions reported by the crate.
///
/// Geometric degeneracies (zero-area triangles, zero-length normalization)
/// are *not* errors: they propagate NaN values silently and callers validate
/// their meshes when that matters.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value is unusable: mismatched buffer length,
    /// out-of-range face index, a negative sphere radius, or an operation
    /// requested on a mesh that lacks the optional data it needs.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A builder was invoked before the subfield it depends on was built.
    #[error("missing precondition: {0}")]
    PreconditionMissing(String),

    /// The OBJ loader could not make sense of the input file.
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_argument<S: Into<String>>(msg: S) -> Error {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn precondition<S: Into<String>>(msg: S) -> Error {
        Error::PreconditionMissing(msg.into())
    }
}
