//! Error types for repository operations

use std::path::{Path, PathBuf};

/// Errors surfaced by the content store, codec and repository
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No stored attachment hashes to the requested digest
    #[error("No stored file matches digest {digest}")]
    NotFound { digest: String },

    /// Message file is bigger than the configured ceiling, rejected before parsing
    #[error("Message file {} is {size} bytes, limit is {limit}", path.display())]
    MessageTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Every disambiguation slot for a prefix is taken by different content
    #[error("No free slot for {} after {attempts} attempts", path.display())]
    PathExhausted { path: PathBuf, attempts: u32 },

    #[error("Malformed message file {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Failed to encode message: {0}")]
    Encode(#[source] CodecError),

    /// A recipient coordinate is NaN or infinite and cannot be stored
    #[error("Recipient coordinate ({latitude}, {longitude}) is not finite")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// Declared digest is not lowercase hex of the store's digest length
    #[error("Malformed digest {digest:?}")]
    InvalidDigest { digest: String },

    /// Attachment stream content differs from the digest it was declared with
    #[error("Content hashed to {actual}, expected {expected}")]
    DigestMismatch { expected: String, actual: String },

    #[error("{} is not a repository (missing store directories)", root.display())]
    InvalidRepository { root: PathBuf },

    #[error("Export folder {} is not empty", path.display())]
    ExportTargetNotEmpty { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`Codec`](crate::codec::Codec), whatever its format
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Attach a path to an I/O result
pub(crate) trait IoContext<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
