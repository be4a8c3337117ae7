//! Attachment references and the byte sources they are saved from

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoContext, Result};
use crate::hashing::{HashFunction, Sha512Hash};

fn default_algorithm() -> String {
    Sha512Hash.algorithm().to_string()
}

/// Reference to an attachment blob by content digest
///
/// The reference does not own the blob: records with identical attachment
/// content share one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Original file name, for display only
    pub filename: String,
    pub size_bytes: u64,
    /// Hex digest of the blob content
    pub digest: String,
    #[serde(default = "default_algorithm")]
    pub digest_algorithm: String,
}

impl AttachmentRef {
    pub fn new(filename: impl Into<String>, size_bytes: u64, digest: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            size_bytes,
            digest: digest.into(),
            digest_algorithm: default_algorithm(),
        }
    }

    /// Hash a file with SHA-512 and build its reference and source
    ///
    /// Repositories using another hash function need [`Self::hashed_file`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<(Self, AttachmentSource)> {
        Self::hashed_file(path, &Sha512Hash)
    }

    /// Hash in-memory content with SHA-512 and build its reference and source
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> (Self, AttachmentSource) {
        Self::hashed_bytes(filename, data, &Sha512Hash)
    }

    pub fn hashed_file(
        path: impl AsRef<Path>,
        hasher: &dyn HashFunction,
    ) -> Result<(Self, AttachmentSource)> {
        let path = path.as_ref();
        let hash = hasher.digest_file(path).at(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let attachment = Self::new(filename, hash.size_bytes, hash.hex_digest.clone())
            .with_algorithm(hasher.algorithm());
        Ok((attachment, AttachmentSource::file(path, hash.hex_digest)))
    }

    pub fn hashed_bytes(
        filename: impl Into<String>,
        data: impl Into<Vec<u8>>,
        hasher: &dyn HashFunction,
    ) -> (Self, AttachmentSource) {
        let data = data.into();
        let digest = hasher.digest_bytes(&data);
        let attachment = Self::new(filename, data.len() as u64, digest.clone())
            .with_algorithm(hasher.algorithm());
        (attachment, AttachmentSource::bytes(data, digest))
    }

    fn with_algorithm(mut self, algorithm: &str) -> Self {
        self.digest_algorithm = algorithm.to_string();
        self
    }
}

/// Where attachment bytes are read from when saving
#[derive(Debug, Clone)]
pub enum SourceContent {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Attachment bytes plus their pre-computed digest
#[derive(Debug, Clone)]
pub struct AttachmentSource {
    pub digest: String,
    pub content: SourceContent,
}

impl AttachmentSource {
    pub fn file(path: impl Into<PathBuf>, digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            content: SourceContent::Path(path.into()),
        }
    }

    pub fn bytes(data: impl Into<Vec<u8>>, digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            content: SourceContent::Bytes(data.into()),
        }
    }

    /// Open a fresh reader over the content
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match &self.content {
            SourceContent::Path(path) => Ok(Box::new(File::open(path)?)),
            SourceContent::Bytes(data) => Ok(Box::new(data.as_slice())),
        }
    }

    /// Human-readable origin, used in errors and logs
    pub fn describe(&self) -> PathBuf {
        match &self.content {
            SourceContent::Path(path) => path.clone(),
            SourceContent::Bytes(_) => PathBuf::from("<memory>"),
        }
    }
}
