//! Content digests
//!
//! Every stored file is named after, and verified against, the digest of its
//! exact bytes.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha512};

/// Digest and length of hashed content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    /// Lowercase hex digest
    pub hex_digest: String,
    /// Number of bytes hashed
    pub size_bytes: u64,
}

/// A cryptographic hash rendered as lowercase hex
pub trait HashFunction: Send + Sync {
    /// Algorithm tag recorded on attachment references
    fn algorithm(&self) -> &'static str;

    /// Length of the hex digest in characters
    fn hex_len(&self) -> usize;

    /// Whether `digest` could have come from this function
    fn is_valid_digest(&self, digest: &str) -> bool {
        digest.len() == self.hex_len()
            && digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Hash everything the reader yields
    fn digest_reader(&self, reader: &mut dyn Read) -> io::Result<HashResult>;

    fn digest_bytes(&self, bytes: &[u8]) -> String {
        let mut reader = bytes;
        // Reading from a slice cannot fail
        self.digest_reader(&mut reader)
            .map(|r| r.hex_digest)
            .unwrap_or_default()
    }

    fn digest_file(&self, path: &Path) -> io::Result<HashResult> {
        let mut file = File::open(path)?;
        self.digest_reader(&mut file)
    }
}

/// SHA-512, the default digest
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Hash;

impl HashFunction for Sha512Hash {
    fn algorithm(&self) -> &'static str {
        "sha512"
    }

    fn hex_len(&self) -> usize {
        128
    }

    fn digest_reader(&self, reader: &mut dyn Read) -> io::Result<HashResult> {
        let mut hasher = Sha512::new();
        let size_bytes = io::copy(reader, &mut hasher)?;
        Ok(HashResult {
            hex_digest: hex::encode(hasher.finalize()),
            size_bytes,
        })
    }

    fn digest_bytes(&self, bytes: &[u8]) -> String {
        hex::encode(Sha512::digest(bytes))
    }
}
