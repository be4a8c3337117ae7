//! Content-addressed file store
//!
//! Files are named after a hex prefix of the digest of their own bytes:
//!
//! ```text
//! adps_attachments/
//!   158911a346.bin          # first content with this prefix
//!   158911a346_0000.bin     # different content, same prefix
//!   158911a346_0001.bin
//!   3627909a29.bin
//! ```
//!
//! A name is never trusted on its own: every lookup and every dedup decision
//! re-hashes the file on disk.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::config::RepositoryConfig;
use crate::error::{Error, IoContext, Result};
use crate::hashing::HashFunction;

/// Outcome of resolving where content belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Slot holding (or about to hold) the content
    pub path: PathBuf,
    /// The slot already holds identical content; nothing needs writing
    pub already_present: bool,
}

/// A file moved to close a gap in its prefix group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// One directory of digest-named files sharing an extension
#[derive(Clone)]
pub struct ContentStore {
    dir: PathBuf,
    extension: String,
    prefix_len: usize,
    suffix_width: usize,
    max_attempts: u32,
    hasher: Arc<dyn HashFunction>,
}

impl ContentStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        config: &RepositoryConfig,
        hasher: Arc<dyn HashFunction>,
    ) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            prefix_len: config.hash_prefix_len,
            suffix_width: config.suffix_width,
            max_attempts: config.max_suffix_attempts,
            hasher,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Create the store directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).at(&self.dir)
    }

    /// Digest of a stored (or any) file
    pub fn digest_file(&self, path: &Path) -> Result<String> {
        Ok(self.hasher.digest_file(path).at(path)?.hex_digest)
    }

    fn prefix<'a>(&self, digest: &'a str) -> &'a str {
        digest.get(..self.prefix_len).unwrap_or(digest)
    }

    /// Unsuffixed slot for a digest
    pub fn candidate_path(&self, digest: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.prefix(digest), self.extension))
    }

    /// Slot `n` of the disambiguation sequence derived from `base`
    fn suffixed_path(&self, base: &Path, n: u32) -> PathBuf {
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match base.extension() {
            Some(ext) => format!(
                "{stem}_{n:0width$}.{}",
                ext.to_string_lossy(),
                width = self.suffix_width
            ),
            None => format!("{stem}_{n:0width$}", width = self.suffix_width),
        };
        base.with_file_name(name)
    }

    fn slot_path(&self, prefix: &str, slot: Option<u32>) -> PathBuf {
        let name = match slot {
            None => format!("{prefix}.{}", self.extension),
            Some(n) => format!("{prefix}_{n:0width$}.{}", self.extension, width = self.suffix_width),
        };
        self.dir.join(name)
    }

    /// Split a file name into its digest prefix and optional suffix number
    fn parse_name<'a>(&self, name: &'a str) -> Option<(&'a str, Option<u32>)> {
        let stem = name.strip_suffix(&format!(".{}", self.extension))?;
        if let Some((prefix, suffix)) = stem.rsplit_once('_') {
            if suffix.len() != self.suffix_width || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            return Some((prefix, Some(suffix.parse().ok()?)));
        }
        Some((stem, None))
    }

    /// Decide where content with `expected_digest` goes, starting at `candidate`
    ///
    /// Walks `candidate`, `candidate_0000`, `candidate_0001`, ... and stops at
    /// the first slot that is either free or already holds the same content.
    pub fn resolve_path(&self, candidate: &Path, expected_digest: &str) -> Result<Placement> {
        if let Some(placement) = self.check_slot(candidate, expected_digest)? {
            return Ok(placement);
        }

        for n in 0..self.max_attempts {
            let path = self.suffixed_path(candidate, n);
            if let Some(placement) = self.check_slot(&path, expected_digest)? {
                debug!(
                    "[STORE] Prefix collision for {}, using slot {}",
                    candidate.display(),
                    path.display()
                );
                return Ok(placement);
            }
        }

        Err(Error::PathExhausted {
            path: candidate.to_path_buf(),
            attempts: self.max_attempts,
        })
    }

    /// `None` when the slot holds different content
    fn check_slot(&self, path: &Path, expected_digest: &str) -> Result<Option<Placement>> {
        if !path.is_file() {
            return Ok(Some(Placement {
                path: path.to_path_buf(),
                already_present: false,
            }));
        }
        if self.digest_file(path)? == expected_digest {
            return Ok(Some(Placement {
                path: path.to_path_buf(),
                already_present: true,
            }));
        }
        Ok(None)
    }

    /// Resolve the slot for a digest in this store
    ///
    /// Digests that this store's hash function could not produce are
    /// rejected before any path is built from them.
    pub fn resolve(&self, digest: &str) -> Result<Placement> {
        if !self.hasher.is_valid_digest(digest) {
            return Err(Error::InvalidDigest {
                digest: digest.to_string(),
            });
        }
        self.resolve_path(&self.candidate_path(digest), digest)
    }

    /// Store bytes unless identical content is already present
    pub fn put_bytes(&self, bytes: &[u8]) -> Result<Placement> {
        let digest = self.hasher.digest_bytes(bytes);
        self.put_stream(&digest, &mut &bytes[..])
    }

    /// Store a stream declared to hash to `digest`
    ///
    /// The stream is only read when no slot already holds the content. The
    /// written bytes are hashed on the way and rejected if they do not match.
    pub fn put_stream(&self, digest: &str, reader: &mut dyn Read) -> Result<Placement> {
        let placement = self.resolve(digest)?;
        if placement.already_present {
            debug!("[STORE] {} already present", placement.path.display());
            return Ok(placement);
        }

        // Write atomically (write to temp, then rename)
        let temp_path = placement.path.with_extension("tmp");
        let file = File::create(&temp_path).at(&temp_path)?;
        let mut tee = TeeReader { inner: reader, sink: file };
        let written = self.hasher.digest_reader(&mut tee).at(&temp_path);
        let written = match written.and_then(|w| tee.sink.flush().at(&temp_path).map(|_| w)) {
            Ok(w) => w,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };
        drop(tee);

        if written.hex_digest != digest {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::DigestMismatch {
                expected: digest.to_string(),
                actual: written.hex_digest,
            });
        }

        fs::rename(&temp_path, &placement.path).at(&placement.path)?;
        debug!(
            "[STORE] Wrote {} ({} bytes)",
            placement.path.display(),
            written.size_bytes
        );
        Ok(placement)
    }

    /// Store the content of an existing file under its digest
    pub fn put_file(&self, source: &Path, digest: &str) -> Result<Placement> {
        let mut file = File::open(source).at(source)?;
        self.put_stream(digest, &mut file)
    }

    /// Find the stored file whose content hashes to `digest`
    ///
    /// The unsuffixed slot is checked first, then every other entry sharing
    /// the prefix in name order.
    pub fn locate(&self, digest: &str) -> Result<PathBuf> {
        // Nothing stored can hash to a malformed digest
        if !self.hasher.is_valid_digest(digest) {
            return Err(Error::NotFound {
                digest: digest.to_string(),
            });
        }
        let prefix = self.prefix(digest);
        let base = self.candidate_path(digest);
        if base.is_file() && self.digest_file(&base)? == digest {
            return Ok(base);
        }

        for path in self.entries()? {
            if path == base {
                continue;
            }
            let matches_prefix = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| self.parse_name(n))
                .is_some_and(|(p, _)| p == prefix);
            if matches_prefix && self.digest_file(&path)? == digest {
                return Ok(path);
            }
        }

        Err(Error::NotFound {
            digest: digest.to_string(),
        })
    }

    /// All entries of this store in name order
    ///
    /// A missing directory is an empty store.
    pub fn entries(&self) -> Result<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.dir, e)),
        };

        let mut paths = Vec::new();
        for entry in read_dir {
            let entry = entry.at(&self.dir)?;
            let path = entry.path();
            let is_ours = path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == self.extension);
            if is_ours && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Renames that pack every prefix group into its lowest slots
    ///
    /// Slot order is the unsuffixed name, then `_0000` upward. Renames are
    /// listed in an order that is safe to apply one by one.
    pub fn compaction_plan(&self) -> Result<Vec<Rename>> {
        let mut groups: BTreeMap<String, Vec<Option<u32>>> = BTreeMap::new();
        for path in self.entries()? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some((prefix, slot)) = self.parse_name(name) {
                groups.entry(prefix.to_string()).or_default().push(slot);
            }
        }

        let mut renames = Vec::new();
        for (prefix, mut slots) in groups {
            // None sorts before Some, matching slot order
            slots.sort();
            for (index, slot) in slots.into_iter().enumerate() {
                let target = match index {
                    0 => None,
                    i => Some(i as u32 - 1),
                };
                if slot != target {
                    renames.push(Rename {
                        from: self.slot_path(&prefix, slot),
                        to: self.slot_path(&prefix, target),
                    });
                }
            }
        }
        Ok(renames)
    }

    /// Apply [`Self::compaction_plan`] and return what was moved
    pub fn compact(&self) -> Result<Vec<Rename>> {
        let renames = self.compaction_plan()?;
        for rename in &renames {
            fs::rename(&rename.from, &rename.to).at(&rename.from)?;
            debug!(
                "[STORE] Renamed {} -> {}",
                rename.from.display(),
                rename.to.display()
            );
        }
        Ok(renames)
    }
}

/// Copies everything read through it into `sink`
struct TeeReader<'a, W: Write> {
    inner: &'a mut dyn Read,
    sink: W,
}

impl<W: Write> Read for TeeReader<'_, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.sink.write_all(&buf[..n])?;
        Ok(n)
    }
}
