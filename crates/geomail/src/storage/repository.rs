//! File-system mail repository
//!
//! Directory structure:
//! ```text
//! <root>/
//!   adps_messages/
//!     0d948fdc77.json        # canonical record bytes
//!     bee12b5bd6.json
//!   adps_attachments/
//!     158911a346.bin         # raw attachment bytes, shared by digest
//!     3627909a29.bin
//! ```
//!
//! The directory tree is the only state: every query and every garbage
//! collection pass is a full scan. Single writer only; concurrent mutation of
//! the directories during a scan is not detected.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::content_store::{ContentStore, Placement, Rename};
use super::copy::CopyJob;
use super::gc::ReferenceTracker;
use super::progress::{CopyProgress, CopySummary, GcProgress, ProgressSink, ScanProgress, emit};
use super::retention::expiry_cutoff;
use crate::codec::{Codec, JsonCodec};
use crate::config::RepositoryConfig;
use crate::error::{Error, IoContext, Result};
use crate::filter::{MailFilter, MailQuery, Predicate};
use crate::hashing::{HashFunction, Sha512Hash};
use crate::models::{AttachmentRef, AttachmentSource, MailRecord};

const MESSAGE_EXTENSION: &str = "json";
const ATTACHMENT_EXTENSION: &str = "bin";

/// A record matched by [`MailRepository::filter_all`]
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredMail {
    pub record: MailRecord,
    pub path: PathBuf,
    /// Digest of the message file bytes
    pub digest: String,
}

/// Where a save put the message and its attachments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub message: Placement,
    /// One entry per distinct attachment digest, in source order
    pub attachments: Vec<Placement>,
}

/// Files a deletion would remove, for confirmation before committing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    pub message_paths: Vec<PathBuf>,
    /// Attachments referenced by no message outside `message_paths`
    pub attachment_paths: Vec<PathBuf>,
}

/// A repository root holding a message store and an attachment store
#[derive(Clone)]
pub struct MailRepository {
    root: PathBuf,
    config: RepositoryConfig,
    codec: Arc<dyn Codec>,
    hasher: Arc<dyn HashFunction>,
    messages: ContentStore,
    attachments: ContentStore,
}

impl std::fmt::Debug for MailRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailRepository")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MailRepository {
    /// Repository handle without touching the disk
    pub fn new(root: impl Into<PathBuf>, config: RepositoryConfig) -> Self {
        Self::with_parts(root.into(), config, Arc::new(JsonCodec), Arc::new(Sha512Hash))
    }

    fn with_parts(
        root: PathBuf,
        config: RepositoryConfig,
        codec: Arc<dyn Codec>,
        hasher: Arc<dyn HashFunction>,
    ) -> Self {
        let messages = ContentStore::new(
            root.join(&config.messages_dir),
            MESSAGE_EXTENSION,
            &config,
            hasher.clone(),
        );
        let attachments = ContentStore::new(
            root.join(&config.attachments_dir),
            ATTACHMENT_EXTENSION,
            &config,
            hasher.clone(),
        );
        Self {
            root,
            config,
            codec,
            hasher,
            messages,
            attachments,
        }
    }

    /// Replace the record codec
    pub fn with_codec(self, codec: Arc<dyn Codec>) -> Self {
        Self::with_parts(self.root, self.config, codec, self.hasher)
    }

    /// Replace the digest used for naming and verification
    pub fn with_hasher(self, hasher: Arc<dyn HashFunction>) -> Self {
        Self::with_parts(self.root, self.config, self.codec, hasher)
    }

    /// Create both store directories under `root`
    pub fn init(root: impl Into<PathBuf>, config: RepositoryConfig) -> Result<Self> {
        let repo = Self::new(root, config);
        repo.messages.ensure_dir()?;
        repo.attachments.ensure_dir()?;
        info!("Initialized repository at {}", repo.root.display());
        Ok(repo)
    }

    /// Open an existing repository
    pub fn open(root: impl Into<PathBuf>, config: RepositoryConfig) -> Result<Self> {
        let repo = Self::new(root, config);
        if !repo.is_initialized() {
            return Err(Error::InvalidRepository { root: repo.root });
        }
        Ok(repo)
    }

    /// Check that `root` holds both store directories
    pub fn is_valid(root: impl AsRef<Path>, config: &RepositoryConfig) -> bool {
        let root = root.as_ref();
        root.join(&config.messages_dir).is_dir() && root.join(&config.attachments_dir).is_dir()
    }

    fn is_initialized(&self) -> bool {
        self.messages.dir().is_dir() && self.attachments.dir().is_dir()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn message_store(&self) -> &ContentStore {
        &self.messages
    }

    pub fn attachment_store(&self) -> &ContentStore {
        &self.attachments
    }

    pub(crate) fn hasher(&self) -> &dyn HashFunction {
        self.hasher.as_ref()
    }

    /// Reference and source for a file, hashed with this repository's digest
    pub fn attachment_from_file(&self, path: impl AsRef<Path>) -> Result<(AttachmentRef, AttachmentSource)> {
        AttachmentRef::hashed_file(path, self.hasher())
    }

    /// Reference and source for in-memory content, hashed with this repository's digest
    pub fn attachment_from_bytes(
        &self,
        filename: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> (AttachmentRef, AttachmentSource) {
        AttachmentRef::hashed_bytes(filename, data, self.hasher())
    }

    /// Persist a record and its attachment blobs
    ///
    /// Idempotent: content already in the store is not written again, and an
    /// attachment digest repeated across sources is stored once. A record
    /// whose encoding exceeds the message size ceiling is refused before
    /// anything is written, so every stored message stays loadable.
    pub fn save(&self, record: &MailRecord, sources: &[AttachmentSource]) -> Result<SaveReport> {
        let bytes = self.codec.encode(record)?;
        let size = bytes.len() as u64;
        let limit = self.config.max_message_size_bytes;
        if size > limit {
            return Err(Error::MessageTooLarge {
                path: self.messages.candidate_path(&self.hasher.digest_bytes(&bytes)),
                size,
                limit,
            });
        }

        self.messages.ensure_dir()?;
        self.attachments.ensure_dir()?;
        let message = self.messages.put_bytes(&bytes)?;

        let mut seen = HashSet::new();
        let mut attachments = Vec::new();
        for source in sources {
            if !seen.insert(source.digest.as_str()) {
                continue;
            }
            let mut reader = source.open().at(source.describe())?;
            attachments.push(self.attachments.put_stream(&source.digest, &mut reader)?);
        }

        info!(
            "Saved message {} ({} attachments, {} new)",
            message.path.display(),
            attachments.len(),
            attachments.iter().filter(|p| !p.already_present).count()
        );
        Ok(SaveReport {
            message,
            attachments,
        })
    }

    /// Read and decode a message file
    ///
    /// Files above the configured ceiling are rejected before being read.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<MailRecord> {
        Ok(self.read_message(path.as_ref())?.0)
    }

    fn read_message(&self, path: &Path) -> Result<(MailRecord, Vec<u8>)> {
        let size = fs::metadata(path).at(path)?.len();
        let limit = self.config.max_message_size_bytes;
        if size > limit {
            return Err(Error::MessageTooLarge {
                path: path.to_path_buf(),
                size,
                limit,
            });
        }

        let bytes = fs::read(path).at(path)?;
        let record = self.codec.decode(&bytes).map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok((record, bytes))
    }

    /// Paths of every message file, in name order
    pub fn message_paths(&self) -> Result<Vec<PathBuf>> {
        self.messages.entries()
    }

    /// Lazily scan every message and yield those matching `filter`
    ///
    /// `None` matches everything. Each call rescans the directory. The sink
    /// receives one event per scanned message, matched or not.
    pub fn filter_all<'a>(
        &'a self,
        filter: Option<MailFilter>,
        progress: Option<&'a mut dyn ProgressSink<ScanProgress>>,
    ) -> Result<FilterIter<'a>> {
        let paths = self.message_paths()?;
        Ok(FilterIter {
            repo: self,
            total: paths.len(),
            paths: paths.into_iter().enumerate(),
            filter,
            progress,
        })
    }

    /// Copy messages and the attachments they reference into `target`
    ///
    /// Estimates first, then copies each message and each distinct
    /// attachment once. Safe to re-run after a failure.
    pub fn copy_many(
        &self,
        message_paths: &[PathBuf],
        target: &MailRepository,
        mut progress: Option<&mut (dyn ProgressSink<CopyProgress> + '_)>,
    ) -> Result<CopySummary> {
        let plan = CopyJob::new(self, target, message_paths).estimate(progress.as_deref_mut())?;
        let summary = plan.execute(progress)?;
        info!(
            "Copied {} files to {} ({} new, {} already present)",
            summary.total_files,
            target.root().display(),
            summary.files_written,
            summary.files_skipped
        );
        Ok(summary)
    }

    /// Attachments that only the given messages reference
    ///
    /// Marks the attachments of `message_paths`, then sweeps every other
    /// message in the repository. Digests with no stored file are skipped.
    pub fn attachments_to_delete(
        &self,
        message_paths: &[PathBuf],
        mut progress: Option<&mut (dyn ProgressSink<GcProgress> + '_)>,
    ) -> Result<Vec<PathBuf>> {
        let tracker = ReferenceTracker::new(self);
        let marks = tracker.mark(message_paths, progress.as_deref_mut())?;
        if marks.is_empty() {
            return Ok(Vec::new());
        }
        tracker.sweep(marks, progress)
    }

    /// Dry run of a deletion: the messages plus the attachments they free
    pub fn plan_deletion(
        &self,
        message_paths: &[PathBuf],
        progress: Option<&mut (dyn ProgressSink<GcProgress> + '_)>,
    ) -> Result<DeletionPlan> {
        Ok(DeletionPlan {
            message_paths: message_paths.to_vec(),
            attachment_paths: self.attachments_to_delete(message_paths, progress)?,
        })
    }

    /// Remove files, then close the suffix gaps the removal left
    ///
    /// Returns every rename performed by the compaction.
    pub fn delete_many(
        &self,
        message_paths: &[PathBuf],
        attachment_paths: &[PathBuf],
    ) -> Result<Vec<Rename>> {
        for path in message_paths.iter().chain(attachment_paths) {
            match fs::remove_file(path) {
                Ok(()) => debug!("Deleted {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} already gone", path.display())
                }
                Err(e) => return Err(Error::io(path, e)),
            }
        }

        let renames = self.compact_suffixes()?;
        info!(
            "Deleted {} messages and {} attachments, renamed {} files",
            message_paths.len(),
            attachment_paths.len(),
            renames.len()
        );
        Ok(renames)
    }

    /// Execute a previously computed plan
    pub fn delete(&self, plan: &DeletionPlan) -> Result<Vec<Rename>> {
        self.delete_many(&plan.message_paths, &plan.attachment_paths)
    }

    /// Renumber suffixed files in both stores so no slot sequence has gaps
    pub fn compact_suffixes(&self) -> Result<Vec<Rename>> {
        let mut renames = self.messages.compact()?;
        renames.extend(self.attachments.compact()?);
        Ok(renames)
    }

    /// Messages created at or before `now - max_age_days`
    pub fn expired_messages(&self, max_age_days: u32, now: DateTime<Utc>) -> Result<Vec<PathBuf>> {
        let query =
            MailQuery::new().with(Predicate::date_range(None, Some(expiry_cutoff(now, max_age_days))));
        self.filter_all(Some(MailFilter::new(query)), None)?
            .map(|found| found.map(|f| f.path))
            .collect()
    }

    /// Copy one message and its attachments out of the repository
    ///
    /// The message keeps its stored name; attachments get their display
    /// names. Returns the written paths.
    pub fn export_mail(
        &self,
        message_path: impl AsRef<Path>,
        export_dir: impl AsRef<Path>,
        require_empty: bool,
    ) -> Result<Vec<PathBuf>> {
        let message_path = message_path.as_ref();
        let export_dir = export_dir.as_ref();
        let record = self.load(message_path)?;

        fs::create_dir_all(export_dir).at(export_dir)?;
        if require_empty && fs::read_dir(export_dir).at(export_dir)?.next().is_some() {
            return Err(Error::ExportTargetNotEmpty {
                path: export_dir.to_path_buf(),
            });
        }

        let mut written = Vec::new();
        let message_name = message_path
            .file_name()
            .ok_or_else(|| Error::io(message_path, io::ErrorKind::InvalidInput.into()))?;
        let target = export_dir.join(message_name);
        fs::copy(message_path, &target).at(&target)?;
        written.push(target);

        for attachment in &record.attachments {
            let source = self.attachments.locate(&attachment.digest)?;
            // Display names are untrusted: keep only the final component
            let name = Path::new(&attachment.filename)
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&attachment.digest));
            let target = export_dir.join(name);
            fs::copy(&source, &target).at(&target)?;
            written.push(target);
        }

        info!(
            "Exported {} to {} ({} files)",
            message_path.display(),
            export_dir.display(),
            written.len()
        );
        Ok(written)
    }
}

/// Single-pass scan produced by [`MailRepository::filter_all`]
pub struct FilterIter<'a> {
    repo: &'a MailRepository,
    paths: std::iter::Enumerate<std::vec::IntoIter<PathBuf>>,
    total: usize,
    filter: Option<MailFilter>,
    progress: Option<&'a mut dyn ProgressSink<ScanProgress>>,
}

impl FilterIter<'_> {
    /// Number of message files the scan covers
    pub fn total(&self) -> usize {
        self.total
    }

    fn evaluate(&mut self, path: PathBuf) -> Result<Option<FilteredMail>> {
        let (record, bytes) = self.repo.read_message(&path)?;
        let matched = match self.filter.as_mut() {
            Some(filter) => filter.matches(&record),
            None => true,
        };
        if !matched {
            return Ok(None);
        }
        Ok(Some(FilteredMail {
            record,
            digest: self.repo.hasher().digest_bytes(&bytes),
            path,
        }))
    }
}

impl Iterator for FilterIter<'_> {
    type Item = Result<FilteredMail>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, path) = self.paths.next()?;
            let outcome = self.evaluate(path);
            let total = self.total;
            emit(&mut self.progress, ScanProgress { current: index, total });

            match outcome {
                Ok(Some(found)) => return Some(Ok(found)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.paths.size_hint().1)
    }
}
