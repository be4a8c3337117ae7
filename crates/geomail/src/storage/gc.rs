//! Attachment reference tracking
//!
//! Attachments carry no reference count; a blob is only known to be orphaned
//! after every other message in the repository has been read. [`mark`]
//! collects the attachments of the messages being deleted, [`sweep`] drops
//! every digest still referenced elsewhere.
//!
//! [`mark`]: ReferenceTracker::mark
//! [`sweep`]: ReferenceTracker::sweep

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::progress::{GcProgress, ProgressSink, ScanProgress, emit};
use super::repository::MailRepository;
use crate::error::{Error, Result};

/// Result of the mark phase
#[derive(Debug, Clone, Default)]
pub struct Marks {
    /// Messages being deleted, canonicalized
    targets: HashSet<PathBuf>,
    /// Candidate digests and the stored file each resolved to
    candidates: BTreeMap<String, PathBuf>,
}

impl Marks {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn candidates(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.candidates.iter().map(|(d, p)| (d.as_str(), p.as_path()))
    }
}

/// Mark-and-sweep over the messages of one repository
pub struct ReferenceTracker<'a> {
    repo: &'a MailRepository,
}

impl<'a> ReferenceTracker<'a> {
    pub fn new(repo: &'a MailRepository) -> Self {
        Self { repo }
    }

    /// Resolve the attachments of `message_paths` to stored files
    ///
    /// Digests with no stored file are skipped.
    pub fn mark(
        &self,
        message_paths: &[PathBuf],
        mut progress: Option<&mut (dyn ProgressSink<GcProgress> + '_)>,
    ) -> Result<Marks> {
        let mut marks = Marks::default();
        let total = message_paths.len();

        for (current, path) in message_paths.iter().enumerate() {
            let record = self.repo.load(path)?;
            marks.targets.insert(canonical(path));

            for digest in record.attachment_digests() {
                if marks.candidates.contains_key(digest) {
                    continue;
                }
                match self.repo.attachment_store().locate(digest) {
                    Ok(found) => {
                        marks.candidates.insert(digest.to_string(), found);
                    }
                    Err(Error::NotFound { .. }) => {
                        warn!("Attachment {digest} of {} is not stored", path.display())
                    }
                    Err(e) => return Err(e),
                }
            }

            emit(
                &mut progress,
                GcProgress::ScanningTargets(ScanProgress { current, total }),
            );
        }

        debug!("Marked {} attachment candidates", marks.len());
        Ok(marks)
    }

    /// Drop candidates referenced by any message outside the marked set
    ///
    /// Returns the stored paths of the surviving candidates in digest order.
    pub fn sweep(
        &self,
        mut marks: Marks,
        mut progress: Option<&mut (dyn ProgressSink<GcProgress> + '_)>,
    ) -> Result<Vec<PathBuf>> {
        let paths = self.repo.message_paths()?;
        let total = paths.len();

        for (current, path) in paths.iter().enumerate() {
            if !marks.targets.contains(&canonical(path)) {
                let record = self.repo.load(path)?;
                for digest in record.attachment_digests() {
                    marks.candidates.remove(digest);
                }
            }

            emit(
                &mut progress,
                GcProgress::ScanningRepository(ScanProgress { current, total }),
            );
        }

        debug!("{} attachments are orphaned", marks.len());
        Ok(marks.candidates.into_values().collect())
    }
}

/// Canonical form for comparing caller paths with scanned entries
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use crate::models::{AttachmentRef, AttachmentSource, MailRecord};
    use tempfile::tempdir;

    fn save_with(
        repo: &MailRepository,
        identity: &str,
        attachments: &[(AttachmentRef, AttachmentSource)],
    ) -> PathBuf {
        let record = MailRecord::builder(identity)
            .attachments(attachments.iter().map(|(a, _)| a.clone()).collect())
            .build();
        let sources: Vec<AttachmentSource> = attachments.iter().map(|(_, s)| s.clone()).collect();
        repo.save(&record, &sources).unwrap().message.path
    }

    #[test]
    fn test_shared_attachment_survives() {
        let dir = tempdir().unwrap();
        let repo = MailRepository::init(dir.path(), RepositoryConfig::default()).unwrap();
        let shared = AttachmentRef::from_bytes("shared.txt", b"shared".to_vec());
        let own = AttachmentRef::from_bytes("own.txt", b"own".to_vec());

        let doomed = save_with(&repo, "doomed", &[shared.clone(), own.clone()]);
        save_with(&repo, "kept", &[shared]);

        let freed = repo.attachments_to_delete(&[doomed], None).unwrap();
        let own_path = repo.attachment_store().locate(&own.0.digest).unwrap();
        assert_eq!(freed, vec![own_path]);
    }

    #[test]
    fn test_unresolvable_digest_skipped() {
        let dir = tempdir().unwrap();
        let repo = MailRepository::init(dir.path(), RepositoryConfig::default()).unwrap();
        let record = MailRecord::builder("x")
            .attachment(AttachmentRef::new("gone.bin", 1, "cd".repeat(64)))
            .build();
        let path = repo.save(&record, &[]).unwrap().message.path;

        let tracker = ReferenceTracker::new(&repo);
        let marks = tracker.mark(&[path.clone()], None).unwrap();
        assert!(marks.is_empty());
        assert!(repo.attachments_to_delete(&[path], None).unwrap().is_empty());
    }

    #[test]
    fn test_no_candidates_skips_sweep() {
        let dir = tempdir().unwrap();
        let repo = MailRepository::init(dir.path(), RepositoryConfig::default()).unwrap();
        let plain = save_with(&repo, "plain", &[]);
        save_with(&repo, "other", &[]);

        let mut events = Vec::new();
        let mut sink = |e: GcProgress| events.push(e);
        let freed = repo.attachments_to_delete(&[plain], Some(&mut sink)).unwrap();

        assert!(freed.is_empty());
        assert_eq!(
            events,
            vec![GcProgress::ScanningTargets(ScanProgress { current: 0, total: 1 })]
        );
    }

    #[test]
    fn test_progress_covers_both_phases() {
        let dir = tempdir().unwrap();
        let repo = MailRepository::init(dir.path(), RepositoryConfig::default()).unwrap();
        let att = AttachmentRef::from_bytes("a.txt", b"a".to_vec());
        let doomed = save_with(&repo, "doomed", &[att]);
        save_with(&repo, "other", &[]);

        let mut events = Vec::new();
        let mut sink = |e: GcProgress| events.push(e);
        repo.attachments_to_delete(&[doomed], Some(&mut sink)).unwrap();

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], GcProgress::ScanningTargets(_)));
        assert_eq!(
            events[2],
            GcProgress::ScanningRepository(ScanProgress { current: 1, total: 2 })
        );
    }

    #[test]
    fn test_relative_target_path_excluded() {
        let dir = tempdir().unwrap();
        let repo = MailRepository::init(dir.path(), RepositoryConfig::default()).unwrap();
        let att = AttachmentRef::from_bytes("a.txt", b"a".to_vec());
        let doomed = save_with(&repo, "doomed", &[att]);

        // Same file reached through a detour
        let messages_dir = repo.message_store().dir().to_path_buf();
        let dir_name = messages_dir.file_name().unwrap().to_owned();
        let detour = messages_dir
            .join("..")
            .join(dir_name)
            .join(doomed.file_name().unwrap());

        assert_eq!(repo.attachments_to_delete(&[detour], None).unwrap().len(), 1);
    }
}
