//! Copying messages between repositories
//!
//! A copy runs in two passes. [`CopyJob::estimate`] reads every source
//! message and lists the files to transfer with their sizes, so progress can
//! be reported in bytes. [`CopyPlan::execute`] then stores each file in the
//! target. Content the target already holds is skipped, which makes an
//! interrupted copy safe to repeat.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::progress::{CopyFileProgress, CopyProgress, CopySummary, ProgressSink, ScanProgress, emit};
use super::repository::MailRepository;
use crate::error::{IoContext, Result};

/// Which store a planned file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Message,
    Attachment,
}

/// One file to transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub source: PathBuf,
    pub digest: String,
    pub size_bytes: u64,
    pub kind: FileKind,
}

/// Messages selected for copying, not yet estimated
pub struct CopyJob<'a> {
    source: &'a MailRepository,
    target: &'a MailRepository,
    message_paths: &'a [PathBuf],
}

impl<'a> CopyJob<'a> {
    pub fn new(
        source: &'a MailRepository,
        target: &'a MailRepository,
        message_paths: &'a [PathBuf],
    ) -> Self {
        Self {
            source,
            target,
            message_paths,
        }
    }

    /// List every message, then each distinct attachment they reference
    ///
    /// Messages come first so an interrupted copy never leaves an attachment
    /// in the target without the message that references it. An attachment
    /// missing from the source store fails the estimate.
    pub fn estimate(
        self,
        mut progress: Option<&mut (dyn ProgressSink<CopyProgress> + '_)>,
    ) -> Result<CopyPlan<'a>> {
        let total = self.message_paths.len();
        let mut messages = Vec::with_capacity(total);
        let mut attachments = Vec::new();
        let mut seen = HashSet::new();

        for (current, path) in self.message_paths.iter().enumerate() {
            let record = self.source.load(path)?;
            messages.push(PlannedFile {
                source: path.clone(),
                digest: self.source.message_store().digest_file(path)?,
                size_bytes: file_size(path)?,
                kind: FileKind::Message,
            });

            for digest in record.attachment_digests() {
                if !seen.insert(digest.to_string()) {
                    continue;
                }
                let source = self.source.attachment_store().locate(digest)?;
                attachments.push(PlannedFile {
                    size_bytes: file_size(&source)?,
                    source,
                    digest: digest.to_string(),
                    kind: FileKind::Attachment,
                });
            }

            emit(&mut progress, CopyProgress::Estimating(ScanProgress { current, total }));
        }

        let files: Vec<PlannedFile> = messages.into_iter().chain(attachments).collect();
        debug!("Copy plan: {} files from {total} messages", files.len());
        Ok(CopyPlan {
            target: self.target,
            files,
        })
    }
}

/// Estimated copy, ready to run
pub struct CopyPlan<'a> {
    target: &'a MailRepository,
    files: Vec<PlannedFile>,
}

impl CopyPlan<'_> {
    pub fn files(&self) -> &[PlannedFile] {
        &self.files
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    /// Store every planned file in the target repository
    pub fn execute(
        self,
        mut progress: Option<&mut (dyn ProgressSink<CopyProgress> + '_)>,
    ) -> Result<CopySummary> {
        self.target.message_store().ensure_dir()?;
        self.target.attachment_store().ensure_dir()?;

        let mut summary = CopySummary {
            total_files: self.files.len(),
            total_bytes: self.total_bytes(),
            ..CopySummary::default()
        };
        let mut copied_bytes = 0;

        for (file_index, file) in self.files.iter().enumerate() {
            let store = match file.kind {
                FileKind::Message => self.target.message_store(),
                FileKind::Attachment => self.target.attachment_store(),
            };
            let placement = store.put_file(&file.source, &file.digest)?;
            if placement.already_present {
                summary.files_skipped += 1;
            } else {
                summary.files_written += 1;
            }

            copied_bytes += file.size_bytes;
            emit(
                &mut progress,
                CopyProgress::Copying(CopyFileProgress {
                    file_index,
                    file_bytes: file.size_bytes,
                    total_files: summary.total_files,
                    total_bytes: summary.total_bytes,
                    copied_bytes,
                }),
            );
        }

        emit(&mut progress, CopyProgress::Done(summary));
        Ok(summary)
    }
}

fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path).at(path)?.len())
}
