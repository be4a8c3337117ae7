//! Geomail - content-addressed storage for geotagged mail records
//!
//! This crate provides:
//! - Domain models (MailRecord, AttachmentRef, Coordinates)
//! - A deterministic JSON codec for records
//! - Content-addressed stores with prefix collision handling
//! - A repository layer for save, query, copy and deletion
//! - Attachment garbage collection by mark and sweep
//! - Record filters, including a probabilistic distance filter
//!
//! All I/O is synchronous and local. The library logs through the `log`
//! facade and installs no logger.

pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod hashing;
pub mod models;
pub mod storage;

pub use codec::{Codec, JsonCodec};
pub use config::RepositoryConfig;
pub use error::{CodecError, Error, Result};
pub use filter::{
    DEFAULT_DAMPING_THRESHOLD, FixedSample, MailFilter, MailQuery, Predicate, PredicateGroup,
    RandomSource, SampleSequence, damping_probability, distance_meters, parse_query,
};
pub use hashing::{HashFunction, HashResult, Sha512Hash};
pub use models::{
    AttachmentRef, AttachmentSource, Coordinates, FORMAT_VERSION, MIN_COMPATIBLE_VERSION,
    MailRecord, MailRecordBuilder, SourceContent,
};
pub use storage::{
    ContentStore, CopyFileProgress, CopyJob, CopyPlan, CopyProgress, CopyStage, CopySummary,
    DeletionPlan, FileKind, FilterIter, FilteredMail, GcProgress, MailRepository, Marks,
    Placement, PlannedFile, ProgressSink, ReferenceTracker, Rename, SaveReport, ScanProgress,
    expiry_cutoff, is_expired,
};
