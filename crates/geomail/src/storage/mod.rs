//! On-disk storage
//!
//! A repository is two content-addressed stores, one for canonical message
//! bytes and one for attachment blobs. Everything above the stores works by
//! scanning directories; there is no index.

mod content_store;
mod copy;
mod gc;
mod progress;
mod repository;
mod retention;

pub use content_store::{ContentStore, Placement, Rename};
pub use copy::{CopyJob, CopyPlan, FileKind, PlannedFile};
pub use gc::{Marks, ReferenceTracker};
pub use progress::{
    CopyFileProgress, CopyProgress, CopyStage, CopySummary, GcProgress, ProgressSink, ScanProgress,
};
pub use repository::{DeletionPlan, FilterIter, FilteredMail, MailRepository, SaveReport};
pub use retention::{expiry_cutoff, is_expired};
