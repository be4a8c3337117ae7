//! Domain models for mail records

mod attachment;
mod mail;

pub use attachment::{AttachmentRef, AttachmentSource, SourceContent};
pub use mail::{Coordinates, FORMAT_VERSION, MIN_COMPATIBLE_VERSION, MailRecord, MailRecordBuilder};
