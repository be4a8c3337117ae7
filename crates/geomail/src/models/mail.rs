//! Mail record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AttachmentRef;

/// Current record format version
pub const FORMAT_VERSION: &str = "1.0";

/// Oldest format version able to read records written by this version
pub const MIN_COMPATIBLE_VERSION: &str = "1.0";

/// A point on the WGS84 ellipsoid, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<(f64, f64)> for Coordinates {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

fn default_min_version() -> String {
    MIN_COMPATIBLE_VERSION.to_string()
}

/// An immutable piece of mail addressed to one or more locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailRecord {
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Where the recipient may be found
    pub recipients: Vec<Coordinates>,
    /// Any identity of the recipient (name, email, phone number, ...)
    pub identity: String,
    /// Extra details that narrow a search
    pub notes: Option<String>,
    /// Short message carried inline instead of as an attachment
    pub inline_message: Option<String>,
    /// Attachment blobs referenced by digest
    pub attachments: Vec<AttachmentRef>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_min_version")]
    pub min_version: String,
}

impl MailRecord {
    /// Create a new record builder
    pub fn builder(identity: impl Into<String>) -> MailRecordBuilder {
        MailRecordBuilder::new(identity.into())
    }

    /// Digests of all referenced attachments, in record order
    pub fn attachment_digests(&self) -> impl Iterator<Item = &str> {
        self.attachments.iter().map(|a| a.digest.as_str())
    }
}

/// Builder for creating MailRecord instances
pub struct MailRecordBuilder {
    identity: String,
    created_at: Option<DateTime<Utc>>,
    recipients: Vec<Coordinates>,
    notes: Option<String>,
    inline_message: Option<String>,
    attachments: Vec<AttachmentRef>,
}

impl MailRecordBuilder {
    fn new(identity: String) -> Self {
        Self {
            identity,
            created_at: None,
            recipients: Vec::new(),
            notes: None,
            inline_message: None,
            attachments: Vec::new(),
        }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn recipient(mut self, coords: impl Into<Coordinates>) -> Self {
        self.recipients.push(coords.into());
        self
    }

    pub fn recipients(mut self, recipients: Vec<Coordinates>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn inline_message(mut self, message: impl Into<String>) -> Self {
        self.inline_message = Some(message.into());
        self
    }

    pub fn attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn build(self) -> MailRecord {
        MailRecord {
            created_at: self.created_at.unwrap_or_else(Utc::now),
            recipients: self.recipients,
            identity: self.identity,
            notes: self.notes,
            inline_message: self.inline_message,
            attachments: self.attachments,
            version: default_version(),
            min_version: default_min_version(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builder_defaults() {
        let record = MailRecord::builder("john_smith@mydomain.com").build();
        assert_eq!(record.identity, "john_smith@mydomain.com");
        assert!(record.recipients.is_empty());
        assert!(record.notes.is_none());
        assert!(record.inline_message.is_none());
        assert!(record.attachments.is_empty());
        assert_eq!(record.version, FORMAT_VERSION);
        assert_eq!(record.min_version, MIN_COMPATIBLE_VERSION);
    }

    #[test]
    fn test_builder_fields() {
        let created = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let record = MailRecord::builder("Donald Smith")
            .created_at(created)
            .recipient((55.0, 37.0))
            .recipient(Coordinates::new(54.0, 36.0))
            .notes("for Donald")
            .inline_message("Please see 2 attachments")
            .attachment(AttachmentRef::new("test.txt", 5, "abc"))
            .build();

        assert_eq!(record.created_at, created);
        assert_eq!(record.recipients.len(), 2);
        assert_eq!(record.recipients[1], Coordinates::new(54.0, 36.0));
        assert_eq!(record.notes.as_deref(), Some("for Donald"));
        assert_eq!(record.attachment_digests().collect::<Vec<_>>(), vec!["abc"]);
    }
}
