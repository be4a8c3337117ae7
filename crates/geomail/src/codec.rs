//! Canonical byte form of mail records
//!
//! Identical records must always encode to identical bytes, since the digest
//! of those bytes decides where a record lives.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::{CodecError, Error, Result};
use crate::models::MailRecord;

/// Converts records to and from their stored bytes
pub trait Codec: Send + Sync {
    /// Deterministic encoding: same record, same bytes
    ///
    /// Must fail rather than produce bytes that [`Codec::decode`] rejects.
    fn encode(&self, record: &MailRecord) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> std::result::Result<MailRecord, CodecError>;
}

/// JSON has no NaN or infinity; serde_json would write them as `null`
fn check_finite(record: &MailRecord) -> Result<()> {
    match record
        .recipients
        .iter()
        .find(|c| !c.latitude.is_finite() || !c.longitude.is_finite())
    {
        Some(c) => Err(Error::InvalidCoordinates {
            latitude: c.latitude,
            longitude: c.longitude,
        }),
        None => Ok(()),
    }
}

/// JSON with sorted keys and 4-space indentation
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, record: &MailRecord) -> Result<Vec<u8>> {
        check_finite(record)?;

        // Value maps are ordered by key, which fixes the field order
        let value = serde_json::to_value(record).map_err(|e| Error::Encode(e.into()))?;

        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|e| Error::Encode(e.into()))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<MailRecord, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
