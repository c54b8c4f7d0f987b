//! field crate: survey fields and their 32-byte leaf digests.
//!
//! Key points:
//! - Every field carries its own encoding tag ([`FieldKind`]); nothing is
//!   inferred from the field's position in a list.
//! - Text fields hash their raw UTF-8 bytes.
//! - Timestamp fields are a 256-bit big-endian integer written as exactly 64
//!   hex characters (no prefix); they hash the 32 decoded bytes.

use sha2::{Digest as _, Sha256};
use thiserror::Error;

/// A 32-byte SHA-256 digest: leaves, inner nodes and roots all share this type.
pub type Digest = [u8; 32];

/// Byte length of a digest.
pub const DIGEST_LEN: usize = 32;

/// Number of hex characters in an encoded timestamp field.
pub const TIMESTAMP_HEX_LEN: usize = 2 * DIGEST_LEN;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("malformed hex field: {reason}")]
    MalformedHexField { reason: String },
}

/// How a field's value is turned into bytes before hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Hashed as the UTF-8 bytes of the value. Tooling that encodes text as
    /// latin1 (one byte per UTF-16 code unit) agrees only on ASCII input.
    Text,
    HexTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurveyField {
    pub kind: FieldKind,
    pub value: String,
}

impl SurveyField {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Text,
            value: value.into(),
        }
    }

    /// A timestamp field from an already formatted 64-char hex string.
    /// The string is validated when the field is encoded, not here.
    pub fn hex_timestamp(value: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::HexTimestamp,
            value: value.into(),
        }
    }

    /// A timestamp field from an integer, formatted with [`encode_timestamp_hex`].
    pub fn timestamp(secs: u64) -> Self {
        Self::hex_timestamp(encode_timestamp_hex(secs))
    }

    /// Bytes fed to the hash for this field.
    pub fn encode(&self) -> Result<Vec<u8>, FieldError> {
        match self.kind {
            FieldKind::Text => Ok(self.value.as_bytes().to_vec()),
            FieldKind::HexTimestamp => decode_timestamp_hex(&self.value).map(|b| b.to_vec()),
        }
    }

    /// SHA-256 of the encoded field.
    pub fn leaf(&self) -> Result<Digest, FieldError> {
        Ok(hash_bytes(&self.encode()?))
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Digest {
    Sha256::digest(bytes).into()
}

/// Format an unsigned integer as a 256-bit big-endian value: 64 lowercase
/// hex characters, zero-padded on the left, no prefix.
pub fn encode_timestamp_hex(value: u64) -> String {
    format!("{value:064x}")
}

/// Same layout as [`encode_timestamp_hex`] for a full 256-bit big-endian value.
pub fn encode_u256_hex(be_bytes: &Digest) -> String {
    hex::encode(be_bytes)
}

/// Strict inverse of [`encode_u256_hex`]: exactly 64 hex characters, no prefix.
pub fn decode_timestamp_hex(s: &str) -> Result<Digest, FieldError> {
    if s.starts_with("0x") || s.starts_with("0X") {
        return Err(FieldError::MalformedHexField {
            reason: "unexpected 0x prefix".to_string(),
        });
    }
    if s.len() != TIMESTAMP_HEX_LEN {
        return Err(FieldError::MalformedHexField {
            reason: format!("expected {TIMESTAMP_HEX_LEN} hex chars, found {}", s.len()),
        });
    }
    let mut out = [0u8; DIGEST_LEN];
    hex::decode_to_slice(s, &mut out).map_err(|e| FieldError::MalformedHexField {
        reason: e.to_string(),
    })?;
    Ok(out)
}

/// Tag a positional list of raw values: the entry at `timestamp_position`
/// becomes a [`FieldKind::HexTimestamp`] field, every other entry is text.
///
/// Tagging happens before any padding, so placeholders appended later can
/// never pick up the timestamp encoding.
pub fn tag_positional<S: AsRef<str>>(values: &[S], timestamp_position: usize) -> Vec<SurveyField> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if i == timestamp_position {
                SurveyField::hex_timestamp(v.as_ref())
            } else {
                SurveyField::text(v.as_ref())
            }
        })
        .collect()
}
