use field::{Digest, DIGEST_LEN};
use thiserror::Error;

/// Literal prefix the verifier expects on every 32-byte value.
pub const HEX_PREFIX: &str = "0x";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    #[error("missing 0x prefix")]
    MissingPrefix,

    #[error("invalid length: expected {expected} hex chars, found {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// `0x` followed by lowercase hex.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(HEX_PREFIX.len() + 2 * bytes.len());
    s.push_str(HEX_PREFIX);
    s.push_str(&hex::encode(bytes));
    s
}

/// Map a sibling path and its root to the verifier's hex literals, keeping order.
pub fn encode_proof(proof: &[Digest], root: &Digest) -> (Vec<String>, String) {
    let hex_proof = proof.iter().map(|d| to_prefixed_hex(d)).collect();
    (hex_proof, to_prefixed_hex(root))
}

/// Parse one `0x`-prefixed 32-byte literal.
pub fn decode_prefixed_hex32(s: &str) -> Result<Digest, WireError> {
    let body = s.strip_prefix(HEX_PREFIX).ok_or(WireError::MissingPrefix)?;
    if body.len() != 2 * DIGEST_LEN {
        return Err(WireError::InvalidLength {
            expected: 2 * DIGEST_LEN,
            found: body.len(),
        });
    }
    let mut out = [0u8; DIGEST_LEN];
    hex::decode_to_slice(body, &mut out)?;
    Ok(out)
}

pub fn decode_proof<S: AsRef<str>>(proof: &[S]) -> Result<Vec<Digest>, WireError> {
    proof.iter().map(|s| decode_prefixed_hex32(s.as_ref())).collect()
}
