use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a destination hash on the mesh, in bytes.
pub const PEER_HASH_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerKeyError {
    #[error("peer hash is not valid hex")]
    InvalidHex,
    #[error("peer hash must be {PEER_HASH_LEN} bytes, got {0}")]
    BadLength(usize),
}

/// Stable identifier for a mesh peer.
///
/// Stored and compared as the lowercase hex encoding of the peer's
/// destination hash. Decoding to raw bytes happens only at the transport
/// boundary, so a malformed identifier is an ordinary per-call failure
/// rather than something the registry has to reject up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerKey(String);

impl PeerKey {
    pub fn new(hash_hex: &str) -> Self {
        Self(hash_hex.to_ascii_lowercase())
    }

    pub fn from_bytes(hash: &[u8; PEER_HASH_LEN]) -> Self {
        Self(hex::encode(hash))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<[u8; PEER_HASH_LEN], PeerKeyError> {
        let bytes = hex::decode(&self.0).map_err(|_| PeerKeyError::InvalidHex)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| PeerKeyError::BadLength(bytes.len()))
    }
}

impl std::fmt::Display for PeerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerKey {
    fn from(hash_hex: &str) -> Self {
        Self::new(hash_hex)
    }
}
