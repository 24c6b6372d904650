//! Structural fingerprints of descriptors.
//!
//! A fingerprint identifies a descriptor in logs and store error reports. It
//! is a blake3 hash of the canonical JSON encoding, so two descriptors built
//! by the same calls always share a fingerprint, literals included.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// 256-bit structural hash of a descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint any serializable IR value.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self(*blake3::hash(&bytes).as_bytes()))
    }

    /// Raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes as hex, for log lines.
    pub fn short(&self) -> String {
        let full = self.to_string();
        full[..16].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", blake3::Hash::from(self.0).to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}
