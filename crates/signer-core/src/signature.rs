//! Signature types returned by the device.
//!
//! - [`Signature`]: secp256k1 ECDSA `{r, s}` plus an optional recovery
//!   parameter `v`, present only for EVM payloads
//! - [`Ed25519Signature`]: EdDSA `{r, s}`
//!
//! BLS signatures are opaque 96-byte G2 points and have no dedicated type.
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::Signature;
//!
//! let sig = Signature::new([1u8; 32], [2u8; 32]).with_v(37);
//! assert_eq!(sig.v(), Some(37));
//! assert_eq!(sig.to_bytes().len(), 64);
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A secp256k1 ECDSA signature.
///
/// `s` is always in low-S form. `v` is the chain-compatible recovery
/// parameter (`0`/`1`, `27`/`28` or `chainId * 2 + 35 + id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The R component of the signature (32 bytes).
    #[serde(with = "hex_bytes")]
    r: [u8; 32],

    /// The S component of the signature (32 bytes).
    #[serde(with = "hex_bytes")]
    s: [u8; 32],

    /// The recovery parameter, if computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    v: Option<u64>,
}

/// Serde helper for hex encoding/decoding 32-byte arrays.
pub(crate) mod hex_bytes {
    use hex::{decode, encode};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(crate) fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", encode(bytes)))
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = decode(s).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("expected 32 bytes"))
    }
}

impl Signature {
    /// The length of `r || s` in bytes.
    pub const BYTE_LEN: usize = 64;

    /// Creates a signature without a recovery parameter.
    #[must_use]
    pub const fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        Self { r, s, v: None }
    }

    /// Returns the signature with `v` attached.
    #[must_use]
    pub const fn with_v(mut self, v: u64) -> Self {
        self.v = Some(v);
        self
    }

    /// Creates a signature from `r || s`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if the slice is not 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::BYTE_LEN {
            return Err(Error::InvalidSignature(format!(
                "expected {} bytes, got {}",
                Self::BYTE_LEN,
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Self::new(r, s))
    }

    /// Serializes `r || s`.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut bytes = [0u8; Self::BYTE_LEN];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    #[must_use]
    pub const fn r(&self) -> &[u8; 32] {
        &self.r
    }

    #[must_use]
    pub const fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Returns the recovery parameter, if one was computed.
    #[must_use]
    pub const fn v(&self) -> Option<u64> {
        self.v
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}{}", hex::encode(self.r), hex::encode(self.s))?;
        if let Some(v) = self.v {
            write!(f, " (v={v})")?;
        }
        Ok(())
    }
}

/// An Ed25519 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ed25519Signature {
    #[serde(with = "hex_bytes")]
    r: [u8; 32],

    #[serde(with = "hex_bytes")]
    s: [u8; 32],
}

impl Ed25519Signature {
    #[must_use]
    pub const fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        Self { r, s }
    }

    #[must_use]
    pub const fn r(&self) -> &[u8; 32] {
        &self.r
    }

    #[must_use]
    pub const fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Serializes the 64-byte `R || S` form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }
}
