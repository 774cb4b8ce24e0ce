//! Curve-agnostic signing requests and responses.
//!
//! A [`SigningRequest`] pairs an arbitrary payload with a signer path and
//! three tags telling the device how to treat it:
//!
//! - [`Curve`]: which key type signs
//! - [`HashType`]: how the device digests the payload before signing
//! - [`Encoding`]: how the device decodes the payload for display
//!
//! [`codec::encode`] turns a request into device-sized frames and
//! [`codec::decode`] parses the device's answer into a [`SigningResponse`].
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::signing::{Curve, Encoding, HashType, SignerPath, SigningRequest};
//!
//! let path: SignerPath = "m/44'/60'/0'/0/0".parse().unwrap();
//! let request = SigningRequest::new(
//!     path,
//!     Curve::Secp256k1,
//!     HashType::Keccak256,
//!     Encoding::None,
//!     b"hello".to_vec(),
//! );
//! assert_eq!(request.payload, b"hello");
//! ```

pub mod codec;
pub mod recovery;

use core::fmt;
use core::str::FromStr;

use alloy_primitives::keccak256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use codec::{EncodedRequest, decode, encode};
pub use recovery::ReplayProtection;

use crate::cursor::Writer;
use crate::error::{Error, Result};
use crate::signature::{Ed25519Signature, Signature};

/// Maximum number of indices in a signer path.
pub const MAX_PATH_LEN: usize = 5;

/// Offset marking a hardened derivation index.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Elliptic curve used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Curve {
    /// secp256k1 ECDSA.
    Secp256k1 = 0,
    /// Ed25519 EdDSA.
    Ed25519 = 1,
    /// BLS12-381 with signatures in G2.
    Bls12381G2 = 2,
}

impl Curve {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parses a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Secp256k1),
            1 => Some(Self::Ed25519),
            2 => Some(Self::Bls12381G2),
            _ => None,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Secp256k1 => "SECP256K1",
            Self::Ed25519 => "ED25519",
            Self::Bls12381G2 => "BLS12_381_G2",
        })
    }
}

/// Hash applied by the device (or by the client when prehashing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HashType {
    /// The payload is signed as-is.
    None = 0,
    /// Keccak-256.
    Keccak256 = 1,
    /// SHA-256.
    Sha256 = 2,
}

impl HashType {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parses a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Keccak256),
            2 => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Hashes `data`, or returns `None` for [`HashType::None`].
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Option<[u8; 32]> {
        match self {
            Self::None => None,
            Self::Keccak256 => Some(keccak256(data).0),
            Self::Sha256 => Some(Sha256::digest(data).into()),
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Keccak256 => "KECCAK256",
            Self::Sha256 => "SHA256",
        })
    }
}

/// How the device decodes the payload for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// Opaque bytes, shown as hex or ASCII.
    None,
    /// A Solana transaction message.
    Solana,
    /// An EVM transaction; signatures get a chain-aware `v`.
    Evm,
    /// An Ethereum deposit message.
    EthDeposit,
}

impl Encoding {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Solana => 2,
            Self::Evm => 4,
            Self::EthDeposit => 5,
        }
    }

    /// Parses a wire code.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            2 => Some(Self::Solana),
            4 => Some(Self::Evm),
            5 => Some(Self::EthDeposit),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Solana => "SOLANA",
            Self::Evm => "EVM",
            Self::EthDeposit => "ETH_DEPOSIT",
        })
    }
}

/// Domain separation tag for BLS signing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlsDst {
    /// Basic scheme (`..._NUL_`).
    Nul,
    /// Proof-of-possession scheme (`..._POP_`), used by Ethereum consensus.
    #[default]
    Pop,
}

impl BlsDst {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Nul => 1,
            Self::Pop => 2,
        }
    }
}

/// A BIP-32 style derivation path of at most [`MAX_PATH_LEN`] indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct SignerPath(Vec<u32>);

impl TryFrom<Vec<u32>> for SignerPath {
    type Error = Error;

    fn try_from(indices: Vec<u32>) -> Result<Self> {
        Self::new(indices)
    }
}

impl From<SignerPath> for Vec<u32> {
    fn from(path: SignerPath) -> Self {
        path.0
    }
}

impl SignerPath {
    /// Creates a signer path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if more than [`MAX_PATH_LEN`] indices are
    /// given.
    pub fn new(indices: Vec<u32>) -> Result<Self> {
        if indices.len() > MAX_PATH_LEN {
            return Err(Error::Encoding(format!(
                "signer path has {} indices, at most {MAX_PATH_LEN} allowed",
                indices.len()
            )));
        }
        Ok(Self(indices))
    }

    /// Returns the indices.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    /// Returns `true` if every index is hardened.
    #[must_use]
    pub fn is_fully_hardened(&self) -> bool {
        self.0.iter().all(|&i| i >= HARDENED_OFFSET)
    }

    /// Writes `[count:u32LE][index:u32LE × 5]`, zero-filling unused slots.
    pub(crate) fn write_to(&self, w: &mut Writer) {
        // Length was checked at construction.
        let count = self.0.len().min(MAX_PATH_LEN);
        w.put_u32_le(count as u32);
        for index in &self.0[..count] {
            w.put_u32_le(*index);
        }
        w.put_zeros((MAX_PATH_LEN - count) * 4);
    }
}

impl FromStr for SignerPath {
    type Err = Error;

    /// Parses `m/44'/60'/0'/0/0`. Both `'` and `h` mark hardened indices.
    fn from_str(s: &str) -> Result<Self> {
        let rest = s.strip_prefix("m").unwrap_or(s);
        let mut indices = Vec::new();
        for part in rest.split('/').filter(|p| !p.is_empty()) {
            let (digits, hardened) = match part.strip_suffix(&['\'', 'h'][..]) {
                Some(d) => (d, true),
                None => (part, false),
            };
            let index: u32 = digits
                .parse()
                .map_err(|_| Error::Encoding(format!("invalid path component {part:?}")))?;
            if index >= HARDENED_OFFSET {
                return Err(Error::Encoding(format!("path component {part:?} out of range")));
            }
            indices.push(if hardened { index + HARDENED_OFFSET } else { index });
        }
        Self::new(indices)
    }
}

impl fmt::Display for SignerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for &i in &self.0 {
            if i >= HARDENED_OFFSET {
                write!(f, "/{}'", i - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{i}")?;
            }
        }
        Ok(())
    }
}

/// A request to sign an arbitrary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Derivation path of the signing key.
    pub signer_path: SignerPath,

    /// Curve of the signing key.
    pub curve: Curve,

    /// Hash the device applies to the payload.
    pub hash: HashType,

    /// How the device decodes the payload for display.
    pub encoding: Encoding,

    /// The message to sign.
    pub payload: Vec<u8>,

    /// Optional calldata decoder metadata shown alongside EVM payloads.
    pub decoder: Option<Vec<u8>>,

    /// Ask the device not to return the signing public key.
    pub omit_pubkey: bool,

    /// Domain separation tag, used for [`Curve::Bls12381G2`] only.
    pub bls_dst: BlsDst,

    /// Replay protection scheme for EVM `v`. Inferred from the payload when
    /// absent.
    pub replay_protection: Option<ReplayProtection>,
}

impl SigningRequest {
    /// Creates a request with no decoder, the public key included, the
    /// default DST and inferred replay protection.
    #[must_use]
    pub const fn new(
        signer_path: SignerPath,
        curve: Curve,
        hash: HashType,
        encoding: Encoding,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            signer_path,
            curve,
            hash,
            encoding,
            payload,
            decoder: None,
            omit_pubkey: false,
            bls_dst: BlsDst::Pop,
            replay_protection: None,
        }
    }

    /// Attaches calldata decoder metadata.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Vec<u8>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Asks the device to omit the public key from its response.
    #[must_use]
    pub const fn omitting_pubkey(mut self) -> Self {
        self.omit_pubkey = true;
        self
    }

    /// Sets the BLS domain separation tag.
    #[must_use]
    pub const fn with_bls_dst(mut self, dst: BlsDst) -> Self {
        self.bls_dst = dst;
        self
    }

    /// Fixes the replay protection scheme instead of inferring it.
    #[must_use]
    pub const fn with_replay_protection(mut self, replay: ReplayProtection) -> Self {
        self.replay_protection = Some(replay);
        self
    }
}

/// The device's answer to a signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningResponse {
    /// A secp256k1 ECDSA signature.
    Secp256k1 {
        /// SEC1 public key, compressed (33 bytes) or uncompressed (65 bytes).
        public_key: Option<Vec<u8>>,
        /// Low-S signature, with `v` for EVM payloads.
        signature: Signature,
    },
    /// An Ed25519 signature.
    Ed25519 {
        public_key: Option<[u8; 32]>,
        signature: Ed25519Signature,
    },
    /// A BLS12-381 signature (G2 point, compressed).
    Bls12381G2 {
        /// Compressed G1 public key.
        public_key: Option<[u8; 48]>,
        signature: [u8; 96],
    },
}

impl SigningResponse {
    /// Returns the curve of this response.
    #[must_use]
    pub const fn curve(&self) -> Curve {
        match self {
            Self::Secp256k1 { .. } => Curve::Secp256k1,
            Self::Ed25519 { .. } => Curve::Ed25519,
            Self::Bls12381G2 { .. } => Curve::Bls12381G2,
        }
    }

    /// Returns the public key bytes, if the device included them.
    #[must_use]
    pub fn public_key(&self) -> Option<&[u8]> {
        match self {
            Self::Secp256k1 { public_key, .. } => public_key.as_deref(),
            Self::Ed25519 { public_key, .. } => public_key.as_ref().map(|k| k.as_slice()),
            Self::Bls12381G2 { public_key, .. } => public_key.as_ref().map(|k| k.as_slice()),
        }
    }

    /// Returns the raw signature bytes (`r || s` for ECDSA and EdDSA).
    #[must_use]
    pub fn signature_bytes(&self) -> Vec<u8> {
        match self {
            Self::Secp256k1 { signature, .. } => signature.to_bytes().to_vec(),
            Self::Ed25519 { signature, .. } => signature.to_bytes().to_vec(),
            Self::Bls12381G2 { signature, .. } => signature.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_parse_and_display() {
        let path: SignerPath = "m/44'/60'/0'/0/0".parse().unwrap();
        assert_eq!(
            path.indices(),
            &[
                HARDENED_OFFSET + 44,
                HARDENED_OFFSET + 60,
                HARDENED_OFFSET,
                0,
                0
            ]
        );
        assert_eq!(path.to_string(), "m/44'/60'/0'/0/0");
        assert!(!path.is_fully_hardened());

        let sol: SignerPath = "m/44h/501h/0h/0h".parse().unwrap();
        assert!(sol.is_fully_hardened());
    }

    #[test]
    fn path_too_long() {
        assert!(SignerPath::new(vec![0; 6]).is_err());
        assert!("m/1/2/3/4/5/6".parse::<SignerPath>().is_err());
        assert!("m/x".parse::<SignerPath>().is_err());
    }

    #[test]
    fn path_wire_layout() {
        let path = SignerPath::new(vec![1, 2]).unwrap();
        let mut w = Writer::new();
        path.write_to(&mut w);

        let bytes = w.into_vec();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[..12], &[2, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0]);
        assert!(bytes[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn hash_digest() {
        assert_eq!(HashType::None.digest(b"x"), None);
        assert_eq!(
            hex::encode(HashType::Sha256.digest(b"abc").unwrap()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(HashType::Keccak256.digest(b"").unwrap()),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn wire_codes() {
        assert_eq!(Encoding::None.code(), 0);
        assert_eq!(Encoding::from_code(4), Some(Encoding::Evm));
        assert_eq!(Curve::from_code(2), Some(Curve::Bls12381G2));
        assert_eq!(HashType::from_code(3), None);
        assert_eq!(BlsDst::default().code(), 2);
    }
}
