//! Firmware versions and the signing limits they imply.
//!
//! The connect response carries the device firmware version. Generic
//! signing capabilities grew over several releases, so the codec validates
//! every request against a [`FirmwareLimits`] descriptor derived from that
//! version (or supplied by the caller) before anything is sent.
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::firmware::{FirmwareLimits, FirmwareVersion};
//! use lattice_signer_core::signing::{Curve, Encoding};
//!
//! let limits = FirmwareLimits::for_version(FirmwareVersion::new(0, 14, 0)).unwrap();
//! assert!(limits.supports_encoding(Encoding::Evm));
//! assert!(!limits.supports_curve(Curve::Bls12381G2));
//!
//! assert!(FirmwareLimits::for_version(FirmwareVersion::new(0, 9, 3)).is_err());
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::signing::{Curve, Encoding, HashType};

/// A firmware version `major.minor.fix`.
///
/// Ordering compares major, then minor, then fix.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FirmwareVersion {
    major: u8,
    minor: u8,
    fix: u8,
}

impl FirmwareVersion {
    /// First version with generic signing.
    pub const GENERIC_SIGNING: Self = Self::new(0, 10, 0);

    /// First version with the EVM encoding.
    pub const EVM_ENCODING: Self = Self::new(0, 14, 0);

    /// First version with calldata decoder metadata.
    pub const CALLDATA_DECODING: Self = Self::new(0, 16, 0);

    /// First version with BLS12-381 and the ETH deposit encoding.
    pub const BLS_SIGNING: Self = Self::new(0, 17, 0);

    #[must_use]
    pub const fn new(major: u8, minor: u8, fix: u8) -> Self {
        Self { major, minor, fix }
    }

    /// Parses the 4-byte connect-response field `[fix, minor, major, reserved]`.
    #[must_use]
    pub const fn from_wire(bytes: [u8; 4]) -> Self {
        Self::new(bytes[2], bytes[1], bytes[0])
    }

    /// Encodes the 4-byte connect-response field.
    #[must_use]
    pub const fn to_wire(self) -> [u8; 4] {
        [self.fix, self.minor, self.major, 0]
    }

    #[must_use]
    pub const fn major(&self) -> u8 {
        self.major
    }

    #[must_use]
    pub const fn minor(&self) -> u8 {
        self.minor
    }

    #[must_use]
    pub const fn fix(&self) -> u8 {
        self.fix
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.fix)
    }
}

/// Calldata decoder limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderLimits {
    /// Marker word preceding the decoder block.
    pub reserved: u32,

    /// Largest decoder blob the device accepts.
    pub max_size: usize,
}

impl DecoderLimits {
    /// The reserved marker word `2895728`.
    pub const RESERVED: u32 = 0x002c_2f70;
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            reserved: Self::RESERVED,
            max_size: 1024,
        }
    }
}

/// Hard limits and capabilities of the connected firmware.
///
/// Callers targeting unusual firmware may build their own descriptor; the
/// codec trusts whatever it is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareLimits {
    /// Size of the base signing frame, header included.
    pub base_request_size: usize,

    /// Payload bytes that fit in the base frame after the header.
    pub base_data_size: usize,

    /// Payload bytes per extra frame.
    pub extra_frame_size: usize,

    /// Maximum number of extra frames.
    pub max_extra_frames: usize,

    /// Whether oversized payloads may be hashed by the client.
    pub prehash_allowed: bool,

    /// Supported curves.
    pub curves: Vec<Curve>,

    /// Supported hash types.
    pub hashes: Vec<HashType>,

    /// Supported encodings.
    pub encodings: Vec<Encoding>,

    /// Calldata decoding support, if any.
    pub decoder: Option<DecoderLimits>,
}

impl FirmwareLimits {
    /// Derives the limits for a firmware version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the firmware predates generic signing.
    pub fn for_version(version: FirmwareVersion) -> Result<Self> {
        if version < FirmwareVersion::GENERIC_SIGNING {
            return Err(Error::Encoding(format!(
                "generic signing unsupported by firmware {version}"
            )));
        }

        let mut limits = Self {
            base_request_size: 1552,
            base_data_size: 1519,
            extra_frame_size: 1500,
            max_extra_frames: 1,
            prehash_allowed: true,
            curves: vec![Curve::Secp256k1, Curve::Ed25519],
            hashes: vec![HashType::None, HashType::Keccak256, HashType::Sha256],
            encodings: vec![Encoding::None, Encoding::Solana],
            decoder: None,
        };
        if version >= FirmwareVersion::EVM_ENCODING {
            limits.encodings.push(Encoding::Evm);
        }
        if version >= FirmwareVersion::CALLDATA_DECODING {
            limits.decoder = Some(DecoderLimits::default());
        }
        if version >= FirmwareVersion::BLS_SIGNING {
            limits.curves.push(Curve::Bls12381G2);
            limits.encodings.push(Encoding::EthDeposit);
        }
        Ok(limits)
    }

    /// Largest payload that can be sent without prehashing.
    #[must_use]
    pub const fn max_expanded_size(&self) -> usize {
        self.base_data_size + self.max_extra_frames * self.extra_frame_size
    }

    #[must_use]
    pub fn supports_curve(&self, curve: Curve) -> bool {
        self.curves.contains(&curve)
    }

    #[must_use]
    pub fn supports_hash(&self, hash: HashType) -> bool {
        self.hashes.contains(&hash)
    }

    #[must_use]
    pub fn supports_encoding(&self, encoding: Encoding) -> bool {
        self.encodings.contains(&encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        assert!(FirmwareVersion::new(0, 10, 0) > FirmwareVersion::new(0, 9, 99));
        assert!(FirmwareVersion::new(1, 0, 0) > FirmwareVersion::new(0, 17, 5));
        assert_eq!(FirmwareVersion::new(0, 15, 2).to_string(), "0.15.2");
    }

    #[test]
    fn wire_field_order() {
        let v = FirmwareVersion::from_wire([3, 15, 0, 0]);
        assert_eq!(v, FirmwareVersion::new(0, 15, 3));
        assert_eq!(v.to_wire(), [3, 15, 0, 0]);
    }

    #[test]
    fn capability_tiers() {
        let v10 = FirmwareLimits::for_version(FirmwareVersion::new(0, 10, 0)).unwrap();
        assert!(v10.supports_curve(Curve::Ed25519));
        assert!(!v10.supports_encoding(Encoding::Evm));
        assert!(v10.decoder.is_none());

        let v16 = FirmwareLimits::for_version(FirmwareVersion::new(0, 16, 0)).unwrap();
        assert!(v16.supports_encoding(Encoding::Evm));
        assert_eq!(v16.decoder.map(|d| d.reserved), Some(2_895_728));
        assert!(!v16.supports_curve(Curve::Bls12381G2));

        let v17 = FirmwareLimits::for_version(FirmwareVersion::new(0, 17, 0)).unwrap();
        assert!(v17.supports_curve(Curve::Bls12381G2));
        assert!(v17.supports_encoding(Encoding::EthDeposit));
    }

    #[test]
    fn too_old_for_generic_signing() {
        let err = FirmwareLimits::for_version(FirmwareVersion::new(0, 9, 0)).unwrap_err();
        assert!(err.to_string().contains("generic signing unsupported"));
    }

    #[test]
    fn expanded_size() {
        let limits = FirmwareLimits::for_version(FirmwareVersion::new(0, 15, 0)).unwrap();
        assert_eq!(limits.max_expanded_size(), 1519 + 1500);
        assert_eq!(limits.base_request_size - limits.base_data_size, 33);
    }
}
