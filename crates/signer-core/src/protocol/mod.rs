//! Device wire protocol.
//!
//! This module provides the two layers every device call passes through:
//!
//! - [`envelope`]: the plaintext outer message (version, type, id, length,
//!   checksum) carrying a request code and payload
//! - [`channel`]: the encrypted layer inside `ENCRYPTED_REQUEST` envelopes,
//!   keyed by ECDH with the device's rotating ephemeral key
//!
//! # Request Codes
//!
//! Envelopes carry a [`DeviceRequest`] code. Encrypted envelopes carry a
//! second, inner [`EncryptedRequest`] code whose response has a fixed
//! decrypted length.
//!
//! # Integrity
//!
//! The CRC32 checksums in both layers detect transport corruption only.
//! They are not a MAC: confidentiality comes from AES-256-CBC and
//! authenticity of the device from the pairing handshake.

pub mod channel;
pub mod envelope;

pub use channel::{SecureChannel, Session};
pub use envelope::{Envelope, EnvelopeResponse};

/// Protocol version byte carried by every envelope.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Envelope message types.
pub mod msg_type {
    /// A request sent by the client.
    pub const REQUEST: u8 = 0x02;

    /// A response sent by the device.
    pub const RESPONSE: u8 = 0x00;
}

/// Status byte of a successful response envelope.
pub const STATUS_SUCCESS: u8 = 0x00;

/// Length of an uncompressed P-256 ephemeral public key.
pub const EPHEMERAL_KEY_LEN: usize = 65;

/// Fixed plaintext size of an encrypted request.
pub const ENCRYPTED_MESSAGE_LEN: usize = 1728;

/// Fixed AES-CBC initialization vector used by the device.
pub const AES_IV: [u8; 16] = *b"mysecretpassword";

/// Pairing status byte in a connect response when the client is already
/// paired with the device.
pub const PAIRING_STATUS_PAIRED: u8 = 0x00;

/// Sign request schema for the first frame of a generic signing request.
pub const SIGN_SCHEMA_GENERAL: u8 = 5;

/// Sign request schema for a continuation frame.
pub const SIGN_SCHEMA_EXTRA_DATA: u8 = 4;

/// Length of the continuation code returned for each non-final sign frame.
pub const CONTINUATION_CODE_LEN: usize = 8;

/// Request codes carried in the plaintext envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceRequest {
    /// Announce the identity public key and receive an ephemeral key.
    Connect = 1,
    /// Carries an encrypted request.
    EncryptedRequest = 2,
}

impl DeviceRequest {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parses a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Connect),
            2 => Some(Self::EncryptedRequest),
            _ => None,
        }
    }
}

/// Request codes carried inside an encrypted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EncryptedRequest {
    /// Submit the signed pairing secret.
    FinalizePairing = 0,
    /// Generic signing, one frame per request.
    Sign = 3,
    /// Fetch the internal and external wallet descriptors.
    GetWallets = 4,
}

impl EncryptedRequest {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parses a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::FinalizePairing),
            3 => Some(Self::Sign),
            4 => Some(Self::GetWallets),
            _ => None,
        }
    }

    /// Returns the fixed length of the decrypted response data.
    #[must_use]
    pub const fn response_len(self) -> usize {
        match self {
            Self::FinalizePairing => 0,
            Self::Sign => 1090,
            Self::GetWallets => 142,
        }
    }
}

/// CRC32 (IEEE) used by both protocol layers.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_codes() {
        assert_eq!(DeviceRequest::Connect.code(), 1);
        assert_eq!(DeviceRequest::from_code(2), Some(DeviceRequest::EncryptedRequest));
        assert_eq!(DeviceRequest::from_code(9), None);

        for req in [
            EncryptedRequest::FinalizePairing,
            EncryptedRequest::Sign,
            EncryptedRequest::GetWallets,
        ] {
            assert_eq!(EncryptedRequest::from_code(req.code()), Some(req));
        }
    }

    #[test]
    fn checksum_matches_ieee_crc32() {
        // Standard check value for CRC-32/ISO-HDLC.
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }
}
