//! Error types for the Lattice signer library.
//!
//! This module provides a single error type [`enum@Error`] covering every
//! failure mode of the secure channel, the signing codec and signature
//! recovery, plus [`DeviceError`] for status codes reported by the device.
//!
//! # Error Categories
//!
//! - **Protocol errors**: malformed envelopes, wrong version or message type
//! - **Integrity errors**: checksum mismatches on envelopes or decrypted data
//! - **Device errors**: non-success status codes returned by the device
//! - **Encoding errors**: requests the firmware cannot accept, detected locally
//! - **Recovery errors**: the ECDSA recovery parameter could not be derived
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::{DeviceError, Error};
//!
//! let err = Error::Device(DeviceError::WrongWallet);
//! assert!(matches!(err, Error::Device(DeviceError::WrongWallet)));
//! ```

use core::fmt;
use core::result::Result as CoreResult;

use alloy_rlp::Error as AlloyRlpError;
use hex::FromHexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// The main error type for the Lattice signer library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// The device response did not follow the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An integrity checksum did not match.
    ///
    /// The response must be discarded; only a full resend of the request can
    /// recover from this.
    #[error("checksum mismatch in {0}")]
    Checksum(&'static str),

    /// The device reported a non-success status code.
    #[error("device error: {0}")]
    Device(DeviceError),

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// No device session has been established yet.
    #[error("not connected to a device")]
    NotConnected,

    /// The device is connected but this client has not been paired with it.
    #[error("client is not paired with the device")]
    NotPaired,

    /// The device reported no usable wallet.
    #[error("device has no active wallet")]
    NoActiveWallet,

    /// The client identity could not be created.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// The signing request cannot be encoded for the connected firmware.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A public key is invalid or malformed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A signature is invalid or malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The recovery parameter (v) could not be determined.
    #[error("signature recovery failed: {0}")]
    Recovery(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The transport failed to deliver the request or its response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport gave up waiting for the device.
    #[error("request timed out")]
    Timeout,

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    /// Failed to parse hex data.
    #[error("hex decoding failed: {0}")]
    HexDecodeFailed(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<FromHexError> for Error {
    fn from(err: FromHexError) -> Self {
        Error::HexDecodeFailed(err.to_string())
    }
}

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Error::JsonError(err.to_string())
    }
}

impl From<AlloyRlpError> for Error {
    fn from(err: AlloyRlpError) -> Self {
        Error::Recovery(format!("transaction payload is not valid RLP: {err}"))
    }
}

impl From<TomlError> for Error {
    fn from(err: TomlError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        Error::Device(err)
    }
}

/// A status code reported by the device in a response envelope.
///
/// Every variant other than [`DeviceError::Unknown`] corresponds to a
/// documented firmware response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DeviceError {
    /// `0x80`: the request was malformed.
    InvalidMessage,
    /// `0x81`: the protocol version is not supported by the firmware.
    UnsupportedVersion,
    /// `0x82`: the device is busy with another request.
    DeviceBusy,
    /// `0x83`: the user did not respond on the device in time.
    UserTimeout,
    /// `0x84`: the user declined the request on the device.
    UserDeclined,
    /// `0x85`: pairing failed (wrong secret or signature).
    PairingFailed,
    /// `0x86`: pairing mode is disabled on the device.
    PairingDisabled,
    /// `0x87`: the permission for this request is disabled.
    PermissionDisabled,
    /// `0x88`: internal device error.
    Internal,
    /// `0x89`: the secure compute element timed out.
    GceTimeout,
    /// `0x8a`: the active wallet changed or is not present.
    WrongWallet,
    /// `0x8b`: the device is locked.
    DeviceLocked,
    /// `0x8c`: the feature is disabled.
    Disabled,
    /// `0x8d`: the record already exists.
    AlreadyExists,
    /// `0x8e`: the request was encrypted for a stale ephemeral key.
    InvalidEphemeralId,
    /// A status code this library does not know about.
    Unknown(u8),
}

impl DeviceError {
    /// Maps a raw (non-success) status byte to a device error.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x80 => Self::InvalidMessage,
            0x81 => Self::UnsupportedVersion,
            0x82 => Self::DeviceBusy,
            0x83 => Self::UserTimeout,
            0x84 => Self::UserDeclined,
            0x85 => Self::PairingFailed,
            0x86 => Self::PairingDisabled,
            0x87 => Self::PermissionDisabled,
            0x88 => Self::Internal,
            0x89 => Self::GceTimeout,
            0x8a => Self::WrongWallet,
            0x8b => Self::DeviceLocked,
            0x8c => Self::Disabled,
            0x8d => Self::AlreadyExists,
            0x8e => Self::InvalidEphemeralId,
            other => Self::Unknown(other),
        }
    }

    /// Returns the raw status byte for this error.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::InvalidMessage => 0x80,
            Self::UnsupportedVersion => 0x81,
            Self::DeviceBusy => 0x82,
            Self::UserTimeout => 0x83,
            Self::UserDeclined => 0x84,
            Self::PairingFailed => 0x85,
            Self::PairingDisabled => 0x86,
            Self::PermissionDisabled => 0x87,
            Self::Internal => 0x88,
            Self::GceTimeout => 0x89,
            Self::WrongWallet => 0x8a,
            Self::DeviceLocked => 0x8b,
            Self::Disabled => 0x8c,
            Self::AlreadyExists => 0x8d,
            Self::InvalidEphemeralId => 0x8e,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::InvalidMessage => "Invalid Request",
            Self::UnsupportedVersion => "Unsupported Version",
            Self::DeviceBusy => "Device Busy",
            Self::UserTimeout => "Timeout waiting for user",
            Self::UserDeclined => "Request declined by user",
            Self::PairingFailed => "Pairing failed",
            Self::PairingDisabled => "Pairing is currently disabled",
            Self::PermissionDisabled => "Automated signing is currently disabled",
            Self::Internal => "Device Error",
            Self::GceTimeout => "Device Timeout",
            Self::WrongWallet => "Active wallet does not match request",
            Self::DeviceLocked => "Device Locked",
            Self::Disabled => "Disabled",
            Self::AlreadyExists => "Record already exists",
            Self::InvalidEphemeralId => "Request failed - needs resync",
            Self::Unknown(code) => return write!(f, "Unknown device code {code:#04x}"),
        };
        write!(f, "{msg} (code {:#04x})", self.code())
    }
}

/// A specialized [`Result`] type for Lattice signer operations.
pub type Result<T> = CoreResult<T, Error>;

#[cfg(test)]
mod tests {
    use serde_json::{Value, from_str};

    use super::*;

    #[test]
    fn error_display() {
        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "not connected to a device");

        let err = Error::Checksum("response envelope");
        assert_eq!(err.to_string(), "checksum mismatch in response envelope");

        let err = Error::Device(DeviceError::DeviceBusy);
        assert_eq!(err.to_string(), "device error: Device Busy (code 0x82)");
    }

    #[test]
    fn device_error_codes_roundtrip() {
        for code in 0x80..=0x8e {
            assert_eq!(DeviceError::from_code(code).code(), code);
        }
        assert_eq!(DeviceError::from_code(0x42), DeviceError::Unknown(0x42));
        assert_eq!(
            DeviceError::Unknown(0x42).to_string(),
            "Unknown device code 0x42"
        );
    }

    #[test]
    fn from_hex_error() {
        let hex_err = FromHexError::InvalidHexCharacter { c: 'g', index: 0 };
        let err: Error = hex_err.into();
        assert!(matches!(err, Error::HexDecodeFailed(_)));
    }

    #[test]
    fn from_json_error() {
        let json_err = from_str::<Value>("not valid json{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::JsonError(_)));
    }

    #[test]
    fn from_device_error() {
        let err: Error = DeviceError::WrongWallet.into();
        assert!(matches!(err, Error::Device(DeviceError::WrongWallet)));
    }
}
