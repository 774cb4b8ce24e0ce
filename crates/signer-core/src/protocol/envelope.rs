//! Outer envelope framing for device requests and responses.
//!
//! Every message exchanged with the device, plaintext or encrypted, is
//! wrapped in an envelope.
//!
//! # Request Structure
//!
//! ```text
//! | version | msgType | requestId | length | requestCode | payload | checksum |
//! |---------|---------|-----------|--------|-------------|---------|----------|
//! | 1B      | 1B      | 4B (BE)   | 2B (BE)| 1B          | Var     | 4B (BE)  |
//! ```
//!
//! # Response Structure
//!
//! ```text
//! | version | msgType | requestId | length | status | payload | checksum |
//! |---------|---------|-----------|--------|--------|---------|----------|
//! | 1B      | 1B      | 4B (BE)   | 2B (BE)| 1B     | Var     | 4B (BE)  |
//! ```
//!
//! - **length** counts the code/status byte plus the payload
//! - **checksum** is CRC32 over every preceding byte
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::protocol::{Envelope, EnvelopeResponse};
//!
//! let request = Envelope::new(0x01, b"hello".to_vec());
//! let bytes = request.to_bytes().unwrap();
//! assert_eq!(Envelope::parse(&bytes).unwrap(), request);
//!
//! let response = EnvelopeResponse::new(request.request_id(), 0x00, b"world".to_vec());
//! let parsed = EnvelopeResponse::parse(&response.to_bytes().unwrap()).unwrap();
//! assert!(parsed.is_success());
//! assert_eq!(parsed.data(), b"world");
//! ```

use super::{PROTOCOL_VERSION, STATUS_SUCCESS, checksum, msg_type};
use crate::cursor::{Reader, Writer};
use crate::error::{DeviceError, Error, Result};

/// Size of everything in an envelope except the payload.
const FRAMING_LEN: usize = 1 + 1 + 4 + 2 + 1 + 4;

/// A request envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Random request identifier echoed by the device.
    request_id: u32,

    /// Device request code.
    request_code: u8,

    /// Request payload.
    payload: Vec<u8>,
}

impl Envelope {
    /// Creates a request envelope with a random request id.
    ///
    /// # Arguments
    ///
    /// * `request_code` - The device request code
    /// * `payload` - The request payload
    #[must_use]
    pub fn new(request_code: u8, payload: Vec<u8>) -> Self {
        Self::with_id(rand::random(), request_code, payload)
    }

    /// Creates a request envelope with an explicit request id.
    #[must_use]
    pub const fn with_id(request_id: u32, request_code: u8, payload: Vec<u8>) -> Self {
        Self {
            request_id,
            request_code,
            payload,
        }
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Returns the request code.
    #[must_use]
    pub const fn request_code(&self) -> u8 {
        self.request_code
    }

    /// Returns the payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the envelope and returns the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Serializes the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the payload does not fit the 16-bit
    /// length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(
            msg_type::REQUEST,
            self.request_id,
            self.request_code,
            &self.payload,
        )
    }

    /// Parses a request envelope. Used by the device side of the protocol.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] on a wrong version, message type or length
    /// - [`Error::Checksum`] if the trailing checksum does not match
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (request_id, request_code, payload) = decode(bytes, msg_type::REQUEST, "request")?;
        Ok(Self::with_id(request_id, request_code, payload.to_vec()))
    }
}

/// A response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeResponse {
    /// Request id this response answers.
    request_id: u32,

    /// Status byte (`0x00` on success).
    status: u8,

    /// Response payload.
    data: Vec<u8>,
}

impl EnvelopeResponse {
    /// Creates a response envelope.
    #[must_use]
    pub const fn new(request_id: u32, status: u8, data: Vec<u8>) -> Self {
        Self {
            request_id,
            status,
            data,
        }
    }

    /// Creates an error response with no payload.
    #[must_use]
    pub const fn error(request_id: u32, err: DeviceError) -> Self {
        Self::new(request_id, err.code(), Vec::new())
    }

    /// Parses a response envelope.
    ///
    /// The checksum is verified before the status byte is looked at.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] on a wrong version, message type or length
    /// - [`Error::Checksum`] if the trailing checksum does not match
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (request_id, status, data) = decode(bytes, msg_type::RESPONSE, "response")?;
        Ok(Self::new(request_id, status, data.to_vec()))
    }

    /// Serializes the response envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the payload does not fit the 16-bit
    /// length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(msg_type::RESPONSE, self.request_id, self.status, &self.data)
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Returns the raw status byte.
    #[must_use]
    pub const fn status(&self) -> u8 {
        self.status
    }

    /// Returns the response data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the response and returns the data.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Checks if the device reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Checks the status and returns an error if the device reported one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] with the named status code.
    pub const fn check(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::Device(DeviceError::from_code(self.status)))
        }
    }
}

/// Parses a response envelope and returns its data if the device reported
/// success.
///
/// # Errors
///
/// Any error from [`EnvelopeResponse::parse`] or [`EnvelopeResponse::check`].
pub fn parse_response(bytes: &[u8]) -> Result<Vec<u8>> {
    let response = EnvelopeResponse::parse(bytes)?;
    response.check()?;
    Ok(response.into_data())
}

fn encode(kind: u8, request_id: u32, code: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let length = u16::try_from(payload.len() + 1).map_err(|_| {
        Error::Encoding(format!(
            "envelope payload of {} bytes exceeds the length field",
            payload.len()
        ))
    })?;

    let mut w = Writer::with_capacity(FRAMING_LEN + payload.len());
    w.put_u8(PROTOCOL_VERSION);
    w.put_u8(kind);
    w.put_u32_be(request_id);
    w.put_u16_be(length);
    w.put_u8(code);
    w.put_slice(payload);
    let crc = checksum(w.as_slice());
    w.put_u32_be(crc);
    Ok(w.into_vec())
}

fn decode<'a>(bytes: &'a [u8], kind: u8, what: &'static str) -> Result<(u32, u8, &'a [u8])> {
    let mut r = Reader::new(bytes);

    let version = r.read_u8()?;
    if version != PROTOCOL_VERSION {
        return Err(Error::Protocol(format!(
            "unsupported {what} version {version:#04x}"
        )));
    }
    let found = r.read_u8()?;
    if found != kind {
        return Err(Error::Protocol(format!(
            "unexpected {what} message type {found:#04x}"
        )));
    }
    let request_id = r.read_u32_be()?;
    let length = usize::from(r.read_u16_be()?);
    if length == 0 {
        return Err(Error::Protocol(format!("empty {what} envelope")));
    }
    let body = r.read_bytes(length)?;
    let covered = r.position();
    let crc = r.read_u32_be()?;
    if crc != checksum(&bytes[..covered]) {
        return Err(Error::Checksum(match kind {
            msg_type::REQUEST => "request envelope",
            _ => "response envelope",
        }));
    }

    Ok((request_id, body[0], &body[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let env = Envelope::with_id(0x0102_0304, 0x01, vec![0xaa, 0xbb]);
        let bytes = env.to_bytes().unwrap();

        assert_eq!(
            &bytes[..10],
            &[0x01, 0x02, 0x01, 0x02, 0x03, 0x04, 0x00, 0x03, 0x01, 0xaa]
        );
        assert_eq!(bytes.len(), FRAMING_LEN + 2);

        let crc = checksum(&bytes[..bytes.len() - 4]);
        assert_eq!(&bytes[bytes.len() - 4..], &crc.to_be_bytes());
    }

    #[test]
    fn response_roundtrip() {
        let resp = EnvelopeResponse::new(7, STATUS_SUCCESS, vec![1, 2, 3]);
        let parsed = EnvelopeResponse::parse(&resp.to_bytes().unwrap()).unwrap();

        assert_eq!(parsed, resp);
        assert!(parsed.check().is_ok());
    }

    #[test]
    fn response_device_error() {
        let resp = EnvelopeResponse::error(7, DeviceError::DeviceBusy);
        let err = parse_response(&resp.to_bytes().unwrap()).unwrap_err();

        assert!(matches!(err, Error::Device(DeviceError::DeviceBusy)));
    }

    #[test]
    fn response_unknown_status() {
        let resp = EnvelopeResponse::new(7, 0x42, vec![]);
        let err = parse_response(&resp.to_bytes().unwrap()).unwrap_err();

        assert!(matches!(err, Error::Device(DeviceError::Unknown(0x42))));
    }

    #[test]
    fn checksum_verified_before_status() {
        let resp = EnvelopeResponse::error(7, DeviceError::WrongWallet);
        let mut bytes = resp.to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let err = parse_response(&bytes).unwrap_err();
        assert!(matches!(err, Error::Checksum("response envelope")));
    }

    #[test]
    fn wrong_version_and_type() {
        let mut bytes = EnvelopeResponse::new(1, 0, vec![])
            .to_bytes()
            .unwrap();
        bytes[0] = 0x02;
        assert!(matches!(
            EnvelopeResponse::parse(&bytes),
            Err(Error::Protocol(_))
        ));

        // A request is not a response.
        let request = Envelope::with_id(1, 1, vec![]).to_bytes().unwrap();
        assert!(matches!(
            EnvelopeResponse::parse(&request),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn truncated_envelope() {
        let bytes = EnvelopeResponse::new(1, 0, vec![9; 16]).to_bytes().unwrap();
        let err = EnvelopeResponse::parse(&bytes[..bytes.len() - 6]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn oversized_payload() {
        let env = Envelope::with_id(1, 2, vec![0; u16::MAX as usize]);
        assert!(matches!(env.to_bytes(), Err(Error::Encoding(_))));
    }
}
