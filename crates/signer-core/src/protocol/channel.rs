//! Secure channel to the device.
//!
//! This module provides the [`SecureChannel`] type, which owns the
//! transport, the client [`Identity`] and the current device [`Session`]. It
//! handles:
//!
//! - Connecting (announcing the identity key, receiving an ephemeral key)
//! - Pairing (proving knowledge of the secret shown on the device screen)
//! - Encrypting requests and decrypting responses
//! - Rotating the device ephemeral key after every successful exchange
//!
//! # Encrypted Request
//!
//! ```text
//! | ephemeralId | AES-256-CBC(code | payload | crc32 LE | zero padding) |
//! |-------------|-------------------------------------------------------|
//! | 4B (LE)     | 1728B                                                 |
//! ```
//!
//! # Decrypted Response
//!
//! ```text
//! | nextEphemeralKey | data        | crc32 BE | padding |
//! |------------------|-------------|----------|---------|
//! | 65B              | fixed per request code | 4B |   |
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lattice_signer_core::protocol::SecureChannel;
//! use lattice_signer_core::protocol::EncryptedRequest;
//!
//! let mut channel = SecureChannel::new(identity, transport);
//! if !channel.establish("device-id")? {
//!     channel.pair("SECRET12")?;
//! }
//! let wallets = channel.request(EncryptedRequest::GetWallets, &[])?;
//! ```

use core::fmt;

use aes::Aes256;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use p256::PublicKey;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::envelope::{Envelope, parse_response};
use super::{
    AES_IV, DeviceRequest, ENCRYPTED_MESSAGE_LEN, EPHEMERAL_KEY_LEN, EncryptedRequest,
    PAIRING_STATUS_PAIRED, checksum,
};
use crate::crypto::DER_SLOT_LEN;
use crate::cursor::{Reader, Writer};
use crate::error::{Error, Result};
use crate::firmware::FirmwareVersion;
use crate::identity::{Identity, NAME_FIELD_LEN};
use crate::transport::Transport;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size.
const BLOCK_LEN: usize = 16;

/// State of one device relationship.
///
/// Created by [`SecureChannel::establish`]. The ephemeral key is replaced
/// after every checksum-valid decrypt and at no other time.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    device_id: String,
    ephemeral_key: PublicKey,
    paired: bool,
    firmware: Option<FirmwareVersion>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.device_id)
            .field("paired", &self.paired)
            .field("firmware", &self.firmware)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Returns the device id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the current device ephemeral public key.
    #[must_use]
    pub const fn ephemeral_key(&self) -> &PublicKey {
        &self.ephemeral_key
    }

    /// Returns `true` if this client is paired with the device.
    #[must_use]
    pub const fn is_paired(&self) -> bool {
        self.paired
    }

    /// Returns the firmware version reported on connect, if any.
    #[must_use]
    pub const fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }
}

/// An authenticated, encrypted channel to one device.
///
/// Strictly request-then-response: every device call takes `&mut self`.
pub struct SecureChannel {
    /// The underlying transport.
    transport: Box<dyn Transport>,

    /// The static client identity.
    identity: Identity,

    /// Current session, once connected.
    session: Option<Session>,
}

impl fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("identity", &self.identity)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SecureChannel {
    /// Creates a channel with the given identity and transport.
    ///
    /// # Note
    ///
    /// No session exists yet; call [`establish`](Self::establish) first.
    #[must_use]
    pub fn new(identity: Identity, transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            identity,
            session: None,
        }
    }

    /// Returns the client identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the current session, if connected.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns `true` if a session exists and the transport is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_some() && self.transport.is_connected()
    }

    /// Returns `true` if the current session is paired.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_paired)
    }

    /// Connects to a device, replacing any existing session.
    ///
    /// Sends the identity public key in a plaintext envelope and stores the
    /// returned ephemeral key and firmware version.
    ///
    /// # Returns
    ///
    /// `true` if the device already knows this client.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the ephemeral key is malformed
    /// - Any transport or device error
    pub fn establish(&mut self, device_id: &str) -> Result<bool> {
        let request = Envelope::new(
            DeviceRequest::Connect.code(),
            self.identity.public_key_bytes().to_vec(),
        );
        let response = self.transport.transmit(device_id, &request.to_bytes()?)?;
        let data = parse_response(&response)?;

        let mut r = Reader::new(&data);
        let paired = r.read_u8()? == PAIRING_STATUS_PAIRED;
        let ephemeral_key = parse_ephemeral_key(r.read_bytes(EPHEMERAL_KEY_LEN)?)?;
        let firmware = if r.remaining() >= 4 {
            Some(FirmwareVersion::from_wire(r.read_array()?))
        } else {
            None
        };

        info!(
            device_id,
            paired,
            firmware = %firmware.map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            "connected to device"
        );

        self.session = Some(Session {
            device_id: device_id.to_string(),
            ephemeral_key,
            paired,
            firmware,
        });
        Ok(paired)
    }

    /// Pairs with the device using the secret displayed on its screen.
    ///
    /// The pairing payload is the padded identity name followed by a P-256
    /// signature over `sha256(identityPub || paddedName || secret)`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no session exists
    /// - [`Error::Device`] with [`PairingFailed`](crate::DeviceError::PairingFailed)
    ///   if the secret is wrong
    pub fn pair(&mut self, secret: &str) -> Result<()> {
        if self.session.is_none() {
            return Err(Error::NotConnected);
        }

        let signature = Zeroizing::new(self.identity.sign_pairing(secret)?);
        let mut w = Writer::with_capacity(NAME_FIELD_LEN + DER_SLOT_LEN);
        w.put_slice(&self.identity.padded_name());
        w.put_padded(&signature, DER_SLOT_LEN)?;
        let payload = Zeroizing::new(w.into_vec());

        self.request(EncryptedRequest::FinalizePairing, &payload)?;

        if let Some(session) = self.session.as_mut() {
            session.paired = true;
        }
        info!(name = self.identity.name(), "paired with device");
        Ok(())
    }

    /// Sends an encrypted request and returns the decrypted response data.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no session exists
    /// - [`Error::Device`] if the device rejected the request
    /// - [`Error::Checksum`] if the decrypted response is corrupt
    pub fn request(&mut self, code: EncryptedRequest, payload: &[u8]) -> Result<Vec<u8>> {
        let device_id = self
            .session
            .as_ref()
            .map(|s| s.device_id.clone())
            .ok_or(Error::NotConnected)?;

        let encrypted = self.encrypt(code, payload)?;
        let envelope = Envelope::new(DeviceRequest::EncryptedRequest.code(), encrypted);
        debug!(?code, payload_len = payload.len(), "sending encrypted request");

        let response = self.transport.transmit(&device_id, &envelope.to_bytes()?)?;
        let data = parse_response(&response)?;
        self.decrypt(&data, code.response_len())
    }

    /// Encrypts a request under the current shared secret.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no session exists
    /// - [`Error::Encoding`] if the request does not fit the fixed message size
    pub fn encrypt(&self, code: EncryptedRequest, payload: &[u8]) -> Result<Vec<u8>> {
        let shared = self.shared_secret()?;

        let mut plain = Writer::with_capacity(ENCRYPTED_MESSAGE_LEN);
        plain.put_u8(code.code());
        plain.put_slice(payload);
        let crc = checksum(plain.as_slice());
        plain.put_u32_le(crc);
        if plain.len() > ENCRYPTED_MESSAGE_LEN {
            return Err(Error::Encoding(format!(
                "encrypted request of {} bytes exceeds {ENCRYPTED_MESSAGE_LEN}",
                plain.len()
            )));
        }
        plain.pad_to(ENCRYPTED_MESSAGE_LEN);
        let mut buf = Zeroizing::new(plain.into_vec());

        let ciphertext = aes_encrypt(&shared, &mut buf)?;

        let mut w = Writer::with_capacity(4 + ENCRYPTED_MESSAGE_LEN);
        w.put_u32_le(ephemeral_id(&shared));
        w.put_slice(ciphertext);
        Ok(w.into_vec())
    }

    /// Decrypts a response, verifies its checksum and rotates the ephemeral
    /// key.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no session exists
    /// - [`Error::Protocol`] if the ciphertext is malformed or too short
    /// - [`Error::Checksum`] if the checksum does not match; the session is
    ///   left untouched
    pub fn decrypt(&mut self, ciphertext: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let shared = self.shared_secret()?;
        let mut buf = Zeroizing::new(ciphertext.to_vec());
        let plain = aes_decrypt(&shared, &mut buf)?;

        let covered = EPHEMERAL_KEY_LEN + expected_len;
        let mut r = Reader::new(plain);
        let next_key = r.read_bytes(EPHEMERAL_KEY_LEN)?;
        let data = r.read_bytes(expected_len)?;
        let crc = r.read_u32_be()?;
        if crc != checksum(&plain[..covered]) {
            return Err(Error::Checksum("decrypted response"));
        }

        let next_key = parse_ephemeral_key(next_key)?;
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;
        session.ephemeral_key = next_key;
        debug!(data_len = expected_len, "rotated ephemeral key");

        Ok(data.to_vec())
    }

    /// ECDH shared secret with the current ephemeral key. Never cached.
    fn shared_secret(&self) -> Result<Zeroizing<[u8; 32]>> {
        let session = self.session.as_ref().ok_or(Error::NotConnected)?;
        Ok(self.identity.shared_secret(&session.ephemeral_key))
    }
}

/// Routing id for an encrypted request: the first four bytes of
/// `sha256(sharedSecret)`.
pub(crate) fn ephemeral_id(shared: &[u8; 32]) -> u32 {
    let hash = Sha256::digest(shared);
    u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]])
}

pub(crate) fn parse_ephemeral_key(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| Error::Protocol("malformed ephemeral public key".to_string()))
}

/// Encrypts `buf` in place. Its length must be a multiple of the block size.
pub(crate) fn aes_encrypt<'a>(key: &[u8; 32], buf: &'a mut [u8]) -> Result<&'a [u8]> {
    let len = buf.len();
    Aes256CbcEnc::new(key.into(), &AES_IV.into())
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|_| Error::Encoding("plaintext is not block aligned".to_string()))
}

/// Decrypts `buf` in place. Its length must be a multiple of the block size.
pub(crate) fn aes_decrypt<'a>(key: &[u8; 32], buf: &'a mut [u8]) -> Result<&'a [u8]> {
    if buf.is_empty() || buf.len() % BLOCK_LEN != 0 {
        return Err(Error::Protocol(format!(
            "ciphertext of {} bytes is not block aligned",
            buf.len()
        )));
    }
    Aes256CbcDec::new(key.into(), &AES_IV.into())
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| Error::Protocol("ciphertext is not block aligned".to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use p256::ecdh::diffie_hellman;
    use p256::elliptic_curve::sec1::ToEncodedPoint;
    use proptest::prelude::*;
    use rand::rngs::OsRng;

    use super::*;
    use crate::error::DeviceError;
    use crate::protocol::envelope::{EnvelopeResponse, parse_response};
    use crate::protocol::STATUS_SUCCESS;

    /// A transport replaying canned responses.
    struct MockTransport {
        responses: VecDeque<Vec<u8>>,
    }

    impl MockTransport {
        fn new(responses: Vec<Vec<u8>>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
            }
        }
    }

    impl Transport for MockTransport {
        fn transmit(&mut self, _device_id: &str, _request: &[u8]) -> Result<Vec<u8>> {
            self.responses
                .pop_front()
                .ok_or_else(|| Error::Transport("no response".to_string()))
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn connect_response(paired: bool, ephemeral: &p256::SecretKey, fw: Option<[u8; 4]>) -> Vec<u8> {
        let mut data = vec![if paired { 0x00 } else { 0x01 }];
        data.extend_from_slice(ephemeral.public_key().to_encoded_point(false).as_bytes());
        if let Some(fw) = fw {
            data.extend_from_slice(&fw);
        }
        EnvelopeResponse::new(1, STATUS_SUCCESS, data)
            .to_bytes()
            .unwrap()
    }

    /// Encrypts a device response the way the device does.
    fn device_response(
        client: &Identity,
        ephemeral: &p256::SecretKey,
        next: &p256::SecretKey,
        data: &[u8],
        corrupt: bool,
    ) -> Vec<u8> {
        let client_pub = PublicKey::from_sec1_bytes(&client.public_key_bytes()).unwrap();
        let shared = diffie_hellman(ephemeral.to_nonzero_scalar(), client_pub.as_affine());
        let key: [u8; 32] = shared.raw_secret_bytes().as_slice().try_into().unwrap();

        let mut w = Writer::new();
        w.put_slice(next.public_key().to_encoded_point(false).as_bytes());
        w.put_slice(data);
        let mut crc = checksum(w.as_slice());
        if corrupt {
            crc ^= 1;
        }
        w.put_u32_be(crc);
        w.pad_to(w.len().div_ceil(BLOCK_LEN) * BLOCK_LEN);
        let mut buf = w.into_vec();
        let ct = aes_encrypt(&key, &mut buf).unwrap().to_vec();
        EnvelopeResponse::new(1, STATUS_SUCCESS, ct)
            .to_bytes()
            .unwrap()
    }

    fn channel(responses: Vec<Vec<u8>>) -> SecureChannel {
        let identity = Identity::generate("channel-test").unwrap();
        SecureChannel::new(identity, Box::new(MockTransport::new(responses)))
    }

    #[test]
    fn establish_parses_connect_response() {
        let eph = p256::SecretKey::random(&mut OsRng);
        let mut ch = channel(vec![connect_response(false, &eph, Some([2, 17, 0, 0]))]);

        assert!(!ch.establish("abc").unwrap());
        let session = ch.session().unwrap();
        assert_eq!(session.device_id(), "abc");
        assert_eq!(session.firmware(), Some(FirmwareVersion::new(0, 17, 2)));
        assert_eq!(session.ephemeral_key(), &eph.public_key());
        assert!(!ch.is_paired());
    }

    #[test]
    fn establish_without_firmware() {
        let eph = p256::SecretKey::random(&mut OsRng);
        let mut ch = channel(vec![connect_response(true, &eph, None)]);
        assert!(ch.establish("abc").unwrap());
        assert_eq!(ch.session().unwrap().firmware(), None);
    }

    #[test]
    fn establish_rejects_bad_ephemeral_key() {
        let mut data = vec![0x00, 0x04];
        data.extend_from_slice(&[0xff; 64]);
        let resp = EnvelopeResponse::new(1, 0, data).to_bytes().unwrap();
        let mut ch = channel(vec![resp]);

        assert!(matches!(ch.establish("abc"), Err(Error::Protocol(_))));
        assert!(ch.session().is_none());
    }

    #[test]
    fn request_requires_session() {
        let mut ch = channel(vec![]);
        assert!(matches!(
            ch.request(EncryptedRequest::GetWallets, &[]),
            Err(Error::NotConnected)
        ));
        assert!(matches!(ch.pair("secret"), Err(Error::NotConnected)));
    }

    #[test]
    fn encrypted_request_layout() {
        let eph = p256::SecretKey::random(&mut OsRng);
        let mut ch = channel(vec![connect_response(true, &eph, None)]);
        ch.establish("abc").unwrap();

        let encrypted = ch.encrypt(EncryptedRequest::Sign, b"payload").unwrap();
        assert_eq!(encrypted.len(), 4 + ENCRYPTED_MESSAGE_LEN);

        // Decrypt as the device would.
        let client_pub = PublicKey::from_sec1_bytes(&ch.identity().public_key_bytes()).unwrap();
        let shared = diffie_hellman(eph.to_nonzero_scalar(), client_pub.as_affine());
        let key: [u8; 32] = shared.raw_secret_bytes().as_slice().try_into().unwrap();
        assert_eq!(&encrypted[..4], &ephemeral_id(&key).to_le_bytes());

        let mut body = encrypted[4..].to_vec();
        let plain = aes_decrypt(&key, &mut body).unwrap();
        assert_eq!(plain[0], EncryptedRequest::Sign.code());
        assert_eq!(&plain[1..8], b"payload");
        let crc = checksum(&plain[..8]);
        assert_eq!(&plain[8..12], &crc.to_le_bytes());
        assert!(plain[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn encrypt_rejects_oversized_request() {
        let eph = p256::SecretKey::random(&mut OsRng);
        let mut ch = channel(vec![connect_response(true, &eph, None)]);
        ch.establish("abc").unwrap();

        let err = ch
            .encrypt(EncryptedRequest::Sign, &[0; ENCRYPTED_MESSAGE_LEN])
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn decrypt_rotates_ephemeral_key() {
        let identity = Identity::generate("rotate").unwrap();
        let eph = p256::SecretKey::random(&mut OsRng);
        let next = p256::SecretKey::random(&mut OsRng);
        let data = [0x5a; 142];
        let responses = vec![
            connect_response(true, &eph, None),
            device_response(&identity, &eph, &next, &data, false),
        ];
        let mut ch = SecureChannel::new(identity, Box::new(MockTransport::new(responses)));
        ch.establish("abc").unwrap();

        let out = ch.request(EncryptedRequest::GetWallets, &[]).unwrap();
        assert_eq!(out, data);
        assert_eq!(ch.session().unwrap().ephemeral_key(), &next.public_key());
    }

    #[test]
    fn checksum_failure_keeps_session() {
        let identity = Identity::generate("corrupt").unwrap();
        let eph = p256::SecretKey::random(&mut OsRng);
        let next = p256::SecretKey::random(&mut OsRng);
        let responses = vec![
            connect_response(true, &eph, None),
            device_response(&identity, &eph, &next, &[0; 142], true),
        ];
        let mut ch = SecureChannel::new(identity, Box::new(MockTransport::new(responses)));
        ch.establish("abc").unwrap();

        let err = ch.request(EncryptedRequest::GetWallets, &[]).unwrap_err();
        assert!(matches!(err, Error::Checksum("decrypted response")));
        assert_eq!(ch.session().unwrap().ephemeral_key(), &eph.public_key());
    }

    #[test]
    fn device_error_keeps_session() {
        let eph = p256::SecretKey::random(&mut OsRng);
        let busy = EnvelopeResponse::error(1, DeviceError::DeviceBusy)
            .to_bytes()
            .unwrap();
        let mut ch = channel(vec![connect_response(true, &eph, None), busy]);
        ch.establish("abc").unwrap();

        let err = ch.request(EncryptedRequest::GetWallets, &[]).unwrap_err();
        assert!(matches!(err, Error::Device(DeviceError::DeviceBusy)));
        assert_eq!(ch.session().unwrap().ephemeral_key(), &eph.public_key());
    }

    #[test]
    fn decrypt_rejects_unaligned_ciphertext() {
        let eph = p256::SecretKey::random(&mut OsRng);
        let mut ch = channel(vec![connect_response(true, &eph, None)]);
        ch.establish("abc").unwrap();
        assert!(matches!(ch.decrypt(&[0; 17], 0), Err(Error::Protocol(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn encrypt_decrypt_roundtrip(
            payload in prop::collection::vec(any::<u8>(), 0..1700),
            data in prop::collection::vec(any::<u8>(), 0..1100),
        ) {
            let identity = Identity::generate("roundtrip").unwrap();
            let eph = p256::SecretKey::random(&mut OsRng);
            let next = p256::SecretKey::random(&mut OsRng);
            let reply = device_response(&identity, &eph, &next, &data, false);
            let mut ch = SecureChannel::new(
                identity,
                Box::new(MockTransport::new(vec![connect_response(true, &eph, None)])),
            );
            ch.establish("abc").unwrap();

            // Client to device.
            let encrypted = ch.encrypt(EncryptedRequest::Sign, &payload).unwrap();
            let client_pub = PublicKey::from_sec1_bytes(&ch.identity().public_key_bytes()).unwrap();
            let shared = diffie_hellman(eph.to_nonzero_scalar(), client_pub.as_affine());
            let key: [u8; 32] = shared.raw_secret_bytes().as_slice().try_into().unwrap();
            let mut body = encrypted[4..].to_vec();
            let plain = aes_decrypt(&key, &mut body).unwrap();
            prop_assert_eq!(&plain[1..=payload.len()], payload.as_slice());

            // Device to client.
            let ciphertext = parse_response(&reply).unwrap();
            prop_assert_eq!(ch.decrypt(&ciphertext, data.len()).unwrap(), data);
            prop_assert_eq!(ch.session().unwrap().ephemeral_key(), &next.public_key());
        }
    }
}
