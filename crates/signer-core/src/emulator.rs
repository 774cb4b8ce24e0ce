//! In-process software device.
//!
//! [`Emulator`] implements [`Transport`] and speaks the device side of the
//! protocol: connect, pairing, wallet lookup and generic signing (including
//! extra frames and prehashed payloads). Secp256k1 signatures are real;
//! Ed25519 and BLS12-381 responses are deterministic filler of the right
//! shape.
//!
//! An [`EmulatorHandle`] shares the device state so tests can inspect it
//! and inject faults while a [`Client`](crate::Client) owns the transport.
//!
//! # Note
//!
//! This module is compiled for tests and with the `emulator` feature.
//!
//! # Example
//!
//! ```ignore
//! use lattice_signer_core::emulator::Emulator;
//! use lattice_signer_core::{Client, ClientConfig, DeviceError, Identity};
//!
//! let emulator = Emulator::new("device", "SECRET12");
//! let handle = emulator.handle();
//! let mut client = Client::new(Identity::generate("test")?, Box::new(emulator), &ClientConfig::default());
//!
//! client.connect("device")?;
//! client.pair("SECRET12")?;
//! handle.fail_next(DeviceError::DeviceBusy);
//! ```

use core::fmt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use k256::ecdsa::SigningKey;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdh::diffie_hellman;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::DER_SLOT_LEN;
use crate::cursor::{Reader, Writer};
use crate::error::{DeviceError, Error, Result};
use crate::firmware::{FirmwareLimits, FirmwareVersion};
use crate::identity::{NAME_FIELD_LEN, PUBLIC_KEY_LEN, pairing_digest};
use crate::protocol::channel::{aes_decrypt, aes_encrypt, ephemeral_id};
use crate::protocol::{
    CONTINUATION_CODE_LEN, DeviceRequest, ENCRYPTED_MESSAGE_LEN, EncryptedRequest, Envelope,
    EnvelopeResponse, PAIRING_STATUS_PAIRED, SIGN_SCHEMA_EXTRA_DATA, SIGN_SCHEMA_GENERAL,
    STATUS_SUCCESS, checksum,
};
use crate::signing::{Curve, HashType, MAX_PATH_LEN, SignerPath};
use crate::transport::Transport;
use crate::wallet::{WALLET_UID_LEN, WalletDescriptor, Wallets};

/// Pairing status byte for an unknown client.
const PAIRING_STATUS_UNPAIRED: u8 = 0x01;

type DeviceResult<T> = core::result::Result<T, DeviceError>;

/// Header fields of a base signing frame.
#[derive(Debug, Clone)]
struct SignHeader {
    hash: HashType,
    curve: Curve,
    path: Vec<u32>,
    omit_pubkey: bool,
    payload_len: usize,
}

/// A signing request waiting for extra frames.
#[derive(Debug)]
struct PendingSign {
    header: SignHeader,
    data: Vec<u8>,
    code: [u8; CONTINUATION_CODE_LEN],
}

/// What the device ends up signing.
enum Message<'a> {
    Full(&'a [u8]),
    Digest([u8; 32]),
}

struct DeviceState {
    device_id: String,
    pairing_secret: String,
    firmware: Option<FirmwareVersion>,
    limits: Option<FirmwareLimits>,
    seed: Zeroizing<[u8; 32]>,
    wallets: Wallets,
    paired_clients: Vec<[u8; PUBLIC_KEY_LEN]>,
    client_key: Option<PublicKey>,
    ephemeral: SecretKey,
    pending_sign: Option<PendingSign>,
    faults: VecDeque<DeviceError>,
    corrupt_next: bool,
    connects: usize,
    requests: HashMap<EncryptedRequest, usize>,
    last_message: Option<Vec<u8>>,
    last_decoder: Option<Vec<u8>>,
}

impl fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceState")
            .field("device_id", &self.device_id)
            .field("firmware", &self.firmware)
            .field("paired_clients", &self.paired_clients.len())
            .field("connects", &self.connects)
            .finish_non_exhaustive()
    }
}

/// A software device reachable as a [`Transport`].
#[derive(Debug, Clone)]
pub struct Emulator {
    state: Arc<Mutex<DeviceState>>,
}

/// Shared access to an [`Emulator`]'s state.
#[derive(Debug, Clone)]
pub struct EmulatorHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl Emulator {
    /// Creates a device answering to `device_id`, running the latest
    /// firmware, with only the internal wallet present.
    #[must_use]
    pub fn new(device_id: &str, pairing_secret: &str) -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut *seed);

        let internal_uid: [u8; WALLET_UID_LEN] = Sha256::new_with_prefix(seed.as_slice())
            .chain_update(b"internal")
            .finalize()
            .into();
        let wallets = Wallets {
            internal: WalletDescriptor::new(internal_uid, 1, "Internal Wallet".to_string()),
            external: WalletDescriptor::new([0; WALLET_UID_LEN], 0, String::new()),
        };

        let firmware = FirmwareVersion::BLS_SIGNING;
        let state = DeviceState {
            device_id: device_id.to_string(),
            pairing_secret: pairing_secret.to_string(),
            firmware: Some(firmware),
            limits: FirmwareLimits::for_version(firmware).ok(),
            seed,
            wallets,
            paired_clients: Vec::new(),
            client_key: None,
            ephemeral: SecretKey::random(&mut OsRng),
            pending_sign: None,
            faults: VecDeque::new(),
            corrupt_next: false,
            connects: 0,
            requests: HashMap::new(),
            last_message: None,
            last_decoder: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Sets the firmware version reported on connect. `None` omits the
    /// field; the device then behaves like the latest firmware.
    #[must_use]
    pub fn with_firmware(self, firmware: Option<FirmwareVersion>) -> Self {
        {
            let mut state = lock(&self.state);
            state.firmware = firmware;
            state.limits =
                FirmwareLimits::for_version(firmware.unwrap_or(FirmwareVersion::BLS_SIGNING)).ok();
        }
        self
    }

    /// Returns a handle sharing this device's state.
    #[must_use]
    pub fn handle(&self) -> EmulatorHandle {
        EmulatorHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Transport for Emulator {
    fn transmit(&mut self, device_id: &str, request: &[u8]) -> Result<Vec<u8>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Transport("emulator state poisoned".to_string()))?;
        if device_id != state.device_id {
            return Err(Error::Transport(format!("unknown device {device_id}")));
        }

        let Ok(envelope) = Envelope::parse(request) else {
            return EnvelopeResponse::error(0, DeviceError::InvalidMessage).to_bytes();
        };
        let outcome = match DeviceRequest::from_code(envelope.request_code()) {
            Some(DeviceRequest::Connect) => state.connect(envelope.payload()),
            Some(DeviceRequest::EncryptedRequest) => state.handle_encrypted(envelope.payload()),
            None => Err(DeviceError::InvalidMessage),
        };

        let response = match outcome {
            Ok(data) => EnvelopeResponse::new(envelope.request_id(), STATUS_SUCCESS, data),
            Err(err) => {
                debug!(%err, "emulated device rejected request");
                EnvelopeResponse::error(envelope.request_id(), err)
            }
        };
        response.to_bytes()
    }

    fn is_connected(&self) -> bool {
        true
    }
}

impl EmulatorHandle {
    /// Makes the next encrypted request fail with `err` after it has been
    /// decrypted and counted.
    pub fn fail_next(&self, err: DeviceError) {
        lock(&self.state).faults.push_back(err);
    }

    /// Damages the checksum of the next successful response. The device
    /// still rotates its ephemeral key, as it would when the damage happens
    /// in transit.
    pub fn corrupt_next_response(&self) {
        lock(&self.state).corrupt_next = true;
    }

    /// Replaces the ephemeral key without telling the client.
    pub fn rotate_ephemeral_key(&self) {
        lock(&self.state).ephemeral = SecretKey::random(&mut OsRng);
    }

    /// Inserts (`Some`) or removes (`None`) the external wallet.
    pub fn set_external_wallet(&self, wallet: Option<WalletDescriptor>) {
        lock(&self.state).wallets.external = wallet
            .unwrap_or_else(|| WalletDescriptor::new([0; WALLET_UID_LEN], 0, String::new()));
    }

    /// Number of connect requests received.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }

    /// Number of encrypted requests of the given kind that decrypted
    /// successfully.
    #[must_use]
    pub fn request_count(&self, code: EncryptedRequest) -> usize {
        lock(&self.state).requests.get(&code).copied().unwrap_or(0)
    }

    /// The last message signed in full, with any DST and decoder removed.
    #[must_use]
    pub fn last_signed_message(&self) -> Option<Vec<u8>> {
        lock(&self.state).last_message.clone()
    }

    /// The calldata decoder attached to the last signed message.
    #[must_use]
    pub fn last_decoder(&self) -> Option<Vec<u8>> {
        lock(&self.state).last_decoder.clone()
    }

    /// Returns the uncompressed secp256k1 public key for a path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the derived scalar is invalid.
    pub fn secp256k1_public_key(&self, path: &SignerPath) -> Result<Vec<u8>> {
        let key = lock(&self.state).secp_key(path.indices())?;
        Ok(key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec())
    }
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DeviceState {
    fn connect(&mut self, payload: &[u8]) -> DeviceResult<Vec<u8>> {
        let client = PublicKey::from_sec1_bytes(payload).map_err(|_| DeviceError::InvalidMessage)?;
        let client_bytes = sec1_uncompressed(&client)?;

        self.connects += 1;
        self.client_key = Some(client);
        self.ephemeral = SecretKey::random(&mut OsRng);
        self.pending_sign = None;

        let paired = self.paired_clients.contains(&client_bytes);
        let mut w = Writer::new();
        w.put_u8(if paired {
            PAIRING_STATUS_PAIRED
        } else {
            PAIRING_STATUS_UNPAIRED
        });
        w.put_slice(self.ephemeral.public_key().to_encoded_point(false).as_bytes());
        if let Some(firmware) = self.firmware {
            w.put_slice(&firmware.to_wire());
        }
        Ok(w.into_vec())
    }

    fn handle_encrypted(&mut self, payload: &[u8]) -> DeviceResult<Vec<u8>> {
        let client = self.client_key.clone().ok_or(DeviceError::InvalidMessage)?;
        let shared = self.shared_secret(&client);

        let mut r = Reader::new(payload);
        let id = r.read_u32_le().map_err(|_| DeviceError::InvalidMessage)?;
        if id != ephemeral_id(&shared) {
            return Err(DeviceError::InvalidEphemeralId);
        }
        let mut buf = Zeroizing::new(r.rest().to_vec());
        if buf.len() != ENCRYPTED_MESSAGE_LEN {
            return Err(DeviceError::InvalidMessage);
        }
        let plain = aes_decrypt(&shared, &mut buf).map_err(|_| DeviceError::InvalidMessage)?;

        let code = EncryptedRequest::from_code(plain[0]).ok_or(DeviceError::InvalidMessage)?;
        let body_len = self.body_len(code, &plain[1..])?;
        let covered = plain.get(..1 + body_len).ok_or(DeviceError::InvalidMessage)?;
        let crc = plain
            .get(1 + body_len..1 + body_len + 4)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .map(u32::from_le_bytes)
            .ok_or(DeviceError::InvalidMessage)?;
        if crc != checksum(covered) {
            return Err(DeviceError::InvalidMessage);
        }

        *self.requests.entry(code).or_default() += 1;
        if let Some(err) = self.faults.pop_front() {
            return Err(err);
        }

        let body = &covered[1..];
        let client_bytes = sec1_uncompressed(&client)?;
        if code != EncryptedRequest::FinalizePairing && !self.paired_clients.contains(&client_bytes)
        {
            return Err(DeviceError::PermissionDisabled);
        }
        let mut data = match code {
            EncryptedRequest::FinalizePairing => self.finalize_pairing(&client_bytes, body)?,
            EncryptedRequest::GetWallets => self.wallets.to_bytes(),
            EncryptedRequest::Sign => self.sign(body)?,
        };
        data.resize(code.response_len(), 0);
        self.seal(&shared, &data)
    }

    /// Length of the request body following the request code.
    fn body_len(&self, code: EncryptedRequest, body: &[u8]) -> DeviceResult<usize> {
        match code {
            EncryptedRequest::GetWallets => Ok(0),
            EncryptedRequest::FinalizePairing => Ok(NAME_FIELD_LEN + DER_SLOT_LEN),
            EncryptedRequest::Sign => {
                let limits = self.limits.as_ref().ok_or(DeviceError::Disabled)?;
                let prefix = 2 + WALLET_UID_LEN;
                match body.get(1).copied() {
                    Some(SIGN_SCHEMA_GENERAL) => Ok(prefix + limits.base_request_size),
                    Some(SIGN_SCHEMA_EXTRA_DATA) => {
                        let at = prefix + CONTINUATION_CODE_LEN;
                        let frame_len = body
                            .get(at..at + 4)
                            .and_then(|b| <[u8; 4]>::try_from(b).ok())
                            .map(u32::from_le_bytes)
                            .ok_or(DeviceError::InvalidMessage)?;
                        Ok(at + 4 + frame_len as usize)
                    }
                    _ => Err(DeviceError::InvalidMessage),
                }
            }
        }
    }

    /// Encrypts response data under the current key and rotates to a fresh
    /// ephemeral key.
    fn seal(&mut self, shared: &[u8; 32], data: &[u8]) -> DeviceResult<Vec<u8>> {
        let next = SecretKey::random(&mut OsRng);
        let mut w = Writer::new();
        w.put_slice(next.public_key().to_encoded_point(false).as_bytes());
        w.put_slice(data);
        let mut crc = checksum(w.as_slice());
        if self.corrupt_next {
            self.corrupt_next = false;
            crc ^= 0xffff_ffff;
        }
        self.ephemeral = next;
        w.put_u32_be(crc);
        w.pad_to(w.len().div_ceil(16) * 16);

        let mut buf = w.into_vec();
        aes_encrypt(shared, &mut buf)
            .map(<[u8]>::to_vec)
            .map_err(|_| DeviceError::Internal)
    }

    fn shared_secret(&self, client: &PublicKey) -> Zeroizing<[u8; 32]> {
        let shared = diffie_hellman(self.ephemeral.to_nonzero_scalar(), client.as_affine());
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(shared.raw_secret_bytes().as_slice());
        out
    }

    fn finalize_pairing(
        &mut self,
        client: &[u8; PUBLIC_KEY_LEN],
        body: &[u8],
    ) -> DeviceResult<Vec<u8>> {
        let (name, slot) = body.split_at(NAME_FIELD_LEN);
        let name: [u8; NAME_FIELD_LEN] = name.try_into().map_err(|_| DeviceError::InvalidMessage)?;
        let der_len = usize::from(slot[1]) + 2;
        let der = slot.get(..der_len).ok_or(DeviceError::PairingFailed)?;
        let signature =
            p256::ecdsa::Signature::from_der(der).map_err(|_| DeviceError::PairingFailed)?;

        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(client)
            .map_err(|_| DeviceError::InvalidMessage)?;
        let digest = pairing_digest(client, &name, &self.pairing_secret);
        key.verify_prehash(&digest, &signature)
            .map_err(|_| DeviceError::PairingFailed)?;

        if !self.paired_clients.contains(client) {
            self.paired_clients.push(*client);
        }
        Ok(Vec::new())
    }

    fn sign(&mut self, body: &[u8]) -> DeviceResult<Vec<u8>> {
        let limits = self.limits.clone().ok_or(DeviceError::Disabled)?;
        let mut r = Reader::new(body);
        let flag = r.read_u8().map_err(|_| DeviceError::InvalidMessage)? != 0;
        let schema = r.read_u8().map_err(|_| DeviceError::InvalidMessage)?;
        let uid: [u8; WALLET_UID_LEN] = r.read_array().map_err(|_| DeviceError::InvalidMessage)?;
        let active = self.wallets.active().map_err(|_| DeviceError::WrongWallet)?;
        if &uid != active.uid() {
            return Err(DeviceError::WrongWallet);
        }

        if schema == SIGN_SCHEMA_GENERAL {
            let (header, data) = parse_base_frame(r.rest(), &limits)?;
            let in_base = header.payload_len.min(limits.base_data_size);
            let data = data.get(..in_base).ok_or(DeviceError::InvalidMessage)?;

            if flag {
                return Ok(self.defer(header, data.to_vec()).to_vec());
            }
            if header.payload_len > limits.base_data_size {
                let digest = data
                    .get(..32)
                    .and_then(|d| <[u8; 32]>::try_from(d).ok())
                    .ok_or(DeviceError::InvalidMessage)?;
                return self.finish(&header, Message::Digest(digest), &limits);
            }
            return self.finish(&header, Message::Full(data), &limits);
        }

        let code: [u8; CONTINUATION_CODE_LEN] =
            r.read_array().map_err(|_| DeviceError::InvalidMessage)?;
        let frame_len = r.read_u32_le().map_err(|_| DeviceError::InvalidMessage)? as usize;
        let chunk = r
            .read_bytes(frame_len)
            .map_err(|_| DeviceError::InvalidMessage)?;

        let mut pending = self.pending_sign.take().ok_or(DeviceError::InvalidMessage)?;
        if pending.code != code {
            return Err(DeviceError::InvalidMessage);
        }
        pending.data.extend_from_slice(chunk);
        if flag {
            return Ok(self.defer(pending.header, pending.data).to_vec());
        }
        if pending.data.len() != pending.header.payload_len {
            return Err(DeviceError::InvalidMessage);
        }
        self.finish(&pending.header, Message::Full(&pending.data), &limits)
    }

    /// Stores a partial request and returns the code for the next frame.
    fn defer(&mut self, header: SignHeader, data: Vec<u8>) -> [u8; CONTINUATION_CODE_LEN] {
        let mut code = [0u8; CONTINUATION_CODE_LEN];
        OsRng.fill_bytes(&mut code);
        self.pending_sign = Some(PendingSign { header, data, code });
        code
    }

    fn finish(
        &mut self,
        header: &SignHeader,
        message: Message<'_>,
        limits: &FirmwareLimits,
    ) -> DeviceResult<Vec<u8>> {
        let digest = match message {
            Message::Digest(digest) => {
                self.last_message = None;
                self.last_decoder = None;
                Some(digest)
            }
            Message::Full(mut msg) => {
                if header.curve == Curve::Bls12381G2 {
                    msg = msg.get(4..).ok_or(DeviceError::InvalidMessage)?;
                }
                let (msg, decoder) = match limits.decoder {
                    Some(d) => split_decoder(msg, d.reserved),
                    None => (msg, None),
                };
                self.last_message = Some(msg.to_vec());
                self.last_decoder = decoder.map(<[u8]>::to_vec);
                match header.hash.digest(msg) {
                    Some(d) => Some(d),
                    None if header.curve == Curve::Secp256k1 => Some(
                        msg.try_into()
                            .map_err(|_| DeviceError::InvalidMessage)?,
                    ),
                    None => None,
                }
            }
        };
        let message = self.last_message.clone().unwrap_or_default();

        let mut w = Writer::with_capacity(EncryptedRequest::Sign.response_len());
        match header.curve {
            Curve::Secp256k1 => {
                let digest = digest.ok_or(DeviceError::InvalidMessage)?;
                let key = self.secp_key(&header.path)?;
                let signature: k256::ecdsa::Signature =
                    key.sign_prehash(&digest).map_err(|_| DeviceError::Internal)?;
                if header.omit_pubkey {
                    w.put_zeros(65);
                } else {
                    w.put_slice(key.verifying_key().to_encoded_point(false).as_bytes());
                }
                w.put_padded(signature.to_der().as_bytes(), DER_SLOT_LEN)
                    .map_err(|_| DeviceError::Internal)?;
            }
            Curve::Ed25519 => {
                let public_key = if header.omit_pubkey {
                    vec![0; 32]
                } else {
                    self.filler(b"ed25519", &header.path, &[], 32)
                };
                w.put_slice(&public_key);
                w.put_slice(&self.filler(b"ed25519-sig", &header.path, &message, 64));
            }
            Curve::Bls12381G2 => {
                let public_key = if header.omit_pubkey {
                    vec![0; 48]
                } else {
                    self.filler(b"bls", &header.path, &[], 48)
                };
                w.put_slice(&public_key);
                w.put_slice(&self.filler(b"bls-sig", &header.path, &message, 96));
            }
        }
        debug!(curve = %header.curve, "emulated device signed request");
        Ok(w.into_vec())
    }

    fn secp_key(&self, path: &[u32]) -> DeviceResult<SigningKey> {
        let mut hasher = Sha256::new_with_prefix(self.seed.as_slice());
        for index in path {
            hasher.update(index.to_le_bytes());
        }
        SigningKey::from_bytes(&hasher.finalize()).map_err(|_| DeviceError::Internal)
    }

    /// Deterministic bytes standing in for keys and signatures the emulator
    /// cannot compute.
    fn filler(&self, label: &[u8], path: &[u32], message: &[u8], len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut counter = 0u32;
        while out.len() < len {
            let mut hasher = Sha256::new_with_prefix(self.seed.as_slice());
            hasher.update(label);
            for index in path {
                hasher.update(index.to_le_bytes());
            }
            hasher.update(message);
            hasher.update(counter.to_le_bytes());
            out.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        out.truncate(len);
        out
    }
}

fn parse_base_frame<'a>(
    frame: &'a [u8],
    limits: &FirmwareLimits,
) -> DeviceResult<(SignHeader, &'a [u8])> {
    let bad = |_| DeviceError::InvalidMessage;
    let mut r = Reader::new(frame);
    let _encoding = r.read_u32_le().map_err(bad)?;
    let hash = HashType::from_code(r.read_u8().map_err(bad)?).ok_or(DeviceError::InvalidMessage)?;
    let curve = Curve::from_code(r.read_u8().map_err(bad)?).ok_or(DeviceError::InvalidMessage)?;
    if !limits.supports_curve(curve) {
        return Err(DeviceError::InvalidMessage);
    }
    let path_len = r.read_u32_le().map_err(bad)? as usize;
    if path_len > MAX_PATH_LEN {
        return Err(DeviceError::InvalidMessage);
    }
    let mut path = Vec::with_capacity(path_len);
    for i in 0..MAX_PATH_LEN {
        let index = r.read_u32_le().map_err(bad)?;
        if i < path_len {
            path.push(index);
        }
    }
    let omit_pubkey = r.read_u8().map_err(bad)? != 0;
    let payload_len = usize::from(r.read_u16_le().map_err(bad)?);

    let header = SignHeader {
        hash,
        curve,
        path,
        omit_pubkey,
        payload_len,
    };
    Ok((header, r.rest()))
}

/// Splits a trailing `[reserved:u32LE][len:u32LE][decoder]` block off a
/// message.
fn split_decoder(msg: &[u8], reserved: u32) -> (&[u8], Option<&[u8]>) {
    let marker = reserved.to_le_bytes();
    let found = (0..msg.len().saturating_sub(7)).find(|&start| {
        msg[start..start + 4] == marker
            && msg
                .get(start + 4..start + 8)
                .and_then(|b| <[u8; 4]>::try_from(b).ok())
                .is_some_and(|b| start + 8 + u32::from_le_bytes(b) as usize == msg.len())
    });
    match found {
        Some(start) => (&msg[..start], Some(&msg[start + 8..])),
        None => (msg, None),
    }
}

fn sec1_uncompressed(key: &PublicKey) -> DeviceResult<[u8; PUBLIC_KEY_LEN]> {
    key.to_encoded_point(false)
        .as_bytes()
        .try_into()
        .map_err(|_| DeviceError::InvalidMessage)
}
