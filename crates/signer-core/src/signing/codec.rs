//! Generic signing request encoding and response decoding.
//!
//! # Base Frame
//!
//! ```text
//! | encoding | hash | curve | pathLen | path[5] | omitPubkey | payloadLen | payload... |
//! |----------|------|-------|---------|---------|------------|------------|------------|
//! | 4B (LE)  | 1B   | 1B    | 4B (LE) | 20B (LE)| 1B         | 2B (LE)    | Var        |
//! ```
//!
//! The frame is zero-padded to the firmware base request size. Payloads
//! larger than the base data area either spill into extra frames
//! (`[len:u32LE][chunk]`) or, if even the extra frames cannot hold them,
//! are hashed by the client and only the digest is sent.
//!
//! # Response
//!
//! | Curve | Layout |
//! |-------|--------|
//! | SECP256K1 | `pubkey[65] derSig[74]` |
//! | ED25519 | `pubkey[32] r[32] s[32]` |
//! | BLS12_381_G2 | `pubkey[48] sig[96]` |
//!
//! The pubkey slot is present even when the key was omitted.

use tracing::debug;

use super::recovery::{infer_replay_protection, recovery_id};
use super::{Curve, Encoding, HashType, SigningRequest, SigningResponse};
use crate::crypto::{DER_SLOT_LEN, normalize_s, parse_der_slot};
use crate::cursor::{Reader, Writer};
use crate::error::{Error, Result};
use crate::firmware::FirmwareLimits;
use crate::signature::{Ed25519Signature, Signature};

/// Width of the secp256k1 public key slot.
const SECP_PUBKEY_SLOT: usize = 65;

/// Width of the Ed25519 public key slot.
const ED25519_PUBKEY_SLOT: usize = 32;

/// Width of the BLS12-381 G1 public key slot.
const BLS_PUBKEY_SLOT: usize = 48;

/// Width of a BLS12-381 G2 signature.
const BLS_SIGNATURE_LEN: usize = 96;

/// A signing request split into device-sized frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    /// The base frame, exactly `base_request_size` bytes.
    pub base_frame: Vec<u8>,

    /// Overflow frames, each `[len:u32LE][chunk]`.
    pub extra_frames: Vec<Vec<u8>>,

    /// Whether the base frame carries a client-side digest of the payload.
    pub prehashed: bool,
}

/// Encodes a signing request for the given firmware.
///
/// All validation happens here, before anything reaches the device.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if:
///
/// - The curve, hash or encoding is unsupported by the firmware
/// - An ED25519 request uses a hash or a non-hardened path index
/// - The payload is too large to frame and cannot be prehashed
pub fn encode(request: &SigningRequest, limits: &FirmwareLimits) -> Result<EncodedRequest> {
    validate(request, limits)?;

    let mut payload = Vec::with_capacity(request.payload.len() + 4);
    if request.curve == Curve::Bls12381G2 {
        payload.extend_from_slice(&request.bls_dst.code().to_le_bytes());
    }
    payload.extend_from_slice(&request.payload);
    append_decoder(&mut payload, request, limits);

    // A prehashed payload may exceed the length field; the device only needs
    // to see a length beyond the base frame, so it saturates.
    let fits_frames = payload.len() <= limits.base_data_size
        || (limits.extra_frame_size > 0 && payload.len() <= limits.max_expanded_size());
    let payload_len = match u16::try_from(payload.len()) {
        Ok(len) => len,
        Err(_) if !fits_frames => u16::MAX,
        Err(_) => {
            return Err(Error::Encoding(format!(
                "payload of {} bytes exceeds the length field",
                payload.len()
            )));
        }
    };

    let mut w = Writer::with_capacity(limits.base_request_size);
    w.put_u32_le(request.encoding.code());
    w.put_u8(request.hash.code());
    w.put_u8(request.curve.code());
    request.signer_path.write_to(&mut w);
    w.put_u8(u8::from(request.omit_pubkey));
    w.put_u16_le(payload_len);

    let mut extra_frames = Vec::new();
    let mut prehashed = false;
    if payload.len() <= limits.base_data_size {
        w.put_slice(&payload);
    } else if fits_frames {
        let (base, overflow) = payload.split_at(limits.base_data_size);
        w.put_slice(base);
        extra_frames = overflow
            .chunks(limits.extra_frame_size)
            .map(|chunk| {
                let mut frame = Writer::with_capacity(4 + chunk.len());
                // Chunks are bounded by the frame size, far below u32::MAX.
                frame.put_u32_le(chunk.len() as u32);
                frame.put_slice(chunk);
                frame.into_vec()
            })
            .collect();
    } else if limits.prehash_allowed {
        let digest = request.hash.digest(&request.payload).ok_or_else(|| {
            Error::Encoding(format!(
                "payload of {} bytes is too large to prehash with hash type NONE",
                payload.len()
            ))
        })?;
        w.put_slice(&digest);
        prehashed = true;
    } else {
        return Err(Error::Encoding(format!(
            "payload of {} bytes exceeds {} bytes and prehashing is not allowed",
            payload.len(),
            limits.max_expanded_size()
        )));
    }

    if w.len() > limits.base_request_size {
        return Err(Error::Encoding(format!(
            "base frame of {} bytes exceeds the firmware limit of {}",
            w.len(),
            limits.base_request_size
        )));
    }
    w.pad_to(limits.base_request_size);

    debug!(
        curve = %request.curve,
        hash = %request.hash,
        encoding = %request.encoding,
        payload_len = payload.len(),
        extra_frames = extra_frames.len(),
        prehashed,
        "encoded signing request"
    );

    Ok(EncodedRequest {
        base_frame: w.into_vec(),
        extra_frames,
        prehashed,
    })
}

fn validate(request: &SigningRequest, limits: &FirmwareLimits) -> Result<()> {
    if !limits.supports_curve(request.curve) {
        return Err(Error::Encoding(format!(
            "curve {} unsupported by firmware",
            request.curve
        )));
    }
    if !limits.supports_hash(request.hash) {
        return Err(Error::Encoding(format!(
            "hash type {} unsupported by firmware",
            request.hash
        )));
    }
    if !limits.supports_encoding(request.encoding) {
        return Err(Error::Encoding(format!(
            "encoding {} unsupported by firmware",
            request.encoding
        )));
    }
    if request.curve == Curve::Ed25519 {
        if request.hash != HashType::None {
            return Err(Error::Encoding(
                "ED25519 signing requires hash type NONE".to_string(),
            ));
        }
        if !request.signer_path.is_fully_hardened() {
            return Err(Error::Encoding(
                "ED25519 signer path must be fully hardened".to_string(),
            ));
        }
    }
    Ok(())
}

/// Appends `[reserved:u32LE][len:u32LE][decoder]` when the firmware supports
/// it and the block cannot push the payload into prehashing.
fn append_decoder(payload: &mut Vec<u8>, request: &SigningRequest, limits: &FirmwareLimits) {
    let (Some(decoder), Some(decoder_limits)) = (&request.decoder, limits.decoder) else {
        return;
    };
    let block_len = 8 + decoder.len();
    if decoder.len() > decoder_limits.max_size
        || payload.len() + block_len > limits.max_expanded_size()
    {
        debug!(
            decoder_len = decoder.len(),
            "dropping calldata decoder that does not fit"
        );
        return;
    }
    payload.extend_from_slice(&decoder_limits.reserved.to_le_bytes());
    // Bounded by max_size above.
    payload.extend_from_slice(&(decoder.len() as u32).to_le_bytes());
    payload.extend_from_slice(decoder);
}

/// Decodes the device's signing response.
///
/// Secp256k1 `r` and `s` are returned as the device produced them, only
/// widened to 32 bytes. For [`Encoding::Evm`] `s` is first normalized to
/// low-S, then the recovery parameter is computed and attached as `v`,
/// using the request's replay protection or, if absent, the one inferred
/// from the payload.
///
/// # Errors
///
/// - [`Error::Protocol`] if the response is shorter than its layout
/// - [`Error::InvalidPublicKey`] on an unknown SEC1 marker
/// - [`Error::InvalidSignature`] on malformed DER
/// - [`Error::Recovery`] if `v` cannot be determined
pub fn decode(response: &[u8], request: &SigningRequest) -> Result<SigningResponse> {
    let mut r = Reader::new(response);
    match request.curve {
        Curve::Secp256k1 => decode_secp256k1(&mut r, request),
        Curve::Ed25519 => {
            let slot: [u8; ED25519_PUBKEY_SLOT] = r.read_array()?;
            let sig_r = r.read_array()?;
            let sig_s = r.read_array()?;
            Ok(SigningResponse::Ed25519 {
                public_key: (!request.omit_pubkey).then_some(slot),
                signature: Ed25519Signature::new(sig_r, sig_s),
            })
        }
        Curve::Bls12381G2 => {
            let slot: [u8; BLS_PUBKEY_SLOT] = r.read_array()?;
            let signature: [u8; BLS_SIGNATURE_LEN] = r.read_array()?;
            Ok(SigningResponse::Bls12381G2 {
                public_key: (!request.omit_pubkey).then_some(slot),
                signature,
            })
        }
    }
}

fn decode_secp256k1(r: &mut Reader<'_>, request: &SigningRequest) -> Result<SigningResponse> {
    let slot = r.read_bytes(SECP_PUBKEY_SLOT)?;
    let public_key = if request.omit_pubkey {
        None
    } else {
        let key = match slot[0] {
            0x02 | 0x03 => &slot[..33],
            0x04 => slot,
            marker => {
                return Err(Error::InvalidPublicKey(format!(
                    "unknown SEC1 marker {marker:#04x}"
                )));
            }
        };
        Some(key.to_vec())
    };

    let (sig_r, sig_s) = parse_der_slot(r.read_bytes(DER_SLOT_LEN)?)?;
    let mut signature = Signature::new(sig_r, sig_s);

    if request.encoding == Encoding::Evm {
        // Ethereum rejects high-S signatures.
        let (sig_r, sig_s, _) = normalize_s(sig_r, sig_s)?;
        signature = Signature::new(sig_r, sig_s);
        let key = public_key.as_deref().ok_or_else(|| {
            Error::Recovery("public key was omitted; cannot compute v".to_string())
        })?;
        let digest = match request.hash.digest(&request.payload) {
            Some(d) => d,
            None => request.payload.as_slice().try_into().map_err(|_| {
                Error::Recovery("unhashed EVM payload must be a 32-byte digest".to_string())
            })?,
        };
        let replay = match request.replay_protection {
            Some(replay) => replay,
            None => infer_replay_protection(&request.payload)?,
        };
        let id = recovery_id(&digest, &sig_r, &sig_s, key)?;
        signature = signature.with_v(replay.v(id)?);
    }

    Ok(SigningResponse::Secp256k1 {
        public_key,
        signature,
    })
}
