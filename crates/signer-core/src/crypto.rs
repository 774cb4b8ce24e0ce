//! ECDSA signature parsing for device responses.
//!
//! The device returns secp256k1 signatures DER-encoded inside a fixed
//! 74-byte slot:
//!
//! ```text
//! 30 len 02 r_len r_bytes 02 s_len s_bytes [zero padding]
//! ```
//!
//! This module extracts `(r, s)` as 32-byte big-endian integers and
//! normalizes `s` to the lower half of the curve order.
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::crypto::parse_der_signature;
//!
//! // r=1, s=2
//! let der = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
//! let (r, s) = parse_der_signature(&der).unwrap();
//! assert_eq!(r[31], 1);
//! assert_eq!(s[31], 2);
//! ```

use k256::ecdsa::Signature as K256Signature;

use crate::error::{Error, Result};

/// Width of the DER signature slot in device responses.
pub const DER_SLOT_LEN: usize = 74;

/// Parses a DER-encoded ECDSA signature into raw `(r, s)` components.
///
/// # Arguments
///
/// * `der` - The DER-encoded signature bytes
///
/// # Returns
///
/// A [`Result`] containing `(r, s)` as 32-byte arrays.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the DER encoding is malformed.
pub fn parse_der_signature(der: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    if der.len() < 8 {
        return Err(Error::InvalidSignature("DER too short".to_string()));
    }
    if der[0] != 0x30 {
        return Err(Error::InvalidSignature(
            "invalid DER sequence tag".to_string(),
        ));
    }

    let (r_bytes, rest) = read_integer(&der[2..], "r")?;
    let (s_bytes, _) = read_integer(rest, "s")?;

    Ok((to_fixed_bytes(r_bytes)?, to_fixed_bytes(s_bytes)?))
}

/// Reads one `02 len bytes` INTEGER, returning its bytes and the remainder.
fn read_integer<'a>(buf: &'a [u8], name: &str) -> Result<(&'a [u8], &'a [u8])> {
    match buf {
        [0x02, len, rest @ ..] if usize::from(*len) <= rest.len() => {
            Ok(rest.split_at(usize::from(*len)))
        }
        [0x02, ..] => Err(Error::InvalidSignature(format!("{name} length overflow"))),
        _ => Err(Error::InvalidSignature(format!("invalid {name} tag"))),
    }
}

/// Extracts the DER signature from a fixed-width, zero-padded slot.
///
/// The sequence length byte at offset 1 bounds the signature.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the declared length overruns the
/// slot or the DER is malformed.
pub fn parse_der_slot(slot: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let len = slot
        .get(1)
        .map(|&l| usize::from(l) + 2)
        .ok_or_else(|| Error::InvalidSignature("empty signature slot".to_string()))?;
    let der = slot
        .get(..len)
        .ok_or_else(|| Error::InvalidSignature("DER length exceeds slot".to_string()))?;
    parse_der_signature(der)
}

/// Converts variable-length integer bytes to a fixed 32-byte array.
///
/// Leading zeros are stripped and the result is left-padded.
pub fn to_fixed_bytes(bytes: &[u8]) -> Result<[u8; 32]> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let bytes = &bytes[start..];

    if bytes.len() > 32 {
        return Err(Error::InvalidSignature("integer too large".to_string()));
    }

    let mut result = [0u8; 32];
    result[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(result)
}

/// Normalizes a secp256k1 signature to low-S form.
///
/// Per BIP-62 and EIP-2, S must be in the lower half of the curve order.
///
/// # Returns
///
/// `(r, s, flipped)` where `flipped` indicates S was negated.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if `r` or `s` is zero or not below
/// the curve order.
pub fn normalize_s(r: [u8; 32], s: [u8; 32]) -> Result<([u8; 32], [u8; 32], bool)> {
    let sig = K256Signature::from_scalars(r, s)
        .map_err(|_| Error::InvalidSignature("scalars out of range".to_string()))?;

    match sig.normalize_s() {
        Some(low) => {
            let (_, s_low) = low.split_bytes();
            Ok((r, s_low.into(), true))
        }
        None => Ok((r, s, false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// secp256k1 order / 2.
    const HALF_N: [u8; 32] = [
        0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFF, 0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B,
        0x20, 0xA0,
    ];

    #[test]
    fn parse_der_signature_simple() {
        let der = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        let (r, s) = parse_der_signature(&der).unwrap();

        assert_eq!(r[31], 1);
        assert_eq!(s[31], 2);
        assert_eq!(r[0..31], [0u8; 31]);
    }

    #[test]
    fn parse_der_signature_with_leading_zero() {
        let der = vec![0x30, 0x08, 0x02, 0x02, 0x00, 0x80, 0x02, 0x02, 0x00, 0x90];
        let (r, s) = parse_der_signature(&der).unwrap();

        assert_eq!(r[31], 0x80);
        assert_eq!(s[31], 0x90);
    }

    #[test]
    fn parse_der_signature_invalid_tag() {
        let der = vec![0x31, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        assert!(parse_der_signature(&der).is_err());

        let der = vec![0x30, 0x06, 0x03, 0x01, 0x01, 0x02, 0x01, 0x02];
        assert!(parse_der_signature(&der).is_err());
    }

    #[test]
    fn parse_der_signature_length_overflow() {
        let der = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x09, 0x02];
        let err = parse_der_signature(&der).unwrap_err();
        assert!(err.to_string().contains("s length overflow"));
    }

    #[test]
    fn parse_der_signature_too_short() {
        assert!(parse_der_signature(&[0x30, 0x04]).is_err());
    }

    #[test]
    fn parse_der_slot_ignores_padding() {
        let mut slot = vec![0x30, 0x06, 0x02, 0x01, 0x05, 0x02, 0x01, 0x07];
        slot.resize(DER_SLOT_LEN, 0);
        let (r, s) = parse_der_slot(&slot).unwrap();
        assert_eq!((r[31], s[31]), (5, 7));

        // Declared length past the end of the slot.
        let slot = [0x30, 0x50, 0x02, 0x01];
        assert!(parse_der_slot(&slot).is_err());
    }

    #[test]
    fn to_fixed_bytes_works() {
        let result = to_fixed_bytes(&[0x01, 0x02]).unwrap();
        assert_eq!(result[30], 0x01);
        assert_eq!(result[31], 0x02);

        let result = to_fixed_bytes(&[0x00, 0x80]).unwrap();
        assert_eq!(result[31], 0x80);

        // 33 bytes with a sign-padding zero still fits.
        let mut padded = vec![0x00];
        padded.extend_from_slice(&[0xff; 32]);
        assert_eq!(to_fixed_bytes(&padded).unwrap(), [0xff; 32]);

        assert!(to_fixed_bytes(&[0x01; 33]).is_err());
    }

    #[test]
    fn normalize_s_low() {
        let r = [1u8; 32];
        let mut s = [0u8; 32];
        s[31] = 1;

        let (r_out, s_out, flipped) = normalize_s(r, s).unwrap();
        assert_eq!(r_out, r);
        assert_eq!(s_out, s);
        assert!(!flipped);
    }

    #[test]
    fn normalize_s_high() {
        let r = [1u8; 32];
        // HALF_N + 1 is the smallest high S.
        let mut s = HALF_N;
        s[31] += 1;

        let (_, s_out, flipped) = normalize_s(r, s).unwrap();
        assert!(flipped);
        assert!(s_out <= HALF_N);
        // n - (n/2 + 1) == n/2 for odd n.
        assert_eq!(s_out, HALF_N);
    }

    #[test]
    fn normalize_s_rejects_zero() {
        assert!(normalize_s([0u8; 32], [1u8; 32]).is_err());
    }
}
