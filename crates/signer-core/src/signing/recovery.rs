//! ECDSA recovery parameter reconstruction.
//!
//! The device returns `{r, s}` and the signing public key but no recovery
//! id. EVM consumers need `v`, so the id is found by trying both candidates
//! and keeping the one whose recovered key matches the device's key. The id
//! is then mapped to `v` according to the transaction's replay protection:
//!
//! | Scheme | `v` |
//! |--------|-----|
//! | Typed (EIP-2718) | `id` |
//! | Legacy (pre EIP-155) | `id + 27` |
//! | EIP-155 | `chainId * 2 + 35 + id` |
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::signing::ReplayProtection;
//!
//! assert_eq!(ReplayProtection::Legacy.v(1).unwrap(), 28);
//! assert_eq!(ReplayProtection::Eip155 { chain_id: 1 }.v(0).unwrap(), 37);
//! assert_eq!(ReplayProtection::Typed.v(1).unwrap(), 1);
//! ```

use alloy_rlp::{Decodable, Header};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Replay protection scheme of an EVM transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplayProtection {
    /// Typed transaction envelope; `v` is the raw recovery id.
    Typed,
    /// Legacy transaction without a chain id.
    Legacy,
    /// Legacy transaction bound to a chain id.
    Eip155 {
        /// The chain id.
        chain_id: u64,
    },
}

impl ReplayProtection {
    /// Maps a recovery id to `v`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recovery`] if the id is not 0 or 1, or `v`
    /// overflows for very large chain ids.
    pub fn v(self, recovery_id: u8) -> Result<u64> {
        if recovery_id > 1 {
            return Err(Error::Recovery(format!(
                "recovery id {recovery_id} out of range"
            )));
        }
        let id = u64::from(recovery_id);
        match self {
            Self::Typed => Ok(id),
            Self::Legacy => Ok(id + 27),
            Self::Eip155 { chain_id } => chain_id
                .checked_mul(2)
                .and_then(|v| v.checked_add(35 + id))
                .ok_or_else(|| Error::Recovery(format!("chain id {chain_id} overflows v"))),
        }
    }
}

/// Finds the recovery id for a secp256k1 signature.
///
/// Tries id 0 then 1; the first whose recovered key equals `expected`
/// wins.
///
/// # Arguments
///
/// * `digest` - The 32-byte message digest that was signed
/// * `r`, `s` - The signature scalars
/// * `expected` - The signer's SEC1 public key (compressed or uncompressed)
///
/// # Errors
///
/// - [`Error::InvalidPublicKey`] if `expected` is not a secp256k1 point
/// - [`Error::InvalidSignature`] if `r` or `s` is out of range
/// - [`Error::Recovery`] if neither id recovers `expected`
pub fn recovery_id(digest: &[u8; 32], r: &[u8; 32], s: &[u8; 32], expected: &[u8]) -> Result<u8> {
    let expected = VerifyingKey::from_sec1_bytes(expected)
        .map_err(|_| Error::InvalidPublicKey("not a secp256k1 point".to_string()))?;
    let signature = K256Signature::from_scalars(*r, *s)
        .map_err(|_| Error::InvalidSignature("scalars out of range".to_string()))?;

    for id in [0u8, 1u8] {
        let Some(recovery_id) = RecoveryId::from_byte(id) else {
            continue;
        };
        if let Ok(recovered) = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            && recovered == expected
        {
            return Ok(id);
        }
    }

    Err(Error::Recovery(
        "no recovery id reproduces the signing key".to_string(),
    ))
}

/// Infers the replay protection scheme from an EVM transaction payload.
///
/// - First byte `<= 0x7f`: an EIP-2718 type byte, so [`ReplayProtection::Typed`]
/// - RLP list of 9 items: EIP-155 signing form, chain id in item 6
///   (a zero chain id means [`ReplayProtection::Legacy`])
/// - RLP list of 6 items: [`ReplayProtection::Legacy`]
///
/// # Errors
///
/// Returns [`Error::Recovery`] for anything else. There is no default
/// chain.
pub fn infer_replay_protection(payload: &[u8]) -> Result<ReplayProtection> {
    let Some(&first) = payload.first() else {
        return Err(Error::Recovery("empty transaction payload".to_string()));
    };
    if first <= 0x7f {
        return Ok(ReplayProtection::Typed);
    }

    let items = list_items(payload)?;
    let replay = match items.len() {
        9 => {
            let mut chain_item = items[6];
            match u64::decode(&mut chain_item)? {
                0 => ReplayProtection::Legacy,
                chain_id => ReplayProtection::Eip155 { chain_id },
            }
        }
        6 => ReplayProtection::Legacy,
        n => {
            return Err(Error::Recovery(format!(
                "cannot infer replay protection from a {n}-item transaction"
            )));
        }
    };
    debug!(?replay, "inferred replay protection");
    Ok(replay)
}

/// Splits an RLP list into its raw (header included) items.
fn list_items(payload: &[u8]) -> Result<Vec<&[u8]>> {
    let mut buf = payload;
    let header = Header::decode(&mut buf)?;
    if !header.list {
        return Err(Error::Recovery(
            "transaction payload is not an RLP list".to_string(),
        ));
    }
    let mut body = buf
        .get(..header.payload_length)
        .ok_or(alloy_rlp::Error::InputTooShort)?;

    let mut items = Vec::new();
    while !body.is_empty() {
        let start = body;
        let item = Header::decode(&mut body)?;
        body = body
            .get(item.payload_length..)
            .ok_or(alloy_rlp::Error::InputTooShort)?;
        items.push(&start[..start.len() - body.len()]);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::keccak256;
    use alloy_rlp::Encodable;
    use k256::ecdsa::SigningKey;

    use super::*;

    fn rlp_list(items: &[u64]) -> Vec<u8> {
        let mut body = Vec::new();
        for item in items {
            item.encode(&mut body);
        }
        let mut out = Vec::new();
        Header {
            list: true,
            payload_length: body.len(),
        }
        .encode(&mut out);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn v_mapping() {
        assert_eq!(ReplayProtection::Typed.v(0).unwrap(), 0);
        assert_eq!(ReplayProtection::Legacy.v(0).unwrap(), 27);
        assert_eq!(ReplayProtection::Eip155 { chain_id: 137 }.v(1).unwrap(), 310);
        assert!(ReplayProtection::Legacy.v(2).is_err());
        assert!(
            ReplayProtection::Eip155 { chain_id: u64::MAX }
                .v(0)
                .is_err()
        );
    }

    #[test]
    fn infer_typed() {
        assert_eq!(
            infer_replay_protection(&[0x02, 0xf8, 0x00]).unwrap(),
            ReplayProtection::Typed
        );
    }

    #[test]
    fn infer_eip155_and_legacy() {
        let eip155 = rlp_list(&[0, 1, 21000, 0, 5, 0, 5, 0, 0]);
        assert_eq!(
            infer_replay_protection(&eip155).unwrap(),
            ReplayProtection::Eip155 { chain_id: 5 }
        );

        let zero_chain = rlp_list(&[0, 1, 21000, 0, 5, 0, 0, 0, 0]);
        assert_eq!(
            infer_replay_protection(&zero_chain).unwrap(),
            ReplayProtection::Legacy
        );

        let legacy = rlp_list(&[0, 1, 21000, 0, 5, 0]);
        assert_eq!(
            infer_replay_protection(&legacy).unwrap(),
            ReplayProtection::Legacy
        );
    }

    #[test]
    fn infer_rejects_unknown_shapes() {
        assert!(infer_replay_protection(&[]).is_err());
        assert!(infer_replay_protection(&rlp_list(&[1, 2, 3])).is_err());
        // A string, not a list.
        assert!(infer_replay_protection(&[0x83, b'a', b'b', b'c']).is_err());
        // Truncated list.
        assert!(infer_replay_protection(&[0xc3, 0x01]).is_err());
    }

    #[test]
    fn recovers_both_parities() {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let expected = key.verifying_key().to_encoded_point(false);
        let compressed = key.verifying_key().to_encoded_point(true);

        for i in 0u8..8 {
            let digest = keccak256([i]).0;
            let (sig, id) = key.sign_prehash_recoverable(&digest).unwrap();
            let (r, s) = sig.split_bytes();

            let found = recovery_id(&digest, &r.into(), &s.into(), expected.as_bytes()).unwrap();
            assert_eq!(found, id.to_byte());

            let found = recovery_id(&digest, &r.into(), &s.into(), compressed.as_bytes()).unwrap();
            assert_eq!(found, id.to_byte());
        }
    }

    #[test]
    fn wrong_key_fails() {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let other = SigningKey::from_slice(&[0x43; 32]).unwrap();
        let digest = keccak256(b"msg").0;
        let (sig, _) = key.sign_prehash_recoverable(&digest).unwrap();
        let (r, s) = sig.split_bytes();

        let err = recovery_id(
            &digest,
            &r.into(),
            &s.into(),
            other.verifying_key().to_encoded_point(false).as_bytes(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Recovery(_)));
    }
}
