//! EVM signature recovery against real transaction encodings.
//!
//! Each test signs a transaction digest with a local secp256k1 key, lays
//! the signature out the way the device returns it and checks that the
//! decoded `v` recovers the same key.

use alloy_primitives::keccak256;
use alloy_rlp::{Encodable, Header};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use lattice_signer_core::signing::{
    self, Curve, Encoding, HashType, ReplayProtection, SignerPath, SigningRequest,
    SigningResponse,
};
use lattice_signer_core::{Error, Signature};

const SIGN_RESPONSE_LEN: usize = 1090;

fn key() -> SigningKey {
    SigningKey::from_slice(&[0x42; 32]).unwrap()
}

fn path() -> SignerPath {
    "m/44'/60'/0'/0/0".parse().unwrap()
}

fn enc<T: Encodable>(value: T) -> Vec<u8> {
    alloy_rlp::encode(value)
}

fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    Header {
        list: true,
        payload_length: items.iter().map(Vec::len).sum(),
    }
    .encode(&mut out);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn legacy_fields() -> Vec<Vec<u8>> {
    vec![
        enc(9u64),
        enc(20_000_000_000u64),
        enc(21_000u64),
        enc([0x35u8; 20]),
        enc(1_000_000_000_000_000_000u64),
        enc(&[][..]),
    ]
}

/// Unsigned EIP-155 form: the legacy fields followed by `chainId, 0, 0`.
fn eip155_tx(chain_id: u64) -> Vec<u8> {
    let mut fields = legacy_fields();
    fields.extend([enc(chain_id), enc(0u64), enc(0u64)]);
    rlp_list(&fields)
}

/// Device response: `pubkey[65] der[74]` zero-padded.
fn device_response(signature: &K256Signature) -> Vec<u8> {
    let mut out = key()
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();
    let der = signature.to_der();
    out.extend_from_slice(der.as_bytes());
    out.resize(65 + 74, 0);
    out.resize(SIGN_RESPONSE_LEN, 0);
    out
}

fn sign_and_decode(request: &SigningRequest) -> Signature {
    let digest = keccak256(&request.payload);
    let (signature, _) = key().sign_prehash_recoverable(digest.as_slice()).unwrap();
    decode_signature(&device_response(&signature), request)
}

fn decode_signature(response: &[u8], request: &SigningRequest) -> Signature {
    match signing::decode(response, request).unwrap() {
        SigningResponse::Secp256k1 { signature, .. } => signature,
        other => panic!("unexpected response {other:?}"),
    }
}

fn assert_recovers(payload: &[u8], signature: &Signature, recovery_id: u8) {
    let digest = keccak256(payload);
    let sig = K256Signature::from_slice(&signature.to_bytes()).unwrap();
    let id = RecoveryId::from_byte(recovery_id).unwrap();
    let recovered = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, id).unwrap();
    assert_eq!(&recovered, key().verifying_key());
}

fn evm_request(payload: Vec<u8>) -> SigningRequest {
    SigningRequest::new(
        path(),
        Curve::Secp256k1,
        HashType::Keccak256,
        Encoding::Evm,
        payload,
    )
}

#[test]
fn eip155_chain_id_is_inferred() {
    let tx = eip155_tx(137);
    let signature = sign_and_decode(&evm_request(tx.clone()));

    let v = signature.v().unwrap();
    assert!(v == 309 || v == 310, "v = {v}");
    assert_recovers(&tx, &signature, (v - 309) as u8);
}

#[test]
fn pre_eip155_legacy() {
    let tx = rlp_list(&legacy_fields());
    let signature = sign_and_decode(&evm_request(tx.clone()));

    let v = signature.v().unwrap();
    assert!(v == 27 || v == 28, "v = {v}");
    assert_recovers(&tx, &signature, (v - 27) as u8);
}

#[test]
fn zero_chain_id_is_legacy() {
    let tx = eip155_tx(0);
    let v = sign_and_decode(&evm_request(tx)).v().unwrap();
    assert!(v == 27 || v == 28);
}

#[test]
fn typed_transaction_uses_raw_id() {
    let mut tx = vec![0x02];
    tx.extend(rlp_list(&[enc(1u64), enc(0u64), enc(1u64), enc(2u64), enc(21_000u64)]));
    let signature = sign_and_decode(&evm_request(tx.clone()));

    let v = signature.v().unwrap();
    assert!(v <= 1);
    assert_recovers(&tx, &signature, v as u8);
}

#[test]
fn explicit_replay_protection_wins() {
    let tx = rlp_list(&legacy_fields());
    let request =
        evm_request(tx.clone()).with_replay_protection(ReplayProtection::Eip155 { chain_id: 1 });
    let signature = sign_and_decode(&request);

    let v = signature.v().unwrap();
    assert!(v == 37 || v == 38);
    assert_recovers(&tx, &signature, (v - 37) as u8);
}

#[test]
fn unrecognized_payload_is_a_recovery_error() {
    let request = evm_request(enc(&b"not a transaction"[..]));
    let digest = keccak256(&request.payload);
    let (signature, _) = key().sign_prehash_recoverable(digest.as_slice()).unwrap();

    let err = signing::decode(&device_response(&signature), &request).unwrap_err();
    assert!(matches!(err, Error::Recovery(_)));
}

#[test]
fn high_s_is_normalized() {
    let tx = eip155_tx(1);
    let digest = keccak256(&tx);
    let (low, _) = key().sign_prehash_recoverable(digest.as_slice()).unwrap();
    let high = K256Signature::from_scalars(low.r(), -*low.s()).unwrap();
    assert!(high.normalize_s().is_some());

    let signature = decode_signature(&device_response(&high), &evm_request(tx.clone()));
    assert_eq!(signature.to_bytes().as_slice(), low.to_bytes().as_slice());

    let v = signature.v().unwrap();
    assert_recovers(&tx, &signature, (v - 37) as u8);
}
