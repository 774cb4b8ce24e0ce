//! Client identity: the static P-256 keypair naming this installation.
//!
//! The device learns the identity public key during `connect` and remembers
//! it once pairing succeeds. Every encrypted exchange derives its key by ECDH
//! between the identity private key and the device's current ephemeral
//! public key.
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::Identity;
//!
//! let identity = Identity::generate("my-app").unwrap();
//! assert_eq!(identity.public_key_bytes()[0], 0x04);
//! assert_eq!(identity.name(), "my-app");
//! ```

use core::fmt;

use p256::ecdh::diffie_hellman;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};
use p256::PublicKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Maximum length of an identity name in bytes.
pub const MAX_NAME_LEN: usize = 24;

/// Width of the name field on the wire (name plus at least one NUL).
pub const NAME_FIELD_LEN: usize = 25;

/// Length of an uncompressed SEC1 P-256 public key.
pub const PUBLIC_KEY_LEN: usize = 65;

/// The static keypair and display name identifying this client.
///
/// Created once and immutable afterwards. The private key never leaves
/// this type; callers that persist an identity use
/// [`secret_bytes`](Self::secret_bytes) and
/// [`from_secret_bytes`](Self::from_secret_bytes).
pub struct Identity {
    signing_key: SigningKey,
    name: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Generates a fresh random identity.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name shown on the device when pairing (1-24 bytes)
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the name is empty or too long.
    pub fn generate(name: impl Into<String>) -> Result<Self> {
        let name = validate_name(name.into())?;
        Ok(Self {
            signing_key: SigningKey::random(&mut OsRng),
            name,
        })
    }

    /// Restores an identity from a persisted 32-byte private scalar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the scalar is not a valid P-256
    /// private key or the name is invalid.
    pub fn from_secret_bytes(secret: &[u8], name: impl Into<String>) -> Result<Self> {
        let name = validate_name(name.into())?;
        let signing_key = SigningKey::from_slice(secret)
            .map_err(|_| Error::InvalidIdentity("invalid P-256 private key".to_string()))?;
        Ok(Self { signing_key, name })
    }

    /// Returns the identity's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the identity public key.
    #[must_use]
    pub fn public_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the identity public key in uncompressed SEC1 form.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.public_key().to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Returns the private scalar for persistence.
    #[must_use]
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes().into())
    }

    /// Returns the name NUL-padded to the wire field width.
    #[must_use]
    pub fn padded_name(&self) -> [u8; NAME_FIELD_LEN] {
        let mut out = [0u8; NAME_FIELD_LEN];
        out[..self.name.len()].copy_from_slice(self.name.as_bytes());
        out
    }

    /// Signs the pairing preimage `sha256(publicKey || paddedName || secret)`.
    ///
    /// # Returns
    ///
    /// The DER-encoded P-256 signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if signing fails.
    pub fn sign_pairing(&self, secret: &str) -> Result<Vec<u8>> {
        let digest = pairing_digest(&self.public_key_bytes(), &self.padded_name(), secret);
        let sig: P256Signature = self
            .signing_key
            .sign_prehash(digest.as_slice())
            .map_err(|e| Error::InvalidIdentity(format!("pairing signature failed: {e}")))?;
        Ok(sig.to_der().as_bytes().to_vec())
    }

    /// Derives the ECDH shared secret with a device ephemeral key.
    ///
    /// Only the x-coordinate is returned; it is used directly as the
    /// AES-256 key.
    pub(crate) fn shared_secret(&self, ephemeral: &PublicKey) -> Zeroizing<[u8; 32]> {
        let shared = diffie_hellman(self.signing_key.as_nonzero_scalar(), ephemeral.as_affine());
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(shared.raw_secret_bytes().as_slice());
        out
    }
}

/// Computes the pairing digest.
///
/// Shared by the client (which signs it) and the emulated device (which
/// verifies it).
pub(crate) fn pairing_digest(
    public_key: &[u8; PUBLIC_KEY_LEN],
    padded_name: &[u8; NAME_FIELD_LEN],
    secret: &str,
) -> [u8; 32] {
    let mut preimage = Zeroizing::new(Vec::with_capacity(
        PUBLIC_KEY_LEN + NAME_FIELD_LEN + secret.len(),
    ));
    preimage.extend_from_slice(public_key);
    preimage.extend_from_slice(padded_name);
    preimage.extend_from_slice(secret.as_bytes());
    Sha256::digest(preimage.as_slice()).into()
}

fn validate_name(name: String) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidIdentity("name must not be empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidIdentity(format!(
            "name is {} bytes, at most {MAX_NAME_LEN} allowed",
            name.len()
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use p256::ecdsa::signature::hazmat::PrehashVerifier;

    use super::*;

    #[test]
    fn name_limits() {
        assert!(Identity::generate("").is_err());
        assert!(Identity::generate("a".repeat(MAX_NAME_LEN)).is_ok());
        let err = Identity::generate("a".repeat(MAX_NAME_LEN + 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentity(_)));
    }

    #[test]
    fn padded_name_is_nul_terminated() {
        let identity = Identity::generate("a".repeat(MAX_NAME_LEN)).unwrap();
        let padded = identity.padded_name();
        assert_eq!(padded[MAX_NAME_LEN], 0);
        assert_eq!(&padded[..MAX_NAME_LEN], "a".repeat(MAX_NAME_LEN).as_bytes());
    }

    #[test]
    fn secret_bytes_roundtrip() {
        let identity = Identity::generate("roundtrip").unwrap();
        let restored = Identity::from_secret_bytes(identity.secret_bytes().as_slice(), "roundtrip")
            .unwrap();
        assert_eq!(identity.public_key_bytes(), restored.public_key_bytes());
    }

    #[test]
    fn from_secret_bytes_rejects_zero() {
        let err = Identity::from_secret_bytes(&[0u8; 32], "zero").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentity(_)));
    }

    #[test]
    fn pairing_signature_verifies() {
        let identity = Identity::generate("pairing").unwrap();
        let der = identity.sign_pairing("ABCDEFGH").unwrap();
        let sig = P256Signature::from_der(&der).unwrap();

        let digest = pairing_digest(
            &identity.public_key_bytes(),
            &identity.padded_name(),
            "ABCDEFGH",
        );
        assert!(identity.public_key().verify_prehash(&digest, &sig).is_ok());

        let wrong = pairing_digest(
            &identity.public_key_bytes(),
            &identity.padded_name(),
            "WRONGSEC",
        );
        assert!(identity.public_key().verify_prehash(&wrong, &sig).is_err());
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let client = Identity::generate("client").unwrap();
        let device = p256::SecretKey::random(&mut OsRng);

        let from_client = client.shared_secret(&device.public_key());
        let client_pub = PublicKey::from_sec1_bytes(&client.public_key_bytes()).unwrap();
        let from_device = diffie_hellman(device.to_nonzero_scalar(), client_pub.as_affine());

        assert_eq!(from_client.as_slice(), from_device.raw_secret_bytes().as_slice());
    }
}
