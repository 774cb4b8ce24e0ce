//! Active wallet descriptors.
//!
//! A device holds an internal wallet and may have an external one (a
//! SafeCard) inserted. `GET_WALLETS` returns both descriptors; signing
//! requests are addressed to the active wallet by its uid.
//!
//! # Descriptor Layout
//!
//! ```text
//! | uid | capabilities | name             |
//! |-----|--------------|------------------|
//! | 32B | 4B (BE)      | 35B, NUL-padded  |
//! ```

use core::fmt;

use crate::cursor::Reader;
use crate::error::{Error, Result};

/// Length of a wallet uid.
pub const WALLET_UID_LEN: usize = 32;

/// Width of the wallet name field.
const WALLET_NAME_LEN: usize = 35;

/// Length of one serialized descriptor.
pub const WALLET_DESCRIPTOR_LEN: usize = WALLET_UID_LEN + 4 + WALLET_NAME_LEN;

/// One wallet known to the device.
#[derive(Clone, PartialEq, Eq)]
pub struct WalletDescriptor {
    uid: [u8; WALLET_UID_LEN],
    capabilities: u32,
    name: String,
}

impl fmt::Debug for WalletDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletDescriptor")
            .field("uid", &hex::encode(self.uid))
            .field("capabilities", &self.capabilities)
            .field("name", &self.name)
            .finish()
    }
}

impl WalletDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(uid: [u8; WALLET_UID_LEN], capabilities: u32, name: String) -> Self {
        Self {
            uid,
            capabilities,
            name,
        }
    }

    fn read(r: &mut Reader<'_>) -> Result<Self> {
        let uid = r.read_array()?;
        let capabilities = r.read_u32_be()?;
        let raw = r.read_bytes(WALLET_NAME_LEN)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let name = String::from_utf8_lossy(&raw[..end]).into_owned();
        Ok(Self {
            uid,
            capabilities,
            name,
        })
    }

    /// Serializes the descriptor as the device sends it. Names longer than
    /// the field are truncated.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; WALLET_DESCRIPTOR_LEN] {
        let mut out = [0u8; WALLET_DESCRIPTOR_LEN];
        out[..WALLET_UID_LEN].copy_from_slice(&self.uid);
        out[WALLET_UID_LEN..WALLET_UID_LEN + 4].copy_from_slice(&self.capabilities.to_be_bytes());
        let name = self.name.as_bytes();
        let n = name.len().min(WALLET_NAME_LEN - 1);
        out[WALLET_UID_LEN + 4..WALLET_UID_LEN + 4 + n].copy_from_slice(&name[..n]);
        out
    }

    #[must_use]
    pub const fn uid(&self) -> &[u8; WALLET_UID_LEN] {
        &self.uid
    }

    #[must_use]
    pub const fn capabilities(&self) -> u32 {
        self.capabilities
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the uid is all zeros (no wallet in this slot).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uid.iter().all(|&b| b == 0)
    }
}

/// The internal and external wallet slots of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallets {
    /// The device's own wallet.
    pub internal: WalletDescriptor,

    /// The inserted SafeCard wallet, if any.
    pub external: WalletDescriptor,
}

impl Wallets {
    /// Parses a `GET_WALLETS` response: internal then external descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the response is too short.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let internal = WalletDescriptor::read(&mut r)?;
        let external = WalletDescriptor::read(&mut r)?;
        Ok(Self { internal, external })
    }

    /// Returns the active wallet: the external one if present, else the
    /// internal one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveWallet`] if both slots are empty.
    pub fn active(&self) -> Result<&WalletDescriptor> {
        if !self.external.is_empty() {
            Ok(&self.external)
        } else if !self.internal.is_empty() {
            Ok(&self.internal)
        } else {
            Err(Error::NoActiveWallet)
        }
    }

    /// Serializes both descriptors as the device sends them.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * WALLET_DESCRIPTOR_LEN);
        out.extend_from_slice(&self.internal.to_bytes());
        out.extend_from_slice(&self.external.to_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EncryptedRequest;

    fn descriptor(byte: u8, name: &str) -> WalletDescriptor {
        WalletDescriptor::new([byte; WALLET_UID_LEN], 0x0000_0001, name.to_string())
    }

    #[test]
    fn response_length_matches_request_code() {
        assert_eq!(
            2 * WALLET_DESCRIPTOR_LEN,
            EncryptedRequest::GetWallets.response_len()
        );
    }

    #[test]
    fn parse_descriptors() {
        let wallets = Wallets {
            internal: descriptor(0x11, "Internal"),
            external: descriptor(0x00, ""),
        };
        let parsed = Wallets::parse(&wallets.to_bytes()).unwrap();
        assert_eq!(parsed.internal.name(), "Internal");
        assert_eq!(parsed.internal.capabilities(), 1);
        assert!(parsed.external.is_empty());
    }

    #[test]
    fn external_wallet_wins() {
        let wallets = Wallets {
            internal: descriptor(0x11, "Internal"),
            external: descriptor(0x22, "SafeCard"),
        };
        assert_eq!(wallets.active().unwrap().uid(), &[0x22; 32]);
    }

    #[test]
    fn internal_wallet_fallback() {
        let wallets = Wallets {
            internal: descriptor(0x11, "Internal"),
            external: descriptor(0x00, ""),
        };
        assert_eq!(wallets.active().unwrap().name(), "Internal");
    }

    #[test]
    fn no_active_wallet() {
        let wallets = Wallets {
            internal: descriptor(0x00, ""),
            external: descriptor(0x00, ""),
        };
        assert!(matches!(wallets.active(), Err(Error::NoActiveWallet)));
    }

    #[test]
    fn long_name_truncated() {
        let long = "x".repeat(50);
        let bytes = descriptor(0x01, &long).to_bytes();
        let parsed = Wallets::parse(&[bytes.as_slice(), bytes.as_slice()].concat()).unwrap();
        assert_eq!(parsed.internal.name().len(), WALLET_NAME_LEN - 1);
    }

    #[test]
    fn short_response() {
        assert!(matches!(Wallets::parse(&[0; 100]), Err(Error::Protocol(_))));
    }
}
