//! Lattice Signer Core Library
//!
//! This crate provides a client for Lattice-style hardware signers: an
//! encrypted, paired channel to the device and a generic signing codec that
//! turns any payload into device frames and parses the device's signature
//! back out.
//!
//! # Overview
//!
//! The device holds the keys. The client only needs to:
//!
//! - Prove who it is (a static P-256 [`Identity`] and a one-time pairing)
//! - Encrypt each request under a key shared with the device's rotating
//!   ephemeral key
//! - Describe what to sign: a derivation path, a curve, a hash, a display
//!   encoding and the payload bytes
//!
//! Chain-specific transaction building is left to the caller. Anything that
//! produces a byte payload and a derivation path can be signed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 Client (connect / pair / sign)               │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐ │
//! │  │ RetryPolicy  │  │   Wallets    │  │  FirmwareLimits    │ │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘ │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Signing Codec            │  Signature Recovery (EVM `v`)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Protocol Layer                            │
//! │  ┌──────────┐  ┌─────────────────┐  ┌────────────────────┐  │
//! │  │ Identity │  │  SecureChannel  │  │     Envelope       │  │
//! │  └──────────┘  └─────────────────┘  └────────────────────┘  │
//! ├─────────────────────────────────────────────────────────────┤
//! │            Transport (HTTP relay / emulator)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Encoding a Signing Request
//!
//! ```rust
//! use lattice_signer_core::firmware::{FirmwareLimits, FirmwareVersion};
//! use lattice_signer_core::signing::{self, Curve, Encoding, HashType, SigningRequest};
//!
//! let limits = FirmwareLimits::for_version(FirmwareVersion::new(0, 15, 0)).unwrap();
//! let request = SigningRequest::new(
//!     "m/44'/60'/0'/0/0".parse().unwrap(),
//!     Curve::Secp256k1,
//!     HashType::Keccak256,
//!     Encoding::None,
//!     b"hello".to_vec(),
//! );
//!
//! let encoded = signing::encode(&request, &limits).unwrap();
//! assert_eq!(encoded.base_frame.len(), limits.base_request_size);
//! assert!(encoded.extra_frames.is_empty());
//! ```
//!
//! ## Talking to a Device
//!
//! ```ignore
//! use lattice_signer_core::{Client, ClientConfig, Identity};
//!
//! let config = ClientConfig::from_toml_str(&std::fs::read_to_string("lattice.toml")?)?;
//! let mut client = Client::from_config(Identity::generate("my-app")?, &config)?;
//!
//! if !client.connect("DeviceID")? {
//!     client.pair("SECRET12")?;
//! }
//! let response = client.sign(&request)?;
//! ```
//!
//! # Feature Flags
//!
//! - `relay` (default): the HTTP relay transport, built on `reqwest`
//! - `emulator`: an in-process software device implementing
//!   [`transport::Transport`], for integration tests
//!
//! # Security Considerations
//!
//! - The shared secret is recomputed for every request and never cached
//! - The device ephemeral key rotates only after a checksum-valid response
//! - The CRC32 checksums detect corruption; they are not a MAC
//! - EVM signatures are normalized to low-S form; other secp256k1
//!   signatures keep the device's `s`

// Modules
pub mod client;
pub mod config;
pub mod crypto;
pub mod cursor;
#[cfg(any(test, feature = "emulator"))]
pub mod emulator;
pub mod error;
pub mod firmware;
pub mod identity;
pub mod protocol;
pub mod retry;
pub mod signature;
pub mod signing;
pub mod transport;
pub mod wallet;

// Re-exports for convenience
pub use client::Client;
pub use config::ClientConfig;
pub use error::{DeviceError, Error, Result};
pub use firmware::{FirmwareLimits, FirmwareVersion};
pub use identity::Identity;
pub use retry::RetryPolicy;
pub use signature::{Ed25519Signature, Signature};
pub use signing::{
    BlsDst, Curve, Encoding, HashType, ReplayProtection, SignerPath, SigningRequest,
    SigningResponse,
};
pub use wallet::WalletDescriptor;
