//! High-level device client.
//!
//! [`Client`] is the entry point most callers need. It owns the
//! [`SecureChannel`], the [`RetryPolicy`] and the cached active wallet, and
//! exposes the three device operations:
//!
//! - [`connect`](Client::connect): open a session
//! - [`pair`](Client::pair): pair using the secret shown on the device
//! - [`sign`](Client::sign): sign an arbitrary payload
//!
//! Every device call runs through the retry policy.
//!
//! # Example
//!
//! ```ignore
//! use lattice_signer_core::{Client, ClientConfig, Identity};
//! use lattice_signer_core::signing::{Curve, Encoding, HashType, SigningRequest};
//!
//! let config = ClientConfig::default();
//! let identity = Identity::generate("my-app")?;
//! let mut client = Client::from_config(identity, &config)?;
//!
//! if !client.connect("DeviceID")? {
//!     client.pair("SECRET12")?;
//! }
//!
//! let request = SigningRequest::new(
//!     "m/44'/60'/0'/0/0".parse()?,
//!     Curve::Secp256k1,
//!     HashType::Keccak256,
//!     Encoding::Evm,
//!     tx_rlp,
//! );
//! let response = client.sign(&request)?;
//! ```

use core::fmt;

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::firmware::FirmwareLimits;
use crate::identity::Identity;
use crate::protocol::{
    CONTINUATION_CODE_LEN, EncryptedRequest, SIGN_SCHEMA_EXTRA_DATA, SIGN_SCHEMA_GENERAL,
    SecureChannel, Session,
};
use crate::retry::{Resync, RetryPolicy};
use crate::signing::{EncodedRequest, SigningRequest, SigningResponse, decode, encode};
use crate::transport::Transport;
use crate::wallet::{WalletDescriptor, Wallets};

/// A client for one device.
pub struct Client {
    /// Encrypted channel to the device.
    channel: SecureChannel,

    /// Retry policy for device calls.
    retry: RetryPolicy,

    /// Active wallet, fetched after connecting and pairing.
    active_wallet: Option<WalletDescriptor>,

    /// Caller-supplied firmware limits.
    limits_override: Option<FirmwareLimits>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("channel", &self.channel)
            .field("retry", &self.retry)
            .field("active_wallet", &self.active_wallet)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client over an arbitrary transport.
    #[must_use]
    pub fn new(identity: Identity, transport: Box<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            channel: SecureChannel::new(identity, transport),
            retry: config.retry_policy(),
            active_wallet: None,
            limits_override: None,
        }
    }

    /// Creates a client talking to the relay named in `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Transport`] if the HTTP client cannot be built
    #[cfg(feature = "relay")]
    pub fn from_config(identity: Identity, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = crate::transport::RelayTransport::from_config(config)?;
        Ok(Self::new(identity, Box::new(transport), config))
    }

    /// Overrides the firmware limits derived from the connect response.
    #[must_use]
    pub fn with_firmware_limits(mut self, limits: FirmwareLimits) -> Self {
        self.limits_override = Some(limits);
        self
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        self.channel.identity()
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.channel.session()
    }

    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.channel.is_paired()
    }

    /// Returns the cached active wallet.
    #[must_use]
    pub const fn active_wallet(&self) -> Option<&WalletDescriptor> {
        self.active_wallet.as_ref()
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Connects to a device.
    ///
    /// If the device already knows this client, the active wallet is
    /// fetched as well.
    ///
    /// # Returns
    ///
    /// `true` if the client is paired with the device.
    ///
    /// # Errors
    ///
    /// Any transport, protocol or device error.
    pub fn connect(&mut self, device_id: &str) -> Result<bool> {
        let retry = self.retry;
        let paired = retry.run(self, |c| c.channel.establish(device_id))?;
        self.active_wallet = None;
        if paired {
            self.fetch_active_wallet()?;
        }
        Ok(paired)
    }

    /// Pairs with the connected device and fetches the active wallet.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if [`connect`](Self::connect) has not
    ///   succeeded
    /// - [`Error::Device`] with
    ///   [`PairingFailed`](crate::DeviceError::PairingFailed) on a wrong secret
    pub fn pair(&mut self, secret: &str) -> Result<()> {
        let retry = self.retry;
        retry.run(self, |c| c.channel.pair(secret))?;
        self.fetch_active_wallet()?;
        Ok(())
    }

    /// Fetches the device's wallets and caches the active one.
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveWallet`] if neither wallet slot is populated
    /// - Any transport, protocol or device error
    pub fn fetch_active_wallet(&mut self) -> Result<&WalletDescriptor> {
        let retry = self.retry;
        retry.run(self, Self::load_active_wallet)?;
        self.active_wallet.as_ref().ok_or(Error::NoActiveWallet)
    }

    /// Returns the limits the codec validates against: the override if one
    /// was supplied, else the limits implied by the connected firmware.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] without a session
    /// - [`Error::Encoding`] if the firmware version is unknown or too old
    pub fn firmware_limits(&self) -> Result<FirmwareLimits> {
        if let Some(limits) = &self.limits_override {
            return Ok(limits.clone());
        }
        let session = self.channel.session().ok_or(Error::NotConnected)?;
        let version = session.firmware().ok_or_else(|| {
            Error::Encoding(
                "device did not report a firmware version; supply firmware limits".to_string(),
            )
        })?;
        FirmwareLimits::for_version(version)
    }

    /// Signs a payload with the active wallet.
    ///
    /// The request is encoded and validated before anything is sent; only
    /// the device conversation is retried.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] or [`Error::NotPaired`]
    /// - [`Error::Encoding`] if the request is invalid for the firmware
    /// - [`Error::Device`] if the device rejected the request
    /// - [`Error::Recovery`] if `v` cannot be computed for an EVM payload
    pub fn sign(&mut self, request: &SigningRequest) -> Result<SigningResponse> {
        if self.channel.session().is_none() {
            return Err(Error::NotConnected);
        }
        if !self.channel.is_paired() {
            return Err(Error::NotPaired);
        }

        let limits = self.firmware_limits()?;
        let encoded = encode(request, &limits)?;

        let retry = self.retry;
        let response = retry.run(self, |c| c.send_sign_frames(&encoded))?;
        decode(&response, request)
    }

    fn load_active_wallet(&mut self) -> Result<()> {
        let data = self.channel.request(EncryptedRequest::GetWallets, &[])?;
        let wallets = Wallets::parse(&data)?;
        let active = wallets.active()?.clone();
        info!(wallet = active.name(), "active wallet");
        self.active_wallet = Some(active);
        Ok(())
    }

    /// Sends the base frame and every extra frame, chaining continuation
    /// codes. Returns the final response.
    fn send_sign_frames(&mut self, encoded: &EncodedRequest) -> Result<Vec<u8>> {
        let uid = *self
            .active_wallet
            .as_ref()
            .ok_or(Error::NoActiveWallet)?
            .uid();

        let has_extra = !encoded.extra_frames.is_empty();
        let mut payload = Vec::with_capacity(2 + uid.len() + encoded.base_frame.len());
        payload.push(u8::from(has_extra));
        payload.push(SIGN_SCHEMA_GENERAL);
        payload.extend_from_slice(&uid);
        payload.extend_from_slice(&encoded.base_frame);
        let mut response = self.channel.request(EncryptedRequest::Sign, &payload)?;

        let total = encoded.extra_frames.len();
        for (i, frame) in encoded.extra_frames.iter().enumerate() {
            let next_code = response.get(..CONTINUATION_CODE_LEN).ok_or_else(|| {
                Error::Protocol("sign response is missing the continuation code".to_string())
            })?;
            let has_more = i + 1 < total;

            let mut payload =
                Vec::with_capacity(2 + uid.len() + CONTINUATION_CODE_LEN + frame.len());
            payload.push(u8::from(has_more));
            payload.push(SIGN_SCHEMA_EXTRA_DATA);
            payload.extend_from_slice(&uid);
            payload.extend_from_slice(next_code);
            payload.extend_from_slice(frame);

            debug!(frame = i + 1, total, "sending extra signing frame");
            response = self.channel.request(EncryptedRequest::Sign, &payload)?;
        }
        Ok(response)
    }
}

impl Resync for Client {
    fn resync(&mut self) -> Result<()> {
        let device_id = self
            .channel
            .session()
            .map(|s| s.device_id().to_string())
            .ok_or(Error::NotConnected)?;
        self.channel.establish(&device_id)?;
        Ok(())
    }

    fn refresh_active_wallet(&mut self) -> Result<()> {
        self.load_active_wallet()
    }
}
