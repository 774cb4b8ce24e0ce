//! Transport abstraction.
//!
//! The [`Transport`] trait carries opaque envelope bytes to a device and
//! returns its reply. The library ships:
//!
//! - `RelayTransport` (feature `relay`): HTTP relay at `{baseUrl}/{deviceId}`
//! - `Emulator` (feature `emulator`): an in-process software device
//!
//! This allows the same secure channel to work over any medium that can
//! move bytes to the device.

#[cfg(feature = "relay")]
pub mod relay;

#[cfg(feature = "relay")]
pub use relay::RelayTransport;

use crate::error::Result;

/// A transport layer for communicating with a device.
pub trait Transport {
    /// Sends a serialized envelope and receives the device's reply.
    ///
    /// # Arguments
    ///
    /// * `device_id` - The device to route the request to
    /// * `request` - The serialized request envelope
    ///
    /// # Returns
    ///
    /// A [`Result`] containing the serialized response envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) or
    /// [`Error::Timeout`](crate::Error::Timeout) if delivery fails.
    fn transmit(&mut self, device_id: &str, request: &[u8]) -> Result<Vec<u8>>;

    /// Checks if the transport is still usable.
    ///
    /// Connectionless transports, such as the HTTP relay, always return
    /// `true`; delivery failures surface from [`Transport::transmit`].
    fn is_connected(&self) -> bool;
}
