//! Bounded retries of device calls.
//!
//! Some device errors describe stale client state rather than a failed
//! request. [`RetryPolicy::run`] repairs that state through the [`Resync`]
//! hooks and repeats the call:
//!
//! | Error | Recovery |
//! |-------|----------|
//! | Invalid ephemeral id | re-run connect, retry |
//! | Wrong wallet | refetch active wallet, retry (unless disabled) |
//! | Device busy | wait, retry |
//! | Checksum mismatch | re-run connect, resend |
//!
//! A corrupted response still rotated the device's ephemeral key, so a
//! resend must first fetch the new key.
//!
//! Everything else, including all local validation errors, propagates on
//! the first occurrence.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::{DeviceError, Error, Result};

/// State repair hooks used between retries.
pub trait Resync {
    /// Re-establishes the session to obtain a fresh ephemeral key.
    ///
    /// # Errors
    ///
    /// Any error aborts the retry loop.
    fn resync(&mut self) -> Result<()>;

    /// Refetches the device's active wallet.
    ///
    /// # Errors
    ///
    /// Any error aborts the retry loop.
    fn refresh_active_wallet(&mut self) -> Result<()>;
}

/// What to do before repeating a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Resync,
    RefreshWallet,
    Wait,
    Resend,
}

/// A bounded retry policy for device calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    busy_delay: Duration,
    skip_retry_on_wrong_wallet: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_retries` retries after the first
    /// attempt, with a 3 second busy delay.
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            busy_delay: Duration::from_secs(3),
            skip_retry_on_wrong_wallet: false,
        }
    }

    /// Sets the wait before retrying a busy device.
    #[must_use]
    pub const fn with_busy_delay(mut self, delay: Duration) -> Self {
        self.busy_delay = delay;
        self
    }

    /// Makes wrong-wallet errors propagate without a retry.
    #[must_use]
    pub const fn skip_retry_on_wrong_wallet(mut self, skip: bool) -> Self {
        self.skip_retry_on_wrong_wallet = skip;
        self
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn busy_delay(&self) -> Duration {
        self.busy_delay
    }

    #[must_use]
    pub const fn skips_wrong_wallet_retry(&self) -> bool {
        self.skip_retry_on_wrong_wallet
    }

    /// Runs `op` against `target`, retrying recoverable errors.
    ///
    /// # Errors
    ///
    /// Returns the first unrecoverable error, the last error once the retry
    /// budget is spent, or any error raised while repairing state.
    pub fn run<C, T, F>(&self, target: &mut C, mut op: F) -> Result<T>
    where
        C: Resync,
        F: FnMut(&mut C) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            let err = match op(target) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let Some(recovery) = self.recovery_for(&err) else {
                return Err(err);
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            warn!(
                attempt,
                max_retries = self.max_retries,
                error = %err,
                ?recovery,
                "retrying device call"
            );

            match recovery {
                Recovery::Resync => target.resync()?,
                Recovery::RefreshWallet => target.refresh_active_wallet()?,
                Recovery::Wait => thread::sleep(self.busy_delay),
                Recovery::Resend => target.resync()?,
            }
        }
    }

    const fn recovery_for(&self, err: &Error) -> Option<Recovery> {
        match err {
            Error::Device(DeviceError::InvalidEphemeralId) => Some(Recovery::Resync),
            Error::Device(DeviceError::WrongWallet) if !self.skip_retry_on_wrong_wallet => {
                Some(Recovery::RefreshWallet)
            }
            Error::Device(DeviceError::DeviceBusy) => Some(Recovery::Wait),
            Error::Checksum(_) => Some(Recovery::Resend),
            _ => None,
        }
    }
}
