//! [`SerialDevice`] trait to support different device backends.
//!
//! A backend performs every step of the channel protocol as a separate call,
//! so the channel can apply the same error classification and re-arm policy to all of them.
//! Each read or write uses its own [`SerialDevice::Token`],
//! which allows one reader and any number of writers to use the device at the same time.

use crate::link::{EventMask, LinkConfig};
use core::time::Duration;

#[cfg(feature = "serial2")]
pub mod serial2;

#[cfg(windows)]
pub mod windows;

/// The backend used by [`SerialChannel::open()`](crate::SerialChannel::open).
#[cfg(windows)]
pub type NativePort = windows::OverlappedPort;

/// The backend used by [`SerialChannel::open()`](crate::SerialChannel::open).
#[cfg(all(not(windows), feature = "serial2"))]
pub type NativePort = self::serial2::Serial2Device;

/// The outcome of waiting for a device event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WaitStatus {
	/// One of the armed events fired.
	Signalled,
	/// The timeout elapsed before any armed event fired.
	TimedOut,
}

/// A serial device that supports independent, concurrent reads and writes.
///
/// Configuration functions take `&mut self` and are only called while the channel is being opened.
/// All I/O functions take `&self`, because the receive task and writers share the device.
pub trait SerialDevice: Send + Sync + 'static {
	/// The error type returned by the device.
	type Error: core::fmt::Debug + core::fmt::Display + Send + 'static;

	/// The current line settings of the device.
	type Settings;

	/// A transient wait token for a single read or write operation.
	type Token;

	/// Read the current line settings of the device.
	fn read_settings(&self) -> Result<Self::Settings, Self::Error>;

	/// Apply the baud rate and the fixed framing (8 data bits, 1 stop bit, no parity).
	///
	/// The implementation must report an error if the device rejects the settings.
	fn apply_settings(&mut self, settings: Self::Settings, link: &LinkConfig) -> Result<(), Self::Error>;

	/// Make reads return immediately with whatever is available, and writes wait until completion.
	fn set_poll_timeouts(&mut self) -> Result<(), Self::Error>;

	/// Arm the events that complete [`Self::wait_event()`].
	///
	/// Arming the same mask again must be harmless.
	fn set_event_mask(&self, mask: EventMask) -> Result<(), Self::Error>;

	/// Create a fresh wait token for one operation.
	fn create_token(&self) -> Result<Self::Token, Self::Error>;

	/// Wait until an armed event fires or the timeout elapses.
	fn wait_event(&self, token: &mut Self::Token, timeout: Duration) -> Result<WaitStatus, Self::Error>;

	/// Read up to `buffer.len()` available bytes, blocking until the read completes.
	fn read(&self, token: &mut Self::Token, buffer: &mut [u8]) -> Result<usize, Self::Error>;

	/// Write all bytes in the buffer, blocking until the device accepted all of them.
	fn write_all(&self, token: &mut Self::Token, buffer: &[u8]) -> Result<(), Self::Error>;

	/// Release a wait token.
	fn release_token(&self, token: Self::Token) -> Result<(), Self::Error>;
}
