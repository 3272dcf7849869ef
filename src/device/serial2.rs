//! Device implementation using the `serial2` crate.
//!
//! `serial2` has no separate "wait for event" call,
//! so waiting for data is done by reading a single byte with a timeout.
//! That byte is kept in the wait token and handed out by the following read.

use crate::device::{SerialDevice, WaitStatus};
use crate::link::{EventMask, LinkConfig};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Re-exported `serial2` crate in case you need to modify serial port settings.
pub use serial2;

/// Writes have no timeout of their own; this is the longest timeout every platform accepts.
const UNBOUNDED_WRITE_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// A serial port opened with the `serial2` crate.
///
/// The receive path uses its own clone of the port, because `serial2` stores the read timeout per handle.
pub struct Serial2Device {
	port: serial2::SerialPort,
	receiver: Mutex<serial2::SerialPort>,
}

/// Wait token holding the byte that signalled the arrival of data.
#[derive(Debug, Default)]
pub struct Lookahead {
	byte: Option<u8>,
}

impl Serial2Device {
	/// Open a serial port without changing its settings.
	pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
		let port = serial2::SerialPort::open(path, serial2::KeepSettings)?;
		Self::new(port)
	}

	/// Wrap an already opened serial port.
	pub fn new(port: serial2::SerialPort) -> std::io::Result<Self> {
		let receiver = Mutex::new(port.try_clone()?);
		Ok(Self { port, receiver })
	}

	fn lock_receiver(&self) -> std::io::Result<MutexGuard<'_, serial2::SerialPort>> {
		self.receiver
			.lock()
			.map_err(|_| std::io::Error::other("receive handle lock poisoned"))
	}
}

impl core::fmt::Debug for Serial2Device {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		#[derive(Debug)]
		#[allow(dead_code)] // Dead code analysis ignores derive debug impls, but that is the whole point of this struct.
		enum Raw {
			#[cfg(unix)]
			Fd(std::os::unix::io::RawFd),
			#[cfg(windows)]
			Handle(std::os::windows::io::RawHandle),
		}

		#[cfg(unix)]
		let raw = {
			use std::os::unix::io::AsRawFd;
			Raw::Fd(self.port.as_raw_fd())
		};
		#[cfg(windows)]
		let raw = {
			use std::os::windows::io::AsRawHandle;
			Raw::Handle(self.port.as_raw_handle())
		};
		write!(f, "Serial2Device({:?})", raw)
	}
}

impl SerialDevice for Serial2Device {
	type Error = std::io::Error;

	type Settings = serial2::Settings;

	type Token = Lookahead;

	fn read_settings(&self) -> Result<Self::Settings, Self::Error> {
		self.port.get_configuration()
	}

	fn apply_settings(&mut self, mut settings: Self::Settings, link: &LinkConfig) -> Result<(), Self::Error> {
		let baud_rate = link.baud_rate().native();
		settings.set_raw();
		settings.set_baud_rate(baud_rate)?;
		settings.set_char_size(serial2::CharSize::Bits8);
		settings.set_stop_bits(serial2::StopBits::One);
		settings.set_parity(serial2::Parity::None);
		settings.set_flow_control(serial2::FlowControl::None);
		self.port.set_configuration(&settings)?;

		// The driver may silently pick a different rate.
		let applied = self.port.get_configuration()?.get_baud_rate()?;
		if applied != baud_rate {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				format!("device accepted baud rate {} instead of {}", applied, baud_rate),
			));
		}
		Ok(())
	}

	fn set_poll_timeouts(&mut self) -> Result<(), Self::Error> {
		self.port.set_write_timeout(UNBOUNDED_WRITE_TIMEOUT)?;
		self.lock_receiver()?.set_read_timeout(Duration::ZERO)
	}

	fn set_event_mask(&self, _mask: EventMask) -> Result<(), Self::Error> {
		// Readiness is detected by reading, there is no event state to arm.
		Ok(())
	}

	fn create_token(&self) -> Result<Self::Token, Self::Error> {
		Ok(Lookahead::default())
	}

	fn wait_event(&self, token: &mut Self::Token, timeout: Duration) -> Result<WaitStatus, Self::Error> {
		if token.byte.is_some() {
			return Ok(WaitStatus::Signalled);
		}

		let mut receiver = self.lock_receiver()?;
		receiver.set_read_timeout(timeout)?;
		let mut byte = [0u8; 1];
		match receiver.read(&mut byte) {
			Ok(0) => Err(std::io::ErrorKind::UnexpectedEof.into()),
			Ok(_) => {
				token.byte = Some(byte[0]);
				Ok(WaitStatus::Signalled)
			},
			Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(WaitStatus::TimedOut),
			Err(e) => Err(e),
		}
	}

	fn read(&self, token: &mut Self::Token, buffer: &mut [u8]) -> Result<usize, Self::Error> {
		if buffer.is_empty() {
			return Ok(0);
		}

		let mut filled = 0;
		if let Some(byte) = token.byte.take() {
			buffer[0] = byte;
			filled = 1;
		}

		let mut receiver = self.lock_receiver()?;
		receiver.set_read_timeout(Duration::ZERO)?;
		match receiver.read(&mut buffer[filled..]) {
			Ok(count) => filled += count,
			Err(e) if matches!(e.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) => (),
			Err(e) => return Err(e),
		}
		Ok(filled)
	}

	fn write_all(&self, _token: &mut Self::Token, buffer: &[u8]) -> Result<(), Self::Error> {
		self.port.write_all(buffer)
	}

	fn release_token(&self, _token: Self::Token) -> Result<(), Self::Error> {
		Ok(())
	}
}
