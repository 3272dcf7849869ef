//! Link configuration: baud rate table, byte framing and event masks.
//!
//! The framing of the link is fixed at 8 data bits, 1 stop bit and no parity.
//! Only the baud rate can be chosen, and only from [`BaudRate::SUPPORTED`].

use crate::error::UnsupportedBaudRate;

/// The number of data bits per character.
pub const DATA_BITS: u8 = 8;

/// The bytes appended by [`print_line()`](crate::Writer::print_line) and [`end_line()`](crate::Writer::end_line).
pub const LINE_TERMINATOR: [u8; 2] = [0x0D, 0x0A];

/// A supported baud rate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BaudRate {
	B1200,
	B2400,
	B4800,
	B9600,
	B57600,
	B115200,
	B230400,
	B460800,
	B921600,
}

impl BaudRate {
	/// All supported baud rates, in ascending order.
	pub const SUPPORTED: [BaudRate; 9] = [
		BaudRate::B1200,
		BaudRate::B2400,
		BaudRate::B4800,
		BaudRate::B9600,
		BaudRate::B57600,
		BaudRate::B115200,
		BaudRate::B230400,
		BaudRate::B460800,
		BaudRate::B921600,
	];

	/// Look up a baud rate in bits per second.
	pub fn from_bits_per_second(bits_per_second: u32) -> Option<Self> {
		Self::SUPPORTED.into_iter().find(|rate| rate.native() == bits_per_second)
	}

	/// The speed code to program into the device.
	///
	/// Rates up to 115200 have a named constant on Windows (`CBR_*`) that equals the numeric rate.
	/// The faster rates have no named constant, but the driver accepts the plain number.
	pub fn native(self) -> u32 {
		match self {
			Self::B1200 => 1200,
			Self::B2400 => 2400,
			Self::B4800 => 4800,
			Self::B9600 => 9600,
			Self::B57600 => 57600,
			Self::B115200 => 115200,
			Self::B230400 => 230400,
			Self::B460800 => 460800,
			Self::B921600 => 921600,
		}
	}

	/// The baud rate in bits per second.
	pub fn bits_per_second(self) -> u32 {
		self.native()
	}
}

impl std::fmt::Display for BaudRate {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}", self.bits_per_second())
	}
}

/// Validated link parameters for a single device.
///
/// Constructing a [`LinkConfig`] is the only place the baud rate is validated,
/// so a channel never touches the device with an unsupported rate.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LinkConfig {
	device: String,
	baud_rate: BaudRate,
}

impl LinkConfig {
	/// Create a link configuration for the named device.
	pub fn new(device: impl Into<String>, baud_rate: u32) -> Result<Self, UnsupportedBaudRate> {
		let device = device.into();
		let baud_rate = UnsupportedBaudRate::check(&device, baud_rate)?;
		Ok(Self { device, baud_rate })
	}

	/// The platform specific name of the device.
	pub fn device(&self) -> &str {
		&self.device
	}

	/// The baud rate of the link.
	pub fn baud_rate(&self) -> BaudRate {
		self.baud_rate
	}
}

/// A set of device conditions that complete a pending event wait.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct EventMask(u8);

impl EventMask {
	/// A character was received and placed in the input buffer.
	pub const RECEIVE_CHAR: Self = Self(0x01);

	/// The last character in the output buffer was sent.
	pub const TRANSMIT_EMPTY: Self = Self(0x02);

	/// The mask armed on the device after every read and write.
	///
	/// The receive and write paths re-arm this same value,
	/// so interleaved re-arms always leave the device in the same state.
	pub const DUPLEX: Self = Self(Self::RECEIVE_CHAR.0 | Self::TRANSMIT_EMPTY.0);

	/// Check if all events in `other` are also in `self`.
	pub fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}
}

impl std::ops::BitOr for EventMask {
	type Output = Self;

	fn bitor(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}
}
