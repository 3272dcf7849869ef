//! Duplex byte channel over a serial port.
//!
//! A [`SerialChannel`] opens a serial device, configures the link (baud rate, 8N1 framing)
//! and exchanges raw bytes with it.
//! Writes are blocking calls on the caller's thread.
//! Optionally, a background receive task delivers incoming data to a listener callback.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use serial_channel::SerialChannel;
//!
//! let channel = SerialChannel::open_with_listener("COM5", 57600, |data, writer| {
//! 	// Echo everything back.
//! 	let _ = writer.write(data);
//! })?;
//! channel.print_line("Hello World!")?;
//! # Ok(())
//! # }
//! ```
//!
//! The device backend is abstracted by the [`SerialDevice`] trait.
//! On Windows the channel uses overlapped I/O directly,
//! on other platforms it uses the `serial2` crate.

#[macro_use]
extern crate log;

pub mod device;
pub mod link;

mod channel;
mod error;
mod receiver;

pub use channel::{SerialChannel, Writer};
pub use device::{SerialDevice, WaitStatus};
pub use error::{DeviceError, OpenError, ReceiveError, UnsupportedBaudRate, WriteError};
pub use link::{BaudRate, EventMask, LinkConfig, LINE_TERMINATOR};
pub use receiver::{Listener, RECEIVE_BUFFER_SIZE, RECEIVE_WAIT_TIMEOUT};

#[cfg(any(windows, feature = "serial2"))]
pub use device::NativePort;
