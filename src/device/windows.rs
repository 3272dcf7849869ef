//! Device implementation using overlapped I/O on Windows.
//!
//! Every read and write gets its own event object and `OVERLAPPED` structure,
//! so the receive task and writers never wait on each other's completion.

use crate::device::{SerialDevice, WaitStatus};
use crate::link::{EventMask, LinkConfig, DATA_BITS};
use std::{
	fs::{File, OpenOptions},
	io::{Error as IoError, Result as IoResult},
	os::windows::{fs::OpenOptionsExt, io::AsRawHandle},
	path::{Path, PathBuf},
	time::Duration,
};
use windows::{
	core::PCSTR,
	Win32::{
		Devices::Communication::{
			GetCommState, SetCommMask, SetCommState, SetCommTimeouts, WaitCommEvent, COMMTIMEOUTS, COMM_EVENT_MASK,
			DCB, EV_RXCHAR, EV_TXEMPTY, NOPARITY, ONESTOPBIT,
		},
		Foundation::{CloseHandle, ERROR_IO_PENDING, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT},
		Storage::FileSystem::{ReadFile, WriteFile, FILE_FLAG_OVERLAPPED},
		System::{
			Threading::{CreateEventA, ResetEvent, WaitForSingleObject},
			IO::{CancelIoEx, GetOverlappedResult, OVERLAPPED},
		},
	},
};

/// A serial port opened for overlapped I/O.
#[derive(Debug)]
pub struct OverlappedPort {
	file: File,
}

/// A pending overlapped operation: one event object and one `OVERLAPPED` structure.
///
/// The structure is boxed because the kernel keeps a pointer to it while an operation is in flight.
pub struct PendingIo {
	port: HANDLE,
	event: HANDLE,
	overlapped: OVERLAPPED,
	events: COMM_EVENT_MASK,
	in_flight: bool,
	closed: bool,
}

impl OverlappedPort {
	/// Open a serial port by name, for example "COM5".
	///
	/// The name is opened in the Win32 device namespace, so ports above COM9 work too.
	pub fn open(name: impl AsRef<Path>) -> IoResult<Self> {
		let mut path = PathBuf::from(r"\\.");
		path.push(name);

		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(false)
			.share_mode(0)
			.custom_flags(FILE_FLAG_OVERLAPPED.0)
			.open(&path)?;

		Ok(Self { file })
	}

	fn handle(&self) -> HANDLE {
		HANDLE(self.file.as_raw_handle() as isize)
	}
}

fn native_mask(mask: EventMask) -> COMM_EVENT_MASK {
	let mut native = COMM_EVENT_MASK(0);
	if mask.contains(EventMask::RECEIVE_CHAR) {
		native = native | EV_RXCHAR;
	}
	if mask.contains(EventMask::TRANSMIT_EMPTY) {
		native = native | EV_TXEMPTY;
	}
	native
}

fn is_pending(error: &IoError) -> bool {
	error.raw_os_error() == Some(ERROR_IO_PENDING.0 as i32)
}

impl PendingIo {
	fn create(port: HANDLE) -> IoResult<Box<Self>> {
		let event = unsafe {
			CreateEventA(
				None, // security attributes
				true, // manual reset
				false, // initially signalled
				PCSTR(std::ptr::null()),
			)
			.map_err(|_| IoError::last_os_error())?
		};
		let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
		overlapped.hEvent = event;
		Ok(Box::new(Self {
			port,
			event,
			overlapped,
			events: COMM_EVENT_MASK(0),
			in_flight: false,
			closed: false,
		}))
	}

	/// Prepare the structure for a new operation.
	fn reset(&mut self) -> IoResult<()> {
		unsafe { ResetEvent(self.event).map_err(|_| IoError::last_os_error())? };
		self.overlapped = unsafe { std::mem::zeroed() };
		self.overlapped.hEvent = self.event;
		Ok(())
	}

	/// Block until the current operation completes.
	fn complete(&mut self) -> IoResult<usize> {
		let mut transferred = 0u32;
		let result = unsafe {
			GetOverlappedResult(self.port, &self.overlapped, &mut transferred, true).map_err(|_| IoError::last_os_error())
		};
		self.in_flight = false;
		result.map(|()| transferred as usize)
	}

	/// Cancel any operation still in flight and close the event object.
	fn finish(&mut self) -> IoResult<()> {
		if self.closed {
			return Ok(());
		}
		if self.in_flight {
			unsafe {
				// Cancelling fails if the operation completed in the meantime, which is fine.
				let _ = CancelIoEx(self.port, Some(&self.overlapped));
			}
			let _ = self.complete();
		}
		self.closed = true;
		unsafe { CloseHandle(self.event).map_err(|_| IoError::last_os_error()) }
	}
}

impl Drop for PendingIo {
	fn drop(&mut self) {
		let _ = self.finish();
	}
}

impl SerialDevice for OverlappedPort {
	type Error = IoError;

	type Settings = DCB;

	type Token = Box<PendingIo>;

	fn read_settings(&self) -> Result<Self::Settings, Self::Error> {
		let mut dcb = DCB {
			DCBlength: std::mem::size_of::<DCB>() as u32,
			..Default::default()
		};
		unsafe { GetCommState(self.handle(), &mut dcb).map_err(|_| IoError::last_os_error())? };
		Ok(dcb)
	}

	fn apply_settings(&mut self, mut settings: Self::Settings, link: &LinkConfig) -> Result<(), Self::Error> {
		settings.BaudRate = link.baud_rate().native();
		settings.ByteSize = DATA_BITS;
		settings.StopBits = ONESTOPBIT;
		settings.Parity = NOPARITY;
		unsafe { SetCommState(self.handle(), &settings).map_err(|_| IoError::last_os_error()) }
	}

	fn set_poll_timeouts(&mut self) -> Result<(), Self::Error> {
		// A read returns immediately with whatever is in the input buffer.
		let timeouts = COMMTIMEOUTS {
			ReadIntervalTimeout: u32::MAX,
			ReadTotalTimeoutMultiplier: 0,
			ReadTotalTimeoutConstant: 0,
			WriteTotalTimeoutMultiplier: 0,
			WriteTotalTimeoutConstant: 0,
		};
		unsafe { SetCommTimeouts(self.handle(), &timeouts).map_err(|_| IoError::last_os_error()) }
	}

	fn set_event_mask(&self, mask: EventMask) -> Result<(), Self::Error> {
		unsafe { SetCommMask(self.handle(), native_mask(mask)).map_err(|_| IoError::last_os_error()) }
	}

	fn create_token(&self) -> Result<Self::Token, Self::Error> {
		PendingIo::create(self.handle())
	}

	fn wait_event(&self, token: &mut Self::Token, timeout: Duration) -> Result<WaitStatus, Self::Error> {
		token.reset()?;
		let token = &mut **token;
		let started = unsafe {
			WaitCommEvent(self.handle(), &mut token.events, Some(&mut token.overlapped)).map_err(|_| IoError::last_os_error())
		};
		match started {
			Ok(()) => return Ok(WaitStatus::Signalled),
			Err(e) if is_pending(&e) => token.in_flight = true,
			Err(e) => return Err(e),
		}

		let timeout_ms = timeout.as_millis().try_into().unwrap_or(u32::MAX - 1);
		let status = unsafe { WaitForSingleObject(token.event, timeout_ms) };
		if status == WAIT_OBJECT_0 {
			token.complete()?;
			Ok(WaitStatus::Signalled)
		} else if status == WAIT_TIMEOUT {
			// The wait stays in flight, releasing the token cancels it.
			Ok(WaitStatus::TimedOut)
		} else {
			Err(IoError::last_os_error())
		}
	}

	fn read(&self, token: &mut Self::Token, buffer: &mut [u8]) -> Result<usize, Self::Error> {
		token.reset()?;
		let token = &mut **token;
		let started = unsafe {
			ReadFile(self.handle(), Some(buffer), None, Some(&mut token.overlapped)).map_err(|_| IoError::last_os_error())
		};
		match started {
			Ok(()) => token.complete(),
			Err(e) if is_pending(&e) => {
				token.in_flight = true;
				token.complete()
			},
			Err(e) => Err(e),
		}
	}

	fn write_all(&self, token: &mut Self::Token, mut buffer: &[u8]) -> Result<(), Self::Error> {
		while !buffer.is_empty() {
			token.reset()?;
			let token = &mut **token;
			let started = unsafe {
				WriteFile(self.handle(), Some(buffer), None, Some(&mut token.overlapped)).map_err(|_| IoError::last_os_error())
			};
			let written = match started {
				Ok(()) => token.complete()?,
				Err(e) if is_pending(&e) => {
					token.in_flight = true;
					token.complete()?
				},
				Err(e) => return Err(e),
			};
			if written == 0 {
				return Err(std::io::ErrorKind::WriteZero.into());
			}
			buffer = &buffer[written..];
		}
		Ok(())
	}

	fn release_token(&self, mut token: Self::Token) -> Result<(), Self::Error> {
		token.finish()
	}
}
