use crate::device::SerialDevice;
use crate::error::{DeviceError, OpenError, WriteError};
use crate::link::{BaudRate, EventMask, LinkConfig, LINE_TERMINATOR};
use crate::receiver::{discard_token, Listener, ReceiveTask};
use std::sync::{Arc, Weak};

#[cfg(any(windows, feature = "serial2"))]
use crate::device::NativePort;

/// A duplex byte channel over a serial device.
///
/// The channel owns the device exclusively.
/// Writes block the calling thread until the device accepted all bytes.
/// If the channel was opened with a listener,
/// a background receive task delivers incoming data to the listener until the channel is closed.
///
/// Dropping the channel stops the receive task and releases the device, just like [`Self::close()`].
pub struct SerialChannel<D: SerialDevice> {
	config: LinkConfig,
	device: Option<Arc<D>>,
	writer: Writer<D>,
	receiver: Option<ReceiveTask>,
}

/// A cloneable handle for writing to a [`SerialChannel`].
///
/// The handle does not keep the device open:
/// once the channel is closed, writes fail with [`WriteError::Closed`].
pub struct Writer<D: SerialDevice> {
	device: Weak<D>,
	name: Arc<str>,
}

impl<D: SerialDevice> Clone for Writer<D> {
	fn clone(&self) -> Self {
		Self {
			device: self.device.clone(),
			name: self.name.clone(),
		}
	}
}

impl<D: SerialDevice> core::fmt::Debug for Writer<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Writer")
			.field("device", &self.name)
			.field("open", &(self.device.strong_count() > 0))
			.finish()
	}
}

impl<D: SerialDevice> core::fmt::Debug for SerialChannel<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("SerialChannel")
			.field("device", &self.config.device())
			.field("baud_rate", &self.config.baud_rate())
			.field("receiving", &self.is_receiving())
			.finish_non_exhaustive()
	}
}

#[cfg(any(windows, feature = "serial2"))]
impl SerialChannel<NativePort> {
	/// Open a serial device with the receiver disabled.
	///
	/// The baud rate must be one of [`BaudRate::SUPPORTED`].
	pub fn open(device_name: &str, baud_rate: u32) -> Result<Self, OpenError> {
		Self::open_with(device_name, baud_rate, |name| NativePort::open(name), None)
	}

	/// Open a serial device and start a receive task that passes all incoming data to `listener`.
	pub fn open_with_listener<F>(device_name: &str, baud_rate: u32, listener: F) -> Result<Self, OpenError>
	where
		F: FnMut(&[u8], &Writer<NativePort>) + Send + 'static,
	{
		Self::open_with(device_name, baud_rate, |name| NativePort::open(name), Some(Box::new(listener)))
	}
}

impl<D: SerialDevice> SerialChannel<D> {
	/// Open a device with a custom backend.
	///
	/// The baud rate is validated before `open_device` is called,
	/// so an unsupported rate never touches the device.
	pub fn open_with<O>(
		device_name: &str,
		baud_rate: u32,
		open_device: O,
		listener: Option<Listener<D>>,
	) -> Result<Self, OpenError<D::Error>>
	where
		O: FnOnce(&str) -> Result<D, D::Error>,
	{
		let config = LinkConfig::new(device_name, baud_rate)?;
		let device = open_device(config.device()).map_err(|e| OpenError::DeviceOpen(DeviceError::new(config.device(), e)))?;
		Self::with_device(config, device, listener)
	}

	/// Configure an already opened device and wrap it in a channel.
	pub fn with_device(config: LinkConfig, mut device: D, listener: Option<Listener<D>>) -> Result<Self, OpenError<D::Error>> {
		let name = config.device();
		let state_error = |e: D::Error| OpenError::DeviceState(DeviceError::new(name, e));

		let settings = device.read_settings().map_err(state_error)?;
		device.apply_settings(settings, &config).map_err(state_error)?;
		device.set_poll_timeouts().map_err(state_error)?;
		device.set_event_mask(EventMask::DUPLEX).map_err(state_error)?;
		debug!("opened {} at {} baud", name, config.baud_rate());

		let device = Arc::new(device);
		let writer = Writer {
			device: Arc::downgrade(&device),
			name: name.into(),
		};

		let receiver = match listener {
			Some(listener) => {
				let task = ReceiveTask::spawn(device.clone(), writer.clone(), listener).map_err(OpenError::SpawnReceiver)?;
				Some(task)
			},
			None => None,
		};

		Ok(Self {
			config,
			device: Some(device),
			writer,
			receiver,
		})
	}

	/// The name of the device.
	pub fn device_name(&self) -> &str {
		self.config.device()
	}

	/// The baud rate of the link.
	pub fn baud_rate(&self) -> BaudRate {
		self.config.baud_rate()
	}

	/// Check if the receive task is running.
	///
	/// This is `false` if the channel was opened without a listener,
	/// or if the receive task stopped because of an error.
	pub fn is_receiving(&self) -> bool {
		self.receiver.as_ref().map_or(false, |receiver| receiver.is_running())
	}

	/// Get a handle that can write to this channel from other threads.
	pub fn writer(&self) -> Writer<D> {
		self.writer.clone()
	}

	/// Write all bytes to the device. See [`Writer::write()`].
	pub fn write(&self, bytes: &[u8]) -> Result<(), WriteError<D::Error>> {
		self.writer.write(bytes)
	}

	/// Write a single byte to the device.
	pub fn write_byte(&self, byte: u8) -> Result<(), WriteError<D::Error>> {
		self.writer.write_byte(byte)
	}

	/// Write the UTF-8 bytes of a string to the device.
	pub fn print(&self, text: &str) -> Result<(), WriteError<D::Error>> {
		self.writer.print(text)
	}

	/// Write a string followed by [`LINE_TERMINATOR`].
	pub fn print_line(&self, text: &str) -> Result<(), WriteError<D::Error>> {
		self.writer.print_line(text)
	}

	/// Write [`LINE_TERMINATOR`].
	pub fn end_line(&self) -> Result<(), WriteError<D::Error>> {
		self.writer.end_line()
	}

	/// Stop the receive task and release the device.
	pub fn close(mut self) {
		self.shutdown();
	}

	fn shutdown(&mut self) {
		if let Some(mut receiver) = self.receiver.take() {
			receiver.stop();
		}
		if self.device.take().is_some() {
			debug!("closed {}", self.config.device());
		}
	}
}

impl<D: SerialDevice> Drop for SerialChannel<D> {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl<D: SerialDevice> Writer<D> {
	/// The name of the device.
	pub fn device_name(&self) -> &str {
		&self.name
	}

	pub(crate) fn shared_name(&self) -> Arc<str> {
		self.name.clone()
	}

	/// Write all bytes to the device.
	///
	/// Blocks until the device accepted all bytes, they may not be transmitted yet when this returns.
	/// Writing an empty slice does nothing.
	pub fn write(&self, bytes: &[u8]) -> Result<(), WriteError<D::Error>> {
		if bytes.is_empty() {
			return Ok(());
		}

		let device = self.device.upgrade().ok_or_else(|| WriteError::Closed {
			device: self.name.to_string(),
		})?;
		let device = &*device;

		let mut token = device.create_token().map_err(|e| {
			rearm_events(device, &self.name);
			WriteError::Write(DeviceError::new(&self.name, e))
		})?;

		if let Err(e) = device.write_all(&mut token, bytes) {
			discard_token(device, &self.name, token);
			rearm_events(device, &self.name);
			return Err(WriteError::Write(DeviceError::new(&self.name, e)));
		}

		let released = device.release_token(token);
		rearm_events(device, &self.name);
		released.map_err(|e| WriteError::ResourceRelease(DeviceError::new(&self.name, e)))?;

		trace!("wrote to {}: {:02X?}", self.name, bytes);
		Ok(())
	}

	/// Write a single byte to the device.
	pub fn write_byte(&self, byte: u8) -> Result<(), WriteError<D::Error>> {
		self.write(&[byte])
	}

	/// Write the UTF-8 bytes of a string to the device.
	pub fn print(&self, text: &str) -> Result<(), WriteError<D::Error>> {
		self.write(text.as_bytes())
	}

	/// Write a string followed by [`LINE_TERMINATOR`].
	///
	/// The text and the terminator are written with two separate writes.
	pub fn print_line(&self, text: &str) -> Result<(), WriteError<D::Error>> {
		self.print(text)?;
		self.end_line()
	}

	/// Write [`LINE_TERMINATOR`].
	pub fn end_line(&self) -> Result<(), WriteError<D::Error>> {
		self.write(&LINE_TERMINATOR)
	}
}

/// Re-arm the device events after a read or write, whether it succeeded or not.
pub(crate) fn rearm_events<D: SerialDevice>(device: &D, name: &str) {
	if let Err(e) = device.set_event_mask(EventMask::DUPLEX) {
		warn!("failed to re-arm events on {}: {}", name, e);
	}
}
