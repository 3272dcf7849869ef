use crate::link::BaudRate;

/// An error that can occur while opening a [`SerialChannel`](crate::SerialChannel).
#[derive(Debug)]
pub enum OpenError<E = std::io::Error> {
	UnsupportedBaudRate(UnsupportedBaudRate),
	DeviceOpen(DeviceError<E>),
	DeviceState(DeviceError<E>),
	SpawnReceiver(std::io::Error),
}

/// An error that stopped the receive task.
#[derive(Debug)]
pub enum ReceiveError<E = std::io::Error> {
	/// Waiting for the "data available" event failed.
	Wait(DeviceError<E>),
	/// Reading the available data failed.
	Read(DeviceError<E>),
	/// The wait token of the read could not be released.
	ResourceRelease(DeviceError<E>),
}

/// An error that can occur during a write.
#[derive(Debug)]
pub enum WriteError<E = std::io::Error> {
	/// The write or the wait for its completion failed.
	Write(DeviceError<E>),
	/// The wait token of the write could not be released.
	ResourceRelease(DeviceError<E>),
	/// The channel was closed and the device released.
	Closed { device: String },
}

/// The requested baud rate is not in the supported set.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnsupportedBaudRate {
	pub device: String,
	pub baud_rate: u32,
}

/// An error reported by the operating system for a specific device.
#[derive(Debug)]
pub struct DeviceError<E = std::io::Error> {
	/// The name of the device that the error occurred on.
	pub device: String,
	/// The underlying error reported by the device backend.
	pub cause: E,
}

impl UnsupportedBaudRate {
	pub fn check(device: &str, baud_rate: u32) -> Result<BaudRate, Self> {
		BaudRate::from_bits_per_second(baud_rate).ok_or_else(|| Self {
			device: device.to_string(),
			baud_rate,
		})
	}
}

impl<E> DeviceError<E> {
	pub fn new(device: &str, cause: E) -> Self {
		Self {
			device: device.to_string(),
			cause,
		}
	}
}

impl DeviceError<std::io::Error> {
	/// The raw OS error code, if the error came from the operating system.
	pub fn os_error_code(&self) -> Option<i32> {
		self.cause.raw_os_error()
	}
}

impl<E> OpenError<E> {
	/// The name of the device the error relates to, if known.
	pub fn device(&self) -> Option<&str> {
		match self {
			Self::UnsupportedBaudRate(e) => Some(&e.device),
			Self::DeviceOpen(e) => Some(&e.device),
			Self::DeviceState(e) => Some(&e.device),
			Self::SpawnReceiver(_) => None,
		}
	}
}

impl<E> WriteError<E> {
	/// The name of the device the error relates to.
	pub fn device(&self) -> &str {
		match self {
			Self::Write(e) => &e.device,
			Self::ResourceRelease(e) => &e.device,
			Self::Closed { device } => device,
		}
	}

	/// The error reported by the device, if any.
	pub fn device_error(&self) -> Option<&DeviceError<E>> {
		match self {
			Self::Write(e) => Some(e),
			Self::ResourceRelease(e) => Some(e),
			Self::Closed { .. } => None,
		}
	}
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for OpenError<E> {}
impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for ReceiveError<E> {}
impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for WriteError<E> {}
impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for DeviceError<E> {}
impl std::error::Error for UnsupportedBaudRate {}

impl<E> From<UnsupportedBaudRate> for OpenError<E> {
	fn from(other: UnsupportedBaudRate) -> Self {
		Self::UnsupportedBaudRate(other)
	}
}

impl<E: std::fmt::Display> std::fmt::Display for OpenError<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::UnsupportedBaudRate(e) => write!(f, "{}", e),
			Self::DeviceOpen(e) => write!(f, "unable to open device {}: {}", e.device, e.cause),
			Self::DeviceState(e) => write!(f, "unable to configure device {}: {}", e.device, e.cause),
			Self::SpawnReceiver(e) => write!(f, "failed to start receive task: {}", e),
		}
	}
}

impl<E: std::fmt::Display> std::fmt::Display for ReceiveError<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Wait(e) => write!(f, "waiting for read event on {} failed: {}", e.device, e.cause),
			Self::Read(e) => write!(f, "failed to read from {}: {}", e.device, e.cause),
			Self::ResourceRelease(e) => write!(f, "failed to release read event for {}: {}", e.device, e.cause),
		}
	}
}

impl<E: std::fmt::Display> std::fmt::Display for WriteError<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Write(e) => write!(f, "failed to write to {}: {}", e.device, e.cause),
			Self::ResourceRelease(e) => write!(f, "failed to release write event for {}: {}", e.device, e.cause),
			Self::Closed { device } => write!(f, "failed to write to {}: channel is closed", device),
		}
	}
}

impl<E: std::fmt::Display> std::fmt::Display for DeviceError<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}: {}", self.device, self.cause)
	}
}

impl std::fmt::Display for UnsupportedBaudRate {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "invalid baud rate {} for {}, supported values are ", self.baud_rate, self.device)?;
		for (i, rate) in BaudRate::SUPPORTED.iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{}", rate)?;
		}
		Ok(())
	}
}
