//! The background receive task.
//!
//! The task repeatedly waits for incoming data, reads what is available and hands it to the listener.
//! Any error in that cycle stops the task: it is reported to the log and not retried.

use crate::channel::{rearm_events, Writer};
use crate::device::{SerialDevice, WaitStatus};
use crate::error::{DeviceError, ReceiveError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// The maximum number of bytes handed to the listener in one call.
///
/// Anything beyond this stays in the device and is delivered by the next iteration.
pub const RECEIVE_BUFFER_SIZE: usize = 4096;

/// How long a single iteration waits for data.
///
/// This also bounds how long closing a channel waits for the receive task.
pub const RECEIVE_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Callback invoked by the receive task with every chunk of received data.
///
/// The [`Writer`] can be used to answer on the same channel, for example to echo the data.
pub type Listener<D> = Box<dyn FnMut(&[u8], &Writer<D>) + Send>;

/// Handle to a running receive task.
pub(crate) struct ReceiveTask {
	device_name: Arc<str>,
	running: Arc<AtomicBool>,
	thread: Option<JoinHandle<()>>,
}

/// Clears the running flag when the task exits, also when the listener panics.
struct ClearOnExit<'a>(&'a AtomicBool);

impl Drop for ClearOnExit<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

impl ReceiveTask {
	pub(crate) fn spawn<D: SerialDevice>(device: Arc<D>, writer: Writer<D>, listener: Listener<D>) -> std::io::Result<Self> {
		let device_name = writer.shared_name();
		let running = Arc::new(AtomicBool::new(true));
		let thread = std::thread::Builder::new()
			.name(format!("receive {}", device_name))
			.spawn({
				let running = running.clone();
				move || run(&*device, &writer, listener, &running)
			})?;

		Ok(Self {
			device_name,
			running,
			thread: Some(thread),
		})
	}

	pub(crate) fn is_running(&self) -> bool {
		self.running.load(Ordering::Acquire)
	}

	/// Ask the task to stop and wait for it to exit.
	///
	/// Returns within one [`RECEIVE_WAIT_TIMEOUT`] unless the listener is busy.
	/// Calling this again, or after the task stopped on an error, does nothing.
	pub(crate) fn stop(&mut self) {
		self.running.store(false, Ordering::Release);
		if let Some(thread) = self.thread.take() {
			if thread.join().is_err() {
				error!("receive task for {} panicked", self.device_name);
			}
		}
	}
}

impl Drop for ReceiveTask {
	fn drop(&mut self) {
		self.stop();
	}
}

fn run<D: SerialDevice>(device: &D, writer: &Writer<D>, mut listener: Listener<D>, running: &AtomicBool) {
	let _clear = ClearOnExit(running);
	let name = writer.device_name();
	let mut buffer = vec![0u8; RECEIVE_BUFFER_SIZE];
	debug!("receive task started for {}", name);

	while running.load(Ordering::Acquire) {
		match receive_once(device, name, &mut buffer) {
			Ok(0) => (),
			Ok(count) => {
				trace!("received from {}: {:02X?}", name, &buffer[..count]);
				listener(&buffer[..count], writer);
			},
			Err(e) => {
				error!("{}, stopping the receive task", e);
				break;
			},
		}
	}

	debug!("receive task stopped for {}", name);
}

/// Perform one wait-then-read cycle.
///
/// Returns the number of bytes placed in `buffer`, which is zero if the wait timed out.
pub(crate) fn receive_once<D: SerialDevice>(device: &D, name: &str, buffer: &mut [u8]) -> Result<usize, ReceiveError<D::Error>> {
	let mut token = device.create_token().map_err(|e| {
		rearm_events(device, name);
		ReceiveError::Wait(DeviceError::new(name, e))
	})?;

	let status = match device.wait_event(&mut token, RECEIVE_WAIT_TIMEOUT) {
		Ok(status) => status,
		Err(e) => {
			discard_token(device, name, token);
			rearm_events(device, name);
			return Err(ReceiveError::Wait(DeviceError::new(name, e)));
		},
	};

	let count = match status {
		WaitStatus::TimedOut => 0,
		WaitStatus::Signalled => match device.read(&mut token, buffer) {
			Ok(count) => count,
			Err(e) => {
				discard_token(device, name, token);
				rearm_events(device, name);
				return Err(ReceiveError::Read(DeviceError::new(name, e)));
			},
		},
	};

	let released = device.release_token(token);
	rearm_events(device, name);
	released.map_err(|e| ReceiveError::ResourceRelease(DeviceError::new(name, e)))?;
	Ok(count)
}

/// Release a token on an error path, where the original error takes precedence.
pub(crate) fn discard_token<D: SerialDevice>(device: &D, name: &str, token: D::Token) {
	if let Err(e) = device.release_token(token) {
		warn!("failed to release wait token for {}: {}", name, e);
	}
}
