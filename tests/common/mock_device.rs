use log::trace;
use serial_channel::{EventMask, LinkConfig, SerialDevice, WaitStatus};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Steps of the device protocol that can be made to fail.
#[derive(Debug, Default, Clone)]
pub struct Failures {
	pub read_settings: bool,
	pub apply_settings: bool,
	pub create: bool,
	pub wait: bool,
	pub read: bool,
	pub write: bool,
	pub release: bool,
}

/// Everything the mock device observed.
#[derive(Debug, Default)]
pub struct MockState {
	pub inbound: VecDeque<u8>,
	pub writes: Vec<Vec<u8>>,
	pub masks: Vec<EventMask>,
	pub baud_rate: Option<u32>,
	pub poll_timeouts: bool,
	pub settings_reads: usize,
	pub live_tokens: usize,
	pub waits: usize,
	pub reads: usize,
	pub fail: Failures,
}

/// In-memory serial device.
///
/// Clones share the same state, so a test can keep a clone to inspect the device
/// after handing another clone to a channel.
#[derive(Clone, Default)]
pub struct MockDevice {
	shared: Arc<(Mutex<MockState>, Condvar)>,
}

pub struct MockToken;

fn os_error(code: i32) -> std::io::Error {
	std::io::Error::from_raw_os_error(code)
}

impl MockDevice {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn state(&self) -> MutexGuard<'_, MockState> {
		self.shared.0.lock().unwrap()
	}

	/// Make data available for the receive task.
	pub fn send(&self, data: &[u8]) {
		self.state().inbound.extend(data);
		self.shared.1.notify_all();
	}

	/// Change the failure injection, waking up a pending wait.
	pub fn fail(&self, update: impl FnOnce(&mut Failures)) {
		update(&mut self.state().fail);
		self.shared.1.notify_all();
	}

	/// All individual write calls, in order.
	pub fn write_calls(&self) -> Vec<Vec<u8>> {
		self.state().writes.clone()
	}

	/// All written bytes, concatenated.
	pub fn written(&self) -> Vec<u8> {
		self.state().writes.concat()
	}
}

impl SerialDevice for MockDevice {
	type Error = std::io::Error;

	type Settings = Option<u32>;

	type Token = MockToken;

	fn read_settings(&self) -> Result<Self::Settings, Self::Error> {
		let mut state = self.state();
		if state.fail.read_settings {
			return Err(os_error(5));
		}
		state.settings_reads += 1;
		Ok(state.baud_rate)
	}

	fn apply_settings(&mut self, _settings: Self::Settings, link: &LinkConfig) -> Result<(), Self::Error> {
		let mut state = self.state();
		if state.fail.apply_settings {
			return Err(os_error(87));
		}
		state.baud_rate = Some(link.baud_rate().native());
		Ok(())
	}

	fn set_poll_timeouts(&mut self) -> Result<(), Self::Error> {
		self.state().poll_timeouts = true;
		Ok(())
	}

	fn set_event_mask(&self, mask: EventMask) -> Result<(), Self::Error> {
		self.state().masks.push(mask);
		Ok(())
	}

	fn create_token(&self) -> Result<Self::Token, Self::Error> {
		let mut state = self.state();
		if state.fail.create {
			return Err(os_error(8));
		}
		state.live_tokens += 1;
		Ok(MockToken)
	}

	fn wait_event(&self, _token: &mut Self::Token, timeout: Duration) -> Result<WaitStatus, Self::Error> {
		let deadline = Instant::now() + timeout;
		let (lock, condvar) = &*self.shared;
		let mut state = lock.lock().unwrap();
		state.waits += 1;
		loop {
			if state.fail.wait {
				return Err(os_error(995));
			}
			if !state.inbound.is_empty() {
				return Ok(WaitStatus::Signalled);
			}
			let now = Instant::now();
			if now >= deadline {
				return Ok(WaitStatus::TimedOut);
			}
			state = condvar.wait_timeout(state, deadline - now).unwrap().0;
		}
	}

	fn read(&self, _token: &mut Self::Token, buffer: &mut [u8]) -> Result<usize, Self::Error> {
		let mut state = self.state();
		if state.fail.read {
			return Err(os_error(1117));
		}
		state.reads += 1;
		let count = buffer.len().min(state.inbound.len());
		for (target, byte) in buffer.iter_mut().zip(state.inbound.drain(..count)) {
			*target = byte;
		}
		trace!("mock read: {:02X?}", &buffer[..count]);
		Ok(count)
	}

	fn write_all(&self, _token: &mut Self::Token, buffer: &[u8]) -> Result<(), Self::Error> {
		let mut state = self.state();
		if state.fail.write {
			return Err(os_error(31));
		}
		state.writes.push(buffer.to_vec());
		Ok(())
	}

	fn release_token(&self, _token: Self::Token) -> Result<(), Self::Error> {
		let mut state = self.state();
		state.live_tokens -= 1;
		if state.fail.release {
			return Err(os_error(6));
		}
		Ok(())
	}
}
