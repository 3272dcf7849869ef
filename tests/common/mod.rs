#![allow(dead_code)]

mod mock_device;

#[allow(unused_imports)]
pub use mock_device::{Failures, MockDevice};

use std::time::{Duration, Instant};

/// Poll a condition until it holds or the timeout expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + timeout;
	loop {
		if condition() {
			return true;
		}
		if Instant::now() >= deadline {
			return false;
		}
		std::thread::sleep(Duration::from_millis(1));
	}
}
