use assert2::{assert, let_assert};
use serial_channel::{BaudRate, EventMask, Listener, OpenError, SerialChannel, WriteError, LINE_TERMINATOR};
use test_log::test;

mod common;
use common::{Failures, MockDevice};

fn open(device: &MockDevice, baud_rate: u32, listener: Option<Listener<MockDevice>>) -> Result<SerialChannel<MockDevice>, OpenError> {
	let device = device.clone();
	SerialChannel::open_with("COM5", baud_rate, move |_| Ok(device), listener)
}

#[test]
fn every_supported_baud_rate_is_applied() {
	for rate in BaudRate::SUPPORTED {
		let device = MockDevice::new();
		let_assert!(Ok(channel) = open(&device, rate.bits_per_second(), None));
		assert!(channel.baud_rate() == rate);
		assert!(channel.device_name() == "COM5");

		let state = device.state();
		assert!(state.baud_rate == Some(rate.bits_per_second()));
		assert!(state.poll_timeouts);
		assert!(state.masks == [EventMask::DUPLEX]);
	}
}

#[test]
fn unsupported_baud_rate_never_touches_the_device() {
	let device = MockDevice::new();
	let mut opened = false;
	let result = SerialChannel::open_with(
		"COM5",
		19200,
		|_| {
			opened = true;
			Ok(device.clone())
		},
		None,
	);

	let_assert!(Err(OpenError::UnsupportedBaudRate(e)) = result);
	assert!(e.device == "COM5");
	assert!(e.baud_rate == 19200);
	assert!(!opened);

	let state = device.state();
	assert!(state.settings_reads == 0);
	assert!(state.baud_rate.is_none());
	assert!(state.masks.is_empty());
}

#[test]
fn open_failure_reports_device_and_os_error() {
	let result = SerialChannel::<MockDevice>::open_with("COM9", 9600, |_| Err(std::io::Error::from_raw_os_error(2)), None);
	let_assert!(Err(OpenError::DeviceOpen(e)) = result);
	assert!(e.device == "COM9");
	assert!(e.os_error_code() == Some(2));
}

#[test]
fn unreadable_device_state_fails_open() {
	let device = MockDevice::new();
	device.fail(|f| f.read_settings = true);
	let_assert!(Err(OpenError::DeviceState(e)) = open(&device, 9600, None));
	assert!(e.device == "COM5");
	assert!(e.os_error_code() == Some(5));
}

#[test]
fn rejected_settings_fail_open() {
	let device = MockDevice::new();
	device.fail(|f| f.apply_settings = true);
	let_assert!(Err(OpenError::DeviceState(e)) = open(&device, 115200, None));
	assert!(e.os_error_code() == Some(87));
	assert!(!device.state().poll_timeouts);
}

#[test]
fn write_sends_exact_bytes() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 9600, None));
	assert!(!channel.is_receiving());

	let_assert!(Ok(()) = channel.write(&[0x41, 0x42]));
	assert!(device.write_calls() == [vec![0x41, 0x42]]);

	let state = device.state();
	assert!(state.live_tokens == 0);
	assert!(state.masks == [EventMask::DUPLEX, EventMask::DUPLEX]);
}

#[test]
fn empty_write_is_a_no_op() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 9600, None));
	device.fail(|f| f.write = true);

	let_assert!(Ok(()) = channel.write(&[]));
	let_assert!(Ok(()) = channel.print(""));
	assert!(device.write_calls().is_empty());
	assert!(device.state().masks.len() == 1);
}

#[test]
fn end_line_writes_the_terminator() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 57600, None));
	let_assert!(Ok(()) = channel.end_line());
	assert!(device.write_calls() == [vec![0x0D, 0x0A]]);
	assert!(LINE_TERMINATOR == [0x0D, 0x0A]);
}

#[test]
fn print_line_writes_text_and_terminator_separately() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 57600, None));
	let_assert!(Ok(()) = channel.print_line("X"));
	assert!(device.write_calls() == [b"X".to_vec(), b"\r\n".to_vec()]);
}

#[test]
fn single_byte_and_text_writes() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 57600, None));
	let_assert!(Ok(()) = channel.write_byte(0x0A));
	let_assert!(Ok(()) = channel.print("Please type some text: "));
	assert!(device.write_calls() == [vec![0x0A], b"Please type some text: ".to_vec()]);
}

#[test]
fn write_failure_is_reported_to_the_caller() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 9600, None));
	device.fail(|f| f.write = true);

	let_assert!(Err(WriteError::Write(e)) = channel.write(b"data"));
	assert!(e.device == "COM5");
	assert!(e.os_error_code() == Some(31));

	// The token is released and the events re-armed anyway.
	let state = device.state();
	assert!(state.live_tokens == 0);
	assert!(state.masks.len() == 2);
}

#[test]
fn write_failure_takes_precedence_over_release_failure() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 9600, None));
	device.fail(|f| {
		*f = Failures {
			write: true,
			release: true,
			..Failures::default()
		}
	});

	let_assert!(Err(e) = channel.write(b"data"));
	assert!(let WriteError::Write(_) = &e);
	assert!(e.device() == "COM5");
	let_assert!(Some(cause) = e.device_error());
	assert!(cause.os_error_code() == Some(31));
	assert!(device.state().live_tokens == 0);
}

#[test]
fn token_failure_still_rearms_events() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 9600, None));
	device.fail(|f| f.create = true);

	let_assert!(Err(WriteError::Write(e)) = channel.write(b"x"));
	assert!(e.os_error_code() == Some(8));

	let state = device.state();
	assert!(state.writes.is_empty());
	assert!(state.live_tokens == 0);
	assert!(state.masks == [EventMask::DUPLEX, EventMask::DUPLEX]);
}

#[test]
fn release_failure_is_reported_after_write() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 9600, None));
	device.fail(|f| f.release = true);

	let_assert!(Err(WriteError::ResourceRelease(e)) = channel.write(b"data"));
	assert!(e.os_error_code() == Some(6));
	assert!(device.write_calls() == [b"data".to_vec()]);
	assert!(device.state().masks.len() == 2);
}

#[test]
fn writer_fails_after_close() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 9600, None));
	let writer = channel.writer();
	let_assert!(Ok(()) = writer.write(b"before"));

	channel.close();
	let_assert!(Err(e) = writer.write(b"after"));
	let_assert!(WriteError::Closed { device: name } = &e);
	assert!(name == "COM5");
	assert!(e.device_error().is_none());
	assert!(device.write_calls() == [b"before".to_vec()]);
}

#[test]
fn writers_on_other_threads() {
	let device = MockDevice::new();
	let_assert!(Ok(channel) = open(&device, 115200, None));

	let threads: Vec<_> = (0..4u8)
		.map(|i| {
			let writer = channel.writer();
			std::thread::spawn(move || writer.write(&[i; 8]))
		})
		.collect();
	for thread in threads {
		let_assert!(Ok(Ok(())) = thread.join());
	}

	let mut calls = device.write_calls();
	calls.sort();
	assert!(calls == (0..4u8).map(|i| vec![i; 8]).collect::<Vec<_>>());
}
