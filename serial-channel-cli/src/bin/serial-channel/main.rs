use serial_channel::{BaudRate, NativePort, SerialChannel, Writer};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

mod logging;
mod options;

use options::{Command, Options};

const CR: u8 = 0x0D;
const LF: u8 = 0x0A;

fn main() {
	if let Err(()) = do_main(clap::Parser::parse()) {
		std::process::exit(1);
	}
}

fn do_main(options: Options) -> Result<(), ()> {
	logging::init(module_path!(), options.verbose);
	match &options.command {
		Command::Send { text } => {
			let channel = open_channel(&options)?;
			log::debug!("Sending {:?} to {}", text, channel.device_name());
			channel.print_line(text).map_err(|e| log::error!("Write failed: {}", e))?;
		},
		Command::Echo { duration } => {
			let channel = open_receiving_channel(&options, echo)?;
			channel
				.print_line("Hello World!")
				.map_err(|e| log::error!("Write failed: {}", e))?;
			channel
				.print("Please type some text: ")
				.map_err(|e| log::error!("Write failed: {}", e))?;
			let result = run_for(&channel, *duration);
			channel.end_line().map_err(|e| log::error!("Write failed: {}", e))?;
			result?;
		},
		Command::Listen { duration } => {
			let channel = open_receiving_channel(&options, |data, _writer| print_received(data))?;
			run_for(&channel, *duration)?;
		},
		Command::BaudRates => {
			for rate in BaudRate::SUPPORTED {
				println!("{}", rate);
			}
		},
		Command::ShellCompletion { shell, output } => {
			write_shell_completion(*shell, output.as_deref())?;
		},
	}

	Ok(())
}

fn open_channel(options: &Options) -> Result<SerialChannel<NativePort>, ()> {
	let channel = SerialChannel::open(&options.serial_port, options.baud_rate)
		.map_err(|e| log::error!("Failed to open serial port: {}", e))?;
	log::debug!(
		"Using serial port {} with baud rate {}",
		options.serial_port,
		options.baud_rate
	);
	Ok(channel)
}

fn open_receiving_channel<F>(options: &Options, listener: F) -> Result<SerialChannel<NativePort>, ()>
where
	F: FnMut(&[u8], &Writer<NativePort>) + Send + 'static,
{
	let channel = SerialChannel::open_with_listener(&options.serial_port, options.baud_rate, listener)
		.map_err(|e| log::error!("Failed to open serial port: {}", e))?;
	log::debug!(
		"Receiving on serial port {} with baud rate {}",
		options.serial_port,
		options.baud_rate
	);
	Ok(channel)
}

/// Write received data back, and add the line feed that terminals don't send.
fn echo(data: &[u8], writer: &Writer<NativePort>) {
	if let Err(e) = writer.write(data) {
		log::error!("Echo failed: {}", e);
		return;
	}
	print_received(data);

	if data.last() == Some(&CR) {
		if let Err(e) = writer.write_byte(LF) {
			log::error!("Echo failed: {}", e);
		}
		println!();
	}
}

fn print_received(data: &[u8]) {
	let stdout = std::io::stdout();
	let mut stdout = stdout.lock();
	let _ = stdout.write_all(String::from_utf8_lossy(data).as_bytes());
	let _ = stdout.flush();
}

/// Keep the receive task running for the given number of seconds, or forever.
fn run_for(channel: &SerialChannel<NativePort>, seconds: Option<u64>) -> Result<(), ()> {
	let deadline = seconds.map(|seconds| Instant::now() + Duration::from_secs(seconds));
	loop {
		if !channel.is_receiving() {
			log::error!("Receive task for {} stopped", channel.device_name());
			return Err(());
		}
		if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
			return Ok(());
		}
		std::thread::sleep(Duration::from_millis(100));
	}
}

fn write_shell_completion(shell: clap_complete::Shell, path: Option<&Path>) -> Result<(), ()> {
	use clap::CommandFactory;

	let mut completion = Vec::new();
	clap_complete::generate(shell, &mut Options::command(), env!("CARGO_BIN_NAME"), &mut completion);

	let (mut output, target): (Box<dyn Write>, String) = match path.filter(|path| *path != Path::new("-")) {
		Some(path) => {
			let file = std::fs::File::create(path).map_err(|e| log::error!("Failed to create {}: {}", path.display(), e))?;
			(Box::new(file), path.display().to_string())
		},
		None => (Box::new(std::io::stdout()), String::from("stdout")),
	};

	log::debug!("Writing {} completion to {}", shell, target);
	output
		.write_all(&completion)
		.and_then(|()| output.flush())
		.map_err(|e| log::error!("Failed to write to {}: {}", target, e))
}
