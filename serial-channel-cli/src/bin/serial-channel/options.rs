use std::path::PathBuf;

/// Exchange raw bytes with a serial port.
///
/// The link always uses 8 data bits, 1 stop bit and no parity.
#[derive(clap::Parser)]
#[command(author, version, about)]
pub struct Options {
	/// Increase log verbosity (can be repeated).
	#[arg(long, short, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// The serial port to use.
	#[arg(long, short, global = true)]
	#[cfg_attr(target_os = "windows", arg(default_value = "COM1"))]
	#[cfg_attr(not(target_os = "windows"), arg(default_value = "/dev/ttyUSB0"))]
	pub serial_port: String,

	/// The baud rate of the link.
	#[arg(long, short, global = true, default_value = "57600")]
	pub baud_rate: u32,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
	/// Send a line of text, terminated by CR LF.
	Send {
		/// The text to send.
		#[arg(value_name = "TEXT")]
		text: String,
	},

	/// Greet the other side and echo everything it sends.
	///
	/// Received data is written back to the serial port and to stdout.
	/// A line feed is added after every chunk that ends with a carriage return.
	Echo {
		/// Stop after this many seconds instead of running until interrupted.
		#[arg(long, short, value_name = "SECONDS")]
		duration: Option<u64>,
	},

	/// Print everything received on the serial port to stdout.
	Listen {
		/// Stop after this many seconds instead of running until interrupted.
		#[arg(long, short, value_name = "SECONDS")]
		duration: Option<u64>,
	},

	/// List the supported baud rates.
	BaudRates,

	/// Write shell completions to a file or stdout.
	ShellCompletion {
		/// The shell for which to generate completions.
		#[arg(long)]
		shell: clap_complete::Shell,

		/// The file to write the generated completion file to.
		#[arg(long, short)]
		output: Option<PathBuf>,
	},
}
