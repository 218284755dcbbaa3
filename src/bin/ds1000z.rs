use std::fs;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap::error::ErrorKind;
use log::info;

use ds1000z::devices::ds1000z::{parse_channels, process::process_data};
use ds1000z::discover::{self, Target};
use ds1000z::output::{self, Format};
use ds1000z::{Config, Error, Result};

#[derive(Parser)]
#[command(name = "ds1000z")]
#[command(about = "Save waveform data and screenshots from Rigol DS1000Z scopes", long_about = None)]
struct Cli {
	/// Scope host name or IP
	#[arg(long, short, global = true, conflicts_with = "name")]
	address: Option<String>,

	/// Resource name to connect to, e.g. TCPIP::scope.lan::INSTR
	#[arg(long, short, global = true)]
	name: Option<String>,

	/// JSON file with discovery settings
	#[arg(long, global = true)]
	config: Option<String>,

	/// More logging (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	verbose: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Save data from screen or memory to a file
	SaveData {
		/// File to write to; named after the current time if not given
		fname: Option<String>,

		/// Read the data shown on the screen, rather than the whole memory
		#[arg(short, long)]
		screen: bool,

		/// Don't convert to voltages before saving
		#[arg(short, long)]
		raw: bool,

		/// Format to write, detected from fname if given (default: json)
		#[arg(short, long, value_enum)]
		format: Option<OutFormat>,

		/// Channels to save, comma separated names, e.g. '1', 'CHAN1', 'D0', 'MATH'
		#[arg(short, long)]
		channels: Option<String>,
	},

	/// Save a screen image
	Screenshot {
		fname: Option<String>,

		/// PNG, BMP8, BMP24, JPEG or TIFF
		#[arg(short, long, default_value = "PNG")]
		format: String,

		/// Grayscale instead of color
		#[arg(long)]
		no_color: bool,

		/// Invert the image
		#[arg(long)]
		invert: bool,
	},

	/// Look for a scope on the local network and print its resource name
	Discover,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutFormat {
	Json,
	Cbor,
}

impl From<OutFormat> for Format {
	fn from(f:OutFormat) -> Self {
		match f {
			OutFormat::Json => Format::Json,
			OutFormat::Cbor => Format::Cbor,
		}
	}
}

fn init_logging(verbose:u8) {
	let level = match verbose {
		0 => "warn",
		1 => "info",
		_ => "debug",
	};
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli:Cli) -> Result<()> {
	let config = match &cli.config {
		Some(path) => Config::from_file(path)?,
		None       => Config::default(),
	};
	let target = Target::from_args(cli.address, cli.name);

	match cli.command {
		Commands::SaveData{ fname, screen, raw, format, channels } => {
			let mut scope = discover::connect(target, &config)?;
			let channels = channels.as_deref().map(parse_channels);

			let data = if screen {
				scope.get_data_screen(channels.as_deref())?
			} else {
				scope.get_data_memory(channels.as_deref())?
			};
			let data = process_data(data, !raw);

			let (fname, format) = output::resolve_fname_format(fname, format.map(Format::from))?;
			output::write_file(&fname, format, &data)?;
			info!("wrote {} channel(s) to {}", data.len(), fname);
		},
		Commands::Screenshot{ fname, format, no_color, invert } => {
			let mut scope = discover::connect(target, &config)?;
			let image = scope.get_screenshot(&format, !no_color, invert)?;

			let fname = match fname {
				Some(f) => f,
				None    => output::auto_fname("ds1000z", &format.to_ascii_lowercase())?,
			};
			fs::write(&fname, &image)?;
			info!("wrote {} byte screenshot to {}", image.len(), fname);
		},
		Commands::Discover => {
			match discover::discover(&config)? {
				Some(found) => println!("{}\t{}", found.resource, found.idn),
				None        => return Err(Error::user("no scope found")),
			}
		},
	}

	Ok(())
}

fn main() {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	if let Err(e) = run(cli) {
		if e.is_user() {
			Cli::command().error(ErrorKind::InvalidValue, e).exit();
		}
		eprintln!("error: {}", e);
		std::process::exit(1);
	}
}
