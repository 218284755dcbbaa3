//! Rigol DS1000Z series oscilloscopes.
//!
//! Waveform reads are stateful: `:WAVeform:SOURce`, `:WAVeform:MODE` and `:WAVeform:FORMat` are
//! session settings on the scope, not request parameters, so [`WaveformSettings`] is applied in
//! full before every channel is transferred.

use std::collections::BTreeMap;
use std::io;

use log::{debug, info};

use crate::block::{header_len, parse_block, read_block, DATA_HEADER_DIGITS};
use crate::error::{Error, Result};
use crate::session::{fixup_resource, Session};

pub mod preamble;
pub mod process;

pub use self::preamble::{Preamble, WavFormat, WavMode};

/// Most samples the scope will return for one `:WAVeform:DATA?` in BYTE format
pub const MAX_BYTE_LEN:usize = 250_000;

pub const ANALOG_CHANNELS:[&str; 4] = ["CHAN1", "CHAN2", "CHAN3", "CHAN4"];

/// Channel name to preamble and raw sample codes
pub type DataSet = BTreeMap<String, (Preamble, Vec<u8>)>;

/// The scope-side settings that decide what `:WAVeform:DATA?` returns
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformSettings {
	/// D0-D15, CHAN1-CHAN4 or MATH
	pub source: String,
	pub mode: WavMode,
	pub format: WavFormat,
}

impl WaveformSettings {

	pub fn new(source:&str, mode:WavMode) -> Self {
		WaveformSettings{ source: source.to_owned(), mode, format: WavFormat::BYTE }
	}

	pub fn apply(&self, session:&mut dyn Session) -> io::Result<()> {
		session.write(&format!(":WAVeform:MODE {}", self.mode))?;
		session.write(&format!(":WAVeform:FORMat {}", self.format))?;
		session.write(&format!(":WAVeform:SOURce {}", self.source))
	}

}

/// Splits a comma separated channel list; bare numbers are analog channels ("2" is CHAN2).
pub fn parse_channels(arg:&str) -> Vec<String> {
	let mut ans:Vec<String> = vec![];
	for channel in arg.split(',').map(str::trim).filter(|c| !c.is_empty()) {
		let name = if channel.chars().all(|c| c.is_ascii_digit()) {
			format!("CHAN{}", channel)
		} else {
			channel.to_owned()
		};
		if !ans.contains(&name) {
			ans.push(name);
		}
	}
	ans
}

pub struct DS1000Z {
	session: Box<dyn Session>,
}

impl DS1000Z {

	pub fn new(mut session:Box<dyn Session>) -> Self {
		fixup_resource(session.as_mut());
		DS1000Z{ session }
	}

	pub fn session(&mut self) -> &mut dyn Session { self.session.as_mut() }

	pub fn into_session(self) -> Box<dyn Session> { self.session }

	pub fn idn(&mut self) -> Result<String> { Ok(self.session.query("*IDN?")?) }

	pub fn is_stopped(&mut self) -> Result<bool> {
		Ok(self.session.query(":TRIGger:STATus?")?.trim() == "STOP")
	}

	fn get_preamble(&mut self) -> Result<Preamble> {
		self.session.query(":WAVeform:PREamble?")?.parse()
	}

	/// All samples for the channel the scope is currently set up for.
	///
	/// SOURce, FORMat and MODE must already have been set. Only BYTE is supported.
	pub fn get_channel_data(&mut self) -> Result<(Preamble, Vec<u8>)> {
		let preamble = self.get_preamble()?;
		if preamble.format != WavFormat::BYTE {
			return Err(Error::format(format!("only BYTE waveform reads are supported, scope reports {}", preamble.format)));
		}

		let mut buf:Vec<u8> = Vec::with_capacity(preamble.points);

		for start in (0..preamble.points).step_by(MAX_BYTE_LEN) {
			let stop = preamble.points.min(start + MAX_BYTE_LEN);
			debug!("reading samples {}..={} of {}", start + 1, stop, preamble.points);

			self.session.write(&format!(":WAVeform:STARt {}", start + 1))?;
			self.session.write(&format!(":WAVeform:STOP {}", stop))?;
			self.session.write(":WAVeform:DATA?")?;

			// Header, samples and the trailing newline
			let chunk_buf = self.session.read_bytes(header_len(DATA_HEADER_DIGITS) + (stop - start) + 1)?;
			buf.extend_from_slice(parse_block(&chunk_buf)?);
		}

		if buf.len() != preamble.points {
			return Err(Error::format(format!("expected {} samples, got {}", preamble.points, buf.len())));
		}

		Ok((preamble, buf))
	}

	/// Analog channels that are switched on
	pub fn get_enabled_channels(&mut self) -> Result<Vec<String>> {
		let mut channels:Vec<String> = vec![];
		for name in ANALOG_CHANNELS.iter() {
			let res = self.session.query(&format!(":{}:DISPlay?", name))?;
			let enabled = res.trim().parse::<i32>()
				.map_err(|_| Error::format(format!("unexpected {} display state {:?}", name, res)))?;
			if enabled != 0 {
				channels.push((*name).to_owned());
			}
		}
		Ok(channels)
	}

	pub fn get_data(&mut self, mode:WavMode, channels:Option<&[String]>) -> Result<DataSet> {
		let channels:Vec<String> = match channels {
			Some(c) => parse_channels(&c.join(",")),
			None    => self.get_enabled_channels()?,
		};

		let stopped = self.is_stopped()?;
		if !stopped && channels.len() > 1 {
			return Err(Error::user("scope must be stopped to read more than one channel"));
		}
		if !stopped && mode == WavMode::RAW {
			return Err(Error::user("scope must be stopped to read data memory"));
		}

		let mut out = DataSet::new();
		for channel in channels {
			info!("reading {} ({})", channel, mode);
			WaveformSettings::new(&channel, mode).apply(self.session.as_mut())?;
			let data = self.get_channel_data()?;
			out.insert(channel, data);
		}
		Ok(out)
	}

	/// Everything in acquisition memory; the scope has to be stopped
	pub fn get_data_memory(&mut self, channels:Option<&[String]>) -> Result<DataSet> {
		self.get_data(WavMode::RAW, channels)
	}

	/// What's on screen; works while running, but then only for one channel
	pub fn get_data_screen(&mut self, channels:Option<&[String]>) -> Result<DataSet> {
		self.get_data(WavMode::NORM, channels)
	}

	/// Screen image in `format` (PNG, BMP8, BMP24, JPEG or TIFF)
	pub fn get_screenshot(&mut self, format:&str, color:bool, invert:bool) -> Result<Vec<u8>> {
		fn fmt_bool(b:bool) -> &'static str { if b { "ON" } else { "OFF" } }

		self.session.write(&format!(":DISPlay:DATA? {},{},{}", fmt_bool(color), fmt_bool(invert), format))?;

		// N is always 9 here, but reading the header costs no extra round trip
		read_block(self.session.as_mut())
	}

}
