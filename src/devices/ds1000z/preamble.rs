
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const PREAMBLE_FIELDS:usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WavFormat {
	BYTE,
	WORD,
	ASC,
}

/// Where the waveform data comes from: the screen (NORM), whatever is largest available (MAX),
/// or the whole internal memory (RAW). NORMal and MAXimum are the long spellings of the same modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WavMode {
	NORM,
	MAX,
	RAW,
}

impl WavFormat {

	pub fn from_code(code:i64) -> Result<Self> {
		match code {
			0 => Ok(WavFormat::BYTE),
			1 => Ok(WavFormat::WORD),
			2 => Ok(WavFormat::ASC),
			_ => Err(Error::format(format!("unknown waveform format code {}", code))),
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			WavFormat::BYTE => "BYTE",
			WavFormat::WORD => "WORD",
			WavFormat::ASC  => "ASC",
		}
	}

}

impl WavMode {

	pub fn from_code(code:i64) -> Result<Self> {
		match code {
			0 => Ok(WavMode::NORM),
			1 => Ok(WavMode::MAX),
			2 => Ok(WavMode::RAW),
			_ => Err(Error::format(format!("unknown waveform mode code {}", code))),
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			WavMode::NORM => "NORM",
			WavMode::MAX  => "MAX",
			WavMode::RAW  => "RAW",
		}
	}

}

impl FromStr for WavFormat {
	type Err = Error;

	fn from_str(s:&str) -> Result<Self> {
		match s.trim().to_ascii_uppercase().as_str() {
			"BYTE"        => Ok(WavFormat::BYTE),
			"WORD"        => Ok(WavFormat::WORD),
			"ASC"|"ASCII" => Ok(WavFormat::ASC),
			other         => Err(Error::format(format!("unknown waveform format {:?}", other))),
		}
	}
}

impl FromStr for WavMode {
	type Err = Error;

	fn from_str(s:&str) -> Result<Self> {
		match s.trim().to_ascii_uppercase().as_str() {
			"NORM"|"NORMAL"  => Ok(WavMode::NORM),
			"MAX"|"MAXIMUM"  => Ok(WavMode::MAX),
			"RAW"            => Ok(WavMode::RAW),
			other            => Err(Error::format(format!("unknown waveform mode {:?}", other))),
		}
	}
}

impl fmt::Display for WavFormat {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { f.write_str(self.name()) }
}

impl fmt::Display for WavMode {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { f.write_str(self.name()) }
}

/// Answer to `:WAVeform:PREamble?`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preamble {
	pub format: WavFormat,
	#[serde(rename = "type")]
	pub mode: WavMode,
	pub points: usize,
	pub count: i64,
	pub xincrement: f64,
	pub xorigin: f64,
	pub xreference: i64,
	pub yincrement: f64,
	pub yorigin: f64,
	pub yreference: i64,
}

fn field<T: FromStr>(parts:&[&str], idx:usize, name:&str) -> Result<T> {
	parts[idx].trim().parse::<T>()
		.map_err(|_| Error::format(format!("preamble field {} ({}) is not valid: {:?}", idx, name, parts[idx])))
}

impl FromStr for Preamble {
	type Err = Error;

	fn from_str(s:&str) -> Result<Self> {
		let parts:Vec<&str> = s.trim().split(',').collect();
		if parts.len() != PREAMBLE_FIELDS {
			return Err(Error::format(format!("preamble has {} fields, expected {}: {:?}", parts.len(), PREAMBLE_FIELDS, s)));
		}

		Ok(Preamble {
			format:     WavFormat::from_code(field(&parts, 0, "format")?)?,
			mode:       WavMode::from_code(field(&parts, 1, "type")?)?,
			points:     field(&parts, 2, "points")?,
			count:      field(&parts, 3, "count")?,
			xincrement: field(&parts, 4, "xincrement")?,
			xorigin:    field(&parts, 5, "xorigin")?,
			xreference: field(&parts, 6, "xreference")?,
			yincrement: field(&parts, 7, "yincrement")?,
			yorigin:    field(&parts, 8, "yorigin")?,
			yreference: field(&parts, 9, "yreference")?,
		})
	}
}
