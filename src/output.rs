
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Local;
use log::info;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	Json,
	Cbor,
}

pub const DEFAULT_FORMAT:Format = Format::Json;
pub const FORMATS:[Format; 2] = [Format::Json, Format::Cbor];

impl Format {

	pub fn extension(self) -> &'static str {
		match self {
			Format::Json => "json",
			Format::Cbor => "cbor",
		}
	}

	pub fn from_extension(ext:&str) -> Option<Self> {
		FORMATS.iter().cloned().find(|f| f.extension().eq_ignore_ascii_case(ext))
	}

}

pub fn detect_format(fname:&str) -> Result<Format> {
	let ext = Path::new(fname).extension().and_then(|e| e.to_str()).unwrap_or("");
	if ext.is_empty() {
		return Err(Error::user("no format specified and file name does not have an extension"));
	}
	Format::from_extension(ext).ok_or_else(|| Error::user(format!("unknown format {} (from filename)", ext)))
}

/// `<prefix>-<local time>.<ext>`, refusing to clobber an existing file
pub fn auto_fname(prefix:&str, ext:&str) -> Result<String> {
	let iso_date = Local::now().format("%Y-%m-%dT%H:%M:%S");
	let fname = format!("{}-{}.{}", prefix, iso_date, ext);
	if Path::new(&fname).exists() {
		return Err(Error::user("not overwriting existing file with auto-generated name"));
	}
	info!("writing to {}", fname);
	Ok(fname)
}

/// Fills in whichever of file name and format the user left out
pub fn resolve_fname_format(fname:Option<String>, format:Option<Format>) -> Result<(String, Format)> {
	match (fname, format) {
		(Some(fname), Some(format)) => Ok((fname, format)),
		(None, Some(format))        => Ok((auto_fname("ds1000z", format.extension())?, format)),
		(Some(fname), None)         => { let format = detect_format(&fname)?; Ok((fname, format)) },
		(None, None)                => Ok((auto_fname("ds1000z", DEFAULT_FORMAT.extension())?, DEFAULT_FORMAT)),
	}
}

pub fn write_to<W: Write, T: Serialize>(writer:W, format:Format, value:&T) -> Result<()> {
	match format {
		Format::Json => serde_json::to_writer_pretty(writer, value)?,
		Format::Cbor => serde_cbor::to_writer(writer, value)?,
	}
	Ok(())
}

pub fn write_file<P: AsRef<Path>, T: Serialize>(path:P, format:Format, value:&T) -> Result<()> {
	let mut writer = BufWriter::new(File::create(path)?);
	write_to(&mut writer, format, value)?;
	writer.flush()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	#[test]
	fn detects_format_from_extension() {
		assert_eq!(detect_format("capture.json").unwrap(), Format::Json);
		assert_eq!(detect_format("dir.d/capture.CBOR").unwrap(), Format::Cbor);
		assert!(detect_format("capture").unwrap_err().is_user());
		assert!(detect_format("capture.npy").unwrap_err().is_user());
	}

	#[test]
	fn explicit_name_and_format_are_kept() {
		let (fname, format) = resolve_fname_format(Some("out.bin".into()), Some(Format::Cbor)).unwrap();
		assert_eq!(fname, "out.bin");
		assert_eq!(format, Format::Cbor);
	}

	#[test]
	fn auto_names_use_the_format_extension() {
		let (fname, format) = resolve_fname_format(None, None).unwrap();
		assert!(fname.starts_with("ds1000z-") && fname.ends_with(".json"), "{}", fname);
		assert_eq!(format, Format::Json);
	}

	#[test]
	fn writes_both_formats() {
		let dir = tempfile::tempdir().unwrap();
		let mut value = BTreeMap::new();
		value.insert("CHAN1", vec![1u8, 2, 3]);

		let json_path = dir.path().join("x.json");
		write_file(&json_path, Format::Json, &value).unwrap();
		let back:BTreeMap<String, Vec<u8>> = serde_json::from_reader(File::open(&json_path).unwrap()).unwrap();
		assert_eq!(back["CHAN1"], vec![1, 2, 3]);

		let cbor_path = dir.path().join("x.cbor");
		write_file(&cbor_path, Format::Cbor, &value).unwrap();
		let back:BTreeMap<String, Vec<u8>> = serde_cbor::from_reader(File::open(&cbor_path).unwrap()).unwrap();
		assert_eq!(back["CHAN1"], vec![1, 2, 3]);
	}
}
