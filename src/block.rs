//! TMC binary blocks: `#`, one digit N, N digits of payload length, then the payload.

use std::io;

use crate::error::{Error, Result};
use crate::session::Session;

/// Digit count the DS1000Z always uses in waveform data headers
pub const DATA_HEADER_DIGITS:usize = 9;

/// Bytes in front of the payload for a header with `n_digits` length digits
pub fn header_len(n_digits:usize) -> usize { 2 + n_digits }

fn parse_len(digits:&[u8]) -> Result<usize> {
	// usize's FromStr takes a leading '+'
	if !digits.iter().all(u8::is_ascii_digit) {
		return Err(Error::format(format!("invalid block length {:?}", String::from_utf8_lossy(digits))));
	}
	std::str::from_utf8(digits).ok()
		.and_then(|s| s.parse::<usize>().ok())
		.ok_or_else(|| Error::format(format!("invalid block length {:?}", String::from_utf8_lossy(digits))))
}

fn parse_n_digits(b:u8) -> Result<usize> {
	match b {
		b'1'..=b'9' => Ok((b - b'0') as usize),
		_ => Err(Error::format(format!("invalid block header digit count {:?}", b as char))),
	}
}

/// Returns the payload of a block at the start of `buf`; anything after the payload is ignored.
pub fn parse_block(buf:&[u8]) -> Result<&[u8]> {
	if buf.first() != Some(&b'#') {
		return Err(Error::format("block does not start with '#'"));
	}
	if buf.len() < 2 {
		return Err(Error::format("block header truncated"));
	}
	let n_digits = parse_n_digits(buf[1])?;

	let start = header_len(n_digits);
	if buf.len() < start {
		return Err(Error::format("block header truncated"));
	}
	let n_bytes = parse_len(&buf[2..start])?;

	let end = start + n_bytes;
	if buf.len() < end {
		return Err(Error::format(format!("block payload truncated: expected {} bytes, got {}", n_bytes, buf.len() - start)));
	}
	Ok(&buf[start..end])
}

pub fn encode_block(payload:&[u8]) -> Vec<u8> {
	let len = payload.len().to_string();
	let mut ans = Vec::with_capacity(header_len(len.len()) + payload.len());
	ans.push(b'#');
	ans.extend_from_slice(len.len().to_string().as_bytes());
	ans.extend_from_slice(len.as_bytes());
	ans.extend_from_slice(payload);
	ans
}

fn read_exact_len(session:&mut dyn Session, n:usize) -> Result<Vec<u8>> {
	let buf = session.read_bytes(n)?;
	if buf.len() != n {
		return Err(Error::Transport(io::Error::new(io::ErrorKind::UnexpectedEof, "short read")));
	}
	Ok(buf)
}

/// Reads a block whose length isn't known up front, then drops the trailing newline.
pub fn read_block(session:&mut dyn Session) -> Result<Vec<u8>> {
	let hash_n = read_exact_len(session, 2)?;
	if hash_n[0] != b'#' {
		return Err(Error::format("block does not start with '#'"));
	}
	let n_digits = parse_n_digits(hash_n[1])?;
	let n_bytes = parse_len(&read_exact_len(session, n_digits)?)?;

	let mut payload = read_exact_len(session, n_bytes + 1)?;
	payload.pop();
	Ok(payload)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_data_block() {
		let buf = b"#9000000005hello\n";
		assert_eq!(parse_block(buf).unwrap(), b"hello");
	}

	#[test]
	fn round_trips_payloads() {
		for len in &[0usize, 1, 9, 10, 1200, 250_000] {
			let payload:Vec<u8> = (0..*len).map(|i| (i % 251) as u8).collect();
			let encoded = encode_block(&payload);
			assert_eq!(parse_block(&encoded).unwrap(), &payload[..]);
		}
	}

	#[test]
	fn rejects_truncation() {
		let cases:[&[u8]; 10] = [b"", b"#", b"X15hello", b"#9", b"#900000", b"#15hell", b"#0", b"#2ab", b"#2+5hello", b"#3 05hello"];
		for bad in cases.iter() {
			match parse_block(bad) {
				Err(Error::Format(_)) => (),
				other => panic!("{:?} gave {:?}", bad, other),
			}
		}
	}
}
