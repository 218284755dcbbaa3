
use std::io::{self, Cursor, Error, ErrorKind, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::UnexpectedEof, msg) }

fn padding(n:usize) -> usize { (4 - n % 4) % 4 }

#[derive(Default)]
pub struct Packer {
	buff: Vec<u8>,
}

pub struct Unpacker {
	rdr: Cursor<Vec<u8>>,
}

impl Packer {

	pub fn new() -> Self { Packer{ buff: Vec::new() } }

	pub fn reset(&mut self) { self.buff.clear(); }

	pub fn get_buf(&self) -> &[u8] { &self.buff }

	pub fn into_buf(self) -> Vec<u8> { self.buff }

	// Everything except opaque data is a multiple of four bytes, so alignment is preserved
	pub fn pack_u32(&mut self, x:u32) -> io::Result<()> { self.buff.write_u32::<BigEndian>(x) }
	pub fn pack_i32(&mut self, x:i32) -> io::Result<()> { self.buff.write_i32::<BigEndian>(x) }

	pub fn pack_bool(&mut self, b:bool) -> io::Result<()> { self.pack_i32(if b { 1 } else { 0 }) }

	pub fn pack_enum(&mut self, x:i32) -> io::Result<()> { self.pack_i32(x) }

	pub fn pack_variable_len_opaque(&mut self, data:&[u8]) -> io::Result<()> {
		self.pack_u32(data.len() as u32)?;
		self.buff.extend_from_slice(data);
		self.buff.resize(self.buff.len() + padding(data.len()), 0);
		Ok(())
	}

}

impl Unpacker {

	pub fn new(data:&[u8]) -> Self { Unpacker{ rdr: Cursor::new(data.to_vec()) } }

	pub fn reset(&mut self, data:&[u8]) {
		let buff = self.rdr.get_mut();
		buff.clear();
		buff.extend_from_slice(data);
		self.rdr.set_position(0);
	}

	fn remaining(&self) -> usize { self.rdr.get_ref().len().saturating_sub(self.rdr.position() as usize) }

	pub fn all_data_consumed(&self) -> bool { self.remaining() == 0 }

	pub fn unpack_u32(&mut self) -> io::Result<u32> { self.rdr.read_u32::<BigEndian>() }
	pub fn unpack_i32(&mut self) -> io::Result<i32> { self.rdr.read_i32::<BigEndian>() }

	// The set of valid values depends on the application, so an enum is just an i32 here
	pub fn unpack_enum(&mut self) -> io::Result<i32> { self.unpack_i32() }

	pub fn unpack_bool(&mut self) -> io::Result<bool> {
		match self.unpack_i32()? {
			0 => Ok(false),
			1 => Ok(true),
			x => Err(Error::new(ErrorKind::InvalidData, format!("Expected 0 or 1 for an XDR bool but got {}", x))),
		}
	}

	pub fn unpack_variable_len_opaque(&mut self) -> io::Result<Vec<u8>> {
		let n = self.unpack_u32()? as usize;
		if n + padding(n) > self.remaining() {
			return Err(err("Opaque data runs past the end of the buffer"));
		}

		let mut ans = vec![0u8; n];
		self.rdr.read_exact(&mut ans)?;

		let pos = self.rdr.position();
		self.rdr.set_position(pos + padding(n) as u64);
		Ok(ans)
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn opaque_is_padded_to_four_bytes() {
		let mut packer = Packer::new();
		packer.pack_variable_len_opaque(b"inst0").unwrap();
		assert_eq!(packer.get_buf(), &[0, 0, 0, 5, b'i', b'n', b's', b't', b'0', 0, 0, 0][..]);

		let mut unpacker = Unpacker::new(packer.get_buf());
		assert_eq!(unpacker.unpack_variable_len_opaque().unwrap(), b"inst0".to_vec());
		assert!(unpacker.all_data_consumed());
	}

	#[test]
	fn reading_past_the_end_is_an_error() {
		let mut unpacker = Unpacker::new(&[0, 0, 0]);
		assert!(unpacker.unpack_u32().is_err());

		// Declared length longer than what's left
		let mut unpacker = Unpacker::new(&[0, 0, 0, 9, 1, 2, 3, 4]);
		assert!(unpacker.unpack_variable_len_opaque().is_err());
	}

	#[test]
	fn bool_must_be_zero_or_one() {
		let mut packer = Packer::new();
		packer.pack_bool(true).unwrap();
		packer.pack_i32(7).unwrap();

		let mut unpacker = Unpacker::new(packer.get_buf());
		assert!(unpacker.unpack_bool().unwrap());
		assert_eq!(unpacker.unpack_bool().unwrap_err().kind(), ErrorKind::InvalidData);
	}
}
