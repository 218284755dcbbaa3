
use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};

use crate::xdr;
use super::{xdr_pack, xdr_unpack};

const LAST_FRAGMENT:u32 = 0x8000_0000;

// Largest reply we'll accept; a full device_read at the fixed-up max_recv_size is about 1 MB
pub const MAX_RECORD_LEN:usize = 4 * 1024 * 1024;

/// Tries each resolved address in turn, giving each one `timeout` to accept.
pub fn connect_timeout<A: ToSocketAddrs>(addr: A, timeout: Duration) -> io::Result<TcpStream> {
	let mut last_err = Error::new(ErrorKind::InvalidInput, "Address did not resolve");
	for sock_addr in addr.to_socket_addrs()? {
		match TcpStream::connect_timeout(&sock_addr, timeout) {
			Ok(stream) => return Ok(stream),
			Err(e)     => last_err = e,
		}
	}
	Err(last_err)
}

pub struct TcpClient {
	pub stream: TcpStream,
	pub prog: u32,
	pub vers: u32,
	pub lastxid: u32,
	pub packer: xdr::Packer,
	pub unpacker: xdr::Unpacker,
}

impl TcpClient {

	pub fn connect<A: ToSocketAddrs>(addr: A, prog: u32, vers: u32, timeout: Duration) -> io::Result<Self> {
		let stream = connect_timeout(addr, timeout)?;
		Ok(Self{ stream, prog, vers, lastxid: 0, packer: xdr::Packer::new(), unpacker: xdr::Unpacker::new(&[]) })
	}

	/// Resets the packer and writes a call header for `prc`; arguments get packed after this
	pub fn start_call(&mut self, prc:u32) -> io::Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		xdr_pack::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	/// Sends whatever is in the packer and leaves the reply body in the unpacker
	pub fn do_call(&mut self) -> io::Result<()> {
		let call = self.packer.get_buf();

		let mut send_bytes:Vec<u8> = Vec::with_capacity(call.len() + 4);
		send_bytes.write_u32::<BigEndian>(call.len() as u32 | LAST_FRAGMENT)?;
		send_bytes.extend_from_slice(call);
		self.stream.write_all(&send_bytes)?;

		loop {
			let reply = self.recv_record()?;
			self.unpacker.reset(&reply);

			let xid = xdr_unpack::unpack_replyheader(&mut self.unpacker)?;
			if xid == self.lastxid {
				return Ok(());
			} else if xid < self.lastxid {
				// Stale reply to an earlier call
				continue;
			} else {
				return Err(Error::new(ErrorKind::InvalidData, "Somehow got a reply from the future"));
			}
		}
	}

	fn recv_record(&mut self) -> io::Result<Vec<u8>> {
		let mut reply:Vec<u8> = vec![];

		let mut last:bool = false;
		while !last {
			let x:u32 = self.stream.read_u32::<BigEndian>()?;
			last = (x & LAST_FRAGMENT) != 0;
			let n = (x & !LAST_FRAGMENT) as usize;
			if reply.len() + n > MAX_RECORD_LEN {
				return Err(Error::new(ErrorKind::InvalidData, format!("RPC record of more than {} bytes", MAX_RECORD_LEN)));
			}

			let start = reply.len();
			reply.resize(start + n, 0);
			self.stream.read_exact(&mut reply[start..])?;
		}

		Ok(reply)
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::TcpListener;
	use std::thread;

	use crate::vxi11::{DEVICE_CORE_PROG, DEVICE_CORE_VERS};

	#[test]
	fn oversized_record_is_refused() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();

		let server = thread::spawn(move || {
			let (mut stream, _) = listener.accept().unwrap();
			let mark = stream.read_u32::<BigEndian>().unwrap();
			let mut call = vec![0u8; (mark & !LAST_FRAGMENT) as usize];
			stream.read_exact(&mut call).unwrap();

			// Claims a 2 GiB reply and then sends nothing
			stream.write_u32::<BigEndian>(LAST_FRAGMENT | 0x7fff_ffff).unwrap();
		});

		let mut client = TcpClient::connect(("127.0.0.1", port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, Duration::from_secs(2)).unwrap();
		client.start_call(0).unwrap();
		let e = client.do_call().unwrap_err();
		assert_eq!(e.kind(), ErrorKind::InvalidData);

		server.join().unwrap();
	}
}
