
use std::io;
use std::time::Duration;

use log::{debug, warn};

use crate::vxi11::{CoreClient, DEFAULT_IO_TIMEOUT};
use super::{strip_termination, Session};

const DEFAULT_CHUNK_SIZE:usize = 20 * 1024;

/// VXI-11 session (`TCPIP::host[::device]::INSTR`) on top of a device-core link.
pub struct Vxi11Session {
	core: CoreClient,
	rx: Vec<u8>,
	// Set once the device has flagged END for the data currently in `rx`
	end_seen: bool,
	timeout: Option<Duration>,
	read_termination: Vec<u8>,
	write_termination: Vec<u8>,
	chunk_size: usize,
}

impl Vxi11Session {

	pub fn connect(host:&str, device:&str, timeout:Duration) -> io::Result<Self> {
		Self::open(CoreClient::new(host, timeout)?, device)
	}

	/// Creates a link to `device` on an already connected core client
	pub fn open(mut core:CoreClient, device:&str) -> io::Result<Self> {
		core.create_link(device)?;

		Ok(Self {
			core,
			rx: Vec::new(),
			end_seen: false,
			timeout: None,
			read_termination: b"\n".to_vec(),
			write_termination: b"\n".to_vec(),
			chunk_size: DEFAULT_CHUNK_SIZE,
		})
	}

	fn io_timeout(&self) -> u32 {
		match self.timeout {
			Some(t) => t.as_millis().min(u32::MAX as u128) as u32,
			None    => DEFAULT_IO_TIMEOUT,
		}
	}

	fn request_size(&self) -> u32 {
		let max_recv = self.core.link().map(|l| l.max_recv_size as usize).unwrap_or(self.chunk_size);
		self.chunk_size.min(max_recv).max(1) as u32
	}

	// END only describes data still in `rx`
	fn consumed(&mut self) {
		if self.rx.is_empty() {
			self.end_seen = false;
		}
	}

	fn fill(&mut self) -> io::Result<()> {
		let (request_size, io_timeout) = (self.request_size(), self.io_timeout());
		let (data, end) = self.core.read(request_size, io_timeout)?;
		self.rx.extend_from_slice(&data);
		self.end_seen = end;
		Ok(())
	}

}

impl Session for Vxi11Session {

	fn write(&mut self, cmd:&str) -> io::Result<()> {
		debug!("-> {}", cmd);
		let mut data = Vec::with_capacity(cmd.len() + self.write_termination.len());
		data.extend_from_slice(cmd.as_bytes());
		data.extend_from_slice(&self.write_termination);
		let io_timeout = self.io_timeout();

		// A new command starts a new response
		self.end_seen = false;
		self.core.write(&data, io_timeout)
	}

	fn read(&mut self) -> io::Result<String> {
		let last = *self.read_termination.last().unwrap_or(&b'\n');
		loop {
			if let Some(idx) = self.rx.iter().position(|b| *b == last) {
				let line:Vec<u8> = self.rx.drain(..=idx).collect();
				self.consumed();
				return strip_termination(line, &self.read_termination);
			}
			if self.end_seen && !self.rx.is_empty() {
				// The device ended the message without a terminator
				let line = std::mem::replace(&mut self.rx, Vec::new());
				self.consumed();
				return strip_termination(line, &self.read_termination);
			}
			self.fill()?;
		}
	}

	fn read_bytes(&mut self, n:usize) -> io::Result<Vec<u8>> {
		while self.rx.len() < n {
			self.fill()?;
		}
		let ans:Vec<u8> = self.rx.drain(..n).collect();
		self.consumed();
		Ok(ans)
	}

	fn timeout(&self) -> Option<Duration> { self.timeout }

	fn set_timeout(&mut self, timeout:Option<Duration>) -> io::Result<()> {
		// Leave the device some slack to report its own timeout before the socket gives up
		self.core.set_socket_timeout(timeout.map(|t| t * 2))?;
		self.timeout = timeout;
		Ok(())
	}

	fn set_read_termination(&mut self, term:&str) { self.read_termination = term.as_bytes().to_vec(); }
	fn set_write_termination(&mut self, term:&str) { self.write_termination = term.as_bytes().to_vec(); }
	fn set_chunk_size(&mut self, n:usize) { self.chunk_size = n; }

	fn set_max_recv_size(&mut self, n:u32) -> io::Result<()> { self.core.set_max_recv_size(n) }

	fn set_nodelay(&mut self, nodelay:bool) -> io::Result<()> { self.core.set_nodelay(nodelay) }

	fn close(&mut self) -> io::Result<()> {
		if self.core.link().is_some() {
			self.core.destroy_link()?;
		}
		Ok(())
	}

}

impl Drop for Vxi11Session {

	fn drop(&mut self) {
		if self.core.link().is_some() {
			if let Err(e) = self.core.destroy_link() {
				warn!("unable to destroy VXI-11 link: {}", e);
			}
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Read, Write};
	use std::net::{TcpListener, TcpStream};
	use std::thread::{self, JoinHandle};

	use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

	use crate::rpc::{AUTH_NULL, MSG_ACCEPTED, REPLY, SUCCESS};
	use crate::rpc::xdr_pack::pack_auth;
	use crate::rpc::xdr_unpack::unpack_auth;
	use crate::vxi11::{CREATE_LINK, DESTROY_LINK, DEVICE_READ, DEVICE_WRITE, OPERATION_FLAGS_END, REASON_END, REASON_REQCNT};
	use crate::xdr::{Packer, Unpacker};

	const IDN:&str = "RIGOL TECHNOLOGIES,DS1104Z,DS1ZA0000,00.04.04";

	fn answer(cmd:&[u8]) -> Vec<u8> {
		match cmd {
			b"*IDN?\n"             => format!("{}\n", IDN).into_bytes(),
			b":TRIGger:STATus?\n"  => b"STOP\n".to_vec(),
			b":WAVeform:DATA?\n"   => b"#9000000005hello\n".to_vec(),
			b":TRIGger:MODE?\n"    => b"EDGE".to_vec(),
			_                      => vec![],
		}
	}

	// Device core that answers each completed write from `answer`, handing the response out in
	// device_read sized pieces with END on the last one
	fn serve_device_core(mut stream:TcpStream) {
		let mut cmd:Vec<u8> = vec![];
		let mut pending:Vec<u8> = vec![];

		loop {
			let mark = match stream.read_u32::<BigEndian>() {
				Ok(mark) => mark,
				Err(_)   => return,
			};
			let mut call = vec![0u8; (mark & 0x7fff_ffff) as usize];
			stream.read_exact(&mut call).unwrap();

			let mut args = Unpacker::new(&call);
			let xid = args.unpack_u32().unwrap();
			let _msg_type = args.unpack_enum().unwrap();
			let _rpcvers = args.unpack_u32().unwrap();
			let _prog = args.unpack_u32().unwrap();
			let _vers = args.unpack_u32().unwrap();
			let prc = args.unpack_u32().unwrap();
			unpack_auth(&mut args).unwrap();
			unpack_auth(&mut args).unwrap();

			let mut reply = Packer::new();
			reply.pack_u32(xid).unwrap();
			reply.pack_enum(REPLY).unwrap();
			reply.pack_enum(MSG_ACCEPTED).unwrap();
			pack_auth(&mut reply, AUTH_NULL, &[]).unwrap();
			reply.pack_enum(SUCCESS).unwrap();

			match prc {
				CREATE_LINK => {
					reply.pack_i32(0).unwrap();
					reply.pack_i32(7).unwrap();
					reply.pack_u32(0).unwrap();
					reply.pack_u32(1024).unwrap();
				},
				DEVICE_WRITE => {
					let _link = args.unpack_i32().unwrap();
					let _io_timeout = args.unpack_u32().unwrap();
					let _lock_timeout = args.unpack_u32().unwrap();
					let flags = args.unpack_i32().unwrap();
					let data = args.unpack_variable_len_opaque().unwrap();

					cmd.extend_from_slice(&data);
					if flags & OPERATION_FLAGS_END != 0 {
						pending.extend(answer(&cmd));
						cmd.clear();
					}
					reply.pack_i32(0).unwrap();
					reply.pack_u32(data.len() as u32).unwrap();
				},
				DEVICE_READ => {
					let _link = args.unpack_i32().unwrap();
					let request_size = args.unpack_u32().unwrap() as usize;

					let data:Vec<u8> = pending.drain(..request_size.min(pending.len())).collect();
					let reason = if pending.is_empty() { REASON_END } else { REASON_REQCNT };
					reply.pack_i32(0).unwrap();
					reply.pack_i32(reason).unwrap();
					reply.pack_variable_len_opaque(&data).unwrap();
				},
				DESTROY_LINK => reply.pack_i32(0).unwrap(),
				other => panic!("unexpected procedure {}", other),
			}

			let body = reply.into_buf();
			let mut record:Vec<u8> = vec![];
			record.write_u32::<BigEndian>(body.len() as u32 | 0x8000_0000).unwrap();
			record.extend_from_slice(&body);
			stream.write_all(&record).unwrap();
		}
	}

	fn start_device() -> (Vxi11Session, JoinHandle<()>) {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();

		let server = thread::spawn(move || {
			let (stream, _) = listener.accept().unwrap();
			serve_device_core(stream);
		});

		let core = CoreClient::with_port("127.0.0.1", port, Duration::from_secs(2)).unwrap();
		let mut session = Vxi11Session::open(core, "inst0").unwrap();
		session.set_timeout(Some(Duration::from_secs(5))).unwrap();

		// Small reads so responses arrive over several device_read calls
		session.set_chunk_size(4);
		(session, server)
	}

	#[test]
	fn consecutive_queries_get_their_own_answers() {
		let (mut session, server) = start_device();

		assert_eq!(session.query("*IDN?").unwrap(), IDN);
		assert_eq!(session.query(":TRIGger:STATus?").unwrap(), "STOP");
		assert_eq!(session.query("*IDN?").unwrap(), IDN);

		drop(session);
		server.join().unwrap();
	}

	#[test]
	fn query_after_a_full_block_read() {
		let (mut session, server) = start_device();

		session.write(":WAVeform:DATA?").unwrap();
		assert_eq!(session.read_bytes(17).unwrap(), b"#9000000005hello\n".to_vec());
		assert_eq!(session.query(":TRIGger:STATus?").unwrap(), "STOP");

		drop(session);
		server.join().unwrap();
	}

	#[test]
	fn end_without_terminator_closes_the_line() {
		let (mut session, server) = start_device();

		assert_eq!(session.query(":TRIGger:MODE?").unwrap(), "EDGE");
		assert_eq!(session.query(":TRIGger:STATus?").unwrap(), "STOP");

		drop(session);
		server.join().unwrap();
	}
}
