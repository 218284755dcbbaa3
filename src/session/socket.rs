
use std::io::{self, Error, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use log::debug;

use crate::rpc::tcp_clients::connect_timeout;
use super::{strip_termination, Session};

// Small until the resource fix-up raises it
const DEFAULT_CHUNK_SIZE:usize = 20 * 1024;

/// Raw TCP socket session (`TCPIP::host::port::SOCKET`), one command or response per line.
pub struct SocketSession {
	stream: TcpStream,
	rx: Vec<u8>,
	timeout: Option<Duration>,
	read_termination: Vec<u8>,
	write_termination: Vec<u8>,
	chunk_size: usize,
	max_recv_size: usize,
}

impl SocketSession {

	pub fn connect(host:&str, port:u16, timeout:Duration) -> io::Result<Self> {
		let stream = connect_timeout((host, port), timeout)?;
		Ok(Self::from_stream(stream))
	}

	pub fn from_stream(stream:TcpStream) -> Self {
		Self {
			stream,
			rx: Vec::new(),
			timeout: None,
			read_termination: b"\n".to_vec(),
			write_termination: b"\n".to_vec(),
			chunk_size: DEFAULT_CHUNK_SIZE,
			max_recv_size: DEFAULT_CHUNK_SIZE,
		}
	}

	// Pulls one recv's worth of data into the receive buffer
	fn fill(&mut self) -> io::Result<()> {
		let want = self.chunk_size.min(self.max_recv_size).max(1);
		let start = self.rx.len();
		self.rx.resize(start + want, 0);

		let n = match self.stream.read(&mut self.rx[start..]) {
			Ok(n)  => n,
			Err(e) => { self.rx.truncate(start); return Err(e) },
		};
		self.rx.truncate(start + n);

		if n == 0 {
			return Err(Error::new(ErrorKind::UnexpectedEof, "Instrument closed the connection"));
		}
		Ok(())
	}

}

impl Session for SocketSession {

	fn write(&mut self, cmd:&str) -> io::Result<()> {
		debug!("-> {}", cmd);
		let mut data = Vec::with_capacity(cmd.len() + self.write_termination.len());
		data.extend_from_slice(cmd.as_bytes());
		data.extend_from_slice(&self.write_termination);
		self.stream.write_all(&data)
	}

	fn read(&mut self) -> io::Result<String> {
		let last = *self.read_termination.last().unwrap_or(&b'\n');
		let mut searched = 0;
		loop {
			if let Some(idx) = self.rx[searched..].iter().position(|b| *b == last) {
				let line:Vec<u8> = self.rx.drain(..searched + idx + 1).collect();
				return strip_termination(line, &self.read_termination);
			}
			searched = self.rx.len();
			self.fill()?;
		}
	}

	fn read_bytes(&mut self, n:usize) -> io::Result<Vec<u8>> {
		while self.rx.len() < n {
			self.fill()?;
		}
		Ok(self.rx.drain(..n).collect())
	}

	fn timeout(&self) -> Option<Duration> { self.timeout }

	fn set_timeout(&mut self, timeout:Option<Duration>) -> io::Result<()> {
		self.stream.set_read_timeout(timeout)?;
		self.stream.set_write_timeout(timeout)?;
		self.timeout = timeout;
		Ok(())
	}

	fn set_read_termination(&mut self, term:&str) { self.read_termination = term.as_bytes().to_vec(); }
	fn set_write_termination(&mut self, term:&str) { self.write_termination = term.as_bytes().to_vec(); }
	fn set_chunk_size(&mut self, n:usize) { self.chunk_size = n; }

	fn set_max_recv_size(&mut self, n:u32) -> io::Result<()> {
		self.max_recv_size = n as usize;
		Ok(())
	}

	fn set_nodelay(&mut self, nodelay:bool) -> io::Result<()> { self.stream.set_nodelay(nodelay) }

	fn close(&mut self) -> io::Result<()> {
		match self.stream.shutdown(Shutdown::Both) {
			Err(ref e) if e.kind() == ErrorKind::NotConnected => Ok(()),
			other => other,
		}
	}

}
