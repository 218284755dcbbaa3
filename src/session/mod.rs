
// Line-oriented instrument sessions, addressed by VISA-style resource names

use std::fmt;
use std::io::{self, Error, ErrorKind};
use std::str::FromStr;
use std::time::Duration;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

pub mod instr;
pub mod socket;

pub use self::instr::Vxi11Session;
pub use self::socket::SocketSession;

lazy_static! {
	static ref SOCKET_RE: Regex = Regex::new("(?i)^TCPIP\\d*::([^:]+)::(\\d+)::SOCKET$").unwrap();
	static ref INSTR_RE: Regex  = Regex::new("(?i)^TCPIP\\d*::([^:]+)(?:::([^:]+))?::INSTR$").unwrap();
}

pub const CONNECT_TIMEOUT_MS:u64 = 2000;
pub const DEFAULT_DEVICE:&str = "inst0";

// Resource fix-up values; the defaults are tuned for small control messages, not bulk transfers
pub const TERMINATION:&str = "\n";
pub const CHUNK_SIZE:usize = 1_000_000;
pub const MAX_RECV_SIZE:u32 = 1_000_000;

/// A request/response connection to one instrument.
///
/// Instruments keep state between commands (the selected waveform source, mode and format among them),
/// so the order of calls on a session matters.
pub trait Session {
	fn write(&mut self, cmd:&str) -> io::Result<()>;

	/// One response line with the read terminator stripped
	fn read(&mut self) -> io::Result<String>;

	fn query(&mut self, cmd:&str) -> io::Result<String> {
		self.write(cmd)?;
		self.read()
	}

	fn read_bytes(&mut self, n:usize) -> io::Result<Vec<u8>>;

	/// `None` blocks forever
	fn timeout(&self) -> Option<Duration>;
	fn set_timeout(&mut self, timeout:Option<Duration>) -> io::Result<()>;

	fn set_read_termination(&mut self, term:&str);
	fn set_write_termination(&mut self, term:&str);
	fn set_chunk_size(&mut self, n:usize);

	// Only meaningful for sessions sitting on a socket
	fn set_max_recv_size(&mut self, _n:u32) -> io::Result<()> { Ok(()) }
	fn set_nodelay(&mut self, _nodelay:bool) -> io::Result<()> { Ok(()) }

	fn close(&mut self) -> io::Result<()> { Ok(()) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceName {
	Socket { host: String, port: u16 },
	Instr { host: String, device: String },
}

impl FromStr for ResourceName {
	type Err = io::Error;

	fn from_str(s:&str) -> io::Result<Self> {
		let s = s.trim();
		if let Some(caps) = SOCKET_RE.captures(s) {
			let port = caps[2].parse::<u16>()
				.map_err(|_| Error::new(ErrorKind::InvalidInput, format!("Invalid port in resource name {:?}", s)))?;
			Ok(ResourceName::Socket{ host: caps[1].to_owned(), port })
		} else if let Some(caps) = INSTR_RE.captures(s) {
			let device = caps.get(2).map(|m| m.as_str()).unwrap_or(DEFAULT_DEVICE);
			Ok(ResourceName::Instr{ host: caps[1].to_owned(), device: device.to_owned() })
		} else {
			Err(Error::new(ErrorKind::InvalidInput, format!("Unsupported resource name {:?}", s)))
		}
	}
}

impl fmt::Display for ResourceName {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		match self {
			ResourceName::Socket{ host, port }   => write!(f, "TCPIP::{}::{}::SOCKET", host, port),
			ResourceName::Instr{ host, device } => write!(f, "TCPIP::{}::{}::INSTR", host, device),
		}
	}
}

pub fn open_resource(name:&str) -> io::Result<Box<dyn Session>> {
	let connect_timeout = Duration::from_millis(CONNECT_TIMEOUT_MS);

	debug!("opening {}", name);
	match name.parse::<ResourceName>()? {
		ResourceName::Socket{ host, port }   => Ok(Box::new(SocketSession::connect(&host, port, connect_timeout)?)),
		ResourceName::Instr{ host, device } => Ok(Box::new(Vxi11Session::connect(&host, &device, connect_timeout)?)),
	}
}

/// Configures a freshly opened session for DS1000Z scopes and bulk waveform reads.
pub fn fixup_resource(session:&mut dyn Session) {
	session.set_read_termination(TERMINATION);
	session.set_write_termination(TERMINATION);
	session.set_chunk_size(CHUNK_SIZE);

	// The device's maxRecvSize bounds what it accepts per write, but clients also use it to cap
	// reads. We never write anything large, and 1500-byte reads mean far too many round trips.
	if let Err(e) = session.set_max_recv_size(MAX_RECV_SIZE) {
		warn!("failed to set max_recv_size: {}", e);
	}

	if let Err(e) = session.set_nodelay(true) {
		warn!("failed to set TCP_NODELAY: {}", e);
	}
}

/// Strips one trailing terminator (and a carriage return before it) from a response line
pub(crate) fn strip_termination(mut line:Vec<u8>, term:&[u8]) -> io::Result<String> {
	if !term.is_empty() && line.ends_with(term) {
		line.truncate(line.len() - term.len());
	}
	if line.last() == Some(&b'\r') {
		line.pop();
	}
	String::from_utf8(line).map_err(|_| Error::new(ErrorKind::InvalidData, "Unable to parse response as UTF-8"))
}
