
// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_LOCK_TIMEOUT:u32 = 10000;
pub const DEFAULT_IO_TIMEOUT:u32 = 10000;

pub const OPERATION_FLAGS_END:i32 = 8;

// Reason bits in a device_read response
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use log::debug;

use crate::rpc::port_mapping::{TcpPortMapperClient, Mapping, Protocol};
use crate::rpc::tcp_clients::TcpClient;

fn err(kind:ErrorKind, msg:&str) -> io::Error { Error::new(kind, msg) }

fn device_error(code:i32) -> io::Result<()> {
	match code {
		0  => Ok(()),
		1  => Err(err(ErrorKind::InvalidInput, "Syntax error")),
		3  => Err(err(ErrorKind::ConnectionRefused, "Device not accessible")),
		4  => Err(err(ErrorKind::NotConnected, "Invalid link identifier")),
		5  => Err(err(ErrorKind::InvalidInput, "Parameter error")),
		9  => Err(err(ErrorKind::Other, "Out of resources")),
		11 => Err(err(ErrorKind::Other, "Device locked by another link")),
		15 => Err(err(ErrorKind::TimedOut, "I/O timeout")),
		17 => Err(err(ErrorKind::Other, "I/O error")),
		21 => Err(err(ErrorKind::InvalidInput, "Invalid address")),
		23 => Err(err(ErrorKind::Interrupted, "Abort")),
		_  => Err(Error::new(ErrorKind::Other, format!("Unknown device error {}", code))),
	}
}

pub mod xdr_pack;

pub struct CoreClient {
	client: TcpClient,
	opt_link: Option<Link>,
}

#[derive(Debug, Clone, Copy)]
pub struct Link {
	pub link_id: i32,
	pub abort_port: u32,
	pub max_recv_size: u32,
}

impl CoreClient {

	fn get_link(&self) -> io::Result<Link> {
		self.opt_link.ok_or_else(|| err(ErrorKind::NotConnected, "No link"))
	}

	pub fn new(host:&str, timeout:Duration) -> io::Result<Self> {

		// Find the port to use for the core program
		let mut pmap_client = TcpPortMapperClient::new(host, timeout)?;

		let mapping = Mapping {
			program: DEVICE_CORE_PROG,
			version: DEVICE_CORE_VERS,
			protocol: Protocol::TCP,
			port: 0,
		};

		let port = pmap_client.get_port(&mapping)?;
		debug!("{} device core is on port {}", host, port);

		Self::with_port(host, port as u16, timeout)
	}

	/// Skips the port mapper when the device core port is already known
	pub fn with_port(host:&str, port:u16, timeout:Duration) -> io::Result<Self> {
		let client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, timeout)?;
		Ok(CoreClient{ client, opt_link: None })
	}

	pub fn set_socket_timeout(&mut self, timeout:Option<Duration>) -> io::Result<()> {
		self.client.stream.set_read_timeout(timeout)?;
		self.client.stream.set_write_timeout(timeout)
	}

	pub fn set_nodelay(&mut self, nodelay:bool) -> io::Result<()> { self.client.stream.set_nodelay(nodelay) }

	pub fn link(&self) -> Option<Link> { self.opt_link }

	/// The device reports how much it will take in one write; raising it only changes how we fragment
	pub fn set_max_recv_size(&mut self, n:u32) -> io::Result<()> {
		match self.opt_link.as_mut() {
			Some(link) => { link.max_recv_size = n; Ok(()) },
			None       => Err(err(ErrorKind::NotConnected, "No link")),
		}
	}

	pub fn create_link(&mut self, device:&str) -> io::Result<()> {
		if self.opt_link.is_some() {
			return Err(err(ErrorKind::AlreadyExists, "Already connected to a link"));
		}

		self.client.start_call(CREATE_LINK)?;
		xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, DEFAULT_LOCK_TIMEOUT, device)?;
		self.client.do_call()?;

		let error:i32         = self.client.unpacker.unpack_i32()?;
		let link_id:i32       = self.client.unpacker.unpack_i32()?;
		let abort_port:u32    = self.client.unpacker.unpack_u32()?;
		let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;

		device_error(error)?;
		self.opt_link = Some(Link{ link_id, abort_port, max_recv_size });
		Ok(())
	}

	/// Writes all of `data`, split into pieces no bigger than the link's max_recv_size
	pub fn write(&mut self, data:&[u8], io_timeout:u32) -> io::Result<()> {
		let link = self.get_link()?;
		let chunk_len = (link.max_recv_size as usize).max(1);

		let mut chunks = data.chunks(chunk_len).peekable();
		while let Some(chunk) = chunks.next() {
			let flags = if chunks.peek().is_none() { OPERATION_FLAGS_END } else { 0 };

			self.client.start_call(DEVICE_WRITE)?;
			xdr_pack::pack_device_write_parms(&mut self.client.packer, link.link_id, io_timeout, DEFAULT_LOCK_TIMEOUT, flags, chunk)?;
			self.client.do_call()?;

			let error:i32 = self.client.unpacker.unpack_i32()?;
			let size:u32  = self.client.unpacker.unpack_u32()?;
			device_error(error)?;

			if size as usize != chunk.len() {
				return Err(err(ErrorKind::WriteZero, "Number of bytes in confirmation doesn't match number of bytes sent"));
			}
		}

		Ok(())
	}

	/// One device_read call. Returns the data and whether the device flagged the end of the message.
	pub fn read(&mut self, request_size:u32, io_timeout:u32) -> io::Result<(Vec<u8>, bool)> {
		let link = self.get_link()?;

		self.client.start_call(DEVICE_READ)?;
		xdr_pack::pack_device_read_parms(&mut self.client.packer, link.link_id, request_size, io_timeout, DEFAULT_LOCK_TIMEOUT, 0, 0)?;
		self.client.do_call()?;

		let error:i32    = self.client.unpacker.unpack_i32()?;
		let reason:i32   = self.client.unpacker.unpack_i32()?;
		let data:Vec<u8> = self.client.unpacker.unpack_variable_len_opaque()?;
		device_error(error)?;

		if reason & !(REASON_REQCNT | REASON_CHR | REASON_END) != 0 {
			return Err(err(ErrorKind::InvalidData, "Reserved bits set in device_read reason"));
		}

		Ok((data, reason & REASON_END != 0))
	}

	pub fn destroy_link(&mut self) -> io::Result<()> {
		let link = match self.opt_link.take() {
			Some(link) => link,
			None       => return Err(err(ErrorKind::NotConnected, "No link to destroy")),
		};

		self.client.start_call(DESTROY_LINK)?;
		xdr_pack::pack_device_link(&mut self.client.packer, link.link_id)?;
		self.client.do_call()?;

		device_error(self.client.unpacker.unpack_i32()?)
	}

}
