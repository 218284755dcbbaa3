
pub const PMAP_PROG:u32 = 100000;
pub const PMAP_VERS:u32 = 2;
pub const PMAP_PORT:u16 = 111;

pub const PMAPPROC_GETPORT:u32 = 3;     // (mapping) -> unsigned int

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use crate::xdr;

use super::{IPPROTO_TCP, IPPROTO_UDP};
use super::xdr_pack;
use super::tcp_clients::TcpClient;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Protocol {
	TCP,
	UDP,
}

impl Protocol {
	pub fn to_u32(self) -> u32 { match self {
		Protocol::TCP => IPPROTO_TCP,
		Protocol::UDP => IPPROTO_UDP,
	}}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
	pub program: u32,
	pub version: u32,
	pub protocol: Protocol,
	pub port: u32,				// XDR carries ports as u32
}

fn pack_getport(packer:&mut xdr::Packer, m:&Mapping) -> io::Result<()> {
	xdr_pack::pack_mapping(packer, m.program, m.version, m.protocol.to_u32(), m.port)
}

/// A PMAPPROC_GETPORT call with xid 0 and null credentials, plus the port to send it to.
///
/// Nothing in the reply gets parsed during discovery; any host that answers is a candidate.
pub fn getport_broadcast_message(m:&Mapping) -> io::Result<(Vec<u8>, u16)> {
	let mut packer = xdr::Packer::new();
	xdr_pack::pack_callheader_no_auth(&mut packer, 0, PMAP_PROG, PMAP_VERS, PMAPPROC_GETPORT)?;
	pack_getport(&mut packer, m)?;
	Ok((packer.into_buf(), PMAP_PORT))
}

pub struct TcpPortMapperClient {
	pub host: String,
	pub tcp_client: TcpClient,
}

impl TcpPortMapperClient {

	pub fn new(host:&str, timeout:Duration) -> io::Result<Self> {
		let tcp_client = TcpClient::connect((host, PMAP_PORT), PMAP_PROG, PMAP_VERS, timeout)?;
		Ok(Self{ host: host.to_owned(), tcp_client })
	}

	pub fn get_port(&mut self, m:&Mapping) -> io::Result<u32> {
		self.tcp_client.start_call(PMAPPROC_GETPORT)?;
		pack_getport(&mut self.tcp_client.packer, m)?;
		self.tcp_client.do_call()?;

		let ans:u32 = self.tcp_client.unpacker.unpack_u32()?;

		if !self.tcp_client.unpacker.all_data_consumed() {
			Err(Error::new(ErrorKind::InvalidData, "Data unexpectedly left over in unpacker after unpacking port"))
		} else if ans == 0 {
			Err(Error::new(ErrorKind::NotFound, format!("Program {:#x} is not registered with the port mapper on {}", m.program, self.host)))
		} else {
			Ok(ans)
		}
	}

}
