//! Finding a scope without knowing its address.
//!
//! VXI-11 instruments run an RPC port mapper, so a PMAPPROC_GETPORT call for the device-core
//! program sent to the broadcast address gets answers from every instrument on the subnet. The
//! replies are never parsed: each new sender is opened through the resource template and asked
//! `*IDN?`, and the first one matching the identity pattern wins.
//!
//! Each broadcast is followed by a window of `timeout` in which replies are handled; the wait
//! for every reply is bounded by what's left of that window, so probing slow candidates eats
//! into it instead of extending it.

use std::collections::HashSet;
use std::io::{self, ErrorKind};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use regex::Regex;

use crate::config::{Config, ADDR_PLACEHOLDER};
use crate::devices::ds1000z::DS1000Z;
use crate::error::{Error, Result};
use crate::rpc::port_mapping::{getport_broadcast_message, Mapping, Protocol, PMAP_PORT};
use crate::rpc::udp_clients::BroadcastUdpClient;
use crate::session::{fixup_resource, open_resource, Session};
use crate::vxi11::{DEVICE_CORE_PROG, DEVICE_CORE_VERS};

/// Sends the discovery datagram and hands back who answered
pub trait Broadcast {
	fn send(&mut self, msg:&[u8]) -> io::Result<()>;

	/// Waits up to `timeout` for one reply; `None` if nothing arrived
	fn recv(&mut self, timeout:Duration) -> io::Result<Option<IpAddr>>;
}

/// Opens a resource name as a session
pub trait Connector {
	fn open(&mut self, resource:&str) -> io::Result<Box<dyn Session>>;
}

pub struct BroadcastSocket {
	client: BroadcastUdpClient,
}

impl BroadcastSocket {
	pub fn bind(port:u16) -> io::Result<Self> { Ok(BroadcastSocket{ client: BroadcastUdpClient::bind(port)? }) }
}

impl Broadcast for BroadcastSocket {
	fn send(&mut self, msg:&[u8]) -> io::Result<()> { self.client.send(msg) }

	fn recv(&mut self, timeout:Duration) -> io::Result<Option<IpAddr>> {
		Ok(self.client.recv_from(timeout)?.map(|addr| addr.ip()))
	}
}

/// Opens resources for real, over the network
pub struct VisaConnector;

impl Connector for VisaConnector {
	fn open(&mut self, resource:&str) -> io::Result<Box<dyn Session>> { open_resource(resource) }
}

pub struct Discovered {
	pub addr: IpAddr,
	pub resource: String,
	pub idn: String,
	pub session: Box<dyn Session>,
}

// Failures that just mean "not our instrument" or "nobody there"
fn is_transport_failure(e:&io::Error) -> bool {
	if e.raw_os_error().is_some() {
		return true;
	}
	match e.kind() {
		ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
		| ErrorKind::NotConnected | ErrorKind::AddrNotAvailable | ErrorKind::BrokenPipe
		| ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::UnexpectedEof
		| ErrorKind::Interrupted | ErrorKind::NotFound => true,
		_ => false,
	}
}

pub struct Discoverer {
	resource_pattern: String,
	idn_re: Regex,
	loops: u32,
	timeout: Duration,
	probe_timeout: Duration,
	message: Vec<u8>,
	port: u16,
}

impl Discoverer {

	pub fn from_config(config:&Config) -> Result<Self> {
		let idn_re = Regex::new(&config.idn_pattern)
			.map_err(|e| Error::user(format!("invalid identity pattern {:?}: {}", config.idn_pattern, e)))?;

		let mapping = Mapping {
			program: DEVICE_CORE_PROG,
			version: DEVICE_CORE_VERS,
			protocol: Protocol::TCP,
			port: 0,
		};
		let (message, port) = getport_broadcast_message(&mapping)?;

		Ok(Discoverer {
			resource_pattern: config.resource_pattern.clone(),
			idn_re,
			loops: config.discovery.loops,
			timeout: config.discovery.timeout(),
			probe_timeout: config.discovery.probe_timeout(),
			message,
			port,
		})
	}

	/// UDP port the discovery datagram goes to
	pub fn port(&self) -> u16 { self.port }

	pub fn message(&self) -> &[u8] { &self.message }

	pub fn resource_for(&self, addr:&IpAddr) -> String { self.resource_pattern.replace(ADDR_PLACEHOLDER, &addr.to_string()) }

	/// Broadcasts `loops` times and probes every new responder. `Ok(None)` means nothing matched.
	pub fn discover<B, C>(&self, bcast:&mut B, connector:&mut C) -> Result<Option<Discovered>>
		where B: Broadcast + ?Sized, C: Connector + ?Sized
	{
		let mut seen:HashSet<IpAddr> = HashSet::new();

		for i in 0..self.loops {
			debug!("discovery broadcast {} of {}", i + 1, self.loops);
			bcast.send(&self.message)?;

			let loop_end = Instant::now() + self.timeout;
			loop {
				let now = Instant::now();
				if now >= loop_end {
					break;
				}

				let addr = match bcast.recv(loop_end - now)? {
					Some(addr) => addr,
					None       => break,
				};

				if !seen.insert(addr) {
					continue;
				}

				if let Some(found) = self.try_addr(connector, addr) {
					info!("found {} at {}", found.idn, found.resource);
					return Ok(Some(found));
				}
			}
		}

		info!("no instrument matching {:?} answered", self.idn_re.as_str());
		Ok(None)
	}

	fn try_addr<C: Connector + ?Sized>(&self, connector:&mut C, addr:IpAddr) -> Option<Discovered> {
		let resource = self.resource_for(&addr);
		debug!("probing {}", resource);

		match self.probe(connector, &resource) {
			Ok(Some((idn, session))) => Some(Discovered{ addr, resource, idn, session }),
			Ok(None) => None,
			Err(ref e) if is_transport_failure(e) => {
				debug!("{} did not answer: {}", resource, e);
				None
			},
			Err(e) => {
				warn!("unexpected error while trying to open {}: {}", resource, e);
				None
			},
		}
	}

	fn probe<C: Connector + ?Sized>(&self, connector:&mut C, resource:&str) -> io::Result<Option<(String, Box<dyn Session>)>> {
		let mut session = connector.open(resource)?;
		fixup_resource(session.as_mut());

		// Plenty of things answer a port mapper broadcast; don't wait long on the ones that aren't scopes
		let normal_timeout = session.timeout();
		session.set_timeout(Some(self.probe_timeout))?;

		let idn = session.query("*IDN?")?;
		if self.idn_re.is_match(&idn) {
			session.set_timeout(normal_timeout)?;
			Ok(Some((idn, session)))
		} else {
			debug!("{} is {:?}, not a match", resource, idn);
			if let Err(e) = session.close() {
				debug!("closing {}: {}", resource, e);
			}
			Ok(None)
		}
	}

}

/// Runs discovery on the local network
pub fn discover(config:&Config) -> Result<Option<Discovered>> {
	let discoverer = Discoverer::from_config(config)?;
	let mut bcast = BroadcastSocket::bind(discoverer.port())?;
	discoverer.discover(&mut bcast, &mut VisaConnector)
}

/// How to reach the scope
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
	/// Host name or IP, reached over VXI-11
	Address(String),
	/// A full resource name
	Name(String),
	Discover,
}

impl Target {
	pub fn from_args(address:Option<String>, name:Option<String>) -> Self {
		match (address, name) {
			(Some(addr), _) => Target::Address(addr),
			(None, Some(name)) => Target::Name(name),
			(None, None) => Target::Discover,
		}
	}
}

pub fn connect_with<B, C>(target:Target, config:&Config, bcast:&mut B, connector:&mut C) -> Result<DS1000Z>
	where B: Broadcast + ?Sized, C: Connector + ?Sized
{
	let session = match target {
		Target::Address(addr) => connector.open(&format!("TCPIP::{}::INSTR", addr))?,
		Target::Name(name)    => connector.open(&name)?,
		Target::Discover      => {
			match Discoverer::from_config(config)?.discover(bcast, connector)? {
				Some(found) => found.session,
				None        => return Err(Error::user("could not discover a scope, and none was specified")),
			}
		},
	};
	Ok(DS1000Z::new(session))
}

pub fn connect(target:Target, config:&Config) -> Result<DS1000Z> {
	match target {
		Target::Discover => {
			let mut bcast = BroadcastSocket::bind(PMAP_PORT)?;
			connect_with(target, config, &mut bcast, &mut VisaConnector)
		},
		_ => connect_with(target, config, &mut NoBroadcast, &mut VisaConnector),
	}
}

// Stands in when no discovery is going to happen
struct NoBroadcast;

impl Broadcast for NoBroadcast {
	fn send(&mut self, _msg:&[u8]) -> io::Result<()> { Ok(()) }
	fn recv(&mut self, _timeout:Duration) -> io::Result<Option<IpAddr>> { Ok(None) }
}
