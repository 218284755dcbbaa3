
use std::io::{self, Error, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

const RECV_BUFF_LEN:usize = 1500;

/// Sends one datagram to the limited broadcast address and hands back replies one at a time.
pub struct BroadcastUdpClient {
	pub socket: UdpSocket,
	pub port: u16,
	recv_buff: [u8; RECV_BUFF_LEN],
}

impl BroadcastUdpClient {

	// https://stackoverflow.com/questions/61045602/how-do-you-broadcast-a-udp-datagram-and-receive-the-responses-in-rust

	pub fn bind(port:u16) -> io::Result<Self> {
		let socket = UdpSocket::bind("0.0.0.0:0")?;
		socket.set_broadcast(true)?;
		Ok(Self{ socket, port, recv_buff: [0; RECV_BUFF_LEN] })
	}

	pub fn send(&mut self, msg:&[u8]) -> io::Result<()> {
		let dest = SocketAddrV4::new(Ipv4Addr::BROADCAST, self.port);
		let n = self.socket.send_to(msg, dest)?;
		if n != msg.len() {
			return Err(Error::new(ErrorKind::WriteZero, "Sent the wrong number of bytes"));
		}
		Ok(())
	}

	/// Waits at most `timeout` for a reply; `None` means nothing arrived in time.
	/// The reply's content is left in the receive buffer and only the sender is returned.
	pub fn recv_from(&mut self, timeout:Duration) -> io::Result<Option<SocketAddr>> {
		if timeout == Duration::from_secs(0) {
			return Ok(None);
		}
		self.socket.set_read_timeout(Some(timeout))?;

		match self.socket.recv_from(&mut self.recv_buff) {
			Ok((_, addr)) => Ok(Some(addr)),
			Err(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => Ok(None),
			Err(e) => Err(e),
		}
	}

}
