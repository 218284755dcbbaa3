//! A scripted DS1000Z that answers SCPI commands from in-memory channel data.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Error, ErrorKind};
use std::rc::Rc;
use std::time::Duration;

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

use ds1000z::session::Session;

lazy_static! {
	static ref CHAN_DISPLAY_RE: Regex = Regex::new(r"^:(\w+):DISPlay\?$").unwrap();
	static ref MODE_RE: Regex         = Regex::new(r"^:WAVeform:MODE (\w+)$").unwrap();
	static ref FORMAT_RE: Regex       = Regex::new(r"^:WAVeform:FORMat (\w+)$").unwrap();
	static ref SOURCE_RE: Regex       = Regex::new(r"^:WAVeform:SOURce (\w+)$").unwrap();
	static ref START_RE: Regex        = Regex::new(r"^:WAVeform:STARt (\d+)$").unwrap();
	static ref STOP_RE: Regex         = Regex::new(r"^:WAVeform:STOP (\d+)$").unwrap();
}

pub struct ChannelData {
	pub preamble: String,
	pub data: Vec<u8>,
}

#[derive(Default)]
pub struct MockState {
	pub idn: String,
	pub status: String,
	pub channel_data: BTreeMap<String, ChannelData>,
	pub display_data: Vec<u8>,

	pub writes: Vec<String>,
	pub data_requests: Vec<(usize, usize)>,
	buf: Vec<u8>,

	pub wav_source: String,
	pub wav_mode: String,
	pub wav_format: String,
	wav_start: usize,
	wav_stop: usize,

	pub read_termination: String,
	pub write_termination: String,
	pub chunk_size: usize,
	pub max_recv_size: Option<u32>,
	pub nodelay: bool,
	pub timeout: Option<Duration>,
	pub timeout_history: Vec<Option<Duration>>,
	pub closed: bool,
}

impl MockState {

	fn send(&mut self, resp:&str) {
		self.buf.extend_from_slice(resp.as_bytes());
		self.buf.push(b'\n');
	}

	fn send_block(&mut self, data:&[u8]) {
		self.buf.extend_from_slice(format!("#9{:09}", data.len()).as_bytes());
		self.buf.extend_from_slice(data);
		self.buf.push(b'\n');
	}

	fn handle(&mut self, cmd:&str) {
		self.writes.push(cmd.to_owned());

		if cmd == "*IDN?" {
			let idn = self.idn.clone();
			self.send(&idn);
		} else if cmd.starts_with(":DISPlay:DATA? ") {
			let image = self.display_data.clone();
			self.send_block(&image);
		} else if cmd == ":TRIGger:STATus?" {
			let status = self.status.clone();
			self.send(&status);
		} else if let Some(caps) = CHAN_DISPLAY_RE.captures(cmd) {
			let on = self.channel_data.contains_key(&caps[1]);
			self.send(if on { "1" } else { "0" });
		} else if let Some(caps) = MODE_RE.captures(cmd) {
			self.wav_mode = caps[1].to_owned();
		} else if let Some(caps) = FORMAT_RE.captures(cmd) {
			self.wav_format = caps[1].to_owned();
		} else if let Some(caps) = SOURCE_RE.captures(cmd) {
			self.wav_source = caps[1].to_owned();
		} else if cmd == ":WAVeform:PREamble?" {
			let preamble = self.channel_data[&self.wav_source].preamble.clone();
			self.send(&preamble);
		} else if let Some(caps) = START_RE.captures(cmd) {
			self.wav_start = caps[1].parse().unwrap();
		} else if let Some(caps) = STOP_RE.captures(cmd) {
			self.wav_stop = caps[1].parse().unwrap();
		} else if cmd == ":WAVeform:DATA?" {
			let (start, stop) = (self.wav_start, self.wav_stop);
			self.data_requests.push((start, stop));
			let chunk = self.channel_data[&self.wav_source].data[start - 1..stop].to_vec();
			self.send_block(&chunk);
		} else {
			panic!("unknown command: {:?}", cmd);
		}
	}

	pub fn data_queries(&self) -> usize {
		self.writes.iter().filter(|w| w.as_str() == ":WAVeform:DATA?" || w.as_str() == ":WAVeform:PREamble?").count()
	}

}

/// Session handle; the state stays reachable through `state` after the scope takes ownership
pub struct MockSession {
	pub state: Rc<RefCell<MockState>>,
}

impl MockSession {

	pub fn new() -> (Self, Rc<RefCell<MockState>>) {
		let state = Rc::new(RefCell::new(MockState {
			idn: "MOCK".to_owned(),
			status: "STOP".to_owned(),
			..MockState::default()
		}));
		(MockSession{ state: state.clone() }, state)
	}

}

impl Session for MockSession {

	fn write(&mut self, cmd:&str) -> io::Result<()> {
		self.state.borrow_mut().handle(cmd);
		Ok(())
	}

	fn read(&mut self) -> io::Result<String> {
		let mut state = self.state.borrow_mut();
		match state.buf.iter().position(|b| *b == b'\n') {
			Some(idx) => {
				let line:Vec<u8> = state.buf.drain(..=idx).collect();
				Ok(String::from_utf8(line[..idx].to_vec()).unwrap())
			},
			None => Err(Error::new(ErrorKind::TimedOut, "read with nothing in buffer")),
		}
	}

	fn read_bytes(&mut self, n:usize) -> io::Result<Vec<u8>> {
		let mut state = self.state.borrow_mut();
		if state.buf.len() < n {
			return Err(Error::new(ErrorKind::UnexpectedEof, format!("wanted {} bytes, have {}", n, state.buf.len())));
		}
		Ok(state.buf.drain(..n).collect())
	}

	fn timeout(&self) -> Option<Duration> { self.state.borrow().timeout }

	fn set_timeout(&mut self, timeout:Option<Duration>) -> io::Result<()> {
		let mut state = self.state.borrow_mut();
		state.timeout = timeout;
		state.timeout_history.push(timeout);
		Ok(())
	}

	fn set_read_termination(&mut self, term:&str) { self.state.borrow_mut().read_termination = term.to_owned(); }
	fn set_write_termination(&mut self, term:&str) { self.state.borrow_mut().write_termination = term.to_owned(); }
	fn set_chunk_size(&mut self, n:usize) { self.state.borrow_mut().chunk_size = n; }

	fn set_max_recv_size(&mut self, n:u32) -> io::Result<()> {
		self.state.borrow_mut().max_recv_size = Some(n);
		Ok(())
	}

	fn set_nodelay(&mut self, nodelay:bool) -> io::Result<()> {
		self.state.borrow_mut().nodelay = nodelay;
		Ok(())
	}

	fn close(&mut self) -> io::Result<()> {
		self.state.borrow_mut().closed = true;
		Ok(())
	}

}

pub fn random_samples(n:usize) -> Vec<u8> {
	let mut rng = rand::thread_rng();
	(0..n).map(|_| rng.gen::<u8>()).collect()
}

pub fn preamble_str(mode_code:u8, points:usize) -> String {
	format!("0,{},{},1,1.000000e-09,-3.000000e-03,0,4.132813e-01,0,122", mode_code, points)
}
