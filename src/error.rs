//! Error type for scope operations.
//!
//! The transport layers (`xdr`, `rpc`, `vxi11`, `session`) speak `io::Result`; everything above
//! them returns [`Error`], which keeps the distinction the command line cares about:
//!
//! - `Format`: the instrument sent something we can't decode. Never retried.
//! - `User`: a precondition the user can fix (stop the scope, name a file, ...). Shown as a usage message.
//! - `Transport`: a failed round trip. Aborts the whole operation; only discovery swallows these.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	#[error("format error: {0}")]
	Format(String),

	#[error("{0}")]
	User(String),

	#[error("transport error: {0}")]
	Transport(#[from] io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("CBOR error: {0}")]
	Cbor(#[from] serde_cbor::Error),
}

impl Error {
	pub fn format<S: Into<String>>(msg:S) -> Self { Error::Format(msg.into()) }
	pub fn user<S: Into<String>>(msg:S) -> Self { Error::User(msg.into()) }

	pub fn is_user(&self) -> bool { matches!(self, Error::User(_)) }
}
