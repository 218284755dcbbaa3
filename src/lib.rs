
// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes, power supplies, waveform generators, etc
pub mod vxi11;

// Line-oriented sessions over raw sockets or VXI-11 links, named like VISA resources
pub mod session;

// Length-prefixed binary blocks used for bulk responses
pub mod block;

// Instruments built on top of sessions
pub mod devices;

// Finding an instrument with a broadcast port mapper call
pub mod discover;

// Writing results to disk
pub mod output;

pub mod config;
pub mod error;

pub use crate::config::Config;
pub use crate::devices::ds1000z::DS1000Z;
pub use crate::error::{Error, Result};
