
use std::collections::BTreeMap;

use serde::Serialize;

use super::{DataSet, Preamble};

/// Converts raw sample codes to volts
pub fn bytes_to_voltage(preamble:&Preamble, data:&[u8]) -> Vec<f32> {
	let offset = preamble.yorigin + preamble.yreference as f64;
	data.iter().map(|b| ((*b as f64 - offset) * preamble.yincrement) as f32).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Samples {
	Raw(Vec<u8>),
	Voltage(Vec<f32>),
}

impl Samples {
	pub fn len(&self) -> usize {
		match self {
			Samples::Raw(v)     => v.len(),
			Samples::Voltage(v) => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Per-channel output in a form that doesn't need this crate to read back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRecord {
	pub preamble: Preamble,
	pub data: Samples,
}

pub type ProcessedData = BTreeMap<String, ChannelRecord>;

pub fn process_data(data:DataSet, to_voltage:bool) -> ProcessedData {
	data.into_iter().map(|(chan, (preamble, raw))| {
		let samples = if to_voltage {
			Samples::Voltage(bytes_to_voltage(&preamble, &raw))
		} else {
			Samples::Raw(raw)
		};
		(chan, ChannelRecord{ preamble, data: samples })
	}).collect()
}
