use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::io::read_file;

/// One conversational exchange used for training.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrainingExample {
	pub context: String,
	pub input: String,
	pub response: String,
}

impl TrainingExample {
	/// Text actually trained: the input and the response joined by `=>`.
	///
	/// Chat drivers seed generation with `"<input> =>"` and keep what follows
	/// the arrow.
	pub fn training_text(&self) -> String {
		format!("{} => {}", self.input, self.response)
	}
}

/// Parses a JSON array of training examples.
pub fn parse_dataset(json: &str) -> ModelResult<Vec<TrainingExample>> {
	Ok(serde_json::from_str(json)?)
}

/// Reads a JSON dataset file.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> ModelResult<Vec<TrainingExample>> {
	parse_dataset(&read_file(path)?)
}
