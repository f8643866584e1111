use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::io::read_file;
use crate::model::DEFAULT_CONTEXT;
use crate::model::history::DEFAULT_HISTORY_SIZE;

/// Default model order.
pub const DEFAULT_ORDER: usize = 3;

/// Construction parameters of a `ContextModel`.
///
/// Every field falls back to its default when missing from a config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
	/// Maximum window length (order N), must be >= 1.
	pub n: usize,
	/// Declared contexts, in order. Empty means a single default context.
	pub contexts: Vec<String>,
	/// Number of past inputs kept as working context.
	pub history_size: usize,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			n: DEFAULT_ORDER,
			contexts: vec![DEFAULT_CONTEXT.to_owned()],
			history_size: DEFAULT_HISTORY_SIZE,
		}
	}
}

impl ModelConfig {
	/// Creates a configuration with the default history size.
	pub fn new<I, S>(n: usize, contexts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			n,
			contexts: contexts.into_iter().map(Into::into).collect(),
			..Self::default()
		}
	}

	pub fn with_history_size(mut self, history_size: usize) -> Self {
		self.history_size = history_size;
		self
	}

	/// Reads a JSON configuration file.
	pub fn from_json_file<P: AsRef<Path>>(path: P) -> ModelResult<Self> {
		let contents = read_file(path)?;
		Ok(serde_json::from_str(&contents)?)
	}
}
