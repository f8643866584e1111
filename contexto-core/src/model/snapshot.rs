use std::collections::HashMap;
use std::path::Path;

use log::info;
use rand::Rng;

use serde::{Deserialize, Serialize};

use super::context_model::ContextModel;
use super::frequency_store::FrequencyStore;
use crate::error::{ModelError, ModelResult};
use crate::io::{read_file, write_file};

/// Persisted state of a `ContextModel`.
///
/// Callables and conversation history are never part of a snapshot; only
/// function descriptions are kept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
	pub n: usize,
	pub contexts: Vec<String>,
	pub models: HashMap<String, FrequencyStore>,
	#[serde(default)]
	pub functions: HashMap<String, String>,
}

impl Snapshot {
	/// Checks the invariants a loaded model relies on.
	fn validate(&self) -> ModelResult<()> {
		if self.n < 1 {
			return Err(ModelError::InvalidSnapshot(format!("order must be >= 1, got {}", self.n)));
		}
		if let Some((context, _)) = self.models.iter().find(|(_, store)| store.has_invalid_counts()) {
			return Err(ModelError::InvalidSnapshot(format!("context '{context}' holds a zero count")));
		}
		Ok(())
	}
}

impl<R: Rng> ContextModel<R> {
	/// Captures order, contexts, frequency tables and function descriptions.
	pub fn snapshot(&self) -> Snapshot {
		Snapshot {
			n: self.n,
			contexts: self.contexts.clone(),
			models: self.stores.clone(),
			functions: self.functions.descriptions(),
		}
	}

	/// Replaces order, contexts and frequency tables with `snapshot`.
	///
	/// The snapshot is validated first; on error the model is untouched.
	/// History and registered callables are kept. Snapshot functions not
	/// registered here are known by description only and cannot be
	/// dispatched until registered again.
	pub fn restore(&mut self, snapshot: Snapshot) -> ModelResult<()> {
		snapshot.validate()?;

		let Snapshot { n, contexts, models, functions } = snapshot;
		self.n = n;
		self.contexts = Vec::new();
		self.stores = models;

		for context in &contexts {
			self.declare_context(context);
		}
		// Partitions missing from the context list are still declared
		let mut orphans: Vec<String> = self
			.stores
			.keys()
			.filter(|context| !self.contexts.contains(*context))
			.cloned()
			.collect();
		orphans.sort();
		for context in &orphans {
			self.declare_context(context);
		}

		for (name, description) in &functions {
			self.functions.describe(name, description);
		}
		Ok(())
	}

	/// Merges the frequency tables of `snapshot` into this model.
	///
	/// # Notes
	/// - Counts of matching windows and tokens are summed.
	/// - Contexts unknown to this model are declared.
	/// - Registered functions keep their description.
	///
	/// # Errors
	/// Returns an error if the orders differ or the snapshot is invalid; the
	/// model is then untouched.
	pub fn merge(&mut self, snapshot: &Snapshot) -> ModelResult<()> {
		snapshot.validate()?;
		if snapshot.n != self.n {
			return Err(ModelError::OrderMismatch { expected: self.n, found: snapshot.n });
		}

		for context in &snapshot.contexts {
			self.declare_context(context);
		}
		for (context, store) in &snapshot.models {
			self.declare_context(context);
			if let Some(existing) = self.stores.get_mut(context) {
				existing.merge(store);
			}
		}
		for (name, description) in &snapshot.functions {
			if self.functions.get(name).is_none() {
				self.functions.describe(name, description);
			}
		}
		Ok(())
	}

	/// Merges a JSON model written by `save` into this one.
	pub fn merge_file<P: AsRef<Path>>(&mut self, path: P) -> ModelResult<()> {
		let contents = read_file(&path)?;
		let snapshot: Snapshot = serde_json::from_str(&contents)?;
		self.merge(&snapshot)?;
		info!("Model merged from: {}", path.as_ref().display());
		Ok(())
	}

	/// Saves the model as JSON, overwriting `path`.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> ModelResult<()> {
		let json = serde_json::to_vec(&self.snapshot())?;
		write_file(&path, &json)?;
		info!("Model saved to: {}", path.as_ref().display());
		Ok(())
	}

	/// Loads a JSON model written by `save`.
	///
	/// # Errors
	/// Fails without modifying the model if the file cannot be read, is not
	/// valid JSON of the expected shape, or breaks a model invariant.
	pub fn load<P: AsRef<Path>>(&mut self, path: P) -> ModelResult<()> {
		let contents = read_file(&path)?;
		let snapshot: Snapshot = serde_json::from_str(&contents)?;
		self.restore(snapshot)?;
		info!("Model loaded from: {}", path.as_ref().display());
		Ok(())
	}

	/// Saves the model in the compact `postcard` encoding.
	pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> ModelResult<()> {
		let bytes = postcard::to_stdvec(&self.snapshot())?;
		write_file(&path, &bytes)?;
		info!("Binary model saved to: {}", path.as_ref().display());
		Ok(())
	}

	/// Loads a model written by `save_binary`.
	pub fn load_binary<P: AsRef<Path>>(&mut self, path: P) -> ModelResult<()> {
		let bytes = std::fs::read(&path)?;
		let snapshot: Snapshot = postcard::from_bytes(&bytes)?;
		self.restore(snapshot)?;
		info!("Binary model loaded from: {}", path.as_ref().display());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ModelConfig;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn seeded(n: usize, contexts: &[&str]) -> ContextModel<StdRng> {
		ContextModel::with_rng(ModelConfig::new(n, contexts.iter().copied()), StdRng::seed_from_u64(5))
			.expect("model")
	}

	#[test]
	fn test_json_layout() {
		let mut model = seeded(2, &["casual"]);
		model.train("hi you", "casual");
		model.register_function("gettime", |_: &str| "now", "Get current time");

		let value: serde_json::Value = serde_json::to_value(model.snapshot()).expect("json");
		assert_eq!(value["n"], 2);
		assert_eq!(value["contexts"], serde_json::json!(["casual"]));
		assert_eq!(value["models"]["casual"]["hi"]["you"], 1);
		assert_eq!(value["models"]["casual"]["you"]["<END>"], 1);
		assert_eq!(value["functions"]["gettime"], "Get current time");
	}

	#[test]
	fn test_restore_rejects_zero_order() {
		let mut model = seeded(3, &["casual"]);
		let mut snapshot = model.snapshot();
		snapshot.n = 0;
		assert!(matches!(model.restore(snapshot), Err(ModelError::InvalidSnapshot(_))));
		assert_eq!(model.n(), 3);
	}

	#[test]
	fn test_restore_rejects_zero_count() {
		let mut model = seeded(2, &["casual"]);
		model.train("a b", "casual");
		let json = r#"{"n":2,"contexts":["casual"],"models":{"casual":{"a":{"b":0}}},"functions":{}}"#;
		let snapshot: Snapshot = serde_json::from_str(json).expect("parse");
		assert!(model.restore(snapshot).is_err());
		assert_eq!(model.store("casual").map(|s| s.count("a", "b")), Some(1));
	}

	#[test]
	fn test_restore_declares_orphan_partitions() {
		let mut model = seeded(2, &["casual"]);
		let json = r#"{"n":4,"contexts":["formal"],"models":{"formal":{},"tech":{"ai":{"model":2}}}}"#;
		let snapshot: Snapshot = serde_json::from_str(json).expect("parse");
		model.restore(snapshot).expect("restore");

		assert_eq!(model.n(), 4);
		assert_eq!(model.contexts(), &["formal".to_owned(), "tech".to_owned()]);
		assert!(model.store("casual").is_none());
		assert_eq!(model.store("tech").map(|s| s.count("ai", "model")), Some(2));
	}

	#[test]
	fn test_merge_sums_counts_and_adds_contexts() {
		let mut model = seeded(2, &["casual"]);
		model.train("hi there", "casual");

		let mut other = seeded(2, &["casual", "formal"]);
		other.train("hi there", "casual");
		other.train("good day", "formal");

		model.merge(&other.snapshot()).expect("merge");
		assert_eq!(model.contexts(), &["casual".to_owned(), "formal".to_owned()]);
		assert_eq!(model.store("casual").map(|s| s.count("hi", "there")), Some(2));
		assert_eq!(model.store("formal").map(|s| s.count("good", "day")), Some(1));
	}

	#[test]
	fn test_merge_rejects_other_order() {
		let mut model = seeded(2, &["casual"]);
		model.train("hi there", "casual");
		let other = seeded(3, &["casual"]).snapshot();

		assert!(matches!(model.merge(&other), Err(ModelError::OrderMismatch { expected: 2, found: 3 })));
		assert_eq!(model.store("casual").map(|s| s.count("hi", "there")), Some(1));
	}

	#[test]
	fn test_restore_keeps_history_and_callables() {
		let mut model = seeded(2, &["casual"]);
		model.register_function("gettime", |_: &str| "12:00:00", "Get current time");
		model.generate_response("casual", "hello", 5).expect("response");

		let fresh = seeded(3, &["formal"]).snapshot();
		model.restore(fresh).expect("restore");
		assert_eq!(model.history().len(), 1);
		assert_eq!(model.functions().find_callable("gettime"), Some("gettime"));
	}
}
