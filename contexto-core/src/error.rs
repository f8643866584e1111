use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error returned by a failing registered function.
pub type FunctionError = Box<dyn StdError + Send + Sync>;

/// Error type for model operations.
///
/// "No prediction" and "unknown context" are not errors: they surface as
/// `None` or as an empty partition respectively.
#[derive(Debug, Error)]
pub enum ModelError {
	/// The model order must be at least 1.
	#[error("Invalid model order: {0} (must be >= 1)")]
	InvalidOrder(usize),

	/// File could not be read or written.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON snapshot or dataset is not valid.
	#[error("Malformed JSON: {0}")]
	Json(#[from] serde_json::Error),

	/// Binary snapshot could not be encoded or decoded.
	#[error("Malformed binary snapshot: {0}")]
	Binary(#[from] postcard::Error),

	/// Merged models must share the same order.
	#[error("Order mismatch: model has n = {expected}, snapshot has n = {found}")]
	OrderMismatch { expected: usize, found: usize },

	/// Snapshot parsed but violates a model invariant.
	#[error("Invalid snapshot: {0}")]
	InvalidSnapshot(String),

	/// A registered function failed during dispatch.
	#[error("Function '{name}' failed: {source}")]
	Function {
		name: String,
		#[source]
		source: FunctionError,
	},
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
