use std::collections::HashMap;
use std::fmt;

use crate::error::FunctionError;

/// Callable invoked on dispatch with the joined response buffer.
pub type Callable = Box<dyn Fn(&str) -> Result<String, FunctionError> + Send>;

/// A registered side-effect function.
///
/// The callable is process-local: entries restored from a snapshot only carry
/// their description until the host registers the function again.
pub struct FunctionEntry {
	pub description: String,
	callable: Option<Callable>,
}

impl FunctionEntry {
	/// Returns `true` if the entry can be invoked.
	pub fn is_callable(&self) -> bool {
		self.callable.is_some()
	}
}

impl fmt::Debug for FunctionEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FunctionEntry")
			.field("description", &self.description)
			.field("callable", &self.callable.is_some())
			.finish()
	}
}

/// Name -> function mapping.
///
/// Names are stored as given and matched case-insensitively on lookup.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
	entries: HashMap<String, FunctionEntry>,
}

impl FunctionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a callable, replacing any entry with the same name.
	pub fn register<F>(&mut self, name: &str, callable: F, description: &str)
	where
		F: Fn(&str) -> Result<String, FunctionError> + Send + 'static,
	{
		self.entries.insert(
			name.to_owned(),
			FunctionEntry { description: description.to_owned(), callable: Some(Box::new(callable)) },
		);
	}

	/// Records a description without a callable.
	///
	/// An existing callable under the same name is kept.
	pub fn describe(&mut self, name: &str, description: &str) {
		self.entries
			.entry(name.to_owned())
			.and_modify(|entry| entry.description = description.to_owned())
			.or_insert_with(|| FunctionEntry { description: description.to_owned(), callable: None });
	}

	/// Finds an invocable entry whose name matches `name` ignoring case.
	///
	/// Returns the registered spelling of the name.
	pub fn find_callable(&self, name: &str) -> Option<&str> {
		if let Some((key, entry)) = self.entries.get_key_value(name) {
			if entry.is_callable() {
				return Some(key.as_str());
			}
		}

		let needle = name.to_lowercase();
		self.entries
			.iter()
			.find(|(key, entry)| entry.is_callable() && key.to_lowercase() == needle)
			.map(|(key, _)| key.as_str())
	}

	/// Invokes the function registered exactly as `name`.
	///
	/// Returns `None` when no callable is registered under that name.
	pub fn invoke(&self, name: &str, argument: &str) -> Option<Result<String, FunctionError>> {
		let callable = self.entries.get(name)?.callable.as_ref()?;
		Some(callable(argument))
	}

	pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
		self.entries.get(name)
	}

	/// Name -> description of every entry, callable or not.
	pub fn descriptions(&self) -> HashMap<String, String> {
		self.entries
			.iter()
			.map(|(name, entry)| (name.clone(), entry.description.clone()))
			.collect()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
