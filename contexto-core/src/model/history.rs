use std::collections::VecDeque;

/// Default number of remembered inputs.
pub const DEFAULT_HISTORY_SIZE: usize = 5;

/// Bounded conversation memory of raw (untokenized) inputs.
///
/// Pushing past capacity evicts the oldest entry.
#[derive(Clone, Debug)]
pub struct ConversationHistory {
	capacity: usize,
	entries: VecDeque<String>,
}

impl ConversationHistory {
	/// Creates an empty history. A capacity of 0 is raised to 1 so that the
	/// current input is always part of the working context.
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		Self { capacity, entries: VecDeque::with_capacity(capacity) }
	}

	/// Appends `input`, dropping the oldest entries beyond capacity.
	pub fn push(&mut self, input: &str) {
		self.entries.push_back(input.to_owned());
		while self.entries.len() > self.capacity {
			self.entries.pop_front();
		}
	}

	/// Oldest to newest.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(String::as_str)
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}
}

impl Default for ConversationHistory {
	fn default() -> Self {
		Self::new(DEFAULT_HISTORY_SIZE)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_push_evicts_oldest() {
		let mut history = ConversationHistory::new(2);
		history.push("one");
		history.push("two");
		history.push("three");
		assert_eq!(history.iter().collect::<Vec<_>>(), vec!["two", "three"]);
	}

	#[test]
	fn test_zero_capacity_keeps_latest() {
		let mut history = ConversationHistory::new(0);
		history.push("first");
		history.push("second");
		assert_eq!(history.capacity(), 1);
		assert_eq!(history.iter().collect::<Vec<_>>(), vec!["second"]);
	}

	#[test]
	fn test_default_capacity() {
		let history = ConversationHistory::default();
		assert_eq!(history.capacity(), DEFAULT_HISTORY_SIZE);
		assert!(history.is_empty());
	}
}
