use super::transitions::Transitions;
use crate::tokenizer::{self, END_TOKEN};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Frequency tables of one context.
///
/// Maps every observed window (1..=n tokens, space-joined) to the counts of
/// the token that followed it.
///
/// # Responsibilities
/// - Record windows of every order from a token sequence
/// - Look up the next-token table of a window
/// - Merge with another store
///
/// # Invariants
/// - Keys hold between 1 and n tokens
/// - All counts are >= 1
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FrequencyStore {
	windows: HashMap<String, Transitions>,
}

impl FrequencyStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records every window of length 1..=`n` of `tokens`.
	///
	/// For each start position `i` and length `j`, the window `[i, i + j)` is
	/// credited with the token at `i + j`, or the end marker when the window
	/// reaches the end of the sequence.
	pub fn learn<S: AsRef<str>>(&mut self, tokens: &[S], n: usize) {
		for i in 0..tokens.len() {
			for j in 1..=n {
				if i + j > tokens.len() {
					break;
				}
				let window = tokenizer::join(&tokens[i..i + j]);
				let next = tokens.get(i + j).map_or(END_TOKEN, |t| t.as_ref());
				self.observe(window, next);
			}
		}
	}

	/// Records one `window -> next` occurrence.
	pub fn observe(&mut self, window: String, next: &str) {
		self.windows.entry(window).or_default().add(next);
	}

	/// Next-token table of `window`, if it was ever observed.
	pub fn get(&self, window: &str) -> Option<&Transitions> {
		self.windows.get(window)
	}

	/// Number of times `next` followed `window`.
	pub fn count(&self, window: &str, next: &str) -> u64 {
		self.get(window).map_or(0, |t| t.count(next))
	}

	/// Iterates over `(window, transitions)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Transitions)> {
		self.windows.iter().map(|(window, t)| (window.as_str(), t))
	}

	/// Number of distinct windows.
	pub fn len(&self) -> usize {
		self.windows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.windows.is_empty()
	}

	/// Merges another store into this one.
	///
	/// Occurrence counts for matching windows and tokens are summed.
	pub fn merge(&mut self, other: &Self) {
		for (window, transitions) in &other.windows {
			if let Some(existing) = self.windows.get_mut(window) {
				existing.merge(transitions);
			} else {
				self.windows.insert(window.clone(), transitions.clone());
			}
		}
	}

	/// Returns `true` if any window is empty or carries a zero count.
	pub(crate) fn has_invalid_counts(&self) -> bool {
		self.iter().any(|(_, t)| t.is_empty() || t.has_zero_count())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tokenizer::tokenize;

	#[test]
	fn test_learn_records_every_window_up_to_n() {
		let mut store = FrequencyStore::new();
		store.learn(&tokenize("a b c"), 2);

		assert_eq!(store.count("a", "b"), 1);
		assert_eq!(store.count("b", "c"), 1);
		assert_eq!(store.count("c", END_TOKEN), 1);
		assert_eq!(store.count("a b", "c"), 1);
		assert_eq!(store.count("b c", END_TOKEN), 1);
		// Window of 3 tokens exceeds n
		assert!(store.get("a b c").is_none());
		assert_eq!(store.len(), 5);
	}

	#[test]
	fn test_learn_twice_increments_again() {
		let mut store = FrequencyStore::new();
		let tokens = tokenize("hi there friend");
		store.learn(&tokens, 3);
		store.learn(&tokens, 3);

		assert_eq!(store.count("hi", "there"), 2);
		assert_eq!(store.count("hi there", "friend"), 2);
		assert_eq!(store.count("hi there friend", END_TOKEN), 2);
	}

	#[test]
	fn test_learn_empty_sequence() {
		let mut store = FrequencyStore::new();
		store.learn::<String>(&[], 3);
		assert!(store.is_empty());
	}

	#[test]
	fn test_merge() {
		let mut left = FrequencyStore::new();
		left.learn(&tokenize("x y"), 1);
		let mut right = FrequencyStore::new();
		right.learn(&tokenize("x y z"), 1);

		left.merge(&right);
		assert_eq!(left.count("x", "y"), 2);
		assert_eq!(left.count("y", "z"), 1);
		assert_eq!(left.count("y", END_TOKEN), 1);
	}

	#[test]
	fn test_iter_and_invalid_counts() {
		let mut store = FrequencyStore::new();
		store.learn(&tokenize("a b"), 1);

		let mut windows: Vec<&str> = store.iter().map(|(window, _)| window).collect();
		windows.sort_unstable();
		assert_eq!(windows, vec!["a", "b"]);
		assert!(!store.has_invalid_counts());

		store.windows.insert("c".to_owned(), Transitions::new());
		assert!(store.has_invalid_counts());
	}
}
