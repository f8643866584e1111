use std::collections::{BTreeMap, HashSet};

use rand::Rng;

use serde::{Deserialize, Serialize};

use crate::tokenizer::END_TOKEN;


/// Next-token counts observed after one window.
///
/// The end marker is stored like any other follower, so a table records
/// how often a window closed a training text.
///
/// ## Responsibilities:
/// - Accumulate next-token occurrences during training
/// - Pick a next token using weighted random sampling
/// - Merge with another table observed for the same window
///
/// ## Invariants
/// - Each occurrence count is strictly positive
/// - Counts only grow
///
/// Tokens are kept ordered so that a seeded random source always walks
/// candidates in the same order.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transitions {
	/// Example: { "there" => 42, "<END>" => 3 }
	counts: BTreeMap<String, u64>,
}

impl Transitions {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one occurrence of `next_token`.
	pub fn add(&mut self, next_token: &str) {
		*self.counts.entry(next_token.to_owned()).or_insert(0) += 1;
	}

	/// Number of times `next_token` was observed.
	pub fn count(&self, next_token: &str) -> u64 {
		self.counts.get(next_token).copied().unwrap_or(0)
	}

	/// Iterates over `(next_token, count)` pairs, end marker included.
	pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
		self.counts.iter().map(|(token, count)| (token.as_str(), *count))
	}

	pub fn len(&self) -> usize {
		self.counts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}

	/// Picks a next token with probability proportional to its count.
	///
	/// The end marker and every token in `exclude` carry no probability
	/// mass. Returns `None` when no eligible candidate remains.
	///
	/// Draws `r` in `[0, total)` and returns the first eligible token, in
	/// lexical order, whose count exceeds what remains of `r`.
	pub fn sample<R: Rng>(&self, rng: &mut R, exclude: &HashSet<String>) -> Option<&str> {
		let candidates: Vec<(&str, u64)> = self
			.iter()
			.filter(|(token, _)| *token != END_TOKEN && !exclude.contains(*token))
			.collect();

		let total: u64 = candidates.iter().map(|(_, count)| count).sum();
		if total == 0 {
			return None;
		}

		let mut r = rng.random_range(0..total);
		for (token, count) in &candidates {
			if r < *count {
				return Some(*token);
			}
			r -= count;
		}

		// Unreachable while counts sum to `total`
		candidates.last().map(|(token, _)| *token)
	}

	/// Merges another table into this one by summing counts.
	pub fn merge(&mut self, other: &Self) {
		for (token, count) in &other.counts {
			*self.counts.entry(token.clone()).or_insert(0) += *count;
		}
	}

	/// Returns `true` if some recorded count is zero.
	pub(crate) fn has_zero_count(&self) -> bool {
		self.counts.values().any(|count| *count == 0)
	}
}
