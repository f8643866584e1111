/// Reserved next-token recorded when a window ends the trained text.
///
/// Never returned by prediction nor emitted in generated text.
pub const END_TOKEN: &str = "<END>";

/// Lowercases `text` and splits it on whitespace.
///
/// Runs of whitespace never produce empty tokens.
pub fn tokenize(text: &str) -> Vec<String> {
	text.to_lowercase()
		.split_whitespace()
		.map(str::to_owned)
		.collect()
}

/// Renders a token window as a store key.
pub fn join<S: AsRef<str>>(tokens: &[S]) -> String {
	tokens
		.iter()
		.map(|t| t.as_ref())
		.collect::<Vec<_>>()
		.join(" ")
}

/// Returns the last `n` tokens (the whole slice if it is shorter).
pub fn last_n<S>(tokens: &[S], n: usize) -> &[S] {
	&tokens[tokens.len().saturating_sub(n)..]
}
