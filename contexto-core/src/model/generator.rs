use std::collections::HashSet;

use log::debug;
use rand::Rng;

use super::context_model::ContextModel;
use crate::error::{ModelError, ModelResult};
use crate::tokenizer::{self, tokenize};

/// Default maximum number of tokens in a generated response.
pub const DEFAULT_MAX_LENGTH: usize = 20;

/// Function that the "call" and "time" trigger tokens resolve to.
pub const TIME_FUNCTION: &str = "getTime";

/// Replaces a response that merely echoes the input.
pub const FALLBACK_RESPONSE: &str = "I'm not sure how to respond to that.";

/// Replaces a response mixing the "are great" and "are awesome" patterns.
pub const CLARIFICATION_RESPONSE: &str = "I'm not sure what you mean. Could you clarify?";

/// Post-generation guard against echoed or incoherent responses.
///
/// Pure function; the trigger phrases are literal.
pub fn filter_response(response: &str, input: &str) -> String {
	if response.trim() == input.trim() {
		return FALLBACK_RESPONSE.to_owned();
	}
	if response.contains("are great") && response.contains("are awesome") {
		return CLARIFICATION_RESPONSE.to_owned();
	}
	response.to_owned()
}

enum StreamState {
	/// Nothing consumed yet; history is untouched.
	Pending,
	/// The input asked for a function directly.
	Direct(String),
	Running,
	Done,
}

/// Lazy, incremental response generation.
///
/// Yields the response buffer after every appended token, then the filtered
/// final response. A function dispatch yields a single formatted result and
/// ends the stream. A failing function yields one `Err` and ends the stream.
///
/// Created by `ContextModel::generate_response_stream`. The input is pushed to
/// the conversation history when the first item is requested; a stream
/// dropped before that leaves the history untouched.
pub struct ResponseStream<'a, R: Rng> {
	model: &'a mut ContextModel<R>,
	context: String,
	input: String,
	max_length: usize,
	/// Response tokens, seeded from the working context.
	buffer: Vec<String>,
	/// Trailing tokens used as prediction phrase.
	window: Vec<String>,
	/// Tokens that may not be predicted again.
	used: HashSet<String>,
	state: StreamState,
}

impl<'a, R: Rng> ResponseStream<'a, R> {
	fn new(model: &'a mut ContextModel<R>, context: &str, input: &str, max_length: usize) -> Self {
		Self {
			model,
			context: context.to_owned(),
			input: input.to_owned(),
			max_length,
			buffer: Vec::new(),
			window: Vec::new(),
			used: HashSet::new(),
			state: StreamState::Pending,
		}
	}

	/// Records the input and seeds buffer, window and exclusions from the
	/// working context.
	fn start(&mut self) -> StreamState {
		self.model.history.push(&self.input);

		// The working context spans every remembered turn
		let working: Vec<String> = self.model.history.iter().flat_map(tokenize).collect();
		self.buffer = tokenizer::last_n(&working, self.model.n).to_vec();
		self.window = tokenizer::last_n(&self.buffer, Self::window_len(self.model.n)).to_vec();
		self.used = working.into_iter().collect();

		match self.direct_call() {
			Some(name) => StreamState::Direct(name),
			None => StreamState::Running,
		}
	}

	fn window_len(n: usize) -> usize {
		n.saturating_sub(1).max(1)
	}

	/// Finds "call <name>" in the input where `<name>` is an invocable function.
	///
	/// Every "call" token is checked; the first one followed by a known name
	/// wins.
	fn direct_call(&self) -> Option<String> {
		tokenize(&self.input)
			.windows(2)
			.filter(|pair| pair[0] == "call")
			.find_map(|pair| self.model.functions.find_callable(&pair[1]))
			.map(str::to_owned)
	}

	/// Function a predicted token triggers, if any is invocable.
	fn trigger_target(&self, token: &str) -> Option<String> {
		let target = if token == "call" || token == "time" { TIME_FUNCTION } else { token };
		self.model.functions.find_callable(target).map(str::to_owned)
	}

	/// Invokes `name` with the joined buffer and formats the outcome.
	///
	/// `token` is the predicted trigger, absent for a direct call.
	fn dispatch(&mut self, name: &str, token: Option<&str>) -> ModelResult<String> {
		let mut prefix = tokenizer::join(&self.buffer);
		debug!("Function call: {name}");

		let outcome = match self.model.functions.invoke(name, &prefix) {
			Some(outcome) => outcome,
			None => return Ok(self.finish()),
		};
		let result = outcome.map_err(|source| ModelError::Function { name: name.to_owned(), source })?;

		if let Some(token) = token {
			prefix.push(' ');
			prefix.push_str(token);
		}
		Ok(format!("{prefix} [Function Call: {name}] Result: {result}"))
	}

	fn finish(&self) -> String {
		let response = filter_response(&tokenizer::join(&self.buffer), &self.input);
		debug!("Generated response: \"{response}\"");
		response
	}

	fn step(&mut self) -> ModelResult<String> {
		if self.buffer.len() >= self.max_length {
			return Ok(self.finish());
		}

		let Some(token) = self.model.predict_tokens(&self.context, &self.window, &self.used) else {
			return Ok(self.finish());
		};

		if let Some(name) = self.trigger_target(&token) {
			return self.dispatch(&name, Some(&token));
		}

		self.buffer.push(token.clone());
		self.used.insert(token);
		self.window = tokenizer::last_n(&self.buffer, Self::window_len(self.model.n)).to_vec();
		self.state = StreamState::Running;
		Ok(tokenizer::join(&self.buffer))
	}
}

impl<R: Rng> Iterator for ResponseStream<'_, R> {
	type Item = ModelResult<String>;

	fn next(&mut self) -> Option<Self::Item> {
		let state = match std::mem::replace(&mut self.state, StreamState::Done) {
			StreamState::Pending => self.start(),
			state => state,
		};
		match state {
			StreamState::Pending | StreamState::Done => None,
			StreamState::Direct(name) => Some(self.dispatch(&name, None)),
			StreamState::Running => Some(self.step()),
		}
	}
}

impl<R: Rng> ContextModel<R> {
	/// Generates a response to `input` in `context`.
	///
	/// Equivalent to draining `generate_response_stream` and keeping its last
	/// item.
	///
	/// # Errors
	/// Returns an error if a dispatched function fails.
	pub fn generate_response(&mut self, context: &str, input: &str, max_length: usize) -> ModelResult<String> {
		let mut response = String::new();
		for item in self.generate_response_stream(context, input, max_length) {
			response = item?;
		}
		Ok(response)
	}

	/// Generates a response to `input` token by token.
	///
	/// # Behavior
	/// - Pushes `input` to the history once the first item is requested; all
	///   remembered inputs form the working context and are excluded from
	///   prediction.
	/// - Seeds the response with the last `n` working tokens.
	/// - "call <name>" in the input invokes `<name>` immediately.
	/// - Otherwise extends the response until `max_length` tokens or no
	///   prediction, dispatching when a predicted token is "call", "time" or
	///   the name of a registered function.
	pub fn generate_response_stream(&mut self, context: &str, input: &str, max_length: usize) -> ResponseStream<'_, R> {
		debug!("Generating response for: \"{input}\" in context: {context}");
		ResponseStream::new(self, context, input, max_length)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ModelConfig;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn seeded(n: usize, contexts: &[&str]) -> ContextModel<StdRng> {
		with_history(n, contexts, 5)
	}

	fn with_history(n: usize, contexts: &[&str], history_size: usize) -> ContextModel<StdRng> {
		let config = ModelConfig::new(n, contexts.iter().copied()).with_history_size(history_size);
		ContextModel::with_rng(config, StdRng::seed_from_u64(11)).expect("model")
	}

	fn stream(model: &mut ContextModel<StdRng>, input: &str) -> Vec<String> {
		model
			.generate_response_stream("casual", input, 10)
			.collect::<ModelResult<_>>()
			.expect("stream")
	}

	#[test]
	fn test_filter_echo_uses_fallback() {
		assert_eq!(filter_response("  hello there ", "hello there"), FALLBACK_RESPONSE);
	}

	#[test]
	fn test_filter_great_and_awesome() {
		assert_eq!(filter_response("cats are great and dogs are awesome", "pets"), CLARIFICATION_RESPONSE);
		assert_eq!(filter_response("cats are great", "pets"), "cats are great");
	}

	#[test]
	fn test_deterministic_chain() {
		let mut model = seeded(3, &["casual"]);
		model.train("hi there how are you", "casual");
		let response = model.generate_response("casual", "hi", DEFAULT_MAX_LENGTH).expect("response");
		assert_eq!(response, "hi there how are you");
	}

	#[test]
	fn test_max_length_stops_generation() {
		let mut model = seeded(2, &["casual"]);
		model.train("one two three four five six", "casual");
		let response = model.generate_response("casual", "one", 3).expect("response");
		assert_eq!(response, "one two three");
	}

	#[test]
	fn test_no_prediction_echo_is_filtered() {
		let mut model = seeded(3, &["casual"]);
		model.train("something else entirely", "casual");
		let response = model.generate_response("casual", "unknown words", 10).expect("response");
		assert_eq!(response, FALLBACK_RESPONSE);
	}

	#[test]
	fn test_stream_emits_each_step_then_final() {
		let mut model = seeded(3, &["casual"]);
		model.train("hi there friend", "casual");
		let items: Vec<String> = model
			.generate_response_stream("casual", "hi", 10)
			.collect::<ModelResult<_>>()
			.expect("stream");
		assert_eq!(items, vec!["hi there", "hi there friend", "hi there friend"]);
	}

	#[test]
	fn test_direct_call_dispatches_immediately() {
		let mut model = seeded(3, &["casual", "formal"]);
		model.train("what time is it", "casual");
		model.register_function("gettime", |_: &str| "12:00:00", "Get current time");

		let items: Vec<String> = model
			.generate_response_stream("casual", "Call GetTime", 10)
			.collect::<ModelResult<_>>()
			.expect("stream");
		assert_eq!(items, vec!["call gettime [Function Call: gettime] Result: 12:00:00"]);
	}

	#[test]
	fn test_predicted_time_token_dispatches_to_get_time() {
		let mut model = seeded(2, &["casual"]);
		model.train("check the time", "casual");
		model.register_function("getTime", |prefix: &str| format!("12:00 for '{prefix}'"), "Get current time");

		let response = model.generate_response("casual", "the", 10).expect("response");
		assert_eq!(response, "the time [Function Call: getTime] Result: 12:00 for 'the'");
	}

	#[test]
	fn test_trigger_without_function_is_plain_text() {
		let mut model = seeded(2, &["casual"]);
		model.train("check the time", "casual");
		let response = model.generate_response("casual", "the", 10).expect("response");
		assert_eq!(response, "the time");
	}

	#[test]
	fn test_function_failure_propagates() {
		let mut model = seeded(2, &["casual"]);
		model.register_fallible_function("broken", |_: &str| Err::<String, _>("no clock"), "Always fails");

		let err = model.generate_response("casual", "call broken", 10).unwrap_err();
		assert!(matches!(err, ModelError::Function { ref name, .. } if name == "broken"));
	}

	#[test]
	fn test_history_spans_turns_and_blocks_repeats() {
		let mut model = seeded(2, &["casual"]);
		model.train("ping pong", "casual");
		model.train("pong ping", "casual");

		assert_eq!(model.generate_response("casual", "ping", 10).expect("first"), "ping pong");
		// Seeded from both turns; "ping" may not come back
		assert_eq!(model.generate_response("casual", "pong", 10).expect("second"), "ping pong");
		assert_eq!(model.history().len(), 2);
	}

	#[test]
	fn test_predicted_call_token_dispatches_to_get_time() {
		let mut model = seeded(2, &["casual"]);
		model.train("will call", "casual");
		model.register_function("gettime", |_: &str| "12:00:00", "Get current time");

		let response = model.generate_response("casual", "will", 10).expect("response");
		assert_eq!(response, "will call [Function Call: gettime] Result: 12:00:00");
	}

	#[test]
	fn test_predicted_function_name_dispatches_to_it() {
		let mut model = seeded(2, &["casual"]);
		model.train("please weather now", "casual");
		model.register_function("Weather", |prefix: &str| format!("sunny({prefix})"), "Weather report");

		assert_eq!(stream(&mut model, "please"), vec!["please weather [Function Call: Weather] Result: sunny(please)"]);
	}

	#[test]
	fn test_stream_emits_steps_before_dispatch() {
		let mut model = seeded(2, &["casual"]);
		model.train("tell me the time", "casual");
		model.register_function("getTime", |_: &str| "noon", "Get current time");

		assert_eq!(
			stream(&mut model, "tell"),
			vec!["tell me", "tell me the", "tell me the time [Function Call: getTime] Result: noon"]
		);
	}

	#[test]
	fn test_evicted_turn_no_longer_seeds_or_excludes() {
		let mut short = with_history(2, &["casual"], 1);
		let mut long = with_history(2, &["casual"], 2);
		for model in [&mut short, &mut long] {
			model.train("red blue green", "casual");
			model.generate_response("casual", "green", 10).expect("first");
		}

		// "green" was evicted: it neither seeds the buffer nor blocks prediction
		assert_eq!(short.generate_response("casual", "blue", 10).expect("second"), "blue green");
		assert_eq!(short.history().iter().collect::<Vec<_>>(), vec!["blue"]);
		assert_eq!(long.generate_response("casual", "blue", 10).expect("second"), "green blue");
	}

	#[test]
	fn test_unconsumed_stream_leaves_history_untouched() {
		let mut model = seeded(2, &["casual"]);
		model.train("hi there", "casual");

		drop(model.generate_response_stream("casual", "hi", 10));
		assert!(model.history().is_empty());

		let mut responses = model.generate_response_stream("casual", "hi", 10);
		assert_eq!(responses.next().and_then(Result::ok).as_deref(), Some("hi there"));
		drop(responses);
		assert_eq!(model.history().len(), 1);
	}
}
