use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::fmt::Display;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::frequency_store::FrequencyStore;
use super::functions::FunctionRegistry;
use super::history::ConversationHistory;
use crate::config::ModelConfig;
use crate::dataset::TrainingExample;
use crate::error::{FunctionError, ModelError, ModelResult};
use crate::tokenizer::{self, tokenize};

/// Context used when a model is built without any.
pub const DEFAULT_CONTEXT: &str = "default";

/// Context-partitioned backoff n-gram model.
///
/// This struct manages:
/// - `n`: the maximum window length trained and queried.
/// - `contexts`: declared context labels, in declaration order.
/// - `stores`: one `FrequencyStore` per context.
/// - `functions`: side-effect functions that generation may dispatch to.
/// - `history`: the last inputs given to the response generator.
/// - `rng`: the random source used for weighted sampling.
///
/// A single instance is not meant to be shared between concurrent
/// conversations: the history is per instance.
pub struct ContextModel<R: Rng = StdRng> {
	pub(super) n: usize,
	pub(super) contexts: Vec<String>,
	pub(super) stores: HashMap<String, FrequencyStore>,
	pub(super) functions: FunctionRegistry,
	pub(super) history: ConversationHistory,
	pub(super) rng: R,
}

impl ContextModel<StdRng> {
	/// Creates a model of order `n` over `contexts`, seeded from the OS.
	///
	/// # Errors
	/// Returns an error if `n < 1`.
	pub fn new<I, S>(n: usize, contexts: I) -> ModelResult<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::with_config(ModelConfig::new(n, contexts))
	}

	/// Creates a model from a configuration, seeded from the OS.
	pub fn with_config(config: ModelConfig) -> ModelResult<Self> {
		Self::with_rng(config, StdRng::from_os_rng())
	}
}

impl<R: Rng> ContextModel<R> {
	/// Creates a model drawing its randomness from `rng`.
	///
	/// Duplicate context labels are ignored. An empty context list declares
	/// the single `DEFAULT_CONTEXT`.
	///
	/// # Errors
	/// Returns an error if `config.n < 1`.
	pub fn with_rng(config: ModelConfig, rng: R) -> ModelResult<Self> {
		if config.n < 1 {
			return Err(ModelError::InvalidOrder(config.n));
		}

		let mut model = Self {
			n: config.n,
			contexts: Vec::new(),
			stores: HashMap::new(),
			functions: FunctionRegistry::new(),
			history: ConversationHistory::new(config.history_size),
			rng,
		};

		if config.contexts.is_empty() {
			model.declare_context(DEFAULT_CONTEXT);
		}
		for context in &config.contexts {
			model.declare_context(context);
		}
		Ok(model)
	}

	/// Model order (maximum window length).
	pub fn n(&self) -> usize {
		self.n
	}

	/// Declared contexts, in declaration order.
	pub fn contexts(&self) -> &[String] {
		&self.contexts
	}

	/// Frequency tables of `context`, if declared.
	pub fn store(&self, context: &str) -> Option<&FrequencyStore> {
		self.stores.get(context)
	}

	pub fn history(&self) -> &ConversationHistory {
		&self.history
	}

	pub fn clear_history(&mut self) {
		self.history.clear();
	}

	/// Registry of side-effect functions.
	pub fn functions(&self) -> &FunctionRegistry {
		&self.functions
	}

	/// Name -> description of every known function.
	pub fn function_descriptions(&self) -> HashMap<String, String> {
		self.functions.descriptions()
	}

	/// Declares `context` with an empty store. No-op if already declared.
	pub(super) fn declare_context(&mut self, context: &str) {
		if !self.stores.contains_key(context) {
			self.stores.insert(context.to_owned(), FrequencyStore::new());
		}
		if !self.contexts.iter().any(|c| c == context) {
			self.contexts.push(context.to_owned());
		}
	}

	/// Trains `text` into `context`.
	///
	/// Every window of 1..=n tokens is credited with the token following it
	/// (or the end marker). An undeclared context is created on the fly.
	pub fn train(&mut self, text: &str, context: &str) {
		if !self.stores.contains_key(context) {
			warn!("Training into undeclared context '{context}', creating it");
			self.declare_context(context);
		}

		let tokens = tokenize(text);
		let n = self.n;
		if let Some(store) = self.stores.get_mut(context) {
			store.learn(&tokens, n);
		}
		debug!("Trained: \"{text}\" in context: {context}");
	}

	/// Trains `text` into the first declared context.
	pub fn train_default(&mut self, text: &str) {
		let context = self
			.contexts
			.first()
			.cloned()
			.unwrap_or_else(|| DEFAULT_CONTEXT.to_owned());
		self.train(text, &context);
	}

	/// Trains every example as `"<input> => <response>"` into its context.
	pub fn train_dataset(&mut self, examples: &[TrainingExample]) {
		for example in examples {
			self.train(&example.training_text(), &example.context);
		}
		info!("Trained {} examples", examples.len());
	}

	/// Predicts the token following `phrase` in `context`.
	///
	/// Tries the longest trailing window first (up to `n` tokens) and backs
	/// off one token at a time. Within an order, the candidate is drawn with
	/// probability proportional to its count; tokens in `exclude` and the end
	/// marker are never returned.
	///
	/// Returns `None` when no order yields a candidate, or when `context` is
	/// not declared.
	pub fn predict(&mut self, context: &str, phrase: &str, exclude: &HashSet<String>) -> Option<String> {
		self.predict_tokens(context, &tokenize(phrase), exclude)
	}

	pub(super) fn predict_tokens(
		&mut self,
		context: &str,
		tokens: &[String],
		exclude: &HashSet<String>,
	) -> Option<String> {
		let Some(store) = self.stores.get(context) else {
			debug!("Unknown context '{context}', no prediction");
			return None;
		};

		// Orders above the phrase length would look up the same window
		for order in (1..=self.n.min(tokens.len())).rev() {
			let window = tokenizer::join(tokenizer::last_n(tokens, order));
			debug!("Looking up window: \"{window}\"");

			if let Some(token) = store.get(&window).and_then(|t| t.sample(&mut self.rng, exclude)) {
				debug!("Predicted: \"{token}\"");
				return Some(token.to_owned());
			}
		}

		debug!("No valid prediction found");
		None
	}

	/// Registers an infallible function under `name`.
	///
	/// See `register_fallible_function`.
	pub fn register_function<F, T>(&mut self, name: &str, function: F, description: &str)
	where
		F: Fn(&str) -> T + Send + 'static,
		T: Display,
	{
		self.register_fallible_function(name, move |argument| Ok::<T, Infallible>(function(argument)), description);
	}

	/// Registers `function` under `name`, replacing any previous entry.
	///
	/// The phrase "call <name> function" is trained into every declared
	/// context so that it becomes predictable text. An `Err` returned by the
	/// function during generation fails that generation call.
	pub fn register_fallible_function<F, T, E>(&mut self, name: &str, function: F, description: &str)
	where
		F: Fn(&str) -> Result<T, E> + Send + 'static,
		T: Display,
		E: Into<FunctionError>,
	{
		self.functions.register(
			name,
			move |argument: &str| function(argument).map(|value| value.to_string()).map_err(Into::into),
			description,
		);

		let phrase = format!("call {name} function");
		for context in self.contexts.clone() {
			self.train(&phrase, &context);
		}
		info!("Registered function: {name}");
	}
}
