//! Context-partitioned backoff n-gram model.
//!
//! - Per-context frequency tables (`FrequencyStore`, `Transitions`)
//! - Training and backoff prediction (`ContextModel`)
//! - Function registry and dispatch (`FunctionRegistry`)
//! - Response generation with conversation history (`ResponseStream`)
//! - JSON and binary persistence (`Snapshot`)

/// The model itself: contexts, training, prediction, function registration.
pub mod context_model;

/// One context's window -> next-token tables.
pub mod frequency_store;

/// Registered side-effect functions.
pub mod functions;

/// Response generation, streamed or not, and the response filter.
pub mod generator;

/// Bounded memory of past inputs.
pub mod history;

/// Save/load of model state.
pub mod snapshot;

/// Next-token counts with weighted sampling.
pub mod transitions;

pub use context_model::{ContextModel, DEFAULT_CONTEXT};
pub use generator::{DEFAULT_MAX_LENGTH, ResponseStream, filter_response};
pub use snapshot::Snapshot;
