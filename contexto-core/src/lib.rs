//! Context-aware n-gram language model.
//!
//! This crate provides a word-level n-gram engine including:
//! - Independent frequency tables per context (tone, register, domain...)
//! - Backoff prediction with frequency-weighted random sampling
//! - Multi-token response generation over a bounded conversation history
//! - Interception of generation to call registered functions
//! - JSON and compact binary persistence
//!
//! ```no_run
//! use contexto_core::model::{ContextModel, DEFAULT_MAX_LENGTH};
//!
//! let mut model = ContextModel::new(3, ["casual", "formal"])?;
//! model.train("Hey there! How's it going?", "casual");
//! model.register_function("gettime", |_: &str| "12:00:00", "Get current time");
//! let reply = model.generate_response("casual", "hey", DEFAULT_MAX_LENGTH)?;
//! # Ok::<(), contexto_core::error::ModelError>(())
//! ```

/// Model configuration (order, contexts, history size).
pub mod config;

/// JSON training datasets.
pub mod dataset;

/// Error types.
pub mod error;

/// Core model, generation and persistence.
pub mod model;

/// Whitespace tokenizer and window helpers.
pub mod tokenizer;

/// File helpers.
pub mod io;
