#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Walker runtime for relwalk.
//!
//! The engine consumes a prepared [`Grammar`](relwalk_core::Grammar) from
//! `relwalk-core` and validates a stream of abstract parse events against
//! it. Create a [`Validator`] per document:
//!
//! ```
//! use std::sync::Arc;
//! use relwalk_core::datatype::Registry;
//! use relwalk_core::event::Event;
//! use relwalk_core::names::NameClass;
//! use relwalk_core::schema::{Grammar, Pattern, SchemaBuilder};
//! use relwalk_engine::Validator;
//!
//! let registry = Arc::new(Registry::new());
//! let mut builder = SchemaBuilder::new();
//! let content = builder.push(Pattern::Empty);
//! let root = builder.push(Pattern::Element {
//!     name: Arc::new(NameClass::name("", "doc")),
//!     content,
//! });
//! let schema = builder.finish(root, &registry).expect("valid schema");
//! let grammar = Grammar::new(schema, registry);
//!
//! let mut validator = Validator::new(&grammar);
//! assert!(validator.fire_event(&Event::enter_start_tag("", "doc")).is_empty());
//! assert!(validator.fire_event(&Event::LeaveStartTag).is_empty());
//! assert!(validator.fire_event(&Event::end_tag("", "doc")).is_empty());
//! assert!(validator.end().is_empty());
//! ```
//!
//! At every step [`Validator::possible`] reports the set of events that
//! would be legal next, which is what makes guided editing work.

pub mod errors;
pub mod trace;
pub mod validator;

mod walker;

pub use errors::{FireResult, ValidationError};
pub use trace::{NoopTracer, Tracer};
pub use validator::Validator;

/// Walker construction on the grammar handle itself.
pub trait GrammarExt {
    /// A fresh validator positioned at the grammar's start pattern.
    fn new_walker(&self) -> Validator;
}

impl GrammarExt for relwalk_core::Grammar {
    fn new_walker(&self) -> Validator {
        Validator::new(self)
    }
}

#[cfg(test)]
mod validator_tests;
