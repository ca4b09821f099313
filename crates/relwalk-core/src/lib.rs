#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data model for relwalk, a streaming Relax NG validator.
//!
//! This crate holds everything that is immutable at validation time: the
//! name-class algebra, parse events and possibility sets, the namespace
//! resolver, the datatype interface, the pattern arena with its resolution
//! and preparation passes, and the versioned JSON schema codec. The walker
//! runtime lives in `relwalk-engine`.
//!
//! The input is a *simplified* Relax NG pattern tree; the simplification
//! pipeline and the XML tokenizer are external collaborators.

pub mod convert;
pub mod datatype;
pub mod event;
pub mod json;
pub mod names;
pub mod resolver;
pub mod schema;

pub use datatype::{Registry, ValueError};
pub use event::{Event, EventSet, PossibleEvent, ValueHint};
pub use names::{Name, NameClass};
pub use resolver::NameResolver;
pub use schema::{Grammar, Pattern, PatternId, Schema, SchemaBuilder};

/// Errors raised while building a schema: construction, resolution and
/// preparation. Once a grammar exists, validation never raises — it reports
/// error values through the engine instead.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Refs with no matching define, each name reported once.
    #[error("unresolved references: {}", names.join(", "))]
    UnresolvedRefs { names: Vec<String> },

    #[error("unknown datatype {library:?}/{name} at {path}")]
    UnknownDatatype {
        library: String,
        name: String,
        path: String,
    },

    #[error("value {raw:?} rejected by its datatype at {path}: {source}")]
    InvalidValue {
        raw: String,
        path: String,
        source: ValueError,
    },

    #[error("bad datatype parameters at {path}: {source}")]
    InvalidParams { path: String, source: ValueError },

    #[error("unsupported schema format version {0}")]
    Version(u64),

    #[error("malformed schema tree: {0}")]
    Malformed(String),

    #[error("malformed schema JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod datatype_tests;
#[cfg(test)]
mod schema_tests;
