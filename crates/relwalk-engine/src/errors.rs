//! Validation errors and event-dispatch outcomes.
//!
//! Errors carry names as [`Name`] / [`NameClass`] values, never preformatted
//! strings, so callers can render them under their own prefix policy.

use std::sync::Arc;

use relwalk_core::names::{Name, NameClass};

/// A recoverable validation error. The walker that produced one has advanced
/// into a recovery state; the caller may keep firing events.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("unexpected element {0}")]
    UnexpectedElement(Name),

    #[error("unexpected attribute {0}")]
    UnexpectedAttribute(Name),

    #[error("attribute missing: {0}")]
    MissingAttribute(Arc<NameClass>),

    /// A text or attribute value the schema rejects, with the datatype's
    /// diagnostic where one exists.
    #[error("bad value: {diagnostic}")]
    BadValue { diagnostic: String },

    #[error("no branch of a choice accepts the input")]
    ChoiceExhausted,

    #[error("text not allowed here")]
    UnexpectedText,

    #[error("unexpected end tag {0}")]
    UnexpectedEndTag(Name),

    /// Required content is still missing at an end tag or at document end.
    #[error("content is not complete")]
    IncompleteContent,
}

/// Outcome of handing one event to a walker.
#[derive(Debug, Clone, PartialEq)]
pub enum FireResult {
    /// Consumed without error.
    Matched,
    /// This walker cannot consume the event at all; its state is unchanged.
    /// Routing information for composite walkers, never user-visible.
    NoMatch,
    /// Consumed, with errors; the walker entered a recovery state.
    Errors(Vec<ValidationError>),
}

impl FireResult {
    pub fn is_no_match(&self) -> bool {
        matches!(self, FireResult::NoMatch)
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, FireResult::Matched)
    }

    /// Wrap a list of errors, treating an empty list as a clean match.
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            FireResult::Matched
        } else {
            FireResult::Errors(errors)
        }
    }
}
