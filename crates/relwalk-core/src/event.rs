//! Parse events and possibility sets.
//!
//! Two semantic domains share the event vocabulary: input events carry
//! concrete `(uri, local)` strings, possibility events carry the name class
//! of the pattern that would admit them. Compact input events bundle a whole
//! start tag or attribute; they never appear in possibility sets.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::discriminant;
use std::sync::Arc;

use crate::names::NameClass;

/// An input parse event, as produced by an external tokenizer.
///
/// Empty `text` events are forbidden at the boundary. Attribute values,
/// even empty ones, must be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Beginning of `<tag`.
    EnterStartTag { uri: String, local: String },
    /// The `>` of a start tag.
    LeaveStartTag,
    /// `</tag>`.
    EndTag { uri: String, local: String },
    /// Attribute name token.
    AttributeName { uri: String, local: String },
    /// Attribute value, post entity resolution.
    AttributeValue { value: String },
    /// Maximal contiguous text run.
    Text { value: String },
    /// Compact: name and value in one event.
    AttributeNameAndValue {
        uri: String,
        local: String,
        value: String,
    },
    /// Compact: a whole start tag with its attributes.
    StartTagAndAttributes {
        uri: String,
        local: String,
        attrs: Vec<(String, String, String)>,
    },
}

impl Event {
    pub fn text(value: impl Into<String>) -> Self {
        Event::Text {
            value: value.into(),
        }
    }

    pub fn enter_start_tag(uri: impl Into<String>, local: impl Into<String>) -> Self {
        Event::EnterStartTag {
            uri: uri.into(),
            local: local.into(),
        }
    }

    pub fn end_tag(uri: impl Into<String>, local: impl Into<String>) -> Self {
        Event::EndTag {
            uri: uri.into(),
            local: local.into(),
        }
    }

    pub fn attribute_name(uri: impl Into<String>, local: impl Into<String>) -> Self {
        Event::AttributeName {
            uri: uri.into(),
            local: local.into(),
        }
    }

    pub fn attribute_value(value: impl Into<String>) -> Self {
        Event::AttributeValue {
            value: value.into(),
        }
    }

    /// Attribute name, value and compact attribute events.
    pub fn is_attribute_kind(&self) -> bool {
        matches!(
            self,
            Event::AttributeName { .. }
                | Event::AttributeValue { .. }
                | Event::AttributeNameAndValue { .. }
        )
    }

    pub fn is_compact(&self) -> bool {
        matches!(
            self,
            Event::AttributeNameAndValue { .. } | Event::StartTagAndAttributes { .. }
        )
    }
}

/// What text a text-accepting position would admit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueHint {
    /// Any character data.
    Any,
    /// Exactly this lexical form.
    Literal(Arc<str>),
}

/// An event that would be accepted next.
///
/// Name-bearing kinds carry the admitting name class. Classes compare by
/// identity (`Arc` pointer), not structure: possibility events originating
/// from the same pattern node are interned by construction, which keeps set
/// membership cheap.
#[derive(Debug, Clone)]
pub enum PossibleEvent {
    EnterStartTag(Arc<NameClass>),
    LeaveStartTag,
    EndTag(Arc<NameClass>),
    AttributeName(Arc<NameClass>),
    AttributeValue(ValueHint),
    Text(ValueHint),
}

impl PossibleEvent {
    pub fn is_attribute_kind(&self) -> bool {
        matches!(
            self,
            PossibleEvent::AttributeName(_) | PossibleEvent::AttributeValue(_)
        )
    }

    /// The name class carried by a name-bearing possibility.
    pub fn name_class(&self) -> Option<&Arc<NameClass>> {
        match self {
            PossibleEvent::EnterStartTag(nc)
            | PossibleEvent::EndTag(nc)
            | PossibleEvent::AttributeName(nc) => Some(nc),
            _ => None,
        }
    }
}

impl PartialEq for PossibleEvent {
    fn eq(&self, other: &Self) -> bool {
        use PossibleEvent::*;
        match (self, other) {
            (EnterStartTag(a), EnterStartTag(b))
            | (EndTag(a), EndTag(b))
            | (AttributeName(a), AttributeName(b)) => Arc::ptr_eq(a, b),
            (LeaveStartTag, LeaveStartTag) => true,
            (AttributeValue(a), AttributeValue(b)) | (Text(a), Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PossibleEvent {}

impl Hash for PossibleEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);
        match self {
            PossibleEvent::EnterStartTag(nc)
            | PossibleEvent::EndTag(nc)
            | PossibleEvent::AttributeName(nc) => (Arc::as_ptr(nc) as usize).hash(state),
            PossibleEvent::LeaveStartTag => {}
            PossibleEvent::AttributeValue(hint) | PossibleEvent::Text(hint) => hint.hash(state),
        }
    }
}

impl fmt::Display for PossibleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PossibleEvent::EnterStartTag(nc) => write!(f, "enterStartTag {nc}"),
            PossibleEvent::LeaveStartTag => write!(f, "leaveStartTag"),
            PossibleEvent::EndTag(nc) => write!(f, "endTag {nc}"),
            PossibleEvent::AttributeName(nc) => write!(f, "attributeName {nc}"),
            PossibleEvent::AttributeValue(ValueHint::Any) => write!(f, "attributeValue *"),
            PossibleEvent::AttributeValue(ValueHint::Literal(v)) => {
                write!(f, "attributeValue {v:?}")
            }
            PossibleEvent::Text(ValueHint::Any) => write!(f, "text *"),
            PossibleEvent::Text(ValueHint::Literal(v)) => write!(f, "text {v:?}"),
        }
    }
}

/// A set of possibility events with cheap union and copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSet {
    events: HashSet<PossibleEvent>,
}

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: PossibleEvent) -> bool {
        self.events.insert(event)
    }

    pub fn union_with(&mut self, other: &EventSet) {
        for ev in &other.events {
            self.events.insert(ev.clone());
        }
    }

    pub fn contains(&self, event: &PossibleEvent) -> bool {
        self.events.contains(event)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PossibleEvent> {
        self.events.iter()
    }

    /// Whether any possibility would admit `enterStartTag(ns, local)`.
    pub fn admits_start_tag(&self, ns: &str, local: &str) -> bool {
        self.events.iter().any(|ev| match ev {
            PossibleEvent::EnterStartTag(nc) => nc.matches(ns, local),
            _ => false,
        })
    }
}

impl FromIterator<PossibleEvent> for EventSet {
    fn from_iter<I: IntoIterator<Item = PossibleEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EventSet {
    type Item = &'a PossibleEvent;
    type IntoIter = std::collections::hash_set::Iter<'a, PossibleEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
