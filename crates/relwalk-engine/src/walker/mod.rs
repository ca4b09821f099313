//! Walker machinery: one mutable automaton per pattern kind.
//!
//! A walker owns the matching state for one pattern node in one live branch
//! of validation. Composite walkers route events to their children using
//! [`FireResult::NoMatch`] as the routing signal; a walker that returns
//! `NoMatch` has not advanced.
//!
//! The pattern kinds form a closed set, so dispatch is a tagged enum rather
//! than an open hierarchy. `Ref` and `Define` nodes never get a walker of
//! their own: construction collapses them to the referenced body, so trivial
//! indirection costs nothing per event.

mod attribute;
mod compose;
mod element;
mod leaf;

pub(crate) use attribute::AttributeWalker;
pub(crate) use compose::{ChoiceWalker, GroupWalker, InterleaveWalker, OneOrMoreWalker};
pub(crate) use element::ElementWalker;
pub(crate) use leaf::{
    DataWalker, EmptyWalker, ListWalker, NotAllowedWalker, TextWalker, ValueWalker,
};

use std::rc::Rc;

use relwalk_core::datatype::Registry;
use relwalk_core::event::{Event, EventSet};
use relwalk_core::resolver::NameResolver;
use relwalk_core::schema::{Pattern, PatternId, Schema};

use crate::errors::{FireResult, ValidationError};

/// Read-only context threaded through every walker call.
pub(crate) struct Ctx<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) registry: &'a Registry,
    pub(crate) resolver: &'a NameResolver,
}

/// Cached possibility set.
///
/// Cleared on every state transition; cloned walkers keep the parent's cache
/// (still valid until their first transition). The `Rc` is internal only —
/// callers always receive a copied set.
#[derive(Debug, Clone, Default)]
pub(crate) struct PossibleCache {
    set: Option<Rc<EventSet>>,
}

impl PossibleCache {
    pub(crate) fn is_unset(&self) -> bool {
        self.set.is_none()
    }

    pub(crate) fn fill(&mut self, set: EventSet) {
        self.set = Some(Rc::new(set));
    }

    pub(crate) fn get(&self) -> Rc<EventSet> {
        Rc::clone(self.set.as_ref().expect("cache filled before get"))
    }

    pub(crate) fn clear(&mut self) {
        self.set = None;
    }
}

/// The matching automaton for one pattern node.
#[derive(Debug, Clone)]
pub(crate) enum Walker {
    Empty(EmptyWalker),
    Text(TextWalker),
    NotAllowed(NotAllowedWalker),
    Value(ValueWalker),
    Data(DataWalker),
    List(Box<ListWalker>),
    Attribute(Box<AttributeWalker>),
    Element(Box<ElementWalker>),
    Group(Box<GroupWalker>),
    Interleave(Box<InterleaveWalker>),
    Choice(Box<ChoiceWalker>),
    OneOrMore(Box<OneOrMoreWalker>),
}

impl Walker {
    /// Build the walker for a pattern node, collapsing ref/define
    /// indirection first.
    pub(crate) fn new(schema: &Schema, id: PatternId) -> Walker {
        let id = schema.deref(id);
        match schema.pattern(id) {
            Pattern::Empty => Walker::Empty(EmptyWalker),
            Pattern::Text => Walker::Text(TextWalker),
            Pattern::NotAllowed => Walker::NotAllowed(NotAllowedWalker),
            Pattern::Value { raw, .. } => Walker::Value(ValueWalker::new(id, raw)),
            Pattern::Data { .. } => Walker::Data(DataWalker::new(id)),
            Pattern::List { content } => Walker::List(Box::new(ListWalker::new(schema, *content))),
            Pattern::Attribute { name, content } => Walker::Attribute(Box::new(
                AttributeWalker::new(schema, name.clone(), *content),
            )),
            Pattern::Element { name, content } => {
                // Content can hide behind a ref; the prepared attribute flag
                // keys the resolved node, so resolve before storing.
                let content = schema.deref(*content);
                Walker::Element(Box::new(ElementWalker::new(name.clone(), content)))
            }
            Pattern::Group { a, b } => Walker::Group(Box::new(GroupWalker::new(schema, *a, *b))),
            Pattern::Choice { a, b } => Walker::Choice(Box::new(ChoiceWalker::new(schema, *a, *b))),
            Pattern::Interleave { a, b } => {
                Walker::Interleave(Box::new(InterleaveWalker::new(schema, *a, *b)))
            }
            Pattern::OneOrMore { content } => {
                Walker::OneOrMore(Box::new(OneOrMoreWalker::new(schema, *content)))
            }
            Pattern::Define { .. } | Pattern::Ref { .. } => {
                unreachable!("deref collapses ref/define indirection")
            }
        }
    }

    /// Advance on one input event. `NoMatch` leaves the walker untouched.
    pub(crate) fn fire_event(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        match self {
            Walker::Empty(w) => w.fire_event(event),
            Walker::Text(w) => w.fire_event(event),
            Walker::NotAllowed(w) => w.fire_event(event),
            Walker::Value(w) => w.fire_event(event, ctx),
            Walker::Data(w) => w.fire_event(event, ctx),
            Walker::List(w) => w.fire_event(event, ctx),
            Walker::Attribute(w) => w.fire_event(event, ctx),
            Walker::Element(w) => w.fire_event(event, ctx),
            Walker::Group(w) => w.fire_event(event, ctx),
            Walker::Interleave(w) => w.fire_event(event, ctx),
            Walker::OneOrMore(w) => w.fire_event(event, ctx),
            Walker::Choice(w) => {
                let result = w.fire_event(event, ctx);
                // A choice with one dead branch is just the survivor.
                if let Some(survivor) = w.take_sole_survivor() {
                    *self = survivor;
                }
                result
            }
        }
    }

    /// Events acceptable as the next input. Internally cached; the shared
    /// set is cloned before it reaches a caller.
    pub(crate) fn possible(&mut self, ctx: &Ctx<'_>) -> Rc<EventSet> {
        match self {
            Walker::Empty(w) => w.possible(),
            Walker::Text(w) => w.possible(),
            Walker::NotAllowed(w) => w.possible(),
            Walker::Value(w) => w.possible(),
            Walker::Data(w) => w.possible(),
            Walker::List(w) => w.possible(),
            Walker::Attribute(w) => w.possible(ctx),
            Walker::Element(w) => w.possible(ctx),
            Walker::Group(w) => w.possible(ctx),
            Walker::Interleave(w) => w.possible(ctx),
            Walker::Choice(w) => w.possible(ctx),
            Walker::OneOrMore(w) => w.possible(ctx),
        }
    }

    /// Non-destructive terminality check. `attribute` asks only whether
    /// attribute obligations are met (the `leaveStartTag` check).
    pub(crate) fn can_end(&self, ctx: &Ctx<'_>, attribute: bool) -> bool {
        match self {
            Walker::Empty(w) => w.can_end(),
            Walker::Text(w) => w.can_end(),
            Walker::NotAllowed(w) => w.can_end(attribute),
            Walker::Value(w) => w.can_end(attribute),
            Walker::Data(w) => w.can_end(ctx, attribute),
            Walker::List(w) => w.can_end(ctx, attribute),
            Walker::Attribute(w) => w.can_end(attribute),
            Walker::Element(w) => w.can_end(attribute),
            Walker::Group(w) => w.can_end(ctx, attribute),
            Walker::Interleave(w) => w.can_end(ctx, attribute),
            Walker::Choice(w) => w.can_end(ctx, attribute),
            Walker::OneOrMore(w) => w.can_end(ctx, attribute),
        }
    }

    /// Assert terminality, reporting what is still missing.
    pub(crate) fn end(&mut self, ctx: &Ctx<'_>, attribute: bool) -> Vec<ValidationError> {
        match self {
            Walker::Empty(_) | Walker::Text(_) => Vec::new(),
            Walker::NotAllowed(w) => w.end(attribute),
            Walker::Value(w) => w.end(attribute),
            Walker::Data(w) => w.end(ctx, attribute),
            Walker::List(w) => w.end(ctx, attribute),
            Walker::Attribute(w) => w.end(attribute),
            Walker::Element(w) => w.end(attribute),
            Walker::Group(w) => w.end(ctx, attribute),
            Walker::Interleave(w) => w.end(ctx, attribute),
            Walker::Choice(w) => w.end(ctx, attribute),
            Walker::OneOrMore(w) => w.end(ctx, attribute),
        }
    }

    /// No further attribute events will be accepted or offered.
    pub(crate) fn suppress_attributes(&mut self) {
        match self {
            Walker::Empty(_)
            | Walker::Text(_)
            | Walker::NotAllowed(_)
            | Walker::Value(_)
            | Walker::Data(_)
            | Walker::List(_)
            | Walker::Element(_) => {}
            Walker::Attribute(w) => w.suppress_attributes(),
            Walker::Group(w) => w.suppress_attributes(),
            Walker::Interleave(w) => w.suppress_attributes(),
            Walker::Choice(w) => w.suppress_attributes(),
            Walker::OneOrMore(w) => w.suppress_attributes(),
        }
    }
}
