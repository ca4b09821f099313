//! Walkers for the leaf patterns: `Empty`, `Text`, `NotAllowed`, `Value`,
//! `Data` and `List`.

use std::rc::Rc;
use std::sync::Arc;

use relwalk_core::event::{Event, EventSet, PossibleEvent, ValueHint};
use relwalk_core::schema::{Pattern, PatternId, Schema};

use crate::errors::{FireResult, ValidationError};

use super::{Ctx, Walker};

/// True for XML whitespace only (space, tab, CR, LF). The empty string
/// counts as whitespace.
pub(crate) fn is_xml_whitespace(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

/// Matches the empty sequence.
///
/// Stateless, so every instance is interchangeable with every other — the
/// singleton of the pattern model is a zero-sized type here and cloning is
/// free.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EmptyWalker;

impl EmptyWalker {
    pub(crate) fn fire_event(&self, event: &Event) -> FireResult {
        match event {
            // Whitespace-only text is tolerated silently so mixed-content
            // surroundings do not trip over indentation.
            Event::Text { value } if is_xml_whitespace(value) => FireResult::Matched,
            _ => FireResult::NoMatch,
        }
    }

    pub(crate) fn possible(&self) -> Rc<EventSet> {
        Rc::new(EventSet::new())
    }

    pub(crate) fn can_end(&self) -> bool {
        true
    }
}

/// Matches any number of text runs.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TextWalker;

impl TextWalker {
    pub(crate) fn fire_event(&self, event: &Event) -> FireResult {
        match event {
            Event::Text { .. } => FireResult::Matched,
            _ => FireResult::NoMatch,
        }
    }

    pub(crate) fn possible(&self) -> Rc<EventSet> {
        let mut set = EventSet::new();
        set.insert(PossibleEvent::Text(ValueHint::Any));
        Rc::new(set)
    }

    pub(crate) fn can_end(&self) -> bool {
        true
    }
}

/// Matches nothing. Surfaces only in dead branches; simplification removes
/// live occurrences.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NotAllowedWalker;

impl NotAllowedWalker {
    pub(crate) fn fire_event(&self, _event: &Event) -> FireResult {
        FireResult::NoMatch
    }

    pub(crate) fn possible(&self) -> Rc<EventSet> {
        Rc::new(EventSet::new())
    }

    /// `notAllowed` matches no sequence, not even the empty one; only its
    /// (vacuous) attribute obligations are satisfiable.
    pub(crate) fn can_end(&self, attribute: bool) -> bool {
        attribute
    }

    pub(crate) fn end(&self, attribute: bool) -> Vec<ValidationError> {
        if attribute {
            Vec::new()
        } else {
            vec![ValidationError::IncompleteContent]
        }
    }
}

/// Matches one text run equal, per the datatype, to the stored value.
/// Single-shot: unmatched until the first equal run.
#[derive(Debug, Clone)]
pub(crate) struct ValueWalker {
    id: PatternId,
    /// Raw lexical form, kept for possibility display and `end` diagnostics.
    hint: Arc<str>,
    matched: bool,
}

impl ValueWalker {
    pub(crate) fn new(id: PatternId, raw: &str) -> Self {
        Self {
            id,
            hint: Arc::from(raw),
            matched: false,
        }
    }

    pub(crate) fn fire_event(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        let Event::Text { value } = event else {
            return FireResult::NoMatch;
        };
        if self.matched {
            return FireResult::NoMatch;
        }
        let Pattern::Value {
            datatype_library,
            type_name,
            ..
        } = ctx.schema.pattern(self.id)
        else {
            unreachable!("value walker bound to a non-value node")
        };
        let datatype = ctx
            .registry
            .find(datatype_library, type_name)
            .expect("datatypes vetted during preparation");
        let Ok(key) = datatype.parse(value, Some(ctx.resolver)) else {
            return FireResult::NoMatch;
        };
        let stored = ctx
            .schema
            .value_key(self.id)
            .expect("value keys precomputed during preparation");
        if key == stored {
            self.matched = true;
            FireResult::Matched
        } else {
            FireResult::NoMatch
        }
    }

    pub(crate) fn possible(&self) -> Rc<EventSet> {
        let mut set = EventSet::new();
        if !self.matched {
            set.insert(PossibleEvent::Text(ValueHint::Literal(self.hint.clone())));
        }
        Rc::new(set)
    }

    pub(crate) fn can_end(&self, attribute: bool) -> bool {
        // An empty raw form is an empty-value pattern and needs no event.
        attribute || self.matched || self.hint.is_empty()
    }

    pub(crate) fn end(&self, attribute: bool) -> Vec<ValidationError> {
        if self.can_end(attribute) {
            Vec::new()
        } else {
            vec![ValidationError::BadValue {
                diagnostic: format!("expected value {:?}", self.hint),
            }]
        }
    }
}

/// Matches one text run the datatype accepts, minus the optional exception.
#[derive(Debug, Clone)]
pub(crate) struct DataWalker {
    id: PatternId,
    matched: bool,
}

impl DataWalker {
    pub(crate) fn new(id: PatternId) -> Self {
        Self { id, matched: false }
    }

    fn accepts(&self, value: &str, ctx: &Ctx<'_>) -> bool {
        let Pattern::Data {
            datatype_library,
            type_name,
            params,
            except,
        } = ctx.schema.pattern(self.id)
        else {
            unreachable!("data walker bound to a non-data node")
        };
        let datatype = ctx
            .registry
            .find(datatype_library, type_name)
            .expect("datatypes vetted during preparation");
        if datatype
            .disallows(value, params, Some(ctx.resolver))
            .is_err()
        {
            return false;
        }
        // The exception is consulted only once the base match succeeds.
        if let Some(except) = except {
            let mut walker = Walker::new(ctx.schema, *except);
            let excluded = walker.fire_event(&Event::text(value), ctx).is_matched()
                && walker.can_end(ctx, false);
            if excluded {
                return false;
            }
        }
        true
    }

    pub(crate) fn fire_event(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        let Event::Text { value } = event else {
            return FireResult::NoMatch;
        };
        if self.matched || !self.accepts(value, ctx) {
            return FireResult::NoMatch;
        }
        self.matched = true;
        FireResult::Matched
    }

    pub(crate) fn possible(&self) -> Rc<EventSet> {
        let mut set = EventSet::new();
        if !self.matched {
            set.insert(PossibleEvent::Text(ValueHint::Any));
        }
        Rc::new(set)
    }

    pub(crate) fn can_end(&self, ctx: &Ctx<'_>, attribute: bool) -> bool {
        // Without any text run the content is the empty string; the pattern
        // is terminable iff the datatype accepts that.
        attribute || self.matched || self.accepts("", ctx)
    }

    pub(crate) fn end(&self, ctx: &Ctx<'_>, attribute: bool) -> Vec<ValidationError> {
        if self.can_end(ctx, attribute) {
            Vec::new()
        } else {
            vec![ValidationError::BadValue {
                diagnostic: "datatype value required".to_string(),
            }]
        }
    }
}

/// Splits one text run into whitespace-separated tokens and validates each
/// against the content pattern in order.
#[derive(Debug, Clone)]
pub(crate) struct ListWalker {
    content: Walker,
    seen: bool,
}

impl ListWalker {
    pub(crate) fn new(schema: &Schema, content: PatternId) -> Self {
        Self {
            content: Walker::new(schema, content),
            seen: false,
        }
    }

    pub(crate) fn fire_event(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        let Event::Text { value } = event else {
            return FireResult::NoMatch;
        };
        if self.seen {
            return FireResult::NoMatch;
        }
        self.seen = true;

        let mut errors = Vec::new();
        for token in value.split_ascii_whitespace() {
            match self.content.fire_event(&Event::text(token), ctx) {
                FireResult::Matched => {}
                FireResult::NoMatch => errors.push(ValidationError::BadValue {
                    diagnostic: format!("token {token:?} not allowed in list"),
                }),
                FireResult::Errors(e) => errors.extend(e),
            }
        }
        FireResult::from_errors(errors)
    }

    pub(crate) fn possible(&self) -> Rc<EventSet> {
        let mut set = EventSet::new();
        if !self.seen {
            set.insert(PossibleEvent::Text(ValueHint::Any));
        }
        Rc::new(set)
    }

    pub(crate) fn can_end(&self, ctx: &Ctx<'_>, attribute: bool) -> bool {
        // Zero tokens is legal iff the content pattern matches empty.
        attribute || self.content.can_end(ctx, false)
    }

    pub(crate) fn end(&mut self, ctx: &Ctx<'_>, attribute: bool) -> Vec<ValidationError> {
        if self.can_end(ctx, attribute) {
            Vec::new()
        } else {
            self.content.end(ctx, false)
        }
    }
}
