//! The attribute walker: a two-phase name/value machine.

use std::rc::Rc;
use std::sync::Arc;

use relwalk_core::event::{Event, EventSet, PossibleEvent};
use relwalk_core::names::NameClass;
use relwalk_core::schema::{PatternId, Schema};

use crate::errors::{FireResult, ValidationError};

use super::{Ctx, PossibleCache, Walker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Awaiting a matching `attributeName`.
    Name,
    /// Name consumed, awaiting the `attributeValue`.
    Value,
    /// Name and value both consumed.
    Done,
}

/// Consumes one `attributeName`/`attributeValue` pair. The value is checked
/// by the content pattern's walker through a synthesized text event.
#[derive(Debug, Clone)]
pub(crate) struct AttributeWalker {
    name: Arc<NameClass>,
    content: Walker,
    phase: Phase,
    suppressed: bool,
    cache: PossibleCache,
}

impl AttributeWalker {
    pub(crate) fn new(schema: &Schema, name: Arc<NameClass>, content: PatternId) -> Self {
        Self {
            name,
            content: Walker::new(schema, content),
            phase: Phase::Name,
            suppressed: false,
            cache: PossibleCache::default(),
        }
    }

    pub(crate) fn fire_event(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        let result = self.route(event, ctx);
        if !result.is_no_match() {
            self.cache.clear();
        }
        result
    }

    fn route(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        match (self.phase, event) {
            (Phase::Name, Event::AttributeName { uri, local })
                if !self.suppressed && self.name.matches(uri, local) =>
            {
                self.phase = Phase::Value;
                FireResult::Matched
            }
            (Phase::Value, Event::AttributeValue { value }) => {
                self.phase = Phase::Done;
                let mut errors = Vec::new();
                // An empty value fires no text event; the content pattern
                // must then match the empty sequence.
                if !value.is_empty() {
                    match self.content.fire_event(&Event::text(value.clone()), ctx) {
                        FireResult::Matched => {}
                        FireResult::NoMatch => errors.push(ValidationError::BadValue {
                            diagnostic: format!("attribute value {value:?} not allowed"),
                        }),
                        FireResult::Errors(e) => errors.extend(e),
                    }
                }
                if errors.is_empty() && !self.content.can_end(ctx, false) {
                    errors.push(ValidationError::BadValue {
                        diagnostic: format!("attribute value {value:?} is incomplete"),
                    });
                }
                FireResult::from_errors(errors)
            }
            _ => FireResult::NoMatch,
        }
    }

    pub(crate) fn possible(&mut self, ctx: &Ctx<'_>) -> Rc<EventSet> {
        if self.cache.is_unset() {
            let set = self.compute_possible(ctx);
            self.cache.fill(set);
        }
        self.cache.get()
    }

    fn compute_possible(&mut self, ctx: &Ctx<'_>) -> EventSet {
        let mut set = EventSet::new();
        if self.suppressed {
            return set;
        }
        match self.phase {
            Phase::Name => {
                set.insert(PossibleEvent::AttributeName(self.name.clone()));
            }
            Phase::Value => {
                // Only text possibilities survive the filter: Relax NG
                // restricts attribute content syntactically, so anything else
                // the content walker offers is forbidden here.
                let content = self.content.possible(ctx);
                for event in content.iter() {
                    if let PossibleEvent::Text(hint) = event {
                        set.insert(PossibleEvent::AttributeValue(hint.clone()));
                    }
                }
            }
            Phase::Done => {}
        }
        set
    }

    pub(crate) fn can_end(&self, attribute: bool) -> bool {
        if attribute {
            self.phase == Phase::Done
        } else {
            // Once suppressed, attribute obligations were already reported
            // at leaveStartTag and are not owed again at content end.
            self.suppressed || self.phase == Phase::Done
        }
    }

    pub(crate) fn end(&mut self, attribute: bool) -> Vec<ValidationError> {
        if self.can_end(attribute) {
            Vec::new()
        } else {
            vec![ValidationError::MissingAttribute(self.name.clone())]
        }
    }

    pub(crate) fn suppress_attributes(&mut self) {
        self.suppressed = true;
        self.cache.clear();
    }
}
