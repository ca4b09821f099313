//! The element walker: a four-state start/content/end machine.

use std::rc::Rc;
use std::sync::Arc;

use relwalk_core::event::{Event, EventSet, PossibleEvent};
use relwalk_core::names::{Name, NameClass};
use relwalk_core::schema::PatternId;

use crate::errors::{FireResult, ValidationError};

use super::{Ctx, PossibleCache, Walker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeStart,
    InStartTag,
    InContent,
    AfterEnd,
}

/// Matches a balanced start/end-tag region. The content walker is created
/// lazily at `enterStartTag`, which is what keeps cyclic grammars finite:
/// recursion only unfolds as deep as the document actually nests.
#[derive(Debug, Clone)]
pub(crate) struct ElementWalker {
    name: Arc<NameClass>,
    content_id: PatternId,
    state: State,
    content: Option<Walker>,
    /// Concrete name the start tag matched with; the end tag must repeat it.
    start_name: Option<Name>,
    cache: PossibleCache,
}

impl ElementWalker {
    pub(crate) fn new(name: Arc<NameClass>, content_id: PatternId) -> Self {
        Self {
            name,
            content_id,
            state: State::BeforeStart,
            content: None,
            start_name: None,
            cache: PossibleCache::default(),
        }
    }

    fn content_mut(&mut self) -> &mut Walker {
        self.content
            .as_mut()
            .expect("content walker exists past enterStartTag")
    }

    pub(crate) fn fire_event(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        let result = match self.state {
            State::BeforeStart => self.fire_before_start(event, ctx),
            State::InStartTag => self.fire_in_start_tag(event, ctx),
            State::InContent => self.fire_in_content(event, ctx),
            State::AfterEnd => FireResult::NoMatch,
        };
        if !result.is_no_match() {
            self.cache.clear();
        }
        result
    }

    fn fire_before_start(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        let Event::EnterStartTag { uri, local } = event else {
            return FireResult::NoMatch;
        };
        if !self.name.matches(uri, local) {
            return FireResult::NoMatch;
        }
        self.state = State::InStartTag;
        self.start_name = Some(Name::new(uri.clone(), local.clone()));
        self.content = Some(Walker::new(ctx.schema, self.content_id));
        FireResult::Matched
    }

    fn fire_in_start_tag(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        match event {
            Event::AttributeName { .. } | Event::AttributeValue { .. } => {
                self.content_mut().fire_event(event, ctx)
            }
            Event::LeaveStartTag => {
                self.state = State::InContent;
                // Attribute obligations settle here. The prepared flag lets
                // attribute-free content skip the bookkeeping entirely.
                let errors = if ctx.schema.has_attributes(self.content_id) {
                    let content = self.content_mut();
                    let errors = content.end(ctx, true);
                    content.suppress_attributes();
                    errors
                } else {
                    Vec::new()
                };
                FireResult::from_errors(errors)
            }
            _ => FireResult::NoMatch,
        }
    }

    fn fire_in_content(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        // The content walker goes first: an end tag belonging to a nested
        // open element is consumed there and never reaches this level.
        let result = self.content_mut().fire_event(event, ctx);
        if !result.is_no_match() {
            return result;
        }
        let Event::EndTag { uri, local } = event else {
            return FireResult::NoMatch;
        };
        let matches = self
            .start_name
            .as_ref()
            .is_some_and(|n| n.ns == *uri && n.local == *local);
        if !matches {
            return FireResult::NoMatch;
        }
        self.state = State::AfterEnd;
        let errors = self.content_mut().end(ctx, false);
        FireResult::from_errors(errors)
    }

    pub(crate) fn possible(&mut self, ctx: &Ctx<'_>) -> Rc<EventSet> {
        if self.cache.is_unset() {
            let set = self.compute_possible(ctx);
            self.cache.fill(set);
        }
        self.cache.get()
    }

    fn compute_possible(&mut self, ctx: &Ctx<'_>) -> EventSet {
        match self.state {
            State::BeforeStart => {
                let mut set = EventSet::new();
                set.insert(PossibleEvent::EnterStartTag(self.name.clone()));
                set
            }
            State::InStartTag => {
                let content = self.content_mut();
                let possible = content.possible(ctx);
                let mut set: EventSet = possible
                    .iter()
                    .filter(|event| event.is_attribute_kind())
                    .cloned()
                    .collect();
                if content.can_end(ctx, true) {
                    set.insert(PossibleEvent::LeaveStartTag);
                }
                set
            }
            State::InContent => {
                let name = self.name.clone();
                let content = self.content_mut();
                let mut set = (*content.possible(ctx)).clone();
                if content.can_end(ctx, false) {
                    set.insert(PossibleEvent::EndTag(name));
                }
                set
            }
            State::AfterEnd => EventSet::new(),
        }
    }

    /// An element never matches the empty sequence; only its (vacuous)
    /// attribute obligations are always satisfied.
    pub(crate) fn can_end(&self, attribute: bool) -> bool {
        attribute || self.state == State::AfterEnd
    }

    pub(crate) fn end(&mut self, attribute: bool) -> Vec<ValidationError> {
        if self.can_end(attribute) {
            Vec::new()
        } else {
            vec![ValidationError::IncompleteContent]
        }
    }
}
