//! Composite walkers: `Group`, `Interleave`, `Choice` and `OneOrMore`.
//!
//! Routing works through `NoMatch`: a child that cannot consume an event has
//! not advanced, so the composite is free to offer the event elsewhere.

use std::rc::Rc;

use relwalk_core::event::{Event, EventSet};
use relwalk_core::schema::{PatternId, Schema};

use crate::errors::{FireResult, ValidationError};

use super::{Ctx, PossibleCache, Walker};

/// Sequence: `a` then `b`.
///
/// Attribute events are exempt from the sequencing — Relax NG attributes are
/// unordered, so both sides stay reachable for them throughout.
#[derive(Debug, Clone)]
pub(crate) struct GroupWalker {
    a: Walker,
    b: Walker,
    /// Set once a non-attribute event routed to `b`; `a` is sealed for
    /// everything but attributes from then on.
    b_active: bool,
    cache: PossibleCache,
}

impl GroupWalker {
    pub(crate) fn new(schema: &Schema, a: PatternId, b: PatternId) -> Self {
        Self {
            a: Walker::new(schema, a),
            b: Walker::new(schema, b),
            b_active: false,
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
        if event.is_attribute_kind() {
            let result = self.a.fire_event(event, ctx);
            if !result.is_no_match() {
                return result;
            }
            return self.b.fire_event(event, ctx);
        }
        if self.b_active {
            return self.b.fire_event(event, ctx);
        }
        match self.a.fire_event(event, ctx) {
            FireResult::NoMatch if self.a.can_end(ctx, false) => {
                let result = self.b.fire_event(event, ctx);
                if !result.is_no_match() {
                    self.b_active = true;
                }
                result
            }
            result => result,
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
        if self.b_active {
            let mut set = (*self.b.possible(ctx)).clone();
            // `a` may still owe attributes until the start tag closes.
            let a_possible = self.a.possible(ctx);
            for event in a_possible.iter() {
                if event.is_attribute_kind() {
                    set.insert(event.clone());
                }
            }
            return set;
        }
        let mut set = (*self.a.possible(ctx)).clone();
        if self.a.can_end(ctx, false) {
            set.union_with(&self.b.possible(ctx));
        } else {
            // Unordered attributes: b's attribute possibilities are live
            // even while a's sequence position is unfinished.
            let b_possible = self.b.possible(ctx);
            for event in b_possible.iter() {
                if event.is_attribute_kind() {
                    set.insert(event.clone());
                }
            }
        }
        set
    }

    pub(crate) fn can_end(&self, ctx: &Ctx<'_>, attribute: bool) -> bool {
        self.a.can_end(ctx, attribute) && self.b.can_end(ctx, attribute)
    }

    pub(crate) fn end(&mut self, ctx: &Ctx<'_>, attribute: bool) -> Vec<ValidationError> {
        let mut errors = self.a.end(ctx, attribute);
        errors.extend(self.b.end(ctx, attribute));
        errors
    }

    pub(crate) fn suppress_attributes(&mut self) {
        self.a.suppress_attributes();
        self.b.suppress_attributes();
        self.cache.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

impl Side {
    fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Arbitrary interleaving of events from `a` and `b`.
///
/// When both sides could accept an event the order-insensitive semantics
/// allow either; the tie-break routes to the side not chosen last, which
/// keeps both branches advancing. Attribute events bypass the tie-break and
/// go to whichever side owns an attribute pattern for the name.
#[derive(Debug, Clone)]
pub(crate) struct InterleaveWalker {
    a: Walker,
    b: Walker,
    a_id: PatternId,
    b_id: PatternId,
    last: Option<Side>,
    /// Side owed the next `attributeValue`. Values follow their name
    /// directly in the input contract.
    pending_value: Option<Side>,
    cache: PossibleCache,
}

impl InterleaveWalker {
    pub(crate) fn new(schema: &Schema, a: PatternId, b: PatternId) -> Self {
        Self {
            a: Walker::new(schema, a),
            b: Walker::new(schema, b),
            a_id: a,
            b_id: b,
            last: None,
            pending_value: None,
            cache: PossibleCache::default(),
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Walker {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
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
        match event {
            Event::AttributeName { uri, local } => {
                let side = if ctx.schema.subtree_has_attribute(self.a_id, uri, local) {
                    Side::A
                } else if ctx.schema.subtree_has_attribute(self.b_id, uri, local) {
                    Side::B
                } else {
                    return FireResult::NoMatch;
                };
                let result = self.side_mut(side).fire_event(event, ctx);
                if !result.is_no_match() {
                    self.pending_value = Some(side);
                }
                result
            }
            Event::AttributeValue { .. } => {
                let Some(side) = self.pending_value.take() else {
                    return FireResult::NoMatch;
                };
                self.side_mut(side).fire_event(event, ctx)
            }
            _ => {
                let preferred = self.last.map(Side::other).unwrap_or(Side::A);
                let result = self.side_mut(preferred).fire_event(event, ctx);
                if !result.is_no_match() {
                    self.last = Some(preferred);
                    return result;
                }
                let result = self.side_mut(preferred.other()).fire_event(event, ctx);
                if !result.is_no_match() {
                    self.last = Some(preferred.other());
                }
                result
            }
        }
    }

    pub(crate) fn possible(&mut self, ctx: &Ctx<'_>) -> Rc<EventSet> {
        if self.cache.is_unset() {
            let mut set = (*self.a.possible(ctx)).clone();
            set.union_with(&self.b.possible(ctx));
            self.cache.fill(set);
        }
        self.cache.get()
    }

    pub(crate) fn can_end(&self, ctx: &Ctx<'_>, attribute: bool) -> bool {
        self.a.can_end(ctx, attribute) && self.b.can_end(ctx, attribute)
    }

    pub(crate) fn end(&mut self, ctx: &Ctx<'_>, attribute: bool) -> Vec<ValidationError> {
        let mut errors = self.a.end(ctx, attribute);
        errors.extend(self.b.end(ctx, attribute));
        errors
    }

    pub(crate) fn suppress_attributes(&mut self) {
        self.a.suppress_attributes();
        self.b.suppress_attributes();
        self.cache.clear();
    }
}

/// Either `a` or `b`, mirrored speculatively: every live branch sees every
/// event and branches that fall behind are dropped.
#[derive(Debug, Clone)]
pub(crate) struct ChoiceWalker {
    a: Option<Walker>,
    b: Option<Walker>,
    cache: PossibleCache,
}

impl ChoiceWalker {
    pub(crate) fn new(schema: &Schema, a: PatternId, b: PatternId) -> Self {
        Self {
            a: Some(Walker::new(schema, a)),
            b: Some(Walker::new(schema, b)),
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
        let result_a = self.a.as_mut().map(|w| w.fire_event(event, ctx));
        let result_b = self.b.as_mut().map(|w| w.fire_event(event, ctx));

        let a_matched = matches!(result_a, Some(FireResult::Matched));
        let b_matched = matches!(result_b, Some(FireResult::Matched));
        if a_matched || b_matched {
            // Branches that missed the event or erred fall behind the clean
            // ones and cannot rejoin.
            if !a_matched {
                self.a = None;
            }
            if !b_matched {
                self.b = None;
            }
            return FireResult::Matched;
        }

        match (result_a, result_b) {
            (Some(FireResult::Errors(errors_a)), Some(FireResult::Errors(errors_b))) => {
                // Fewest errors wins; ties keep the left branch.
                if errors_a.len() <= errors_b.len() {
                    self.b = None;
                    FireResult::Errors(errors_a)
                } else {
                    self.a = None;
                    FireResult::Errors(errors_b)
                }
            }
            (Some(FireResult::Errors(errors)), _) => {
                self.b = None;
                FireResult::Errors(errors)
            }
            (_, Some(FireResult::Errors(errors))) => {
                self.a = None;
                FireResult::Errors(errors)
            }
            // Nobody consumed; both branches are untouched and stay live.
            _ => FireResult::NoMatch,
        }
    }

    /// When exactly one branch survives the choice collapses into it; the
    /// caller replaces this walker with the survivor.
    pub(crate) fn take_sole_survivor(&mut self) -> Option<Walker> {
        match (&self.a, &self.b) {
            (Some(_), None) => self.a.take(),
            (None, Some(_)) => self.b.take(),
            _ => None,
        }
    }

    pub(crate) fn possible(&mut self, ctx: &Ctx<'_>) -> Rc<EventSet> {
        if self.cache.is_unset() {
            let mut set = EventSet::new();
            if let Some(a) = self.a.as_mut() {
                set.union_with(&a.possible(ctx));
            }
            if let Some(b) = self.b.as_mut() {
                set.union_with(&b.possible(ctx));
            }
            self.cache.fill(set);
        }
        self.cache.get()
    }

    pub(crate) fn can_end(&self, ctx: &Ctx<'_>, attribute: bool) -> bool {
        self.a.as_ref().is_some_and(|w| w.can_end(ctx, attribute))
            || self.b.as_ref().is_some_and(|w| w.can_end(ctx, attribute))
    }

    pub(crate) fn end(&mut self, ctx: &Ctx<'_>, attribute: bool) -> Vec<ValidationError> {
        if self.can_end(ctx, attribute) {
            return Vec::new();
        }
        match (self.a.as_mut(), self.b.as_mut()) {
            // Neither alternative is finished; naming either branch's
            // missing content would be arbitrary.
            (Some(_), Some(_)) => vec![ValidationError::ChoiceExhausted],
            (Some(walker), None) | (None, Some(walker)) => walker.end(ctx, attribute),
            (None, None) => unreachable!("choice always keeps a live branch"),
        }
    }

    pub(crate) fn suppress_attributes(&mut self) {
        if let Some(a) = self.a.as_mut() {
            a.suppress_attributes();
        }
        if let Some(b) = self.b.as_mut() {
            b.suppress_attributes();
        }
        self.cache.clear();
    }
}

/// One or more repetitions: a current-iteration walker, restarted with a
/// fresh one whenever the current iteration is complete and cannot consume
/// the event itself.
#[derive(Debug, Clone)]
pub(crate) struct OneOrMoreWalker {
    content_id: PatternId,
    current: Walker,
    suppressed: bool,
    cache: PossibleCache,
}

impl OneOrMoreWalker {
    pub(crate) fn new(schema: &Schema, content: PatternId) -> Self {
        Self {
            content_id: content,
            current: Walker::new(schema, content),
            suppressed: false,
            cache: PossibleCache::default(),
        }
    }

    fn fresh(&self, ctx: &Ctx<'_>) -> Walker {
        let mut walker = Walker::new(ctx.schema, self.content_id);
        if self.suppressed {
            walker.suppress_attributes();
        }
        walker
    }

    pub(crate) fn fire_event(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        let result = self.route(event, ctx);
        if !result.is_no_match() {
            self.cache.clear();
        }
        result
    }

    fn route(&mut self, event: &Event, ctx: &Ctx<'_>) -> FireResult {
        let result = self.current.fire_event(event, ctx);
        if !result.is_no_match() {
            return result;
        }
        if !self.current.can_end(ctx, false) {
            return FireResult::NoMatch;
        }
        let mut fresh = self.fresh(ctx);
        let result = fresh.fire_event(event, ctx);
        if !result.is_no_match() {
            self.current = fresh;
        }
        result
    }

    pub(crate) fn possible(&mut self, ctx: &Ctx<'_>) -> Rc<EventSet> {
        if self.cache.is_unset() {
            let mut set = (*self.current.possible(ctx)).clone();
            if self.current.can_end(ctx, false) {
                let mut fresh = self.fresh(ctx);
                set.union_with(&fresh.possible(ctx));
            }
            self.cache.fill(set);
        }
        self.cache.get()
    }

    /// Terminable iff the current iteration is: a finished iteration counts
    /// as the required one.
    pub(crate) fn can_end(&self, ctx: &Ctx<'_>, attribute: bool) -> bool {
        self.current.can_end(ctx, attribute)
    }

    pub(crate) fn end(&mut self, ctx: &Ctx<'_>, attribute: bool) -> Vec<ValidationError> {
        self.current.end(ctx, attribute)
    }

    pub(crate) fn suppress_attributes(&mut self) {
        self.suppressed = true;
        self.current.suppress_attributes();
        self.cache.clear();
    }
}
