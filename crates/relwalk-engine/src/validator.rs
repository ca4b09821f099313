//! The validation façade.
//!
//! One `Validator` drives one document: it owns the root walker, the
//! namespace context stack and the misplaced-element recovery frames, and it
//! converts walker-level `NoMatch` into user-visible errors. The dispatch
//! path never panics and never raises — errors are values.

use std::collections::HashMap;
use std::sync::Arc;

use relwalk_core::datatype::Registry;
use relwalk_core::event::{Event, EventSet};
use relwalk_core::names::Name;
use relwalk_core::resolver::NameResolver;
use relwalk_core::schema::{Grammar, Schema};

use crate::errors::{FireResult, ValidationError};
use crate::trace::{NoopTracer, Tracer};
use crate::walker::{Ctx, Walker};

/// Recovery state entered when a start tag arrives that no live walker
/// accepts.
#[derive(Debug, Clone)]
enum RecoveryFrame {
    /// The misplaced element has exactly one definition in the schema:
    /// validate its region against that definition, then resume.
    Divert { walker: Walker, depth: u32 },
    /// Zero or several candidate definitions: ignore everything up to the
    /// matching end tag, then resume as if no element had occurred.
    Skip { depth: u32 },
}

/// Streaming validator for one document.
///
/// Cloning snapshots the complete state — walkers, context stack and
/// recovery frames — for speculative parsing; the original is untouched by
/// anything fired at the clone.
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<Schema>,
    registry: Arc<Registry>,
    root: Walker,
    resolver: NameResolver,
    recovery: Vec<RecoveryFrame>,
    /// Swallow the value event paired with an already-reported unexpected
    /// attribute name.
    swallow_attribute_value: bool,
}

impl Validator {
    /// Root walker over the grammar's start pattern.
    pub fn new(grammar: &Grammar) -> Self {
        let schema = Arc::clone(grammar.schema());
        let root = Walker::new(&schema, schema.start());
        Self {
            schema,
            registry: Arc::clone(grammar.registry()),
            root,
            resolver: NameResolver::new(),
            recovery: Vec::new(),
            swallow_attribute_value: false,
        }
    }

    /// Feed one input event. An empty result means the event was accepted.
    pub fn fire_event(&mut self, event: &Event) -> Vec<ValidationError> {
        self.fire_event_with(event, &mut NoopTracer)
    }

    /// Feed one input event with tracing.
    pub fn fire_event_with<T: Tracer>(
        &mut self,
        event: &Event,
        tracer: &mut T,
    ) -> Vec<ValidationError> {
        tracer.trace_event(event);
        // Compact events expand to their plain sequence here; error
        // positions within the bundle are coarser, which is the documented
        // trade-off for the convenience.
        let errors = match event {
            Event::AttributeNameAndValue { uri, local, value } => {
                let mut errors =
                    self.dispatch(&Event::attribute_name(uri.clone(), local.clone()), tracer);
                errors.extend(self.dispatch(&Event::attribute_value(value.clone()), tracer));
                errors
            }
            Event::StartTagAndAttributes { uri, local, attrs } => {
                let mut errors =
                    self.dispatch(&Event::enter_start_tag(uri.clone(), local.clone()), tracer);
                for (attr_uri, attr_local, attr_value) in attrs {
                    errors.extend(self.dispatch(
                        &Event::attribute_name(attr_uri.clone(), attr_local.clone()),
                        tracer,
                    ));
                    errors
                        .extend(self.dispatch(&Event::attribute_value(attr_value.clone()), tracer));
                }
                errors.extend(self.dispatch(&Event::LeaveStartTag, tracer));
                errors
            }
            _ => self.dispatch(event, tracer),
        };
        tracer.trace_result(&errors);
        errors
    }

    fn dispatch<T: Tracer>(&mut self, event: &Event, tracer: &mut T) -> Vec<ValidationError> {
        // Empty text events are forbidden at the boundary; tolerate one
        // without advancing anything.
        if matches!(event, Event::Text { value } if value.is_empty()) {
            return Vec::new();
        }

        if !self.recovery.is_empty() {
            return self.dispatch_recovery(event, tracer);
        }

        let ctx = Ctx {
            schema: &self.schema,
            registry: &self.registry,
            resolver: &self.resolver,
        };
        match self.root.fire_event(event, &ctx) {
            FireResult::Matched => {
                self.swallow_attribute_value = false;
                Vec::new()
            }
            FireResult::Errors(errors) => {
                self.swallow_attribute_value = false;
                errors
            }
            FireResult::NoMatch => self.convert_no_match(event, tracer),
        }
    }

    /// Top of the walker tree: `NoMatch` becomes a validation error here and
    /// is never user-visible as such.
    fn convert_no_match<T: Tracer>(
        &mut self,
        event: &Event,
        tracer: &mut T,
    ) -> Vec<ValidationError> {
        match event {
            Event::EnterStartTag { uri, local } => {
                let error =
                    ValidationError::UnexpectedElement(Name::new(uri.clone(), local.clone()));
                let candidates = self.schema.elements_named(uri, local);
                let unique = (candidates.len() == 1).then(|| candidates[0]);
                match unique {
                    Some(pattern) => {
                        let mut walker = Walker::new(&self.schema, pattern);
                        let ctx = Ctx {
                            schema: &self.schema,
                            registry: &self.registry,
                            resolver: &self.resolver,
                        };
                        // Indexed under this very name, so the start tag is
                        // accepted by construction.
                        let fired = walker.fire_event(event, &ctx);
                        debug_assert!(!fired.is_no_match());
                        self.recovery
                            .push(RecoveryFrame::Divert { walker, depth: 1 });
                        tracer.trace_recovery_enter(true);
                    }
                    None => {
                        self.recovery.push(RecoveryFrame::Skip { depth: 1 });
                        tracer.trace_recovery_enter(false);
                    }
                }
                vec![error]
            }
            Event::AttributeName { uri, local } => {
                self.swallow_attribute_value = true;
                vec![ValidationError::UnexpectedAttribute(Name::new(
                    uri.clone(),
                    local.clone(),
                ))]
            }
            Event::AttributeValue { .. } => {
                if self.swallow_attribute_value {
                    self.swallow_attribute_value = false;
                    Vec::new()
                } else {
                    vec![ValidationError::BadValue {
                        diagnostic: "attribute value not expected here".to_string(),
                    }]
                }
            }
            Event::Text { .. } => vec![ValidationError::UnexpectedText],
            Event::EndTag { uri, local } => vec![ValidationError::UnexpectedEndTag(Name::new(
                uri.clone(),
                local.clone(),
            ))],
            // A stray leaveStartTag means the stream is ill-formed, where
            // behavior is undefined; drop it.
            Event::LeaveStartTag => Vec::new(),
            Event::AttributeNameAndValue { .. } | Event::StartTagAndAttributes { .. } => {
                unreachable!("compact events expand before dispatch")
            }
        }
    }

    fn dispatch_recovery<T: Tracer>(
        &mut self,
        event: &Event,
        tracer: &mut T,
    ) -> Vec<ValidationError> {
        match self.recovery.pop().expect("recovery frame present") {
            RecoveryFrame::Skip { depth } => {
                let depth = match event {
                    Event::EnterStartTag { .. } => depth + 1,
                    Event::EndTag { .. } => depth - 1,
                    _ => depth,
                };
                if depth == 0 {
                    tracer.trace_recovery_leave();
                } else {
                    self.recovery.push(RecoveryFrame::Skip { depth });
                }
                Vec::new()
            }
            RecoveryFrame::Divert { mut walker, depth } => {
                let ctx = Ctx {
                    schema: &self.schema,
                    registry: &self.registry,
                    resolver: &self.resolver,
                };
                match walker.fire_event(event, &ctx) {
                    FireResult::NoMatch => {
                        // The diverted region has its own misplaced content;
                        // restore the frame and recurse into conversion,
                        // which may stack another frame on top.
                        self.recovery.push(RecoveryFrame::Divert { walker, depth });
                        self.convert_no_match(event, tracer)
                    }
                    result => {
                        let errors = match result {
                            FireResult::Errors(errors) => errors,
                            _ => Vec::new(),
                        };
                        let depth = match event {
                            Event::EnterStartTag { .. } => depth + 1,
                            Event::EndTag { .. } => depth - 1,
                            _ => depth,
                        };
                        if depth == 0 {
                            tracer.trace_recovery_leave();
                        } else {
                            self.recovery.push(RecoveryFrame::Divert { walker, depth });
                        }
                        errors
                    }
                }
            }
        }
    }

    /// Events acceptable as the next input. The returned set is fresh and
    /// owned by the caller.
    pub fn possible(&mut self) -> EventSet {
        let ctx = Ctx {
            schema: &self.schema,
            registry: &self.registry,
            resolver: &self.resolver,
        };
        match self.recovery.last_mut() {
            Some(RecoveryFrame::Divert { walker, .. }) => (*walker.possible(&ctx)).clone(),
            Some(RecoveryFrame::Skip { .. }) => EventSet::new(),
            None => (*self.root.possible(&ctx)).clone(),
        }
    }

    /// Whether `end` would succeed right now.
    pub fn can_end(&self) -> bool {
        let ctx = Ctx {
            schema: &self.schema,
            registry: &self.registry,
            resolver: &self.resolver,
        };
        self.recovery.is_empty() && self.root.can_end(&ctx, false)
    }

    /// Final call at document end.
    pub fn end(&mut self) -> Vec<ValidationError> {
        let ctx = Ctx {
            schema: &self.schema,
            registry: &self.registry,
            resolver: &self.resolver,
        };
        let mut errors = self.root.end(&ctx, false);
        if !self.recovery.is_empty() {
            errors.push(ValidationError::IncompleteContent);
        }
        errors
    }

    /// Push an empty namespace context. Must happen before the element's
    /// `enterStartTag`.
    pub fn enter_context(&mut self) {
        self.enter_context_traced(&mut NoopTracer);
    }

    /// Push an empty namespace context, with tracing.
    pub fn enter_context_traced<T: Tracer>(&mut self, tracer: &mut T) {
        self.resolver.enter_context();
        tracer.trace_context_push();
    }

    /// Push a namespace context pre-populated with prefix→URI bindings.
    pub fn enter_context_with_mapping(&mut self, mapping: HashMap<String, String>) {
        self.enter_context_with_mapping_traced(mapping, &mut NoopTracer);
    }

    /// Push a pre-populated namespace context, with tracing.
    pub fn enter_context_with_mapping_traced<T: Tracer>(
        &mut self,
        mapping: HashMap<String, String>,
        tracer: &mut T,
    ) {
        self.resolver.enter_context_with_mapping(mapping);
        tracer.trace_context_push();
    }

    /// Bind a prefix in the current context.
    pub fn define_prefix(&mut self, prefix: &str, uri: &str) {
        self.resolver.define_prefix(prefix, uri);
    }

    /// Pop the current namespace context. Must happen after the matching
    /// `endTag`.
    pub fn leave_context(&mut self) {
        self.leave_context_traced(&mut NoopTracer);
    }

    /// Pop the current namespace context, with tracing.
    pub fn leave_context_traced<T: Tracer>(&mut self, tracer: &mut T) {
        self.resolver.leave_context();
        tracer.trace_context_pop();
    }

    /// Resolve a lexical QName against the live context stack.
    pub fn resolve_name(&self, qname: &str, for_attribute: bool) -> Option<Name> {
        self.resolver.resolve_name(qname, for_attribute)
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }
}
