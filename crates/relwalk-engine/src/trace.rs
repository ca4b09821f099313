//! Tracing hooks for debugging validation runs.
//!
//! The tracer is a zero-cost abstraction: with [`NoopTracer`] every call is
//! an `#[inline(always)]` empty function and the compiler removes it. No
//! tracing state lives in the validator itself.

use relwalk_core::event::Event;

use crate::errors::ValidationError;

/// Instrumentation points on the validator's dispatch path.
pub trait Tracer {
    /// Called before an input event is dispatched (compact events are traced
    /// once, before expansion).
    fn trace_event(&mut self, event: &Event);

    /// Called after dispatch with the errors the event produced.
    fn trace_result(&mut self, errors: &[ValidationError]);

    /// Called when misplaced-element recovery starts. `diverted` is true
    /// when the element is validated against its unique definition, false
    /// when events are skipped to the matching end tag.
    fn trace_recovery_enter(&mut self, diverted: bool);

    /// Called when a recovery frame pops and normal validation resumes.
    fn trace_recovery_leave(&mut self);

    /// Called when a namespace context frame is pushed.
    fn trace_context_push(&mut self);

    /// Called when a namespace context frame pops.
    fn trace_context_pop(&mut self);
}

/// Tracer that compiles away completely.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn trace_event(&mut self, _event: &Event) {}

    #[inline(always)]
    fn trace_result(&mut self, _errors: &[ValidationError]) {}

    #[inline(always)]
    fn trace_recovery_enter(&mut self, _diverted: bool) {}

    #[inline(always)]
    fn trace_recovery_leave(&mut self) {}

    #[inline(always)]
    fn trace_context_push(&mut self) {}

    #[inline(always)]
    fn trace_context_pop(&mut self) {}
}
