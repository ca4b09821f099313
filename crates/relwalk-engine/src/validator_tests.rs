use std::sync::Arc;

use relwalk_core::datatype::Registry;
use relwalk_core::event::{Event, PossibleEvent, ValueHint};
use relwalk_core::json::{read_tree_from_json, write_tree_to_json};
use relwalk_core::names::{Name, NameClass};
use relwalk_core::schema::{Grammar, Pattern, PatternId, SchemaBuilder};

use crate::GrammarExt;
use crate::errors::ValidationError;
use crate::trace::Tracer;
use crate::validator::Validator;

fn grammar(build: impl FnOnce(&mut SchemaBuilder) -> PatternId) -> Grammar {
    let registry = Arc::new(Registry::new());
    let mut builder = SchemaBuilder::new();
    let start = build(&mut builder);
    let schema = builder.finish(start, &registry).expect("schema prepares");
    Grammar::new(schema, registry)
}

fn element(builder: &mut SchemaBuilder, local: &str, content: PatternId) -> PatternId {
    builder.push(Pattern::Element {
        name: Arc::new(NameClass::name("", local)),
        content,
    })
}

fn text_attribute(builder: &mut SchemaBuilder, local: &str) -> PatternId {
    let text = builder.push(Pattern::Text);
    builder.push(Pattern::Attribute {
        name: Arc::new(NameClass::name("", local)),
        content: text,
    })
}

fn fire_all(validator: &mut Validator, events: &[Event]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for event in events {
        errors.extend(validator.fire_event(event));
    }
    errors
}

/// Convert a possibility back into a concrete input event. Wildcard name
/// classes and open text hints have no single concrete form and return None.
fn possible_to_input(event: &PossibleEvent) -> Option<Event> {
    match event {
        PossibleEvent::EnterStartTag(nc) => {
            let name = nc.names()?.first().copied()?.clone();
            Some(Event::enter_start_tag(name.ns, name.local))
        }
        PossibleEvent::EndTag(nc) => {
            let name = nc.names()?.first().copied()?.clone();
            Some(Event::end_tag(name.ns, name.local))
        }
        PossibleEvent::AttributeName(nc) => {
            let name = nc.names()?.first().copied()?.clone();
            Some(Event::attribute_name(name.ns, name.local))
        }
        PossibleEvent::LeaveStartTag => Some(Event::LeaveStartTag),
        PossibleEvent::AttributeValue(ValueHint::Literal(v)) => {
            Some(Event::attribute_value(v.to_string()))
        }
        PossibleEvent::Text(ValueHint::Literal(v)) if !v.is_empty() => {
            Some(Event::text(v.to_string()))
        }
        PossibleEvent::AttributeValue(ValueHint::Any) | PossibleEvent::Text(ValueHint::Any) => None,
        PossibleEvent::Text(ValueHint::Literal(_)) => None,
    }
}

// --- spec scenarios -------------------------------------------------------

#[test]
fn empty_element_is_accepted() {
    let grammar = grammar(|b| {
        let empty = b.push(Pattern::Empty);
        element(b, "foo", empty)
    });
    let mut validator = grammar.new_walker();

    assert!(validator.fire_event(&Event::enter_start_tag("", "foo")).is_empty());

    let possible = validator.possible();
    assert_eq!(possible.len(), 1);
    assert!(possible.contains(&PossibleEvent::LeaveStartTag));

    assert!(validator.fire_event(&Event::LeaveStartTag).is_empty());
    assert!(validator.fire_event(&Event::end_tag("", "foo")).is_empty());
    assert!(validator.can_end());
    assert!(validator.end().is_empty());
}

#[test]
fn missing_required_attribute_is_one_error() {
    let grammar = grammar(|b| {
        let attr = text_attribute(b, "a");
        element(b, "foo", attr)
    });
    let mut validator = Validator::new(&grammar);

    assert!(validator.fire_event(&Event::enter_start_tag("", "foo")).is_empty());
    let errors = validator.fire_event(&Event::LeaveStartTag);
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ValidationError::MissingAttribute(nc) => assert!(nc.matches("", "a")),
        other => panic!("expected missing attribute, got {other:?}"),
    }
}

#[test]
fn choice_of_two_names_offers_both_and_accepts_either() {
    let build = |b: &mut SchemaBuilder| {
        let empty = b.push(Pattern::Empty);
        let inner = b.push(Pattern::Element {
            name: Arc::new(NameClass::choice(
                NameClass::name("", "a"),
                NameClass::name("", "b"),
            )),
            content: empty,
        });
        element(b, "root", inner)
    };
    let grammar = grammar(build);
    let mut validator = Validator::new(&grammar);

    fire_all(
        &mut validator,
        &[Event::enter_start_tag("", "root"), Event::LeaveStartTag],
    );

    let possible = validator.possible();
    let enter = possible
        .iter()
        .find_map(|event| match event {
            PossibleEvent::EnterStartTag(nc) => Some(nc),
            _ => None,
        })
        .expect("a start-tag possibility");
    let names: Vec<Name> = enter.names().unwrap().into_iter().cloned().collect();
    assert_eq!(names, vec![Name::new("", "a"), Name::new("", "b")]);

    // Either branch fires cleanly from the same prior state.
    let mut on_b = validator.clone();
    assert!(validator.fire_event(&Event::enter_start_tag("", "a")).is_empty());
    assert!(on_b.fire_event(&Event::enter_start_tag("", "b")).is_empty());
}

fn attribute_behind_ref() -> Grammar {
    // element foo { ref attrs }, attrs ::= attribute id { text }. The ref
    // indirection must not hide the attribute obligation from the element.
    grammar(|b| {
        let attr = text_attribute(b, "id");
        b.define("attrs", attr);
        let body = b.push(Pattern::Ref {
            name: "attrs".to_string(),
            resolved: None,
        });
        element(b, "foo", body)
    })
}

#[test]
fn attribute_behind_a_ref_is_still_required() {
    let grammar = attribute_behind_ref();
    let mut validator = Validator::new(&grammar);

    assert!(validator.fire_event(&Event::enter_start_tag("", "foo")).is_empty());
    let errors = validator.fire_event(&Event::LeaveStartTag);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ValidationError::MissingAttribute(_)));

    // Suppression reached through the ref too: no attribute possibilities
    // survive the start tag.
    assert!(
        !validator
            .possible()
            .iter()
            .any(PossibleEvent::is_attribute_kind)
    );
}

#[test]
fn attribute_behind_a_ref_is_accepted_when_supplied() {
    let grammar = attribute_behind_ref();
    let mut validator = Validator::new(&grammar);

    let errors = fire_all(
        &mut validator,
        &[
            Event::enter_start_tag("", "foo"),
            Event::attribute_name("", "id"),
            Event::attribute_value("e1"),
            Event::LeaveStartTag,
            Event::end_tag("", "foo"),
        ],
    );
    assert!(errors.is_empty());
    assert!(validator.end().is_empty());
}

#[test]
fn attributes_interleave_freely() {
    let grammar = grammar(|b| {
        let a = text_attribute(b, "a");
        let second = text_attribute(b, "b");
        let group = b.push(Pattern::Group { a, b: second });
        element(b, "foo", group)
    });
    let mut validator = Validator::new(&grammar);

    let errors = fire_all(
        &mut validator,
        &[
            Event::enter_start_tag("", "foo"),
            Event::attribute_name("", "b"),
            Event::attribute_value("2"),
            Event::attribute_name("", "a"),
            Event::attribute_value("1"),
            Event::LeaveStartTag,
            Event::end_tag("", "foo"),
        ],
    );
    assert!(errors.is_empty());
    assert!(validator.end().is_empty());
}

fn uniquely_defined_name() -> Grammar {
    // doc contains p, p contains name; "name" has exactly one definition.
    grammar(|b| {
        let text = b.push(Pattern::Text);
        let name = element(b, "name", text);
        let p = element(b, "p", name);
        element(b, "doc", p)
    })
}

#[test]
fn misplaced_element_with_unique_definition_is_validated() {
    let grammar = uniquely_defined_name();
    let mut validator = Validator::new(&grammar);

    assert!(validator.fire_event(&Event::enter_start_tag("", "doc")).is_empty());
    assert!(validator.fire_event(&Event::LeaveStartTag).is_empty());

    // "name" may not sit directly under doc.
    let errors = validator.fire_event(&Event::enter_start_tag("", "name"));
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        ValidationError::UnexpectedElement(ref n) if n.local == "name"
    ));

    // Its region validates against the unique definition...
    assert!(validator.fire_event(&Event::LeaveStartTag).is_empty());
    assert!(validator.fire_event(&Event::text("inner text")).is_empty());
    assert!(validator.fire_event(&Event::end_tag("", "name")).is_empty());

    // ...and the outer walker resumes unharmed.
    let errors = fire_all(
        &mut validator,
        &[
            Event::enter_start_tag("", "p"),
            Event::LeaveStartTag,
            Event::enter_start_tag("", "name"),
            Event::LeaveStartTag,
            Event::text("proper"),
            Event::end_tag("", "name"),
            Event::end_tag("", "p"),
            Event::end_tag("", "doc"),
        ],
    );
    assert!(errors.is_empty());
    assert!(validator.end().is_empty());
}

#[test]
fn misplaced_content_inside_divert_is_validated_too() {
    let grammar = uniquely_defined_name();
    let mut validator = Validator::new(&grammar);

    fire_all(
        &mut validator,
        &[
            Event::enter_start_tag("", "doc"),
            Event::LeaveStartTag,
            Event::enter_start_tag("", "name"),
            Event::LeaveStartTag,
        ],
    );
    // A start tag where the diverted definition wants text only.
    let errors = validator.fire_event(&Event::enter_start_tag("", "bogus"));
    assert_eq!(errors.len(), 1);
    // The bogus region is skipped, the diverted element then closes cleanly.
    assert!(validator.fire_event(&Event::LeaveStartTag).is_empty());
    assert!(validator.fire_event(&Event::end_tag("", "bogus")).is_empty());
    assert!(validator.fire_event(&Event::end_tag("", "name")).is_empty());
}

#[test]
fn misplaced_element_with_ambiguous_definition_is_skipped() {
    let grammar = grammar(|b| {
        // Two different definitions of element "name".
        let text = b.push(Pattern::Text);
        let name_one = element(b, "name", text);
        let p1 = element(b, "p1", name_one);
        let empty = b.push(Pattern::Empty);
        let name_two = element(b, "name", empty);
        let p2 = element(b, "p2", name_two);
        let group = b.push(Pattern::Group { a: p1, b: p2 });
        element(b, "doc", group)
    });
    let mut validator = Validator::new(&grammar);

    fire_all(
        &mut validator,
        &[Event::enter_start_tag("", "doc"), Event::LeaveStartTag],
    );
    let before = validator.possible();

    let errors = validator.fire_event(&Event::enter_start_tag("", "name"));
    assert_eq!(errors.len(), 1);

    // Everything up to the matching end tag is ignored, even nonsense.
    assert!(validator.fire_event(&Event::LeaveStartTag).is_empty());
    assert!(validator.fire_event(&Event::text("ignored")).is_empty());
    assert!(validator.fire_event(&Event::enter_start_tag("", "nested")).is_empty());
    assert!(validator.fire_event(&Event::end_tag("", "nested")).is_empty());
    assert!(validator.fire_event(&Event::end_tag("", "name")).is_empty());

    // Resumption restores the exact pre-misplacement possibility set.
    assert_eq!(validator.possible(), before);
}

// --- quantified invariants ------------------------------------------------

#[test]
fn possibilities_fire_cleanly_at_every_step() {
    let grammar = grammar(|b| {
        let attr = text_attribute(b, "id");
        let text = b.push(Pattern::Text);
        let title = element(b, "title", text);
        let empty = b.push(Pattern::Empty);
        let flag = element(b, "flag", empty);
        let tail = b.push(Pattern::Choice { a: flag, b: empty });
        let seq = b.push(Pattern::Group { a: title, b: tail });
        let body = b.push(Pattern::Group { a: attr, b: seq });
        element(b, "entry", body)
    });

    let walkthrough = [
        Event::enter_start_tag("", "entry"),
        Event::attribute_name("", "id"),
        Event::attribute_value("e1"),
        Event::LeaveStartTag,
        Event::enter_start_tag("", "title"),
        Event::LeaveStartTag,
        Event::text("hello"),
        Event::end_tag("", "title"),
        Event::enter_start_tag("", "flag"),
        Event::LeaveStartTag,
        Event::end_tag("", "flag"),
        Event::end_tag("", "entry"),
    ];

    let mut validator = Validator::new(&grammar);
    for event in &walkthrough {
        for possibility in validator.possible().iter() {
            // Compact events never appear in possibility sets.
            let Some(input) = possible_to_input(possibility) else {
                continue;
            };
            let mut probe = validator.clone();
            let errors = probe.fire_event(&input);
            assert!(
                errors.is_empty(),
                "possibility {possibility} fired with errors {errors:?}"
            );
        }
        let errors = validator.fire_event(event);
        assert!(errors.is_empty(), "unexpected errors on {event:?}: {errors:?}");
    }
    assert!(validator.end().is_empty());
}

#[test]
fn attribute_possibilities_vanish_after_leave_start_tag() {
    let grammar = grammar(|b| {
        let attr = text_attribute(b, "a");
        let text = b.push(Pattern::Text);
        let body = b.push(Pattern::Group { a: attr, b: text });
        element(b, "foo", body)
    });
    let mut validator = Validator::new(&grammar);

    validator.fire_event(&Event::enter_start_tag("", "foo"));
    assert!(
        validator
            .possible()
            .iter()
            .any(PossibleEvent::is_attribute_kind)
    );

    validator.fire_event(&Event::attribute_name("", "a"));
    validator.fire_event(&Event::attribute_value("v"));
    validator.fire_event(&Event::LeaveStartTag);
    assert!(
        !validator
            .possible()
            .iter()
            .any(PossibleEvent::is_attribute_kind)
    );
}

#[test]
fn clone_commutes_with_fire_event() {
    let grammar = uniquely_defined_name();
    let mut validator = Validator::new(&grammar);
    validator.fire_event(&Event::enter_start_tag("", "doc"));

    let baseline = validator.possible();
    let mut clone = validator.clone();

    // Firing at the clone advances the clone only.
    assert!(clone.fire_event(&Event::LeaveStartTag).is_empty());
    assert_eq!(validator.possible(), baseline);

    // The original then observes the same transition.
    assert!(validator.fire_event(&Event::LeaveStartTag).is_empty());
    assert_eq!(validator.possible(), clone.possible());
}

#[test]
fn valid_sequences_end_cleanly_and_truncated_ones_do_not() {
    let grammar = uniquely_defined_name();

    let full = [
        Event::enter_start_tag("", "doc"),
        Event::LeaveStartTag,
        Event::enter_start_tag("", "p"),
        Event::LeaveStartTag,
        Event::enter_start_tag("", "name"),
        Event::LeaveStartTag,
        Event::text("x"),
        Event::end_tag("", "name"),
        Event::end_tag("", "p"),
        Event::end_tag("", "doc"),
    ];

    let mut validator = Validator::new(&grammar);
    assert!(fire_all(&mut validator, &full).is_empty());
    assert!(validator.can_end());
    assert!(validator.end().is_empty());

    // Stopping before the document closes is reported.
    let mut truncated = Validator::new(&grammar);
    fire_all(&mut truncated, &full[..4]);
    assert!(!truncated.can_end());
    assert!(!truncated.end().is_empty());
}

// --- compact events -------------------------------------------------------

#[test]
fn compact_events_expand_to_their_plain_sequence() {
    let build = |b: &mut SchemaBuilder| {
        let a = text_attribute(b, "a");
        let second = text_attribute(b, "b");
        let group = b.push(Pattern::Group { a, b: second });
        element(b, "foo", group)
    };

    let mut compact = Validator::new(&grammar(build));
    let errors = compact.fire_event(&Event::StartTagAndAttributes {
        uri: String::new(),
        local: "foo".to_string(),
        attrs: vec![
            (String::new(), "a".to_string(), "1".to_string()),
            (String::new(), "b".to_string(), "2".to_string()),
        ],
    });
    assert!(errors.is_empty());
    assert!(compact.fire_event(&Event::end_tag("", "foo")).is_empty());
    assert!(compact.end().is_empty());
}

#[test]
fn compact_attribute_event_checks_name_and_value() {
    let grammar = grammar(|b| {
        let attr = text_attribute(b, "a");
        element(b, "foo", attr)
    });
    let mut validator = Validator::new(&grammar);

    validator.fire_event(&Event::enter_start_tag("", "foo"));
    let errors = validator.fire_event(&Event::AttributeNameAndValue {
        uri: String::new(),
        local: "wrong".to_string(),
        value: "v".to_string(),
    });
    // Unexpected name; the bundled value is swallowed with it.
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ValidationError::UnexpectedAttribute(_)));
}

#[test]
fn possibility_sets_never_contain_compact_events() {
    let grammar = grammar(|b| {
        let attr = text_attribute(b, "a");
        element(b, "foo", attr)
    });
    let mut validator = Validator::new(&grammar);
    validator.fire_event(&Event::enter_start_tag("", "foo"));

    // The possibility vocabulary has no compact variants at all; every
    // member converts to a plain input event.
    for possibility in validator.possible().iter() {
        if let Some(event) = possible_to_input(possibility) {
            assert!(!event.is_compact());
        }
    }
}

// --- boundary behavior ----------------------------------------------------

#[test]
fn empty_text_events_are_tolerated_without_state_change() {
    let grammar = grammar(|b| {
        let empty = b.push(Pattern::Empty);
        element(b, "foo", empty)
    });
    let mut validator = Validator::new(&grammar);

    validator.fire_event(&Event::enter_start_tag("", "foo"));
    let before = validator.possible();
    assert!(validator.fire_event(&Event::text("")).is_empty());
    assert_eq!(validator.possible(), before);
}

#[test]
fn unexpected_text_is_reported_and_recovered_from() {
    let grammar = grammar(|b| {
        let empty = b.push(Pattern::Empty);
        let item = element(b, "item", empty);
        element(b, "doc", item)
    });
    let mut validator = Validator::new(&grammar);

    fire_all(
        &mut validator,
        &[Event::enter_start_tag("", "doc"), Event::LeaveStartTag],
    );
    let errors = validator.fire_event(&Event::text("stray"));
    assert_eq!(errors, vec![ValidationError::UnexpectedText]);

    // Validation continues normally afterwards.
    let errors = fire_all(
        &mut validator,
        &[
            Event::enter_start_tag("", "item"),
            Event::LeaveStartTag,
            Event::end_tag("", "item"),
            Event::end_tag("", "doc"),
        ],
    );
    assert!(errors.is_empty());
}

#[test]
fn unexpected_attribute_reports_the_name() {
    let grammar = grammar(|b| {
        let empty = b.push(Pattern::Empty);
        element(b, "foo", empty)
    });
    let mut validator = Validator::new(&grammar);

    validator.fire_event(&Event::enter_start_tag("", "foo"));
    let errors = validator.fire_event(&Event::attribute_name("", "ghost"));
    assert_eq!(
        errors,
        vec![ValidationError::UnexpectedAttribute(Name::new("", "ghost"))]
    );
    // The paired value is part of the reported attribute, not a new error.
    assert!(validator.fire_event(&Event::attribute_value("v")).is_empty());
    assert!(validator.fire_event(&Event::LeaveStartTag).is_empty());
}

// --- tracing --------------------------------------------------------------

#[derive(Default)]
struct RecordingTracer {
    events: usize,
    results: usize,
    recovery_enters: usize,
    recovery_leaves: usize,
    context_pushes: usize,
    context_pops: usize,
}

impl Tracer for RecordingTracer {
    fn trace_event(&mut self, _event: &Event) {
        self.events += 1;
    }

    fn trace_result(&mut self, _errors: &[ValidationError]) {
        self.results += 1;
    }

    fn trace_recovery_enter(&mut self, _diverted: bool) {
        self.recovery_enters += 1;
    }

    fn trace_recovery_leave(&mut self) {
        self.recovery_leaves += 1;
    }

    fn trace_context_push(&mut self) {
        self.context_pushes += 1;
    }

    fn trace_context_pop(&mut self) {
        self.context_pops += 1;
    }
}

#[test]
fn tracer_observes_dispatch_and_context_operations() {
    let grammar = grammar(|b| {
        let empty = b.push(Pattern::Empty);
        element(b, "foo", empty)
    });
    let mut validator = Validator::new(&grammar);
    let mut tracer = RecordingTracer::default();

    validator.enter_context_traced(&mut tracer);
    validator.define_prefix("p", "urn:x");
    for event in [
        Event::enter_start_tag("", "foo"),
        Event::LeaveStartTag,
        Event::end_tag("", "foo"),
    ] {
        validator.fire_event_with(&event, &mut tracer);
    }
    validator.leave_context_traced(&mut tracer);

    assert_eq!(tracer.events, 3);
    assert_eq!(tracer.results, 3);
    assert_eq!(tracer.context_pushes, 1);
    assert_eq!(tracer.context_pops, 1);
    assert_eq!(tracer.recovery_enters, 0);
}

#[test]
fn tracer_observes_recovery_frames() {
    let grammar = uniquely_defined_name();
    let mut validator = Validator::new(&grammar);
    let mut tracer = RecordingTracer::default();

    for event in [
        Event::enter_start_tag("", "doc"),
        Event::LeaveStartTag,
        // Misplaced: diverts to the unique definition.
        Event::enter_start_tag("", "name"),
        Event::LeaveStartTag,
        Event::end_tag("", "name"),
    ] {
        validator.fire_event_with(&event, &mut tracer);
    }

    assert_eq!(tracer.recovery_enters, 1);
    assert_eq!(tracer.recovery_leaves, 1);
}

// --- namespace contexts ---------------------------------------------------

#[test]
fn context_stack_resolves_qnames_per_element() {
    let grammar = grammar(|b| {
        let empty = b.push(Pattern::Empty);
        element(b, "doc", empty)
    });
    let mut validator = Validator::new(&grammar);

    validator.enter_context();
    validator.define_prefix("x", "urn:outer");
    validator.enter_context();
    validator.define_prefix("x", "urn:inner");

    assert_eq!(
        validator.resolve_name("x:e", false),
        Some(Name::new("urn:inner", "e"))
    );
    validator.leave_context();
    assert_eq!(
        validator.resolve_name("x:e", false),
        Some(Name::new("urn:outer", "e"))
    );

    // Default namespace applies to elements, not attributes.
    validator.define_prefix("", "urn:default");
    assert_eq!(
        validator.resolve_name("plain", false),
        Some(Name::new("urn:default", "plain"))
    );
    assert_eq!(
        validator.resolve_name("plain", true),
        Some(Name::new("", "plain"))
    );
}

// --- serialization round-trip --------------------------------------------

#[test]
fn round_tripped_schema_validates_identically() {
    let registry = Arc::new(Registry::new());
    let mut builder = SchemaBuilder::new();
    let attr = text_attribute(&mut builder, "id");
    let text = builder.push(Pattern::Text);
    let title = element(&mut builder, "title", text);
    let body = builder.push(Pattern::Group { a: attr, b: title });
    let entry = element(&mut builder, "entry", body);
    builder.define("entry", entry);
    let start = builder.push(Pattern::Ref {
        name: "entry".to_string(),
        resolved: None,
    });
    let schema = builder.finish(start, &registry).unwrap();

    let direct = Grammar::new(schema, registry.clone());
    let reread =
        read_tree_from_json(&write_tree_to_json(direct.schema()), registry).unwrap();

    let documents: [&[Event]; 2] = [
        // Valid document.
        &[
            Event::enter_start_tag("", "entry"),
            Event::attribute_name("", "id"),
            Event::attribute_value("e1"),
            Event::LeaveStartTag,
            Event::enter_start_tag("", "title"),
            Event::LeaveStartTag,
            Event::text("t"),
            Event::end_tag("", "title"),
            Event::end_tag("", "entry"),
        ],
        // Missing attribute and stray text.
        &[
            Event::enter_start_tag("", "entry"),
            Event::LeaveStartTag,
            Event::text("stray"),
            Event::enter_start_tag("", "title"),
            Event::LeaveStartTag,
            Event::end_tag("", "title"),
            Event::end_tag("", "entry"),
        ],
    ];

    for events in documents {
        let mut on_direct = Validator::new(&direct);
        let mut on_reread = Validator::new(&reread);
        for event in events {
            assert_eq!(
                on_direct.fire_event(event),
                on_reread.fire_event(event),
                "divergence on {event:?}"
            );
        }
        assert_eq!(on_direct.end(), on_reread.end());
    }
}
