use std::sync::Arc;

use crate::SchemaError;
use crate::datatype::Registry;
use crate::names::NameClass;
use crate::schema::{Pattern, PatternId, Schema, SchemaBuilder};

fn registry() -> Registry {
    Registry::new()
}

fn element(builder: &mut SchemaBuilder, local: &str, content: PatternId) -> PatternId {
    builder.push(Pattern::Element {
        name: Arc::new(NameClass::name("", local)),
        content,
    })
}

#[test]
fn unresolved_ref_is_reported() {
    let mut builder = SchemaBuilder::new();
    let body = builder.push(Pattern::Ref {
        name: "missing".to_string(),
        resolved: None,
    });
    let root = element(&mut builder, "doc", body);

    let err = builder.finish(root, &registry()).unwrap_err();
    match err {
        SchemaError::UnresolvedRefs { names } => assert_eq!(names, vec!["missing".to_string()]),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn deref_collapses_ref_and_define() {
    let mut builder = SchemaBuilder::new();
    let empty = builder.push(Pattern::Empty);
    let inner = element(&mut builder, "leaf", empty);
    builder.define("leaf", inner);
    let body = builder.push(Pattern::Ref {
        name: "leaf".to_string(),
        resolved: None,
    });
    let root = element(&mut builder, "doc", body);

    let schema = builder.finish(root, &registry()).unwrap();
    let target = schema.deref(body);
    assert!(matches!(schema.pattern(target), Pattern::Element { .. }));
    assert_eq!(target, inner);
}

#[test]
fn cyclic_refs_resolve() {
    // doc ::= element item { doc | empty } — mutual recursion through a
    // define, the shape every recursive schema reduces to.
    let mut builder = SchemaBuilder::new();
    let recurse = builder.push(Pattern::Ref {
        name: "item".to_string(),
        resolved: None,
    });
    let empty = builder.push(Pattern::Empty);
    let body = builder.push(Pattern::Choice {
        a: recurse,
        b: empty,
    });
    let item = element(&mut builder, "item", body);
    builder.define("item", item);
    let start = builder.push(Pattern::Ref {
        name: "item".to_string(),
        resolved: None,
    });

    let schema = builder.finish(start, &registry()).unwrap();
    assert_eq!(schema.deref(start), item);
}

#[test]
fn unknown_datatype_fails_preparation() {
    let mut builder = SchemaBuilder::new();
    let value = builder.push_at(
        Pattern::Value {
            datatype_library: String::new(),
            type_name: "decimal".to_string(),
            ns: String::new(),
            raw: "1.0".to_string(),
        },
        "doc/elem",
    );
    let root = element(&mut builder, "doc", value);

    let err = builder.finish(root, &registry()).unwrap_err();
    match err {
        SchemaError::UnknownDatatype { name, path, .. } => {
            assert_eq!(name, "decimal");
            assert_eq!(path, "doc/elem");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn bad_datatype_params_fail_preparation() {
    let mut builder = SchemaBuilder::new();
    let data = builder.push(Pattern::Data {
        datatype_library: String::new(),
        type_name: "token".to_string(),
        params: vec![("pattern".to_string(), "[a-z]+".to_string())],
        except: None,
    });
    let root = element(&mut builder, "doc", data);

    assert!(matches!(
        builder.finish(root, &registry()),
        Err(SchemaError::InvalidParams { .. })
    ));
}

#[test]
fn value_keys_are_precomputed() {
    let mut builder = SchemaBuilder::new();
    let value = builder.push(Pattern::Value {
        datatype_library: String::new(),
        type_name: "token".to_string(),
        ns: String::new(),
        raw: "  yes  please ".to_string(),
    });
    let root = element(&mut builder, "doc", value);

    let schema = builder.finish(root, &registry()).unwrap();
    assert_eq!(schema.value_key(value), Some("yes please"));
}

#[test]
fn namespaces_are_collected_in_order() {
    let mut builder = SchemaBuilder::new();
    let empty = builder.push(Pattern::Empty);
    let inner = builder.push(Pattern::Element {
        name: Arc::new(NameClass::name("urn:second", "b")),
        content: empty,
    });
    let attr_content = builder.push(Pattern::Text);
    let attr = builder.push(Pattern::Attribute {
        name: Arc::new(NameClass::name("urn:third", "c")),
        content: attr_content,
    });
    let group = builder.push(Pattern::Group { a: attr, b: inner });
    let root = builder.push(Pattern::Element {
        name: Arc::new(NameClass::name("urn:first", "a")),
        content: group,
    });

    let schema = builder.finish(root, &registry()).unwrap();
    assert_eq!(
        schema.namespaces(),
        &[
            "urn:second".to_string(),
            "urn:third".to_string(),
            "urn:first".to_string(),
        ]
    );
}

#[test]
fn attribute_flags_stop_at_element_boundaries() {
    let mut builder = SchemaBuilder::new();
    let text = builder.push(Pattern::Text);
    let attr = builder.push(Pattern::Attribute {
        name: Arc::new(NameClass::name("", "a")),
        content: text,
    });
    let empty = builder.push(Pattern::Empty);
    let inner = element(&mut builder, "inner", attr);
    let group = builder.push(Pattern::Group { a: inner, b: empty });
    let root = element(&mut builder, "doc", group);

    let schema = builder.finish(root, &registry()).unwrap();
    assert!(schema.has_attributes(attr));
    // The inner element owns that attribute; the group around the element
    // owes no attributes of its own.
    assert!(!schema.has_attributes(group));
}

#[test]
fn element_index_covers_simple_names_only() {
    let mut builder = SchemaBuilder::new();
    let empty = builder.push(Pattern::Empty);
    let plain = element(&mut builder, "plain", empty);
    let wild_content = builder.push(Pattern::Empty);
    let wild = builder.push(Pattern::Element {
        name: Arc::new(NameClass::AnyName { except: None }),
        content: wild_content,
    });
    let group = builder.push(Pattern::Group { a: plain, b: wild });
    let root = element(&mut builder, "doc", group);

    let schema = builder.finish(root, &registry()).unwrap();
    assert_eq!(schema.elements_named("", "plain"), &[plain]);
    // The wildcard element is not enumerable and stays out of the index.
    assert!(schema.elements_named("", "anything").is_empty());
}

#[test]
fn subtree_attribute_query_routes_by_name() {
    let mut builder = SchemaBuilder::new();
    let text_a = builder.push(Pattern::Text);
    let attr_a = builder.push(Pattern::Attribute {
        name: Arc::new(NameClass::name("", "a")),
        content: text_a,
    });
    let text_b = builder.push(Pattern::Text);
    let attr_b = builder.push(Pattern::Attribute {
        name: Arc::new(NameClass::name("", "b")),
        content: text_b,
    });
    let interleave = builder.push(Pattern::Interleave {
        a: attr_a,
        b: attr_b,
    });
    let root = element(&mut builder, "doc", interleave);

    let schema = builder.finish(root, &registry()).unwrap();
    assert!(schema.subtree_has_attribute(attr_a, "", "a"));
    assert!(!schema.subtree_has_attribute(attr_a, "", "b"));
    assert!(schema.subtree_has_attribute(interleave, "", "b"));
}

#[test]
fn unreferenced_defines_are_listed() {
    let mut builder = SchemaBuilder::new();
    let empty = builder.push(Pattern::Empty);
    let used = element(&mut builder, "used", empty);
    builder.define("used", used);
    let empty2 = builder.push(Pattern::Empty);
    let unused = element(&mut builder, "unused", empty2);
    builder.define("unused", unused);
    let body = builder.push(Pattern::Ref {
        name: "used".to_string(),
        resolved: None,
    });
    let root = element(&mut builder, "doc", body);

    let schema = builder.finish(root, &registry()).unwrap();
    assert_eq!(schema.unreferenced_defines(), vec!["unused"]);
}

fn tiny_schema() -> Schema {
    let mut builder = SchemaBuilder::new();
    let empty = builder.push(Pattern::Empty);
    let root = element(&mut builder, "doc", empty);
    builder.finish(root, &registry()).unwrap()
}

#[test]
fn schemas_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>(_: &T) {}
    let schema = tiny_schema();
    assert_send_sync(&schema);
}
