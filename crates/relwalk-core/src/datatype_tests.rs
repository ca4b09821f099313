use crate::datatype::{Registry, collapse_whitespace};

#[test]
fn builtin_library_lives_at_the_empty_uri() {
    let registry = Registry::new();
    assert!(registry.find("", "string").is_some());
    assert!(registry.find("", "token").is_some());
    assert!(registry.find("", "integer").is_none());
    assert!(registry.find("urn:unknown", "string").is_none());
}

#[test]
fn string_compares_exactly() {
    let registry = Registry::new();
    let string = registry.find("", "string").unwrap();

    let a = string.parse(" a  b ", None).unwrap();
    let b = string.parse("a b", None).unwrap();
    assert_ne!(a, b);
    assert_eq!(a, string.parse(" a  b ", None).unwrap());
}

#[test]
fn token_collapses_whitespace() {
    let registry = Registry::new();
    let token = registry.find("", "token").unwrap();

    let a = token.parse("  a \t b\n", None).unwrap();
    let b = token.parse("a b", None).unwrap();
    assert_eq!(a, b);
}

#[test]
fn builtins_reject_parameters() {
    let registry = Registry::new();
    let params = vec![("maxLength".to_string(), "4".to_string())];

    for type_name in ["string", "token"] {
        let datatype = registry.find("", type_name).unwrap();
        assert!(datatype.check_params(&params).is_err());
        assert!(datatype.check_params(&[]).is_ok());
    }
}

#[test]
fn builtins_accept_any_lexical_form() {
    let registry = Registry::new();
    let token = registry.find("", "token").unwrap();
    assert!(token.disallows("anything at all", &[], None).is_ok());
    assert!(token.disallows("", &[], None).is_ok());
}

#[test]
fn collapse_handles_edges() {
    assert_eq!(collapse_whitespace(""), "");
    assert_eq!(collapse_whitespace("   "), "");
    assert_eq!(collapse_whitespace("one"), "one");
    assert_eq!(collapse_whitespace(" one\t two \n three "), "one two three");
}
