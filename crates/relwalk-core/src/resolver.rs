//! Prefix-to-URI resolution with a stack of namespace contexts.
//!
//! The caller pushes a context before firing `enterStartTag` (so xmlns
//! declarations on the element are visible to the element's own name) and
//! pops it after the matching `endTag`.

use std::collections::HashMap;

use crate::names::Name;

/// The namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Stack of prefix→URI mappings.
///
/// The base frame carries the predefined bindings (`xml`, and `""` for the
/// absent default namespace) and never pops.
#[derive(Debug, Clone)]
pub struct NameResolver {
    frames: Vec<HashMap<String, String>>,
}

impl NameResolver {
    pub fn new() -> Self {
        let mut base = HashMap::new();
        base.insert(String::new(), String::new());
        base.insert("xml".to_string(), XML_NAMESPACE.to_string());
        Self { frames: vec![base] }
    }

    /// Push an empty context frame.
    pub fn enter_context(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Push a context frame pre-populated with `mapping`.
    pub fn enter_context_with_mapping(&mut self, mapping: HashMap<String, String>) {
        self.frames.push(mapping);
    }

    /// Bind `prefix` to `uri` in the current context. The empty prefix sets
    /// the default namespace.
    pub fn define_prefix(&mut self, prefix: &str, uri: &str) {
        let top = self
            .frames
            .last_mut()
            .expect("resolver always has a base frame");
        top.insert(prefix.to_string(), uri.to_string());
    }

    /// Pop the current context frame. The base frame never pops.
    pub fn leave_context(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Look up the URI bound to `prefix`, innermost context first.
    pub fn prefix_uri(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(prefix))
            .map(String::as_str)
    }

    /// Resolve a lexical QName against the current context stack.
    ///
    /// An unprefixed element name takes the default namespace; an unprefixed
    /// attribute name is in the no-namespace. Returns `None` for a malformed
    /// QName or an unbound prefix.
    pub fn resolve_name(&self, qname: &str, for_attribute: bool) -> Option<Name> {
        let mut parts = qname.split(':');
        let first = parts.next()?;
        match (parts.next(), parts.next()) {
            (None, _) => {
                if first.is_empty() {
                    return None;
                }
                let ns = if for_attribute {
                    ""
                } else {
                    self.prefix_uri("")?
                };
                Some(Name::new(ns, first))
            }
            (Some(local), None) => {
                if first.is_empty() || local.is_empty() {
                    return None;
                }
                Some(Name::new(self.prefix_uri(first)?, local))
            }
            // More than one colon is not a QName.
            (Some(_), Some(_)) => None,
        }
    }
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new()
    }
}
