//! Preparation pass.
//!
//! One traversal over the arena computes everything walkers need beyond the
//! raw tree: the namespace URIs occurring in name classes, per-node
//! has-attribute flags, canonical keys for `Value` nodes, and the
//! misplaced-element index. Datatype references and parameters are vetted
//! here so the event-dispatch path never sees an unknown datatype.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::SchemaError;
use crate::datatype::Registry;
use crate::names::{Name, NameClass};
use crate::resolver::NameResolver;

use super::{Pattern, PatternId};

#[derive(Debug, Clone, Default)]
pub(crate) struct Prepared {
    pub(crate) namespaces: Vec<String>,
    pub(crate) has_attributes: Vec<bool>,
    pub(crate) value_keys: HashMap<PatternId, String>,
    pub(crate) element_index: HashMap<Name, Vec<PatternId>>,
}

pub(crate) fn prepare(
    nodes: &[Pattern],
    paths: &[String],
    registry: &Registry,
) -> Result<Prepared, SchemaError> {
    let mut namespaces = IndexSet::new();
    let mut value_keys = HashMap::new();
    let mut element_index: HashMap<Name, Vec<PatternId>> = HashMap::new();

    for (index, node) in nodes.iter().enumerate() {
        let id = PatternId::new(index);
        match node {
            Pattern::Attribute { name, .. } => collect_namespaces(name, &mut namespaces),
            Pattern::Element { name, .. } => {
                collect_namespaces(name, &mut namespaces);
                if let Some(names) = name.names() {
                    for n in names {
                        element_index.entry(n.clone()).or_default().push(id);
                    }
                }
            }
            Pattern::Value {
                datatype_library,
                type_name,
                ns,
                raw,
            } => {
                let datatype = registry.find(datatype_library, type_name).ok_or_else(|| {
                    SchemaError::UnknownDatatype {
                        library: datatype_library.clone(),
                        name: type_name.clone(),
                        path: paths[index].clone(),
                    }
                })?;
                let resolver = datatype.needs_context().then(|| {
                    // Synthetic context: the declared ns becomes the default
                    // namespace, which is what an unprefixed QName resolves to.
                    let mut r = NameResolver::new();
                    r.define_prefix("", ns);
                    r
                });
                let key = datatype.parse(raw, resolver.as_ref()).map_err(|source| {
                    SchemaError::InvalidValue {
                        raw: raw.clone(),
                        path: paths[index].clone(),
                        source,
                    }
                })?;
                value_keys.insert(id, key);
            }
            Pattern::Data {
                datatype_library,
                type_name,
                params,
                ..
            } => {
                let datatype = registry.find(datatype_library, type_name).ok_or_else(|| {
                    SchemaError::UnknownDatatype {
                        library: datatype_library.clone(),
                        name: type_name.clone(),
                        path: paths[index].clone(),
                    }
                })?;
                datatype
                    .check_params(params)
                    .map_err(|source| SchemaError::InvalidParams {
                        path: paths[index].clone(),
                        source,
                    })?;
            }
            _ => {}
        }
    }

    let has_attributes = compute_attribute_flags(nodes);

    Ok(Prepared {
        namespaces: namespaces.into_iter().collect(),
        has_attributes,
        value_keys,
        element_index,
    })
}

fn collect_namespaces(nc: &NameClass, out: &mut IndexSet<String>) {
    match nc {
        NameClass::Name(name) => {
            out.insert(name.ns.clone());
        }
        NameClass::Choice(a, b) => {
            collect_namespaces(a, out);
            collect_namespaces(b, out);
        }
        NameClass::NsName { ns, except } => {
            out.insert(ns.clone());
            if let Some(e) = except {
                collect_namespaces(e, out);
            }
        }
        NameClass::AnyName { except } => {
            if let Some(e) = except {
                collect_namespaces(e, out);
            }
        }
    }
}

/// Per-node flag: does this subtree contain an attribute pattern?
///
/// Non-crossing: refs are not followed and elements are not entered, so a
/// composite's flag covers exactly the attributes it owes to its own start
/// tag. Memoized recursion; arena order is arbitrary.
fn compute_attribute_flags(nodes: &[Pattern]) -> Vec<bool> {
    fn flag(nodes: &[Pattern], index: usize, memo: &mut [Option<bool>]) -> bool {
        if let Some(known) = memo[index] {
            return known;
        }
        // Cycles only arise through refs, which this walk does not follow;
        // seed the slot to be safe anyway.
        memo[index] = Some(false);
        let value = match &nodes[index] {
            Pattern::Attribute { .. } => true,
            Pattern::Group { a, b } | Pattern::Choice { a, b } | Pattern::Interleave { a, b } => {
                flag(nodes, a.index(), memo) || flag(nodes, b.index(), memo)
            }
            Pattern::OneOrMore { content }
            | Pattern::List { content }
            | Pattern::Define { content, .. } => flag(nodes, content.index(), memo),
            _ => false,
        };
        memo[index] = Some(value);
        value
    }

    let mut memo = vec![None; nodes.len()];
    (0..nodes.len())
        .map(|i| flag(nodes, i, &mut memo))
        .collect()
}
