//! Resolution pass: bind every `Ref` to its `Define`.
//!
//! The arena is scanned flat, so every ref is visited exactly once and
//! ref→define cycles (mutual recursion among definitions) need no special
//! handling.

use indexmap::IndexMap;

use crate::SchemaError;

use super::{Pattern, PatternId};

pub(crate) fn resolve(
    nodes: &mut [Pattern],
    defines: &IndexMap<String, PatternId>,
) -> Result<(), SchemaError> {
    let mut unresolved = Vec::new();

    for node in nodes.iter_mut() {
        if let Pattern::Ref { name, resolved } = node {
            match defines.get(name.as_str()) {
                Some(&target) => *resolved = Some(target),
                None => {
                    if !unresolved.contains(name) {
                        unresolved.push(name.clone());
                    }
                }
            }
        }
    }

    if unresolved.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::UnresolvedRefs { names: unresolved })
    }
}
