//! The simplified pattern tree.
//!
//! Patterns live in a flat arena indexed by [`PatternId`]; `Ref` nodes carry
//! the name of a definition and, after resolution, the arena index of its
//! `Define`. The grammar graph is cyclic through refs, so the arena never
//! hands out owning pointers between nodes.
//!
//! A schema is built once ([`SchemaBuilder`]), then resolved and prepared
//! ([`SchemaBuilder::finish`]) and immutable afterwards.

mod prepare;
mod resolve;

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::SchemaError;
use crate::datatype::Registry;
use crate::names::{Name, NameClass};

pub(crate) use prepare::Prepared;

/// Index of a pattern node in the schema arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(u32);

impl PatternId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the simplified pattern tree.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches the empty sequence.
    Empty,
    /// Matches nothing.
    NotAllowed,
    /// Matches any text run.
    Text,
    /// Matches one text run equal (per the datatype) to a stored value.
    Value {
        datatype_library: String,
        type_name: String,
        ns: String,
        raw: String,
    },
    /// Matches one text run the datatype accepts under the given parameters,
    /// minus an optional exception pattern.
    Data {
        datatype_library: String,
        type_name: String,
        params: Vec<(String, String)>,
        except: Option<PatternId>,
    },
    /// Whitespace-separated tokens, each validated against `content`.
    List { content: PatternId },
    /// One attribute whose name matches `name` and whose value satisfies
    /// `content`.
    Attribute {
        name: Arc<NameClass>,
        content: PatternId,
    },
    /// A balanced start/end-tag region whose content satisfies `content`.
    Element {
        name: Arc<NameClass>,
        content: PatternId,
    },
    /// Named production body, target of refs.
    Define { name: String, content: PatternId },
    /// One or more repetitions.
    OneOrMore { content: PatternId },
    /// Sequence: `a` then `b`.
    Group { a: PatternId, b: PatternId },
    /// Either `a` or `b`.
    Choice { a: PatternId, b: PatternId },
    /// Arbitrary interleaving of events from `a` and `b`.
    Interleave { a: PatternId, b: PatternId },
    /// Reference to a definition; `resolved` is bound during resolution.
    Ref {
        name: String,
        resolved: Option<PatternId>,
    },
}

/// Arena builder. Push nodes, then [`finish`](SchemaBuilder::finish) to run
/// the resolution and preparation passes.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    nodes: Vec<Pattern>,
    paths: Vec<String>,
    defines: IndexMap<String, PatternId>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a node with an empty origin path.
    pub fn push(&mut self, pattern: Pattern) -> PatternId {
        self.push_at(pattern, String::new())
    }

    /// Push a node recording where in the source schema it came from.
    pub fn push_at(&mut self, pattern: Pattern, path: impl Into<String>) -> PatternId {
        let id = PatternId::new(self.nodes.len());
        self.nodes.push(pattern);
        self.paths.push(path.into());
        id
    }

    /// Push a `Define` node and register it in the definition table.
    pub fn define(&mut self, name: impl Into<String>, content: PatternId) -> PatternId {
        let name = name.into();
        let id = self.push(Pattern::Define {
            name: name.clone(),
            content,
        });
        self.defines.insert(name, id);
        id
    }

    /// Resolve refs, run preparation, and seal the schema.
    pub fn finish(self, start: PatternId, registry: &Registry) -> Result<Schema, SchemaError> {
        let SchemaBuilder {
            mut nodes,
            paths,
            defines,
        } = self;
        resolve::resolve(&mut nodes, &defines)?;
        let prepared = prepare::prepare(&nodes, &paths, registry)?;
        Ok(Schema {
            nodes,
            paths,
            start,
            defines,
            prepared,
        })
    }
}

/// An immutable, prepared pattern tree.
#[derive(Debug, Clone)]
pub struct Schema {
    nodes: Vec<Pattern>,
    paths: Vec<String>,
    start: PatternId,
    defines: IndexMap<String, PatternId>,
    prepared: Prepared,
}

impl Schema {
    #[inline]
    pub fn pattern(&self, id: PatternId) -> &Pattern {
        &self.nodes[id.index()]
    }

    /// Origin path of a node in the source schema (may be empty).
    pub fn path(&self, id: PatternId) -> &str {
        &self.paths[id.index()]
    }

    pub fn start(&self) -> PatternId {
        self.start
    }

    pub fn defines(&self) -> impl Iterator<Item = (&str, PatternId)> {
        self.defines.iter().map(|(name, &id)| (name.as_str(), id))
    }

    pub fn define(&self, name: &str) -> Option<PatternId> {
        self.defines.get(name).copied()
    }

    /// Namespace URIs appearing in name classes, in discovery order.
    pub fn namespaces(&self) -> &[String] {
        &self.prepared.namespaces
    }

    /// Whether the subtree under `id` contains any attribute pattern.
    /// Does not cross ref boundaries or descend into elements.
    pub fn has_attributes(&self, id: PatternId) -> bool {
        self.prepared.has_attributes[id.index()]
    }

    /// Canonical key precomputed for a `Value` node.
    pub fn value_key(&self, id: PatternId) -> Option<&str> {
        self.prepared.value_keys.get(&id).map(String::as_str)
    }

    /// Element patterns with a simple name class admitting `(ns, local)`.
    /// Drives misplaced-element recovery.
    pub fn elements_named(&self, ns: &str, local: &str) -> &[PatternId] {
        self.prepared
            .element_index
            .get(&Name::new(ns, local))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of definitions never referenced by any `Ref`.
    pub fn unreferenced_defines(&self) -> Vec<&str> {
        let referenced: HashSet<&str> = self
            .nodes
            .iter()
            .filter_map(|p| match p {
                Pattern::Ref { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        self.defines
            .keys()
            .map(String::as_str)
            .filter(|name| !referenced.contains(name))
            .collect()
    }

    /// Follow `Ref` and `Define` indirection down to a concrete pattern.
    ///
    /// Refs collapse directly to their define's body; there is no ref layer
    /// at walk time.
    pub fn deref(&self, mut id: PatternId) -> PatternId {
        loop {
            match self.pattern(id) {
                Pattern::Ref {
                    resolved: Some(target),
                    ..
                } => id = *target,
                Pattern::Define { content, .. } => id = *content,
                Pattern::Ref { resolved: None, name } => {
                    unreachable!("unresolved ref {name} survived preparation")
                }
                _ => return id,
            }
        }
    }

    /// Whether the subtree under `id` contains an attribute pattern admitting
    /// `(ns, local)`. Used to route attribute events between interleave
    /// branches. Follows refs (guarded against cycles) but does not descend
    /// into nested elements: their attributes are their own.
    pub fn subtree_has_attribute(&self, id: PatternId, ns: &str, local: &str) -> bool {
        fn walk(
            schema: &Schema,
            id: PatternId,
            ns: &str,
            local: &str,
            visited: &mut HashSet<PatternId>,
        ) -> bool {
            if !visited.insert(id) {
                return false;
            }
            match schema.pattern(id) {
                Pattern::Attribute { name, .. } => name.matches(ns, local),
                Pattern::Group { a, b }
                | Pattern::Choice { a, b }
                | Pattern::Interleave { a, b } => {
                    walk(schema, *a, ns, local, visited) || walk(schema, *b, ns, local, visited)
                }
                Pattern::OneOrMore { content } | Pattern::Define { content, .. } => {
                    walk(schema, *content, ns, local, visited)
                }
                Pattern::Ref {
                    resolved: Some(target),
                    ..
                } => walk(schema, *target, ns, local, visited),
                _ => false,
            }
        }

        let mut visited = HashSet::new();
        walk(self, id, ns, local, &mut visited)
    }
}

/// A prepared schema ready to hand out walkers, paired with the datatype
/// registry it was vetted against.
///
/// Cheap to clone and safe to share across threads; independent validators
/// on different threads can run over the same grammar.
#[derive(Debug, Clone)]
pub struct Grammar {
    schema: Arc<Schema>,
    registry: Arc<Registry>,
}

impl Grammar {
    pub fn new(schema: Schema, registry: Arc<Registry>) -> Self {
        Self {
            schema: Arc::new(schema),
            registry,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}
