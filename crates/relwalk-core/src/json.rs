//! Versioned JSON serialization of prepared schemas.
//!
//! On-disk shape: `{"v": <version>, "o": <option bits>, "d": <tree>}`.
//! `d` is a recursive positional encoding: every node is an array whose
//! first element is a numeric kind; kind 0 marks a plain array whose
//! remaining elements are the items. Option bit 0 records whether pattern
//! nodes carry their origin path right after the kind.
//!
//! The decoder dispatches on the kind, recurses on nested arrays and passes
//! primitives through. Unknown versions are rejected up front.

use std::sync::Arc;

use serde_json::{Value as Json, json};

use crate::SchemaError;
use crate::datatype::Registry;
use crate::names::{Name, NameClass};
use crate::schema::{Grammar, Pattern, PatternId, Schema, SchemaBuilder};

/// Current format version. Only this major version is accepted.
pub const FORMAT_VERSION: u64 = 3;

/// Option bit 0: pattern nodes carry origin paths.
pub const OPT_PATHS: u64 = 1;

const K_ARRAY: u64 = 0;
const K_EMPTY: u64 = 1;
const K_DATA: u64 = 2;
const K_LIST: u64 = 3;
const K_PARAM: u64 = 4;
const K_VALUE: u64 = 5;
const K_NOT_ALLOWED: u64 = 6;
const K_TEXT: u64 = 7;
const K_REF: u64 = 8;
const K_ONE_OR_MORE: u64 = 9;
const K_CHOICE: u64 = 10;
const K_GROUP: u64 = 11;
const K_ATTRIBUTE: u64 = 12;
const K_ELEMENT: u64 = 13;
const K_DEFINE: u64 = 14;
const K_GRAMMAR: u64 = 15;
const K_INTERLEAVE: u64 = 17;
const K_NAME: u64 = 18;
const K_NAME_CHOICE: u64 = 19;
const K_NS_NAME: u64 = 20;
const K_ANY_NAME: u64 = 21;

/// Serialize a schema. Always writes the current version with paths present.
pub fn write_tree_to_json(schema: &Schema) -> String {
    let writer = Writer { schema };
    let mut defines: Vec<Json> = vec![json!(K_ARRAY)];
    defines.extend(schema.defines().map(|(_, id)| writer.encode(id)));

    let doc = json!({
        "v": FORMAT_VERSION,
        "o": OPT_PATHS,
        "d": [
            json!(K_GRAMMAR),
            json!(""),
            writer.encode(schema.start()),
            Json::Array(defines),
        ],
    });
    doc.to_string()
}

/// Deserialize, resolve and prepare a schema.
pub fn read_tree_from_json(source: &str, registry: Arc<Registry>) -> Result<Grammar, SchemaError> {
    let doc: Json = serde_json::from_str(source)?;

    let version = field_u64(&doc, "v")?;
    if version != FORMAT_VERSION {
        return Err(SchemaError::Version(version));
    }
    let options = field_u64(&doc, "o")?;

    let mut reader = Reader {
        builder: SchemaBuilder::new(),
        with_paths: options & OPT_PATHS != 0,
    };
    let d = doc
        .get("d")
        .ok_or_else(|| malformed("missing d entry"))?;

    let (kind, args) = reader.open(d)?;
    if kind != K_GRAMMAR {
        return Err(malformed("top-level node is not a grammar"));
    }
    let (args, _path) = reader.take_path(args)?;
    let [start, defines] = args else {
        return Err(malformed("grammar node wants [start, defines]"));
    };

    // Defines first so the start pattern's refs have targets.
    for entry in array_items(defines)? {
        let (kind, dargs) = reader.open(entry)?;
        if kind != K_DEFINE {
            return Err(malformed("grammar definitions must be define nodes"));
        }
        let (dargs, _path) = reader.take_path(dargs)?;
        let [name, content] = dargs else {
            return Err(malformed("define node wants [name, content]"));
        };
        let name = as_str(name)?.to_string();
        let content = reader.decode_pattern(content)?;
        reader.builder.define(name, content);
    }

    let start = reader.decode_pattern(start)?;
    let schema = reader.builder.finish(start, &registry)?;
    Ok(Grammar::new(schema, registry))
}

struct Writer<'s> {
    schema: &'s Schema,
}

impl Writer<'_> {
    fn encode(&self, id: PatternId) -> Json {
        let path = self.schema.path(id);
        match self.schema.pattern(id) {
            Pattern::Empty => json!([K_EMPTY, path]),
            Pattern::NotAllowed => json!([K_NOT_ALLOWED, path]),
            Pattern::Text => json!([K_TEXT, path]),
            Pattern::Value {
                datatype_library,
                type_name,
                ns,
                raw,
            } => json!([K_VALUE, path, datatype_library, type_name, ns, raw]),
            Pattern::Data {
                datatype_library,
                type_name,
                params,
                except,
            } => {
                let mut encoded: Vec<Json> = vec![json!(K_ARRAY)];
                encoded.extend(
                    params
                        .iter()
                        .map(|(key, value)| json!([K_PARAM, key, value])),
                );
                let mut node = vec![
                    json!(K_DATA),
                    json!(path),
                    json!(datatype_library),
                    json!(type_name),
                    Json::Array(encoded),
                ];
                if let Some(except) = except {
                    node.push(self.encode(*except));
                }
                Json::Array(node)
            }
            Pattern::List { content } => json!([K_LIST, path, self.encode(*content)]),
            Pattern::Attribute { name, content } => {
                json!([K_ATTRIBUTE, path, encode_name_class(name), self.encode(*content)])
            }
            Pattern::Element { name, content } => {
                json!([K_ELEMENT, path, encode_name_class(name), self.encode(*content)])
            }
            Pattern::Define { name, content } => {
                json!([K_DEFINE, path, name, self.encode(*content)])
            }
            Pattern::OneOrMore { content } => json!([K_ONE_OR_MORE, path, self.encode(*content)]),
            Pattern::Group { a, b } => json!([K_GROUP, path, self.encode(*a), self.encode(*b)]),
            Pattern::Choice { a, b } => json!([K_CHOICE, path, self.encode(*a), self.encode(*b)]),
            Pattern::Interleave { a, b } => {
                json!([K_INTERLEAVE, path, self.encode(*a), self.encode(*b)])
            }
            // Refs encode by name only; the cycle is re-tied on read.
            Pattern::Ref { name, .. } => json!([K_REF, path, name]),
        }
    }
}

fn encode_name_class(nc: &NameClass) -> Json {
    match nc {
        NameClass::Name(name) => json!([K_NAME, name.ns, name.local]),
        NameClass::Choice(a, b) => {
            json!([K_NAME_CHOICE, encode_name_class(a), encode_name_class(b)])
        }
        NameClass::NsName { ns, except } => match except {
            None => json!([K_NS_NAME, ns]),
            Some(e) => json!([K_NS_NAME, ns, encode_name_class(e)]),
        },
        NameClass::AnyName { except } => match except {
            None => json!([K_ANY_NAME]),
            Some(e) => json!([K_ANY_NAME, encode_name_class(e)]),
        },
    }
}

struct Reader {
    builder: SchemaBuilder,
    with_paths: bool,
}

impl Reader {
    /// Split a node into its kind and argument slice.
    fn open<'j>(&self, node: &'j Json) -> Result<(u64, &'j [Json]), SchemaError> {
        let items = node
            .as_array()
            .ok_or_else(|| malformed("expected an array node"))?;
        let kind = items
            .first()
            .and_then(Json::as_u64)
            .ok_or_else(|| malformed("node kind must be a number"))?;
        Ok((kind, &items[1..]))
    }

    /// Peel the leading path string off pattern-node arguments when the
    /// paths option bit is set.
    fn take_path<'j>(
        &self,
        args: &'j [Json],
    ) -> Result<(&'j [Json], String), SchemaError> {
        if !self.with_paths {
            return Ok((args, String::new()));
        }
        let (first, rest) = args
            .split_first()
            .ok_or_else(|| malformed("missing origin path"))?;
        Ok((rest, as_str(first)?.to_string()))
    }

    fn decode_pattern(&mut self, node: &Json) -> Result<PatternId, SchemaError> {
        let (kind, args) = self.open(node)?;
        let (args, path) = self.take_path(args)?;

        let pattern = match (kind, args) {
            (K_EMPTY, []) => Pattern::Empty,
            (K_NOT_ALLOWED, []) => Pattern::NotAllowed,
            (K_TEXT, []) => Pattern::Text,
            (K_VALUE, [lib, type_name, ns, raw]) => Pattern::Value {
                datatype_library: as_str(lib)?.to_string(),
                type_name: as_str(type_name)?.to_string(),
                ns: as_str(ns)?.to_string(),
                raw: as_str(raw)?.to_string(),
            },
            (K_DATA, [lib, type_name, params]) => Pattern::Data {
                datatype_library: as_str(lib)?.to_string(),
                type_name: as_str(type_name)?.to_string(),
                params: self.decode_params(params)?,
                except: None,
            },
            (K_DATA, [lib, type_name, params, except]) => {
                let except = self.decode_pattern(except)?;
                Pattern::Data {
                    datatype_library: as_str(lib)?.to_string(),
                    type_name: as_str(type_name)?.to_string(),
                    params: self.decode_params(params)?,
                    except: Some(except),
                }
            }
            (K_LIST, [content]) => Pattern::List {
                content: self.decode_pattern(content)?,
            },
            (K_ATTRIBUTE, [name, content]) => Pattern::Attribute {
                name: Arc::new(decode_name_class(name)?),
                content: self.decode_pattern(content)?,
            },
            (K_ELEMENT, [name, content]) => Pattern::Element {
                name: Arc::new(decode_name_class(name)?),
                content: self.decode_pattern(content)?,
            },
            (K_ONE_OR_MORE, [content]) => Pattern::OneOrMore {
                content: self.decode_pattern(content)?,
            },
            (K_GROUP, [a, b]) => Pattern::Group {
                a: self.decode_pattern(a)?,
                b: self.decode_pattern(b)?,
            },
            (K_CHOICE, [a, b]) => Pattern::Choice {
                a: self.decode_pattern(a)?,
                b: self.decode_pattern(b)?,
            },
            (K_INTERLEAVE, [a, b]) => Pattern::Interleave {
                a: self.decode_pattern(a)?,
                b: self.decode_pattern(b)?,
            },
            (K_REF, [name]) => Pattern::Ref {
                name: as_str(name)?.to_string(),
                resolved: None,
            },
            _ => return Err(malformed(format!("bad node of kind {kind}"))),
        };

        Ok(self.builder.push_at(pattern, path))
    }

    fn decode_params(&self, node: &Json) -> Result<Vec<(String, String)>, SchemaError> {
        let mut params = Vec::new();
        for item in array_items(node)? {
            let (kind, args) = self.open(item)?;
            let (K_PARAM, [key, value]) = (kind, args) else {
                return Err(malformed("datatype parameter wants [key, value]"));
            };
            params.push((as_str(key)?.to_string(), as_str(value)?.to_string()));
        }
        Ok(params)
    }
}

fn decode_name_class(node: &Json) -> Result<NameClass, SchemaError> {
    let items = node
        .as_array()
        .ok_or_else(|| malformed("expected a name-class node"))?;
    let kind = items
        .first()
        .and_then(Json::as_u64)
        .ok_or_else(|| malformed("name-class kind must be a number"))?;

    match (kind, &items[1..]) {
        (K_NAME, [ns, local]) => Ok(NameClass::Name(Name::new(as_str(ns)?, as_str(local)?))),
        (K_NAME_CHOICE, [a, b]) => Ok(NameClass::Choice(
            Box::new(decode_name_class(a)?),
            Box::new(decode_name_class(b)?),
        )),
        (K_NS_NAME, [ns]) => Ok(NameClass::NsName {
            ns: as_str(ns)?.to_string(),
            except: None,
        }),
        (K_NS_NAME, [ns, except]) => Ok(NameClass::NsName {
            ns: as_str(ns)?.to_string(),
            except: Some(Box::new(decode_name_class(except)?)),
        }),
        (K_ANY_NAME, []) => Ok(NameClass::AnyName { except: None }),
        (K_ANY_NAME, [except]) => Ok(NameClass::AnyName {
            except: Some(Box::new(decode_name_class(except)?)),
        }),
        _ => Err(malformed(format!("bad name class of kind {kind}"))),
    }
}

fn array_items(node: &Json) -> Result<&[Json], SchemaError> {
    let items = node
        .as_array()
        .ok_or_else(|| malformed("expected a plain array"))?;
    match items.first().and_then(Json::as_u64) {
        Some(K_ARRAY) => Ok(&items[1..]),
        _ => Err(malformed("plain arrays must be tagged with kind 0")),
    }
}

fn field_u64(doc: &Json, key: &str) -> Result<u64, SchemaError> {
    doc.get(key)
        .and_then(Json::as_u64)
        .ok_or_else(|| malformed(format!("missing numeric {key} entry")))
}

fn as_str(node: &Json) -> Result<&str, SchemaError> {
    node.as_str()
        .ok_or_else(|| malformed("expected a string"))
}

fn malformed(message: impl Into<String>) -> SchemaError {
    SchemaError::Malformed(message.into())
}
