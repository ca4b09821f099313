//! Conversion façade.
//!
//! Simplification is an external collaborator: this entry point consumes its
//! serialized output, re-runs resolution and preparation, and optionally
//! records a freshness manifest over the input. The manifest hash algorithm
//! is caller-selectable; the default is CRC32. Freshness only, not
//! authentication.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::SchemaError;
use crate::datatype::Registry;
use crate::json::{read_tree_from_json, write_tree_to_json};
use crate::schema::Grammar;

/// One input file the conversion consumed, with its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file_path: String,
    pub hash: String,
}

/// Options for [`convert_simplified`].
pub struct ConvertOptions<'a> {
    /// Record a [`ManifestEntry`] per consumed file.
    pub create_manifest: bool,
    /// Hash algorithm for manifest entries; `None` selects CRC32.
    pub hasher: Option<&'a dyn Fn(&[u8]) -> String>,
}

impl Default for ConvertOptions<'_> {
    fn default() -> Self {
        Self {
            create_manifest: false,
            hasher: None,
        }
    }
}

/// Result of a conversion.
pub struct Conversion {
    pub grammar: Grammar,
    pub warnings: Vec<String>,
    /// Canonical serialized form of the consumed schema.
    pub simplified: String,
    pub manifest: Option<Vec<ManifestEntry>>,
}

/// Build a prepared grammar from serialized simplified-schema output.
pub fn convert_simplified(
    file_path: &str,
    source: &str,
    registry: Arc<Registry>,
    options: &ConvertOptions<'_>,
) -> Result<Conversion, SchemaError> {
    let grammar = read_tree_from_json(source, registry)?;

    let warnings = grammar
        .schema()
        .unreferenced_defines()
        .into_iter()
        .map(|name| format!("definition {name} is never referenced"))
        .collect();

    let manifest = options.create_manifest.then(|| {
        let hash = match options.hasher {
            Some(hasher) => hasher(source.as_bytes()),
            None => crc32_hash(source.as_bytes()),
        };
        vec![ManifestEntry {
            file_path: file_path.to_string(),
            hash,
        }]
    });

    Ok(Conversion {
        simplified: write_tree_to_json(grammar.schema()),
        grammar,
        warnings,
        manifest,
    })
}

/// Default manifest hash: `crc32:` followed by eight hex digits.
pub fn crc32_hash(bytes: &[u8]) -> String {
    format!("crc32:{:08x}", crc32fast::hash(bytes))
}
