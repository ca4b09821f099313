//! Datatype interface and the Relax NG builtin library.
//!
//! `Value` and `Data` patterns defer lexical interpretation to a datatype.
//! Equality is canonical-key equality: `parse` maps a lexical form to a
//! canonical string, and two values are equal iff their keys are. Datatypes
//! whose interpretation depends on in-scope namespace bindings (`QName`,
//! `NOTATION`) receive the current resolver.
//!
//! Only the builtin library (`string`, `token`) ships here; richer libraries
//! (XML Schema) register through [`DatatypeLibrary`].

use std::collections::HashMap;

use crate::resolver::NameResolver;

/// Diagnostic produced by a datatype rejecting a lexical form or parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValueError {
    pub message: String,
}

impl ValueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A single datatype within a library.
pub trait Datatype: Send + Sync {
    /// True when lexical interpretation depends on namespace bindings.
    fn needs_context(&self) -> bool {
        false
    }

    /// Parse a lexical form into its canonical key.
    fn parse(
        &self,
        lexical: &str,
        resolver: Option<&NameResolver>,
    ) -> Result<String, ValueError>;

    /// Check a lexical form against parameter facets.
    fn disallows(
        &self,
        lexical: &str,
        params: &[(String, String)],
        resolver: Option<&NameResolver>,
    ) -> Result<(), ValueError>;

    /// Validate parameters at schema-preparation time.
    fn check_params(&self, params: &[(String, String)]) -> Result<(), ValueError>;
}

/// A named collection of datatypes, identified by its library URI.
pub trait DatatypeLibrary: Send + Sync {
    fn find(&self, type_name: &str) -> Option<&dyn Datatype>;
}

/// Library registry keyed by `datatypeLibrary` URI.
///
/// The builtin library is preinstalled under the empty URI.
pub struct Registry {
    libraries: HashMap<String, Box<dyn DatatypeLibrary>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut libraries: HashMap<String, Box<dyn DatatypeLibrary>> = HashMap::new();
        libraries.insert(String::new(), Box::new(BuiltinLibrary));
        Self { libraries }
    }

    /// Install (or replace) a library under `uri`.
    pub fn register(&mut self, uri: impl Into<String>, library: Box<dyn DatatypeLibrary>) {
        self.libraries.insert(uri.into(), library);
    }

    pub fn library(&self, uri: &str) -> Option<&dyn DatatypeLibrary> {
        self.libraries.get(uri).map(|library| &**library)
    }

    pub fn find(&self, uri: &str, type_name: &str) -> Option<&dyn Datatype> {
        self.library(uri)?.find(type_name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("libraries", &self.libraries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The two Relax NG builtin types.
struct BuiltinLibrary;

impl DatatypeLibrary for BuiltinLibrary {
    fn find(&self, type_name: &str) -> Option<&dyn Datatype> {
        match type_name {
            "string" => Some(&StringType),
            "token" => Some(&TokenType),
            _ => None,
        }
    }
}

/// `string`: exact comparison, no parameters.
struct StringType;

impl Datatype for StringType {
    fn parse(&self, lexical: &str, _resolver: Option<&NameResolver>) -> Result<String, ValueError> {
        Ok(lexical.to_string())
    }

    fn disallows(
        &self,
        _lexical: &str,
        params: &[(String, String)],
        _resolver: Option<&NameResolver>,
    ) -> Result<(), ValueError> {
        self.check_params(params)
    }

    fn check_params(&self, params: &[(String, String)]) -> Result<(), ValueError> {
        reject_params("string", params)
    }
}

/// `token`: whitespace-collapsed comparison, no parameters.
struct TokenType;

impl Datatype for TokenType {
    fn parse(&self, lexical: &str, _resolver: Option<&NameResolver>) -> Result<String, ValueError> {
        Ok(collapse_whitespace(lexical))
    }

    fn disallows(
        &self,
        _lexical: &str,
        params: &[(String, String)],
        _resolver: Option<&NameResolver>,
    ) -> Result<(), ValueError> {
        self.check_params(params)
    }

    fn check_params(&self, params: &[(String, String)]) -> Result<(), ValueError> {
        reject_params("token", params)
    }
}

fn reject_params(type_name: &str, params: &[(String, String)]) -> Result<(), ValueError> {
    match params.first() {
        None => Ok(()),
        Some((key, _)) => Err(ValueError::new(format!(
            "builtin type {type_name} takes no parameters, got {key}"
        ))),
    }
}

/// Collapse XML whitespace: strip leading/trailing runs, squeeze inner runs
/// to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for token in s.split_ascii_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}
