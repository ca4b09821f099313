//! Name classes: declarative descriptions of admissible (namespace, local-name) pairs.
//!
//! Element and attribute patterns carry a name class rather than a single
//! name. Input events carry concrete expanded names; possibility events carry
//! the class itself, so completion UIs can render wildcards.

use std::fmt;

/// A concrete expanded name: namespace URI plus local name.
///
/// The URI is `""` for the no-namespace. Ordering is lexicographic on
/// `(ns, local)`, which keeps error listings stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    pub ns: String,
    pub local: String,
}

impl Name {
    pub fn new(ns: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            local: local.into(),
        }
    }
}

impl fmt::Display for Name {
    /// Clark notation: `{uri}local`, bare `local` in the no-namespace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.ns, self.local)
        }
    }
}

/// Name-class algebra.
///
/// `matches` is total: every `(ns, local)` pair is either admitted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameClass {
    /// Exactly one expanded name.
    Name(Name),
    /// Union of two classes.
    Choice(Box<NameClass>, Box<NameClass>),
    /// Any local name within one namespace, minus an optional exception.
    NsName {
        ns: String,
        except: Option<Box<NameClass>>,
    },
    /// Any name at all, minus an optional exception.
    AnyName { except: Option<Box<NameClass>> },
}

impl NameClass {
    pub fn name(ns: impl Into<String>, local: impl Into<String>) -> Self {
        NameClass::Name(Name::new(ns, local))
    }

    pub fn choice(a: NameClass, b: NameClass) -> Self {
        NameClass::Choice(Box::new(a), Box::new(b))
    }

    /// Whether the class admits the expanded name `(ns, local)`.
    pub fn matches(&self, ns: &str, local: &str) -> bool {
        match self {
            NameClass::Name(name) => name.ns == ns && name.local == local,
            NameClass::Choice(a, b) => a.matches(ns, local) || b.matches(ns, local),
            NameClass::NsName { ns: own, except } => {
                own == ns && !except.as_ref().is_some_and(|e| e.matches(ns, local))
            }
            NameClass::AnyName { except } => {
                !except.as_ref().is_some_and(|e| e.matches(ns, local))
            }
        }
    }

    /// True iff the class is built only of `Name` and `Choice` nodes.
    ///
    /// Simple classes are finite and can be flattened with [`NameClass::names`].
    pub fn is_simple(&self) -> bool {
        match self {
            NameClass::Name(_) => true,
            NameClass::Choice(a, b) => a.is_simple() && b.is_simple(),
            NameClass::NsName { .. } | NameClass::AnyName { .. } => false,
        }
    }

    /// Flatten a simple class to its member names, left to right.
    ///
    /// Returns `None` when the class is not simple. A simple class always
    /// yields at least one name.
    pub fn names(&self) -> Option<Vec<&Name>> {
        fn collect<'a>(nc: &'a NameClass, out: &mut Vec<&'a Name>) -> bool {
            match nc {
                NameClass::Name(name) => {
                    out.push(name);
                    true
                }
                NameClass::Choice(a, b) => collect(a, out) && collect(b, out),
                NameClass::NsName { .. } | NameClass::AnyName { .. } => false,
            }
        }

        let mut out = Vec::new();
        collect(self, &mut out).then_some(out)
    }
}

impl fmt::Display for NameClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameClass::Name(name) => write!(f, "{name}"),
            NameClass::Choice(a, b) => write!(f, "({a} | {b})"),
            NameClass::NsName { ns, except: None } => write!(f, "{{{ns}}}*"),
            NameClass::NsName {
                ns,
                except: Some(e),
            } => write!(f, "{{{ns}}}* except {e}"),
            NameClass::AnyName { except: None } => write!(f, "*"),
            NameClass::AnyName { except: Some(e) } => write!(f, "* except {e}"),
        }
    }
}
