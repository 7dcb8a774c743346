//! Extra-spec predicates.
//!
//! A resource type carries key/value requirements. Values use a small
//! grammar: a plain string must equal the host capability, `<is> true`
//! compares booleans and `<in> NFS` accepts hosts advertising the token
//! among several.

use crate::host::HostState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

const IS_OP: &str = "<is>";
const IN_OP: &str = "<in>";

/// Scope prefix naming a host capability.
pub const CAPABILITIES_SCOPE: &str = "capabilities";

/// Unscoped specs consumed by dedicated filters rather than capability matching.
const NON_CAPABILITY_SPECS: &[&str] = &["availability_zones"];

/// One extra-spec requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpecPredicate {
    Equals(String),
    Is(bool),
    In(String),
}

/// Lenient boolean parsing used for `<is>` predicates and capability values.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "y" | "t" => Some(true),
        "false" | "0" | "no" | "off" | "n" | "f" => Some(false),
        _ => None,
    }
}

impl SpecPredicate {
    /// Parse the string form. Never fails: anything that is not a
    /// well-formed `<is>`/`<in>` expression is an exact-match value.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix(IS_OP) {
            if let Some(b) = parse_bool(rest) {
                return SpecPredicate::Is(b);
            }
        } else if let Some(rest) = trimmed.strip_prefix(IN_OP) {
            let token = rest.trim();
            if !token.is_empty() {
                return SpecPredicate::In(token.to_string());
            }
        }
        SpecPredicate::Equals(raw.to_string())
    }

    /// Whether a host advertising `capability` satisfies this predicate.
    pub fn matches(&self, capability: Option<&str>) -> bool {
        let Some(value) = capability else {
            return false;
        };
        match self {
            SpecPredicate::Equals(expected) => value == expected,
            SpecPredicate::Is(expected) => parse_bool(value) == Some(*expected),
            SpecPredicate::In(token) => value.contains(token.as_str()),
        }
    }

    /// Rewrite a plain boolean value into `<is>` form.
    ///
    /// Values that are not booleans are left as exact matches.
    pub fn into_boolean(self) -> Self {
        match self {
            SpecPredicate::Equals(raw) => match parse_bool(&raw) {
                Some(b) => SpecPredicate::Is(b),
                None => SpecPredicate::Equals(raw),
            },
            other => other,
        }
    }
}

impl fmt::Display for SpecPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecPredicate::Equals(value) => write!(f, "{}", value),
            SpecPredicate::Is(b) => write!(f, "{} {}", IS_OP, b),
            SpecPredicate::In(token) => write!(f, "{} {}", IN_OP, token),
        }
    }
}

impl FromStr for SpecPredicate {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SpecPredicate::parse(s))
    }
}

impl From<String> for SpecPredicate {
    fn from(raw: String) -> Self {
        SpecPredicate::parse(&raw)
    }
}

impl From<SpecPredicate> for String {
    fn from(predicate: SpecPredicate) -> Self {
        predicate.to_string()
    }
}

/// Capability name an extra-spec key refers to.
///
/// `capabilities:foo` and bare `foo` both name `foo`; keys in any other
/// scope are not capability requirements.
pub fn capability_key(key: &str) -> Option<&str> {
    if NON_CAPABILITY_SPECS.contains(&key) {
        return None;
    }
    match key.split_once(':') {
        None => Some(key),
        Some((scope, name)) if scope == CAPABILITIES_SCOPE => Some(name),
        Some(_) => None,
    }
}

/// Extra-specs of a resource type, keyed by spec name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraSpecs(BTreeMap<String, SpecPredicate>);

impl ExtraSpecs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&SpecPredicate> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, predicate: SpecPredicate) {
        self.0.insert(key.into(), predicate);
    }

    pub fn remove(&mut self, key: &str) -> Option<SpecPredicate> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SpecPredicate)> {
        self.0.iter()
    }

    /// Rewrite each listed key into `<is>` form. Keys are independent.
    pub fn normalize_booleans<S: AsRef<str>>(&mut self, keys: &[S]) {
        for key in keys {
            if let Some(predicate) = self.0.remove(key.as_ref()) {
                self.0
                    .insert(key.as_ref().to_string(), predicate.into_boolean());
            }
        }
    }

    /// Whether every capability-scoped spec is satisfied by `host`.
    pub fn satisfied_by(&self, host: &HostState) -> bool {
        self.0.iter().all(|(key, predicate)| match capability_key(key) {
            Some(name) => predicate.matches(host.capability(name).as_deref()),
            None => true,
        })
    }

    /// Value of a spec parsed as a boolean (`<is>` or plain).
    pub fn bool_value(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            SpecPredicate::Is(b) => Some(*b),
            SpecPredicate::Equals(raw) => parse_bool(raw),
            SpecPredicate::In(_) => None,
        }
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for ExtraSpecs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), SpecPredicate::parse(v.as_ref())))
                .collect(),
        )
    }
}
