//! Capability descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical capability identifier (`snake_case`, lower-case)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(String);

impl CapabilityId {
    /// Create identifier from a canonical name
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CapabilityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for CapabilityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Side-effect category, ordered from least to most invasive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// No effect outside the session context
    Pure,
    /// Reads external state (model calls, store queries, fetches)
    ReadOnly,
    /// Writes external state
    Mutating,
    /// Sends something to the outside world (messages, arbitrary HTTP)
    Outbound,
}

impl SideEffect {
    /// Check if this category touches anything outside the session
    #[inline]
    #[must_use]
    pub fn is_external(self) -> bool {
        !matches!(self, SideEffect::Pure)
    }
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SideEffect::Pure => "pure",
            SideEffect::ReadOnly => "read-only",
            SideEffect::Mutating => "mutating",
            SideEffect::Outbound => "outbound",
        };
        f.write_str(s)
    }
}

/// Expected JSON shape of an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// Any JSON value
    Any,
    /// String
    String,
    /// Number
    Number,
    /// Boolean
    Bool,
    /// Mapping
    Object,
    /// Sequence
    Array,
}

/// One declared argument of a capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Parameter name as it appears in a step's `params`
    pub name: String,
    /// Expected shape
    pub kind: ArgKind,
    /// Whether dispatch is meaningful without it
    pub required: bool,
}

impl ArgSpec {
    /// Required argument
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Optional argument
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// A registry-declared action kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Canonical identifier
    pub id: CapabilityId,
    /// Human-readable summary
    pub description: String,
    /// Side-effect category
    pub side_effect: SideEffect,
    /// Declared arguments
    pub args: Vec<ArgSpec>,
    /// Free-text keywords used by semantic resolution
    pub keywords: Vec<String>,
}

impl Capability {
    /// Create capability with no arguments or keywords
    #[must_use]
    pub fn new(id: impl Into<String>, side_effect: SideEffect) -> Self {
        Self {
            id: CapabilityId::new(id),
            description: String::new(),
            side_effect,
            args: Vec::new(),
            keywords: Vec::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With an argument
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// With keywords
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords
            .extend(keywords.into_iter().map(|k| k.into().to_lowercase()));
        self
    }

    /// Look up an argument by name
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|a| a.name == name)
    }

    /// Names of the required arguments
    pub fn required_args(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
    }
}
