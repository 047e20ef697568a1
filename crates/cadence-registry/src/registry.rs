//! Capability registry and builder
//!
//! Provides [`CapabilityRegistry`], the immutable lookup table consulted by
//! the scenario loader (to validate declared action kinds) and by the action
//! resolver (to reconcile free-text references).

use crate::capability::{Capability, CapabilityId};
use crate::error::RegistryError;
use crate::normalize::{clean_reference, fold_separators};
use indexmap::IndexMap;
use std::collections::HashMap;

/// How a strict lookup matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Cleaned reference equals a canonical id
    Exact,
    /// Matched after folding separators (`send-message` → `send_message`)
    Folded,
    /// Matched through the alias table
    Alias,
}

/// Result of [`CapabilityRegistry::canonicalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrictMatch {
    /// Canonical capability
    pub capability: CapabilityId,
    /// Stage that produced the match
    pub kind: MatchKind,
    /// Reference after cleaning (before folding)
    pub cleaned: String,
    /// Key the match was found under
    pub matched_key: String,
}

/// Immutable registry of capabilities plus alias table
///
/// Constructed once (usually at process start) and shared behind an `Arc`.
/// There is no mutation API; additional aliases are supplied to the
/// [`RegistryBuilder`] before `build()`.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    capabilities: IndexMap<CapabilityId, Capability>,
    aliases: HashMap<String, CapabilityId>,
    safest: usize,
}

impl CapabilityRegistry {
    /// Start building a registry
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with the built-in capability set and alias table
    #[must_use]
    pub fn with_defaults() -> Self {
        RegistryBuilder::with_defaults().assemble()
    }

    /// Get capability by canonical id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Capability> {
        self.capabilities.get(&CapabilityId::new(id))
    }

    /// Check if canonical id is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Canonical target of an alias (`alias` is cleaned and folded first)
    #[must_use]
    pub fn alias_target(&self, alias: &str) -> Option<&CapabilityId> {
        self.aliases
            .get(&fold_separators(&clean_reference(alias)))
    }

    /// Strict lookup: clean → exact → folded → alias
    ///
    /// Returns `None` when only heuristics could map the reference.
    #[must_use]
    pub fn canonicalize(&self, raw: &str) -> Option<StrictMatch> {
        let cleaned = clean_reference(raw);
        if cleaned.is_empty() {
            return None;
        }

        if self.contains(&cleaned) {
            return Some(StrictMatch {
                capability: CapabilityId::new(cleaned.clone()),
                kind: MatchKind::Exact,
                matched_key: cleaned.clone(),
                cleaned,
            });
        }

        let folded = fold_separators(&cleaned);
        if self.contains(&folded) {
            return Some(StrictMatch {
                capability: CapabilityId::new(folded.clone()),
                kind: MatchKind::Folded,
                cleaned,
                matched_key: folded,
            });
        }

        self.aliases.get(&folded).map(|target| StrictMatch {
            capability: target.clone(),
            kind: MatchKind::Alias,
            cleaned,
            matched_key: folded,
        })
    }

    /// The single safest, side-effect-minimal capability
    ///
    /// Ties on side-effect category are broken by registration order.
    #[inline]
    #[must_use]
    pub fn safest(&self) -> &Capability {
        &self.capabilities[self.safest]
    }

    /// Iterate capabilities in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values()
    }

    /// Canonical ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &CapabilityId> {
        self.capabilities.keys()
    }

    /// Iterate `(alias, target)` pairs (unordered)
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &CapabilityId)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of capabilities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Always false for a built registry; provided for API symmetry
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Number of aliases
    #[inline]
    #[must_use]
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Builder for [`CapabilityRegistry`]
#[derive(Debug, Default, Clone)]
pub struct RegistryBuilder {
    capabilities: Vec<Capability>,
    aliases: Vec<(String, String)>,
}

impl RegistryBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability
    #[inline]
    #[must_use]
    pub fn register(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Add one alias (`alias` → canonical `target`)
    #[inline]
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), target.into()));
        self
    }

    /// Add many aliases
    #[must_use]
    pub fn aliases<I, A, T>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (A, T)>,
        A: Into<String>,
        T: Into<String>,
    {
        self.aliases
            .extend(aliases.into_iter().map(|(a, t)| (a.into(), t.into())));
        self
    }

    /// Validate and build
    ///
    /// # Errors
    /// - `RegistryError::Empty` if no capability was registered
    /// - `RegistryError::NonCanonicalId` for ids that are not clean `snake_case`
    /// - `RegistryError::DuplicateCapability` on repeated ids
    /// - `RegistryError::UnknownAliasTarget` if an alias points nowhere
    /// - `RegistryError::AliasShadowsCapability` if an alias equals a canonical id
    pub fn build(self) -> Result<CapabilityRegistry, RegistryError> {
        if self.capabilities.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = std::collections::HashSet::new();
        for cap in &self.capabilities {
            let id = cap.id.as_str();
            if id.is_empty() || fold_separators(&clean_reference(id)) != id {
                return Err(RegistryError::NonCanonicalId(id.to_string()));
            }
            if !seen.insert(id) {
                return Err(RegistryError::DuplicateCapability(cap.id.clone()));
            }
        }

        for (alias, target) in &self.aliases {
            let key = fold_separators(&clean_reference(alias));
            if seen.contains(key.as_str()) {
                return Err(RegistryError::AliasShadowsCapability(alias.clone()));
            }
            if !seen.contains(target.as_str()) {
                return Err(RegistryError::UnknownAliasTarget {
                    alias: alias.clone(),
                    target: target.clone(),
                });
            }
        }

        Ok(self.assemble())
    }

    /// Assemble without validation; invalid aliases are dropped
    pub(crate) fn assemble(self) -> CapabilityRegistry {
        let mut capabilities = IndexMap::with_capacity(self.capabilities.len());
        for cap in self.capabilities {
            capabilities.entry(cap.id.clone()).or_insert(cap);
        }

        let mut aliases = HashMap::with_capacity(self.aliases.len());
        for (alias, target) in self.aliases {
            let key = fold_separators(&clean_reference(&alias));
            let target = CapabilityId::new(target);
            if key.is_empty() || capabilities.contains_key(&CapabilityId::new(key.clone())) {
                continue;
            }
            if capabilities.contains_key(&target) {
                aliases.insert(key, target);
            }
        }

        let safest = capabilities
            .values()
            .enumerate()
            .min_by_key(|(_, c)| c.side_effect)
            .map_or(0, |(i, _)| i);

        CapabilityRegistry {
            capabilities,
            aliases,
            safest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::SideEffect;

    fn small() -> RegistryBuilder {
        RegistryBuilder::new()
            .register(Capability::new("send_message", SideEffect::Outbound))
            .register(Capability::new("query_store", SideEffect::ReadOnly))
            .register(Capability::new("note", SideEffect::Pure))
            .register(Capability::new("note_two", SideEffect::Pure))
    }

    #[test]
    fn builder_rejects_empty() {
        assert_eq!(RegistryBuilder::new().build().unwrap_err(), RegistryError::Empty);
    }

    #[test]
    fn builder_rejects_duplicate() {
        let err = small()
            .register(Capability::new("note", SideEffect::Pure))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCapability(id) if id.as_str() == "note"));
    }

    #[test]
    fn builder_rejects_non_canonical_id() {
        let err = RegistryBuilder::new()
            .register(Capability::new("Send-Message", SideEffect::Outbound))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::NonCanonicalId(_)));
    }

    #[test]
    fn builder_rejects_dangling_alias() {
        let err = small().alias("msg", "missing").build().unwrap_err();
        assert!(matches!(err, RegistryError::UnknownAliasTarget { .. }));
    }

    #[test]
    fn builder_rejects_shadowing_alias() {
        let err = small().alias("Query-Store", "note").build().unwrap_err();
        assert!(matches!(err, RegistryError::AliasShadowsCapability(_)));
    }

    #[test]
    fn canonicalize_exact_folded_alias() {
        let registry = small().alias("notify", "send_message").build().unwrap();

        let exact = registry.canonicalize("`query_store`.").unwrap();
        assert_eq!(exact.kind, MatchKind::Exact);
        assert_eq!(exact.capability.as_str(), "query_store");

        let folded = registry.canonicalize("Query-Store").unwrap();
        assert_eq!(folded.kind, MatchKind::Folded);
        assert_eq!(folded.capability.as_str(), "query_store");

        let alias = registry.canonicalize("\"Notify\"").unwrap();
        assert_eq!(alias.kind, MatchKind::Alias);
        assert_eq!(alias.capability.as_str(), "send_message");

        assert!(registry.canonicalize("live server").is_none());
        assert!(registry.canonicalize("``").is_none());
    }

    #[test]
    fn safest_prefers_first_pure() {
        let registry = small().build().unwrap();
        assert_eq!(registry.safest().id.as_str(), "note");
    }

    #[test]
    fn iteration_keeps_registration_order() {
        let registry = small().build().unwrap();
        let ids: Vec<_> = registry.ids().map(CapabilityId::as_str).collect();
        assert_eq!(ids, vec!["send_message", "query_store", "note", "note_two"]);
        assert_eq!(registry.len(), 4);
        assert!(!registry.is_empty());
    }

    #[test]
    fn alias_target_lookup() {
        let registry = small().alias("Look Up", "query_store").build().unwrap();
        assert_eq!(
            registry.alias_target("look-up").map(CapabilityId::as_str),
            Some("query_store")
        );
        assert_eq!(registry.alias_count(), 1);
    }
}
