//! The action resolver
//!
//! Precedence, stopping at the first hit:
//! 1. Clean (strip quoting artifacts, lower-case)
//! 2. Exact match, then separator-folded exact match
//! 3. Alias table, then near-miss edit distance against canonical ids
//! 4. Semantic inference from parameters and description
//! 5. Safest registered capability
//!
//! Stages 3 to 5 always leave a correction behind.

use crate::distance::{is_near_miss, levenshtein};
use crate::result::{Correction, ResolutionMethod, ResolutionResult};
use crate::semantic;
use cadence_registry::{
    fold_separators, strip_artifacts, CapabilityId, CapabilityRegistry, MatchKind,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Step information the resolver may consult
#[derive(Debug, Clone, Copy, Default)]
pub struct StepContext<'a> {
    /// Declared step parameters (before substitution)
    pub params: Option<&'a Map<String, Value>>,
    /// Free-text step description
    pub description: Option<&'a str>,
}

impl<'a> StepContext<'a> {
    /// Context carrying step parameters
    #[inline]
    #[must_use]
    pub fn new(params: &'a Map<String, Value>) -> Self {
        Self {
            params: Some(params),
            description: None,
        }
    }

    /// Attach a description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: Option<&'a str>) -> Self {
        self.description = description;
        self
    }
}

/// Maps raw action references to canonical capabilities
///
/// Holds only an immutable registry, so one resolver can be shared by every
/// session.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<CapabilityRegistry>,
}

impl Resolver {
    /// Create resolver over a shared registry
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Registry being consulted
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Resolve a reference; never fails
    #[must_use]
    pub fn resolve(&self, raw: &str, step: &StepContext<'_>) -> ResolutionResult {
        let mut corrections = Vec::new();

        let stripped = strip_artifacts(raw)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if stripped != raw.trim() {
            corrections.push(Correction::PunctuationStripped {
                from: raw.to_string(),
                to: stripped.clone(),
            });
        }
        let cleaned = stripped.to_lowercase();
        if cleaned != stripped {
            corrections.push(Correction::CaseFolded {
                from: stripped,
                to: cleaned.clone(),
            });
        }

        let (capability, method) = self.lookup(&cleaned, step, &mut corrections);
        let valid = self.is_valid(&capability, step);
        let result = ResolutionResult {
            reference: raw.to_string(),
            capability,
            method,
            corrections,
            valid,
        };

        if result.is_ambiguous() {
            tracing::warn!(
                reference = raw,
                capability = %result.capability,
                method = %result.method,
                "action reference resolved heuristically"
            );
        } else if result.was_corrected() {
            tracing::debug!(
                reference = raw,
                capability = %result.capability,
                method = %result.method,
                corrections = result.corrections.len(),
                "action reference corrected"
            );
        }
        result
    }

    fn lookup(
        &self,
        cleaned: &str,
        step: &StepContext<'_>,
        corrections: &mut Vec<Correction>,
    ) -> (CapabilityId, ResolutionMethod) {
        if !cleaned.is_empty() {
            if let Some(m) = self.registry.canonicalize(cleaned) {
                match m.kind {
                    MatchKind::Exact => return (m.capability, ResolutionMethod::Exact),
                    MatchKind::Folded => {
                        corrections.push(Correction::SeparatorsNormalized {
                            from: m.cleaned,
                            to: m.matched_key,
                        });
                        return (m.capability, ResolutionMethod::Exact);
                    }
                    MatchKind::Alias => {
                        corrections.push(Correction::Alias {
                            alias: m.matched_key,
                            target: m.capability.clone(),
                        });
                        return (m.capability, ResolutionMethod::Alias);
                    }
                }
            }

            let folded = fold_separators(cleaned);
            if let Some((target, distance)) = self.nearest(&folded) {
                corrections.push(Correction::NearMiss {
                    from: folded,
                    target: target.clone(),
                    distance,
                });
                return (target, ResolutionMethod::NearMiss);
            }
        }

        let empty = Map::new();
        let params = step.params.unwrap_or(&empty);
        if let Some(m) = semantic::infer(&self.registry, params, step.description, cleaned) {
            corrections.push(Correction::Semantic {
                target: m.capability.clone(),
                score: m.score,
                evidence: m.evidence,
            });
            return (m.capability, ResolutionMethod::Semantic);
        }

        let target = self.registry.safest().id.clone();
        corrections.push(Correction::SafeDefault {
            target: target.clone(),
        });
        (target, ResolutionMethod::SafeDefault)
    }

    /// Closest canonical id within near-miss tolerance; ties by registry order
    fn nearest(&self, folded: &str) -> Option<(CapabilityId, usize)> {
        let len = folded.chars().count();
        let mut best: Option<(&CapabilityId, usize)> = None;
        for id in self.registry.ids() {
            let d = levenshtein(folded, id.as_str());
            if is_near_miss(d, len) && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((id, d));
            }
        }
        best.map(|(id, d)| (id.clone(), d))
    }

    fn is_valid(&self, capability: &CapabilityId, step: &StepContext<'_>) -> bool {
        let Some(spec) = self.registry.get(capability.as_str()) else {
            return false;
        };
        spec.required_args().all(|name| {
            step.params
                .and_then(|p| p.get(name))
                .is_some_and(|v| !v.is_null())
        })
    }
}
