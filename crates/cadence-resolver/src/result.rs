//! Resolution results and the audit trail of corrections

use cadence_registry::CapabilityId;
use serde::Serialize;
use std::fmt;

/// Which stage of the resolver produced the capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    /// Cleaned (and possibly separator-folded) reference is a canonical id
    Exact,
    /// Found in the curated alias table
    Alias,
    /// Within a small edit distance of a canonical id
    NearMiss,
    /// Inferred from parameters and description
    Semantic,
    /// Nothing matched; safest capability chosen
    SafeDefault,
}

impl ResolutionMethod {
    /// Label used in logs and CLI output
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionMethod::Exact => "exact",
            ResolutionMethod::Alias => "alias",
            ResolutionMethod::NearMiss => "near-miss",
            ResolutionMethod::Semantic => "semantic",
            ResolutionMethod::SafeDefault => "safe-default",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transformation applied while resolving a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Correction {
    /// Surrounding quotes/punctuation removed or whitespace collapsed
    PunctuationStripped {
        /// Before
        from: String,
        /// After
        to: String,
    },
    /// Reference lower-cased
    CaseFolded {
        /// Before
        from: String,
        /// After
        to: String,
    },
    /// `-`, `.`, `/` or spaces mapped to `_`
    SeparatorsNormalized {
        /// Before
        from: String,
        /// After
        to: String,
    },
    /// Alias table hit
    Alias {
        /// Alias key that matched
        alias: String,
        /// Canonical target
        target: CapabilityId,
    },
    /// Edit-distance match
    NearMiss {
        /// Folded reference
        from: String,
        /// Canonical id chosen
        target: CapabilityId,
        /// Levenshtein distance
        distance: usize,
    },
    /// Heuristic inference
    Semantic {
        /// Canonical id chosen
        target: CapabilityId,
        /// Winning score
        score: u32,
        /// Human-readable clues that contributed
        evidence: Vec<String>,
    },
    /// Fallback to the safest capability
    SafeDefault {
        /// Canonical id chosen
        target: CapabilityId,
    },
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::PunctuationStripped { from, to } => {
                write!(f, "stripped punctuation: {from:?} -> {to:?}")
            }
            Correction::CaseFolded { from, to } => write!(f, "case folded: {from:?} -> {to:?}"),
            Correction::SeparatorsNormalized { from, to } => {
                write!(f, "normalized separators: {from:?} -> {to:?}")
            }
            Correction::Alias { alias, target } => write!(f, "alias {alias:?} -> {target}"),
            Correction::NearMiss {
                from,
                target,
                distance,
            } => write!(f, "near miss {from:?} -> {target} (distance {distance})"),
            Correction::Semantic {
                target,
                score,
                evidence,
            } => write!(
                f,
                "semantic match {target} (score {score}: {})",
                evidence.join(", ")
            ),
            Correction::SafeDefault { target } => write!(f, "no match, safe default {target}"),
        }
    }
}

/// Outcome of resolving one action reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    /// Reference as supplied
    pub reference: String,
    /// Canonical capability
    pub capability: CapabilityId,
    /// Stage that produced `capability`
    pub method: ResolutionMethod,
    /// Every correction applied, in order
    pub corrections: Vec<Correction>,
    /// Capability is registered and every required argument is present
    pub valid: bool,
}

impl ResolutionResult {
    /// Check if the match came from heuristics rather than a curated table
    #[inline]
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self.method,
            ResolutionMethod::Semantic | ResolutionMethod::SafeDefault
        )
    }

    /// Check if any correction was applied
    #[inline]
    #[must_use]
    pub fn was_corrected(&self) -> bool {
        !self.corrections.is_empty()
    }
}
