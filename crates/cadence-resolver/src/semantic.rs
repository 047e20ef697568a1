//! Heuristic capability inference from parameters and free text

use cadence_registry::{tokens, Capability, CapabilityId, CapabilityRegistry};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Capability implied by a source-file parameter
pub const CODE_CAPABILITY: &str = "code_generator";

/// Parameter names that usually carry a file name
const FILENAME_PARAMS: &[&str] = &["filename", "file_name", "file", "path", "output_file", "target_file"];

/// Extensions that mark a file as source code
const CODE_EXTENSIONS: &[&str] = &[
    "py", "rs", "js", "mjs", "ts", "tsx", "jsx", "go", "java", "kt", "c", "h", "cc", "cpp", "hpp",
    "cs", "rb", "php", "swift", "scala", "sh", "sql", "html", "css", "vue", "lua",
];

/// A scored inference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticMatch {
    /// Winning capability
    pub capability: CapabilityId,
    /// Score (always positive)
    pub score: u32,
    /// Clues that contributed
    pub evidence: Vec<String>,
}

/// Extension of `name` if it names a source file
#[must_use]
pub fn code_extension(name: &str) -> Option<&'static str> {
    let (stem, ext) = name.trim().rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    CODE_EXTENSIONS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(ext))
        .copied()
}

fn filename_clue(params: &Map<String, Value>) -> Option<(String, &'static str)> {
    params.iter().find_map(|(key, value)| {
        let key_lower = key.to_ascii_lowercase();
        if !FILENAME_PARAMS.contains(&key_lower.as_str()) {
            return None;
        }
        let ext = code_extension(value.as_str()?)?;
        Some((key.clone(), ext))
    })
}

fn score(capability: &Capability, params: &Map<String, Value>, words: &BTreeSet<String>) -> (u32, Vec<String>) {
    let mut total = 0;
    let mut evidence = Vec::new();

    for key in params.keys() {
        if capability.arg(&key.to_ascii_lowercase()).is_some() {
            total += 2;
            evidence.push(format!("param '{key}'"));
        }
    }
    for word in words {
        if capability.keywords.iter().any(|k| k == word) {
            total += 1;
            evidence.push(format!("keyword '{word}'"));
        }
    }
    (total, evidence)
}

/// Infer a capability from step parameters, description and reference text
///
/// Returns `None` when nothing scores above zero. Ties go to the capability
/// registered first.
#[must_use]
pub fn infer(
    registry: &CapabilityRegistry,
    params: &Map<String, Value>,
    description: Option<&str>,
    reference: &str,
) -> Option<SemanticMatch> {
    if registry.contains(CODE_CAPABILITY) {
        if let Some((key, ext)) = filename_clue(params) {
            return Some(SemanticMatch {
                capability: CapabilityId::new(CODE_CAPABILITY),
                score: 10,
                evidence: vec![format!("param '{key}' names a .{ext} file")],
            });
        }
    }

    let words: BTreeSet<String> = tokens(reference)
        .into_iter()
        .chain(description.map(tokens).unwrap_or_default())
        .collect();

    let mut best: Option<SemanticMatch> = None;
    for capability in registry.iter() {
        let (total, evidence) = score(capability, params, &words);
        let better = total > 0 && best.as_ref().map_or(true, |b| total > b.score);
        if better {
            best = Some(SemanticMatch {
                capability: capability.id.clone(),
                score: total,
                evidence,
            });
        }
    }
    best
}
