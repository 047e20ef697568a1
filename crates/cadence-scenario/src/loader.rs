//! Scenario Loader & Validator
//!
//! Validation runs in three passes and collects every violation:
//! 1. Top-level shape (`id`, non-empty `steps`)
//! 2. Per-step shape (id, kind, kind-specific required fields, conditions)
//! 3. Graph integrity (unique ids, targets resolve, single entry)
//!
//! Unknown keys at either level are preserved and ignored.

use crate::analysis;
use crate::condition::Condition;
use crate::error::{DefinitionError, ValidationReport, Violation, Warning};
use crate::model::{
    ActionForm, ActionSpec, ConditionalTarget, OutputBinding, Scenario, Step, StepId, StepKind,
    Target,
};
use cadence_registry::CapabilityRegistry;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Keys understood at the top level
const SCENARIO_KEYS: &[&str] = &["id", "name", "description", "entry", "initial_context", "steps"];

/// Keys understood on a step
const STEP_KEYS: &[&str] = &[
    "id",
    "kind",
    "params",
    "next",
    "conditions",
    "default",
    "action",
    "variable",
    "prompt",
    "output",
    "description",
    "max_retries",
    "timeout_ms",
];

/// Textual representation of a scenario document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// JSON
    Json,
    /// YAML
    Yaml,
}

impl Format {
    /// Guess from content: a leading `{` means JSON, anything else YAML
    #[must_use]
    pub fn detect(raw: &str) -> Self {
        if raw.trim_start().starts_with('{') {
            Format::Json
        } else {
            Format::Yaml
        }
    }

    /// Infer from file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    /// Parse from name (`json`, `yaml`, `yml`)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Yaml => f.write_str("yaml"),
        }
    }
}

/// A successfully loaded scenario plus its non-fatal warnings
#[derive(Debug, Clone)]
pub struct Loaded {
    /// Validated scenario
    pub scenario: Scenario,
    /// Warnings from validation and graph analysis
    pub warnings: Vec<Warning>,
}

/// Parse raw text into a generic document value
///
/// # Errors
/// `DefinitionError::Syntax` if the text is not valid in `format`.
pub fn parse_document(raw: &str, format: Format) -> Result<Value, DefinitionError> {
    let parsed = match format {
        Format::Json => serde_json::from_str(raw).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| DefinitionError::Syntax {
        format: format.to_string(),
        message,
    })
}

/// Load and validate a scenario from text
///
/// # Errors
/// - `DefinitionError::Syntax` for unparsable text
/// - `DefinitionError::Invalid` with every violation found
pub fn load(
    raw: &str,
    format: Format,
    registry: &CapabilityRegistry,
) -> Result<Loaded, DefinitionError> {
    let document = parse_document(raw, format)?;
    validate_document(&document, registry)
}

/// Load a scenario file, inferring the format from its extension
///
/// # Errors
/// IO, format inference, syntax and validation failures.
pub fn load_path(path: &Path, registry: &CapabilityRegistry) -> Result<Loaded, DefinitionError> {
    let format =
        Format::from_path(path).ok_or_else(|| DefinitionError::UnknownFormat(path.to_path_buf()))?;
    let raw = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load(&raw, format, registry)
}

/// Load every `.json`/`.yaml`/`.yml` file in a directory, sorted by file name
///
/// Stops at the first file that fails; other extensions are skipped.
///
/// # Errors
/// IO failure reading the directory, or the first file that fails to load.
pub fn load_dir(dir: &Path, registry: &CapabilityRegistry) -> Result<Vec<Loaded>, DefinitionError> {
    let io = |source: std::io::Error| DefinitionError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_file() && Format::from_path(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let loaded = load_path(path, registry)?;
            tracing::info!(path = %path.display(), scenario = loaded.scenario.id(), "loaded scenario file");
            Ok(loaded)
        })
        .collect()
}

/// Validate an already-parsed document
///
/// # Errors
/// `DefinitionError::Invalid` with every violation found.
pub fn validate_document(
    document: &Value,
    registry: &CapabilityRegistry,
) -> Result<Loaded, DefinitionError> {
    let mut checker = Checker::new(registry);
    let outcome = checker.check(document);
    let report = ValidationReport {
        violations: checker.violations,
        warnings: checker.warnings,
    };

    match outcome {
        Some(scenario) if report.is_valid() => {
            let mut warnings = report.warnings;
            warnings.extend(analysis::analyze(&scenario));
            tracing::debug!(
                scenario = scenario.id(),
                steps = scenario.len(),
                warnings = warnings.len(),
                "scenario loaded"
            );
            Ok(Loaded { scenario, warnings })
        }
        _ => {
            let scenario = document
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);
            tracing::debug!(
                scenario = scenario.as_deref().unwrap_or("<unknown>"),
                violations = report.violations.len(),
                "scenario rejected"
            );
            Err(DefinitionError::Invalid { scenario, report })
        }
    }
}

/// Accumulates violations across all passes
struct Checker<'r> {
    registry: &'r CapabilityRegistry,
    violations: Vec<Violation>,
    warnings: Vec<Warning>,
}

impl<'r> Checker<'r> {
    fn new(registry: &'r CapabilityRegistry) -> Self {
        Self {
            registry,
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn violation(&mut self, v: Violation) {
        self.violations.push(v);
    }

    fn invalid(&mut self, location: &str, field: &str, expected: &str) {
        self.violation(Violation::InvalidField {
            location: location.to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
        });
    }

    fn check(&mut self, document: &Value) -> Option<Scenario> {
        let Some(root) = document.as_object() else {
            self.violation(Violation::NotAMapping);
            return None;
        };

        // Pass 1: top-level shape
        let id = match root.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => {
                self.violation(Violation::MissingId);
                None
            }
        };
        let name = self.optional_string(root, "name", "scenario");
        let description = self.optional_string(root, "description", "scenario");
        let declared_entry = self.optional_string(root, "entry", "scenario");
        let initial_context = match root.get("initial_context") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(m)) => m.clone(),
            Some(_) => {
                self.invalid("scenario", "initial_context", "a mapping");
                Map::new()
            }
        };

        let raw_steps = match root.get("steps") {
            None | Some(Value::Null) => {
                self.violation(Violation::MissingSteps);
                return None;
            }
            Some(Value::Array(items)) if items.is_empty() => {
                self.violation(Violation::EmptySteps);
                return None;
            }
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.violation(Violation::StepsNotASequence);
                return None;
            }
        };

        // Pass 2: per-step shape
        let steps: Vec<Option<Step>> = raw_steps
            .iter()
            .enumerate()
            .map(|(index, raw)| self.check_step(index, raw))
            .collect();

        // Pass 3: graph integrity, over every step that has an id
        let skeletons: Vec<Skeleton<'_>> = raw_steps.iter().filter_map(Skeleton::read).collect();
        let entry = self.check_graph(&skeletons, declared_entry.as_deref());

        if !self.violations.is_empty() {
            return None;
        }
        let steps: Vec<Step> = steps.into_iter().flatten().collect();
        let extra = extra_keys(root, SCENARIO_KEYS);

        Some(Scenario::assemble(
            id?,
            name,
            description,
            entry?,
            initial_context,
            steps,
            extra,
        ))
    }

    fn optional_string(&mut self, map: &Map<String, Value>, field: &str, location: &str) -> Option<String> {
        match map.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.invalid(location, field, "a string");
                None
            }
        }
    }

    fn check_step(&mut self, index: usize, raw: &Value) -> Option<Step> {
        let Some(map) = raw.as_object() else {
            self.violation(Violation::StepNotAMapping { index });
            return None;
        };

        let id = raw_step_id(map);
        if id.is_none() {
            self.violation(Violation::MissingStepId { index });
        }
        if let Some(id) = id.as_deref().filter(|id| id.starts_with('$')) {
            self.violation(Violation::ReservedStepId { id: id.to_string() });
        }
        let label = id.clone().unwrap_or_else(|| format!("#{index}"));

        let params = match map.get("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(m)) => m.clone(),
            Some(_) => {
                self.invalid(&label, "params", "a mapping");
                Map::new()
            }
        };
        let output = self.check_output(&label, map.get("output"));
        let description = self.optional_string(map, "description", &label);
        let max_retries = self.optional_u64(map, "max_retries", &label, u64::from(u32::MAX));
        let timeout_ms = self.optional_u64(map, "timeout_ms", &label, u64::MAX);

        let kind = match map.get("kind") {
            Some(Value::String(k)) if !k.trim().is_empty() => self.check_kind(&label, k, map),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                self.violation(Violation::MissingKind {
                    step: label.clone(),
                });
                None
            }
            Some(_) => {
                self.invalid(&label, "kind", "a string");
                None
            }
        };

        let kind = kind?;
        if params.is_empty() && !matches!(kind, StepKind::Start { .. } | StepKind::End) {
            self.warnings.push(Warning::EmptyParams {
                step: label.clone(),
            });
        }
        if let StepKind::Action(ActionSpec {
            capability: None,
            reference,
            ..
        }) = &kind
        {
            self.warnings.push(Warning::HeuristicAction {
                step: label.clone(),
                reference: reference.clone(),
            });
        }

        Some(Step {
            id: StepId::new(id?),
            kind,
            params,
            output: output.unwrap_or_default(),
            description,
            max_retries: max_retries.and_then(|n| u32::try_from(n).ok()),
            timeout_ms,
            extra: extra_keys(map, STEP_KEYS),
        })
    }

    fn optional_u64(
        &mut self,
        map: &Map<String, Value>,
        field: &str,
        location: &str,
        max: u64,
    ) -> Option<u64> {
        match map.get(field) {
            None | Some(Value::Null) => None,
            Some(v) => match v.as_u64().filter(|n| *n <= max) {
                Some(n) => Some(n),
                None => {
                    self.invalid(location, field, "a non-negative integer");
                    None
                }
            },
        }
    }

    fn check_output(&mut self, label: &str, raw: Option<&Value>) -> Option<OutputBinding> {
        match raw {
            None | Some(Value::Null) => Some(OutputBinding::Merge),
            Some(Value::String(var)) if !var.trim().is_empty() => {
                Some(OutputBinding::Single(var.clone()))
            }
            Some(Value::Object(map)) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (var, key) in map {
                    match key.as_str() {
                        Some(key) => pairs.push((var.clone(), key.to_string())),
                        None => {
                            self.invalid(label, "output", "a string or a mapping of strings");
                            return None;
                        }
                    }
                }
                Some(OutputBinding::Map(pairs))
            }
            Some(_) => {
                self.invalid(label, "output", "a string or a mapping of strings");
                None
            }
        }
    }

    fn required_target(&mut self, label: &str, kind: &str, map: &Map<String, Value>, field: &str) -> Option<Target> {
        match map.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(Target::parse(s)),
            None | Some(Value::Null) => {
                self.violation(Violation::MissingField {
                    step: label.to_string(),
                    kind: kind.to_string(),
                    field: field.to_string(),
                });
                None
            }
            Some(_) => {
                self.invalid(label, field, "a step id");
                None
            }
        }
    }

    fn required_string(&mut self, label: &str, kind: &str, map: &Map<String, Value>, field: &str) -> Option<String> {
        match map.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                self.violation(Violation::MissingField {
                    step: label.to_string(),
                    kind: kind.to_string(),
                    field: field.to_string(),
                });
                None
            }
            Some(_) => {
                self.invalid(label, field, "a string");
                None
            }
        }
    }

    fn check_kind(&mut self, label: &str, kind: &str, map: &Map<String, Value>) -> Option<StepKind> {
        match kind.trim() {
            "start" => {
                let next = self.required_target(label, "start", map, "next")?;
                Some(StepKind::Start { next })
            }
            "end" => Some(StepKind::End),
            "input" => {
                let variable = match map.get("variable") {
                    Some(Value::String(v)) if !v.trim().is_empty() => Some(v.clone()),
                    _ => match map.get("output") {
                        Some(Value::String(v)) if !v.trim().is_empty() => Some(v.clone()),
                        _ => {
                            self.violation(Violation::MissingField {
                                step: label.to_string(),
                                kind: "input".to_string(),
                                field: "variable".to_string(),
                            });
                            None
                        }
                    },
                };
                let prompt = self.optional_string(map, "prompt", label);
                let next = self.required_target(label, "input", map, "next");
                Some(StepKind::Input {
                    variable: variable?,
                    prompt,
                    next: next?,
                })
            }
            "branch" => self.check_branch(label, map),
            "action" => {
                let reference = self.required_string(label, "action", map, "action");
                let next = self.required_target(label, "action", map, "next");
                let reference = reference?;
                let capability = self.registry.canonicalize(&reference).map(|m| m.capability);
                Some(StepKind::Action(ActionSpec {
                    reference,
                    capability,
                    form: ActionForm::Field,
                    next: next?,
                }))
            }
            other => match self.registry.canonicalize(other) {
                Some(matched) => {
                    let next = self.required_target(label, other, map, "next")?;
                    Some(StepKind::Action(ActionSpec {
                        reference: other.to_string(),
                        capability: Some(matched.capability),
                        form: ActionForm::Kind,
                        next,
                    }))
                }
                None => {
                    self.violation(Violation::UnknownKind {
                        step: label.to_string(),
                        kind: other.to_string(),
                    });
                    None
                }
            },
        }
    }

    fn check_branch(&mut self, label: &str, map: &Map<String, Value>) -> Option<StepKind> {
        let mut conditions = Vec::new();
        let mut ok = true;

        match map.get("conditions") {
            Some(Value::Array(items)) if !items.is_empty() => {
                for (index, item) in items.iter().enumerate() {
                    let Some(entry) = item.as_object() else {
                        self.violation(Violation::InvalidCondition {
                            step: label.to_string(),
                            index,
                            reason: "entry must be a mapping with 'condition' and 'next'".to_string(),
                        });
                        ok = false;
                        continue;
                    };
                    let condition = match entry.get("condition") {
                        Some(raw) => Condition::from_value(raw).map_err(|reason| {
                            Violation::InvalidCondition {
                                step: label.to_string(),
                                index,
                                reason,
                            }
                        }),
                        None => Err(Violation::InvalidCondition {
                            step: label.to_string(),
                            index,
                            reason: "missing 'condition'".to_string(),
                        }),
                    };
                    let target = match entry.get("next") {
                        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Target::parse(s)),
                        _ => Err(Violation::InvalidCondition {
                            step: label.to_string(),
                            index,
                            reason: "missing 'next'".to_string(),
                        }),
                    };
                    match (condition, target) {
                        (Ok(condition), Ok(target)) => {
                            conditions.push(ConditionalTarget { condition, target });
                        }
                        (condition, target) => {
                            ok = false;
                            for err in [condition.err(), target.err()].into_iter().flatten() {
                                self.violation(err);
                            }
                        }
                    }
                }
            }
            Some(Value::Array(_)) | None | Some(Value::Null) => {
                self.violation(Violation::BranchWithoutConditions {
                    step: label.to_string(),
                });
                ok = false;
            }
            Some(_) => {
                self.invalid(label, "conditions", "a sequence");
                ok = false;
            }
        }

        let default = self.required_target(label, "branch", map, "default");
        if !ok {
            return None;
        }
        Some(StepKind::Branch {
            conditions,
            default: default?,
        })
    }

    fn check_graph(&mut self, steps: &[Skeleton<'_>], declared_entry: Option<&str>) -> Option<StepId> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order = Vec::new();
        for step in steps {
            let count = counts.entry(step.id.as_str()).or_insert(0);
            if *count == 0 {
                order.push(step.id.as_str());
            }
            *count += 1;
        }
        for id in &order {
            let count = counts[id];
            if count > 1 {
                self.violation(Violation::DuplicateStepId {
                    id: (*id).to_string(),
                    count,
                });
            }
        }

        let known: HashSet<&str> = counts.keys().copied().collect();
        let mut dangling = Vec::new();
        for step in steps {
            for target in &step.targets {
                if let Target::Step(id) = Target::parse(target) {
                    if !known.contains(id.as_str()) {
                        dangling.push(Violation::UnknownTarget {
                            step: step.id.clone(),
                            target: id.to_string(),
                        });
                    }
                }
            }
        }
        self.violations.extend(dangling);

        if let Some(entry) = declared_entry {
            if known.contains(entry) {
                return Some(StepId::new(entry));
            }
            self.violation(Violation::UnknownEntry {
                entry: entry.to_string(),
            });
            return None;
        }

        let starts: Vec<&Skeleton<'_>> = steps.iter().filter(|s| s.is_start).collect();
        match starts.as_slice() {
            [only] => Some(StepId::new(only.id.as_str())),
            [] => steps.first().map(|s| StepId::new(s.id.as_str())),
            many => {
                self.violation(Violation::MultipleStartSteps {
                    steps: many.iter().map(|s| s.id.clone()).collect(),
                });
                None
            }
        }
    }
}

/// Id and raw targets of a step, read regardless of whether its shape is valid
struct Skeleton<'a> {
    id: String,
    is_start: bool,
    targets: Vec<&'a str>,
}

impl<'a> Skeleton<'a> {
    fn read(raw: &'a Value) -> Option<Self> {
        let map = raw.as_object()?;
        let id = raw_step_id(map)?;
        let is_start = map
            .get("kind")
            .and_then(Value::as_str)
            .is_some_and(|k| k.trim() == "start");

        let conditional = map
            .get("conditions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|c| c.get("next"));
        let targets = [map.get("next"), map.get("default")]
            .into_iter()
            .flatten()
            .chain(conditional)
            .filter_map(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .collect();

        Some(Self {
            id,
            is_start,
            targets,
        })
    }
}

fn raw_step_id(map: &Map<String, Value>) -> Option<String> {
    match map.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn extra_keys(map: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    map.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
