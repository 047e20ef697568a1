//! Scenario → document rendering and format conversion
//!
//! `load(serialize(s)) == s` for every validated scenario. Conditions are
//! written in canonical text form, `entry` is always explicit, and empty
//! optional fields are omitted.

use crate::error::DefinitionError;
use crate::loader::{self, Format};
use crate::model::{ActionForm, OutputBinding, Scenario, Step, StepKind};
use cadence_registry::CapabilityRegistry;
use serde_json::{Map, Value};

/// Render a scenario as a generic document
#[must_use]
pub fn to_document(scenario: &Scenario) -> Value {
    let mut root = scenario.extra().clone();
    root.insert("id".into(), Value::String(scenario.id().to_string()));
    if let Some(name) = scenario.name() {
        root.insert("name".into(), Value::String(name.to_string()));
    }
    if let Some(description) = scenario.description() {
        root.insert("description".into(), Value::String(description.to_string()));
    }
    root.insert("entry".into(), Value::String(scenario.entry().to_string()));
    if !scenario.initial_context().is_empty() {
        root.insert(
            "initial_context".into(),
            Value::Object(scenario.initial_context().clone()),
        );
    }
    root.insert(
        "steps".into(),
        Value::Array(scenario.steps().iter().map(step_document).collect()),
    );
    Value::Object(root)
}

fn step_document(step: &Step) -> Value {
    let mut map = step.extra.clone();
    map.insert("id".into(), Value::String(step.id.to_string()));
    map.insert("kind".into(), Value::String(step.kind.label().to_string()));

    match &step.kind {
        StepKind::Start { next } => {
            map.insert("next".into(), Value::String(next.to_string()));
        }
        StepKind::End => {}
        StepKind::Action(spec) => {
            if spec.form == ActionForm::Field {
                map.insert("action".into(), Value::String(spec.reference.clone()));
            }
            map.insert("next".into(), Value::String(spec.next.to_string()));
        }
        StepKind::Input {
            variable,
            prompt,
            next,
        } => {
            map.insert("variable".into(), Value::String(variable.clone()));
            if let Some(prompt) = prompt {
                map.insert("prompt".into(), Value::String(prompt.clone()));
            }
            map.insert("next".into(), Value::String(next.to_string()));
        }
        StepKind::Branch {
            conditions,
            default,
        } => {
            let rendered = conditions
                .iter()
                .map(|c| {
                    let mut entry = Map::new();
                    entry.insert("condition".into(), Value::String(c.condition.to_string()));
                    entry.insert("next".into(), Value::String(c.target.to_string()));
                    Value::Object(entry)
                })
                .collect();
            map.insert("conditions".into(), Value::Array(rendered));
            map.insert("default".into(), Value::String(default.to_string()));
        }
    }

    if !step.params.is_empty() {
        map.insert("params".into(), Value::Object(step.params.clone()));
    }
    match &step.output {
        OutputBinding::Merge => {}
        OutputBinding::Single(var) => {
            map.insert("output".into(), Value::String(var.clone()));
        }
        OutputBinding::Map(pairs) => {
            let out = pairs
                .iter()
                .map(|(var, key)| (var.clone(), Value::String(key.clone())))
                .collect();
            map.insert("output".into(), Value::Object(out));
        }
    }
    if let Some(description) = &step.description {
        map.insert("description".into(), Value::String(description.clone()));
    }
    if let Some(n) = step.max_retries {
        map.insert("max_retries".into(), Value::from(n));
    }
    if let Some(ms) = step.timeout_ms {
        map.insert("timeout_ms".into(), Value::from(ms));
    }
    Value::Object(map)
}

/// Render a scenario as text
///
/// # Errors
/// `DefinitionError::Serialize` if the serializer fails.
pub fn serialize(scenario: &Scenario, format: Format) -> Result<String, DefinitionError> {
    let document = to_document(scenario);
    let rendered = match format {
        Format::Json => serde_json::to_string_pretty(&document).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::to_string(&document).map_err(|e| e.to_string()),
    };
    rendered.map_err(|message| DefinitionError::Serialize {
        format: format.to_string(),
        message,
    })
}

/// Load in one format and render in another
///
/// # Errors
/// Any load or serialize failure.
pub fn convert(
    raw: &str,
    from: Format,
    to: Format,
    registry: &CapabilityRegistry,
) -> Result<String, DefinitionError> {
    let loaded = loader::load(raw, from, registry)?;
    serialize(&loaded.scenario, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load, load_path};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SUPPORT: &str = r#"
id: support
name: Support triage
entry: greet
owner: team-a
initial_context:
  tier: gold
steps:
  - id: greet
    kind: start
    next: hello
  - id: hello
    kind: send_message
    params:
      text: "Hello {customer}"
    next: ask
  - id: ask
    kind: input
    variable: issue
    prompt: What is wrong?
    next: route
  - id: route
    kind: branch
    conditions:
      - condition: "{priority} >= 3"
        next: page
      - condition: 'tier == "gold"'
        next: page
      - condition: "{vip}"
        next: $end
    default: $escalate
  - id: page
    kind: action
    action: "`HTTP Request`"
    params:
      url: "https://pager.example/{issue}"
    output:
      ticket: id
    max_retries: 5
    timeout_ms: 1500
    description: Page the on-call engineer
    next: done
  - id: done
    kind: end
"#;

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::with_defaults()
    }

    #[test]
    fn round_trips_through_both_formats() {
        let original = load(SUPPORT, Format::Yaml, &registry()).unwrap().scenario;

        for format in [Format::Json, Format::Yaml] {
            let text = serialize(&original, format).unwrap();
            let reloaded = load(&text, format, &registry()).unwrap().scenario;
            assert_eq!(reloaded, original, "round trip through {format}");
            assert_eq!(reloaded.fingerprint(), original.fingerprint());
        }
    }

    #[test]
    fn convert_yaml_to_json() {
        let json = convert(SUPPORT, Format::Yaml, Format::Json, &registry()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["entry"], "greet");
        assert_eq!(value["owner"], "team-a");
        assert_eq!(value["steps"][3]["conditions"][0]["condition"], "{priority} >= 3");
        assert_eq!(value["steps"][4]["action"], "`HTTP Request`");
        assert!(value["steps"][0].get("params").is_none());
    }

    #[test]
    fn convert_rejects_invalid_input() {
        let err = convert("id: x\nsteps: []\n", Format::Yaml, Format::Json, &registry()).unwrap_err();
        assert_eq!(err.violations().len(), 1);
    }

    #[test]
    fn fingerprint_ignores_formatting() {
        let a = load(SUPPORT, Format::Yaml, &registry()).unwrap().scenario;
        let reformatted = SUPPORT.replace("kind: end", "kind:   end  ");
        let b = load(&reformatted, Format::Yaml, &registry()).unwrap().scenario;
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn load_path_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("support.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SUPPORT.as_bytes()).unwrap();

        let loaded = load_path(&path, &registry()).unwrap();
        assert_eq!(loaded.scenario.id(), "support");

        let bad = dir.path().join("support.txt");
        std::fs::write(&bad, SUPPORT).unwrap();
        assert!(matches!(
            load_path(&bad, &registry()),
            Err(DefinitionError::UnknownFormat(_))
        ));
        assert!(matches!(
            load_path(&dir.path().join("missing.json"), &registry()),
            Err(DefinitionError::Io { .. })
        ));
    }
}
