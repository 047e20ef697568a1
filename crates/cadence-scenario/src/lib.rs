//! Scenario Loader & Validator
//!
//! Turns JSON/YAML scenario documents into validated, immutable
//! [`Scenario`] values:
//! - Structural validation that reports every violation in one pass
//! - Strict capability matching for action steps via the registry
//! - Graph analysis (unreachable steps, cycles without an input step)
//! - Canonical serialization and JSON ⇄ YAML conversion
//!
//! # Example
//!
//! ```rust
//! use cadence_registry::CapabilityRegistry;
//! use cadence_scenario::{load, Format};
//!
//! let registry = CapabilityRegistry::with_defaults();
//! let doc = r#"{"id": "hello", "steps": [
//!     {"id": "start", "kind": "start", "next": "greet"},
//!     {"id": "greet", "kind": "send_message", "params": {"text": "hi"}, "next": "$end"}
//! ]}"#;
//!
//! let loaded = load(doc, Format::Json, &registry).unwrap();
//! assert_eq!(loaded.scenario.entry().as_str(), "start");
//! ```

#![warn(unreachable_pub)]

pub mod analysis;
pub mod condition;
pub mod error;
pub mod loader;
pub mod model;
pub mod serialize;
pub mod template;

pub use condition::{CompareOp, Condition, Operand};
pub use error::{DefinitionError, ValidationReport, Violation, Warning};
pub use loader::{load, load_dir, load_path, parse_document, validate_document, Format, Loaded};
pub use model::{
    ActionForm, ActionSpec, ConditionalTarget, OutputBinding, Scenario, Step, StepId, StepKind,
    Target, END_MARKER, ESCALATE_MARKER,
};
pub use serialize::{convert, serialize, to_document};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
