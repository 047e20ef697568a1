//! Action Resolver
//!
//! Reconciles declared or planner-proposed action references with the
//! canonical capability registry. Resolution is a pure function of the raw
//! reference, the step's parameters and description, and the registry; it
//! never fails and performs no I/O. Every heuristic step is recorded as a
//! [`Correction`] so the choice can be audited later.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cadence_registry::CapabilityRegistry;
//! use cadence_resolver::{ResolutionMethod, Resolver, StepContext};
//!
//! let resolver = Resolver::new(Arc::new(CapabilityRegistry::with_defaults()));
//! let result = resolver.resolve("`code_generator`.", &StepContext::default());
//!
//! assert_eq!(result.capability.as_str(), "code_generator");
//! assert_eq!(result.method, ResolutionMethod::Exact);
//! assert_eq!(result.corrections.len(), 1);
//! ```

#![warn(unreachable_pub)]

pub mod distance;
pub mod resolver;
pub mod result;
pub mod semantic;

pub use resolver::{Resolver, StepContext};
pub use result::{Correction, ResolutionMethod, ResolutionResult};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
