//! Capability Registry
//!
//! The static catalogue of actions an external handler can perform:
//! - Canonical capability identifiers and their argument shapes
//! - Side-effect categories (used to pick the safest fallback)
//! - A curated many-to-one alias table for misspelled or translated names
//!
//! The registry is built once at process start and never mutated afterwards,
//! so it can be shared read-only across every running session.
//!
//! # Example
//!
//! ```rust
//! use cadence_registry::CapabilityRegistry;
//!
//! let registry = CapabilityRegistry::with_defaults();
//! let m = registry.canonicalize("`Send-Message`").unwrap();
//! assert_eq!(m.capability.as_str(), "send_message");
//! ```

#![warn(unreachable_pub)]

pub mod capability;
pub mod defaults;
pub mod error;
pub mod normalize;
pub mod registry;

pub use capability::{ArgKind, ArgSpec, Capability, CapabilityId, SideEffect};
pub use error::RegistryError;
pub use normalize::{clean_reference, fold_separators, strip_artifacts, tokens};
pub use registry::{CapabilityRegistry, MatchKind, RegistryBuilder, StrictMatch};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
