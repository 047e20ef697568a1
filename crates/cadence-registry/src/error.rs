//! Registry construction errors

use crate::capability::CapabilityId;

/// Errors raised while building a [`CapabilityRegistry`](crate::CapabilityRegistry)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Registry must contain at least one capability
    #[error("registry has no capabilities")]
    Empty,

    /// Capability registered twice
    #[error("duplicate capability: {0}")]
    DuplicateCapability(CapabilityId),

    /// Capability identifier is not in canonical form
    #[error("capability id '{0}' is not canonical (expected lower-case snake_case)")]
    NonCanonicalId(String),

    /// Alias points at a capability that does not exist
    #[error("alias '{alias}' targets unknown capability '{target}'")]
    UnknownAliasTarget {
        /// Alias name
        alias: String,
        /// Missing target
        target: String,
    },

    /// Alias name collides with a canonical capability id
    #[error("alias '{0}' shadows a registered capability")]
    AliasShadowsCapability(String),
}
