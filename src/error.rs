//! Crate-level error types for registry and dispatch operations.

/// Error returned when a registry operation violates its contract.
///
/// All variants are raised synchronously at the offending call site,
/// never deferred into a listener callback, so callers can surface
/// them immediately.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A namespace identifier or qualified code failed validation.
    ///
    /// Namespace identifiers must be non-empty ASCII alphanumeric;
    /// qualified codes must not have an empty namespace or code part.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Tried to create a namespace under a name that already exists.
    ///
    /// The existing namespace's data and listeners are left untouched.
    #[error("namespace already exists: {0}")]
    DuplicateNamespace(String),

    /// Addressed a namespace that was never created.
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// The registry was destroyed; no further operations are accepted.
    #[error("context registry has been destroyed")]
    RegistryDestroyed,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
