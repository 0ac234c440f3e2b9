//! Error types for the authorization engine.

use thiserror::Error;

/// Errors returned by the authorization engine API.
///
/// A denied check is not an error: it is `Ok(false)`. Only malformed input,
/// missing entities, management-plane refusals and timeouts surface here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthzError {
    /// A resource, role, policy, relation or namespace did not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// The permission is not declared in the resolved namespace.
    #[error("permission not found: {0}")]
    PermissionNotFound(String),

    /// A policy targets a resource outside the role's scopes.
    #[error("invalid role scope: {0}")]
    InvalidRoleScope(String),

    /// Duplicate named entity, or an entity still referenced elsewhere.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed identifiers or payloads.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller has no identity.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The caller may not perform the management operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Evaluation did not finish before the request deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error: {0}")]
    Internal(String),
}
