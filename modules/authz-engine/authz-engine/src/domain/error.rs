//! Domain errors for the authorization engine.

use authz_engine_sdk::AuthzError;
use frontier_security::ObjectRefError;

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("permission '{permission}' is not declared for namespace '{namespace}'")]
    PermissionNotFound {
        permission: String,
        namespace: String,
    },

    #[error("role '{role}' cannot be applied to '{resource}': {reason}")]
    InvalidRoleScope {
        role: String,
        resource: String,
        reason: String,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("request carries no principal")]
    Unauthenticated,

    #[error("'{principal}' lacks '{permission}' on '{resource}'")]
    PermissionDenied {
        principal: String,
        permission: String,
        resource: String,
    },

    #[error("evaluation deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn permission_not_found(
        permission: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::PermissionNotFound {
            permission: permission.into(),
            namespace: namespace.into(),
        }
    }

    pub fn invalid_role_scope(
        role: impl Into<String>,
        resource: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRoleScope {
            role: role.into(),
            resource: resource.to_string(),
            reason: reason.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn permission_denied(
        principal: impl ToString,
        permission: impl Into<String>,
        resource: impl ToString,
    ) -> Self {
        Self::PermissionDenied {
            principal: principal.to_string(),
            permission: permission.into(),
            resource: resource.to_string(),
        }
    }
}

impl From<ObjectRefError> for DomainError {
    fn from(e: ObjectRefError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for DomainError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::DeadlineExceeded
    }
}

impl From<DomainError> for AuthzError {
    fn from(e: DomainError) -> Self {
        match e {
            e @ DomainError::NotFound { .. } => Self::NotFound(e.to_string()),
            e @ DomainError::PermissionNotFound { .. } => Self::PermissionNotFound(e.to_string()),
            e @ DomainError::InvalidRoleScope { .. } => Self::InvalidRoleScope(e.to_string()),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            DomainError::Unauthenticated => Self::Unauthenticated,
            e @ DomainError::PermissionDenied { .. } => Self::PermissionDenied(e.to_string()),
            DomainError::DeadlineExceeded => Self::DeadlineExceeded,
            DomainError::Internal(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn converts_to_sdk_taxonomy() {
        assert!(matches!(
            AuthzError::from(DomainError::not_found("role", "r1")),
            AuthzError::NotFound(msg) if msg == "role 'r1' not found"
        ));
        assert!(matches!(
            AuthzError::from(DomainError::permission_not_found("x.y.z", "app/project")),
            AuthzError::PermissionNotFound(_)
        ));
        assert_eq!(
            AuthzError::from(DomainError::DeadlineExceeded),
            AuthzError::DeadlineExceeded
        );
        assert_eq!(
            AuthzError::from(DomainError::Unauthenticated),
            AuthzError::Unauthenticated
        );
    }

    #[test]
    fn object_ref_errors_are_invalid_arguments() {
        let err: DomainError = frontier_security::ObjectRef::parse("nope").unwrap_err().into();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }
}
