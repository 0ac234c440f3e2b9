use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// RFC 9457 problem details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut resp = (status, Json(self)).into_response();
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        resp
    }
}

pub type ApiResult<T> = Result<T, Problem>;

/// Convert domain errors to HTTP Problem responses
pub fn domain_error_to_problem(err: DomainError) -> Problem {
    match err {
        e @ DomainError::NotFound { .. } => {
            Problem::new(StatusCode::NOT_FOUND, "Not Found", e.to_string())
        }

        e @ DomainError::PermissionNotFound { .. } => {
            Problem::new(StatusCode::NOT_FOUND, "Permission Not Found", e.to_string())
        }

        e @ DomainError::InvalidRoleScope { .. } => {
            Problem::new(StatusCode::BAD_REQUEST, "Invalid Role Scope", e.to_string())
        }

        DomainError::Conflict(msg) => Problem::new(StatusCode::CONFLICT, "Conflict", msg),

        DomainError::InvalidArgument(msg) => {
            Problem::new(StatusCode::BAD_REQUEST, "Invalid Argument", msg)
        }

        e @ DomainError::Unauthenticated => {
            Problem::new(StatusCode::UNAUTHORIZED, "Unauthorized", e.to_string())
        }

        e @ DomainError::PermissionDenied { .. } => {
            Problem::new(StatusCode::FORBIDDEN, "Forbidden", e.to_string())
        }

        e @ DomainError::DeadlineExceeded => {
            Problem::new(StatusCode::GATEWAY_TIMEOUT, "Deadline Exceeded", e.to_string())
        }

        DomainError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error while serving request");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "An internal error occurred",
            )
        }
    }
}

/// Implement Into<Problem> for `DomainError` so `?` works in handlers
impl From<DomainError> for Problem {
    fn from(e: DomainError) -> Self {
        domain_error_to_problem(e)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn maps_every_domain_error() {
        let cases = [
            (DomainError::not_found("role", "r1"), StatusCode::NOT_FOUND),
            (
                DomainError::permission_not_found("launch", "app/project"),
                StatusCode::NOT_FOUND,
            ),
            (
                DomainError::invalid_role_scope("viewer", "org:o1", "wrong scope"),
                StatusCode::BAD_REQUEST,
            ),
            (DomainError::conflict("in use"), StatusCode::CONFLICT),
            (DomainError::invalid_argument("bad"), StatusCode::BAD_REQUEST),
            (DomainError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                DomainError::permission_denied("user:u1", "app.project.get", "project:p1"),
                StatusCode::FORBIDDEN,
            ),
            (DomainError::DeadlineExceeded, StatusCode::GATEWAY_TIMEOUT),
            (DomainError::Internal("boom".to_owned()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(Problem::from(err).status_code(), status);
        }
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let p = Problem::from(DomainError::Internal("db password wrong".to_owned()));
        assert!(!p.detail.contains("password"));
    }

    #[test]
    fn response_uses_problem_content_type() {
        let resp = Problem::new(StatusCode::CONFLICT, "Conflict", "x").into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_CONTENT_TYPE
        );
    }
}
