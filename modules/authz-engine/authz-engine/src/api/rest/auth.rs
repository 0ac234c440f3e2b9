//! Bearer token authentication.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use frontier_security::{ObjectRef, ObjectRefError, RequestContext};
use http::StatusCode;
use uuid::Uuid;

use super::error::Problem;
use crate::config::{AuthConfig, AuthMode, IdentityConfig};

#[derive(Debug, Clone)]
struct Identity {
    principal: ObjectRef,
    org_id: Option<Uuid>,
}

impl TryFrom<&IdentityConfig> for Identity {
    type Error = ObjectRefError;

    fn try_from(cfg: &IdentityConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            principal: ObjectRef::parse(&cfg.principal)?,
            org_id: cfg.org_id,
        })
    }
}

/// Token-to-identity mapping from configuration.
///
/// - `accept_all`: any non-empty token maps to the default identity
/// - `static_tokens`: specific tokens map to specific identities
#[derive(Debug)]
pub struct StaticAuthenticator {
    mode: AuthMode,
    default_identity: Identity,
    token_map: HashMap<String, Identity>,
}

impl StaticAuthenticator {
    /// Build the authenticator, validating every configured principal.
    pub fn from_config(cfg: &AuthConfig) -> Result<Self, ObjectRefError> {
        let token_map = cfg
            .tokens
            .iter()
            .map(|m| Ok((m.token.clone(), Identity::try_from(&m.identity)?)))
            .collect::<Result<HashMap<_, _>, ObjectRefError>>()?;

        Ok(Self {
            mode: cfg.mode.clone(),
            default_identity: Identity::try_from(&cfg.default_identity)?,
            token_map,
        })
    }

    /// Returns `None` for an empty or unrecognized token.
    #[must_use]
    pub fn authenticate(&self, bearer_token: &str) -> Option<RequestContext> {
        if bearer_token.is_empty() {
            return None;
        }

        let identity = match &self.mode {
            AuthMode::AcceptAll => &self.default_identity,
            AuthMode::StaticTokens => self.token_map.get(bearer_token)?,
        };

        let mut builder = RequestContext::builder().principal(identity.principal.clone());
        if let Some(org_id) = identity.org_id {
            builder = builder.org_id(org_id);
        }
        Some(builder.build())
    }
}

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<StaticAuthenticator>,
    /// Budget stamped on every authenticated request as its deadline.
    pub request_timeout: Duration,
}

/// Resolve the bearer token into a `RequestContext` extension, or answer 401.
///
/// The context's deadline is `request_timeout` from now.
pub async fn authn_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(req.headers()) else {
        return Problem::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Missing or invalid Authorization header",
        )
        .into_response();
    };

    match state.authenticator.authenticate(token) {
        Some(ctx) => {
            let ctx = ctx.with_deadline(Instant::now() + state.request_timeout);
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        None => {
            tracing::debug!("AuthN rejected: unknown bearer token");
            Problem::new(
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "Authentication failed",
            )
            .into_response()
        }
    }
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use axum::body::Body;
    use axum::routing::get;
    use axum::{Extension, Router, middleware};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::config::TokenMapping;

    #[test]
    fn accept_all_mode_returns_default_identity() {
        let auth = StaticAuthenticator::from_config(&AuthConfig::default()).unwrap();
        let ctx = auth.authenticate("any-token-value").unwrap();
        assert_eq!(ctx.principal().unwrap().to_string(), "app/user:anonymous");
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn empty_token_is_rejected() {
        let auth = StaticAuthenticator::from_config(&AuthConfig::default()).unwrap();
        assert!(auth.authenticate("").is_none());
    }

    #[test]
    fn static_tokens_mode_maps_identities() {
        let org = Uuid::new_v4();
        let cfg = AuthConfig {
            mode: AuthMode::StaticTokens,
            tokens: vec![TokenMapping {
                token: "t-alice".to_owned(),
                identity: IdentityConfig {
                    principal: "user:alice".to_owned(),
                    org_id: Some(org),
                },
            }],
            ..AuthConfig::default()
        };
        let auth = StaticAuthenticator::from_config(&cfg).unwrap();

        let ctx = auth.authenticate("t-alice").unwrap();
        assert_eq!(ctx.principal().unwrap().to_string(), "app/user:alice");
        assert_eq!(ctx.org_id(), Some(org));
        assert!(auth.authenticate("t-bob").is_none());
    }

    #[test]
    fn malformed_principal_fails_construction() {
        let cfg = AuthConfig {
            default_identity: IdentityConfig {
                principal: "alice".to_owned(),
                org_id: None,
            },
            ..AuthConfig::default()
        };
        assert!(StaticAuthenticator::from_config(&cfg).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(http::header::AUTHORIZATION, "Bearer  tok ".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("tok"));
    }

    #[tokio::test]
    async fn middleware_stamps_the_request_deadline() {
        let state = AuthState {
            authenticator: Arc::new(
                StaticAuthenticator::from_config(&AuthConfig::default()).unwrap(),
            ),
            request_timeout: Duration::from_secs(30),
        };
        let app = Router::new()
            .route(
                "/",
                get(|Extension(ctx): Extension<RequestContext>| async move {
                    ctx.remaining().map_or(0, |r| r.as_secs()).to_string()
                }),
            )
            .route_layer(middleware::from_fn_with_state(state, authn_middleware));

        let resp = app
            .oneshot(
                http::Request::builder()
                    .uri("/")
                    .header(http::header::AUTHORIZATION, "Bearer tok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let secs: u64 = std::str::from_utf8(&body).unwrap().parse().unwrap();
        assert!((20..=30).contains(&secs), "remaining {secs}s");
    }
}
