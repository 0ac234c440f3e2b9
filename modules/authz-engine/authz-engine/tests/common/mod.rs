#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::time::Duration;

use authz_engine::config::{AuthMode, IdentityConfig, TokenMapping};
use authz_engine::{AuthConfig, AuthzEngine, BootstrapConfig, EngineConfig};
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use frontier_security::{ObjectRef, RequestContext};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const ROOT: &str = "t-root";
pub const ALICE: &str = "t-alice";
pub const BOB: &str = "t-bob";

pub fn r(s: &str) -> ObjectRef {
    ObjectRef::parse(s).unwrap()
}

pub fn as_principal(principal: &str) -> RequestContext {
    RequestContext::builder().principal(r(principal)).build()
}

pub fn root_ctx() -> RequestContext {
    as_principal("superuser:root")
}

fn token(token: &str, principal: &str) -> TokenMapping {
    TokenMapping {
        token: token.to_owned(),
        identity: IdentityConfig {
            principal: principal.to_owned(),
            org_id: None,
        },
    }
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        mode: AuthMode::StaticTokens,
        tokens: vec![
            token(ROOT, "superuser:root"),
            token(ALICE, "user:alice"),
            token(BOB, "user:bob"),
        ],
        ..AuthConfig::default()
    }
}

pub async fn engine() -> AuthzEngine {
    AuthzEngine::init(&EngineConfig::default(), &BootstrapConfig::default())
        .await
        .unwrap()
}

pub async fn app() -> (AuthzEngine, Router) {
    let engine = engine().await;
    let router = engine
        .router(&auth_config(), Duration::from_secs(30))
        .unwrap();
    (engine, router)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Value,
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        content_type,
        body,
    }
}
