//! Local (in-process) client for the authorization engine.

use std::sync::Arc;

use async_trait::async_trait;
use authz_engine_sdk::{
    AuthzEngineClient, AuthzError, CheckItem, CheckPair, NewPolicy, NewRelation, Policy, Relation,
};
use frontier_security::{ObjectRef, RequestContext};
use uuid::Uuid;

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct AuthzEngineLocalClient {
    svc: Arc<Service>,
}

impl AuthzEngineLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> AuthzError {
    match e {
        DomainError::Internal(_) | DomainError::DeadlineExceeded => {
            tracing::error!(operation = op, error = ?e, "authz_engine call failed");
        }
        _ => tracing::debug!(operation = op, error = %e, "authz_engine call rejected"),
    }
    e.into()
}

#[async_trait]
impl AuthzEngineClient for AuthzEngineLocalClient {
    async fn check(
        &self,
        ctx: &RequestContext,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, AuthzError> {
        self.svc
            .check(ctx, permission, resource)
            .await
            .map_err(|e| log_and_convert("check", e))
    }

    async fn check_subject(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, AuthzError> {
        self.svc
            .check_subject(ctx, subject, permission, resource)
            .await
            .map_err(|e| log_and_convert("check_subject", e))
    }

    async fn batch_check(
        &self,
        ctx: &RequestContext,
        items: Vec<CheckItem>,
    ) -> Result<Vec<CheckPair>, AuthzError> {
        self.svc
            .batch_check(ctx, items)
            .await
            .map_err(|e| log_and_convert("batch_check", e))
    }

    async fn create_relation(
        &self,
        ctx: &RequestContext,
        relation: NewRelation,
    ) -> Result<Relation, AuthzError> {
        self.svc
            .create_relation(ctx, relation)
            .await
            .map_err(|e| log_and_convert("create_relation", e))
    }

    async fn delete_relation(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        relation: &str,
        object: &ObjectRef,
    ) -> Result<(), AuthzError> {
        self.svc
            .delete_relation(ctx, subject, relation, object)
            .await
            .map_err(|e| log_and_convert("delete_relation", e))
    }

    async fn create_policy(
        &self,
        ctx: &RequestContext,
        policy: NewPolicy,
    ) -> Result<Policy, AuthzError> {
        self.svc
            .create_policy(ctx, policy)
            .await
            .map_err(|e| log_and_convert("create_policy", e))
    }

    async fn delete_policy(&self, ctx: &RequestContext, policy_id: Uuid) -> Result<(), AuthzError> {
        self.svc
            .delete_policy(ctx, policy_id)
            .await
            .map_err(|e| log_and_convert("delete_policy", e))
    }
}
