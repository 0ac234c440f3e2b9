//! Many checks for one subject in one pass.
//!
//! Every item is validated up front so a malformed item fails the batch
//! before any graph work. Grants are then loaded once per distinct resource,
//! concurrently, and every item is answered from those shared sets.

use std::collections::HashMap;
use std::sync::Arc;

use authz_engine_sdk::{CheckItem, CheckPair};
use frontier_security::{ObjectRef, RequestContext};
use futures::future::try_join_all;
use tracing::debug;

use super::error::DomainError;
use super::evaluator::Evaluator;

pub struct BatchEvaluator {
    evaluator: Arc<Evaluator>,
}

impl BatchEvaluator {
    #[must_use]
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self { evaluator }
    }

    /// Answer `items` in input order.
    #[tracing::instrument(skip_all, fields(subject = %subject, items = items.len()))]
    pub async fn batch_check(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        items: Vec<CheckItem>,
    ) -> Result<Vec<CheckPair>, DomainError> {
        self.evaluator
            .within_deadline(ctx, self.evaluate(subject, items))
            .await
    }

    async fn evaluate(
        &self,
        subject: &ObjectRef,
        items: Vec<CheckItem>,
    ) -> Result<Vec<CheckPair>, DomainError> {
        let mut keys = Vec::with_capacity(items.len());
        for item in &items {
            keys.push(self.evaluator.resolve(&item.permission, &item.resource).await?);
        }

        if self.evaluator.bypasses(subject).await? {
            return Ok(items
                .into_iter()
                .map(|body| CheckPair { body, status: true })
                .collect());
        }

        let principals = self.evaluator.principals(subject).await?;

        let mut distinct: Vec<&ObjectRef> = Vec::new();
        for item in &items {
            if !distinct.contains(&&item.resource) {
                distinct.push(&item.resource);
            }
        }
        let loaded = try_join_all(distinct.iter().map(|r| self.evaluator.load_grants(r))).await?;
        debug!(resources = distinct.len(), "grant sets loaded");

        let grants: HashMap<ObjectRef, _> = distinct.into_iter().cloned().zip(loaded).collect();

        Ok(items
            .into_iter()
            .zip(keys)
            .map(|(body, key)| {
                let status = grants
                    .get(&body.resource)
                    .is_some_and(|g| g.allows(&principals, &key));
                CheckPair { body, status }
            })
            .collect())
    }
}
