//! Role assignments and their relation-graph form.
//!
//! A policy `(role, resource, principal)` is stored as a record plus three
//! edges around an `app/rolebinding:{policy_id}` node:
//!
//! ```text
//! principal          --bearer-->  app/rolebinding:{id}
//! app/role:{role_id} --role-->    app/rolebinding:{id}
//! app/rolebinding:{id} --granted--> resource
//! ```
//!
//! The evaluator walks these edges, so removing them is what revokes access.

use std::sync::Arc;

use authz_engine_sdk::{NewPolicy, NewRelation, Policy, PolicyFilter, Role};
use frontier_security::{ObjectRef, namespaces};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::DomainError;
use super::namespace_registry::NamespaceRegistry;
use super::relation_store::RelationStore;
use super::repo::{PolicyQuery, PolicyRepository};
use super::role_registry::RoleRegistry;

pub const BEARER_RELATION: &str = "bearer";
pub const ROLE_RELATION: &str = "role";
pub const GRANTED_RELATION: &str = "granted";

#[must_use]
pub fn binding_ref(policy_id: Uuid) -> ObjectRef {
    ObjectRef::new(namespaces::ROLE_BINDING, policy_id.to_string())
}

#[must_use]
pub fn role_ref(role_id: Uuid) -> ObjectRef {
    ObjectRef::new(namespaces::ROLE, role_id.to_string())
}

fn edges(policy: &Policy) -> [NewRelation; 3] {
    let binding = binding_ref(policy.id);
    [
        NewRelation {
            subject: policy.principal.clone(),
            relation: BEARER_RELATION.to_owned(),
            object: binding.clone(),
            subject_sub_relation: None,
        },
        NewRelation {
            subject: role_ref(policy.role_id),
            relation: ROLE_RELATION.to_owned(),
            object: binding.clone(),
            subject_sub_relation: None,
        },
        NewRelation {
            subject: binding,
            relation: GRANTED_RELATION.to_owned(),
            object: policy.resource.clone(),
            subject_sub_relation: None,
        },
    ]
}

/// Pick the single value two optional filters agree on.
///
/// `Err(())` means the filters name different objects and nothing can match.
fn merge_exact(a: Option<ObjectRef>, b: Option<ObjectRef>) -> Result<Option<ObjectRef>, ()> {
    match (a, b) {
        (Some(a), Some(b)) if a != b => Err(()),
        (a, b) => Ok(a.or(b)),
    }
}

pub struct PolicyStore {
    repo: Arc<dyn PolicyRepository>,
    relations: Arc<RelationStore>,
    roles: Arc<RoleRegistry>,
    namespaces: Arc<NamespaceRegistry>,
}

impl PolicyStore {
    #[must_use]
    pub fn new(
        repo: Arc<dyn PolicyRepository>,
        relations: Arc<RelationStore>,
        roles: Arc<RoleRegistry>,
        namespaces: Arc<NamespaceRegistry>,
    ) -> Self {
        Self {
            repo,
            relations,
            roles,
            namespaces,
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(role = %new.role_id, resource = %new.resource, principal = %new.principal)
    )]
    pub async fn create(&self, new: NewPolicy) -> Result<Policy, DomainError> {
        self.namespaces.get(new.resource.namespace()).await?;

        let chain = self.scope_chain(&new.resource).await?;
        let org_hint = chain
            .iter()
            .find(|r| r.is_in(namespaces::ORGANIZATION))
            .and_then(|r| Uuid::parse_str(r.id()).ok());
        let role = self.roles.get(&new.role_id, org_hint).await?;
        check_scope(&role, &new.resource, &chain)?;

        let policy = Policy {
            id: Uuid::new_v4(),
            role_id: role.id,
            resource: new.resource,
            principal: new.principal,
            title: new.title,
            metadata: new.metadata,
        };
        self.repo.insert(policy.clone()).await?;

        let mut written = Vec::with_capacity(3);
        for edge in edges(&policy) {
            match self.relations.put(edge.clone()).await {
                Ok(_) => written.push(edge),
                Err(e) => {
                    warn!(
                        policy_id = %policy.id,
                        error = %e,
                        "rolling back partially written policy"
                    );
                    for done in &written {
                        self.relations
                            .delete(&done.subject, &done.relation, &done.object)
                            .await?;
                    }
                    self.repo.remove(policy.id).await?;
                    return Err(e);
                }
            }
        }

        info!(policy_id = %policy.id, role = %role.name, "policy created");
        Ok(policy)
    }

    /// Revoke the policy's edges, then drop the record.
    pub async fn delete(&self, policy_id: Uuid) -> Result<Policy, DomainError> {
        let policy = self.get(policy_id).await?;
        for edge in edges(&policy) {
            self.relations
                .delete(&edge.subject, &edge.relation, &edge.object)
                .await?;
        }
        self.repo.remove(policy_id).await?;
        info!(policy_id = %policy.id, "policy deleted");
        Ok(policy)
    }

    pub async fn get(&self, policy_id: Uuid) -> Result<Policy, DomainError> {
        self.repo
            .get(policy_id)
            .await?
            .ok_or_else(|| DomainError::not_found("policy", policy_id))
    }

    pub async fn list(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, DomainError> {
        let org = filter
            .org_id
            .as_deref()
            .map(|id| ObjectRef::new(namespaces::ORGANIZATION, id));
        let project = filter
            .project_id
            .as_deref()
            .map(|id| ObjectRef::new(namespaces::PROJECT, id));
        let user = filter
            .user_id
            .as_deref()
            .map(|id| ObjectRef::new(namespaces::USER, id));
        let group = filter
            .group_id
            .as_deref()
            .map(|id| ObjectRef::new(namespaces::GROUP, id));

        let (Ok(resource), Ok(principal)) = (merge_exact(org, project), merge_exact(user, group))
        else {
            return Ok(Vec::new());
        };

        self.repo
            .list(&PolicyQuery {
                resource,
                principal,
                role_id: filter.role_id,
            })
            .await
    }

    /// Policies naming `entity` as resource or principal.
    pub async fn list_for_entity(&self, entity: &ObjectRef) -> Result<Vec<Policy>, DomainError> {
        let mut out = self
            .repo
            .list(&PolicyQuery {
                resource: Some(entity.clone()),
                ..PolicyQuery::default()
            })
            .await?;
        for policy in self
            .repo
            .list(&PolicyQuery {
                principal: Some(entity.clone()),
                ..PolicyQuery::default()
            })
            .await?
        {
            if !out.iter().any(|p| p.id == policy.id) {
                out.push(policy);
            }
        }
        Ok(out)
    }


    async fn scope_chain(&self, resource: &ObjectRef) -> Result<Vec<ObjectRef>, DomainError> {
        let mut chain = vec![resource.clone()];
        chain.extend(self.relations.ancestors(resource).await?);
        Ok(chain)
    }
}

fn check_scope(role: &Role, resource: &ObjectRef, chain: &[ObjectRef]) -> Result<(), DomainError> {
    if !role.scopes.is_empty() && !role.scopes.iter().any(|s| resource.is_in(s)) {
        return Err(DomainError::invalid_role_scope(
            &role.name,
            resource,
            format!("role applies to [{}]", role.scopes.join(", ")),
        ));
    }
    if let Some(org_id) = role.org_id {
        let org = ObjectRef::new(namespaces::ORGANIZATION, org_id.to_string());
        if !chain.contains(&org) {
            return Err(DomainError::invalid_role_scope(
                &role.name,
                resource,
                format!("resource is outside organization {org_id}"),
            ));
        }
    }
    Ok(())
}
