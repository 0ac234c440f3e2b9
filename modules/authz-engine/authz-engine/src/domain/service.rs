use std::sync::Arc;

use authz_engine_sdk::{
    CheckItem, CheckPair, Namespace, NewPolicy, NewRelation, NewRole, Permission, Policy,
    PolicyFilter, Relation, RelationFilter, Role, RoleFilter,
};
use frontier_security::{ObjectRef, RequestContext, namespaces};
use tracing::info;
use uuid::Uuid;

use super::batch::BatchEvaluator;
use super::error::DomainError;
use super::evaluator::{Evaluator, EvaluatorConfig};
use super::namespace_registry::NamespaceRegistry;
use super::policy_store::PolicyStore;
use super::relation_store::{RelationStore, TraversalConfig};
use super::repo::{NamespaceRepository, PolicyRepository, RelationRepository, RoleRepository};
use super::role_registry::RoleRegistry;
use crate::config::EngineConfig;

/// Verbs guarding the management plane.
pub(crate) mod manage {
    pub const POLICY: &str = "policymanage";
    pub const ROLE: &str = "rolemanage";
}

// ============================================================================
// Service Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub enforce_management_permissions: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enforce_management_permissions: true,
        }
    }
}

/// What an entity cascade removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub policies: usize,
    pub relations: usize,
}

// ============================================================================
// Service Implementation
// ============================================================================

/// Entry point for every engine operation.
///
/// Management calls are checked against the caller in the `RequestContext`:
/// relation, permission and platform-role writes need a platform admin;
/// policy writes need `policymanage` on the target resource; org role writes
/// need `rolemanage` on the organization.
pub struct Service {
    namespaces: Arc<NamespaceRegistry>,
    relations: Arc<RelationStore>,
    roles: Arc<RoleRegistry>,
    policies: Arc<PolicyStore>,
    evaluator: Arc<Evaluator>,
    batch: BatchEvaluator,
    config: ServiceConfig,
}

impl Service {
    /// Wire every component over one storage backend.
    pub fn new<S>(storage: Arc<S>, cfg: &EngineConfig) -> Self
    where
        S: NamespaceRepository + RelationRepository + PolicyRepository + RoleRepository + 'static,
    {
        let namespaces = Arc::new(NamespaceRegistry::new(storage.clone()));
        let relations = Arc::new(RelationStore::new(
            storage.clone(),
            TraversalConfig::from(cfg),
        ));
        let roles = Arc::new(RoleRegistry::new(storage.clone(), namespaces.clone()));
        let policies = Arc::new(PolicyStore::new(
            storage,
            relations.clone(),
            roles.clone(),
            namespaces.clone(),
        ));
        let evaluator = Arc::new(Evaluator::new(
            namespaces.clone(),
            relations.clone(),
            roles.clone(),
            EvaluatorConfig::from(cfg),
        ));
        Self {
            namespaces,
            relations,
            roles,
            policies,
            batch: BatchEvaluator::new(evaluator.clone()),
            evaluator,
            config: ServiceConfig {
                enforce_management_permissions: cfg.enforce_management_permissions,
            },
        }
    }

    pub(crate) fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    pub(crate) fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub(crate) fn relations(&self) -> &RelationStore {
        &self.relations
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Check the caller's own access.
    pub async fn check(
        &self,
        ctx: &RequestContext,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, DomainError> {
        let principal = caller(ctx)?;
        self.evaluator.check(ctx, principal, permission, resource).await
    }

    /// Check an explicit subject on behalf of an in-process caller.
    pub async fn check_subject(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, DomainError> {
        self.evaluator.check(ctx, subject, permission, resource).await
    }

    /// [`Service::check_subject`] for remote callers. Reserved for platform admins.
    pub async fn admin_check(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, DomainError> {
        self.require_platform_admin(ctx, "check").await?;
        self.check_subject(ctx, subject, permission, resource).await
    }

    pub async fn batch_check(
        &self,
        ctx: &RequestContext,
        items: Vec<CheckItem>,
    ) -> Result<Vec<CheckPair>, DomainError> {
        let principal = caller(ctx)?;
        self.batch.batch_check(ctx, principal, items).await
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    pub async fn create_relation(
        &self,
        ctx: &RequestContext,
        relation: NewRelation,
    ) -> Result<Relation, DomainError> {
        self.require_platform_admin(ctx, "relationmanage").await?;
        self.relations.put(relation).await
    }

    pub async fn delete_relation(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        relation: &str,
        object: &ObjectRef,
    ) -> Result<(), DomainError> {
        self.require_platform_admin(ctx, "relationmanage").await?;
        self.relations.delete(subject, relation, object).await
    }

    pub async fn list_relations(
        &self,
        ctx: &RequestContext,
        filter: &RelationFilter,
    ) -> Result<Vec<Relation>, DomainError> {
        self.require_platform_admin(ctx, "relationmanage").await?;
        self.relations.list(filter).await
    }

    // ------------------------------------------------------------------
    // Policies
    // ------------------------------------------------------------------

    pub async fn create_policy(
        &self,
        ctx: &RequestContext,
        policy: NewPolicy,
    ) -> Result<Policy, DomainError> {
        self.require_manage(ctx, manage::POLICY, &policy.resource).await?;
        self.policies.create(policy).await
    }

    pub async fn delete_policy(
        &self,
        ctx: &RequestContext,
        policy_id: Uuid,
    ) -> Result<(), DomainError> {
        let policy = self.policies.get(policy_id).await?;
        self.require_manage(ctx, manage::POLICY, &policy.resource).await?;
        self.policies.delete(policy_id).await?;
        Ok(())
    }

    pub async fn get_policy(
        &self,
        ctx: &RequestContext,
        policy_id: Uuid,
    ) -> Result<Policy, DomainError> {
        self.require_authenticated(ctx)?;
        self.policies.get(policy_id).await
    }

    pub async fn list_policies(
        &self,
        ctx: &RequestContext,
        filter: &PolicyFilter,
    ) -> Result<Vec<Policy>, DomainError> {
        self.require_authenticated(ctx)?;
        self.policies.list(filter).await
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    pub async fn list_roles(
        &self,
        ctx: &RequestContext,
        filter: &RoleFilter,
    ) -> Result<Vec<Role>, DomainError> {
        self.require_authenticated(ctx)?;
        self.roles.list_roles(filter).await
    }

    pub async fn get_role(
        &self,
        ctx: &RequestContext,
        id_or_name: &str,
        org_id: Option<Uuid>,
    ) -> Result<Role, DomainError> {
        self.require_authenticated(ctx)?;
        self.roles.get(id_or_name, org_id).await
    }

    pub async fn create_role(
        &self,
        ctx: &RequestContext,
        role: NewRole,
    ) -> Result<Role, DomainError> {
        self.require_role_manage(ctx, role.org_id).await?;
        self.roles.create(role).await
    }

    pub async fn update_role(
        &self,
        ctx: &RequestContext,
        role_id: Uuid,
        role: NewRole,
    ) -> Result<Role, DomainError> {
        let current = self.roles.get(&role_id.to_string(), None).await?;
        self.require_role_manage(ctx, current.org_id).await?;
        self.roles.update(role_id, role).await
    }

    /// Delete a role no policy or rolebinding points at.
    pub async fn delete_role(
        &self,
        ctx: &RequestContext,
        role_id: Uuid,
    ) -> Result<(), DomainError> {
        let current = self.roles.get(&role_id.to_string(), None).await?;
        self.require_role_manage(ctx, current.org_id).await?;
        self.roles.delete(role_id).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Namespaces and permissions
    // ------------------------------------------------------------------

    pub async fn list_namespaces(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<Namespace>, DomainError> {
        self.require_authenticated(ctx)?;
        self.namespaces.list().await
    }

    pub async fn get_namespace(
        &self,
        ctx: &RequestContext,
        id_or_name: &str,
    ) -> Result<Namespace, DomainError> {
        self.require_authenticated(ctx)?;
        self.namespaces.get_by_id_or_name(id_or_name).await
    }

    /// Permissions of one namespace, or all of them.
    pub async fn list_permissions(
        &self,
        ctx: &RequestContext,
        namespace: Option<&str>,
    ) -> Result<Vec<Permission>, DomainError> {
        self.require_authenticated(ctx)?;
        match namespace {
            Some(ns) => {
                let ns = self.namespaces.get_by_id_or_name(ns).await?;
                self.namespaces.list_permissions(ns.id).await
            }
            None => self.namespaces.list_all_permissions().await,
        }
    }

    pub async fn get_permission(
        &self,
        ctx: &RequestContext,
        reference: &str,
    ) -> Result<Permission, DomainError> {
        self.require_authenticated(ctx)?;
        self.namespaces.get_permission(reference).await
    }

    pub async fn create_permission(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        verb: &str,
        title: Option<String>,
    ) -> Result<Permission, DomainError> {
        self.require_platform_admin(ctx, "permissionmanage").await?;
        self.namespaces.create_permission(namespace, verb, title).await
    }

    /// Delete a permission no role lists.
    pub async fn delete_permission(
        &self,
        ctx: &RequestContext,
        reference: &str,
    ) -> Result<(), DomainError> {
        self.require_platform_admin(ctx, "permissionmanage").await?;
        let permission = self.namespaces.get_permission(reference).await?;
        self.namespaces.delete_permission(&permission.key).await
    }

    // ------------------------------------------------------------------
    // Entity cascade
    // ------------------------------------------------------------------

    /// Drop every policy and relation mentioning `entity`.
    #[tracing::instrument(skip_all, fields(entity = %entity))]
    pub async fn delete_entity(
        &self,
        ctx: &RequestContext,
        entity: &ObjectRef,
    ) -> Result<CascadeSummary, DomainError> {
        self.require_platform_admin(ctx, "entitydelete").await?;

        let mut summary = CascadeSummary::default();
        for policy in self.policies.list_for_entity(entity).await? {
            self.policies.delete(policy.id).await?;
            summary.policies += 1;
        }
        summary.relations += self.relations.delete_by_object(entity).await?;
        summary.relations += self.relations.delete_by_subject(entity).await?;

        info!(
            policies = summary.policies,
            relations = summary.relations,
            "entity cascade complete"
        );
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    fn require_authenticated(&self, ctx: &RequestContext) -> Result<(), DomainError> {
        if self.config.enforce_management_permissions {
            caller(ctx)?;
        }
        Ok(())
    }

    async fn require_platform_admin(
        &self,
        ctx: &RequestContext,
        action: &str,
    ) -> Result<(), DomainError> {
        if !self.config.enforce_management_permissions {
            return Ok(());
        }
        let principal = caller(ctx)?;
        if self.evaluator.is_platform_admin(principal).await? {
            return Ok(());
        }
        Err(DomainError::permission_denied(
            principal,
            action,
            ObjectRef::platform(),
        ))
    }

    /// Require `{resource namespace}.{verb}`, or `app.organization.{verb}`
    /// when the resource namespace does not declare the verb.
    async fn require_manage(
        &self,
        ctx: &RequestContext,
        verb: &str,
        resource: &ObjectRef,
    ) -> Result<(), DomainError> {
        if !self.config.enforce_management_permissions {
            return Ok(());
        }
        let principal = caller(ctx)?;
        if self.evaluator.is_platform_admin(principal).await? {
            return Ok(());
        }

        let key = match self.evaluator.resolve(verb, resource).await {
            Ok(key) => key,
            Err(DomainError::PermissionNotFound { .. }) => {
                super::namespace_registry::permission_key(namespaces::ORGANIZATION, verb)
            }
            Err(e) => return Err(e),
        };
        let allowed = self
            .evaluator
            .check_key(ctx, principal, &key, resource)
            .await?;
        if allowed {
            Ok(())
        } else {
            Err(DomainError::permission_denied(principal, key, resource))
        }
    }

    async fn require_role_manage(
        &self,
        ctx: &RequestContext,
        org_id: Option<Uuid>,
    ) -> Result<(), DomainError> {
        match org_id {
            Some(org_id) => {
                let org = ObjectRef::new(namespaces::ORGANIZATION, org_id.to_string());
                self.require_manage(ctx, manage::ROLE, &org).await
            }
            None => self.require_platform_admin(ctx, manage::ROLE).await,
        }
    }
}

fn caller(ctx: &RequestContext) -> Result<&ObjectRef, DomainError> {
    ctx.principal().ok_or(DomainError::Unauthenticated)
}
