//! `Check(subject, permission, resource)` resolution.
//!
//! Steps:
//! 1. resolve the resource namespace and the permission key,
//! 2. grant everything to platform admins when the bypass is on,
//! 3. expand the subject to itself plus its groups,
//! 4. walk the resource and its ancestors closest first, collecting the
//!    rolebinding grants at each level,
//! 5. allow on the first grant whose bearer is one of the principals and
//!    whose role covers the permission.
//!
//! Evaluation is bounded by the request deadline; running out of time is an
//! error, never a denial.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use authz_engine_sdk::WILDCARD_PERMISSION;
use frontier_security::{ObjectRef, RequestContext, namespaces};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::DomainError;
use super::namespace_registry::{ADMINISTER_VERB, NamespaceRegistry};
use super::policy_store::{BEARER_RELATION, GRANTED_RELATION, ROLE_RELATION};
use super::relation_store::{ADMIN_RELATION, RelationStore};
use super::role_registry::RoleRegistry;

/// Whether a role's permission set covers `key`.
#[must_use]
pub fn role_covers(permissions: &HashSet<String>, key: &str) -> bool {
    if permissions.contains(WILDCARD_PERMISSION) || permissions.contains(key) {
        return true;
    }
    key.rsplit_once('.')
        .is_some_and(|(prefix, _)| permissions.contains(&format!("{prefix}.{ADMINISTER_VERB}")))
}

/// A role's permissions held by one bearer.
#[derive(Debug, Clone)]
pub struct Grant {
    pub bearer: ObjectRef,
    pub permissions: Arc<HashSet<String>>,
}

/// Grants on a resource and each of its ancestors, closest first.
#[derive(Debug, Clone, Default)]
pub struct GrantSet {
    levels: Vec<Vec<Grant>>,
}

impl GrantSet {
    #[must_use]
    pub fn allows(&self, principals: &HashSet<ObjectRef>, key: &str) -> bool {
        self.levels.iter().any(|level| {
            level
                .iter()
                .any(|g| principals.contains(&g.bearer) && role_covers(&g.permissions, key))
        })
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub superuser_bypass: bool,
    pub check_timeout: Duration,
}

impl From<&crate::config::EngineConfig> for EvaluatorConfig {
    fn from(cfg: &crate::config::EngineConfig) -> Self {
        Self {
            superuser_bypass: cfg.superuser_bypass,
            check_timeout: cfg.check_timeout(),
        }
    }
}

pub struct Evaluator {
    namespaces: Arc<NamespaceRegistry>,
    relations: Arc<RelationStore>,
    roles: Arc<RoleRegistry>,
    config: EvaluatorConfig,
}

impl Evaluator {
    #[must_use]
    pub fn new(
        namespaces: Arc<NamespaceRegistry>,
        relations: Arc<RelationStore>,
        roles: Arc<RoleRegistry>,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            namespaces,
            relations,
            roles,
            config,
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(subject = %subject, permission = %permission, resource = %resource)
    )]
    pub async fn check(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, DomainError> {
        self.within_deadline(ctx, self.check_inner(subject, permission, resource))
            .await
    }

    /// Evaluate an already resolved permission key, which may belong to an
    /// ancestor namespace such as `app.organization.policymanage`.
    pub(crate) async fn check_key(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        key: &str,
        resource: &ObjectRef,
    ) -> Result<bool, DomainError> {
        self.within_deadline(ctx, self.evaluate(subject, key, resource))
            .await
    }

    async fn check_inner(
        &self,
        subject: &ObjectRef,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, DomainError> {
        let key = self.resolve(permission, resource).await?;
        self.evaluate(subject, &key, resource).await
    }

    async fn evaluate(
        &self,
        subject: &ObjectRef,
        key: &str,
        resource: &ObjectRef,
    ) -> Result<bool, DomainError> {
        if self.bypasses(subject).await? {
            debug!(%subject, "superuser bypass");
            return Ok(true);
        }

        let principals = self.principals(subject).await?;
        let mut roles = HashMap::new();
        let mut levels = vec![resource.clone()];
        levels.extend(self.relations.ancestors(resource).await?);

        for level in &levels {
            let grants = self.level_grants(level, &mut roles).await?;
            if grants
                .iter()
                .any(|g| principals.contains(&g.bearer) && role_covers(&g.permissions, key))
            {
                debug!(%level, key = %key, "granted");
                return Ok(true);
            }
        }
        debug!(key = %key, "no matching grant");
        Ok(false)
    }

    /// Validate the resource namespace and resolve the permission to a key
    /// declared on that namespace.
    pub(crate) async fn resolve(
        &self,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<String, DomainError> {
        let namespace = self.namespaces.get(resource.namespace()).await?;
        let declared = self
            .namespaces
            .resolve_permission(permission, &namespace.name)
            .await?;
        Ok(declared.key)
    }

    /// Superusers and holders of `admin` on the platform object.
    pub async fn is_platform_admin(&self, subject: &ObjectRef) -> Result<bool, DomainError> {
        if subject.is_in(namespaces::SUPERUSER) {
            return Ok(true);
        }
        self.relations
            .exists(subject, ADMIN_RELATION, &ObjectRef::platform())
            .await
    }

    pub(crate) async fn bypasses(&self, subject: &ObjectRef) -> Result<bool, DomainError> {
        if !self.config.superuser_bypass {
            return Ok(false);
        }
        self.is_platform_admin(subject).await
    }

    /// The subject plus every group it belongs to.
    pub(crate) async fn principals(
        &self,
        subject: &ObjectRef,
    ) -> Result<HashSet<ObjectRef>, DomainError> {
        let mut principals = self.relations.subject_memberships(subject).await?;
        principals.insert(subject.clone());
        Ok(principals)
    }

    /// Every grant on `resource` and its ancestors.
    pub(crate) async fn load_grants(&self, resource: &ObjectRef) -> Result<GrantSet, DomainError> {
        let mut roles = HashMap::new();
        let mut chain = vec![resource.clone()];
        chain.extend(self.relations.ancestors(resource).await?);

        let mut levels = Vec::with_capacity(chain.len());
        for level in &chain {
            levels.push(self.level_grants(level, &mut roles).await?);
        }
        Ok(GrantSet { levels })
    }

    async fn level_grants(
        &self,
        level: &ObjectRef,
        roles: &mut HashMap<Uuid, Option<Arc<HashSet<String>>>>,
    ) -> Result<Vec<Grant>, DomainError> {
        let mut grants = Vec::new();
        for binding in self.relations.subjects(level, GRANTED_RELATION).await? {
            if !binding.is_in(namespaces::ROLE_BINDING) {
                continue;
            }
            let bearers = self.relations.subjects(&binding, BEARER_RELATION).await?;
            for role in self.relations.subjects(&binding, ROLE_RELATION).await? {
                let Some(permissions) = self.role_permissions(&role, roles).await? else {
                    continue;
                };
                grants.extend(bearers.iter().map(|bearer| Grant {
                    bearer: bearer.clone(),
                    permissions: permissions.clone(),
                }));
            }
        }
        Ok(grants)
    }

    async fn role_permissions(
        &self,
        role: &ObjectRef,
        cache: &mut HashMap<Uuid, Option<Arc<HashSet<String>>>>,
    ) -> Result<Option<Arc<HashSet<String>>>, DomainError> {
        if !role.is_in(namespaces::ROLE) {
            return Ok(None);
        }
        let Ok(role_id) = Uuid::parse_str(role.id()) else {
            warn!(%role, "rolebinding points at a malformed role id");
            return Ok(None);
        };
        if let Some(cached) = cache.get(&role_id) {
            return Ok(cached.clone());
        }
        let permissions = match self.roles.get_permissions(role_id).await {
            Ok(p) => Some(Arc::new(p)),
            Err(DomainError::NotFound { .. }) => {
                warn!(%role, "rolebinding points at a missing role");
                None
            }
            Err(e) => return Err(e),
        };
        cache.insert(role_id, permissions.clone());
        Ok(permissions)
    }

    /// Run `fut` under the request deadline, or the configured default.
    pub(crate) async fn within_deadline<T, F>(
        &self,
        ctx: &RequestContext,
        fut: F,
    ) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        if ctx.is_expired() {
            return Err(DomainError::DeadlineExceeded);
        }
        let budget = ctx.remaining().unwrap_or(self.config.check_timeout);
        tokio::time::timeout(budget, fut).await?
    }
}
