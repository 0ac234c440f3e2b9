//! Platform and organization roles.

use std::collections::HashSet;
use std::sync::Arc;

use authz_engine_sdk::{NewRole, Role, RoleFilter, WILDCARD_PERMISSION};
use frontier_security::resolve_namespace_alias;
use tracing::info;
use uuid::Uuid;

use super::error::DomainError;
use super::namespace_registry::{ADMINISTER_VERB, NamespaceRegistry, split_permission_key};
use super::repo::RoleRepository;

pub struct RoleRegistry {
    repo: Arc<dyn RoleRepository>,
    namespaces: Arc<NamespaceRegistry>,
}

impl RoleRegistry {
    #[must_use]
    pub fn new(repo: Arc<dyn RoleRepository>, namespaces: Arc<NamespaceRegistry>) -> Self {
        Self { repo, namespaces }
    }

    /// Platform roles followed by the organization's roles, narrowed by scope.
    ///
    /// A platform role and an org role sharing a name are both returned.
    pub async fn list_roles(&self, filter: &RoleFilter) -> Result<Vec<Role>, DomainError> {
        let scopes: HashSet<&str> = filter
            .scopes
            .iter()
            .map(|s| resolve_namespace_alias(s.trim()))
            .filter(|s| !s.is_empty())
            .collect();

        let roles = self.repo.list().await?;
        let (mut platform, org): (Vec<Role>, Vec<Role>) =
            roles.into_iter().partition(Role::is_platform);
        if !filter.include_platform {
            platform.clear();
        }
        let org = org
            .into_iter()
            .filter(|r| filter.org_id.is_some() && r.org_id == filter.org_id);

        Ok(platform
            .into_iter()
            .chain(org)
            .filter(|r| scopes.is_empty() || r.scopes.iter().any(|s| scopes.contains(s.as_str())))
            .collect())
    }

    /// The role's permission entries as a set.
    pub async fn get_permissions(&self, role_id: Uuid) -> Result<HashSet<String>, DomainError> {
        let role = self
            .repo
            .get(role_id)
            .await?
            .ok_or_else(|| DomainError::not_found("role", role_id))?;
        Ok(role.permissions.into_iter().collect())
    }

    /// Look up a role by id, or by name preferring the organization's own role.
    pub async fn get(&self, id_or_name: &str, org_id: Option<Uuid>) -> Result<Role, DomainError> {
        if let Ok(id) = Uuid::parse_str(id_or_name) {
            return self
                .repo
                .get(id)
                .await?
                .ok_or_else(|| DomainError::not_found("role", id));
        }
        if let Some(org_id) = org_id
            && let Some(role) = self.repo.find_by_name(id_or_name, Some(org_id)).await?
        {
            return Ok(role);
        }
        self.repo
            .find_by_name(id_or_name, None)
            .await?
            .ok_or_else(|| DomainError::not_found("role", id_or_name))
    }

    pub async fn create(&self, new: NewRole) -> Result<Role, DomainError> {
        let role = Role {
            id: Uuid::new_v4(),
            name: validate_name(&new.name)?,
            title: new.title,
            permissions: self.normalize_permissions(&new.permissions).await?,
            org_id: new.org_id,
            scopes: self.normalize_scopes(&new.scopes).await?,
            metadata: new.metadata,
        };
        self.repo.insert(role.clone()).await?;
        info!(role = %role.name, id = %role.id, org_id = ?role.org_id, "role created");
        Ok(role)
    }

    /// Replace a role's contents. The owning organization never changes.
    pub async fn update(&self, id: Uuid, new: NewRole) -> Result<Role, DomainError> {
        let current = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("role", id))?;
        let role = Role {
            id,
            name: validate_name(&new.name)?,
            title: new.title,
            permissions: self.normalize_permissions(&new.permissions).await?,
            org_id: current.org_id,
            scopes: self.normalize_scopes(&new.scopes).await?,
            metadata: new.metadata,
        };
        self.repo.update(role.clone()).await?;
        info!(role = %role.name, id = %role.id, "role updated");
        Ok(role)
    }

    /// Remove a role. Fails with `Conflict` while a policy or rolebinding
    /// still names it.
    pub async fn delete(&self, id: Uuid) -> Result<Role, DomainError> {
        let role = self
            .repo
            .remove(id)
            .await?
            .ok_or_else(|| DomainError::not_found("role", id))?;
        info!(role = %role.name, id = %role.id, "role deleted");
        Ok(role)
    }


    async fn normalize_permissions(&self, entries: &[String]) -> Result<Vec<String>, DomainError> {
        if entries.is_empty() {
            return Err(DomainError::invalid_argument(
                "role must list at least one permission",
            ));
        }
        let mut out: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = if entry.trim() == WILDCARD_PERMISSION {
                WILDCARD_PERMISSION.to_owned()
            } else {
                self.resolve_role_permission(entry).await?
            };
            if !out.contains(&key) {
                out.push(key);
            }
        }
        Ok(out)
    }

    async fn resolve_role_permission(&self, entry: &str) -> Result<String, DomainError> {
        let key = self.namespaces.normalize_reference(entry, None).await?;
        if self.namespaces.get_permission(&key).await.is_ok() {
            return Ok(key);
        }
        // `administer` is implied for any registered namespace
        if let Some((namespace, verb)) = split_permission_key(&key)
            && verb == ADMINISTER_VERB
            && self.namespaces.get(&namespace).await.is_ok()
        {
            return Ok(key);
        }
        Err(DomainError::permission_not_found(
            entry,
            split_permission_key(&key).map_or_else(String::new, |(ns, _)| ns),
        ))
    }

    async fn normalize_scopes(&self, scopes: &[String]) -> Result<Vec<String>, DomainError> {
        let mut out = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let ns = self.namespaces.get(scope.trim()).await?;
            if !out.contains(&ns.name) {
                out.push(ns.name);
            }
        }
        Ok(out)
    }
}

fn validate_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::invalid_argument("role name must not be empty"));
    }
    Ok(name.to_owned())
}
