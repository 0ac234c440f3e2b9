//! Resource namespaces and the permissions declared on them.
//!
//! Permission keys are derived from the namespace name: `app/project` with
//! verb `get` becomes `app.project.get`, whose slug form is `app_project_get`.
//! Callers may name a permission by bare verb, full key, alias key
//! (`project.get`) or slug; [`NamespaceRegistry::resolve_permission`]
//! normalizes all four.

use std::sync::Arc;

use authz_engine_sdk::{Namespace, Permission};
use frontier_security::resolve_namespace_alias;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::DomainError;
use super::repo::NamespaceRepository;

/// Verb that grants every other verb of its namespace.
pub const ADMINISTER_VERB: &str = "administer";

/// `app/project` + `get` -> `app.project.get`
#[must_use]
pub fn permission_key(namespace: &str, verb: &str) -> String {
    format!("{}.{verb}", namespace.replace('/', "."))
}

/// `app.project.get` -> `app_project_get`
#[must_use]
pub fn permission_slug(key: &str) -> String {
    key.replace('.', "_")
}

/// `app.project.get` -> `("app/project", "get")`
#[must_use]
pub fn split_permission_key(key: &str) -> Option<(String, &str)> {
    let (prefix, verb) = key.rsplit_once('.')?;
    let (service, resource) = prefix.split_once('.')?;
    if service.is_empty() || resource.is_empty() || resource.contains('.') || verb.is_empty() {
        return None;
    }
    Some((format!("{service}/{resource}"), verb))
}

fn is_name_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn validate_namespace_name(name: &str) -> Result<(), DomainError> {
    match name.split_once('/') {
        Some((service, resource)) if is_name_segment(service) && is_name_segment(resource) => {
            Ok(())
        }
        _ => Err(DomainError::invalid_argument(format!(
            "namespace '{name}' must have the form service/resource"
        ))),
    }
}

fn validate_verb(verb: &str) -> Result<(), DomainError> {
    if !verb.is_empty() && verb.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(DomainError::invalid_argument(format!(
            "permission verb '{verb}' must be alphanumeric"
        )))
    }
}

pub struct NamespaceRegistry {
    repo: Arc<dyn NamespaceRepository>,
}

impl NamespaceRegistry {
    #[must_use]
    pub fn new(repo: Arc<dyn NamespaceRepository>) -> Self {
        Self { repo }
    }

    /// Register a namespace. Re-registering returns the existing record.
    pub async fn register(&self, name: &str) -> Result<Namespace, DomainError> {
        let name = resolve_namespace_alias(name);
        validate_namespace_name(name)?;
        let ns = self.repo.upsert_namespace(name).await?;
        debug!(namespace = %ns.name, id = %ns.id, "namespace registered");
        Ok(ns)
    }

    /// Look up a namespace by name or alias.
    pub async fn get(&self, name: &str) -> Result<Namespace, DomainError> {
        let name = resolve_namespace_alias(name);
        self.repo
            .find_namespace(name)
            .await?
            .ok_or_else(|| DomainError::not_found("namespace", name))
    }

    /// Look up a namespace by id, falling back to name.
    pub async fn get_by_id_or_name(&self, id_or_name: &str) -> Result<Namespace, DomainError> {
        if let Ok(id) = Uuid::parse_str(id_or_name) {
            return self
                .repo
                .find_namespace_by_id(id)
                .await?
                .ok_or_else(|| DomainError::not_found("namespace", id));
        }
        self.get(id_or_name).await
    }

    pub async fn list(&self) -> Result<Vec<Namespace>, DomainError> {
        self.repo.list_namespaces().await
    }

    pub async fn list_permissions(
        &self,
        namespace_id: Uuid,
    ) -> Result<Vec<Permission>, DomainError> {
        if self.repo.find_namespace_by_id(namespace_id).await?.is_none() {
            return Err(DomainError::not_found("namespace", namespace_id));
        }
        self.repo.list_permissions(Some(namespace_id)).await
    }

    pub async fn list_all_permissions(&self) -> Result<Vec<Permission>, DomainError> {
        self.repo.list_permissions(None).await
    }

    /// Declare `verb` on `namespace`, registering the namespace if needed.
    pub async fn create_permission(
        &self,
        namespace: &str,
        verb: &str,
        title: Option<String>,
    ) -> Result<Permission, DomainError> {
        validate_verb(verb)?;
        let ns = self.register(namespace).await?;
        let permission = self.repo.upsert_permission(&ns, verb, title).await?;
        info!(key = %permission.key, "permission declared");
        Ok(permission)
    }

    /// Fetch a permission by key, alias key or slug.
    pub async fn get_permission(&self, reference: &str) -> Result<Permission, DomainError> {
        let key = self.normalize_reference(reference, None).await?;
        self.repo
            .find_permission(&key)
            .await?
            .ok_or_else(|| DomainError::not_found("permission", reference))
    }

    /// Remove a permission. Fails with `Conflict` while a role lists it.
    pub async fn delete_permission(&self, key: &str) -> Result<(), DomainError> {
        if self.repo.delete_permission(key).await? {
            info!(key, "permission deleted");
            Ok(())
        } else {
            Err(DomainError::not_found("permission", key))
        }
    }

    /// Resolve a permission reference in the context of a resource namespace.
    ///
    /// Fails with `PermissionNotFound` unless the permission is declared on
    /// `resource_namespace` itself.
    pub async fn resolve_permission(
        &self,
        reference: &str,
        resource_namespace: &str,
    ) -> Result<Permission, DomainError> {
        let resource_namespace = resolve_namespace_alias(resource_namespace);
        let key = self
            .normalize_reference(reference, Some(resource_namespace))
            .await?;
        self.repo
            .find_permission(&key)
            .await?
            .filter(|p| p.namespace == resource_namespace)
            .ok_or_else(|| DomainError::permission_not_found(reference, resource_namespace))
    }

    /// Turn any accepted permission spelling into a candidate key.
    ///
    /// The result is not guaranteed to exist.
    pub async fn normalize_reference(
        &self,
        reference: &str,
        context_namespace: Option<&str>,
    ) -> Result<String, DomainError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(DomainError::invalid_argument("permission must not be empty"));
        }

        if reference.contains('.') {
            let parts: Vec<&str> = reference.split('.').collect();
            if let [namespace, verb] = parts.as_slice() {
                let namespace = resolve_namespace_alias(namespace);
                if namespace.contains('/') {
                    return Ok(permission_key(namespace, verb));
                }
            }
            return Ok(reference.to_owned());
        }

        if reference.contains('_') {
            let found = self
                .repo
                .list_permissions(None)
                .await?
                .into_iter()
                .find(|p| permission_slug(&p.key) == reference);
            if let Some(p) = found {
                return Ok(p.key);
            }
            // undeclared slugs such as `app_project_administer`
            return Ok(match reference.split('_').collect::<Vec<_>>().as_slice() {
                [service, resource, verb] => permission_key(&format!("{service}/{resource}"), verb),
                _ => reference.to_owned(),
            });
        }

        Ok(match context_namespace {
            Some(ns) => permission_key(resolve_namespace_alias(ns), reference),
            None => reference.to_owned(),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::infra::storage::InMemoryStorage;

    fn registry() -> NamespaceRegistry {
        NamespaceRegistry::new(Arc::new(InMemoryStorage::new()))
    }

    #[test]
    fn key_helpers() {
        assert_eq!(permission_key("app/project", "get"), "app.project.get");
        assert_eq!(permission_slug("app.project.get"), "app_project_get");
        assert_eq!(
            split_permission_key("compute.instance.create"),
            Some(("compute/instance".to_owned(), "create"))
        );
        assert_eq!(split_permission_key("project.get"), None);
        assert_eq!(split_permission_key("a.b.c.d"), None);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let reg = registry();
        let a = reg.register("compute/instance").await.unwrap();
        let b = reg.register("compute/instance").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(reg.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_resolves_aliases_and_validates() {
        let reg = registry();
        let ns = reg.register("org").await.unwrap();
        assert_eq!(ns.name, "app/organization");

        assert!(matches!(
            reg.register("flat").await,
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            reg.register("a/b/c").await,
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn get_unknown_namespace_is_not_found() {
        let reg = registry();
        assert!(matches!(
            reg.get("compute/instance").await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn create_permission_registers_namespace() {
        let reg = registry();
        let p = reg
            .create_permission("compute/instance", "create", Some("Create".to_owned()))
            .await
            .unwrap();
        assert_eq!(p.key, "compute.instance.create");

        let ns = reg.get("compute/instance").await.unwrap();
        assert_eq!(p.namespace_id, ns.id);
        assert_eq!(reg.list_permissions(ns.id).await.unwrap(), vec![p.clone()]);

        let again = reg
            .create_permission("compute/instance", "create", None)
            .await
            .unwrap();
        assert_eq!(again.id, p.id);
    }

    #[tokio::test]
    async fn verbs_must_be_alphanumeric() {
        let reg = registry();
        assert!(matches!(
            reg.create_permission("compute/instance", "re-boot", None).await,
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn resolves_every_reference_form() {
        let reg = registry();
        reg.create_permission("app/project", "get", None).await.unwrap();

        for reference in ["get", "app.project.get", "project.get", "app_project_get"] {
            let p = reg.resolve_permission(reference, "app/project").await.unwrap();
            assert_eq!(p.key, "app.project.get", "reference {reference}");
        }
    }

    #[tokio::test]
    async fn undeclared_permission_is_permission_not_found() {
        let reg = registry();
        reg.register("app/project").await.unwrap();

        for reference in ["delete", "nonexistent.permission", "app.project.delete"] {
            assert!(matches!(
                reg.resolve_permission(reference, "app/project").await,
                Err(DomainError::PermissionNotFound { .. })
            ));
        }
    }

    #[tokio::test]
    async fn permission_of_another_namespace_is_not_found() {
        let reg = registry();
        reg.create_permission("app/project", "get", None).await.unwrap();
        reg.create_permission("app/organization", "get", None).await.unwrap();
        reg.create_permission("app/organization", "projectcreate", None)
            .await
            .unwrap();

        for reference in [
            "app.organization.get",
            "organization.projectcreate",
            "app_organization_get",
        ] {
            assert!(
                matches!(
                    reg.resolve_permission(reference, "project").await,
                    Err(DomainError::PermissionNotFound { .. })
                ),
                "reference {reference}"
            );
        }
        assert!(reg.resolve_permission("app.organization.get", "org").await.is_ok());
    }

    #[tokio::test]
    async fn delete_permission() {
        let reg = registry();
        reg.create_permission("app/group", "get", None).await.unwrap();
        reg.delete_permission("app.group.get").await.unwrap();
        assert!(matches!(
            reg.get_permission("app.group.get").await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            reg.delete_permission("app.group.get").await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
