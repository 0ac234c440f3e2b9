use async_trait::async_trait;
use authz_engine_sdk::{Namespace, NewRelation, Permission, Policy, Relation, RelationFilter, Role};
use frontier_security::ObjectRef;
use uuid::Uuid;

use super::error::DomainError;

#[async_trait]
pub trait NamespaceRepository: Send + Sync {
    /// Insert the namespace unless it exists; returns the stored record either way.
    async fn upsert_namespace(&self, name: &str) -> Result<Namespace, DomainError>;

    async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>, DomainError>;

    async fn find_namespace_by_id(&self, id: Uuid) -> Result<Option<Namespace>, DomainError>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, DomainError>;

    /// Insert the permission unless its key exists; returns the stored record either way.
    async fn upsert_permission(
        &self,
        namespace: &Namespace,
        verb: &str,
        title: Option<String>,
    ) -> Result<Permission, DomainError>;

    async fn find_permission(&self, key: &str) -> Result<Option<Permission>, DomainError>;

    /// All permissions, or those of one namespace.
    async fn list_permissions(
        &self,
        namespace_id: Option<Uuid>,
    ) -> Result<Vec<Permission>, DomainError>;

    async fn delete_permission(&self, key: &str) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait RelationRepository: Send + Sync {
    /// Upsert keyed on `(subject, relation, object)`.
    async fn put(&self, relation: NewRelation) -> Result<Relation, DomainError>;

    /// Returns whether a triple was removed.
    async fn delete(
        &self,
        subject: &ObjectRef,
        relation: &str,
        object: &ObjectRef,
    ) -> Result<bool, DomainError>;

    async fn get(&self, id: Uuid) -> Result<Option<Relation>, DomainError>;

    async fn list(&self, filter: &RelationFilter) -> Result<Vec<Relation>, DomainError>;

    async fn delete_by_object(&self, object: &ObjectRef) -> Result<usize, DomainError>;

    async fn delete_by_subject(&self, subject: &ObjectRef) -> Result<usize, DomainError>;
}

/// Exact-match policy lookup. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct PolicyQuery {
    pub resource: Option<ObjectRef>,
    pub principal: Option<ObjectRef>,
    pub role_id: Option<Uuid>,
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn insert(&self, policy: Policy) -> Result<(), DomainError>;

    async fn get(&self, id: Uuid) -> Result<Option<Policy>, DomainError>;

    async fn remove(&self, id: Uuid) -> Result<Option<Policy>, DomainError>;

    async fn list(&self, query: &PolicyQuery) -> Result<Vec<Policy>, DomainError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Fails with `Conflict` when the name is taken within the role's org scope.
    async fn insert(&self, role: Role) -> Result<(), DomainError>;

    async fn get(&self, id: Uuid) -> Result<Option<Role>, DomainError>;

    async fn find_by_name(
        &self,
        name: &str,
        org_id: Option<Uuid>,
    ) -> Result<Option<Role>, DomainError>;

    async fn list(&self) -> Result<Vec<Role>, DomainError>;

    /// Replace a stored role. `NotFound` if missing, `Conflict` on a name clash.
    async fn update(&self, role: Role) -> Result<(), DomainError>;

    async fn remove(&self, id: Uuid) -> Result<Option<Role>, DomainError>;
}
