//! Public API trait for the authorization engine.

use async_trait::async_trait;
use frontier_security::{ObjectRef, RequestContext};
use uuid::Uuid;

use crate::error::AuthzError;
use crate::models::{CheckItem, CheckPair, NewPolicy, NewRelation, Policy, Relation};

/// In-process API of the authorization engine.
///
/// Consumers hold an `Arc<dyn AuthzEngineClient>` handed out by the module:
///
/// ```ignore
/// let engine = module.client();
///
/// if !engine.check(&ctx, "update", &project).await? {
///     return Err(Forbidden);
/// }
/// ```
#[async_trait]
pub trait AuthzEngineClient: Send + Sync {
    /// Check the context principal against `permission` on `resource`.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the context carries no principal
    /// - `NotFound` if the resource namespace is unknown
    /// - `PermissionNotFound` if the permission is not declared
    /// - `DeadlineExceeded` if the context deadline passes first
    async fn check(
        &self,
        ctx: &RequestContext,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, AuthzError>;

    /// Check an explicit subject, independent of the caller's identity.
    ///
    /// # Errors
    ///
    /// Same as [`AuthzEngineClient::check`], minus `Unauthenticated`.
    async fn check_subject(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        permission: &str,
        resource: &ObjectRef,
    ) -> Result<bool, AuthzError>;

    /// Evaluate many checks for the context principal. Output order matches input.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any item is malformed or the deadline passes.
    async fn batch_check(
        &self,
        ctx: &RequestContext,
        items: Vec<CheckItem>,
    ) -> Result<Vec<CheckPair>, AuthzError>;

    /// Create (or return the existing) relation triple.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty relation name; `PermissionDenied` when
    /// management checks are enforced and the caller is not a superuser.
    async fn create_relation(
        &self,
        ctx: &RequestContext,
        relation: NewRelation,
    ) -> Result<Relation, AuthzError>;

    /// Remove a relation triple. Missing triples are not an error.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when the caller may not manage relations.
    async fn delete_relation(
        &self,
        ctx: &RequestContext,
        subject: &ObjectRef,
        relation: &str,
        object: &ObjectRef,
    ) -> Result<(), AuthzError>;

    /// Grant a role to a principal on a resource.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown role, `InvalidRoleScope` when the role may
    /// not be applied to the resource.
    async fn create_policy(
        &self,
        ctx: &RequestContext,
        policy: NewPolicy,
    ) -> Result<Policy, AuthzError>;

    /// Revoke a policy and exactly the relations it created.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown policy id.
    async fn delete_policy(&self, ctx: &RequestContext, policy_id: Uuid)
    -> Result<(), AuthzError>;
}
