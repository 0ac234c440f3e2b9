//! Domain models for the authorization engine.
//!
//! The access graph is built from five record kinds: namespaces declare
//! resource types, permissions declare verbs on a namespace, roles bundle
//! permissions, relations are directed `subject -relation-> object` edges,
//! and policies bind a role to a principal on a resource.

use std::collections::HashMap;

use frontier_security::ObjectRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role permission entry that matches every permission.
pub const WILDCARD_PERMISSION: &str = "*";

/// A declared resource type, e.g. `app/project` or `compute/instance`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Namespace {
    pub id: Uuid,
    /// Full name in `service/resource` form.
    pub name: String,
}

/// A verb declared on a namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub id: Uuid,
    pub namespace_id: Uuid,
    /// Namespace name, denormalized for display.
    pub namespace: String,
    pub verb: String,
    /// Globally unique `{service}.{resource}.{verb}`.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A named permission bundle.
///
/// `org_id == None` marks a platform role visible everywhere; otherwise the
/// role belongs to one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Permission keys, `"*"`, or `{service}.{resource}.administer`.
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,
    /// Namespaces this role may be applied to. Empty means any.
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Role {
    #[must_use]
    pub fn is_platform(&self) -> bool {
        self.org_id.is_none()
    }
}

/// Payload for creating or replacing a role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub org_id: Option<Uuid>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Role listing filter.
#[derive(Debug, Clone)]
pub struct RoleFilter {
    /// Keep roles whose scopes intersect these namespaces. Empty keeps all.
    pub scopes: Vec<String>,
    /// Include this organization's custom roles.
    pub org_id: Option<Uuid>,
    /// Include platform roles.
    pub include_platform: bool,
}

impl Default for RoleFilter {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            org_id: None,
            include_platform: true,
        }
    }
}

/// A directed `subject -relation-> object` edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relation {
    pub id: Uuid,
    pub subject: ObjectRef,
    pub relation: String,
    pub object: ObjectRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_sub_relation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRelation {
    pub subject: ObjectRef,
    pub relation: String,
    pub object: ObjectRef,
    #[serde(default)]
    pub subject_sub_relation: Option<String>,
}

/// Relation listing filter. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct RelationFilter {
    pub subject: Option<ObjectRef>,
    pub relation: Option<String>,
    pub object: Option<ObjectRef>,
}

/// A role granted to a principal on a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub id: Uuid,
    pub role_id: Uuid,
    pub resource: ObjectRef,
    pub principal: ObjectRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPolicy {
    /// Role id or role name.
    pub role_id: String,
    pub resource: ObjectRef,
    pub principal: ObjectRef,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Policy listing filter. All set fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyFilter {
    /// Policies on `app/organization:{org_id}`.
    #[serde(default)]
    pub org_id: Option<String>,
    /// Policies on `app/project:{project_id}`.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Policies whose principal is `app/user:{user_id}`.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role_id: Option<Uuid>,
    /// Policies whose principal is `app/group:{group_id}`.
    #[serde(default)]
    pub group_id: Option<String>,
}

/// One `(permission, resource)` question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CheckItem {
    pub permission: String,
    pub resource: ObjectRef,
}

/// A batch check answer, echoing the question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckPair {
    pub body: CheckItem,
    pub status: bool,
}
