use std::collections::HashMap;

use authz_engine_sdk::{
    CheckItem, CheckPair, Namespace, NewPolicy, NewRelation, NewRole, Permission, Policy,
    Relation, Role,
};
use frontier_security::ObjectRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::CascadeSummary;
use crate::domain::error::DomainError;

/// Parse an `ns:id` path or body field.
pub fn parse_ref(raw: &str) -> Result<ObjectRef, DomainError> {
    Ok(ObjectRef::parse(raw.trim())?)
}

// ----------------------------------------------------------------------------
// Checks
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckRequest {
    pub permission: String,
    pub resource: String,
}

impl CheckRequest {
    pub fn into_item(self) -> Result<CheckItem, DomainError> {
        Ok(CheckItem {
            resource: parse_ref(&self.resource)?,
            permission: self.permission,
        })
    }
}

impl From<CheckItem> for CheckRequest {
    fn from(item: CheckItem) -> Self {
        Self {
            permission: item.permission,
            resource: item.resource.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub status: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchCheckRequest {
    #[serde(default)]
    pub bodies: Vec<CheckRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCheckPairDto {
    pub body: CheckRequest,
    pub status: bool,
}

impl From<CheckPair> for BatchCheckPairDto {
    fn from(pair: CheckPair) -> Self {
        Self {
            body: pair.body.into(),
            status: pair.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCheckResponse {
    pub pairs: Vec<BatchCheckPairDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminCheckRequest {
    pub subject: String,
    pub resource: String,
    pub permission: String,
}

// ----------------------------------------------------------------------------
// Policies
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePolicyRequest {
    /// Role id or name.
    pub role_id: String,
    pub resource: String,
    pub principal: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl CreatePolicyRequest {
    pub fn into_new_policy(self) -> Result<NewPolicy, DomainError> {
        Ok(NewPolicy {
            role_id: self.role_id,
            resource: parse_ref(&self.resource)?,
            principal: parse_ref(&self.principal)?,
            title: self.title,
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResponse {
    pub policy: Policy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesResponse {
    pub policies: Vec<Policy>,
}

// ----------------------------------------------------------------------------
// Roles
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl CreateRoleRequest {
    pub fn into_new_role(self, org_id: Option<Uuid>) -> NewRole {
        NewRole {
            name: self.name,
            title: self.title,
            permissions: self.permissions,
            org_id,
            scopes: self.scopes,
            metadata: self.metadata,
        }
    }
}

/// `scopes` given as `?scopes=a,b` or `?scopes=a&scopes=b`.
pub fn scopes_from_query(pairs: &[(String, String)]) -> Vec<String> {
    pairs
        .iter()
        .filter(|(k, _)| k == "scopes")
        .flat_map(|(_, v)| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleResponse {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesResponse {
    pub roles: Vec<Role>,
}

// ----------------------------------------------------------------------------
// Relations
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRelationRequest {
    pub subject: String,
    pub relation: String,
    pub object: String,
    #[serde(default)]
    pub subject_sub_relation: Option<String>,
}

impl CreateRelationRequest {
    pub fn into_new_relation(self) -> Result<NewRelation, DomainError> {
        Ok(NewRelation {
            subject: parse_ref(&self.subject)?,
            relation: self.relation,
            object: parse_ref(&self.object)?,
            subject_sub_relation: self.subject_sub_relation,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationQuery {
    pub subject: Option<String>,
    pub relation: Option<String>,
    pub object: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationResponse {
    pub relation: Relation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationsResponse {
    pub relations: Vec<Relation>,
}

// ----------------------------------------------------------------------------
// Namespaces and permissions
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceResponse {
    pub namespace: Namespace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespacesResponse {
    pub namespaces: Vec<Namespace>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionQuery {
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePermissionRequest {
    pub namespace: String,
    pub verb: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub permission: Permission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsResponse {
    pub permissions: Vec<Permission>,
}

// ----------------------------------------------------------------------------
// Entities
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CascadeResponse {
    pub policies: usize,
    pub relations: usize,
}

impl From<CascadeSummary> for CascadeResponse {
    fn from(s: CascadeSummary) -> Self {
        Self {
            policies: s.policies,
            relations: s.relations,
        }
    }
}
