//! Built-in Frontier schema seeded at startup.
//!
//! Seeding is idempotent: namespaces and permissions are upserted, roles that
//! already exist by name are rewritten in place so their ids stay stable, and
//! superuser relations are plain relation upserts.

use authz_engine_sdk::{NewRelation, NewRole};
use frontier_security::{ObjectRef, namespaces};
use tracing::info;

use super::error::DomainError;
use super::relation_store::ADMIN_RELATION;
use super::service::Service;
use crate::config::{BootstrapConfig, NamespaceDefinition, RoleDefinition};

struct PredefinedNamespace {
    name: &'static str,
    verbs: &'static [&'static str],
}

struct PredefinedRole {
    name: &'static str,
    title: &'static str,
    permissions: &'static [&'static str],
    scope: &'static str,
}

const NAMESPACES: &[PredefinedNamespace] = &[
    PredefinedNamespace {
        name: namespaces::PLATFORM,
        verbs: &["superuser", "check"],
    },
    PredefinedNamespace {
        name: namespaces::ORGANIZATION,
        verbs: &[
            "delete",
            "update",
            "get",
            "rolemanage",
            "policymanage",
            "projectlist",
            "grouplist",
            "projectcreate",
            "groupcreate",
            "invitationlist",
            "invitationcreate",
            "serviceusermanage",
        ],
    },
    PredefinedNamespace {
        name: namespaces::PROJECT,
        verbs: &["delete", "update", "get", "resourcelist", "policymanage"],
    },
    PredefinedNamespace {
        name: namespaces::GROUP,
        verbs: &["delete", "update", "get"],
    },
    PredefinedNamespace {
        name: namespaces::USER,
        verbs: &[],
    },
    PredefinedNamespace {
        name: namespaces::SERVICE_USER,
        verbs: &[],
    },
    PredefinedNamespace {
        name: namespaces::SUPERUSER,
        verbs: &[],
    },
    PredefinedNamespace {
        name: namespaces::ROLE,
        verbs: &[],
    },
    PredefinedNamespace {
        name: namespaces::ROLE_BINDING,
        verbs: &[],
    },
];

// Owners also administer the children of what they own, since grants on an
// ancestor are matched against the child's permission key.
const ROLES: &[PredefinedRole] = &[
    PredefinedRole {
        name: "app_organization_owner",
        title: "Organization Owner",
        permissions: &[
            "app_organization_administer",
            "app_project_administer",
            "app_group_administer",
        ],
        scope: namespaces::ORGANIZATION,
    },
    PredefinedRole {
        name: "app_organization_manager",
        title: "Organization Manager",
        permissions: &[
            "app_organization_update",
            "app_organization_get",
            "app_organization_projectcreate",
            "app_organization_projectlist",
            "app_organization_groupcreate",
            "app_organization_grouplist",
            "app_organization_serviceusermanage",
        ],
        scope: namespaces::ORGANIZATION,
    },
    PredefinedRole {
        name: "app_organization_accessmanager",
        title: "Organization Access Manager",
        permissions: &[
            "app_organization_invitationcreate",
            "app_organization_invitationlist",
            "app_organization_rolemanage",
            "app_organization_policymanage",
        ],
        scope: namespaces::ORGANIZATION,
    },
    PredefinedRole {
        name: "app_organization_viewer",
        title: "Organization Viewer",
        permissions: &["app_organization_get"],
        scope: namespaces::ORGANIZATION,
    },
    PredefinedRole {
        name: "app_project_owner",
        title: "Project Owner",
        permissions: &["app_project_administer"],
        scope: namespaces::PROJECT,
    },
    PredefinedRole {
        name: "app_project_manager",
        title: "Project Manager",
        permissions: &[
            "app_project_update",
            "app_project_get",
            "app_project_resourcelist",
            "app_organization_projectcreate",
            "app_organization_projectlist",
            "app_organization_grouplist",
        ],
        scope: namespaces::PROJECT,
    },
    PredefinedRole {
        name: "app_project_viewer",
        title: "Project Viewer",
        permissions: &["app_project_get"],
        scope: namespaces::PROJECT,
    },
    PredefinedRole {
        name: "app_group_owner",
        title: "Group Owner",
        permissions: &["app_group_administer"],
        scope: namespaces::GROUP,
    },
    PredefinedRole {
        name: "app_group_member",
        title: "Group Member",
        permissions: &["app_group_get"],
        scope: namespaces::GROUP,
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub namespaces: usize,
    pub permissions: usize,
    pub roles: usize,
    pub superusers: usize,
}

/// Seed the built-in schema, then the configured extras.
#[tracing::instrument(skip_all)]
pub async fn apply(svc: &Service, cfg: &BootstrapConfig) -> Result<BootstrapSummary, DomainError> {
    let mut summary = BootstrapSummary::default();

    for ns in NAMESPACES {
        summary.permissions += seed_namespace(svc, ns.name, ns.verbs.iter().copied()).await?;
        summary.namespaces += 1;
    }
    for NamespaceDefinition { name, permissions } in &cfg.namespaces {
        summary.permissions +=
            seed_namespace(svc, name, permissions.iter().map(String::as_str)).await?;
        summary.namespaces += 1;
    }

    for role in ROLES {
        seed_role(
            svc,
            NewRole {
                name: role.name.to_owned(),
                title: Some(role.title.to_owned()),
                permissions: role.permissions.iter().map(|p| (*p).to_owned()).collect(),
                scopes: vec![role.scope.to_owned()],
                ..NewRole::default()
            },
        )
        .await?;
        summary.roles += 1;
    }
    for RoleDefinition {
        name,
        title,
        permissions,
        scopes,
    } in &cfg.roles
    {
        seed_role(
            svc,
            NewRole {
                name: name.clone(),
                title: title.clone(),
                permissions: permissions.clone(),
                scopes: scopes.clone(),
                ..NewRole::default()
            },
        )
        .await?;
        summary.roles += 1;
    }

    for raw in &cfg.superusers {
        let principal = ObjectRef::parse(raw)?;
        svc.relations()
            .put(NewRelation {
                subject: principal,
                relation: ADMIN_RELATION.to_owned(),
                object: ObjectRef::platform(),
                subject_sub_relation: None,
            })
            .await?;
        summary.superusers += 1;
    }

    info!(
        namespaces = summary.namespaces,
        permissions = summary.permissions,
        roles = summary.roles,
        superusers = summary.superusers,
        "bootstrap applied"
    );
    Ok(summary)
}

async fn seed_namespace<'a>(
    svc: &Service,
    name: &str,
    verbs: impl Iterator<Item = &'a str>,
) -> Result<usize, DomainError> {
    let registry = svc.namespaces();
    registry.register(name).await?;
    let mut count = 0;
    for verb in verbs {
        registry.create_permission(name, verb, None).await?;
        count += 1;
    }
    Ok(count)
}

async fn seed_role(svc: &Service, role: NewRole) -> Result<(), DomainError> {
    let roles = svc.roles();
    match roles.get(&role.name, None).await {
        Ok(existing) => {
            roles.update(existing.id, role).await?;
        }
        Err(DomainError::NotFound { .. }) => {
            roles.create(role).await?;
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
