#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end behavior of the in-process client.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use authz_engine_sdk::{
    AuthzEngineClient, AuthzError, CheckItem, NewPolicy, NewRelation, NewRole, RelationFilter,
};
use frontier_security::RequestContext;
use uuid::Uuid;

use common::{as_principal, engine, r, root_ctx};

fn link(subject: &str, relation: &str, object: &str) -> NewRelation {
    NewRelation {
        subject: r(subject),
        relation: relation.to_owned(),
        object: r(object),
        subject_sub_relation: None,
    }
}

fn policy(role: &str, resource: &str, principal: &str) -> NewPolicy {
    NewPolicy {
        role_id: role.to_owned(),
        resource: r(resource),
        principal: r(principal),
        title: None,
        metadata: HashMap::new(),
    }
}

async fn allowed(
    client: &Arc<dyn AuthzEngineClient>,
    who: &str,
    permission: &str,
    on: &str,
) -> bool {
    client
        .check(&as_principal(who), permission, &r(on))
        .await
        .unwrap()
}

#[tokio::test]
async fn relation_creation_is_idempotent() {
    let engine = engine().await;
    let client = engine.client();
    let root = root_ctx();

    let a = client
        .create_relation(&root, link("user:u1", "member", "group:g1"))
        .await
        .unwrap();
    let b = client
        .create_relation(&root, link("app/user:u1", "member", "app/group:g1"))
        .await
        .unwrap();
    assert_eq!(a.id, b.id);

    let all = engine
        .service()
        .list_relations(&root, &RelationFilter {
            subject: Some(r("user:u1")),
            ..RelationFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn relation_deletion_is_idempotent() {
    let engine = engine().await;
    let client = engine.client();
    let root = root_ctx();

    client
        .create_relation(&root, link("user:u1", "member", "group:g1"))
        .await
        .unwrap();
    for _ in 0..2 {
        client
            .delete_relation(&root, &r("user:u1"), "member", &r("group:g1"))
            .await
            .unwrap();
    }
    client
        .delete_relation(&root, &r("user:nobody"), "member", &r("group:g1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn policy_equals_its_three_edges() {
    let engine = engine().await;
    let client = engine.client();
    let root = root_ctx();

    let created = client
        .create_policy(&root, policy("app_project_viewer", "project:p1", "user:u1"))
        .await
        .unwrap();
    assert!(allowed(&client, "user:u1", "get", "project:p1").await);

    let binding = format!("app/rolebinding:{}", created.id);
    let edges = engine
        .service()
        .list_relations(&root, &RelationFilter::default())
        .await
        .unwrap();
    let mine: Vec<_> = edges
        .iter()
        .filter(|e| e.subject.to_string() == binding || e.object.to_string() == binding)
        .collect();
    assert_eq!(mine.len(), 3);

    // the same edges written by hand grant the same access
    client.delete_policy(&root, created.id).await.unwrap();
    assert!(!allowed(&client, "user:u1", "get", "project:p1").await);

    let manual = format!("app/rolebinding:{}", Uuid::new_v4());
    let role = format!("app/role:{}", created.role_id);
    for edge in [
        link("user:u1", "bearer", &manual),
        link(&role, "role", &manual),
        link(&manual, "granted", "project:p1"),
    ] {
        client.create_relation(&root, edge).await.unwrap();
    }
    assert!(allowed(&client, "user:u1", "get", "project:p1").await);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn deleting_a_policy_revokes_access() {
    let engine = engine().await;
    let client = engine.client();
    let root = root_ctx();

    client
        .create_relation(&root, link("org:o1", "org", "project:p1"))
        .await
        .unwrap();
    let created = client
        .create_policy(&root, policy("app_organization_owner", "org:o1", "user:u1"))
        .await
        .unwrap();
    assert!(allowed(&client, "user:u1", "update", "project:p1").await);

    client.delete_policy(&root, created.id).await.unwrap();
    assert!(!allowed(&client, "user:u1", "update", "project:p1").await);
    assert!(!allowed(&client, "user:u1", "get", "org:o1").await);
}

#[tokio::test]
async fn group_members_inherit_group_grants() {
    let engine = engine().await;
    let client = engine.client();
    let root = root_ctx();

    client
        .create_relation(&root, link("user:u1", "member", "group:g1"))
        .await
        .unwrap();
    client
        .create_policy(&root, policy("app_project_viewer", "project:p1", "group:g1"))
        .await
        .unwrap();
    assert!(allowed(&client, "user:u1", "get", "project:p1").await);
    assert!(!allowed(&client, "user:u2", "get", "project:p1").await);

    client
        .delete_relation(&root, &r("user:u1"), "member", &r("group:g1"))
        .await
        .unwrap();
    assert!(!allowed(&client, "user:u1", "get", "project:p1").await);
}

#[tokio::test]
async fn nested_groups_pass_nothing_down() {
    let engine = engine().await;
    let client = engine.client();
    let root = root_ctx();

    for edge in [
        link("user:u1", "member", "group:g1"),
        link("group:g1", "member", "group:g2"),
        link("group:g2", "member", "group:g3"),
    ] {
        client.create_relation(&root, edge).await.unwrap();
    }
    client
        .create_policy(&root, policy("app_project_viewer", "project:p1", "group:g3"))
        .await
        .unwrap();

    assert!(!allowed(&client, "user:u1", "get", "project:p1").await);
}

#[tokio::test]
async fn wildcard_role_on_org_reaches_child_project() {
    let engine = engine().await;
    let svc = engine.service();
    let client = engine.client();
    let root = root_ctx();

    svc.create_permission(&root, "app/project", "read", None)
        .await
        .unwrap();
    svc.create_role(
        &root,
        NewRole {
            name: "everything".to_owned(),
            permissions: vec!["*".to_owned()],
            scopes: vec!["org".to_owned()],
            ..NewRole::default()
        },
    )
    .await
    .unwrap();
    client
        .create_relation(&root, link("org:o1", "org", "project:p1"))
        .await
        .unwrap();
    client
        .create_policy(&root, policy("everything", "org:o1", "user:u1"))
        .await
        .unwrap();

    assert!(allowed(&client, "user:u1", "project.read", "project:p1").await);
    assert!(!allowed(&client, "user:u1", "project.read", "project:p2").await);
}

#[tokio::test]
async fn batch_answers_in_input_order() {
    let engine = engine().await;
    let client = engine.client();
    let root = root_ctx();

    client
        .create_policy(&root, policy("app_project_manager", "project:p1", "user:u1"))
        .await
        .unwrap();
    let items: Vec<CheckItem> = [
        ("delete", "project:p1"),
        ("update", "project:p1"),
        ("get", "project:p2"),
        ("get", "project:p1"),
    ]
    .into_iter()
    .map(|(permission, resource)| CheckItem {
        permission: permission.to_owned(),
        resource: r(resource),
    })
    .collect();

    let ctx = as_principal("user:u1");
    let pairs = client.batch_check(&ctx, items.clone()).await.unwrap();
    let bodies: Vec<CheckItem> = pairs.iter().map(|p| p.body.clone()).collect();
    assert_eq!(bodies, items);

    for pair in &pairs {
        let single = client
            .check(&ctx, &pair.body.permission, &pair.body.resource)
            .await
            .unwrap();
        assert_eq!(pair.status, single);
    }
    let statuses: Vec<bool> = pairs.iter().map(|p| p.status).collect();
    assert_eq!(statuses, vec![false, true, false, true]);
}

#[tokio::test]
async fn unknown_permission_is_an_error_not_a_denial() {
    let engine = engine().await;
    let client = engine.client();

    let err = client
        .check(&as_principal("user:u1"), "launch", &r("project:p1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::PermissionNotFound(_)));

    // superusers get the same error
    let err = client
        .check(&root_ctx(), "launch", &r("project:p1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::PermissionNotFound(_)));

    // declared, but on the organization namespace
    for permission in ["app.organization.get", "organization.projectcreate"] {
        let err = client
            .check(&as_principal("user:u1"), permission, &r("project:p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::PermissionNotFound(_)), "{permission}");
    }

    let err = client
        .check(&as_principal("user:u1"), "get", &r("compute/instance:i1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::NotFound(_)));
}

#[tokio::test]
async fn anonymous_checks_are_unauthenticated() {
    let engine = engine().await;
    let err = engine
        .client()
        .check(&RequestContext::anonymous(), "get", &r("project:p1"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthzError::Unauthenticated);
}

#[tokio::test]
async fn expired_deadline_is_reported() {
    let engine = engine().await;
    let ctx = RequestContext::builder()
        .principal(r("user:u1"))
        .deadline(std::time::Instant::now())
        .build();
    let err = engine
        .client()
        .check(&ctx, "get", &r("project:p1"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthzError::DeadlineExceeded);
}
