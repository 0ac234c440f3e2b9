//! In-memory storage backing every repository trait.
//!
//! Namespaces, permissions and policies live in `DashMap`s. Relations and
//! roles need multi-key indexes that must change together, so each sits
//! behind a single `parking_lot::RwLock`: a triple write takes the write
//! lock once, and readers never see a half-indexed edge.
//!
//! The role lock also orders the reference checks. Role removal holds it
//! exclusively while scanning policies and rolebinding edges, policy insert
//! holds it shared while checking the role exists, and permission removal
//! holds it shared while scanning role entries. Locks are taken in the order
//! roles, then the `DashMap`s, then relations.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use authz_engine_sdk::{
    Namespace, NewRelation, Permission, Policy, Relation, RelationFilter, Role,
    WILDCARD_PERMISSION,
};
use dashmap::DashMap;
use frontier_security::ObjectRef;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::namespace_registry::{ADMINISTER_VERB, permission_key, split_permission_key};
use crate::domain::policy_store::{ROLE_RELATION, role_ref};
use crate::domain::repo::{
    NamespaceRepository, PolicyQuery, PolicyRepository, RelationRepository, RoleRepository,
};

type Triple = (ObjectRef, String, ObjectRef);

#[derive(Default)]
struct RelationIndex {
    by_id: HashMap<Uuid, Relation>,
    by_triple: HashMap<Triple, Uuid>,
    by_object: HashMap<ObjectRef, HashSet<Uuid>>,
    by_subject: HashMap<ObjectRef, HashSet<Uuid>>,
}

impl RelationIndex {
    fn insert(&mut self, relation: Relation) {
        let id = relation.id;
        self.by_triple.insert(
            (
                relation.subject.clone(),
                relation.relation.clone(),
                relation.object.clone(),
            ),
            id,
        );
        self.by_object
            .entry(relation.object.clone())
            .or_default()
            .insert(id);
        self.by_subject
            .entry(relation.subject.clone())
            .or_default()
            .insert(id);
        self.by_id.insert(id, relation);
    }

    fn remove(&mut self, id: Uuid) -> Option<Relation> {
        let relation = self.by_id.remove(&id)?;
        self.by_triple.remove(&(
            relation.subject.clone(),
            relation.relation.clone(),
            relation.object.clone(),
        ));
        if let Some(ids) = self.by_object.get_mut(&relation.object) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_object.remove(&relation.object);
            }
        }
        if let Some(ids) = self.by_subject.get_mut(&relation.subject) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_subject.remove(&relation.subject);
            }
        }
        Some(relation)
    }

    fn candidates(&self, filter: &RelationFilter) -> Vec<&Relation> {
        let ids: Box<dyn Iterator<Item = &Uuid>> = match (&filter.object, &filter.subject) {
            (Some(object), _) => Box::new(self.by_object.get(object).into_iter().flatten()),
            (None, Some(subject)) => Box::new(self.by_subject.get(subject).into_iter().flatten()),
            (None, None) => Box::new(self.by_id.keys()),
        };
        ids.filter_map(|id| self.by_id.get(id))
            .filter(|r| filter.object.as_ref().is_none_or(|o| &r.object == o))
            .filter(|r| filter.subject.as_ref().is_none_or(|s| &r.subject == s))
            .filter(|r| filter.relation.as_ref().is_none_or(|n| &r.relation == n))
            .collect()
    }
}

#[derive(Default)]
struct RoleTable {
    by_id: HashMap<Uuid, Role>,
    by_name: HashMap<(Option<Uuid>, String), Uuid>,
}

/// Process-local storage for the whole access graph.
#[derive(Default)]
pub struct InMemoryStorage {
    namespaces: DashMap<String, Namespace>,
    permissions: DashMap<String, Permission>,
    relations: RwLock<RelationIndex>,
    policies: DashMap<Uuid, Policy>,
    roles: RwLock<RoleTable>,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every role entry must name a declared permission, `*`, or the implied
    /// `administer` verb of a registered namespace. Callers hold the role lock.
    fn check_role_permissions(&self, role: &Role) -> Result<(), DomainError> {
        for key in &role.permissions {
            if key == WILDCARD_PERMISSION || self.permissions.contains_key(key) {
                continue;
            }
            let parsed = split_permission_key(key);
            if let Some((namespace, verb)) = &parsed
                && *verb == ADMINISTER_VERB
                && self.namespaces.contains_key(namespace)
            {
                continue;
            }
            return Err(DomainError::permission_not_found(
                key.clone(),
                parsed.map_or_else(String::new, |(ns, _)| ns),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NamespaceRepository for InMemoryStorage {
    async fn upsert_namespace(&self, name: &str) -> Result<Namespace, DomainError> {
        let entry = self
            .namespaces
            .entry(name.to_owned())
            .or_insert_with(|| Namespace {
                id: Uuid::new_v4(),
                name: name.to_owned(),
            });
        Ok(entry.value().clone())
    }

    async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>, DomainError> {
        Ok(self.namespaces.get(name).map(|n| n.value().clone()))
    }

    async fn find_namespace_by_id(&self, id: Uuid) -> Result<Option<Namespace>, DomainError> {
        Ok(self
            .namespaces
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.value().clone()))
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, DomainError> {
        let mut out: Vec<Namespace> = self.namespaces.iter().map(|n| n.value().clone()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn upsert_permission(
        &self,
        namespace: &Namespace,
        verb: &str,
        title: Option<String>,
    ) -> Result<Permission, DomainError> {
        let key = permission_key(&namespace.name, verb);
        let entry = self
            .permissions
            .entry(key.clone())
            .or_insert_with(|| Permission {
                id: Uuid::new_v4(),
                namespace_id: namespace.id,
                namespace: namespace.name.clone(),
                verb: verb.to_owned(),
                key,
                title,
            });
        Ok(entry.value().clone())
    }

    async fn find_permission(&self, key: &str) -> Result<Option<Permission>, DomainError> {
        Ok(self.permissions.get(key).map(|p| p.value().clone()))
    }

    async fn list_permissions(
        &self,
        namespace_id: Option<Uuid>,
    ) -> Result<Vec<Permission>, DomainError> {
        let mut out: Vec<Permission> = self
            .permissions
            .iter()
            .filter(|p| namespace_id.is_none_or(|id| p.namespace_id == id))
            .map(|p| p.value().clone())
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    async fn delete_permission(&self, key: &str) -> Result<bool, DomainError> {
        let roles = self.roles.read();
        if let Some(role) = roles
            .by_id
            .values()
            .find(|r| r.permissions.iter().any(|p| p == key))
        {
            return Err(DomainError::conflict(format!(
                "permission '{key}' is referenced by role '{}'",
                role.name
            )));
        }
        Ok(self.permissions.remove(key).is_some())
    }
}

#[async_trait]
impl RelationRepository for InMemoryStorage {
    async fn put(&self, relation: NewRelation) -> Result<Relation, DomainError> {
        let triple = (
            relation.subject.clone(),
            relation.relation.clone(),
            relation.object.clone(),
        );
        let mut index = self.relations.write();
        if let Some(existing) = index.by_triple.get(&triple).and_then(|id| index.by_id.get(id)) {
            return Ok(existing.clone());
        }
        let stored = Relation {
            id: Uuid::new_v4(),
            subject: relation.subject,
            relation: relation.relation,
            object: relation.object,
            subject_sub_relation: relation.subject_sub_relation,
        };
        index.insert(stored.clone());
        Ok(stored)
    }

    async fn delete(
        &self,
        subject: &ObjectRef,
        relation: &str,
        object: &ObjectRef,
    ) -> Result<bool, DomainError> {
        let triple = (subject.clone(), relation.to_owned(), object.clone());
        let mut index = self.relations.write();
        let Some(id) = index.by_triple.get(&triple).copied() else {
            return Ok(false);
        };
        Ok(index.remove(id).is_some())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Relation>, DomainError> {
        Ok(self.relations.read().by_id.get(&id).cloned())
    }

    async fn list(&self, filter: &RelationFilter) -> Result<Vec<Relation>, DomainError> {
        let index = self.relations.read();
        let mut out: Vec<Relation> = index.candidates(filter).into_iter().cloned().collect();
        out.sort_by(|a, b| {
            (&a.object, &a.relation, &a.subject).cmp(&(&b.object, &b.relation, &b.subject))
        });
        Ok(out)
    }

    async fn delete_by_object(&self, object: &ObjectRef) -> Result<usize, DomainError> {
        let mut index = self.relations.write();
        let ids: Vec<Uuid> = index
            .by_object
            .get(object)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        Ok(ids.into_iter().filter_map(|id| index.remove(id)).count())
    }

    async fn delete_by_subject(&self, subject: &ObjectRef) -> Result<usize, DomainError> {
        let mut index = self.relations.write();
        let ids: Vec<Uuid> = index
            .by_subject
            .get(subject)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        Ok(ids.into_iter().filter_map(|id| index.remove(id)).count())
    }
}

#[async_trait]
impl PolicyRepository for InMemoryStorage {
    async fn insert(&self, policy: Policy) -> Result<(), DomainError> {
        let roles = self.roles.read();
        if !roles.by_id.contains_key(&policy.role_id) {
            return Err(DomainError::not_found("role", policy.role_id));
        }
        self.policies.insert(policy.id, policy);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Policy>, DomainError> {
        Ok(self.policies.get(&id).map(|p| p.value().clone()))
    }

    async fn remove(&self, id: Uuid) -> Result<Option<Policy>, DomainError> {
        Ok(self.policies.remove(&id).map(|(_, p)| p))
    }

    async fn list(&self, query: &PolicyQuery) -> Result<Vec<Policy>, DomainError> {
        let mut out: Vec<Policy> = self
            .policies
            .iter()
            .filter(|p| query.resource.as_ref().is_none_or(|r| &p.resource == r))
            .filter(|p| query.principal.as_ref().is_none_or(|s| &p.principal == s))
            .filter(|p| query.role_id.is_none_or(|id| p.role_id == id))
            .map(|p| p.value().clone())
            .collect();
        out.sort_by(|a, b| {
            (&a.resource, &a.principal, a.id).cmp(&(&b.resource, &b.principal, b.id))
        });
        Ok(out)
    }
}

#[async_trait]
impl RoleRepository for InMemoryStorage {
    async fn insert(&self, role: Role) -> Result<(), DomainError> {
        let mut table = self.roles.write();
        self.check_role_permissions(&role)?;
        let name_key = (role.org_id, role.name.clone());
        if table.by_name.contains_key(&name_key) {
            return Err(DomainError::conflict(format!(
                "role '{}' already exists in this scope",
                role.name
            )));
        }
        table.by_name.insert(name_key, role.id);
        table.by_id.insert(role.id, role);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Role>, DomainError> {
        Ok(self.roles.read().by_id.get(&id).cloned())
    }

    async fn find_by_name(
        &self,
        name: &str,
        org_id: Option<Uuid>,
    ) -> Result<Option<Role>, DomainError> {
        let table = self.roles.read();
        Ok(table
            .by_name
            .get(&(org_id, name.to_owned()))
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Role>, DomainError> {
        let mut out: Vec<Role> = self.roles.read().by_id.values().cloned().collect();
        out.sort_by(|a, b| (a.org_id, &a.name).cmp(&(b.org_id, &b.name)));
        Ok(out)
    }

    async fn update(&self, role: Role) -> Result<(), DomainError> {
        let mut table = self.roles.write();
        let Some(current) = table.by_id.get(&role.id) else {
            return Err(DomainError::not_found("role", role.id));
        };
        self.check_role_permissions(&role)?;
        let old_key = (current.org_id, current.name.clone());
        let new_key = (role.org_id, role.name.clone());
        if old_key != new_key {
            if table.by_name.contains_key(&new_key) {
                return Err(DomainError::conflict(format!(
                    "role '{}' already exists in this scope",
                    role.name
                )));
            }
            table.by_name.remove(&old_key);
            table.by_name.insert(new_key, role.id);
        }
        table.by_id.insert(role.id, role);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<Option<Role>, DomainError> {
        let mut table = self.roles.write();
        let Some(role) = table.by_id.get(&id) else {
            return Ok(None);
        };
        let policies = self.policies.iter().filter(|p| p.role_id == id).count();
        let bindings = {
            let index = self.relations.read();
            index
                .by_subject
                .get(&role_ref(id))
                .map_or(0, |ids| {
                    ids.iter()
                        .filter_map(|rid| index.by_id.get(rid))
                        .filter(|r| r.relation == ROLE_RELATION)
                        .count()
                })
        };
        if policies > 0 || bindings > 0 {
            return Err(DomainError::conflict(format!(
                "role '{}' is still bound by {} policies",
                role.name,
                policies.max(bindings)
            )));
        }
        let Some(role) = table.by_id.remove(&id) else {
            return Ok(None);
        };
        table.by_name.remove(&(role.org_id, role.name.clone()));
        Ok(Some(role))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use futures::future;

    use super::*;

    fn edge(subject: &str, relation: &str, object: &str) -> NewRelation {
        NewRelation {
            subject: ObjectRef::parse(subject).unwrap(),
            relation: relation.to_owned(),
            object: ObjectRef::parse(object).unwrap(),
            subject_sub_relation: None,
        }
    }

    #[tokio::test]
    async fn relation_put_is_keyed_on_triple() {
        let store = InMemoryStorage::new();
        let a = store.put(edge("user:u1", "member", "group:g1")).await.unwrap();
        let b = store.put(edge("user:u1", "member", "group:g1")).await.unwrap();
        assert_eq!(a.id, b.id);

        let all = RelationRepository::list(&store, &RelationFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_keep_one_edge_per_triple() {
        let store = Arc::new(InMemoryStorage::new());
        let subject = ObjectRef::parse("user:u1").unwrap();
        let object = ObjectRef::parse("group:g1").unwrap();

        let tasks = (0..64).map(|i| {
            let store = store.clone();
            let subject = subject.clone();
            let object = object.clone();
            tokio::spawn(async move {
                if i % 3 == 0 {
                    store.delete(&subject, "member", &object).await.unwrap();
                } else {
                    store.put(edge("user:u1", "member", "group:g1")).await.unwrap();
                }
                let seen = RelationRepository::list(
                    store.as_ref(),
                    &RelationFilter {
                        subject: Some(subject),
                        ..RelationFilter::default()
                    },
                )
                .await
                .unwrap();
                assert!(seen.len() <= 1, "duplicate edges: {seen:?}");
            })
        });
        for result in future::join_all(tasks).await {
            result.unwrap();
        }

        let index = store.relations.read();
        assert!(index.by_triple.len() <= 1);
        assert_eq!(index.by_id.len(), index.by_triple.len());
        for (id, rel) in &index.by_id {
            assert!(index.by_object[&rel.object].contains(id));
            assert!(index.by_subject[&rel.subject].contains(id));
        }
        assert_eq!(
            index.by_object.values().map(HashSet::len).sum::<usize>(),
            index.by_id.len()
        );
        assert_eq!(
            index.by_subject.values().map(HashSet::len).sum::<usize>(),
            index.by_id.len()
        );
    }

    #[tokio::test]
    async fn relation_indexes_follow_deletes() {
        let store = InMemoryStorage::new();
        store.put(edge("user:u1", "member", "group:g1")).await.unwrap();
        store.put(edge("user:u2", "member", "group:g1")).await.unwrap();
        store.put(edge("user:u1", "member", "group:g2")).await.unwrap();

        let removed = store
            .delete_by_subject(&ObjectRef::parse("user:u1").unwrap())
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let by_group = RelationRepository::list(
            &store,
            &RelationFilter {
                object: Some(ObjectRef::parse("group:g1").unwrap()),
                ..RelationFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_group.len(), 1);
        assert_eq!(by_group[0].subject.id(), "u2");

        assert!(
            !store
                .delete(
                    &ObjectRef::parse("user:u1").unwrap(),
                    "member",
                    &ObjectRef::parse("group:g1").unwrap()
                )
                .await
                .unwrap()
        );
    }

    fn role(name: &str, org_id: Option<Uuid>) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            title: None,
            permissions: vec!["*".to_owned()],
            org_id,
            scopes: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn role_names_are_unique_per_org_scope() {
        let store = InMemoryStorage::new();
        let org = Uuid::new_v4();
        RoleRepository::insert(&store, role("admin", None))
            .await
            .unwrap();
        RoleRepository::insert(&store, role("admin", Some(org)))
            .await
            .unwrap();

        let err = RoleRepository::insert(&store, role("admin", Some(org)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(RoleRepository::list(&store).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn role_rename_moves_name_index() {
        let store = InMemoryStorage::new();
        let mut r = role("viewer", None);
        RoleRepository::insert(&store, r.clone()).await.unwrap();
        RoleRepository::insert(&store, role("editor", None)).await.unwrap();

        r.name = "editor".to_owned();
        let err = store.update(r.clone()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        r.name = "reader".to_owned();
        store.update(r.clone()).await.unwrap();
        assert!(store.find_by_name("viewer", None).await.unwrap().is_none());
        assert_eq!(
            store.find_by_name("reader", None).await.unwrap().map(|r| r.id),
            Some(r.id)
        );
    }

    fn policy(role_id: Uuid) -> Policy {
        Policy {
            id: Uuid::new_v4(),
            role_id,
            resource: ObjectRef::parse("app/project:p1").unwrap(),
            principal: ObjectRef::parse("app/user:u1").unwrap(),
            title: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn role_removal_is_refused_while_bound() {
        let store = InMemoryStorage::new();
        let r = role("viewer", None);
        RoleRepository::insert(&store, r.clone()).await.unwrap();

        let p = policy(r.id);
        PolicyRepository::insert(&store, p.clone()).await.unwrap();
        assert!(matches!(
            RoleRepository::remove(&store, r.id).await,
            Err(DomainError::Conflict(_))
        ));
        PolicyRepository::remove(&store, p.id).await.unwrap();

        let binding = NewRelation {
            subject: role_ref(r.id),
            relation: ROLE_RELATION.to_owned(),
            object: ObjectRef::parse("app/rolebinding:b1").unwrap(),
            subject_sub_relation: None,
        };
        store.put(binding.clone()).await.unwrap();
        assert!(matches!(
            RoleRepository::remove(&store, r.id).await,
            Err(DomainError::Conflict(_))
        ));
        store
            .delete(&binding.subject, &binding.relation, &binding.object)
            .await
            .unwrap();

        let removed = RoleRepository::remove(&store, r.id).await.unwrap();
        assert_eq!(removed.map(|r| r.id), Some(r.id));
        assert!(matches!(
            PolicyRepository::insert(&store, policy(r.id)).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_role_removal_never_orphans_a_policy() {
        for _ in 0..32 {
            let store = Arc::new(InMemoryStorage::new());
            let r = role("viewer", None);
            let role_id = r.id;
            RoleRepository::insert(store.as_ref(), r).await.unwrap();

            let inserts = (0..8).map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    match PolicyRepository::insert(store.as_ref(), policy(role_id)).await {
                        Ok(()) | Err(DomainError::NotFound { .. }) => {}
                        Err(e) => panic!("unexpected insert error: {e}"),
                    }
                })
            });
            let removal = {
                let store = store.clone();
                tokio::spawn(async move {
                    match RoleRepository::remove(store.as_ref(), role_id).await {
                        Ok(_) | Err(DomainError::Conflict(_)) => {}
                        Err(e) => panic!("unexpected remove error: {e}"),
                    }
                })
            };
            for result in future::join_all(inserts).await {
                result.unwrap();
            }
            removal.await.unwrap();

            let role_left = RoleRepository::get(store.as_ref(), role_id)
                .await
                .unwrap()
                .is_some();
            let policies = PolicyRepository::list(
                store.as_ref(),
                &PolicyQuery {
                    role_id: Some(role_id),
                    ..PolicyQuery::default()
                },
            )
            .await
            .unwrap();
            assert!(role_left || policies.is_empty());
        }
    }

    #[tokio::test]
    async fn permission_removal_is_refused_while_listed() {
        let store = InMemoryStorage::new();
        let ns = store.upsert_namespace("app/project").await.unwrap();
        store.upsert_permission(&ns, "get", None).await.unwrap();

        let mut r = role("reader", None);
        r.permissions = vec![
            "app.project.get".to_owned(),
            "app.project.administer".to_owned(),
        ];
        RoleRepository::insert(&store, r.clone()).await.unwrap();
        assert!(matches!(
            store.delete_permission("app.project.get").await,
            Err(DomainError::Conflict(_))
        ));

        r.permissions = vec![WILDCARD_PERMISSION.to_owned()];
        store.update(r.clone()).await.unwrap();
        assert!(store.delete_permission("app.project.get").await.unwrap());

        r.permissions = vec!["app.project.get".to_owned()];
        assert!(matches!(
            store.update(r).await,
            Err(DomainError::PermissionNotFound { .. })
        ));
        let mut late = role("late", None);
        late.permissions = vec!["app.project.get".to_owned()];
        assert!(matches!(
            RoleRepository::insert(&store, late).await,
            Err(DomainError::PermissionNotFound { .. })
        ));
    }
}
