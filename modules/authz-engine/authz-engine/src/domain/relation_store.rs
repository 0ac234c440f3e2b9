//! Subject -> relation -> object triples and the traversals built on them.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use authz_engine_sdk::{NewRelation, Relation, RelationFilter};
use frontier_security::{ObjectRef, namespaces};
use tracing::debug;
use uuid::Uuid;

use super::error::DomainError;
use super::repo::RelationRepository;

/// Group and organization membership.
pub const MEMBER_RELATION: &str = "member";
/// Platform administration, held on `app/platform:platform`.
pub const ADMIN_RELATION: &str = "admin";

/// Depth limits and parent edges used by the traversals.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    pub max_group_depth: usize,
    pub max_ancestor_depth: usize,
    pub parent_relations: Vec<String>,
}

impl From<&crate::config::EngineConfig> for TraversalConfig {
    fn from(cfg: &crate::config::EngineConfig) -> Self {
        Self {
            max_group_depth: cfg.max_group_depth,
            max_ancestor_depth: cfg.max_ancestor_depth,
            parent_relations: cfg.parent_relations.clone(),
        }
    }
}

fn validate_relation_name(relation: &str) -> Result<(), DomainError> {
    if relation.is_empty() || relation.chars().any(|c| c.is_whitespace() || c == ':') {
        return Err(DomainError::invalid_argument(format!(
            "invalid relation name '{relation}'"
        )));
    }
    Ok(())
}

pub struct RelationStore {
    repo: Arc<dyn RelationRepository>,
    config: TraversalConfig,
}

impl RelationStore {
    #[must_use]
    pub fn new(repo: Arc<dyn RelationRepository>, config: TraversalConfig) -> Self {
        Self { repo, config }
    }

    /// Insert a triple, or return the one already stored.
    pub async fn put(&self, relation: NewRelation) -> Result<Relation, DomainError> {
        validate_relation_name(&relation.relation)?;
        let stored = self.repo.put(relation).await?;
        debug!(
            subject = %stored.subject,
            relation = %stored.relation,
            object = %stored.object,
            "relation stored"
        );
        Ok(stored)
    }

    /// Remove a triple. Removing a missing triple succeeds.
    pub async fn delete(
        &self,
        subject: &ObjectRef,
        relation: &str,
        object: &ObjectRef,
    ) -> Result<(), DomainError> {
        let removed = self.repo.delete(subject, relation, object).await?;
        debug!(%subject, relation, %object, removed, "relation delete");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Relation, DomainError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("relation", id))
    }

    pub async fn list(&self, filter: &RelationFilter) -> Result<Vec<Relation>, DomainError> {
        self.repo.list(filter).await
    }

    pub async fn exists(
        &self,
        subject: &ObjectRef,
        relation: &str,
        object: &ObjectRef,
    ) -> Result<bool, DomainError> {
        let found = self
            .repo
            .list(&RelationFilter {
                subject: Some(subject.clone()),
                relation: Some(relation.to_owned()),
                object: Some(object.clone()),
            })
            .await?;
        Ok(!found.is_empty())
    }

    /// Direct subjects holding `relation` on `object`.
    pub async fn subjects(
        &self,
        object: &ObjectRef,
        relation: &str,
    ) -> Result<Vec<ObjectRef>, DomainError> {
        let found = self
            .repo
            .list(&RelationFilter {
                object: Some(object.clone()),
                relation: Some(relation.to_owned()),
                subject: None,
            })
            .await?;
        Ok(found.into_iter().map(|r| r.subject).collect())
    }

    /// Objects on which `subject` directly holds `relation`.
    pub async fn objects(
        &self,
        subject: &ObjectRef,
        relation: &str,
    ) -> Result<Vec<ObjectRef>, DomainError> {
        let found = self
            .repo
            .list(&RelationFilter {
                subject: Some(subject.clone()),
                relation: Some(relation.to_owned()),
                object: None,
            })
            .await?;
        Ok(found.into_iter().map(|r| r.object).collect())
    }

    /// Every subject reaching `object` through `relation`, with group
    /// subjects expanded to their members.
    ///
    /// Groups stay in the result alongside their members. Each group to
    /// member step is one hop; expansion stops after `max_group_depth` hops
    /// (one by default, so groups nested in groups are not followed) and
    /// never revisits a group.
    pub async fn expand_subject_closure(
        &self,
        object: &ObjectRef,
        relation: &str,
    ) -> Result<HashSet<ObjectRef>, DomainError> {
        let mut out = HashSet::new();
        let mut expanded = HashSet::from([object.clone()]);
        let mut queue = VecDeque::from([(object.clone(), relation.to_owned(), 0_usize)]);

        while let Some((current, rel, depth)) = queue.pop_front() {
            for subject in self.subjects(&current, &rel).await? {
                if depth < self.config.max_group_depth
                    && subject.is_in(namespaces::GROUP)
                    && expanded.insert(subject.clone())
                {
                    queue.push_back((subject.clone(), MEMBER_RELATION.to_owned(), depth + 1));
                }
                out.insert(subject);
            }
        }
        Ok(out)
    }

    /// Groups `subject` belongs to. Memberships of those groups in further
    /// groups count only when `max_group_depth` allows more than one hop.
    pub async fn subject_memberships(
        &self,
        subject: &ObjectRef,
    ) -> Result<HashSet<ObjectRef>, DomainError> {
        let mut out = HashSet::new();
        let mut seen = HashSet::from([subject.clone()]);
        let mut queue = VecDeque::from([(subject.clone(), 0_usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= self.config.max_group_depth {
                continue;
            }
            for group in self.objects(&current, MEMBER_RELATION).await? {
                if group.is_in(namespaces::GROUP) && seen.insert(group.clone()) {
                    out.insert(group.clone());
                    queue.push_back((group, depth + 1));
                }
            }
        }
        Ok(out)
    }

    /// Immediate parents of `object` over the configured parent relations.
    pub async fn parents(&self, object: &ObjectRef) -> Result<Vec<ObjectRef>, DomainError> {
        let mut out = Vec::new();
        for relation in &self.config.parent_relations {
            for parent in self.subjects(object, relation).await? {
                if !out.contains(&parent) {
                    out.push(parent);
                }
            }
        }
        Ok(out)
    }

    /// Ancestors of `object`, closest first, excluding `object` itself.
    pub async fn ancestors(&self, object: &ObjectRef) -> Result<Vec<ObjectRef>, DomainError> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([object.clone()]);
        let mut queue = VecDeque::from([(object.clone(), 0_usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= self.config.max_ancestor_depth {
                continue;
            }
            for parent in self.parents(&current).await? {
                if seen.insert(parent.clone()) {
                    out.push(parent.clone());
                    queue.push_back((parent, depth + 1));
                }
            }
        }
        Ok(out)
    }

    pub async fn delete_by_object(&self, object: &ObjectRef) -> Result<usize, DomainError> {
        self.repo.delete_by_object(object).await
    }

    pub async fn delete_by_subject(&self, subject: &ObjectRef) -> Result<usize, DomainError> {
        self.repo.delete_by_subject(subject).await
    }
}
