//! In-process Work Store
//!
//! Every mutating call takes the write lock for its whole check-and-write, so
//! the lock plays the role of a serializable transaction.

use super::{PromotionCommit, StoreError, StoreResult, WorkStore};
use crate::model::{PromotionEvent, TierKind, Work, WorkEdge};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    works: HashMap<Uuid, Work>,
    slugs: HashMap<String, Uuid>,
    edges: Vec<WorkEdge>,
    /// Stands in for the (source, target) unique index
    edge_pairs: HashSet<(Uuid, Uuid)>,
    promotions: Vec<PromotionEvent>,
}

impl Tables {
    fn has_history(&self, id: Uuid) -> bool {
        self.edges
            .iter()
            .any(|e| e.source_id == id || e.target_id == id)
            || self.promotions.iter().any(|p| p.work_id == id)
    }
}

/// Work Store held entirely in memory
#[derive(Default)]
pub struct MemoryWorkStore {
    tables: RwLock<Tables>,
}

impl MemoryWorkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(works: &mut [Work]) {
    works.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl WorkStore for MemoryWorkStore {
    async fn insert_work(&self, work: &Work) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.works.contains_key(&work.id) {
            return Err(StoreError::UniqueViolation(format!("works.id {}", work.id)));
        }
        if tables.slugs.contains_key(&work.slug) {
            return Err(StoreError::UniqueViolation(format!("works.slug {}", work.slug)));
        }
        tables.slugs.insert(work.slug.clone(), work.id);
        tables.works.insert(work.id, work.clone());
        Ok(())
    }

    async fn work_by_id(&self, id: Uuid) -> StoreResult<Option<Work>> {
        Ok(self.tables.read().await.works.get(&id).cloned())
    }

    async fn work_by_slug(&self, slug: &str) -> StoreResult<Option<Work>> {
        let tables = self.tables.read().await;
        Ok(tables
            .slugs
            .get(slug)
            .and_then(|id| tables.works.get(id))
            .cloned())
    }

    async fn works_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Work>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.works.get(id))
            .cloned()
            .collect())
    }

    async fn list_works(&self, tier: Option<TierKind>) -> StoreResult<Vec<Work>> {
        let tables = self.tables.read().await;
        let mut works: Vec<Work> = tables
            .works
            .values()
            .filter(|w| tier.map_or(true, |t| w.tier_kind() == t))
            .cloned()
            .collect();
        newest_first(&mut works);
        Ok(works)
    }

    async fn delete_work(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(work) = tables.works.get(&id) else {
            return Ok(false);
        };
        if work.is_canon() || tables.has_history(id) {
            return Err(StoreError::HasHistory(id));
        }
        let slug = work.slug.clone();
        tables.works.remove(&id);
        tables.slugs.remove(&slug);
        Ok(true)
    }

    async fn edges_into(&self, id: Uuid) -> StoreResult<Vec<WorkEdge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .edges
            .iter()
            .filter(|e| e.target_id == id)
            .cloned()
            .collect())
    }

    async fn edges_out_of(&self, id: Uuid) -> StoreResult<Vec<WorkEdge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .edges
            .iter()
            .filter(|e| e.source_id == id)
            .cloned()
            .collect())
    }

    async fn edge_between(&self, source_id: Uuid, target_id: Uuid) -> StoreResult<Option<WorkEdge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .edges
            .iter()
            .find(|e| e.source_id == source_id && e.target_id == target_id)
            .cloned())
    }

    async fn insert_edge(&self, edge: &WorkEdge) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.works.contains_key(&edge.source_id) {
            return Err(StoreError::Missing(format!("source work {}", edge.source_id)));
        }
        match tables.works.get(&edge.target_id) {
            None => {
                return Err(StoreError::Missing(format!("target work {}", edge.target_id)));
            }
            Some(target) if target.is_canon() => {
                return Err(StoreError::TargetLocked(edge.target_id));
            }
            Some(_) => {}
        }
        if !tables.edge_pairs.insert((edge.source_id, edge.target_id)) {
            return Err(StoreError::UniqueViolation(format!(
                "work_edges ({}, {})",
                edge.source_id, edge.target_id
            )));
        }
        tables.edges.push(edge.clone());
        Ok(())
    }

    async fn commit_promotion(&self, commit: &PromotionCommit) -> StoreResult<Work> {
        let mut tables = self.tables.write().await;
        let work_id = commit.work_id();
        let work = tables
            .works
            .get_mut(&work_id)
            .ok_or_else(|| StoreError::Missing(format!("work {}", work_id)))?;

        if work.tier_kind() != commit.expected_tier() {
            return Err(StoreError::StaleTier {
                work_id,
                expected: commit.expected_tier(),
            });
        }

        work.tier = commit.new_tier.clone();
        let updated = work.clone();
        tables.promotions.push(commit.event.clone());
        Ok(updated)
    }

    async fn promotion_history(&self, work_id: Uuid) -> StoreResult<Vec<PromotionEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .promotions
            .iter()
            .filter(|p| p.work_id == work_id)
            .cloned()
            .collect())
    }
}
