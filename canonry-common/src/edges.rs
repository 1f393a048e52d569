//! Edge Registry
//!
//! Records typed derivation edges. Lineage is append-only: edges are never
//! updated or removed, and no edge may point at a CANON work. Cycles are
//! allowed; remix lineage does not have to be a tree.

use crate::error::{Error, Result};
use crate::model::{EdgeType, Work, WorkEdge};
use crate::store::{SharedStore, StoreError};
use tracing::{debug, info};
use uuid::Uuid;

/// Validates and records lineage edges
#[derive(Clone)]
pub struct EdgeRegistry {
    store: SharedStore,
}

impl EdgeRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record `source_id -> target_id`
    ///
    /// Fails `NotFound` if either work is missing, `ImmutableTarget` if the
    /// target is CANON and `DuplicateEdge` if the ordered pair already has an
    /// edge. The pre-checks give precise errors; the store's own constraints
    /// decide races between concurrent callers.
    pub async fn create_edge(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        edge_type: EdgeType,
    ) -> Result<WorkEdge> {
        self.require_work(source_id).await?;
        let target = self.require_work(target_id).await?;

        if target.is_canon() {
            return Err(Error::ImmutableTarget(target_id));
        }

        if self.store.edge_between(source_id, target_id).await?.is_some() {
            return Err(Error::DuplicateEdge {
                source_id,
                target_id,
            });
        }

        let edge = WorkEdge::new(source_id, target_id, edge_type);
        self.store.insert_edge(&edge).await.map_err(|e| match e {
            StoreError::TargetLocked(id) => Error::ImmutableTarget(id),
            StoreError::UniqueViolation(_) => Error::DuplicateEdge {
                source_id,
                target_id,
            },
            StoreError::Missing(what) => Error::NotFound(what),
            other => Error::Store(other),
        })?;

        info!(
            edge_id = %edge.id,
            source = %source_id,
            target = %target_id,
            edge_type = %edge_type,
            "Lineage edge recorded"
        );
        Ok(edge)
    }

    /// Edges from the parents of `work_id`
    pub async fn parents(&self, work_id: Uuid) -> Result<Vec<WorkEdge>> {
        self.require_work(work_id).await?;
        let edges = self.store.edges_into(work_id).await?;
        debug!(%work_id, count = edges.len(), "Loaded parent edges");
        Ok(edges)
    }

    /// Edges to the children of `work_id`
    pub async fn children(&self, work_id: Uuid) -> Result<Vec<WorkEdge>> {
        self.require_work(work_id).await?;
        let edges = self.store.edges_out_of(work_id).await?;
        debug!(%work_id, count = edges.len(), "Loaded child edges");
        Ok(edges)
    }

    async fn require_work(&self, id: Uuid) -> Result<Work> {
        self.store
            .work_by_id(id)
            .await?
            .ok_or_else(|| Error::work_not_found(id))
    }
}
