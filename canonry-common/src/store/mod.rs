//! Work Store contract
//!
//! Components receive the store as an injected `Arc<dyn WorkStore>`. The
//! store owns atomicity: `insert_edge` and `commit_promotion` must each be a
//! single isolated unit so concurrent callers cannot both pass the same check.

mod memory;
mod sqlite;

pub use memory::MemoryWorkStore;
pub use sqlite::SqliteWorkStore;

use crate::model::{PromotionEvent, Tier, TierKind, Work, WorkEdge};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Result type for Work Store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Shared store handle
pub type SharedStore = Arc<dyn WorkStore>;

/// Work Store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database driver failure (transient or otherwise)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Edge target was CANON at insert time
    #[error("Edge target {0} is locked")]
    TargetLocked(Uuid),

    /// Work tier no longer matches the expected pre-transition tier
    #[error("Work {work_id} is no longer at tier {expected}")]
    StaleTier { work_id: Uuid, expected: TierKind },

    /// Work has edges or promotion history, or is locked
    #[error("Work {0} has history")]
    HasHistory(Uuid),

    /// Referenced row vanished during a write
    #[error("Missing row: {0}")]
    Missing(String),

    /// Persisted row could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// One tier transition, committed atomically by [`WorkStore::commit_promotion`]
#[derive(Debug, Clone)]
pub struct PromotionCommit {
    /// Audit row to append
    pub event: PromotionEvent,
    /// Tier the work enters (carries the canon lock when `event.to_tier` is CANON)
    pub new_tier: Tier,
}

impl PromotionCommit {
    pub fn work_id(&self) -> Uuid {
        self.event.work_id
    }

    pub fn expected_tier(&self) -> TierKind {
        self.event.from_tier
    }
}

/// Persistence contract for works, edges and promotion history
#[async_trait]
pub trait WorkStore: Send + Sync {
    /// Insert a new work; id and slug must be unique
    async fn insert_work(&self, work: &Work) -> StoreResult<()>;

    async fn work_by_id(&self, id: Uuid) -> StoreResult<Option<Work>>;

    async fn work_by_slug(&self, slug: &str) -> StoreResult<Option<Work>>;

    /// Batch lookup; missing ids are silently absent from the result
    async fn works_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Work>>;

    /// All works, newest first, optionally restricted to one tier
    async fn list_works(&self, tier: Option<TierKind>) -> StoreResult<Vec<Work>>;

    /// Delete a work with no edges, no promotion history and no canon lock
    ///
    /// Returns `Ok(false)` when the work does not exist.
    async fn delete_work(&self, id: Uuid) -> StoreResult<bool>;

    /// Edges whose target is `id` (edges to parents)
    async fn edges_into(&self, id: Uuid) -> StoreResult<Vec<WorkEdge>>;

    /// Edges whose source is `id` (edges to children)
    async fn edges_out_of(&self, id: Uuid) -> StoreResult<Vec<WorkEdge>>;

    async fn edge_between(&self, source_id: Uuid, target_id: Uuid) -> StoreResult<Option<WorkEdge>>;

    /// Append an edge
    ///
    /// Fails `TargetLocked` if the target is CANON at write time and
    /// `UniqueViolation` if the ordered pair already has an edge.
    async fn insert_edge(&self, edge: &WorkEdge) -> StoreResult<()>;

    /// Append the promotion event and move the work to `new_tier` atomically
    ///
    /// Fails `StaleTier` if the work is no longer at `event.from_tier`; in
    /// that case nothing is written. Returns the updated work.
    async fn commit_promotion(&self, commit: &PromotionCommit) -> StoreResult<Work>;

    /// Promotion events for a work in commit order
    async fn promotion_history(&self, work_id: Uuid) -> StoreResult<Vec<PromotionEvent>>;
}
