//! Promotion Engine
//!
//! The tier state machine: JAM → PLATE → CANON, one step at a time, never
//! backwards. Every transition is signed by a curator and recorded as an
//! immutable [`PromotionEvent`] in the same atomic commit that moves the
//! tier. Entering CANON latches the permanent lock.
//!
//! The server re-validates every call; any client-side confirmation step
//! before CANON is a UI convention only.

use crate::error::{Error, Result};
use crate::events::{notify_best_effort, CurationEvent, Notifier};
use crate::model::{CuratorIdentity, PromotionEvent, Tier, TierKind, Work};
use crate::store::{PromotionCommit, SharedStore, StoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Minimum justification length, counted in characters after trimming
pub const MIN_JUSTIFICATION_CHARS: usize = 10;

/// Result of a committed promotion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionOutcome {
    /// Work snapshot after the commit
    pub work: Work,
    pub promotion_event: PromotionEvent,
}

/// Validates and commits tier transitions
#[derive(Clone)]
pub struct PromotionEngine {
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
}

impl PromotionEngine {
    pub fn new(store: SharedStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Move `work_id` up exactly one tier
    ///
    /// Fails `NotFound`, `TerminalState` (already CANON, checked before the
    /// justification), `Validation` (justification too short or curator
    /// missing) or `ConcurrentPromotion` (another promotion committed
    /// first). A failed call writes nothing.
    pub async fn promote(
        &self,
        work_id: Uuid,
        justification: &str,
        curator: &CuratorIdentity,
    ) -> Result<PromotionOutcome> {
        let work = self
            .store
            .work_by_id(work_id)
            .await?
            .ok_or_else(|| Error::work_not_found(work_id))?;

        // A CANON work rejects every call, however well justified.
        let from_tier = work.tier_kind();
        let to_tier = from_tier.next().ok_or(Error::TerminalState {
            work_id,
            tier: from_tier,
        })?;

        let justification = validate_justification(justification)?;
        validate_curator(curator)?;

        let now = Utc::now();
        let commit = PromotionCommit {
            event: PromotionEvent {
                id: Uuid::new_v4(),
                work_id,
                from_tier,
                to_tier,
                justification,
                curator_name: curator.display_name.trim().to_string(),
                created_at: now,
            },
            new_tier: Tier::entered(to_tier, now, &curator.id),
        };

        let updated = match self.store.commit_promotion(&commit).await {
            Ok(work) => work,
            Err(StoreError::StaleTier { expected, .. }) => {
                return Err(self.lost_race(work_id, expected).await);
            }
            Err(StoreError::Missing(_)) => return Err(Error::work_not_found(work_id)),
            Err(e) => return Err(e.into()),
        };

        info!(
            %work_id,
            from = %from_tier,
            to = %to_tier,
            curator = %commit.event.curator_name,
            promotion_event_id = %commit.event.id,
            "Work promoted"
        );
        if updated.is_canon() {
            info!(%work_id, locked_by = %curator.id, "Work canonized and permanently locked");
        }

        for event in CurationEvent::for_promotion(&updated, &commit.event) {
            notify_best_effort(self.notifier.as_ref(), event);
        }

        Ok(PromotionOutcome {
            work: updated,
            promotion_event: commit.event,
        })
    }

    /// Promotion events for a work, oldest first
    pub async fn history(&self, work_id: Uuid) -> Result<Vec<PromotionEvent>> {
        if self.store.work_by_id(work_id).await?.is_none() {
            return Err(Error::work_not_found(work_id));
        }
        Ok(self.store.promotion_history(work_id).await?)
    }

    /// Map a lost compare-and-set to the error the caller should see
    async fn lost_race(&self, work_id: Uuid, expected: TierKind) -> Error {
        match self.store.work_by_id(work_id).await {
            Ok(Some(current)) if current.tier_kind().is_terminal() => Error::TerminalState {
                work_id,
                tier: current.tier_kind(),
            },
            Ok(Some(_)) => Error::ConcurrentPromotion { work_id, expected },
            Ok(None) => Error::work_not_found(work_id),
            Err(e) => e.into(),
        }
    }
}

/// Trim and length-check a justification, returning the text to store
pub fn validate_justification(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let chars = trimmed.chars().count();
    if chars < MIN_JUSTIFICATION_CHARS {
        return Err(Error::Validation(format!(
            "justification must be at least {} characters (got {})",
            MIN_JUSTIFICATION_CHARS, chars
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_curator(curator: &CuratorIdentity) -> Result<()> {
    if curator.id.trim().is_empty() || curator.display_name.trim().is_empty() {
        return Err(Error::Validation(
            "curator identity requires an id and a display name".to_string(),
        ));
    }
    Ok(())
}
