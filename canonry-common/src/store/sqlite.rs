//! SQLite-backed Work Store
//!
//! Conditional single-statement writes give the atomic check-and-act the
//! engine relies on; the schema's unique index and triggers back them up.

use super::{PromotionCommit, StoreError, StoreResult, WorkStore};
use crate::model::{EdgeType, PromotionEvent, Tier, TierKind, Work, WorkEdge};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

const WORK_COLUMNS: &str =
    "id, slug, title, description, tier, locked_at, locked_by, created_at";
const EDGE_COLUMNS: &str = "id, source_id, target_id, edge_type, created_at";
const EVENT_COLUMNS: &str =
    "id, work_id, from_tier, to_tier, justification, curator_name, created_at";

/// Work Store on a shared SQLite pool
#[derive(Clone)]
pub struct SqliteWorkStore {
    pool: SqlitePool,
}

impl SqliteWorkStore {
    /// Wrap a pool whose schema was created by [`crate::db::init_database`]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn work_exists(&self, id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM works WHERE id = ?)")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

fn parse_uuid(row: &SqliteRow, column: &str) -> StoreResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| StoreError::Corrupt(format!("{} '{}': {}", column, raw, e)))
}

fn parse_tier_kind(raw: &str) -> StoreResult<TierKind> {
    raw.parse::<TierKind>().map_err(StoreError::Corrupt)
}

fn work_from_row(row: &SqliteRow) -> StoreResult<Work> {
    let id = parse_uuid(row, "id")?;
    let kind = parse_tier_kind(row.try_get::<&str, _>("tier")?)?;
    let locked_at: Option<DateTime<Utc>> = row.try_get("locked_at")?;
    let locked_by: Option<String> = row.try_get("locked_by")?;

    let tier = match (kind, locked_at, locked_by) {
        (TierKind::Jam, _, _) => Tier::Jam,
        (TierKind::Plate, _, _) => Tier::Plate,
        (TierKind::Canon, Some(locked_at), Some(locked_by)) => Tier::Canon {
            locked_at,
            locked_by,
        },
        (TierKind::Canon, _, _) => {
            return Err(StoreError::Corrupt(format!(
                "canon work {} is missing lock metadata",
                id
            )))
        }
    };

    Ok(Work {
        id,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        tier,
        created_at: row.try_get("created_at")?,
    })
}

fn edge_from_row(row: &SqliteRow) -> StoreResult<WorkEdge> {
    let edge_type = row
        .try_get::<&str, _>("edge_type")?
        .parse::<EdgeType>()
        .map_err(StoreError::Corrupt)?;

    Ok(WorkEdge {
        id: parse_uuid(row, "id")?,
        source_id: parse_uuid(row, "source_id")?,
        target_id: parse_uuid(row, "target_id")?,
        edge_type,
        created_at: row.try_get("created_at")?,
    })
}

fn event_from_row(row: &SqliteRow) -> StoreResult<PromotionEvent> {
    Ok(PromotionEvent {
        id: parse_uuid(row, "id")?,
        work_id: parse_uuid(row, "work_id")?,
        from_tier: parse_tier_kind(row.try_get::<&str, _>("from_tier")?)?,
        to_tier: parse_tier_kind(row.try_get::<&str, _>("to_tier")?)?,
        justification: row.try_get("justification")?,
        curator_name: row.try_get("curator_name")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Translate constraint failures into their store-level meaning
fn classify(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::UniqueViolation(what())
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            StoreError::Missing(what())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl WorkStore for SqliteWorkStore {
    async fn insert_work(&self, work: &Work) -> StoreResult<()> {
        let (locked_at, locked_by) = match &work.tier {
            Tier::Canon {
                locked_at,
                locked_by,
            } => (Some(*locked_at), Some(locked_by.as_str())),
            _ => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO works (id, slug, title, description, tier, locked_at, locked_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(work.id.to_string())
        .bind(&work.slug)
        .bind(&work.title)
        .bind(&work.description)
        .bind(work.tier_kind().as_str())
        .bind(locked_at)
        .bind(locked_by)
        .bind(work.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("works slug '{}'", work.slug)))?;

        Ok(())
    }

    async fn work_by_id(&self, id: Uuid) -> StoreResult<Option<Work>> {
        let sql = format!("SELECT {} FROM works WHERE id = ?", WORK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(work_from_row).transpose()
    }

    async fn work_by_slug(&self, slug: &str) -> StoreResult<Option<Work>> {
        let sql = format!("SELECT {} FROM works WHERE slug = ?", WORK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(work_from_row).transpose()
    }

    async fn works_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Work>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM works WHERE id IN (", WORK_COLUMNS));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(work_from_row).collect()
    }

    async fn list_works(&self, tier: Option<TierKind>) -> StoreResult<Vec<Work>> {
        let rows = match tier {
            Some(tier) => {
                let sql = format!(
                    "SELECT {} FROM works WHERE tier = ? ORDER BY created_at DESC, id ASC",
                    WORK_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(tier.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM works ORDER BY created_at DESC, id ASC",
                    WORK_COLUMNS
                );
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(work_from_row).collect()
    }

    async fn delete_work(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM works
            WHERE id = ?1
              AND tier != 'CANON'
              AND NOT EXISTS (SELECT 1 FROM work_edges WHERE source_id = ?1 OR target_id = ?1)
              AND NOT EXISTS (SELECT 1 FROM promotion_events WHERE work_id = ?1)
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if self.work_exists(id).await? {
            Err(StoreError::HasHistory(id))
        } else {
            Ok(false)
        }
    }

    async fn edges_into(&self, id: Uuid) -> StoreResult<Vec<WorkEdge>> {
        let sql = format!(
            "SELECT {} FROM work_edges WHERE target_id = ? ORDER BY rowid",
            EDGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(edge_from_row).collect()
    }

    async fn edges_out_of(&self, id: Uuid) -> StoreResult<Vec<WorkEdge>> {
        let sql = format!(
            "SELECT {} FROM work_edges WHERE source_id = ? ORDER BY rowid",
            EDGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(edge_from_row).collect()
    }

    async fn edge_between(&self, source_id: Uuid, target_id: Uuid) -> StoreResult<Option<WorkEdge>> {
        let sql = format!(
            "SELECT {} FROM work_edges WHERE source_id = ? AND target_id = ?",
            EDGE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(source_id.to_string())
            .bind(target_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(edge_from_row).transpose()
    }

    async fn insert_edge(&self, edge: &WorkEdge) -> StoreResult<()> {
        // The tier check and the insert are one statement, so a promotion to
        // CANON cannot slip in between them.
        let result = sqlx::query(
            r#"
            INSERT INTO work_edges (id, source_id, target_id, edge_type, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE EXISTS (SELECT 1 FROM works WHERE id = ?3 AND tier != 'CANON')
            "#,
        )
        .bind(edge.id.to_string())
        .bind(edge.source_id.to_string())
        .bind(edge.target_id.to_string())
        .bind(edge.edge_type.as_str())
        .bind(edge.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            classify(e, || {
                format!("work_edges ({}, {})", edge.source_id, edge.target_id)
            })
        })?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        if self.work_exists(edge.target_id).await? {
            Err(StoreError::TargetLocked(edge.target_id))
        } else {
            Err(StoreError::Missing(format!("target work {}", edge.target_id)))
        }
    }

    async fn commit_promotion(&self, commit: &PromotionCommit) -> StoreResult<Work> {
        let work_id = commit.work_id();
        let expected = commit.expected_tier();
        let (locked_at, locked_by) = match &commit.new_tier {
            Tier::Canon {
                locked_at,
                locked_by,
            } => (Some(*locked_at), Some(locked_by.clone())),
            _ => (None, None),
        };

        let mut tx = self.pool.begin().await?;

        // Compare-and-set on the tier: the first statement is a write, so the
        // transaction holds the write lock before anything else is read.
        let updated = sqlx::query(
            r#"
            UPDATE works
            SET tier = ?, locked_at = ?, locked_by = ?
            WHERE id = ? AND tier = ?
            "#,
        )
        .bind(commit.new_tier.kind().as_str())
        .bind(locked_at)
        .bind(locked_by)
        .bind(work_id.to_string())
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return if self.work_exists(work_id).await? {
                Err(StoreError::StaleTier { work_id, expected })
            } else {
                Err(StoreError::Missing(format!("work {}", work_id)))
            };
        }

        let event = &commit.event;
        sqlx::query(
            r#"
            INSERT INTO promotion_events (id, work_id, from_tier, to_tier, justification, curator_name, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(work_id.to_string())
        .bind(event.from_tier.as_str())
        .bind(event.to_tier.as_str())
        .bind(&event.justification)
        .bind(&event.curator_name)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await?;

        let sql = format!("SELECT {} FROM works WHERE id = ?", WORK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(work_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let work = work_from_row(&row)?;

        tx.commit().await?;
        Ok(work)
    }

    async fn promotion_history(&self, work_id: Uuid) -> StoreResult<Vec<PromotionEvent>> {
        let sql = format!(
            "SELECT {} FROM promotion_events WHERE work_id = ? ORDER BY rowid",
            EVENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(work_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }
}
