//! Work Store contract tests against a real SQLite database
//!
//! Each test opens a fresh database file in its own temporary directory.

use canonry_common::catalog::{NewWork, WorkCatalog};
use canonry_common::db::init_database;
use canonry_common::edges::EdgeRegistry;
use canonry_common::events::EventBus;
use canonry_common::lineage::LineageGraphBuilder;
use canonry_common::model::{CuratorIdentity, EdgeType, Tier, TierKind, Work, WorkEdge};
use canonry_common::promotion::PromotionEngine;
use canonry_common::store::{SqliteWorkStore, StoreError, WorkStore};
use canonry_common::Error;
use std::sync::Arc;
use tempfile::TempDir;

struct TestDb {
    _dir: TempDir,
    store: Arc<SqliteWorkStore>,
}

async fn open() -> TestDb {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("canonry.db")).await.unwrap();
    TestDb {
        _dir: dir,
        store: Arc::new(SqliteWorkStore::new(pool)),
    }
}

async fn insert(store: &SqliteWorkStore, slug: &str) -> Work {
    let work = Work::new(slug.to_string(), slug.to_uppercase(), None);
    store.insert_work(&work).await.unwrap();
    work
}

fn curator() -> CuratorIdentity {
    CuratorIdentity::new("curator-1", "Curator One")
}

#[tokio::test]
async fn test_work_round_trips_through_sqlite() {
    let db = open().await;
    let mut work = Work::new("night-drive".into(), "Night Drive".into(), Some("Late".into()));
    db.store.insert_work(&work).await.unwrap();

    let loaded = db.store.work_by_id(work.id).await.unwrap().unwrap();
    // SQLite keeps the timestamp at the precision chrono writes
    work.created_at = loaded.created_at;
    assert_eq!(loaded, work);
    assert_eq!(
        db.store.work_by_slug("night-drive").await.unwrap().unwrap().id,
        work.id
    );
    assert!(db.store.work_by_slug("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_slug_is_unique_violation() {
    let db = open().await;
    insert(&db.store, "echo").await;
    let err = db
        .store
        .insert_work(&Work::new("echo".into(), "Echo".into(), None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation(_)));
}

#[tokio::test]
async fn test_works_by_ids_skips_missing() {
    let db = open().await;
    let a = insert(&db.store, "a").await;
    let b = insert(&db.store, "b").await;

    let mut found: Vec<_> = db
        .store
        .works_by_ids(&[a.id, uuid::Uuid::new_v4(), b.id])
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .collect();
    found.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(found, expected);
    assert!(db.store.works_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_promotion_commit_and_canon_latch() {
    let db = open().await;
    let work = insert(&db.store, "w").await;
    let engine = PromotionEngine::new(db.store.clone(), Arc::new(EventBus::new(8)));

    let plate = engine
        .promote(
            work.id,
            "Exceptional craftsmanship and lasting cultural resonance.",
            &curator(),
        )
        .await
        .unwrap();
    assert_eq!(plate.work.tier, Tier::Plate);

    engine
        .promote(work.id, "Confirmed after community review period.", &curator())
        .await
        .unwrap();
    let stored = db.store.work_by_id(work.id).await.unwrap().unwrap();
    match stored.tier {
        Tier::Canon { ref locked_by, .. } => assert_eq!(locked_by, "curator-1"),
        ref other => panic!("expected canon, got {:?}", other),
    }

    let err = engine
        .promote(work.id, "anything", &curator())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TerminalState { .. }));

    let history = db.store.promotion_history(work.id).await.unwrap();
    assert_eq!(
        history
            .iter()
            .map(|e| (e.from_tier, e.to_tier))
            .collect::<Vec<_>>(),
        vec![
            (TierKind::Jam, TierKind::Plate),
            (TierKind::Plate, TierKind::Canon)
        ]
    );
}

#[tokio::test]
async fn test_canon_work_rejects_direct_sql_mutation() {
    let db = open().await;
    let work = insert(&db.store, "w").await;
    let engine = PromotionEngine::new(db.store.clone(), Arc::new(EventBus::new(8)));
    engine
        .promote(work.id, "First step towards the canon.", &curator())
        .await
        .unwrap();
    engine
        .promote(work.id, "Second and final promotion.", &curator())
        .await
        .unwrap();

    let pool = db.store.pool();
    let id = work.id.to_string();

    let update = sqlx::query("UPDATE works SET title = 'Changed' WHERE id = ?")
        .bind(&id)
        .execute(pool)
        .await;
    assert!(update.is_err(), "canon work must reject UPDATE");

    let demote = sqlx::query("UPDATE works SET tier = 'JAM', locked_at = NULL, locked_by = NULL WHERE id = ?")
        .bind(&id)
        .execute(pool)
        .await;
    assert!(demote.is_err(), "canon work must reject demotion");

    let delete = sqlx::query("DELETE FROM works WHERE id = ?")
        .bind(&id)
        .execute(pool)
        .await;
    assert!(delete.is_err(), "canon work must reject DELETE");

    let history = sqlx::query("DELETE FROM promotion_events WHERE work_id = ?")
        .bind(&id)
        .execute(pool)
        .await;
    assert!(history.is_err(), "promotion history is append-only");
}

#[tokio::test]
async fn test_tier_cannot_regress_below_plate() {
    let db = open().await;
    let work = insert(&db.store, "w").await;
    let engine = PromotionEngine::new(db.store.clone(), Arc::new(EventBus::new(8)));
    engine
        .promote(work.id, "Good enough for a plate.", &curator())
        .await
        .unwrap();

    let demote = sqlx::query("UPDATE works SET tier = 'JAM' WHERE id = ?")
        .bind(work.id.to_string())
        .execute(db.store.pool())
        .await;
    assert!(demote.is_err());
}

#[tokio::test]
async fn test_edges_are_append_only_and_unique() {
    let db = open().await;
    let a = insert(&db.store, "a").await;
    let b = insert(&db.store, "b").await;

    let edge = WorkEdge::new(a.id, b.id, EdgeType::Merge);
    db.store.insert_edge(&edge).await.unwrap();

    let err = db
        .store
        .insert_edge(&WorkEdge::new(a.id, b.id, EdgeType::Fork))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation(_)));

    let pool = db.store.pool();
    assert!(sqlx::query("DELETE FROM work_edges")
        .execute(pool)
        .await
        .is_err());
    assert!(sqlx::query("UPDATE work_edges SET edge_type = 'FORK'")
        .execute(pool)
        .await
        .is_err());

    let stored = db.store.edge_between(a.id, b.id).await.unwrap().unwrap();
    assert_eq!(stored.id, edge.id);
    assert_eq!(stored.edge_type, EdgeType::Merge);
    assert_eq!(db.store.edges_into(b.id).await.unwrap().len(), 1);
    assert_eq!(db.store.edges_out_of(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_edge_into_canon_is_target_locked() {
    let db = open().await;
    let x = insert(&db.store, "x").await;
    let y = insert(&db.store, "y").await;
    let engine = PromotionEngine::new(db.store.clone(), Arc::new(EventBus::new(8)));
    engine
        .promote(y.id, "Worth keeping around.", &curator())
        .await
        .unwrap();
    engine
        .promote(y.id, "Now part of the canon.", &curator())
        .await
        .unwrap();

    let err = db
        .store
        .insert_edge(&WorkEdge::new(x.id, y.id, EdgeType::Fork))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TargetLocked(id) if id == y.id));

    let registry = EdgeRegistry::new(db.store.clone());
    let err = registry
        .create_edge(x.id, y.id, EdgeType::Fork)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ImmutableTarget(_)));
    assert!(db.store.edges_into(y.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_promotions_commit_each_transition_once() {
    let db = open().await;
    let work = insert(&db.store, "contested").await;
    let engine = PromotionEngine::new(db.store.clone(), Arc::new(EventBus::new(8)));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            let id = work.id;
            tokio::spawn(async move {
                engine
                    .promote(id, &format!("Concurrent curator call {}", i), &curator())
                    .await
            })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(Error::ConcurrentPromotion { .. }) | Err(Error::TerminalState { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    let history = db.store.promotion_history(work.id).await.unwrap();
    assert_eq!(history.len(), wins);
    assert!((1..=2).contains(&wins));
    let jam_to_plate = history
        .iter()
        .filter(|e| e.from_tier == TierKind::Jam)
        .count();
    assert_eq!(jam_to_plate, 1);
}

#[tokio::test]
async fn test_concurrent_identical_edges_have_one_winner() {
    let db = open().await;
    let a = insert(&db.store, "a").await;
    let b = insert(&db.store, "b").await;
    let registry = EdgeRegistry::new(db.store.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let (a, b) = (a.id, b.id);
            tokio::spawn(async move { registry.create_edge(a, b, EdgeType::Derived).await })
        })
        .collect();

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(Error::DuplicateEdge { .. }) => duplicates += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(db.store.edges_out_of(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lineage_over_sqlite() {
    let db = open().await;
    let a = insert(&db.store, "a").await;
    let b = insert(&db.store, "b").await;
    let c = insert(&db.store, "c").await;
    let registry = EdgeRegistry::new(db.store.clone());
    registry.create_edge(a.id, b.id, EdgeType::Fork).await.unwrap();
    registry.create_edge(b.id, c.id, EdgeType::Derived).await.unwrap();

    let graph = LineageGraphBuilder::new(db.store.clone())
        .build_graph(b.id, 2)
        .await
        .unwrap();

    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.edges.len(), 2);
    assert_eq!(graph.node(a.id).unwrap().depth, -1);
    assert_eq!(graph.node(b.id).unwrap().depth, 0);
    assert_eq!(graph.node(c.id).unwrap().depth, 1);
}

#[tokio::test]
async fn test_catalog_delete_rules() {
    let db = open().await;
    let catalog = WorkCatalog::new(db.store.clone(), Arc::new(EventBus::new(8)));
    let engine = PromotionEngine::new(db.store.clone(), Arc::new(EventBus::new(8)));

    let new = |title: &str| NewWork {
        title: title.to_string(),
        ..Default::default()
    };
    let lone = catalog.create_work(new("Lone")).await.unwrap();
    let promoted = catalog.create_work(new("Promoted")).await.unwrap();
    engine
        .promote(promoted.id, "Earned its place on a plate.", &curator())
        .await
        .unwrap();

    catalog.delete_work(lone.id).await.unwrap();
    assert!(db.store.work_by_id(lone.id).await.unwrap().is_none());
    assert!(matches!(
        catalog.delete_work(lone.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        catalog.delete_work(promoted.id).await,
        Err(Error::WorkHasHistory(_))
    ));
}

#[tokio::test]
async fn test_list_works_filters_by_tier() {
    let db = open().await;
    let a = insert(&db.store, "a").await;
    insert(&db.store, "b").await;
    let engine = PromotionEngine::new(db.store.clone(), Arc::new(EventBus::new(8)));
    engine
        .promote(a.id, "Plate-worthy by every measure.", &curator())
        .await
        .unwrap();

    assert_eq!(db.store.list_works(None).await.unwrap().len(), 2);
    let plates = db.store.list_works(Some(TierKind::Plate)).await.unwrap();
    assert_eq!(plates.len(), 1);
    assert_eq!(plates[0].id, a.id);
}
