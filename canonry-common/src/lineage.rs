//! Lineage Graph Builder
//!
//! Bidirectional breadth-first traversal from a root work. One FIFO queue of
//! `(work, direction, depth)` items feeds a shared node map and edge list;
//! `visited` is keyed by `(work, direction)` so each work is expanded at most
//! once upward and once downward.
//!
//! Depth is fixed at first discovery (first write wins). A node reachable by
//! several paths keeps the depth it was first seen at, which is not
//! necessarily the shortest distance. Negative depths are ancestors, positive
//! depths descendants, zero the root.
//!
//! The result is assembled from several unsynchronized reads and is a
//! point-in-time snapshot for display, not a transactional view.

use crate::error::{Error, Result};
use crate::model::{EdgeType, TierKind, Work, WorkEdge};
use crate::store::SharedStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

/// Depth used when the caller does not ask for one
pub const DEFAULT_LINEAGE_DEPTH: u32 = 3;

/// Largest depth accepted unless configured otherwise
pub const DEFAULT_MAX_LINEAGE_DEPTH: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub tier: TierKind,
    pub depth: i32,
}

impl LineageNode {
    fn from_work(work: &Work, depth: i32) -> Self {
        Self {
            id: work.id,
            slug: work.slug.clone(),
            title: work.title.clone(),
            tier: work.tier_kind(),
            depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub id: Uuid,
    pub source: Uuid,
    pub target: Uuid,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

impl From<&WorkEdge> for LineageEdge {
    fn from(edge: &WorkEdge) -> Self {
        Self {
            id: edge.id,
            source: edge.source_id,
            target: edge.target_id,
            edge_type: edge.edge_type,
        }
    }
}

/// Nodes in discovery order (root first) and edges in recording order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageGraph {
    pub nodes: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
}

impl LineageGraph {
    pub fn node(&self, id: Uuid) -> Option<&LineageNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    /// Toward parents (edges targeting the work)
    Up,
    /// Toward children (edges sourced from the work)
    Down,
}

impl Direction {
    fn sign(self) -> i32 {
        match self {
            Direction::Up => -1,
            Direction::Down => 1,
        }
    }

    /// The work on the far end of `edge` when walking in this direction
    fn neighbor(self, edge: &WorkEdge) -> Uuid {
        match self {
            Direction::Up => edge.source_id,
            Direction::Down => edge.target_id,
        }
    }
}

struct Frontier {
    work_id: Uuid,
    direction: Direction,
    depth: u32,
}

/// Accumulates the graph while the traversal runs
#[derive(Default)]
struct GraphAccumulator {
    nodes: Vec<LineageNode>,
    index: HashMap<Uuid, usize>,
    edges: Vec<LineageEdge>,
    recorded_pairs: HashSet<(Uuid, Uuid)>,
}

impl GraphAccumulator {
    fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    /// First write wins: a known node keeps its first depth
    fn add_node(&mut self, work: &Work, depth: i32) {
        if self.contains(work.id) {
            return;
        }
        self.index.insert(work.id, self.nodes.len());
        self.nodes.push(LineageNode::from_work(work, depth));
    }

    /// Record an edge once per ordered (source, target) pair
    fn add_edge(&mut self, edge: &WorkEdge) {
        if self.recorded_pairs.insert((edge.source_id, edge.target_id)) {
            self.edges.push(LineageEdge::from(edge));
        }
    }

    fn finish(self) -> LineageGraph {
        LineageGraph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

/// Builds depth-bounded ancestry/descendancy graphs
#[derive(Clone)]
pub struct LineageGraphBuilder {
    store: SharedStore,
    depth_limit: u32,
}

impl LineageGraphBuilder {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            depth_limit: DEFAULT_MAX_LINEAGE_DEPTH,
        }
    }

    /// Reject requests deeper than `limit`
    pub fn with_depth_limit(mut self, limit: u32) -> Self {
        self.depth_limit = limit;
        self
    }

    pub fn depth_limit(&self) -> u32 {
        self.depth_limit
    }

    /// Traverse up to `max_depth` hops in each direction from `root_id`
    ///
    /// Fails `NotFound` if the root does not exist, so "no lineage" (a
    /// single-node graph) is distinguishable from a bad id. An unknown root
    /// is reported before an out-of-range depth.
    pub async fn build_graph(&self, root_id: Uuid, max_depth: u32) -> Result<LineageGraph> {
        let root = self
            .store
            .work_by_id(root_id)
            .await?
            .ok_or_else(|| Error::work_not_found(root_id))?;

        if max_depth > self.depth_limit {
            return Err(Error::Validation(format!(
                "depth {} exceeds the maximum of {}",
                max_depth, self.depth_limit
            )));
        }

        let mut graph = GraphAccumulator::default();
        graph.add_node(&root, 0);

        let mut visited: HashSet<(Uuid, Direction)> = HashSet::new();
        let mut queue: VecDeque<Frontier> = VecDeque::new();
        if max_depth > 0 {
            for direction in [Direction::Up, Direction::Down] {
                queue.push_back(Frontier {
                    work_id: root_id,
                    direction,
                    depth: 0,
                });
            }
        }

        while let Some(item) = queue.pop_front() {
            if !visited.insert((item.work_id, item.direction)) {
                continue;
            }

            let edges = match item.direction {
                Direction::Up => self.store.edges_into(item.work_id).await?,
                Direction::Down => self.store.edges_out_of(item.work_id).await?,
            };
            if edges.is_empty() {
                continue;
            }

            // One batched lookup for every neighbor not yet in the graph
            let mut unseen: Vec<Uuid> = edges
                .iter()
                .map(|e| item.direction.neighbor(e))
                .filter(|id| !graph.contains(*id))
                .collect();
            unseen.sort_unstable();
            unseen.dedup();
            let fetched: HashMap<Uuid, Work> = self
                .store
                .works_by_ids(&unseen)
                .await?
                .into_iter()
                .map(|w| (w.id, w))
                .collect();

            let next_depth = item.depth + 1;
            let signed_depth = item.direction.sign() * next_depth as i32;

            for edge in &edges {
                let neighbor = item.direction.neighbor(edge);
                if !graph.contains(neighbor) {
                    match fetched.get(&neighbor) {
                        Some(work) => graph.add_node(work, signed_depth),
                        None => {
                            warn!(
                                edge_id = %edge.id,
                                work_id = %neighbor,
                                "Edge references a missing work; skipping"
                            );
                            continue;
                        }
                    }
                }

                graph.add_edge(edge);

                if next_depth < max_depth {
                    queue.push_back(Frontier {
                        work_id: neighbor,
                        direction: item.direction,
                        depth: next_depth,
                    });
                }
            }
        }

        let graph = graph.finish();
        debug!(
            root = %root_id,
            max_depth,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Lineage graph built"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tier;
    use crate::store::{MemoryWorkStore, WorkStore};
    use chrono::Utc;
    use std::sync::Arc;

    struct Fixture {
        store: Arc<MemoryWorkStore>,
        builder: LineageGraphBuilder,
        ids: HashMap<&'static str, Uuid>,
    }

    impl Fixture {
        async fn new(slugs: &[&'static str]) -> Self {
            let store = Arc::new(MemoryWorkStore::new());
            let mut ids = HashMap::new();
            for slug in slugs {
                let work = Work::new(slug.to_string(), slug.to_uppercase(), None);
                ids.insert(*slug, work.id);
                store.insert_work(&work).await.unwrap();
            }
            let builder = LineageGraphBuilder::new(store.clone());
            Self { store, builder, ids }
        }

        fn id(&self, slug: &str) -> Uuid {
            self.ids[slug]
        }

        async fn edge(&self, source: &str, target: &str, edge_type: EdgeType) {
            let edge = WorkEdge::new(self.id(source), self.id(target), edge_type);
            self.store.insert_edge(&edge).await.unwrap();
        }

        async fn graph(&self, root: &str, depth: u32) -> LineageGraph {
            self.builder.build_graph(self.id(root), depth).await.unwrap()
        }

        fn depth_of(&self, graph: &LineageGraph, slug: &str) -> Option<i32> {
            graph.node(self.id(slug)).map(|n| n.depth)
        }
    }

    #[tokio::test]
    async fn test_depth_zero_is_root_only() {
        let fx = Fixture::new(&["a", "b", "c"]).await;
        fx.edge("a", "b", EdgeType::Fork).await;
        fx.edge("b", "c", EdgeType::Derived).await;

        let graph = fx.graph("b", 0).await;
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, fx.id("b"));
        assert_eq!(graph.nodes[0].depth, 0);
        assert!(graph.edges.is_empty());
    }

    #[tokio::test]
    async fn test_ancestors_negative_descendants_positive() {
        let fx = Fixture::new(&["a", "b", "c"]).await;
        fx.edge("a", "b", EdgeType::Fork).await;
        fx.edge("b", "c", EdgeType::Derived).await;

        let graph = fx.graph("b", 2).await;
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(fx.depth_of(&graph, "a"), Some(-1));
        assert_eq!(fx.depth_of(&graph, "b"), Some(0));
        assert_eq!(fx.depth_of(&graph, "c"), Some(1));

        assert_eq!(graph.edges.len(), 2);
        let fork = graph
            .edges
            .iter()
            .find(|e| e.edge_type == EdgeType::Fork)
            .unwrap();
        assert_eq!((fork.source, fork.target), (fx.id("a"), fx.id("b")));
        let derived = graph
            .edges
            .iter()
            .find(|e| e.edge_type == EdgeType::Derived)
            .unwrap();
        assert_eq!((derived.source, derived.target), (fx.id("b"), fx.id("c")));
    }

    #[tokio::test]
    async fn test_depth_bound_is_respected() {
        // chain: a -> b -> c -> d -> e
        let fx = Fixture::new(&["a", "b", "c", "d", "e"]).await;
        for (s, t) in [("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")] {
            fx.edge(s, t, EdgeType::Fork).await;
        }

        for depth in 0..=4u32 {
            let graph = fx.graph("c", depth).await;
            assert!(graph.nodes.iter().all(|n| n.depth.unsigned_abs() <= depth));
        }

        let graph = fx.graph("c", 1).await;
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(fx.depth_of(&graph, "a"), None);
        assert_eq!(fx.depth_of(&graph, "e"), None);

        let graph = fx.graph("a", 4).await;
        assert_eq!(fx.depth_of(&graph, "e"), Some(4));
        assert_eq!(graph.edges.len(), 4);
    }

    #[tokio::test]
    async fn test_isolated_root_has_no_lineage() {
        let fx = Fixture::new(&["solo"]).await;
        let graph = fx.graph("solo", 3).await;
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_root_is_not_found() {
        let fx = Fixture::new(&["a"]).await;
        let err = fx.builder.build_graph(Uuid::new_v4(), 3).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_depth_above_limit_is_rejected() {
        let fx = Fixture::new(&["a"]).await;
        let builder = fx.builder.clone().with_depth_limit(5);
        let err = builder.build_graph(fx.id("a"), 6).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        builder.build_graph(fx.id("a"), 5).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_root_beats_depth_limit() {
        let fx = Fixture::new(&["a"]).await;
        let builder = fx.builder.clone().with_depth_limit(2);
        let err = builder.build_graph(Uuid::new_v4(), 9).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cycle_terminates_and_records_each_edge_once() {
        // a -> b -> c -> a (merge back into the ancestor)
        let fx = Fixture::new(&["a", "b", "c"]).await;
        fx.edge("a", "b", EdgeType::Fork).await;
        fx.edge("b", "c", EdgeType::Fork).await;
        fx.edge("c", "a", EdgeType::Merge).await;

        let graph = fx.graph("a", 10).await;
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 3);
        let mut pairs: Vec<_> = graph.edges.iter().map(|e| (e.source, e.target)).collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), 3);
    }

    #[tokio::test]
    async fn test_cycle_edge_seen_from_both_directions_is_recorded_once() {
        // r -> s -> t -> r rooted at r: r -> s is found going down from r and
        // again going up from s; s -> t is found going down from s and again
        // going up from t.
        let fx = Fixture::new(&["r", "s", "t"]).await;
        fx.edge("r", "s", EdgeType::Fork).await;
        fx.edge("s", "t", EdgeType::Derived).await;
        fx.edge("t", "r", EdgeType::Merge).await;

        let graph = fx.graph("r", 3).await;
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(fx.depth_of(&graph, "t"), Some(-1));
        assert_eq!(fx.depth_of(&graph, "s"), Some(1));

        let pairs: Vec<_> = graph.edges.iter().map(|e| (e.source, e.target)).collect();
        assert_eq!(pairs.len(), 3);
        for (source, target) in [("r", "s"), ("s", "t"), ("t", "r")] {
            let count = pairs
                .iter()
                .filter(|p| **p == (fx.id(source), fx.id(target)))
                .count();
            assert_eq!(count, 1, "{} -> {} recorded {} times", source, target, count);
        }
    }

    #[tokio::test]
    async fn test_first_discovered_depth_wins() {
        // root has c as a parent (c -> root) and as a grandchild (root -> b -> c).
        // Upward expansion of the root runs first, so c is fixed at -1.
        let fx = Fixture::new(&["root", "b", "c"]).await;
        fx.edge("c", "root", EdgeType::Derived).await;
        fx.edge("root", "b", EdgeType::Fork).await;
        fx.edge("b", "c", EdgeType::Fork).await;

        let graph = fx.graph("root", 3).await;
        assert_eq!(fx.depth_of(&graph, "c"), Some(-1));
        assert_eq!(fx.depth_of(&graph, "b"), Some(1));
        assert_eq!(graph.edges.len(), 3);
    }

    #[tokio::test]
    async fn test_longer_path_does_not_revise_depth() {
        // a -> x -> y -> d and a -> d: d is fixed at +1 by the direct edge;
        // reaching it again through y records the edge but keeps the depth.
        let fx = Fixture::new(&["a", "x", "y", "d"]).await;
        fx.edge("a", "x", EdgeType::Fork).await;
        fx.edge("x", "y", EdgeType::Fork).await;
        fx.edge("y", "d", EdgeType::Fork).await;
        fx.edge("a", "d", EdgeType::Merge).await;

        let graph = fx.graph("a", 3).await;
        assert_eq!(fx.depth_of(&graph, "x"), Some(1));
        assert_eq!(fx.depth_of(&graph, "d"), Some(1));
        assert_eq!(fx.depth_of(&graph, "y"), Some(2));
        assert_eq!(graph.edges.len(), 4);
    }

    #[tokio::test]
    async fn test_nodes_report_current_tier() {
        let store = Arc::new(MemoryWorkStore::new());
        let mut parent = Work::new("p".into(), "P".into(), None);
        parent.tier = Tier::entered(TierKind::Canon, Utc::now(), "curator-1");
        let child = Work::new("c".into(), "C".into(), None);
        store.insert_work(&parent).await.unwrap();
        store.insert_work(&child).await.unwrap();
        store
            .insert_edge(&WorkEdge::new(parent.id, child.id, EdgeType::Fork))
            .await
            .unwrap();

        let graph = LineageGraphBuilder::new(store)
            .build_graph(child.id, 1)
            .await
            .unwrap();
        assert_eq!(graph.node(parent.id).unwrap().tier, TierKind::Canon);
        assert_eq!(graph.node(child.id).unwrap().tier, TierKind::Jam);
    }
}
