use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::geodesy::haversine_distance;
use crate::graph::road_graph::{NodeId, RoadGraph};
use crate::routing::cost::CostModel;

/// Recommended node-expansion limit. Concluding that no route exists
/// requires expanding every reachable node, which on a large network is
/// a denial-of-service; the caller falls back to a direct route instead.
pub const DEFAULT_STEP_LIMIT: usize = 200_000;

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    node: NodeId,
    cost: f64,
    score: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Lower scores are better and BinaryHeap is a max-heap, so the
        // comparison order is reversed.
        other.score.total_cmp(&self.score)
    }
}

/// A* over outgoing segments, returning the node sequence from `start` to
/// `goal`, or an empty vector when no path exists or `step_limit`
/// expansions were exhausted.
pub fn find_path(
    graph: &RoadGraph,
    start: NodeId,
    goal: NodeId,
    cost_model: CostModel,
    step_limit: usize,
) -> Vec<NodeId> {
    if start == goal {
        return vec![start];
    }

    let goal_node = graph.node(goal);
    let (goal_lat, goal_lon) = (goal_node.latitude, goal_node.longitude);
    let heuristic = |id: NodeId| {
        let n = graph.node(id);
        haversine_distance(n.latitude, n.longitude, goal_lat, goal_lon)
    };

    let mut open: BinaryHeap<QueueItem> = BinaryHeap::new();
    let mut closed: HashSet<NodeId> = HashSet::new();
    let mut came_from: HashMap<NodeId, NodeId> = HashMap::new();
    let mut g_score: HashMap<NodeId, f64> = HashMap::new();

    open.push(QueueItem { node: start, cost: 0.0, score: heuristic(start) });
    g_score.insert(start, 0.0);

    let mut steps = 0usize;
    while let Some(current) = open.pop() {
        if current.node == goal {
            return reconstruct_path(&came_from, start, goal);
        }
        if !closed.insert(current.node) {
            continue;
        }

        steps += 1;
        if steps > step_limit {
            log::warn!("A* step limit exceeded after {} expansions", steps);
            return Vec::new();
        }

        for &segment_id in &graph.node(current.node).segments {
            let segment = graph.segment(segment_id);
            let neighbor = segment.to;
            if closed.contains(&neighbor) {
                continue;
            }

            let tentative = current.cost + cost_model.edge_cost(segment);
            if tentative < g_score.get(&neighbor).copied().unwrap_or(f64::INFINITY) {
                came_from.insert(neighbor, current.node);
                g_score.insert(neighbor, tentative);
                open.push(QueueItem {
                    node: neighbor,
                    cost: tentative,
                    score: tentative + heuristic(neighbor),
                });
            }
        }
    }

    Vec::new()
}

fn reconstruct_path(came_from: &HashMap<NodeId, NodeId>, start: NodeId, goal: NodeId) -> Vec<NodeId> {
    let mut path = vec![goal];
    let mut node = goal;
    while node != start {
        match came_from.get(&node) {
            Some(&previous) => {
                path.push(previous);
                node = previous;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}
