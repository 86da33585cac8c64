use std::collections::HashMap;

use crate::geodesy::haversine_distance;
use crate::graph::spatial_index::SpatialIndex;
use crate::types::RoadClass;

/// Index of a node in the graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Index of a segment in the graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub u32);

/// Graph vertex. `segments` lists outgoing segments only; directionality
/// is expressed by which node carries the reference.
#[derive(Debug)]
pub struct Node {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub segments: Vec<SegmentId>,
}

/// Directed road edge. A bidirectional road in the source dump produces
/// two segments with identical attributes except direction.
#[derive(Debug)]
pub struct RoadSegment {
    /// Public segment id, assigned monotonically from 1.
    pub id: u32,
    pub from: NodeId,
    pub to: NodeId,
    pub name: String,
    pub speed_limit: f64,
    pub class: RoadClass,
    pub length: f64,
    pub one_way: bool,
}

/// Owns every node and segment for the lifetime of the engine.
///
/// Arena layout: nodes and segments live in flat vectors and refer to each
/// other through index newtypes. Both vectors are append-only; the graph
/// is populated by ingestion and then mutated only by on-edge projection
/// during snapping, which the `&mut` borrow serializes against readers.
pub struct RoadGraph {
    nodes: Vec<Node>,
    segments: Vec<RoadSegment>,
    node_index: HashMap<String, NodeId>,
    spatial_index: SpatialIndex,
}

impl RoadGraph {
    pub fn new() -> Self {
        log::info!("Creating RoadGraph");
        RoadGraph {
            nodes: Vec::new(),
            segments: Vec::new(),
            node_index: HashMap::new(),
            spatial_index: SpatialIndex::new(),
        }
    }

    /// Create a node, or return the existing one with the same string id.
    pub fn add_node(&mut self, id: &str, latitude: f64, longitude: f64) -> NodeId {
        if let Some(&existing) = self.node_index.get(id) {
            return existing;
        }
        let node_id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id: id.to_string(),
            latitude,
            longitude,
            segments: Vec::new(),
        });
        self.node_index.insert(id.to_string(), node_id);
        node_id
    }

    /// Append a directed segment, link it to `from`'s outgoing list, and
    /// register it in the spatial index.
    pub fn add_segment(
        &mut self,
        from: NodeId,
        to: NodeId,
        name: &str,
        speed_limit: f64,
        class: RoadClass,
        one_way: bool,
    ) -> SegmentId {
        let start = (self.nodes[from.0 as usize].latitude, self.nodes[from.0 as usize].longitude);
        let end = (self.nodes[to.0 as usize].latitude, self.nodes[to.0 as usize].longitude);

        let segment_id = SegmentId(self.segments.len() as u32);
        self.segments.push(RoadSegment {
            id: self.segments.len() as u32 + 1,
            from,
            to,
            name: name.to_string(),
            speed_limit,
            class,
            length: haversine_distance(start.0, start.1, end.0, end.1),
            one_way,
        });

        self.nodes[from.0 as usize].segments.push(segment_id);
        self.spatial_index.add_segment(segment_id, start, end);
        segment_id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn segment(&self, id: SegmentId) -> &RoadSegment {
        &self.segments[id.0 as usize]
    }

    /// Look up a node by its string id.
    pub fn find_node(&self, id: &str) -> Option<NodeId> {
        self.node_index.get(id).copied()
    }

    /// Endpoint coordinates of a segment as ((lat, lon), (lat, lon)).
    pub fn segment_endpoints(&self, id: SegmentId) -> ((f64, f64), (f64, f64)) {
        let segment = self.segment(id);
        let from = self.node(segment.from);
        let to = self.node(segment.to);
        (
            (from.latitude, from.longitude),
            (to.latitude, to.longitude),
        )
    }

    /// Initial bearing of a segment from its start node, degrees [0, 360).
    pub fn segment_bearing(&self, id: SegmentId) -> f64 {
        let (start, end) = self.segment_endpoints(id);
        crate::geodesy::initial_bearing(start.0, start.1, end.0, end.1)
    }

    /// Segments whose index cells fall within `radius_m` of the point.
    pub fn find_nearby(&self, lat: f64, lon: f64, radius_m: f64) -> Vec<SegmentId> {
        self.spatial_index.find_nearby(lat, lon, radius_m)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn segments(&self) -> impl Iterator<Item = &RoadSegment> {
        self.segments.iter()
    }
}

impl Default for RoadGraph {
    fn default() -> Self {
        Self::new()
    }
}
