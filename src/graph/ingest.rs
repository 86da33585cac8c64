use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::graph::road_graph::{NodeId, RoadGraph};
use crate::types::RoadClass;

/// Highway values that never carry motor traffic.
const REJECTED_HIGHWAYS: [&str; 10] = [
    "footway",
    "cycleway",
    "path",
    "steps",
    "pedestrian",
    "track",
    "bus_guideway",
    "escape",
    "raceway",
    "bridleway",
];

/// One decoded map-dump event, semantically equivalent to OSM XML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MapEvent {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        id: i64,
        nodes: Vec<i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    /// Relations and anything else the dump may carry.
    #[serde(other)]
    Other,
}

/// Counters reported after a dump has been consumed.
#[derive(Clone, Copy, Debug, Default)]
pub struct IngestSummary {
    pub nodes: usize,
    pub ways: usize,
    pub roads: usize,
    pub segments: usize,
}

/// Consumes node/way events and populates a road graph.
///
/// Nodes must arrive before the ways that reference them; way node-refs
/// missing from the node map are skipped pairwise, as in the source dump
/// format. Bidirectional ways emit a reverse segment per pair.
pub struct MapIngester<'a> {
    graph: &'a mut RoadGraph,
    node_map: HashMap<i64, NodeId>,
    summary: IngestSummary,
}

impl<'a> MapIngester<'a> {
    pub fn new(graph: &'a mut RoadGraph) -> Self {
        MapIngester {
            graph,
            node_map: HashMap::new(),
            summary: IngestSummary::default(),
        }
    }

    /// Feed a stream of events through the ingester.
    pub fn ingest<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = MapEvent>,
    {
        for event in events {
            match event {
                MapEvent::Node { id, lat, lon } => self.ingest_node(id, lat, lon),
                MapEvent::Way { id, nodes, tags } => self.ingest_way(id, &nodes, &tags),
                MapEvent::Other => {}
            }
        }
    }

    /// Consume the ingester and report what was built.
    pub fn finish(self) -> IngestSummary {
        log::info!(
            "Ingest completed. Nodes: {}, Ways: {}, Roads: {}, Segments: {}",
            self.summary.nodes,
            self.summary.ways,
            self.summary.roads,
            self.summary.segments
        );
        self.summary
    }

    fn ingest_node(&mut self, id: i64, lat: f64, lon: f64) {
        let node_id = self.graph.add_node(&id.to_string(), lat, lon);
        self.node_map.insert(id, node_id);
        self.summary.nodes += 1;
        if self.summary.nodes % 10_000 == 0 {
            log::info!("Processed {} nodes", self.summary.nodes);
        }
    }

    fn ingest_way(&mut self, _id: i64, node_refs: &[i64], tags: &HashMap<String, String>) {
        self.summary.ways += 1;
        if self.summary.ways % 1_000 == 0 {
            log::info!(
                "Processed {} ways (roads: {})",
                self.summary.ways,
                self.summary.roads
            );
        }

        if node_refs.len() < 2 {
            return;
        }
        let highway = match tags.get("highway") {
            Some(h) => h.as_str(),
            None => return,
        };
        if REJECTED_HIGHWAYS.contains(&highway) {
            return;
        }
        if let Some(access) = tags.get("access") {
            if access == "private" || access == "no" {
                return;
            }
        }

        let class = RoadClass::from_highway_tag(highway);
        let speed_limit = speed_limit_from_tags(tags, class);
        let name = road_name_from_tags(tags);
        let one_way = is_one_way(tags, highway);

        for pair in node_refs.windows(2) {
            let (from, to) = match (self.node_map.get(&pair[0]), self.node_map.get(&pair[1])) {
                (Some(&f), Some(&t)) => (f, t),
                _ => continue,
            };

            self.graph
                .add_segment(from, to, &name, speed_limit, class, one_way);
            self.summary.segments += 1;
            if !one_way {
                self.graph
                    .add_segment(to, from, &name, speed_limit, class, one_way);
                self.summary.segments += 1;
            }
        }
        self.summary.roads += 1;
    }
}

fn speed_limit_from_tags(tags: &HashMap<String, String>, class: RoadClass) -> f64 {
    tags.get("maxspeed")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or_else(|| class.default_speed_kph())
}

fn road_name_from_tags(tags: &HashMap<String, String>) -> String {
    if let Some(name) = tags.get("name") {
        return name.clone();
    }
    if let Some(reference) = tags.get("ref") {
        return format!("Road {}", reference);
    }
    "Unnamed Road".to_string()
}

fn is_one_way(tags: &HashMap<String, String>, highway: &str) -> bool {
    if highway == "motorway" || highway == "motorway_link" {
        return true;
    }
    matches!(
        tags.get("oneway").map(String::as_str),
        Some("yes") | Some("true") | Some("1")
    )
}

/// Parse a JSON map dump into its event stream.
pub fn parse_map_json(json: &str) -> Result<Vec<MapEvent>, MapError> {
    Ok(serde_json::from_str(json)?)
}

/// Load a JSON (or gzipped JSON) map dump into the graph.
///
/// Returns the ingest summary, or [MapError::NoRoads] when the dump held
/// nothing drivable.
pub fn load_map_file(graph: &mut RoadGraph, path: &Path) -> Result<IngestSummary, MapError> {
    log::info!("Loading map dump: {}", path.display());

    let mut json = String::new();
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(file).read_to_string(&mut json)?;
    } else {
        let mut file = file;
        file.read_to_string(&mut json)?;
    }

    let events = parse_map_json(&json)?;
    let mut ingester = MapIngester::new(graph);
    ingester.ingest(events);
    let summary = ingester.finish();

    if summary.nodes == 0 || summary.roads == 0 {
        return Err(MapError::NoRoads);
    }
    Ok(summary)
}
