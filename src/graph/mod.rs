pub mod ingest;
pub mod road_graph;
pub mod spatial_index;

pub use ingest::{load_map_file, parse_map_json, IngestSummary, MapEvent, MapIngester};
pub use road_graph::{Node, NodeId, RoadGraph, RoadSegment, SegmentId};
pub use spatial_index::SpatialIndex;
