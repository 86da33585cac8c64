//! Offline turn-by-turn navigation core.
//!
//! Holds a road network in memory and, for every noisy positioning fix,
//! produces a filtered position snapped to a road, the next maneuver, and
//! the distance to it. Single-threaded and synchronous: the host drives
//! the engine by calling [NavigationEngine::update_location] and owns the
//! one instance.

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod geodesy;
pub mod graph;
pub mod matcher;
pub mod routing;
pub mod types;

pub use config::EngineConfig;
pub use engine::NavigationEngine;
pub use error::MapError;
pub use filter::LocationFilter;
pub use graph::{IngestSummary, MapEvent, MapIngester, RoadGraph};
pub use matcher::RouteMatcher;
pub use routing::{CostModel, RoutingEngine};
pub use types::{Observation, Position, RoadClass, Route};
