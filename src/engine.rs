use std::path::Path;

use crate::config::EngineConfig;
use crate::filter::LocationFilter;
use crate::graph::ingest::load_map_file;
use crate::graph::road_graph::RoadGraph;
use crate::matcher::RouteMatcher;
use crate::routing::engine::RoutingEngine;
use crate::types::{Observation, Position, Route};

/// Top-level navigation state machine.
///
/// Owns the road graph and the three processing stages, and serves the
/// host's four operations synchronously. The engine holds no global
/// state and provides no locking; the host owns the single instance and
/// must not call it concurrently.
pub struct NavigationEngine {
    graph: RoadGraph,
    filter: LocationFilter,
    routing: RoutingEngine,
    matcher: RouteMatcher,
    current_fix: Option<Position>,
    destination: Option<Position>,
    current_route: Option<Route>,
    alternatives: Vec<Route>,
}

impl NavigationEngine {
    /// Engine over an empty road network. Populate it with [load_map]
    /// (or leave it empty and rely on direct routes).
    ///
    /// [load_map]: NavigationEngine::load_map
    pub fn new() -> Self {
        Self::with_graph(RoadGraph::new())
    }

    /// Engine over an already-populated road network.
    pub fn with_graph(graph: RoadGraph) -> Self {
        Self::with_config(graph, EngineConfig::default())
    }

    /// Engine with non-default tuning.
    pub fn with_config(graph: RoadGraph, config: EngineConfig) -> Self {
        log::info!("Creating NavigationEngine");
        NavigationEngine {
            graph,
            filter: LocationFilter::with_config(config.filter),
            routing: RoutingEngine::with_config(config.routing),
            matcher: RouteMatcher::with_config(config.matcher),
            current_fix: None,
            destination: None,
            current_route: None,
            alternatives: Vec::new(),
        }
    }

    /// Load a JSON (or gzipped JSON) map dump into the road network.
    /// Returns whether anything drivable was ingested.
    pub fn load_map(&mut self, path: &Path) -> bool {
        match load_map_file(&mut self.graph, path) {
            Ok(summary) => {
                log::info!(
                    "Map loaded: {} nodes, {} roads, {} segments",
                    summary.nodes,
                    summary.roads,
                    summary.segments
                );
                true
            }
            Err(error) => {
                log::error!("Failed to load map: {}", error);
                false
            }
        }
    }

    /// Feed one raw positioning fix through the pipeline.
    ///
    /// The fix is filtered and stored; when a destination is pending and
    /// no routes exist yet, routes are calculated now and the primary is
    /// adopted. Returns the match against the active route, or the
    /// no-route sentinel.
    pub fn update_location(
        &mut self,
        latitude: f64,
        longitude: f64,
        bearing: f32,
        speed: f32,
        accuracy: f32,
    ) -> Observation {
        log::debug!(
            "Processing location: lat={:.6}, lon={:.6}, bearing={:.1}, speed={:.1}, accuracy={:.1}",
            latitude,
            longitude,
            bearing,
            speed,
            accuracy
        );

        let raw = Position::with_motion(latitude, longitude, bearing, speed, accuracy);
        let filtered = self.filter.process(raw);
        self.current_fix = Some(filtered);

        if self.destination.is_some() && self.alternatives.is_empty() {
            log::info!("Calculating routes to the saved destination");
            self.compute_routes();
        }

        self.matcher.match_fix(&self.graph, filtered)
    }

    /// Store the destination. When a fix is already known, routes are
    /// calculated immediately and the primary is adopted; otherwise the
    /// calculation is deferred to the next `update_location`.
    pub fn set_destination(&mut self, latitude: f64, longitude: f64) -> bool {
        log::info!("Setting destination: lat={:.6}, lon={:.6}", latitude, longitude);

        self.destination = Some(Position::new(latitude, longitude));
        self.alternatives.clear();
        self.current_route = None;

        if self.current_fix.is_none() {
            log::info!("Destination set, waiting for a fix before calculating routes");
            return true;
        }
        self.compute_routes()
    }

    pub fn get_alternative_routes(&self) -> &[Route] {
        &self.alternatives
    }

    /// Adopt one of the previously calculated routes by id. Unknown ids
    /// leave the current state untouched.
    pub fn switch_to_route(&mut self, route_id: &str) -> bool {
        log::info!("Switching to route {}", route_id);

        match self.alternatives.iter().find(|r| r.id == route_id).cloned() {
            Some(route) => {
                self.matcher.set_route(&self.graph, route.clone());
                self.current_route = Some(route);
                true
            }
            None => {
                log::warn!("Route {} not found", route_id);
                false
            }
        }
    }

    pub fn current_route(&self) -> Option<&Route> {
        self.current_route.as_ref()
    }

    pub fn current_fix(&self) -> Option<Position> {
        self.current_fix
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    fn compute_routes(&mut self) -> bool {
        let (fix, destination) = match (self.current_fix, self.destination) {
            (Some(fix), Some(destination)) => (fix, destination),
            _ => return false,
        };

        self.alternatives = self.routing.calculate_routes(&mut self.graph, fix, destination);
        match self.alternatives.first() {
            Some(primary) => {
                log::info!("Calculated {} alternative routes", self.alternatives.len());
                let primary = primary.clone();
                self.matcher.set_route(&self.graph, primary.clone());
                self.current_route = Some(primary);
                true
            }
            None => {
                log::error!("Failed to calculate any routes");
                false
            }
        }
    }
}

impl Default for NavigationEngine {
    fn default() -> Self {
        Self::new()
    }
}
