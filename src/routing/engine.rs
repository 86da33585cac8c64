use rand::Rng;

use crate::config::RoutingConfig;
use crate::geodesy::{
    bearing_difference, haversine_distance, initial_bearing, project_onto_segment,
};
use crate::graph::road_graph::{NodeId, RoadGraph, SegmentId};
use crate::routing::astar;
use crate::routing::cost::CostModel;
use crate::types::{Position, Route};

/// Computes a primary route plus cost-policy alternatives over the road
/// graph, falling back to a synthetic direct route whenever the graph
/// cannot serve the request.
pub struct RoutingEngine {
    config: RoutingConfig,
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self::with_config(RoutingConfig::default())
    }

    pub fn with_config(config: RoutingConfig) -> Self {
        log::info!("RoutingEngine created");
        RoutingEngine { config }
    }

    /// Calculate the primary route and up to two accepted alternatives.
    ///
    /// Always returns at least one route; requests the graph cannot serve
    /// (oversize span, failed snap, exhausted search) degrade to a direct
    /// interpolated route.
    pub fn calculate_routes(
        &self,
        graph: &mut RoadGraph,
        start: Position,
        end: Position,
    ) -> Vec<Route> {
        log::info!(
            "Calculating route from ({:.6}, {:.6}) to ({:.6}, {:.6})",
            start.latitude,
            start.longitude,
            end.latitude,
            end.longitude
        );

        let span = haversine_distance(
            start.latitude,
            start.longitude,
            end.latitude,
            end.longitude,
        );
        if span > self.config.max_route_distance_m {
            log::warn!(
                "Request spans {:.0}m, beyond the routable range; returning direct route",
                span
            );
            return vec![self.direct_route(start, end)];
        }

        let start_node = self.find_nearest_node(graph, start.latitude, start.longitude);
        let end_node = self.find_nearest_node(graph, end.latitude, end.longitude);
        let (start_node, end_node) = match (start_node, end_node) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                log::warn!("Failed to snap start or end to the road network");
                return vec![self.direct_route(start, end)];
            }
        };

        let primary_path = astar::find_path(
            graph,
            start_node,
            end_node,
            CostModel::Length,
            self.config.step_limit,
        );
        if primary_path.is_empty() {
            log::warn!("No path found via A*, returning direct route");
            return vec![self.direct_route(start, end)];
        }

        let primary = self.build_route(graph, &primary_path, start, end, CostModel::Length);
        let mut routes = vec![primary];

        for model in [CostModel::Fastest, CostModel::NoHighways] {
            let path =
                astar::find_path(graph, start_node, end_node, model, self.config.step_limit);
            if path.is_empty() {
                continue;
            }
            let alternative = self.build_route(graph, &path, start, end, model);
            if different_enough(&routes[0], &alternative) {
                routes.push(alternative);
            }
        }

        log::info!("Generated {} routes", routes.len());
        routes
    }

    /// Snap a free coordinate to the road network.
    ///
    /// Tracks the nearest segment endpoint first; when the coordinate
    /// projects onto the interior of a segment strictly closer than any
    /// endpoint, the segment is split there and the synthetic projected
    /// node wins. Splitting appends one node and two segments and must
    /// not run concurrently with readers, which the `&mut` borrow
    /// enforces.
    fn find_nearest_node(&self, graph: &mut RoadGraph, lat: f64, lon: f64) -> Option<NodeId> {
        let candidates = graph.find_nearby(lat, lon, self.config.snap_radius_m);
        if candidates.is_empty() {
            log::warn!("No roads found near ({:.6}, {:.6})", lat, lon);
            return None;
        }

        let mut best: Option<NodeId> = None;
        let mut best_distance = f64::INFINITY;
        for &segment_id in &candidates {
            let segment = graph.segment(segment_id);
            for node_id in [segment.from, segment.to] {
                let node = graph.node(node_id);
                let d = haversine_distance(lat, lon, node.latitude, node.longitude);
                if d < best_distance {
                    best_distance = d;
                    best = Some(node_id);
                }
            }
        }

        for segment_id in candidates {
            let (a, b) = graph.segment_endpoints(segment_id);
            let (_, projection) = project_onto_segment((lat, lon), a, b);
            let d = haversine_distance(lat, lon, projection.0, projection.1);
            if d >= best_distance {
                continue;
            }
            let endpoint_gap = self.config.projection_endpoint_gap_m;
            if haversine_distance(projection.0, projection.1, a.0, a.1) < endpoint_gap
                || haversine_distance(projection.0, projection.1, b.0, b.1) < endpoint_gap
            {
                continue;
            }

            best_distance = d;
            best = Some(split_segment_at(graph, segment_id, projection));
        }

        best
    }

    /// Turn a node path into a detailed polyline route.
    fn build_route(
        &self,
        graph: &RoadGraph,
        path: &[NodeId],
        start: Position,
        end: Position,
        model: CostModel,
    ) -> Route {
        let mut points = vec![Position::new(start.latitude, start.longitude)];

        let first = graph.node(path[0]);
        if haversine_distance(start.latitude, start.longitude, first.latitude, first.longitude)
            > self.config.densify_threshold_m
        {
            push_interpolated(
                &mut points,
                (start.latitude, start.longitude),
                (first.latitude, first.longitude),
                3,
            );
        }

        for (i, &node_id) in path.iter().enumerate() {
            let node = graph.node(node_id);
            points.push(Position::new(node.latitude, node.longitude));

            if i + 1 < path.len() {
                let next_id = path[i + 1];
                let connected = node
                    .segments
                    .iter()
                    .any(|&s| graph.segment(s).to == next_id);
                if !connected {
                    // Path nodes without a direct segment between them are
                    // bridged with interpolated gap fillers
                    let next = graph.node(next_id);
                    let gap = haversine_distance(
                        node.latitude,
                        node.longitude,
                        next.latitude,
                        next.longitude,
                    );
                    let fillers =
                        ((gap / self.config.gap_filler_spacing_m).floor() as usize).max(2);
                    push_interpolated(
                        &mut points,
                        (node.latitude, node.longitude),
                        (next.latitude, next.longitude),
                        fillers,
                    );
                }
            }
        }

        let last = graph.node(path[path.len() - 1]);
        if haversine_distance(last.latitude, last.longitude, end.latitude, end.longitude)
            > self.config.densify_threshold_m
        {
            push_interpolated(
                &mut points,
                (last.latitude, last.longitude),
                (end.latitude, end.longitude),
                3,
            );
        }
        points.push(Position::new(end.latitude, end.longitude));

        annotate_motion(&mut points);
        let points = simplify_polyline(points);
        let duration = (route_duration(&points, self.config.fallback_speed_mps)
            / model.duration_factor()) as i32;

        Route {
            id: generate_route_id(),
            name: model.route_name().to_string(),
            points,
            duration_secs: duration,
        }
    }

    /// Straight-line fallback when the graph cannot serve a request.
    fn direct_route(&self, start: Position, end: Position) -> Route {
        let distance = haversine_distance(
            start.latitude,
            start.longitude,
            end.latitude,
            end.longitude,
        );
        let count = ((distance / 25.0).floor() as usize).clamp(20, 1000);

        let mut rng = rand::rng();
        let mut points = Vec::with_capacity(count);
        for i in 0..count {
            let t = i as f64 / (count - 1) as f64;
            let mut lat = start.latitude + t * (end.latitude - start.latitude);
            let mut lon = start.longitude + t * (end.longitude - start.longitude);
            if i > 0 && i < count - 1 {
                // Tiny jitter so the synthetic line does not look like a
                // degenerate polyline to consumers
                lat += rng.random_range(-5e-6..=5e-6);
                lon += rng.random_range(-5e-6..=5e-6);
            }
            points.push(Position::new(lat, lon));
        }

        annotate_motion(&mut points);
        let duration = route_duration(&points, self.config.fallback_speed_mps) as i32;

        Route {
            id: generate_route_id(),
            name: "Direct Route".to_string(),
            points,
            duration_secs: duration,
        }
    }
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a segment at an interior point, returning the new node. The two
/// replacement segments inherit the original's attributes; the original
/// segment remains, the arenas are append-only.
fn split_segment_at(graph: &mut RoadGraph, segment_id: SegmentId, point: (f64, f64)) -> NodeId {
    let segment = graph.segment(segment_id);
    let public_id = segment.id;
    let from = segment.from;
    let to = segment.to;
    let name = segment.name.clone();
    let speed_limit = segment.speed_limit;
    let class = segment.class;
    let one_way = segment.one_way;

    let node_name = format!(
        "projected_{}_{}_{}",
        public_id,
        (point.0 * 1e6) as i64,
        (point.1 * 1e6) as i64
    );
    let projected = graph.add_node(&node_name, point.0, point.1);
    graph.add_segment(from, projected, &name, speed_limit, class, one_way);
    graph.add_segment(projected, to, &name, speed_limit, class, one_way);
    log::debug!("Split segment {} at projected node {}", public_id, node_name);
    projected
}

/// Insert `count` linearly interpolated positions between `a` and `b`
/// (exclusive of both).
fn push_interpolated(points: &mut Vec<Position>, a: (f64, f64), b: (f64, f64), count: usize) {
    for k in 1..=count {
        let t = k as f64 / (count + 1) as f64;
        points.push(Position::new(
            a.0 + t * (b.0 - a.0),
            a.1 + t * (b.1 - a.1),
        ));
    }
}

/// Fill per-point bearings and speeds across a polyline. The last point
/// copies the previous bearing and gets speed 0.
fn annotate_motion(points: &mut [Position]) {
    let n = points.len();
    if n < 2 {
        return;
    }
    for i in 0..n - 1 {
        let d = haversine_distance(
            points[i].latitude,
            points[i].longitude,
            points[i + 1].latitude,
            points[i + 1].longitude,
        );
        points[i].bearing = initial_bearing(
            points[i].latitude,
            points[i].longitude,
            points[i + 1].latitude,
            points[i + 1].longitude,
        ) as f32;
        points[i].speed = (d / 10.0).clamp(5.0, 30.0) as f32;
    }
    points[n - 1].bearing = points[n - 2].bearing;
    points[n - 1].speed = 0.0;
}

/// Two-pass polyline simplification. The first pass drops near-straight,
/// tightly spaced points; the second drops points forming short spikes
/// off the predecessor-successor line. Endpoints always survive.
fn simplify_polyline(points: Vec<Position>) -> Vec<Position> {
    let n = points.len();
    if n <= 2 {
        return points;
    }

    let mut kept = vec![points[0]];
    for i in 1..n - 1 {
        let incoming = initial_bearing(
            points[i - 1].latitude,
            points[i - 1].longitude,
            points[i].latitude,
            points[i].longitude,
        );
        let outgoing = initial_bearing(
            points[i].latitude,
            points[i].longitude,
            points[i + 1].latitude,
            points[i + 1].longitude,
        );
        let retained = kept[kept.len() - 1];
        let spacing = haversine_distance(
            retained.latitude,
            retained.longitude,
            points[i].latitude,
            points[i].longitude,
        );
        if bearing_difference(incoming, outgoing) <= 20.0 && spacing <= 50.0 {
            continue;
        }
        kept.push(points[i]);
    }
    kept.push(points[n - 1]);

    let m = kept.len();
    if m <= 2 {
        return kept;
    }
    let mut result = vec![kept[0]];
    for i in 1..m - 1 {
        let previous = kept[i - 1];
        let next = kept[i + 1];
        let straight = haversine_distance(
            previous.latitude,
            previous.longitude,
            next.latitude,
            next.longitude,
        );
        let through = haversine_distance(
            previous.latitude,
            previous.longitude,
            kept[i].latitude,
            kept[i].longitude,
        ) + haversine_distance(
            kept[i].latitude,
            kept[i].longitude,
            next.latitude,
            next.longitude,
        );
        // Near-collinear: the detour through the point is within 25% of
        // the straight line, so the point carries no direction change
        if straight >= 0.8 * through {
            continue;
        }
        result.push(kept[i]);
    }
    result.push(kept[m - 1]);
    result
}

/// Rough traversal time in seconds; distances are divided by each leg's
/// annotated speed, or by `fallback_speed_mps` when annotations are
/// missing.
fn route_duration(points: &[Position], fallback_speed_mps: f64) -> f64 {
    let mut duration = 0.0;
    for w in points.windows(2) {
        let d = haversine_distance(
            w[0].latitude,
            w[0].longitude,
            w[1].latitude,
            w[1].longitude,
        );
        if w[0].speed as f64 > 0.1 {
            duration += d / w[0].speed as f64;
        } else {
            return total_length(points) / fallback_speed_mps;
        }
    }
    duration
}

fn total_length(points: &[Position]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            haversine_distance(
                w[0].latitude,
                w[0].longitude,
                w[1].latitude,
                w[1].longitude,
            )
        })
        .sum()
}

/// Accept an alternative only when it shares the primary's endpoints but
/// diverges over enough of its length.
fn different_enough(primary: &Route, alternative: &Route) -> bool {
    if primary.points.len() < 2 || alternative.points.len() < 2 {
        return false;
    }

    let (pf, pl) = (primary.points[0], primary.points[primary.points.len() - 1]);
    let (af, al) = (
        alternative.points[0],
        alternative.points[alternative.points.len() - 1],
    );
    if haversine_distance(pf.latitude, pf.longitude, af.latitude, af.longitude) > 100.0
        || haversine_distance(pl.latitude, pl.longitude, al.latitude, al.longitude) > 100.0
    {
        return false;
    }

    let total_primary = total_length(&primary.points);
    let total_alternative = total_length(&alternative.points);

    let samples = 10;
    let mut shared = 0;
    for k in 0..samples {
        let t = k as f64 / (samples - 1) as f64;
        let a = position_along(&primary.points, t * total_primary);
        let b = position_along(&alternative.points, t * total_alternative);
        if haversine_distance(a.0, a.1, b.0, b.1) < 200.0 {
            shared += 1;
        }
    }

    (shared as f64 / samples as f64) < 0.7
}

/// Coordinate at a given distance along a polyline, interpolated within
/// the containing leg.
fn position_along(points: &[Position], distance: f64) -> (f64, f64) {
    let mut remaining = distance;
    for w in points.windows(2) {
        let d = haversine_distance(
            w[0].latitude,
            w[0].longitude,
            w[1].latitude,
            w[1].longitude,
        );
        if remaining <= d {
            if d < 1e-9 {
                return (w[0].latitude, w[0].longitude);
            }
            let t = remaining / d;
            return (
                w[0].latitude + t * (w[1].latitude - w[0].latitude),
                w[0].longitude + t * (w[1].longitude - w[0].longitude),
            );
        }
        remaining -= d;
    }
    let last = points[points.len() - 1];
    (last.latitude, last.longitude)
}

fn generate_route_id() -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut rng = rand::rng();
    let mut id = String::from("route-");
    for _ in 0..8 {
        id.push(DIGITS[rng.random_range(0..16)] as char);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoadClass;

    /// Small 4x4 grid of bidirectional residential streets, 0.001 degrees
    /// apart, anchored at the usual San Francisco corner.
    fn grid_graph() -> RoadGraph {
        let mut graph = RoadGraph::new();
        let mut ids = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                ids.push(graph.add_node(
                    &format!("node_{}_{}", i, j),
                    37.7749 + 0.001 * i as f64,
                    -122.4194 + 0.001 * j as f64,
                ));
            }
        }
        for i in 0..4 {
            for j in 0..4 {
                let here = ids[i * 4 + j];
                if j + 1 < 4 {
                    let east = ids[i * 4 + j + 1];
                    graph.add_segment(here, east, &format!("Street {}", i), 30.0, RoadClass::Residential, false);
                    graph.add_segment(east, here, &format!("Street {}", i), 30.0, RoadClass::Residential, false);
                }
                if i + 1 < 4 {
                    let north = ids[(i + 1) * 4 + j];
                    graph.add_segment(here, north, &format!("Avenue {}", j), 30.0, RoadClass::Residential, false);
                    graph.add_segment(north, here, &format!("Avenue {}", j), 30.0, RoadClass::Residential, false);
                }
            }
        }
        graph
    }

    #[test]
    fn test_route_id_format() {
        let id = generate_route_id();
        assert!(id.starts_with("route-"));
        assert_eq!(id.len(), 14);
        assert!(id[6..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_routes_span_caller_endpoints() {
        let mut graph = grid_graph();
        let engine = RoutingEngine::new();
        let start = Position::new(37.77495, -122.41935);
        let end = Position::new(37.7779, -122.4164);

        let routes = engine.calculate_routes(&mut graph, start, end);
        assert!(!routes.is_empty());
        for route in &routes {
            let first = route.points[0];
            let last = route.points[route.points.len() - 1];
            assert_eq!((first.latitude, first.longitude), (start.latitude, start.longitude));
            assert_eq!((last.latitude, last.longitude), (end.latitude, end.longitude));
        }
    }

    #[test]
    fn test_oversize_request_returns_single_direct_route() {
        let mut graph = grid_graph();
        let engine = RoutingEngine::new();
        let start = Position::new(37.7749, -122.4194);
        let end = Position::new(38.0000, -122.4194); // ~25km north

        let routes = engine.calculate_routes(&mut graph, start, end);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].name, "Direct Route");
        assert!(routes[0].points.len() >= 20);
    }

    #[test]
    fn test_empty_graph_falls_back_to_direct_route() {
        let mut graph = RoadGraph::new();
        let engine = RoutingEngine::new();
        let routes = engine.calculate_routes(
            &mut graph,
            Position::new(37.7749, -122.4194),
            Position::new(37.7779, -122.4194),
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].name, "Direct Route");
    }

    #[test]
    fn test_direct_route_point_count_bounds() {
        let engine = RoutingEngine::new();
        // Short hop still gets 20 points
        let short = engine.direct_route(
            Position::new(37.7749, -122.4194),
            Position::new(37.7750, -122.4194),
        );
        assert_eq!(short.points.len(), 20);

        // A 25km request caps at 1000
        let long = engine.direct_route(
            Position::new(37.7749, -122.4194),
            Position::new(38.0000, -122.4194),
        );
        assert_eq!(long.points.len(), 1000);
    }

    #[test]
    fn test_direct_route_duration_positive() {
        let engine = RoutingEngine::new();
        let route = engine.direct_route(
            Position::new(37.7749, -122.4194),
            Position::new(37.7849, -122.4194),
        );
        assert!(route.duration_secs > 0);
    }

    #[test]
    fn test_projection_splits_segment() {
        let mut graph = RoadGraph::new();
        let a = graph.add_node("a", 37.7749, -122.4194);
        let b = graph.add_node("b", 37.7749, -122.4094); // ~880m east
        graph.add_segment(a, b, "Long Road", 30.0, RoadClass::Residential, false);

        let engine = RoutingEngine::new();
        // 40m north of the middle of the segment
        let snapped = engine
            .find_nearest_node(&mut graph, 37.77526, -122.4144)
            .expect("snap must succeed");

        let node = graph.node(snapped);
        assert!(node.id.starts_with("projected_"), "got node {}", node.id);
        // Split added one node and two segments
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.segment_count(), 3);

        // Length is conserved across the split
        let original = graph.segment(SegmentId(0)).length;
        let first = graph.segment(SegmentId(1)).length;
        let second = graph.segment(SegmentId(2)).length;
        assert!((original - (first + second)).abs() < 1.0);
    }

    #[test]
    fn test_snap_prefers_close_endpoint_over_projection() {
        let mut graph = RoadGraph::new();
        let a = graph.add_node("a", 37.7749, -122.4194);
        let b = graph.add_node("b", 37.7759, -122.4194);
        graph.add_segment(a, b, "Short Road", 30.0, RoadClass::Residential, false);

        let engine = RoutingEngine::new();
        // Right on top of node a: no reason to split
        let snapped = engine.find_nearest_node(&mut graph, 37.77491, -122.4194);
        assert_eq!(snapped, Some(a));
        assert_eq!(graph.segment_count(), 1);
    }

    #[test]
    fn test_annotate_motion_speed_bounds() {
        let mut points = vec![
            Position::new(37.7749, -122.4194),
            Position::new(37.7750, -122.4194), // ~11m leg -> clamped to 5
            Position::new(37.7790, -122.4194), // ~440m leg -> clamped to 30
            Position::new(37.7791, -122.4194),
        ];
        annotate_motion(&mut points);

        assert_eq!(points[0].speed, 5.0);
        assert_eq!(points[1].speed, 30.0);
        assert_eq!(points[3].speed, 0.0);
        assert_eq!(points[3].bearing, points[2].bearing);
    }

    #[test]
    fn test_simplify_drops_collinear_clutter() {
        // Dense straight line: everything between the endpoints is
        // redundant
        let mut points: Vec<Position> = (0..10)
            .map(|i| Position::new(37.7749 + 0.0001 * i as f64, -122.4194))
            .collect();
        annotate_motion(&mut points);

        let simplified = simplify_polyline(points);
        assert!(simplified.len() < 10);
        assert_eq!(simplified[0].latitude, 37.7749);
        let last = simplified[simplified.len() - 1];
        assert!((last.latitude - 37.7758).abs() < 1e-9);
    }

    #[test]
    fn test_simplify_keeps_corners() {
        // L-shape: east then north, corner must survive
        let mut points = vec![
            Position::new(37.7749, -122.4194),
            Position::new(37.7749, -122.4184),
            Position::new(37.7759, -122.4184),
        ];
        annotate_motion(&mut points);

        let simplified = simplify_polyline(points);
        assert_eq!(simplified.len(), 3);
    }

    #[test]
    fn test_different_enough_rejects_same_polyline() {
        let mut graph = grid_graph();
        let engine = RoutingEngine::new();
        let routes = engine.calculate_routes(
            &mut graph,
            Position::new(37.7749, -122.4194),
            Position::new(37.7779, -122.4164),
        );
        let primary = &routes[0];
        assert!(!different_enough(primary, primary));
    }

    #[test]
    fn test_different_enough_rejects_moved_endpoints() {
        let engine = RoutingEngine::new();
        let a = engine.direct_route(
            Position::new(37.7749, -122.4194),
            Position::new(37.7779, -122.4194),
        );
        let b = engine.direct_route(
            Position::new(37.7849, -122.4194), // >100m away
            Position::new(37.7879, -122.4194),
        );
        assert!(!different_enough(&a, &b));
    }

    #[test]
    fn test_position_along_walks_polyline() {
        let mut points = vec![
            Position::new(37.7749, -122.4194),
            Position::new(37.7759, -122.4194),
            Position::new(37.7769, -122.4194),
        ];
        annotate_motion(&mut points);
        let total = total_length(&points);

        let (lat, _) = position_along(&points, total / 2.0);
        assert!((lat - 37.7759).abs() < 0.0001);

        let (lat, _) = position_along(&points, total * 2.0);
        assert_eq!(lat, 37.7769);
    }
}
