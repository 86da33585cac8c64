use crate::config::MatcherConfig;
use crate::geodesy::{
    bearing_difference, haversine_distance, initial_bearing, project_onto_segment,
    signed_bearing_change,
};
use crate::graph::road_graph::{RoadGraph, SegmentId};
use crate::types::{Observation, Position, Route};

/// Snaps filtered fixes onto the active route and reports the road, the
/// upcoming maneuver, and the distance to it.
///
/// `set_route` precomputes cumulative distances along the polyline and an
/// association from route legs to road segments; the per-fix path then
/// only has to score the handful of segments near the fix.
pub struct RouteMatcher {
    config: MatcherConfig,
    route: Option<Route>,
    cumulative: Vec<f64>,
    route_segments: Vec<SegmentId>,
    last_fix: Option<Position>,
}

impl RouteMatcher {
    pub fn new() -> Self {
        Self::with_config(MatcherConfig::default())
    }

    pub fn with_config(config: MatcherConfig) -> Self {
        log::info!("RouteMatcher created");
        RouteMatcher {
            config,
            route: None,
            cumulative: Vec::new(),
            route_segments: Vec::new(),
            last_fix: None,
        }
    }

    /// Adopt a route, replacing any previous matching state.
    pub fn set_route(&mut self, graph: &RoadGraph, route: Route) {
        log::info!("Setting route with {} points", route.points.len());

        self.cumulative = cumulative_distances(&route.points);
        for (i, w) in route.points.windows(2).enumerate() {
            let gap = haversine_distance(
                w[0].latitude,
                w[0].longitude,
                w[1].latitude,
                w[1].longitude,
            );
            if gap > self.config.gap_warning_m {
                log::warn!("Route gap of {:.0}m between points {} and {}", gap, i, i + 1);
            }
        }

        self.route_segments = associate_route_segments(graph, &route.points, &self.config);
        self.route = Some(route);
    }

    pub fn active_route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// The last fix handed to `match_fix`, if any.
    pub fn current_fix(&self) -> Option<Position> {
        self.last_fix
    }

    /// Match a filtered fix against the active route.
    pub fn match_fix(&mut self, graph: &RoadGraph, fix: Position) -> Observation {
        self.last_fix = Some(fix);

        let route = match &self.route {
            Some(route) => route,
            None => return no_route_observation(fix),
        };
        let points = &route.points;
        if points.len() < 2 {
            return no_route_observation(fix);
        }

        let closest_idx = self.closest_point_index(fix, points);

        // Score nearby road segments, preferring those associated with
        // the route
        let mut candidates =
            graph.find_nearby(fix.latitude, fix.longitude, self.config.candidate_radius_m);
        if candidates.is_empty() {
            candidates = graph.find_nearby(
                fix.latitude,
                fix.longitude,
                self.config.candidate_wide_radius_m,
            );
        }
        let on_route: Vec<SegmentId> = candidates
            .iter()
            .copied()
            .filter(|&s| is_segment_on_route(graph, s, points, self.config.on_route_threshold_m))
            .collect();
        let pool = if on_route.is_empty() { candidates } else { on_route };

        let best = self.score_candidates(graph, fix, &pool);

        let (street_name, matched) = match best {
            Some((segment_id, projection)) => {
                let name = graph.segment(segment_id).name.clone();
                let street = if name.is_empty() { "Unknown Road".to_string() } else { name };
                (street, projection)
            }
            None => (
                "Unknown Road".to_string(),
                (fix.latitude, fix.longitude),
            ),
        };

        let maneuver_idx =
            next_maneuver_index(points, closest_idx, self.config.maneuver_threshold_deg);
        let distance_to_next = self.cumulative[maneuver_idx] - self.cumulative[closest_idx];

        let next_maneuver = if maneuver_idx == points.len() - 1 {
            "Arrive at destination".to_string()
        } else {
            let incoming = initial_bearing(
                points[maneuver_idx - 1].latitude,
                points[maneuver_idx - 1].longitude,
                points[maneuver_idx].latitude,
                points[maneuver_idx].longitude,
            );
            let outgoing = initial_bearing(
                points[maneuver_idx].latitude,
                points[maneuver_idx].longitude,
                points[maneuver_idx + 1].latitude,
                points[maneuver_idx + 1].longitude,
            );
            classify_maneuver(signed_bearing_change(incoming, outgoing)).to_string()
        };

        Observation {
            street_name,
            next_maneuver,
            distance_to_next_m: distance_to_next as i32,
            eta: String::new(),
            matched_latitude: matched.0,
            matched_longitude: matched.1,
            matched_bearing: fix.bearing,
        }
    }

    /// Index of the route point nearest the fix, advanced by one when the
    /// fix has clearly progressed past it towards the next point.
    fn closest_point_index(&self, fix: Position, points: &[Position]) -> usize {
        let mut closest = 0;
        let mut closest_distance = f64::INFINITY;
        for (i, p) in points.iter().enumerate() {
            let d = haversine_distance(fix.latitude, fix.longitude, p.latitude, p.longitude);
            if d < closest_distance {
                closest_distance = d;
                closest = i;
            }
        }

        if closest + 1 < points.len() {
            let (progress, _) = project_onto_segment(
                (fix.latitude, fix.longitude),
                (points[closest].latitude, points[closest].longitude),
                (points[closest + 1].latitude, points[closest + 1].longitude),
            );
            let towards_next = initial_bearing(
                fix.latitude,
                fix.longitude,
                points[closest + 1].latitude,
                points[closest + 1].longitude,
            );
            if progress > self.config.advance_progress
                && fix.has_bearing()
                && bearing_difference(towards_next, fix.bearing as f64)
                    <= self.config.advance_bearing_tolerance_deg
            {
                closest += 1;
            }
        }

        closest
    }

    /// Pick the lowest-scoring candidate segment and the fix's projection
    /// onto it.
    fn score_candidates(
        &self,
        graph: &RoadGraph,
        fix: Position,
        pool: &[SegmentId],
    ) -> Option<(SegmentId, (f64, f64))> {
        let mut best: Option<(SegmentId, (f64, f64))> = None;
        let mut best_score = f64::INFINITY;

        for &segment_id in pool {
            let (a, b) = graph.segment_endpoints(segment_id);
            let (_, projection) = project_onto_segment((fix.latitude, fix.longitude), a, b);
            let distance =
                haversine_distance(fix.latitude, fix.longitude, projection.0, projection.1);
            if distance > self.config.max_match_distance_m {
                continue;
            }

            let bearing_factor = if fix.has_bearing() {
                bearing_difference(graph.segment_bearing(segment_id), fix.bearing as f64) / 180.0
            } else {
                0.0
            };

            let on_route_bonus = if self.route_segments.contains(&segment_id) { 0.5 } else { 1.0 };

            let segment = graph.segment(segment_id);
            let mut speed_factor = 1.0;
            if fix.has_speed() {
                let speed = fix.speed as f64;
                if speed > 1.0 {
                    if segment.speed_limit > 60.0 {
                        speed_factor = 0.8;
                    } else if segment.speed_limit < 30.0 && speed > 10.0 {
                        speed_factor = 1.2;
                    }
                }
                // A near-stationary fix on a fast road is suspicious
                if speed < 5.0 && segment.speed_limit > 70.0 {
                    speed_factor = 1.2;
                }
            }

            let score = (distance + bearing_factor * 50.0) * on_route_bonus * speed_factor;
            if score < best_score {
                best_score = score;
                best = Some((segment_id, projection));
            }
        }

        best
    }
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn no_route_observation(fix: Position) -> Observation {
    Observation {
        street_name: "No active route".to_string(),
        next_maneuver: "Set a destination".to_string(),
        distance_to_next_m: 0,
        eta: String::new(),
        matched_latitude: fix.latitude,
        matched_longitude: fix.longitude,
        matched_bearing: fix.bearing,
    }
}

fn cumulative_distances(points: &[Position]) -> Vec<f64> {
    let mut cumulative = Vec::with_capacity(points.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for w in points.windows(2) {
        total += haversine_distance(
            w[0].latitude,
            w[0].longitude,
            w[1].latitude,
            w[1].longitude,
        );
        cumulative.push(total);
    }
    cumulative
}

/// Associate each route leg with the best nearby road segment, scored by
/// midpoint distance plus a bearing mismatch penalty.
fn associate_route_segments(
    graph: &RoadGraph,
    points: &[Position],
    config: &MatcherConfig,
) -> Vec<SegmentId> {
    let mut segments = Vec::new();

    for w in points.windows(2) {
        let midpoint = (
            (w[0].latitude + w[1].latitude) / 2.0,
            (w[0].longitude + w[1].longitude) / 2.0,
        );
        let leg_bearing = initial_bearing(
            w[0].latitude,
            w[0].longitude,
            w[1].latitude,
            w[1].longitude,
        );

        let mut nearby = graph.find_nearby(midpoint.0, midpoint.1, config.association_radius_m);
        if nearby.is_empty() {
            nearby =
                graph.find_nearby(midpoint.0, midpoint.1, config.association_wide_radius_m);
        }

        let mut best: Option<SegmentId> = None;
        let mut best_score = f64::INFINITY;
        for segment_id in nearby {
            let (a, b) = graph.segment_endpoints(segment_id);
            let (_, projection) = project_onto_segment(midpoint, a, b);
            let distance = haversine_distance(midpoint.0, midpoint.1, projection.0, projection.1);
            let bearing_penalty =
                bearing_difference(graph.segment_bearing(segment_id), leg_bearing) / 45.0 * 20.0;
            let score = distance + bearing_penalty;
            if score < best_score {
                best_score = score;
                best = Some(segment_id);
            }
        }
        if let Some(segment_id) = best {
            segments.push(segment_id);
        }
    }

    segments
}

/// Whether a road segment lies along the route polyline: any endpoint
/// pairing below the threshold, or a projection-based segment-to-segment
/// distance below it.
fn is_segment_on_route(
    graph: &RoadGraph,
    segment_id: SegmentId,
    points: &[Position],
    threshold_m: f64,
) -> bool {
    let (s1, s2) = graph.segment_endpoints(segment_id);

    for w in points.windows(2) {
        let a = (w[0].latitude, w[0].longitude);
        let b = (w[1].latitude, w[1].longitude);

        let endpoint_distances = [
            haversine_distance(s1.0, s1.1, a.0, a.1),
            haversine_distance(s1.0, s1.1, b.0, b.1),
            haversine_distance(s2.0, s2.1, a.0, a.1),
            haversine_distance(s2.0, s2.1, b.0, b.1),
        ];
        if endpoint_distances.iter().any(|&d| d < threshold_m) {
            return true;
        }

        let projected = [
            (s1, project_onto_segment(s1, a, b).1),
            (s2, project_onto_segment(s2, a, b).1),
            (a, project_onto_segment(a, s1, s2).1),
            (b, project_onto_segment(b, s1, s2).1),
        ];
        if projected
            .iter()
            .any(|(p, q)| haversine_distance(p.0, p.1, q.0, q.1) < threshold_m)
        {
            return true;
        }
    }

    false
}

/// First index past `from` where the route bends by more than the
/// maneuver threshold; the last index when the remainder is straight.
fn next_maneuver_index(points: &[Position], from: usize, threshold_deg: f64) -> usize {
    let n = points.len();
    for i in from.max(1)..n.saturating_sub(1) {
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
        if signed_bearing_change(incoming, outgoing).abs() > threshold_deg {
            return i;
        }
    }
    n - 1
}

/// Classify a signed bearing change into an instruction. Positive turns
/// right, negative turns left.
fn classify_maneuver(change: f64) -> &'static str {
    if !change.is_finite() {
        return "Follow route";
    }
    let magnitude = change.abs();
    if magnitude < 20.0 {
        "Continue straight"
    } else if change > 0.0 {
        if magnitude < 60.0 {
            "Turn slight right"
        } else if magnitude < 120.0 {
            "Turn right"
        } else {
            "Sharp right"
        }
    } else if magnitude < 60.0 {
        "Turn slight left"
    } else if magnitude < 120.0 {
        "Turn left"
    } else {
        "Sharp left"
    }
}
