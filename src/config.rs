//! Tunable parameters for the processing stages.
//!
//! Every component ships defaults matching the production tuning; hosts
//! that need different behavior construct the engine through
//! [EngineConfig](crate::config::EngineConfig) instead of patching
//! constants.

/// Location filter tuning.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    pub initial_position_variance: f64,
    pub initial_velocity_variance: f64,
    pub process_noise_position: f64,
    pub process_noise_velocity: f64,
    pub base_measurement_noise: f64,
    /// Kalman gain clamp, lower bound.
    pub gain_min: f64,
    /// Kalman gain clamp, upper bound.
    pub gain_max: f64,
    /// Weight of the previous velocity estimate in the exponential
    /// smoother; the new estimate gets the complement.
    pub velocity_smoothing: f64,
    /// Per-step velocity fence in degrees/s. Deliberately loose; it only
    /// rejects teleports.
    pub max_velocity_change: f64,
    /// Scale applied to the reported accuracy on output.
    pub output_accuracy_factor: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            initial_position_variance: 10.0,
            initial_velocity_variance: 5.0,
            process_noise_position: 0.01,
            process_noise_velocity: 0.1,
            base_measurement_noise: 5.0,
            gain_min: 0.1,
            gain_max: 0.9,
            velocity_smoothing: 0.7,
            max_velocity_change: 10.0,
            output_accuracy_factor: 0.8,
        }
    }
}

/// Routing tuning.
#[derive(Clone, Debug)]
pub struct RoutingConfig {
    /// Beyond this direct span the engine skips graph routing entirely.
    pub max_route_distance_m: f64,
    /// Search radius when snapping a free coordinate to the network.
    pub snap_radius_m: f64,
    /// Minimum clearance from both endpoints before an on-edge
    /// projection is worth a segment split.
    pub projection_endpoint_gap_m: f64,
    /// Distance above which route ends are densified with interpolated
    /// points.
    pub densify_threshold_m: f64,
    /// Target spacing of gap fillers between unconnected path nodes.
    pub gap_filler_spacing_m: f64,
    /// Average speed assumed when a polyline carries no usable speeds.
    pub fallback_speed_mps: f64,
    /// Node expansions allowed per search before falling back to a
    /// direct route.
    pub step_limit: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_route_distance_m: 10_000.0,
            snap_radius_m: 10_000.0,
            projection_endpoint_gap_m: 10.0,
            densify_threshold_m: 10.0,
            gap_filler_spacing_m: 20.0,
            fallback_speed_mps: 9.72, // ~35 km/h
            step_limit: crate::routing::astar::DEFAULT_STEP_LIMIT,
        }
    }
}

/// Route matcher tuning.
#[derive(Clone, Debug)]
pub struct MatcherConfig {
    /// Inter-point gap that triggers a warning when a route is adopted.
    pub gap_warning_m: f64,
    /// Radius for associating route legs with road segments, and the
    /// widened retry radius.
    pub association_radius_m: f64,
    pub association_wide_radius_m: f64,
    /// Radius for per-fix candidate lookup, and the widened retry
    /// radius.
    pub candidate_radius_m: f64,
    pub candidate_wide_radius_m: f64,
    /// Segment-to-route distance below which a segment counts as lying
    /// on the route.
    pub on_route_threshold_m: f64,
    /// Perpendicular distance beyond which a candidate is rejected.
    pub max_match_distance_m: f64,
    /// Bearing change that counts as a maneuver.
    pub maneuver_threshold_deg: f64,
    /// Along-leg progress past which the closest index advances.
    pub advance_progress: f64,
    /// Bearing agreement required for the index advance.
    pub advance_bearing_tolerance_deg: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            gap_warning_m: 50.0,
            association_radius_m: 50.0,
            association_wide_radius_m: 100.0,
            candidate_radius_m: 100.0,
            candidate_wide_radius_m: 300.0,
            on_route_threshold_m: 20.0,
            max_match_distance_m: 50.0,
            maneuver_threshold_deg: 30.0,
            advance_progress: 0.7,
            advance_bearing_tolerance_deg: 45.0,
        }
    }
}

/// Bundled configuration for the whole engine.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    pub filter: FilterConfig,
    pub routing: RoutingConfig,
    pub matcher: MatcherConfig,
}
