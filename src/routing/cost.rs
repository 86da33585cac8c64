use crate::graph::road_graph::RoadSegment;
use crate::types::RoadClass;

/// Pluggable edge-cost model for route search.
///
/// Enum dispatch keeps the A* inner loop monomorphic; each variant also
/// carries the duration policy applied to the finished route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CostModel {
    /// Shortest path by segment length.
    Length,
    /// Favours higher speed limits.
    Fastest,
    /// Heavily penalizes highway-class segments.
    NoHighways,
}

impl CostModel {
    pub fn edge_cost(&self, segment: &RoadSegment) -> f64 {
        match self {
            CostModel::Length => segment.length,
            CostModel::Fastest => segment.length * (50.0 / segment.speed_limit),
            CostModel::NoHighways => {
                let penalty = if segment.class == RoadClass::Highway { 10.0 } else { 1.0 };
                segment.length * penalty
            }
        }
    }

    /// Divisor applied to the computed duration of the finished route.
    pub fn duration_factor(&self) -> f64 {
        match self {
            CostModel::Length => 1.0,
            CostModel::Fastest => 1.2,
            CostModel::NoHighways => 0.8,
        }
    }

    pub fn route_name(&self) -> &'static str {
        match self {
            CostModel::Length => "Route to Destination",
            CostModel::Fastest => "Fastest Route",
            CostModel::NoHighways => "Avoid Highways",
        }
    }
}
