use std::collections::{HashMap, HashSet};

use crate::geodesy::METERS_PER_DEGREE;
use crate::graph::road_graph::SegmentId;

/// Grid cell side in degrees, roughly 111 meters of latitude.
pub const CELL_SIZE_DEG: f64 = 0.001;

/// Bucketed grid over road segments.
///
/// Each segment is registered in every cell its axis-aligned bounding box
/// overlaps, so a radius query only has to union a small neighborhood of
/// buckets. A flat list of all segments backs the wide-radius fallback.
pub struct SpatialIndex {
    cells: HashMap<(i32, i32), Vec<SegmentId>>,
    all: Vec<SegmentId>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        SpatialIndex {
            cells: HashMap::new(),
            all: Vec::new(),
        }
    }

    /// Register a segment by its endpoint coordinates.
    pub fn add_segment(
        &mut self,
        segment: SegmentId,
        start: (f64, f64),
        end: (f64, f64),
    ) {
        let lat_min = start.0.min(end.0);
        let lat_max = start.0.max(end.0);
        let lon_min = start.1.min(end.1);
        let lon_max = start.1.max(end.1);

        let i_min = cell_of(lat_min);
        let i_max = cell_of(lat_max);
        let j_min = cell_of(lon_min);
        let j_max = cell_of(lon_max);

        for i in i_min..=i_max {
            for j in j_min..=j_max {
                self.cells.entry((i, j)).or_default().push(segment);
            }
        }
        self.all.push(segment);
    }

    /// All segments registered in cells within `radius_m` of the query
    /// point, deduplicated.
    ///
    /// An empty result with a radius above a kilometer falls back to every
    /// known segment, so a sparse area never starves the caller.
    pub fn find_nearby(&self, lat: f64, lon: f64, radius_m: f64) -> Vec<SegmentId> {
        let center_i = cell_of(lat);
        let center_j = cell_of(lon);
        let cell_radius = (((radius_m / METERS_PER_DEGREE) / CELL_SIZE_DEG).ceil() as i32 + 1)
            .max(1);

        let mut found: HashSet<SegmentId> = HashSet::new();
        for i in (center_i - cell_radius)..=(center_i + cell_radius) {
            for j in (center_j - cell_radius)..=(center_j + cell_radius) {
                if let Some(bucket) = self.cells.get(&(i, j)) {
                    found.extend(bucket.iter().copied());
                }
            }
        }

        if found.is_empty() && radius_m > 1000.0 {
            return self.all.clone();
        }

        found.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_of(degrees: f64) -> i32 {
    (degrees / CELL_SIZE_DEG).floor() as i32
}
