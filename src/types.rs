use serde::{Deserialize, Serialize};

/// A positioning sample or polyline vertex.
///
/// Bearing and speed may be absent, signalled by NaN; consumers treat NaN
/// as "derive locally". Bearing is degrees in [0, 360), speed is m/s,
/// accuracy is meters (1-sigma radius reported by the host).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: f32,
    pub speed: f32,
    pub accuracy: f32,
}

impl Position {
    /// Bare coordinate with no bearing/speed information.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Position {
            latitude,
            longitude,
            bearing: f32::NAN,
            speed: f32::NAN,
            accuracy: 0.0,
        }
    }

    pub fn with_motion(
        latitude: f64,
        longitude: f64,
        bearing: f32,
        speed: f32,
        accuracy: f32,
    ) -> Self {
        Position {
            latitude,
            longitude,
            bearing,
            speed,
            accuracy,
        }
    }

    /// Whether the host supplied a usable bearing.
    pub fn has_bearing(&self) -> bool {
        self.bearing.is_finite()
    }

    /// Whether the host supplied a usable speed.
    pub fn has_speed(&self) -> bool {
        self.speed.is_finite()
    }
}

/// Road category used for edge costs and speed-limit defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadClass {
    Highway,
    Primary,
    Secondary,
    Residential,
    Service,
}

impl RoadClass {
    /// Default speed limit (km/h) when the map dump carries no maxspeed.
    pub fn default_speed_kph(&self) -> f64 {
        match self {
            RoadClass::Highway => 100.0,
            RoadClass::Primary => 70.0,
            RoadClass::Secondary => 50.0,
            RoadClass::Residential => 30.0,
            RoadClass::Service => 20.0,
        }
    }

    /// Classify an OSM-style highway tag value.
    pub(crate) fn from_highway_tag(tag: &str) -> Self {
        match tag {
            "motorway" | "trunk" | "motorway_link" | "trunk_link" => RoadClass::Highway,
            "primary" | "secondary" | "primary_link" | "secondary_link" => RoadClass::Primary,
            "tertiary" | "unclassified" | "tertiary_link" => RoadClass::Secondary,
            "residential" | "living_street" => RoadClass::Residential,
            "service" | "track" => RoadClass::Service,
            _ => RoadClass::Residential,
        }
    }
}

/// An ordered polyline from origin to destination with derived bearings,
/// speeds, and a rough duration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub points: Vec<Position>,
    pub duration_secs: i32,
}

impl Route {
    /// Total polyline length in meters.
    pub fn total_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| {
                crate::geodesy::haversine_distance(
                    w[0].latitude,
                    w[0].longitude,
                    w[1].latitude,
                    w[1].longitude,
                )
            })
            .sum()
    }
}

/// What the engine reports back for every positioning update: the matched
/// road, the upcoming maneuver, and the snapped position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    pub street_name: String,
    pub next_maneuver: String,
    pub distance_to_next_m: i32,
    pub eta: String,
    pub matched_latitude: f64,
    pub matched_longitude: f64,
    pub matched_bearing: f32,
}
