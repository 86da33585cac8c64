use chrono::Utc;

use crate::config::FilterConfig;
use crate::geodesy::METERS_PER_DEGREE;
use crate::types::Position;

/// Constant-velocity smoother over raw lat/lon, treated as Cartesian axes.
///
/// A simplified per-axis Kalman filter: one shared gain for both axes,
/// adaptive measurement noise from the reported accuracy, and exponential
/// smoothing on the derived velocity. Velocities are degrees per second;
/// the meters conversion happens only when deriving the output speed.
pub struct LocationFilter {
    config: FilterConfig,
    initialized: bool,
    lat: f64,
    lon: f64,
    lat_vel: f64,
    lon_vel: f64,
    position_variance: f64,
    velocity_variance: f64,
    last_timestamp_ms: i64,
}

impl LocationFilter {
    pub fn new() -> Self {
        Self::with_config(FilterConfig::default())
    }

    pub fn with_config(config: FilterConfig) -> Self {
        log::info!("LocationFilter created");
        LocationFilter {
            initialized: false,
            lat: 0.0,
            lon: 0.0,
            lat_vel: 0.0,
            lon_vel: 0.0,
            position_variance: config.initial_position_variance,
            velocity_variance: config.initial_velocity_variance,
            last_timestamp_ms: 0,
            config,
        }
    }

    /// Filter a raw fix against the current wall clock.
    pub fn process(&mut self, raw: Position) -> Position {
        self.process_at(raw, Utc::now().timestamp_millis())
    }

    /// Filter a raw fix with an explicit timestamp in epoch milliseconds.
    ///
    /// The first fix initializes the state and passes through unchanged.
    /// Non-finite coordinates pass through without touching the state.
    pub fn process_at(&mut self, raw: Position, now_ms: i64) -> Position {
        if !raw.latitude.is_finite() || !raw.longitude.is_finite() {
            log::warn!(
                "Ignoring malformed fix: lat={}, lon={}",
                raw.latitude,
                raw.longitude
            );
            return raw;
        }

        if !self.initialized {
            self.lat = raw.latitude;
            self.lon = raw.longitude;
            self.lat_vel = 0.0;
            self.lon_vel = 0.0;
            self.initialized = true;
            self.last_timestamp_ms = now_ms;
            log::info!("Filter initialized with location: {:.6}, {:.6}", self.lat, self.lon);
            return raw;
        }

        let mut dt = (now_ms - self.last_timestamp_ms) as f64 / 1000.0;
        if dt <= 0.0 || dt > 10.0 {
            log::debug!("Invalid time delta: {:.3} seconds, resetting to 0.1", dt);
            dt = 0.1;
        }
        self.last_timestamp_ms = now_ms;

        // Adaptive measurement noise based on the reported accuracy
        let measurement_noise = if raw.accuracy > 0.0 {
            self.config.base_measurement_noise * (raw.accuracy as f64 / 10.0)
        } else {
            self.config.base_measurement_noise
        };

        // Predict
        let predicted_lat = self.lat + self.lat_vel * dt;
        let predicted_lon = self.lon + self.lon_vel * dt;
        let predicted_pos_var = self.position_variance
            + self.config.process_noise_position
            + self.velocity_variance * dt * dt;
        let predicted_vel_var = self.velocity_variance + self.config.process_noise_velocity;

        // One gain shared by both axes
        let k = (predicted_pos_var / (predicted_pos_var + measurement_noise))
            .clamp(self.config.gain_min, self.config.gain_max);

        self.lat = predicted_lat + k * (raw.latitude - predicted_lat);
        self.lon = predicted_lon + k * (raw.longitude - predicted_lon);

        let fence = self.config.max_velocity_change;
        let new_lat_vel =
            clamp_velocity_step(self.lat_vel, (raw.latitude - predicted_lat) / dt, fence);
        let new_lon_vel =
            clamp_velocity_step(self.lon_vel, (raw.longitude - predicted_lon) / dt, fence);

        let alpha = self.config.velocity_smoothing;
        self.lat_vel = self.lat_vel * alpha + new_lat_vel * (1.0 - alpha);
        self.lon_vel = self.lon_vel * alpha + new_lon_vel * (1.0 - alpha);

        self.position_variance = (1.0 - k) * predicted_pos_var;
        self.velocity_variance = (1.0 - k) * predicted_vel_var;

        // Derive bearing and speed from the velocity estimate when it is
        // large enough to carry direction information
        let velocity_magnitude =
            (self.lat_vel * self.lat_vel + self.lon_vel * self.lon_vel).sqrt();
        let mut derived_bearing = raw.bearing;
        let mut derived_speed = raw.speed;
        if velocity_magnitude > 1e-5 {
            derived_bearing =
                crate::geodesy::normalize_bearing(self.lon_vel.atan2(self.lat_vel).to_degrees())
                    as f32;
            derived_speed = (velocity_magnitude * METERS_PER_DEGREE) as f32;
        }

        Position {
            latitude: self.lat,
            longitude: self.lon,
            bearing: if raw.bearing.is_finite() { raw.bearing } else { derived_bearing },
            speed: if raw.speed.is_finite() { raw.speed } else { derived_speed },
            accuracy: raw.accuracy * self.config.output_accuracy_factor,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn last_timestamp_ms(&self) -> i64 {
        self.last_timestamp_ms
    }

    /// Current velocity estimate in degrees per second, (lat, lon).
    pub fn velocity(&self) -> (f64, f64) {
        (self.lat_vel, self.lon_vel)
    }
}

impl Default for LocationFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_velocity_step(previous: f64, new: f64, fence: f64) -> f64 {
    let step = new - previous;
    if step.abs() > fence {
        previous + fence.copysign(step)
    } else {
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64, lon: f64, accuracy: f32) -> Position {
        Position {
            latitude: lat,
            longitude: lon,
            bearing: f32::NAN,
            speed: f32::NAN,
            accuracy,
        }
    }

    #[test]
    fn test_first_fix_passes_through() {
        let mut filter = LocationFilter::new();
        let raw = fix(37.7755, -122.4189, 5.0);
        let out = filter.process_at(raw, 1_000);

        assert_eq!(out.latitude, raw.latitude);
        assert_eq!(out.longitude, raw.longitude);
        assert_eq!(out.accuracy, raw.accuracy);
        assert!(filter.is_initialized());
        assert_eq!(filter.last_timestamp_ms(), 1_000);
    }

    #[test]
    fn test_malformed_fix_does_not_touch_state() {
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7755, -122.4189, 5.0), 1_000);

        let out = filter.process_at(fix(f64::NAN, -122.4189, 5.0), 2_000);
        assert!(out.latitude.is_nan());
        // Timestamp stays at the last valid fix
        assert_eq!(filter.last_timestamp_ms(), 1_000);
    }

    #[test]
    fn test_accuracy_scaled_on_output() {
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7755, -122.4189, 5.0), 1_000);
        let out = filter.process_at(fix(37.7756, -122.4189, 5.0), 2_000);
        assert!((out.accuracy - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_dt_is_replaced() {
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7755, -122.4189, 5.0), 10_000);

        // Clock going backwards still updates the stored timestamp and
        // produces a finite result (dt forced to 0.1s)
        let out = filter.process_at(fix(37.7756, -122.4189, 5.0), 9_000);
        assert!(out.latitude.is_finite());
        assert_eq!(filter.last_timestamp_ms(), 9_000);
    }

    #[test]
    fn test_outlier_jump_is_damped() {
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7755, -122.4189, 5.0), 1_000);

        // 10ms later the fix teleports ~2.7km away
        let out = filter.process_at(fix(37.8000, -122.4000, 5.0), 1_010);
        assert_eq!(filter.last_timestamp_ms(), 1_010);

        let raw_jump = 37.8000 - 37.7755;
        let filtered_jump = out.latitude - 37.7755;
        assert!(
            filtered_jump < raw_jump,
            "gain clamp should damp the jump: moved {} of {}",
            filtered_jump,
            raw_jump
        );
        assert!(out.latitude > 37.7755, "filtered position still moves towards the fix");
    }

    #[test]
    fn test_bearing_and_speed_derived_from_motion() {
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7749, -122.4194, 5.0), 0);

        // Move steadily north; derived bearing should settle near 0/360
        let mut out = fix(0.0, 0.0, 0.0);
        for i in 1..6 {
            out = filter.process_at(
                fix(37.7749 + 0.0001 * i as f64, -122.4194, 5.0),
                i * 1_000,
            );
        }
        assert!(out.has_bearing());
        assert!(out.has_speed());
        let b = out.bearing;
        assert!(b < 20.0 || b > 340.0, "northward bearing expected, got {}", b);
        assert!(out.speed > 0.0);
    }

    #[test]
    fn test_raw_bearing_wins_over_derived() {
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7749, -122.4194, 5.0), 0);

        let mut raw = fix(37.7750, -122.4194, 5.0);
        raw.bearing = 123.0;
        raw.speed = 7.5;
        let out = filter.process_at(raw, 1_000);
        assert_eq!(out.bearing, 123.0);
        assert_eq!(out.speed, 7.5);
    }

    #[test]
    fn test_stationary_keeps_nan_bearing() {
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7749, -122.4194, 5.0), 0);
        let out = filter.process_at(fix(37.7749, -122.4194, 5.0), 1_000);
        // No motion, no raw bearing: nothing to derive from
        assert!(!out.has_bearing());
    }

    #[test]
    fn test_gain_clamp_saturates_low() {
        // Terrible accuracy inflates the measurement noise far beyond the
        // predicted variance, so the raw gain would drop below the clamp
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7749, -122.4194, 1000.0), 0);
        let out = filter.process_at(fix(37.7759, -122.4194, 1000.0), 1_000);

        let moved_fraction = (out.latitude - 37.7749) / 0.001;
        assert!(
            (moved_fraction - 0.1).abs() < 0.01,
            "gain should saturate at 0.1, moved {}",
            moved_fraction
        );
    }

    #[test]
    fn test_gain_clamp_saturates_high() {
        // Excellent accuracy shrinks the measurement noise, so the raw
        // gain would exceed the clamp
        let mut filter = LocationFilter::new();
        filter.process_at(fix(37.7749, -122.4194, 0.1), 0);
        let out = filter.process_at(fix(37.7759, -122.4194, 0.1), 1_000);

        let moved_fraction = (out.latitude - 37.7749) / 0.001;
        assert!(
            (moved_fraction - 0.9).abs() < 0.01,
            "gain should saturate at 0.9, moved {}",
            moved_fraction
        );
    }

    #[test]
    fn test_velocity_step_clamp() {
        assert_eq!(clamp_velocity_step(0.0, 25.0, 10.0), 10.0);
        assert_eq!(clamp_velocity_step(0.0, -25.0, 10.0), -10.0);
        assert_eq!(clamp_velocity_step(2.0, 5.0, 10.0), 5.0);
    }
}
