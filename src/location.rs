// location.rs — distance, elevation, pace, splits and terrain from
// raw position fixes.
//
// Pure computation layer: no tokio, no I/O. Points come in, metric
// deltas come out, so the whole pipeline can be unit-tested with
// recorded or synthetic tracks.

use chrono::Duration;
use geo::{point, HaversineDistance};
use log::debug;

use crate::config::TrackerConfig;
use crate::types::{LocationPoint, Split, TerrainKind, TerrainSegment, weighted_terrain_multiplier};

/// Strides per meter for the distance-derived step estimate.
const STEPS_PER_METER: f64 = 1.31;

/// Outcome of feeding one fix through the accept/reject pipeline.
#[derive(Clone, Debug)]
pub enum LocationVerdict {
    Accepted {
        delta_m: f64,
        split: Option<Split>,
    },
    /// Reported accuracy above the configured ceiling.
    RejectedAccuracy { accuracy_m: f64 },
    /// Warm-up teleport: a large jump before the track is established.
    RejectedWarmupJump { jump_m: f64 },
    /// Stationary jitter below the minimum movement threshold.
    RejectedJitter { movement_m: f64 },
}

impl LocationVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, LocationVerdict::Accepted { .. })
    }
}

pub struct LocationTracker {
    config: TrackerConfig,
    points: Vec<LocationPoint>,
    last_accepted: Option<LocationPoint>,
    distance_km: f64,
    elevation_gain_m: f64,
    elevation_loss_m: f64,
    splits: Vec<Split>,
    terrain: Vec<TerrainSegment>,
    current_terrain: TerrainKind,
    pace_secs_per_unit: Option<f64>,
    /// Crash-recovery baselines, pre-loaded before any fixes arrive.
    baseline_distance_km: f64,
    baseline_gain_m: f64,
    baseline_loss_m: f64,
}

impl LocationTracker {
    pub fn new(config: TrackerConfig) -> Self {
        LocationTracker {
            config,
            points: Vec::new(),
            last_accepted: None,
            distance_km: 0.0,
            elevation_gain_m: 0.0,
            elevation_loss_m: 0.0,
            splits: Vec::new(),
            terrain: Vec::new(),
            current_terrain: TerrainKind::Pavement,
            pace_secs_per_unit: None,
            baseline_distance_km: 0.0,
            baseline_gain_m: 0.0,
            baseline_loss_m: 0.0,
        }
    }

    /// Feed one fix. `elapsed` is the session elapsed time at the
    /// moment of processing, used to stamp split durations.
    pub fn on_location(&mut self, point: LocationPoint, elapsed: Duration) -> LocationVerdict {
        if point.horizontal_accuracy_m > self.config.gps_max_accuracy_m {
            debug!(
                "fix rejected: accuracy {:.1}m > {:.1}m ceiling",
                point.horizontal_accuracy_m, self.config.gps_max_accuracy_m
            );
            return LocationVerdict::RejectedAccuracy {
                accuracy_m: point.horizontal_accuracy_m,
            };
        }

        let previous = match &self.last_accepted {
            Some(prev) => prev.clone(),
            None => {
                // First acceptable fix anchors the track.
                self.last_accepted = Some(point.clone());
                self.points.push(point);
                return LocationVerdict::Accepted {
                    delta_m: 0.0,
                    split: None,
                };
            }
        };

        let jump_m = haversine_m(&previous, &point);
        let track_m = self.distance_km * 1000.0;

        // Warm-up teleport: before the track is established, a large
        // jump at an implausible implied speed is a receiver artifact,
        // not movement. Legitimate fast walking over a long fix
        // interval covers the same distance at a plausible speed.
        if jump_m > self.config.gps_warmup_jump_m && track_m < self.config.gps_warmup_track_m {
            let dt_secs = (point.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0;
            let implied_speed = if dt_secs > 0.0 {
                jump_m / dt_secs
            } else {
                f64::INFINITY
            };
            if implied_speed > self.config.gps_warmup_max_speed_mps {
                debug!("fix rejected: warm-up teleport of {jump_m:.1}m at {implied_speed:.1}m/s");
                return LocationVerdict::RejectedWarmupJump { jump_m };
            }
        }

        if jump_m < self.config.gps_min_movement_m {
            return LocationVerdict::RejectedJitter { movement_m: jump_m };
        }

        // Accepted: accumulate.
        self.distance_km += jump_m / 1000.0;

        let elevation_delta = point.elevation_m - previous.elevation_m;
        if elevation_delta > 0.0 {
            self.elevation_gain_m += elevation_delta;
        } else {
            self.elevation_loss_m += elevation_delta.abs();
        }

        self.record_terrain(jump_m / 1000.0);
        let split = self.advance_splits(elapsed, point.timestamp);

        self.last_accepted = Some(point.clone());
        self.points.push(point);

        LocationVerdict::Accepted {
            delta_m: jump_m,
            split,
        }
    }

    /// Classify the surface for subsequent segments.
    pub fn set_terrain(&mut self, kind: TerrainKind) {
        self.current_terrain = kind;
    }

    fn record_terrain(&mut self, delta_km: f64) {
        let multiplier = self.current_terrain.energy_multiplier();
        match self.terrain.last_mut() {
            Some(last) if (last.energy_multiplier - multiplier).abs() < f64::EPSILON => {
                last.distance_km += delta_km;
            }
            _ => self.terrain.push(TerrainSegment {
                distance_km: delta_km,
                energy_multiplier: multiplier,
            }),
        }
    }

    fn advance_splits(
        &mut self,
        elapsed: Duration,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Option<Split> {
        let unit_km = self.config.units.split_length_km();
        let mut newest = None;
        // A single fix can cross at most one boundary in practice,
        // but a recovered baseline may land several boundaries deep.
        loop {
            let next_index = self.splits.len() as u32 + 1;
            let boundary_km = next_index as f64 * unit_km;
            if self.total_distance_km() < boundary_km {
                break;
            }
            let split = Split {
                index: next_index,
                distance_km: self.total_distance_km(),
                duration_secs: elapsed.num_seconds(),
                timestamp,
            };
            self.splits.push(split.clone());
            newest = Some(split);
        }
        newest
    }

    /// Recompute pace, called periodically rather than per fix.
    /// Sparse early data produces nonsense, so the value is discarded
    /// below a minimum distance or outside the sane band.
    pub fn update_pace(&mut self, elapsed_secs: f64) {
        let distance = self.total_distance_km();
        if distance < self.config.pace_min_distance_km {
            self.pace_secs_per_unit = None;
            return;
        }
        let units = distance / self.config.units.split_length_km();
        let pace = elapsed_secs / units;
        if pace < self.config.pace_min_secs_per_unit || pace > self.config.pace_max_secs_per_unit {
            self.pace_secs_per_unit = None;
        } else {
            self.pace_secs_per_unit = Some(pace);
        }
    }

    /// Pre-load accumulated metrics recovered from a crash checkpoint.
    pub fn restore_baseline(&mut self, distance_km: f64, gain_m: f64, loss_m: f64) {
        self.baseline_distance_km = distance_km;
        self.baseline_gain_m = gain_m;
        self.baseline_loss_m = loss_m;
    }

    // ── Read accessors for the coordinator ──

    pub fn total_distance_km(&self) -> f64 {
        self.baseline_distance_km + self.distance_km
    }

    pub fn elevation_gain_m(&self) -> f64 {
        self.baseline_gain_m + self.elevation_gain_m
    }

    pub fn elevation_loss_m(&self) -> f64 {
        self.baseline_loss_m + self.elevation_loss_m
    }

    /// Distance observed by this process only, excluding any recovered
    /// baseline. Calorie estimation runs over these deltas so a
    /// restored baseline is never double-counted.
    pub fn delta_distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn delta_elevation_gain_m(&self) -> f64 {
        self.elevation_gain_m
    }

    pub fn delta_elevation_loss_m(&self) -> f64 {
        self.elevation_loss_m
    }

    pub fn pace_secs_per_unit(&self) -> Option<f64> {
        self.pace_secs_per_unit
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn terrain_multiplier(&self) -> f64 {
        weighted_terrain_multiplier(&self.terrain)
    }

    pub fn accepted_points(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[LocationPoint] {
        &self.points
    }

    /// True once enough fixes have been accepted for metrics to be
    /// worth showing downstream.
    pub fn gps_ready(&self) -> bool {
        self.points.len() >= self.config.gps_ready_min_points
    }

    /// Distance-derived step estimate for the completion payload.
    pub fn steps_estimate(&self) -> u64 {
        (self.total_distance_km() * 1000.0 * STEPS_PER_METER).round() as u64
    }
}

fn haversine_m(a: &LocationPoint, b: &LocationPoint) -> f64 {
    let from = point!(x: a.longitude, y: a.latitude);
    let to = point!(x: b.longitude, y: b.latitude);
    from.haversine_distance(&to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn fix(lat: f64, lon: f64, elevation: f64, accuracy: f64, secs: i64) -> LocationPoint {
        LocationPoint {
            latitude: lat,
            longitude: lon,
            elevation_m: elevation,
            horizontal_accuracy_m: accuracy,
            speed_mps: 1.4,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    fn tracker() -> LocationTracker {
        LocationTracker::new(TrackerConfig::default())
    }

    // One degree of latitude is ~111.2 km, so 0.001 deg ≈ 111 m.
    const LAT_STEP_111M: f64 = 0.001;

    #[test]
    fn inaccurate_fix_rejected() {
        let mut t = tracker();
        let verdict = t.on_location(fix(37.0, -122.0, 10.0, 80.0, 0), Duration::zero());
        assert!(matches!(verdict, LocationVerdict::RejectedAccuracy { .. }));
        assert_eq!(t.accepted_points(), 0);
    }

    #[test]
    fn warmup_teleport_rejected() {
        let mut t = tracker();
        t.on_location(fix(37.0, -122.0, 10.0, 5.0, 0), Duration::zero());
        // ~22 m jump one second later while the track is still empty:
        // 22 m/s is not walking.
        let verdict = t.on_location(
            fix(37.0 + 0.0002, -122.0, 10.0, 5.0, 1),
            Duration::seconds(1),
        );
        assert!(matches!(verdict, LocationVerdict::RejectedWarmupJump { .. }));
        assert_eq!(t.total_distance_km(), 0.0);
    }

    #[test]
    fn warmup_jump_at_plausible_speed_accepted() {
        let mut t = tracker();
        t.on_location(fix(37.0, -122.0, 10.0, 5.0, 0), Duration::zero());
        // Same ~111 m covered over a minute: fast but legitimate.
        let verdict = t.on_location(
            fix(37.0 + LAT_STEP_111M, -122.0, 10.0, 5.0, 60),
            Duration::seconds(60),
        );
        assert!(verdict.is_accepted());
        assert!(t.total_distance_km() > 0.1);
    }

    #[test]
    fn stationary_jitter_rejected() {
        let mut t = tracker();
        t.on_location(fix(37.0, -122.0, 10.0, 5.0, 0), Duration::zero());
        // ~5.5 m of jitter.
        let verdict = t.on_location(
            fix(37.0 + 0.00005, -122.0, 10.0, 5.0, 5),
            Duration::seconds(5),
        );
        assert!(matches!(verdict, LocationVerdict::RejectedJitter { .. }));
        assert_eq!(t.total_distance_km(), 0.0);
    }

    #[test]
    fn distance_is_monotonic_and_roughly_correct() {
        let mut t = tracker();
        let mut last = 0.0;
        for i in 0..10 {
            t.on_location(
                fix(37.0 + i as f64 * LAT_STEP_111M, -122.0, 10.0, 5.0, i * 60),
                Duration::seconds(i * 60),
            );
            let d = t.total_distance_km();
            assert!(d >= last, "distance decreased: {d} < {last}");
            last = d;
        }
        // Nine ~111 m steps.
        assert_relative_eq!(last, 1.0, epsilon = 0.02);
    }

    #[test]
    fn elevation_differencing_splits_gain_and_loss() {
        let mut t = tracker();
        t.on_location(fix(37.0, -122.0, 100.0, 5.0, 0), Duration::zero());
        t.on_location(
            fix(37.0 + LAT_STEP_111M, -122.0, 112.0, 5.0, 60),
            Duration::seconds(60),
        );
        t.on_location(
            fix(37.0 + 2.0 * LAT_STEP_111M, -122.0, 107.0, 5.0, 120),
            Duration::seconds(120),
        );
        assert_relative_eq!(t.elevation_gain_m(), 12.0, epsilon = 1e-9);
        assert_relative_eq!(t.elevation_loss_m(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn split_emitted_at_kilometer_boundary() {
        let mut t = tracker();
        let mut got_split = None;
        for i in 0..11 {
            let verdict = t.on_location(
                fix(37.0 + i as f64 * LAT_STEP_111M, -122.0, 10.0, 5.0, i * 60),
                Duration::seconds(i * 60),
            );
            if let LocationVerdict::Accepted { split: Some(s), .. } = verdict {
                got_split = Some(s);
            }
        }
        let split = got_split.expect("no split emitted over >1 km");
        assert_eq!(split.index, 1);
        assert!(split.distance_km >= 1.0);
        assert_eq!(t.splits().len(), 1);
    }

    #[test]
    fn gps_ready_after_min_points() {
        let mut t = tracker();
        assert!(!t.gps_ready());
        for i in 0..3 {
            t.on_location(
                fix(37.0 + i as f64 * LAT_STEP_111M, -122.0, 10.0, 5.0, i * 60),
                Duration::seconds(i * 60),
            );
        }
        assert!(t.gps_ready());
    }

    #[test]
    fn pace_discarded_outside_sane_band() {
        let mut t = tracker();
        for i in 0..10 {
            t.on_location(
                fix(37.0 + i as f64 * LAT_STEP_111M, -122.0, 10.0, 5.0, i * 60),
                Duration::seconds(i * 60),
            );
        }
        // ~1 km in 9 seconds: absurdly fast, pace unavailable.
        t.update_pace(9.0);
        assert!(t.pace_secs_per_unit().is_none());

        // ~1 km in 10 minutes: fine.
        t.update_pace(600.0);
        let pace = t.pace_secs_per_unit().expect("pace should be available");
        assert!((300.0..=1200.0).contains(&pace));
    }

    #[test]
    fn pace_unavailable_below_min_distance() {
        let mut t = tracker();
        t.update_pace(120.0);
        assert!(t.pace_secs_per_unit().is_none());
    }

    #[test]
    fn baseline_restores_into_totals() {
        let mut t = tracker();
        t.restore_baseline(2.0, 30.0, 10.0);
        assert_relative_eq!(t.total_distance_km(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(t.elevation_gain_m(), 30.0, epsilon = 1e-9);

        t.on_location(fix(37.0, -122.0, 10.0, 5.0, 0), Duration::zero());
        t.on_location(
            fix(37.0 + LAT_STEP_111M, -122.0, 10.0, 5.0, 60),
            Duration::seconds(60),
        );
        assert!(t.total_distance_km() > 2.0);
    }

    #[test]
    fn terrain_segments_weighted_into_multiplier() {
        let mut t = tracker();
        t.on_location(fix(37.0, -122.0, 10.0, 5.0, 0), Duration::zero());
        t.on_location(
            fix(37.0 + LAT_STEP_111M, -122.0, 10.0, 5.0, 60),
            Duration::seconds(60),
        );
        t.set_terrain(TerrainKind::Sand);
        t.on_location(
            fix(37.0 + 2.0 * LAT_STEP_111M, -122.0, 10.0, 5.0, 120),
            Duration::seconds(120),
        );
        let m = t.terrain_multiplier();
        assert!(m > 1.0 && m < 1.8, "expected blended multiplier, got {m}");
    }
}
