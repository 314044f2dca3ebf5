// config.rs — every empirically tuned threshold in one place.
//
// The GPS rejection distances and the crash staleness window are tuned
// constants with no first-principles derivation; they are config
// fields (not hardcoded) so they can be revalidated against real
// traces.

use crate::types::UnitPreference;

/// Which calorie estimator drives the session total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalorieMethod {
    /// MET table lookup on body weight only.
    Met,
    /// Pandolf load-carriage model, ruck mass explicit.
    Mechanical,
    /// Heart-rate estimate blended into the mechanical one.
    Fused,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    // ── GPS gating ──
    /// Fixes with a worse reported accuracy are dropped outright.
    pub gps_max_accuracy_m: f64,
    /// Jump distance that counts as a warm-up teleport while the
    /// track is still shorter than `gps_warmup_track_m`.
    pub gps_warmup_jump_m: f64,
    pub gps_warmup_track_m: f64,
    /// Implied speed above which a warm-up jump counts as a teleport
    /// rather than fast legitimate movement.
    pub gps_warmup_max_speed_mps: f64,
    /// Movement below this is treated as stationary jitter.
    pub gps_min_movement_m: f64,
    /// Accepted fixes required before metrics are worth displaying.
    pub gps_ready_min_points: usize,

    // ── Pace ──
    /// Pace is unavailable below this cumulative distance.
    pub pace_min_distance_km: f64,
    /// Sanity bounds, seconds per split unit.
    pub pace_min_secs_per_unit: f64,
    pub pace_max_secs_per_unit: f64,
    /// Recompute cadence in ticks.
    pub pace_update_ticks: u64,

    // ── Heart rate upload buffer ──
    pub hr_buffer_max: usize,
    pub hr_flush_secs: i64,

    // ── Telemetry upload ──
    pub location_batch_max: usize,
    pub location_batch_secs: i64,

    // ── Lifecycle / recovery ──
    /// Checkpoint age beyond which an active checkpoint means a crash.
    pub crash_staleness_secs: i64,
    /// Throttle between checkpoint writes.
    pub checkpoint_interval_secs: i64,

    // ── Drift correction ──
    pub drift_resync_ticks: u64,
    pub drift_tolerance_secs: i64,

    // ── Location feed watchdog ──
    pub location_stale_secs: u64,
    pub watchdog_max_attempts: u32,
    pub watchdog_base_cooldown_secs: u64,

    // ── Calories ──
    pub calorie_method: CalorieMethod,
    /// Plausible rucking speed band used for the active-time bound.
    pub plausible_speed_min_kmh: f64,
    pub plausible_speed_max_kmh: f64,

    // ── Units ──
    pub units: UnitPreference,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gps_max_accuracy_m: 50.0,
            gps_warmup_jump_m: 15.0,
            gps_warmup_track_m: 10.0,
            gps_warmup_max_speed_mps: 5.0,
            gps_min_movement_m: 10.0,
            gps_ready_min_points: 3,
            pace_min_distance_km: 0.05,
            pace_min_secs_per_unit: 300.0,
            pace_max_secs_per_unit: 1200.0,
            pace_update_ticks: 5,
            hr_buffer_max: 10,
            hr_flush_secs: 5,
            location_batch_max: 20,
            location_batch_secs: 10,
            crash_staleness_secs: 30,
            checkpoint_interval_secs: 10,
            drift_resync_ticks: 60,
            drift_tolerance_secs: 1,
            location_stale_secs: 30,
            watchdog_max_attempts: 60,
            watchdog_base_cooldown_secs: 2,
            calorie_method: CalorieMethod::Fused,
            plausible_speed_min_kmh: 3.0,
            plausible_speed_max_kmh: 8.0,
            units: UnitPreference::Metric,
        }
    }
}
