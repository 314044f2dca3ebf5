// lifecycle.rs — session identity and time truth.
//
// Owns the canonical start time, pause accounting and the recovery
// checkpoint. All timestamps flow through the injected Clock at the
// coordinator, never from ambient Utc::now().

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore, ACTIVE_SESSION_KEY};
use crate::config::TrackerConfig;
use crate::error::Result;

/// Accumulated metrics restored from a crashed session's checkpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct RecoveredBaseline {
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub calories: f64,
}

/// Outcome of the startup checkpoint inspection.
#[derive(Clone, Debug, PartialEq)]
pub enum RecoveryOutcome {
    /// No active checkpoint on disk.
    NoSession,
    /// Active checkpoint fresh enough to be a normal foreground
    /// resume; baselines must not be applied.
    ForegroundResume,
    /// Stale active checkpoint: the process died mid-session.
    Recovered(RecoveredBaseline),
}

pub struct SessionLifecycle {
    config: TrackerConfig,
    session_id: Option<String>,
    ruck_weight_kg: f64,
    user_weight_kg: f64,
    start_time: Option<DateTime<Utc>>,
    total_paused: Duration,
    current_pause_start: Option<DateTime<Utc>>,
    is_active: bool,
    error_message: Option<String>,
    /// Frozen at stop() so the final elapsed never drifts afterwards.
    frozen_elapsed: Option<Duration>,
    baseline_calories: f64,
    /// Session id whose checkpoint has already been applied, so a
    /// replay of the same checkpoint is a no-op.
    recovered_session_id: Option<String>,
    last_checkpoint_write: Option<DateTime<Utc>>,
    /// False when the completion call never succeeded and the session
    /// was finalized locally.
    synced: bool,
}

impl SessionLifecycle {
    pub fn new(config: TrackerConfig) -> Self {
        SessionLifecycle {
            config,
            session_id: None,
            ruck_weight_kg: 0.0,
            user_weight_kg: 0.0,
            start_time: None,
            total_paused: Duration::zero(),
            current_pause_start: None,
            is_active: false,
            error_message: None,
            frozen_elapsed: None,
            baseline_calories: 0.0,
            recovered_session_id: None,
            last_checkpoint_write: None,
            synced: true,
        }
    }

    /// Record the weights for a start attempt before the backend has
    /// assigned an identity.
    pub fn begin(&mut self, ruck_weight_kg: f64, user_weight_kg: f64) {
        self.ruck_weight_kg = ruck_weight_kg;
        self.user_weight_kg = user_weight_kg;
        self.error_message = None;
    }

    /// Backend assigned a session id: the session is now active.
    pub fn activate(&mut self, session_id: String, now: DateTime<Utc>) {
        info!("session {session_id} active");
        self.session_id = Some(session_id);
        self.start_time = Some(now);
        self.total_paused = Duration::zero();
        self.current_pause_start = None;
        self.is_active = true;
        self.frozen_elapsed = None;
        self.error_message = None;
        self.synced = true;
    }

    /// No-op when already paused or not active.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if !self.is_active || self.current_pause_start.is_some() {
            return;
        }
        info!("session paused");
        self.current_pause_start = Some(now);
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(pause_start) = self.current_pause_start.take() {
            let paused_for = now - pause_start;
            self.total_paused += paused_for;
            info!(
                "session resumed after {}s paused",
                paused_for.num_seconds()
            );
        }
    }

    /// elapsed = now - start - totalPaused - (current pause, if any),
    /// never negative. Frozen after stop().
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        if let Some(frozen) = self.frozen_elapsed {
            return frozen;
        }
        let start = match self.start_time {
            Some(t) => t,
            None => return Duration::zero(),
        };
        let mut elapsed = now - start - self.total_paused;
        if let Some(pause_start) = self.current_pause_start {
            elapsed = elapsed - (now - pause_start);
        }
        if elapsed < Duration::zero() {
            Duration::zero()
        } else {
            elapsed
        }
    }

    /// Mark inactive and freeze the final elapsed-time computation.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        self.resume(now); // fold any open pause into the total
        self.frozen_elapsed = Some(self.elapsed(now));
        self.is_active = false;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("session failed: {message}");
        self.error_message = Some(message);
        self.is_active = false;
    }

    pub fn mark_unsynced(&mut self) {
        self.synced = false;
    }

    // ── Checkpointing ──

    /// Throttled: at most one write per checkpoint interval.
    pub fn checkpoint_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active || self.session_id.is_none() {
            return false;
        }
        self.last_checkpoint_write.map_or(true, |t| {
            now - t >= Duration::seconds(self.config.checkpoint_interval_secs)
        })
    }

    /// Persist the current accumulated metrics. Called on the tick
    /// path when due, and once more unconditionally at stop().
    pub fn write_checkpoint(
        &mut self,
        store: &dyn CheckpointStore,
        now: DateTime<Utc>,
        distance_km: f64,
        elevation_gain_m: f64,
        elevation_loss_m: f64,
        calories: f64,
    ) -> Result<()> {
        let session_id = match &self.session_id {
            Some(id) => id.clone(),
            None => return Ok(()),
        };
        let checkpoint = Checkpoint {
            session_id,
            ruck_weight_kg: self.ruck_weight_kg,
            user_weight_kg: self.user_weight_kg,
            start_time: self.start_time.unwrap_or(now),
            total_paused_secs: self.total_paused.num_seconds(),
            distance_km,
            elevation_gain_m,
            elevation_loss_m,
            calories,
            is_active: self.is_active,
            last_updated: now,
        };
        store.put(ACTIVE_SESSION_KEY, &checkpoint)?;
        self.last_checkpoint_write = Some(now);
        Ok(())
    }

    /// Inspect the persisted checkpoint on process (re)start. An
    /// active checkpoint whose last update is older than the crash
    /// staleness window means the process died mid-session: restore
    /// identity and return the accumulated baselines. A fresher
    /// active checkpoint is a normal foreground resume. Replaying the
    /// same checkpoint twice must not double-apply the baseline.
    pub fn check_for_crashed_session(
        &mut self,
        store: &dyn CheckpointStore,
        now: DateTime<Utc>,
    ) -> Result<RecoveryOutcome> {
        let checkpoint = match store.get(ACTIVE_SESSION_KEY)? {
            Some(c) if c.is_active => c,
            _ => return Ok(RecoveryOutcome::NoSession),
        };

        if self.recovered_session_id.as_deref() == Some(checkpoint.session_id.as_str()) {
            return Ok(RecoveryOutcome::ForegroundResume);
        }

        let staleness = now - checkpoint.last_updated;
        if staleness < Duration::seconds(self.config.crash_staleness_secs) {
            return Ok(RecoveryOutcome::ForegroundResume);
        }

        info!(
            "recovering crashed session {} ({}s stale)",
            checkpoint.session_id,
            staleness.num_seconds()
        );

        self.session_id = Some(checkpoint.session_id.clone());
        self.ruck_weight_kg = checkpoint.ruck_weight_kg;
        self.user_weight_kg = checkpoint.user_weight_kg;
        self.start_time = Some(checkpoint.start_time);
        self.total_paused = Duration::seconds(checkpoint.total_paused_secs);
        self.current_pause_start = None;
        self.is_active = true;
        self.frozen_elapsed = None;
        self.baseline_calories = checkpoint.calories;
        self.recovered_session_id = Some(checkpoint.session_id.clone());

        Ok(RecoveryOutcome::Recovered(RecoveredBaseline {
            distance_km: checkpoint.distance_km,
            elevation_gain_m: checkpoint.elevation_gain_m,
            elevation_loss_m: checkpoint.elevation_loss_m,
            calories: checkpoint.calories,
        }))
    }

    // ── Read accessors ──

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_paused(&self) -> bool {
        self.current_pause_start.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn ruck_weight_kg(&self) -> f64 {
        self.ruck_weight_kg
    }

    pub fn user_weight_kg(&self) -> f64 {
        self.user_weight_kg
    }

    pub fn total_paused(&self) -> Duration {
        self.total_paused
    }

    pub fn baseline_calories(&self) -> f64 {
        self.baseline_calories
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }
}
