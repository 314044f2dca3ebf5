// coordinator.rs — the single serialization point.
//
// Every external event (command, GPS fix, heart-rate sample, timer
// tick, API completion) lands on one queue and is processed to
// completion before the next one is accepted, so no two events ever
// race against the same session state. Outbound network calls are
// spawned and report back onto the same queue; a slow backend never
// stalls metric computation.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::api::{CompletionPayload, LifecyclePhase, SessionApi};
use crate::calories::{self, CalorieInput};
use crate::checkpoint::{CheckpointStore, ACTIVE_SESSION_KEY};
use crate::cheerleader::{CheerContext, CheerTrigger, Cheerleader};
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::heart_rate::{HeartRateMonitor, HeartRateStats};
use crate::lifecycle::{RecoveryOutcome, SessionLifecycle};
use crate::location::{LocationTracker, LocationVerdict};
use crate::types::{HeartRateSample, LocationPoint, Split, TerrainKind, UserProfile};
use crate::uploads::{PhotoRef, UploadQueue};
use crate::watchdog::LocationWatchdog;

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SessionCommand {
    Start {
        ruck_weight_kg: f64,
        profile: UserProfile,
        notes: Option<String>,
    },
    Pause,
    Resume,
    Stop,
    /// Back to Initial; only honored from a terminal state.
    Reset,
    SetTerrain(TerrainKind),
    AttachPhoto(PhotoRef),
}

/// Completion or failure of an outbound call, reported back into the
/// event queue by the spawned task.
#[derive(Debug)]
pub enum ApiEvent {
    SessionCreated { id: String },
    SessionCreateFailed { message: String },
    HeartRateBatchSent { batch: Vec<HeartRateSample>, ok: bool },
    LocationBatchSent { batch: Vec<LocationPoint>, ok: bool },
    CompleteFinished { ok: bool, message: Option<String> },
}

#[derive(Debug)]
pub enum SessionEvent {
    Command(SessionCommand),
    Location(LocationPoint),
    HeartRate(HeartRateSample),
    /// One-second periodic timer.
    Tick,
    Api(ApiEvent),
    /// OS denied location access: fatal before any identity exists.
    LocationPermissionDenied,
}

/// Control messages to the sensor feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedCommand {
    RestartLocation,
    StopAll,
}

// ─── Aggregated state ────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct RunningSnapshot {
    pub session_id: String,
    pub elapsed_secs: i64,
    pub is_paused: bool,
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub pace_secs_per_unit: Option<f64>,
    pub calories: f64,
    pub heart_rate: HeartRateStats,
    pub gps_ready: bool,
    pub splits: Vec<Split>,
    pub steps: u64,
}

#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub session_id: String,
    pub distance_km: f64,
    pub duration_secs: i64,
    pub calories: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub heart_rate: HeartRateStats,
    pub splits: Vec<Split>,
    pub steps: u64,
    /// False when the completion call never succeeded and the result
    /// was finalized locally.
    pub synced: bool,
}

/// One canonical state at any time. Transitions are one-directional
/// except Running → Running; there is no path back from a terminal
/// state within the same session identity.
#[derive(Clone, Debug)]
pub enum AggregatedSessionState {
    Initial,
    Loading,
    Running(RunningSnapshot),
    Completed(SessionSummary),
    Failure { message: String },
}

impl AggregatedSessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AggregatedSessionState::Completed(_) | AggregatedSessionState::Failure { .. }
        )
    }
}

/// Producer-side handle: push events in, watch states come out.
#[derive(Clone)]
pub struct SessionHandle {
    pub events: mpsc::Sender<SessionEvent>,
    pub state: watch::Receiver<AggregatedSessionState>,
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

pub struct Coordinator {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    api: Arc<dyn SessionApi>,
    store: Arc<dyn CheckpointStore>,
    cheerleader: Arc<dyn Cheerleader>,

    lifecycle: SessionLifecycle,
    location: LocationTracker,
    heart_rate: HeartRateMonitor,
    uploads: UploadQueue,
    watchdog: LocationWatchdog,
    profile: UserProfile,

    events_rx: mpsc::Receiver<SessionEvent>,
    events_tx: mpsc::Sender<SessionEvent>,
    state_tx: watch::Sender<AggregatedSessionState>,
    feed_tx: Option<mpsc::Sender<FeedCommand>>,

    /// Session-creation request in flight.
    creating: bool,
    /// Completion request in flight; terminal publish is deferred
    /// until it resolves.
    completing: bool,
    complete_retried: bool,
    /// Incrementally counted elapsed seconds, periodically resynced
    /// against the clock.
    elapsed_counter_secs: i64,
    tick_count: u64,
    /// Elapsed seconds already accounted for by a recovered
    /// checkpoint's baseline calories.
    elapsed_offset_secs: i64,
    last_running: Option<RunningSnapshot>,
}

impl Coordinator {
    pub fn new(
        config: TrackerConfig,
        clock: Arc<dyn Clock>,
        api: Arc<dyn SessionApi>,
        store: Arc<dyn CheckpointStore>,
        cheerleader: Arc<dyn Cheerleader>,
    ) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::channel(512);
        let (state_tx, state_rx) = watch::channel(AggregatedSessionState::Initial);

        let coordinator = Coordinator {
            lifecycle: SessionLifecycle::new(config.clone()),
            location: LocationTracker::new(config.clone()),
            heart_rate: HeartRateMonitor::new(config.clone()),
            uploads: UploadQueue::new(config.clone()),
            watchdog: LocationWatchdog::new(&config),
            profile: UserProfile::new(0.0),
            config,
            clock,
            api,
            store,
            cheerleader,
            events_rx,
            events_tx: events_tx.clone(),
            state_tx,
            feed_tx: None,
            creating: false,
            completing: false,
            complete_retried: false,
            elapsed_counter_secs: 0,
            tick_count: 0,
            elapsed_offset_secs: 0,
            last_running: None,
        };

        let handle = SessionHandle {
            events: events_tx,
            state: state_rx,
        };
        (coordinator, handle)
    }

    /// Wire the channel used to restart or stop the sensor feeds.
    pub fn set_feed_commands(&mut self, tx: mpsc::Sender<FeedCommand>) {
        self.feed_tx = Some(tx);
    }

    /// Inspect the persisted checkpoint and, if the previous process
    /// died mid-session, restore the accumulated baselines and resume
    /// tracking from there.
    pub fn recover(&mut self) {
        let now = self.clock.now();
        match self.lifecycle.check_for_crashed_session(self.store.as_ref(), now) {
            Ok(RecoveryOutcome::Recovered(baseline)) => {
                self.location.restore_baseline(
                    baseline.distance_km,
                    baseline.elevation_gain_m,
                    baseline.elevation_loss_m,
                );
                self.elapsed_offset_secs = self.lifecycle.elapsed(now).num_seconds();
                self.elapsed_counter_secs = self.elapsed_offset_secs;
                self.profile = UserProfile::new(self.lifecycle.user_weight_kg());
                self.watchdog.feed_alive(now);
                self.publish();
            }
            Ok(_) => {}
            Err(e) => warn!("checkpoint inspection failed: {e}"),
        }
    }

    /// Consume events until all producers hang up.
    pub async fn run(mut self) {
        self.recover();
        while let Some(event) = self.events_rx.recv().await {
            self.handle_event(event).await;
        }
        debug!("event queue closed, coordinator exiting");
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Command(command) => self.handle_command(command).await,
            SessionEvent::Location(point) => self.handle_location(point),
            SessionEvent::HeartRate(sample) => self.handle_heart_rate(sample),
            SessionEvent::Tick => self.handle_tick(),
            SessionEvent::Api(api_event) => self.handle_api_event(api_event),
            SessionEvent::LocationPermissionDenied => {
                let message = TrackerError::PermissionDenied.to_string();
                self.notify_failure(&message);
                self.lifecycle.fail(message);
                self.publish();
            }
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        let now = self.clock.now();
        match command {
            SessionCommand::Start {
                ruck_weight_kg,
                profile,
                notes,
            } => {
                if self.lifecycle.is_active() || self.creating {
                    warn!("start ignored: session already in progress");
                    return;
                }
                if self.current_state_terminal() {
                    warn!("start ignored: reset required after a terminal state");
                    return;
                }
                self.lifecycle.begin(ruck_weight_kg, profile.weight_kg);
                self.profile = profile;
                self.creating = true;
                let _ = self.state_tx.send(AggregatedSessionState::Loading);

                let api = Arc::clone(&self.api);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let event = match api.create_session(ruck_weight_kg, notes.as_deref()).await {
                        Ok(id) => ApiEvent::SessionCreated { id },
                        Err(e) => ApiEvent::SessionCreateFailed {
                            message: e.to_string(),
                        },
                    };
                    let _ = events.send(SessionEvent::Api(event)).await;
                });
            }
            SessionCommand::Pause => {
                if !self.lifecycle.is_active() {
                    return;
                }
                self.lifecycle.pause(now);
                self.notify_lifecycle(LifecyclePhase::Pause);
                self.publish();
            }
            SessionCommand::Resume => {
                if !self.lifecycle.is_active() {
                    return;
                }
                self.lifecycle.resume(now);
                self.notify_lifecycle(LifecyclePhase::Resume);
                self.publish();
            }
            SessionCommand::Stop => {
                if !self.lifecycle.is_active() {
                    return;
                }
                self.stop_session(now);
            }
            SessionCommand::Reset => {
                if !self.current_state_terminal() {
                    warn!("reset ignored: session not in a terminal state");
                    return;
                }
                self.reset();
            }
            SessionCommand::SetTerrain(kind) => {
                self.location.set_terrain(kind);
            }
            SessionCommand::AttachPhoto(photo) => {
                self.uploads.attach_photo(photo);
            }
        }
    }

    fn handle_location(&mut self, point: LocationPoint) {
        if !self.lifecycle.is_active() || self.lifecycle.is_paused() {
            return;
        }
        let now = self.clock.now();
        let elapsed = self.lifecycle.elapsed(now);
        let verdict = self.location.on_location(point.clone(), elapsed);
        match verdict {
            LocationVerdict::Accepted { split, .. } => {
                self.watchdog.feed_alive(now);
                self.uploads.enqueue_point(point);
                if split.is_some() {
                    self.cheer(CheerTrigger::SplitCompleted);
                }
                self.publish();
            }
            // Sensor noise is filtered, never surfaced as an error.
            other => debug!("location fix filtered: {other:?}"),
        }
    }

    fn handle_heart_rate(&mut self, sample: HeartRateSample) {
        if !self.lifecycle.is_active() {
            return;
        }
        self.heart_rate.on_sample(sample);
        self.publish();
    }

    fn handle_tick(&mut self) {
        if !self.lifecycle.is_active() {
            return;
        }
        let now = self.clock.now();
        self.tick_count += 1;
        if !self.lifecycle.is_paused() {
            self.elapsed_counter_secs += 1;
        }

        // Drift correction: resynchronize the incrementing counter
        // against the wall-clock-derived truth, snapping when the
        // accumulated scheduler drift exceeds the tolerance.
        if self.tick_count % self.config.drift_resync_ticks == 0 {
            let true_elapsed = self.lifecycle.elapsed(now).num_seconds();
            let drift = self.elapsed_counter_secs - true_elapsed;
            if drift.abs() > self.config.drift_tolerance_secs {
                debug!("elapsed counter snapped by {drift}s");
                self.elapsed_counter_secs = true_elapsed;
            }
        }

        if self.tick_count % self.config.pace_update_ticks == 0 {
            self.location.update_pace(self.elapsed_counter_secs as f64);
        }

        self.flush_heart_rate(now);
        self.flush_locations(now);

        if self.lifecycle.checkpoint_due(now) {
            let calories = self.current_calories(now);
            if let Err(e) = self.lifecycle.write_checkpoint(
                self.store.as_ref(),
                now,
                self.location.total_distance_km(),
                self.location.elevation_gain_m(),
                self.location.elevation_loss_m(),
                calories,
            ) {
                warn!("checkpoint write failed: {e}");
            }
        }

        if self.watchdog.restart_due(now) {
            self.send_feed_command(FeedCommand::RestartLocation);
        }

        self.publish();
    }

    fn handle_api_event(&mut self, event: ApiEvent) {
        let now = self.clock.now();
        match event {
            ApiEvent::SessionCreated { id } => {
                self.creating = false;
                // A failure that landed while the create call was in
                // flight is terminal; the late id must not resurrect
                // the session. Best-effort fail it backend-side.
                if let Some(message) = self.lifecycle.error_message() {
                    warn!("discarding session {id}: session already failed");
                    let api = Arc::clone(&self.api);
                    let message = message.to_string();
                    tokio::spawn(async move {
                        if let Err(e) = api.fail_session(&id, &message).await {
                            warn!("failure notification failed: {e}");
                        }
                    });
                    return;
                }
                self.lifecycle.activate(id, now);
                self.watchdog.feed_alive(now);
                if let Err(e) = self.lifecycle.write_checkpoint(
                    self.store.as_ref(),
                    now,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                ) {
                    warn!("initial checkpoint write failed: {e}");
                }
                self.notify_lifecycle(LifecyclePhase::Start);
                self.publish();
                self.cheer(CheerTrigger::SessionStarted);
            }
            ApiEvent::SessionCreateFailed { message } => {
                self.creating = false;
                self.lifecycle.fail(message);
                self.publish();
            }
            ApiEvent::HeartRateBatchSent { batch, ok } => {
                if !ok {
                    // Retried on the next flush; never blocks ingestion.
                    self.heart_rate.requeue_batch(batch);
                }
            }
            ApiEvent::LocationBatchSent { batch, ok } => {
                if !ok {
                    self.uploads.requeue_batch(batch);
                }
            }
            ApiEvent::CompleteFinished { ok, message } => {
                if ok {
                    self.finalize_completion(true);
                } else if !self.complete_retried {
                    // One local retry before falling back to an
                    // offline completion.
                    warn!(
                        "completion call failed ({}), retrying once",
                        message.as_deref().unwrap_or("unknown")
                    );
                    self.complete_retried = true;
                    self.spawn_complete();
                } else {
                    warn!("completion retry failed, finalizing offline");
                    self.lifecycle.mark_unsynced();
                    self.finalize_completion(false);
                }
            }
        }
    }

    // ── Stop / completion ──

    fn stop_session(&mut self, now: DateTime<Utc>) {
        self.lifecycle.stop(now);
        let calories = self.current_calories(now);
        // One last recovery-checkpoint write before handing off.
        if let Err(e) = self.lifecycle.write_checkpoint(
            self.store.as_ref(),
            now,
            self.location.total_distance_km(),
            self.location.elevation_gain_m(),
            self.location.elevation_loss_m(),
            calories,
        ) {
            warn!("final checkpoint write failed: {e}");
        }

        // Drain remaining telemetry alongside the completion call.
        if let Some(id) = self.lifecycle.session_id() {
            let remaining_hr = self.heart_rate.take_all();
            if !remaining_hr.is_empty() {
                self.spawn_heart_rate_push(id.to_string(), remaining_hr);
            }
            let remaining_points = self.uploads.take_all();
            if !remaining_points.is_empty() {
                self.spawn_location_push(id.to_string(), remaining_points);
            }
        }

        if !self.uploads.photos().is_empty() {
            info!(
                "{} photos attached, left for the media pipeline",
                self.uploads.photos().len()
            );
        }

        self.completing = true;
        self.send_feed_command(FeedCommand::StopAll);
        self.spawn_complete();
    }

    fn completion_payload(&self) -> CompletionPayload {
        let now = self.clock.now();
        let stats = self.heart_rate.stats();
        CompletionPayload {
            distance_km: self.location.total_distance_km(),
            duration_secs: self.lifecycle.elapsed(now).num_seconds(),
            calories: self.current_calories(now),
            elevation_gain_m: self.location.elevation_gain_m(),
            elevation_loss_m: self.location.elevation_loss_m(),
            ruck_weight_kg: self.lifecycle.ruck_weight_kg(),
            avg_hr: stats.avg,
            min_hr: stats.min,
            max_hr: stats.max,
            splits: self.location.splits().to_vec(),
            steps: self.location.steps_estimate(),
        }
    }

    fn spawn_complete(&mut self) {
        let id = match self.lifecycle.session_id() {
            Some(id) => id.to_string(),
            None => return,
        };
        let payload = self.completion_payload();
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match api.complete(&id, &payload).await {
                Ok(()) => ApiEvent::CompleteFinished {
                    ok: true,
                    message: None,
                },
                Err(e) => ApiEvent::CompleteFinished {
                    ok: false,
                    message: Some(e.to_string()),
                },
            };
            let _ = events.send(SessionEvent::Api(event)).await;
        });
    }

    fn finalize_completion(&mut self, synced: bool) {
        self.completing = false;
        if synced {
            if let Err(e) = self.store.clear(ACTIVE_SESSION_KEY) {
                warn!("failed to clear checkpoint: {e}");
            }
        }
        self.publish();
        self.cheer(CheerTrigger::SessionCompleted);
    }

    fn reset(&mut self) {
        info!("coordinator reset");
        self.lifecycle = SessionLifecycle::new(self.config.clone());
        self.location = LocationTracker::new(self.config.clone());
        self.heart_rate = HeartRateMonitor::new(self.config.clone());
        self.uploads = UploadQueue::new(self.config.clone());
        self.watchdog = LocationWatchdog::new(&self.config);
        self.creating = false;
        self.completing = false;
        self.complete_retried = false;
        self.elapsed_counter_secs = 0;
        self.tick_count = 0;
        self.elapsed_offset_secs = 0;
        self.last_running = None;
        let _ = self.state_tx.send(AggregatedSessionState::Initial);
    }

    // ── Outbound helpers ──

    /// Best-effort: tell the backend the session failed. Never blocks
    /// or alters local state.
    fn notify_failure(&self, message: &str) {
        let id = match self.lifecycle.session_id() {
            Some(id) => id.to_string(),
            None => return,
        };
        let api = Arc::clone(&self.api);
        let message = message.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.fail_session(&id, &message).await {
                warn!("failure notification failed: {e}");
            }
        });
    }

    fn notify_lifecycle(&self, phase: LifecyclePhase) {
        let id = match self.lifecycle.session_id() {
            Some(id) => id.to_string(),
            None => return,
        };
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            // Fire-and-forget: failures are logged, never abort the
            // local session.
            if let Err(e) = api.notify_lifecycle(&id, phase).await {
                warn!("lifecycle notification {phase:?} failed: {e}");
            }
        });
    }

    fn flush_heart_rate(&mut self, now: DateTime<Utc>) {
        let id = match self.lifecycle.session_id() {
            Some(id) => id.to_string(),
            None => return,
        };
        if let Some(batch) = self.heart_rate.take_batch_if_due(now) {
            self.spawn_heart_rate_push(id, batch);
        }
    }

    fn spawn_heart_rate_push(&self, session_id: String, batch: Vec<HeartRateSample>) {
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let ok = match api.push_heart_rate(&session_id, &batch).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("heart-rate push failed: {e}");
                    false
                }
            };
            let _ = events
                .send(SessionEvent::Api(ApiEvent::HeartRateBatchSent { batch, ok }))
                .await;
        });
    }

    fn flush_locations(&mut self, now: DateTime<Utc>) {
        let id = match self.lifecycle.session_id() {
            Some(id) => id.to_string(),
            None => return,
        };
        if let Some(batch) = self.uploads.take_batch_if_due(now) {
            self.spawn_location_push(id, batch);
        }
    }

    fn spawn_location_push(&self, session_id: String, batch: Vec<LocationPoint>) {
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let ok = match api.push_locations(&session_id, &batch).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("location push failed: {e}");
                    false
                }
            };
            let _ = events
                .send(SessionEvent::Api(ApiEvent::LocationBatchSent { batch, ok }))
                .await;
        });
    }

    fn send_feed_command(&self, command: FeedCommand) {
        if let Some(tx) = &self.feed_tx {
            let _ = tx.try_send(command);
        }
    }

    fn cheer(&self, trigger: CheerTrigger) {
        let snapshot = match &self.last_running {
            Some(s) => s.clone(),
            None => return,
        };
        let context = CheerContext {
            trigger,
            snapshot,
            profile: self.profile.clone(),
        };
        // Absence of a message is a normal outcome.
        if let Some(message) = self.cheerleader.motivate(&context) {
            info!("cheer: {message}");
        }
    }

    // ── Aggregation ──

    /// Baseline calories from a recovered checkpoint plus a fresh
    /// estimate over the activity observed since, so a recovered
    /// session's total is continuous rather than reset or doubled.
    fn current_calories(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_secs =
            (self.lifecycle.elapsed(now).num_seconds() - self.elapsed_offset_secs).max(0) as f64;
        let input = CalorieInput {
            distance_km: self.location.delta_distance_km(),
            elapsed_secs,
            ruck_weight_kg: self.lifecycle.ruck_weight_kg(),
            elevation_gain_m: self.location.delta_elevation_gain_m(),
            elevation_loss_m: self.location.delta_elevation_loss_m(),
            terrain_multiplier: self.location.terrain_multiplier(),
            avg_hr: self.heart_rate.stats().avg,
            hr_coverage: self.heart_rate.coverage(elapsed_secs),
        };
        self.lifecycle.baseline_calories() + calories::estimate(&input, &self.profile, &self.config)
    }

    /// The recomputation rule: inactive with no id is Initial (or
    /// Loading while creation is in flight), an error message is
    /// Failure, inactive with an id is Completed from the last known
    /// good running metrics, active with an id is a freshly composed
    /// Running.
    fn recompute(&mut self) -> AggregatedSessionState {
        if let Some(message) = self.lifecycle.error_message() {
            return AggregatedSessionState::Failure {
                message: message.to_string(),
            };
        }
        let session_id = match self.lifecycle.session_id() {
            Some(id) => id.to_string(),
            None => {
                return if self.creating {
                    AggregatedSessionState::Loading
                } else {
                    AggregatedSessionState::Initial
                };
            }
        };

        if !self.lifecycle.is_active() {
            // Never recompute a terminal summary from a zeroed state:
            // the last known good running metrics are authoritative.
            let now = self.clock.now();
            let summary = SessionSummary {
                session_id,
                distance_km: self
                    .last_running
                    .as_ref()
                    .map(|r| r.distance_km)
                    .unwrap_or_else(|| self.location.total_distance_km()),
                duration_secs: self.lifecycle.elapsed(now).num_seconds(),
                calories: self
                    .last_running
                    .as_ref()
                    .map(|r| r.calories)
                    .unwrap_or_else(|| self.current_calories(now)),
                elevation_gain_m: self.location.elevation_gain_m(),
                elevation_loss_m: self.location.elevation_loss_m(),
                heart_rate: self.heart_rate.stats(),
                splits: self.location.splits().to_vec(),
                steps: self.location.steps_estimate(),
                synced: self.lifecycle.is_synced(),
            };
            return AggregatedSessionState::Completed(summary);
        }

        let now = self.clock.now();
        let snapshot = RunningSnapshot {
            session_id,
            elapsed_secs: self.elapsed_counter_secs.max(0),
            is_paused: self.lifecycle.is_paused(),
            distance_km: self.location.total_distance_km(),
            elevation_gain_m: self.location.elevation_gain_m(),
            elevation_loss_m: self.location.elevation_loss_m(),
            pace_secs_per_unit: self.location.pace_secs_per_unit(),
            calories: self.current_calories(now),
            heart_rate: self.heart_rate.stats(),
            gps_ready: self.location.gps_ready(),
            splits: self.location.splits().to_vec(),
            steps: self.location.steps_estimate(),
        };
        AggregatedSessionState::Running(snapshot)
    }

    fn publish(&mut self) {
        // Terminal publish waits for the completion call to resolve
        // so consumers see exactly one terminal state.
        if self.completing {
            return;
        }
        let state = self.recompute();
        if let AggregatedSessionState::Running(snapshot) = &state {
            self.last_running = Some(snapshot.clone());
        }
        let _ = self.state_tx.send(state);
    }

    fn current_state_terminal(&self) -> bool {
        self.state_tx.borrow().is_terminal()
    }
}
