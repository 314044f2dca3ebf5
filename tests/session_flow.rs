// End-to-end session scenarios through the public API: real event
// queue, real coordinator task, manual clock, in-memory checkpoint
// store and a scripted backend.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use ruck_tracker_rs::api::{CompletionPayload, LifecyclePhase, SessionApi};
use ruck_tracker_rs::checkpoint::{CheckpointStore, MemoryStore, ACTIVE_SESSION_KEY};
use ruck_tracker_rs::cheerleader::SilentCheerleader;
use ruck_tracker_rs::clock::{Clock, ManualClock};
use ruck_tracker_rs::config::TrackerConfig;
use ruck_tracker_rs::coordinator::{
    AggregatedSessionState, Coordinator, SessionCommand, SessionEvent, SessionHandle,
};
use ruck_tracker_rs::error::Result as TrackerResult;
use ruck_tracker_rs::types::{HeartRateSample, LocationPoint, UserProfile};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn fix(lat: f64, secs: i64) -> LocationPoint {
    LocationPoint {
        latitude: lat,
        longitude: -122.4,
        elevation_m: 15.0,
        horizontal_accuracy_m: 5.0,
        speed_mps: 1.5,
        timestamp: at(secs),
    }
}

#[derive(Default)]
struct ScriptedApi {
    fail_create: AtomicBool,
    completes: AtomicU32,
}

#[async_trait]
impl SessionApi for ScriptedApi {
    async fn create_session(
        &self,
        _ruck_weight_kg: f64,
        _notes: Option<&str>,
    ) -> TrackerResult<String> {
        if self.fail_create.load(Ordering::SeqCst) {
            Err(ruck_tracker_rs::error::TrackerError::SessionCreate(
                "backend unavailable".into(),
            ))
        } else {
            Ok("session-1".to_string())
        }
    }

    async fn notify_lifecycle(
        &self,
        _session_id: &str,
        _phase: LifecyclePhase,
    ) -> TrackerResult<()> {
        Ok(())
    }

    async fn push_locations(
        &self,
        _session_id: &str,
        _points: &[LocationPoint],
    ) -> TrackerResult<()> {
        Ok(())
    }

    async fn push_heart_rate(
        &self,
        _session_id: &str,
        _samples: &[HeartRateSample],
    ) -> TrackerResult<()> {
        Ok(())
    }

    async fn complete(&self, _session_id: &str, _payload: &CompletionPayload) -> TrackerResult<()> {
        self.completes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fail_session(&self, _session_id: &str, _message: &str) -> TrackerResult<()> {
        Ok(())
    }
}

struct Harness {
    handle: SessionHandle,
    clock: Arc<ManualClock>,
    api: Arc<ScriptedApi>,
    store: Arc<MemoryStore>,
}

fn spawn_tracker(clock: Arc<ManualClock>, api: Arc<ScriptedApi>, store: Arc<MemoryStore>) -> Harness {
    let (coordinator, handle) = Coordinator::new(
        TrackerConfig::default(),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&api) as Arc<dyn SessionApi>,
        Arc::clone(&store) as Arc<dyn CheckpointStore>,
        Arc::new(SilentCheerleader),
    );
    tokio::spawn(coordinator.run());
    Harness {
        handle,
        clock,
        api,
        store,
    }
}

fn harness() -> Harness {
    spawn_tracker(
        Arc::new(ManualClock::new(at(0))),
        Arc::new(ScriptedApi::default()),
        Arc::new(MemoryStore::new()),
    )
}

async fn send(harness: &Harness, event: SessionEvent) {
    harness.handle.events.send(event).await.expect("queue open");
}

/// Wait until the published state satisfies the predicate.
async fn wait_for<F>(harness: &mut Harness, predicate: F) -> AggregatedSessionState
where
    F: Fn(&AggregatedSessionState) -> bool,
{
    let deadline = std::time::Duration::from_secs(2);
    let mut rx = harness.handle.state.clone();
    tokio::time::timeout(deadline, async {
        loop {
            {
                let state = rx.borrow().clone();
                if predicate(&state) {
                    return state;
                }
            }
            rx.changed().await.expect("state channel open");
        }
    })
    .await
    .expect("state predicate not reached in time")
}

async fn start(harness: &mut Harness) {
    send(
        harness,
        SessionEvent::Command(SessionCommand::Start {
            ruck_weight_kg: 20.0,
            profile: UserProfile::new(80.0),
            notes: None,
        }),
    )
    .await;
    wait_for(harness, |s| matches!(s, AggregatedSessionState::Running(_))).await;
}

#[tokio::test]
async fn session_runs_and_completes_through_the_public_api() {
    let mut h = harness();
    start(&mut h).await;

    // A kilometer in ten minutes, one fix per simulated minute.
    for i in 0..10 {
        h.clock.advance(Duration::seconds(60));
        send(&h, SessionEvent::Location(fix(37.0 + i as f64 * 0.001, i * 60))).await;
        send(
            &h,
            SessionEvent::HeartRate(HeartRateSample {
                bpm: 140,
                timestamp: at(i * 60),
            }),
        )
        .await;
        send(&h, SessionEvent::Tick).await;
    }

    let running = wait_for(&mut h, |s| {
        matches!(s, AggregatedSessionState::Running(r) if r.distance_km > 0.9)
    })
    .await;
    if let AggregatedSessionState::Running(snapshot) = running {
        assert!(snapshot.gps_ready);
        assert_eq!(snapshot.splits.len(), 1);
        assert!(snapshot.calories > 0.0);
        assert_eq!(snapshot.heart_rate.latest, Some(140));
    }

    send(&h, SessionEvent::Command(SessionCommand::Stop)).await;
    let done = wait_for(&mut h, |s| matches!(s, AggregatedSessionState::Completed(_))).await;
    if let AggregatedSessionState::Completed(summary) = done {
        assert_eq!(summary.session_id, "session-1");
        assert_eq!(summary.duration_secs, 600);
        assert!((summary.distance_km - 1.0).abs() < 0.02);
        assert!(summary.synced);
        assert!(summary.steps > 1000);
    }
    assert_eq!(h.api.completes.load(Ordering::SeqCst), 1);
    assert!(h.store.get(ACTIVE_SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn failed_session_creation_surfaces_as_failure() {
    let mut h = harness();
    h.api.fail_create.store(true, Ordering::SeqCst);
    send(
        &h,
        SessionEvent::Command(SessionCommand::Start {
            ruck_weight_kg: 20.0,
            profile: UserProfile::new(80.0),
            notes: None,
        }),
    )
    .await;
    let state = wait_for(&mut h, |s| matches!(s, AggregatedSessionState::Failure { .. })).await;
    if let AggregatedSessionState::Failure { message } = state {
        assert!(message.contains("backend unavailable"), "{message}");
    }
}

#[tokio::test]
async fn crashed_session_is_recovered_by_a_fresh_process() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let api = Arc::new(ScriptedApi::default());
    let store = Arc::new(MemoryStore::new());

    let mut h = spawn_tracker(Arc::clone(&clock), Arc::clone(&api), Arc::clone(&store));
    start(&mut h).await;
    for i in 0..10 {
        h.clock.advance(Duration::seconds(60));
        send(&h, SessionEvent::Location(fix(37.0 + i as f64 * 0.001, i * 60))).await;
    }
    // Tick writes the recovery checkpoint, then the process "dies"
    // (the first coordinator simply stops receiving events).
    send(&h, SessionEvent::Tick).await;
    wait_for(&mut h, |s| {
        matches!(s, AggregatedSessionState::Running(r) if r.distance_km > 0.9)
    })
    .await;

    clock.advance(Duration::seconds(300));
    let mut revived = spawn_tracker(clock, api, store);
    let state = wait_for(&mut revived, |s| {
        matches!(s, AggregatedSessionState::Running(_))
    })
    .await;
    if let AggregatedSessionState::Running(snapshot) = state {
        assert_eq!(snapshot.session_id, "session-1");
        assert!(snapshot.distance_km > 0.9, "baseline lost: {}", snapshot.distance_km);
        assert!(snapshot.calories > 0.0);
    }
}

#[tokio::test]
async fn permission_denial_fails_the_session() {
    let mut h = harness();
    send(&h, SessionEvent::LocationPermissionDenied).await;
    let state = wait_for(&mut h, |s| matches!(s, AggregatedSessionState::Failure { .. })).await;
    if let AggregatedSessionState::Failure { message } = state {
        assert!(message.to_lowercase().contains("permission"));
    }
}
