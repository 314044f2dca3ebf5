// sensors.rs — demo sensor feeds for the command-line binary.
//
// Real deployments wire platform location and heart-rate services into
// the coordinator's event queue; here a deterministic simulated walk
// stands in so the whole pipeline can run end to end on a laptop.
// Backpressure policy matches the queue contract: full channel drops
// the sample, closed channel ends the loop.

use chrono::Utc;
use log::{debug, info, warn};
use std::f64::consts::PI;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{interval, Duration};

use crate::coordinator::{FeedCommand, SessionEvent};
use crate::types::{HeartRateSample, LocationPoint};

/// Degrees of latitude per meter, good enough for a simulated track.
const DEG_LAT_PER_M: f64 = 1.0 / 111_195.0;

/// Scripted walk north from a fixed anchor at a brisk ruck pace.
pub struct SimulatedWalk {
    latitude: f64,
    longitude: f64,
    elevation_m: f64,
    seq: u64,
    step_m: f64,
}

impl SimulatedWalk {
    pub fn new(step_m: f64) -> Self {
        SimulatedWalk {
            latitude: 37.7749,
            longitude: -122.4194,
            elevation_m: 20.0,
            seq: 0,
            step_m,
        }
    }

    pub fn next_fix(&mut self) -> LocationPoint {
        self.seq += 1;
        self.latitude += self.step_m * DEG_LAT_PER_M;
        // Gentle rolling profile, a few meters per kilometer.
        self.elevation_m += ((self.seq as f64) * 0.15).sin() * 0.4;
        LocationPoint {
            latitude: self.latitude,
            longitude: self.longitude,
            elevation_m: self.elevation_m,
            horizontal_accuracy_m: 4.0 + ((self.seq as f64) * 0.3).sin().abs() * 3.0,
            speed_mps: self.step_m / 10.0,
            timestamp: Utc::now(),
        }
    }
}

/// Emit one simulated fix every 10s until told to stop.
pub async fn location_loop(events: Sender<SessionEvent>, mut commands: Receiver<FeedCommand>) {
    let mut walk = SimulatedWalk::new(12.0);
    let mut ticker = interval(Duration::from_secs(10));
    let mut fix_count = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match events.try_send(SessionEvent::Location(walk.next_fix())) {
                    Ok(()) => {
                        fix_count += 1;
                        if fix_count % 30 == 0 {
                            debug!("[location] {fix_count} fixes emitted");
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        info!("[location] queue closed after {fix_count} fixes");
                        break;
                    }
                    Err(TrySendError::Full(_)) => {
                        // Queue congested, drop this fix.
                    }
                }
            }
            command = commands.recv() => {
                match command {
                    Some(FeedCommand::RestartLocation) => {
                        warn!("[location] restart requested, reinitializing feed");
                        ticker = interval(Duration::from_secs(10));
                    }
                    Some(FeedCommand::StopAll) | None => {
                        info!("[location] stopped after {fix_count} fixes");
                        break;
                    }
                }
            }
        }
    }
}

/// 1 Hz simulated heart-rate monitor, oscillating in the aerobic band.
pub async fn heart_rate_loop(events: Sender<SessionEvent>) {
    let mut ticker = interval(Duration::from_secs(1));
    let mut sample_count = 0u64;

    loop {
        ticker.tick().await;
        let t = sample_count as f64;
        let bpm = (138.0 + (t * 0.02 * PI).sin() * 14.0).round() as u16;
        match events.try_send(SessionEvent::HeartRate(HeartRateSample {
            bpm,
            timestamp: Utc::now(),
        })) {
            Ok(()) => {
                sample_count += 1;
                if sample_count % 60 == 0 {
                    debug!("[hr] {sample_count} samples emitted");
                }
            }
            Err(TrySendError::Closed(_)) => {
                info!("[hr] queue closed after {sample_count} samples");
                break;
            }
            Err(TrySendError::Full(_)) => {
                // Queue congested, drop this sample.
            }
        }
    }
}

/// The 1s periodic timer the coordinator keys elapsed time off.
pub async fn ticker_loop(events: Sender<SessionEvent>) {
    let mut ticker = interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        match events.try_send(SessionEvent::Tick) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Closed(_)) => break,
        }
    }
}
