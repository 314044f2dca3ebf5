// uploads.rs — outbound telemetry batching and session media, thin.
//
// Accepted location points are mirrored into a batch that drains by
// count or age; a failed push keeps its points for the next attempt.
// Photos are tracked at the interface level only.

use chrono::{DateTime, Duration, Utc};

use crate::config::TrackerConfig;
use crate::types::LocationPoint;

/// Reference to a session-attached photo. Capture and storage happen
/// outside the core.
#[derive(Clone, Debug)]
pub struct PhotoRef {
    pub local_id: String,
    pub taken_at: DateTime<Utc>,
}

pub struct UploadQueue {
    config: TrackerConfig,
    pending_points: Vec<LocationPoint>,
    last_flush: Option<DateTime<Utc>>,
    photos: Vec<PhotoRef>,
}

impl UploadQueue {
    pub fn new(config: TrackerConfig) -> Self {
        UploadQueue {
            config,
            pending_points: Vec::new(),
            last_flush: None,
            photos: Vec::new(),
        }
    }

    pub fn enqueue_point(&mut self, point: LocationPoint) {
        self.pending_points.push(point);
    }

    /// Drain by count or age, whichever comes first.
    pub fn take_batch_if_due(&mut self, now: DateTime<Utc>) -> Option<Vec<LocationPoint>> {
        if self.pending_points.is_empty() {
            return None;
        }
        let count_due = self.pending_points.len() >= self.config.location_batch_max;
        let time_due = self.last_flush.map_or(true, |t| {
            now - t >= Duration::seconds(self.config.location_batch_secs)
        });
        if !count_due && !time_due {
            return None;
        }
        self.last_flush = Some(now);
        Some(std::mem::take(&mut self.pending_points))
    }

    pub fn requeue_batch(&mut self, mut batch: Vec<LocationPoint>) {
        batch.append(&mut self.pending_points);
        self.pending_points = batch;
    }

    /// Drain everything regardless of thresholds, for completion.
    pub fn take_all(&mut self) -> Vec<LocationPoint> {
        std::mem::take(&mut self.pending_points)
    }

    pub fn attach_photo(&mut self, photo: PhotoRef) {
        self.photos.push(photo);
    }

    pub fn photos(&self) -> &[PhotoRef] {
        &self.photos
    }

    pub fn pending(&self) -> usize {
        self.pending_points.len()
    }
}
