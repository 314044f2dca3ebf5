// heart_rate.rs — live heart-rate aggregation and upload buffering.

use chrono::{DateTime, Duration, Utc};

use crate::config::TrackerConfig;
use crate::types::HeartRateSample;

/// Aggregate view exposed to the coordinator.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeartRateStats {
    pub latest: Option<u16>,
    pub min: Option<u16>,
    pub max: Option<u16>,
    pub avg: Option<f64>,
}

pub struct HeartRateMonitor {
    config: TrackerConfig,
    samples: Vec<HeartRateSample>,
    upload_buffer: Vec<HeartRateSample>,
    last_flush: Option<DateTime<Utc>>,
    min_bpm: Option<u16>,
    max_bpm: Option<u16>,
    bpm_sum: u64,
}

impl HeartRateMonitor {
    pub fn new(config: TrackerConfig) -> Self {
        HeartRateMonitor {
            config,
            samples: Vec::new(),
            upload_buffer: Vec::new(),
            last_flush: None,
            min_bpm: None,
            max_bpm: None,
            bpm_sum: 0,
        }
    }

    pub fn on_sample(&mut self, sample: HeartRateSample) {
        self.min_bpm = Some(match self.min_bpm {
            Some(min) => min.min(sample.bpm),
            None => sample.bpm,
        });
        self.max_bpm = Some(match self.max_bpm {
            Some(max) => max.max(sample.bpm),
            None => sample.bpm,
        });
        self.bpm_sum += sample.bpm as u64;

        self.upload_buffer.push(sample.clone());
        self.samples.push(sample);
    }

    /// Drain the upload buffer when it exceeds the count threshold or
    /// the time threshold since the last flush, whichever comes
    /// first. Returns `None` when no flush is due.
    pub fn take_batch_if_due(&mut self, now: DateTime<Utc>) -> Option<Vec<HeartRateSample>> {
        if self.upload_buffer.is_empty() {
            return None;
        }
        let count_due = self.upload_buffer.len() >= self.config.hr_buffer_max;
        let time_due = self
            .last_flush
            .map_or(true, |t| now - t >= Duration::seconds(self.config.hr_flush_secs));
        if !count_due && !time_due {
            return None;
        }
        self.last_flush = Some(now);
        Some(std::mem::take(&mut self.upload_buffer))
    }

    /// Put a failed batch back at the front so nothing is lost; it
    /// rides along with the next flush.
    pub fn requeue_batch(&mut self, mut batch: Vec<HeartRateSample>) {
        batch.append(&mut self.upload_buffer);
        self.upload_buffer = batch;
    }

    /// Drain everything regardless of thresholds, for completion.
    pub fn take_all(&mut self) -> Vec<HeartRateSample> {
        std::mem::take(&mut self.upload_buffer)
    }

    pub fn stats(&self) -> HeartRateStats {
        HeartRateStats {
            latest: self.samples.last().map(|s| s.bpm),
            min: self.min_bpm,
            max: self.max_bpm,
            avg: if self.samples.is_empty() {
                None
            } else {
                Some(self.bpm_sum as f64 / self.samples.len() as f64)
            },
        }
    }

    pub fn samples(&self) -> &[HeartRateSample] {
        &self.samples
    }

    /// Fraction of the elapsed session covered by heart-rate data,
    /// assuming the feed's nominal cadence. Feeds the fused calorie
    /// blend weight.
    pub fn coverage(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 || self.samples.len() < 2 {
            return 0.0;
        }
        let first = self.samples.first().map(|s| s.timestamp);
        let last = self.samples.last().map(|s| s.timestamp);
        match (first, last) {
            (Some(a), Some(b)) => {
                let covered = (b - a).num_milliseconds() as f64 / 1000.0;
                (covered / elapsed_secs).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}
