// api.rs — backend collaborator, interfaces only.
//
// The wire schema is owned by the backend; this module carries just
// the fields the core is obliged to send. Every call has its own
// timeout, and no call ever alters local authoritative metrics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TrackerError};
use crate::types::{HeartRateSample, LocationPoint, Split};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecyclePhase {
    Start,
    Pause,
    Resume,
}

impl LifecyclePhase {
    fn path_segment(self) -> &'static str {
        match self {
            LifecyclePhase::Start => "start",
            LifecyclePhase::Pause => "pause",
            LifecyclePhase::Resume => "resume",
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    ruck_weight_kg: f64,
    notes: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct HeartRateBatch<'a> {
    samples: &'a [HeartRateSample],
}

#[derive(Debug, Serialize)]
struct FailRequest<'a> {
    error_message: &'a str,
}

/// Final session payload for POST /sessions/{id}/complete.
#[derive(Clone, Debug, Serialize)]
pub struct CompletionPayload {
    pub distance_km: f64,
    pub duration_secs: i64,
    pub calories: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub ruck_weight_kg: f64,
    pub avg_hr: Option<f64>,
    pub min_hr: Option<u16>,
    pub max_hr: Option<u16>,
    pub splits: Vec<Split>,
    pub steps: u64,
}

/// What the core needs from the backend. Object-safe so the
/// coordinator can hold a mock in tests.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// POST /sessions — fails the start attempt when no id comes back.
    async fn create_session(&self, ruck_weight_kg: f64, notes: Option<&str>) -> Result<String>;

    /// Fire-and-forget lifecycle notification.
    async fn notify_lifecycle(&self, session_id: &str, phase: LifecyclePhase) -> Result<()>;

    async fn push_locations(&self, session_id: &str, points: &[LocationPoint]) -> Result<()>;

    async fn push_heart_rate(&self, session_id: &str, samples: &[HeartRateSample]) -> Result<()>;

    async fn complete(&self, session_id: &str, payload: &CompletionPayload) -> Result<()>;

    /// Best-effort failure notification.
    async fn fail_session(&self, session_id: &str, message: &str) -> Result<()>;
}

/// reqwest implementation against the real backend.
pub struct HttpSessionApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpSessionApi {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn create_session(&self, ruck_weight_kg: f64, notes: Option<&str>) -> Result<String> {
        let response = self
            .client
            .post(self.url("sessions"))
            .json(&CreateSessionRequest {
                ruck_weight_kg,
                notes,
            })
            .send()
            .await?
            .error_for_status()?;

        let body: CreateSessionResponse = response.json().await?;
        body.id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TrackerError::SessionCreate("backend returned no session id".into()))
    }

    async fn notify_lifecycle(&self, session_id: &str, phase: LifecyclePhase) -> Result<()> {
        self.client
            .post(self.url(&format!("sessions/{session_id}/{}", phase.path_segment())))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn push_locations(&self, session_id: &str, points: &[LocationPoint]) -> Result<()> {
        self.client
            .post(self.url(&format!("sessions/{session_id}/location")))
            .json(&points)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn push_heart_rate(&self, session_id: &str, samples: &[HeartRateSample]) -> Result<()> {
        self.client
            .post(self.url(&format!("sessions/{session_id}/heart_rate")))
            .json(&HeartRateBatch { samples })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn complete(&self, session_id: &str, payload: &CompletionPayload) -> Result<()> {
        self.client
            .post(self.url(&format!("sessions/{session_id}/complete")))
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fail_session(&self, session_id: &str, message: &str) -> Result<()> {
        self.client
            .post(self.url(&format!("sessions/{session_id}/fail")))
            .json(&FailRequest {
                error_message: message,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_normalized() {
        let api = HttpSessionApi::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.url("sessions"), "http://localhost:8000/sessions");
    }

    #[test]
    fn completion_payload_serializes_expected_fields() {
        let payload = CompletionPayload {
            distance_km: 5.2,
            duration_secs: 3600,
            calories: 540.0,
            elevation_gain_m: 80.0,
            elevation_loss_m: 75.0,
            ruck_weight_kg: 20.0,
            avg_hr: Some(138.0),
            min_hr: Some(95),
            max_hr: Some(171),
            splits: vec![],
            steps: 6812,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["distance_km"], 5.2);
        assert_eq!(json["steps"], 6812);
        assert_eq!(json["duration_secs"], 3600);
    }
}
