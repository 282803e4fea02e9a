use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    domain::{EnvironmentId, ProcessId, SessionId, StepId, ZoneId},
    geometry::ZoneRect,
};

fn default_true() -> bool {
    true
}

/// A detection region of one environment, in natural image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: ZoneId,
    pub environment_id: EnvironmentId,
    pub name: String,
    #[serde(flatten)]
    pub rect: ZoneRect,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStep {
    pub id: StepId,
    pub process_id: ProcessId,
    pub step_number: u32,
    pub name: String,
    pub target_zone_id: ZoneId,
    pub target_duration_seconds: f64,
    #[serde(default)]
    pub description: String,
}

/// One completed step as recorded by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEvent {
    #[serde(alias = "step_number", alias = "step")]
    pub step_number: u32,
    #[serde(default, alias = "step_name")]
    pub step_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "zone_hit")]
    pub zone_name: Option<String>,
    #[serde(default)]
    pub completed_at_epoch_ms: i64,
    #[serde(default, alias = "duration", alias = "actualDuration")]
    pub duration_seconds: f64,
    #[serde(default, alias = "target_duration", alias = "targetDuration")]
    pub target_duration_seconds: f64,
}

/// Final adherence figures for a session, either computed by the detector
/// or by the local fallback scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    #[serde(alias = "overall_adherence")]
    pub overall_adherence: f64,
    #[serde(alias = "completion_adherence", alias = "completionAdherence")]
    pub completion_rate: f64,
    #[serde(alias = "timing_adherence", alias = "timingAdherence")]
    pub time_adherence: f64,
    #[serde(default, alias = "completed_steps")]
    pub completed_steps: usize,
    #[serde(default, alias = "total_steps")]
    pub total_steps: usize,
    #[serde(default, alias = "total_time")]
    pub total_time_seconds: f64,
    #[serde(default, alias = "target_total_time")]
    pub target_total_seconds: f64,
    #[serde(default, alias = "step_details")]
    pub step_details: Vec<StepEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /tracking/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingAvailability {
    pub available: bool,
    #[serde(alias = "model_loaded")]
    pub model_loaded: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "webcam_available"
    )]
    pub webcam_available: Option<bool>,
}

/// `POST /analysis/start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisRequest {
    pub environment_id: EnvironmentId,
    pub process_id: ProcessId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub status: String,
}

/// `GET /analysis/status/{sessionId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    #[serde(default)]
    pub current_step: usize,
    #[serde(default)]
    pub step_events: Vec<StepEvent>,
    #[serde(default)]
    pub elapsed_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// `POST /analysis/stop/{sessionId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopAnalysisResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "figures_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub results: Option<ScoreResult>,
}

/// A results object without the adherence figures (the detector's
/// "no steps completed" reply) reads as no results.
fn figures_or_none<'de, D>(deserializer: D) -> Result<Option<ScoreResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

/// `POST /analysis/results/{sessionId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResultsRequest {
    pub results: ScoreResult,
}

/// `PUT /environments/{id}/zones`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneListUpdate {
    pub zones: Vec<Zone>,
}

/// `POST /processes/{id}/steps`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepListUpdate {
    pub steps: Vec<ProcessStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
