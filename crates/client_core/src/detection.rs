use async_trait::async_trait;
use shared::{
    domain::SessionId,
    protocol::{
        AnalysisStatus, SaveResultsRequest, ScoreResult, StartAnalysisRequest,
        StartAnalysisResponse, StopAnalysisResponse, TrackingAvailability,
    },
};
use tracing::debug;

use crate::{error::TransportError, transport::HttpTransport, DetectionService};

/// `DetectionService` over the detector's REST API.
#[derive(Debug, Clone)]
pub struct HttpDetectionClient {
    transport: HttpTransport,
}

impl HttpDetectionClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DetectionService for HttpDetectionClient {
    async fn tracking_status(&self) -> Result<TrackingAvailability, TransportError> {
        self.transport.get_json("/tracking/status").await
    }

    async fn start_analysis(
        &self,
        request: StartAnalysisRequest,
    ) -> Result<StartAnalysisResponse, TransportError> {
        let response: StartAnalysisResponse =
            self.transport.post_json("/analysis/start", &request).await?;
        debug!(
            session_id = %response.session_id,
            status = %response.status,
            "analysis session created"
        );
        Ok(response)
    }

    async fn start_tracking(&self, session_id: &SessionId) -> Result<(), TransportError> {
        self.transport
            .post_unit::<()>(&format!("/analysis/start-tracking/{session_id}"), None)
            .await
    }

    async fn analysis_status(
        &self,
        session_id: &SessionId,
    ) -> Result<AnalysisStatus, TransportError> {
        self.transport
            .get_json(&format!("/analysis/status/{session_id}"))
            .await
    }

    async fn stop_analysis(
        &self,
        session_id: &SessionId,
    ) -> Result<StopAnalysisResponse, TransportError> {
        self.transport
            .post_empty(&format!("/analysis/stop/{session_id}"))
            .await
    }

    async fn save_results(
        &self,
        session_id: &SessionId,
        results: &ScoreResult,
    ) -> Result<(), TransportError> {
        let body = SaveResultsRequest {
            results: results.clone(),
        };
        self.transport
            .post_unit(&format!("/analysis/results/{session_id}"), Some(&body))
            .await
    }

    async fn release_session(&self, session_id: &SessionId) -> Result<(), TransportError> {
        self.transport
            .delete(&format!("/analysis/cleanup/{session_id}"))
            .await
    }
}

#[cfg(test)]
#[path = "tests/detection_tests.rs"]
mod tests;
