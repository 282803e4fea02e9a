use async_trait::async_trait;
use shared::{
    domain::SessionId,
    protocol::{
        AnalysisStatus, ScoreResult, StartAnalysisRequest, StartAnalysisResponse,
        StopAnalysisResponse, TrackingAvailability,
    },
};

pub mod capture;
pub mod catalog;
pub mod clock;
pub mod detection;
pub mod error;
pub mod plan;
pub mod scoring;
pub mod session;
pub mod transport;

pub use capture::{CaptureOwner, CaptureSlot, DetectorLease, DeviceBusy, LocalPreview};
pub use catalog::CatalogClient;
pub use clock::{Clock, SystemClock};
pub use detection::HttpDetectionClient;
pub use error::{PreconditionFailure, TrackingError, TransportError};
pub use plan::SessionPlan;
pub use session::{
    ResultSource, SessionEvent, SessionFailure, SessionOutcome, SessionPhase, SessionSnapshot,
    TrackingOptions, TrackingSession, TrackingSessionController,
};
pub use transport::HttpTransport;

/// The remote detector: camera ownership, hand tracking and step detection
/// all happen behind this contract.
#[async_trait]
pub trait DetectionService: Send + Sync {
    async fn tracking_status(&self) -> Result<TrackingAvailability, TransportError>;
    async fn start_analysis(
        &self,
        request: StartAnalysisRequest,
    ) -> Result<StartAnalysisResponse, TransportError>;
    /// Tells the detector to begin consuming camera frames for a session.
    async fn start_tracking(&self, session_id: &SessionId) -> Result<(), TransportError>;
    async fn analysis_status(&self, session_id: &SessionId)
        -> Result<AnalysisStatus, TransportError>;
    async fn stop_analysis(
        &self,
        session_id: &SessionId,
    ) -> Result<StopAnalysisResponse, TransportError>;
    async fn save_results(
        &self,
        session_id: &SessionId,
        results: &ScoreResult,
    ) -> Result<(), TransportError>;
    /// Frees whatever the detector still holds for the session.
    async fn release_session(&self, session_id: &SessionId) -> Result<(), TransportError>;
}

pub struct MissingDetectionService;

#[async_trait]
impl DetectionService for MissingDetectionService {
    async fn tracking_status(&self) -> Result<TrackingAvailability, TransportError> {
        Err(TransportError::Unavailable(
            "no detection service configured".to_string(),
        ))
    }

    async fn start_analysis(
        &self,
        _request: StartAnalysisRequest,
    ) -> Result<StartAnalysisResponse, TransportError> {
        Err(TransportError::Unavailable(
            "no detection service configured".to_string(),
        ))
    }

    async fn start_tracking(&self, session_id: &SessionId) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(format!(
            "cannot start tracking for session {session_id}"
        )))
    }

    async fn analysis_status(
        &self,
        session_id: &SessionId,
    ) -> Result<AnalysisStatus, TransportError> {
        Err(TransportError::Unavailable(format!(
            "no status for session {session_id}"
        )))
    }

    async fn stop_analysis(
        &self,
        session_id: &SessionId,
    ) -> Result<StopAnalysisResponse, TransportError> {
        Err(TransportError::Unavailable(format!(
            "cannot stop session {session_id}"
        )))
    }

    async fn save_results(
        &self,
        session_id: &SessionId,
        _results: &ScoreResult,
    ) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(format!(
            "cannot save results for session {session_id}"
        )))
    }

    async fn release_session(&self, session_id: &SessionId) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(format!(
            "cannot release session {session_id}"
        )))
    }
}
