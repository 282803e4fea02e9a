use shared::error::ApiError;
use thiserror::Error;

use crate::{capture::DeviceBusy, session::SessionPhase};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {error}")]
    Status {
        endpoint: String,
        status: u16,
        error: ApiError,
    },
    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: reqwest::Error,
    },
    #[error("detection service unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a session refuses to start. None of them involve a session
/// being created remotely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionFailure {
    #[error("no zones are defined for this environment")]
    NoZones,
    #[error("no steps are defined for this process")]
    NoSteps,
    #[error("step plan is invalid: {0}")]
    InvalidSteps(String),
    #[error("detection service could not be reached: {0}")]
    DetectorUnreachable(String),
    #[error("detection service reports it is not available")]
    DetectorUnavailable,
    #[error("detection model is not loaded")]
    ModelNotLoaded,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("cannot start tracking: {0}")]
    Precondition(#[from] PreconditionFailure),
    #[error("camera conflict: {0}")]
    DeviceConflict(#[from] DeviceBusy),
    #[error("detection service failed while {phase}: {source}")]
    Transport {
        phase: SessionPhase,
        source: TransportError,
    },
    #[error("a tracking session is already {phase}")]
    AlreadyRunning { phase: SessionPhase },
    #[error("cannot {action} while the session is {from}")]
    InvalidTransition {
        from: SessionPhase,
        action: &'static str,
    },
}

impl TrackingError {
    /// Phase the session was in when the error was raised.
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Precondition(_) | Self::DeviceConflict(_) => SessionPhase::Idle,
            Self::Transport { phase, .. } | Self::AlreadyRunning { phase } => *phase,
            Self::InvalidTransition { from, .. } => *from,
        }
    }
}
