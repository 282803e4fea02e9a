use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use shared::domain::SessionId;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOwner {
    LocalPreview,
    /// Handed to the detection service; the session id is known once the
    /// remote session exists.
    Detector(Option<SessionId>),
}

impl fmt::Display for CaptureOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalPreview => f.write_str("local preview"),
            Self::Detector(Some(session_id)) => write!(f, "detector session {session_id}"),
            Self::Detector(None) => f.write_str("detector"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("camera is held by {holder}; release it and retry")]
pub struct DeviceBusy {
    pub holder: CaptureOwner,
}

/// The single camera device shared by the local preview and the detector.
///
/// Clones refer to the same slot. Ownership is exclusive and always held
/// through a guard, so the slot is freed on every exit path.
#[derive(Debug, Clone, Default)]
pub struct CaptureSlot {
    owner: Arc<Mutex<Option<CaptureOwner>>>,
}

impl CaptureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CaptureOwner>> {
        self.owner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn owner(&self) -> Option<CaptureOwner> {
        self.lock().clone()
    }

    pub fn is_free(&self) -> bool {
        self.lock().is_none()
    }

    fn claim(&self, owner: CaptureOwner) -> Result<(), DeviceBusy> {
        let mut slot = self.lock();
        if let Some(holder) = slot.as_ref() {
            return Err(DeviceBusy {
                holder: holder.clone(),
            });
        }
        *slot = Some(owner);
        Ok(())
    }

    fn release(&self) {
        self.lock().take();
    }

    pub fn acquire_local_preview(&self) -> Result<LocalPreview, DeviceBusy> {
        self.claim(CaptureOwner::LocalPreview)?;
        debug!("camera: local preview started");
        Ok(LocalPreview {
            slot: self.clone(),
            active: true,
        })
    }

    /// Gives the camera to the detector. Fails if a local preview (or an
    /// earlier detector session) still holds it.
    pub fn hand_off_to_detector(&self) -> Result<DetectorLease, DeviceBusy> {
        self.claim(CaptureOwner::Detector(None))?;
        debug!("camera: handed off to detector");
        Ok(DetectorLease { slot: self.clone() })
    }
}

/// A locally held camera stream.
#[derive(Debug)]
pub struct LocalPreview {
    slot: CaptureSlot,
    active: bool,
}

impl LocalPreview {
    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.active) {
            self.slot.release();
            debug!("camera: local preview stopped");
        }
    }
}

impl Drop for LocalPreview {
    fn drop(&mut self) {
        self.release();
    }
}

/// Detector ownership of the camera for one session.
#[derive(Debug)]
pub struct DetectorLease {
    slot: CaptureSlot,
}

impl DetectorLease {
    pub(crate) fn bind_session(&self, session_id: &SessionId) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Some(CaptureOwner::Detector(_))) {
            *slot = Some(CaptureOwner::Detector(Some(session_id.clone())));
        }
    }
}

impl Drop for DetectorLease {
    fn drop(&mut self) {
        self.slot.release();
        debug!("camera: released by detector");
    }
}

#[cfg(test)]
#[path = "tests/capture_tests.rs"]
mod tests;
