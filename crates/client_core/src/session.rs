use std::{
    fmt,
    sync::{Arc, Mutex as StdMutex, Weak},
    time::Duration,
};

use serde::Serialize;
use shared::{
    domain::{EnvironmentId, ProcessId, SessionId},
    protocol::{
        AnalysisStatus, ProcessStep, ScoreResult, StartAnalysisRequest, StepEvent,
        StopAnalysisResponse,
    },
};
use tokio::{
    runtime::Handle,
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    capture::{CaptureSlot, DetectorLease},
    clock::{Clock, SystemClock},
    error::{PreconditionFailure, TrackingError, TransportError},
    plan::SessionPlan,
    scoring, DetectionService,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Preparing,
    Active,
    Stopping,
    Completed,
    Error,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Active => "active",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Phases during which a session owns the detector.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Preparing | Self::Active | Self::Stopping)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Remote,
    LocalFallback,
}

/// Local mirror of the remote session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSession {
    pub session_id: SessionId,
    pub environment_id: EnvironmentId,
    pub process_id: ProcessId,
    pub start_time_epoch_ms: i64,
    pub current_step_index: usize,
    pub step_events: Vec<StepEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionFailure {
    pub phase: SessionPhase,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub session: Option<TrackingSession>,
    pub total_steps: usize,
    pub process_complete: bool,
    pub remote_elapsed_seconds: Option<f64>,
    pub results: Option<ScoreResult>,
    pub result_source: Option<ResultSource>,
    pub failure: Option<SessionFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub results: ScoreResult,
    pub source: ResultSource,
    /// Whether the results endpoint accepted the record.
    pub persisted: bool,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionPhase),
    StepLogAdvanced {
        current_step_index: usize,
        events: Vec<StepEvent>,
    },
    ProcessComplete,
    TrackingInterrupted(String),
    Completed {
        results: ScoreResult,
        source: ResultSource,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TrackingOptions {
    pub poll_interval: Duration,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Default)]
struct SessionState {
    phase: SessionPhase,
    steps: Vec<ProcessStep>,
    session: Option<TrackingSession>,
    lease: Option<DetectorLease>,
    process_complete: bool,
    remote_elapsed_seconds: Option<f64>,
    results: Option<ScoreResult>,
    result_source: Option<ResultSource>,
    failure: Option<SessionFailure>,
}

impl SessionState {
    fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|session| &session.session_id)
    }
}

struct ControllerInner {
    service: Arc<dyn DetectionService>,
    clock: Arc<dyn Clock>,
    capture: CaptureSlot,
    options: TrackingOptions,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    poll_task: StdMutex<Option<JoinHandle<()>>>,
    /// Remote session created by a start that has not yet been recorded in
    /// the state.
    half_open: StdMutex<Option<SessionId>>,
}

impl ControllerInner {
    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn set_phase(&self, state: &mut SessionState, phase: SessionPhase) {
        state.phase = phase;
        self.publish(SessionEvent::StateChanged(phase));
    }

    fn set_half_open(&self, session_id: Option<SessionId>) -> Option<SessionId> {
        let mut half_open = self
            .half_open
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *half_open, session_id)
    }

    /// Drops a start that never reached `Active`: the camera is freed and
    /// the controller is idle again.
    fn abandon_start(&self, state: &mut SessionState) {
        if state.phase != SessionPhase::Preparing {
            return;
        }
        *state = SessionState::default();
        self.publish(SessionEvent::StateChanged(SessionPhase::Idle));
    }

    fn cancel_polling(&self) {
        let task = self
            .poll_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
            debug!("status polling cancelled");
        }
    }

    /// One status fetch. Returns whether polling should continue.
    async fn poll_once(&self, session_id: &SessionId) -> bool {
        let result = self.service.analysis_status(session_id).await;
        let mut state = self.state.lock().await;
        if state.phase != SessionPhase::Active || state.session_id() != Some(session_id) {
            return false;
        }
        match result {
            Ok(status) => {
                self.apply_status(&mut state, status);
                true
            }
            Err(err) => {
                self.interrupt(&mut state, err);
                false
            }
        }
    }

    /// Merges a remote status into the local mirror. The remote log wins
    /// when it is longer; the local log never shrinks and the step index
    /// never moves backwards.
    fn apply_status(&self, state: &mut SessionState, status: AnalysisStatus) {
        let total_steps = state.steps.len();
        let Some(session) = state.session.as_mut() else {
            return;
        };

        let mut advanced = false;
        if status.step_events.len() > session.step_events.len() {
            session.step_events = status.step_events;
            advanced = true;
        }
        let reported = status
            .current_step
            .max(session.step_events.len())
            .min(total_steps);
        if reported > session.current_step_index {
            session.current_step_index = reported;
            advanced = true;
        }
        state.remote_elapsed_seconds = Some(status.elapsed_time);

        if advanced {
            info!(
                session_id = %session.session_id,
                step = session.current_step_index,
                events = session.step_events.len(),
                "step log advanced"
            );
            self.publish(SessionEvent::StepLogAdvanced {
                current_step_index: session.current_step_index,
                events: session.step_events.clone(),
            });
        }

        if status.current_step >= total_steps && !state.process_complete {
            state.process_complete = true;
            info!(session_id = %session.session_id, "all steps completed; waiting for stop");
            self.publish(SessionEvent::ProcessComplete);
        }
    }

    fn interrupt(&self, state: &mut SessionState, err: TransportError) {
        let message = err.to_string();
        error!(
            session_id = ?state.session_id(),
            error = %message,
            "status poll failed; tracking interrupted"
        );
        state.failure = Some(SessionFailure {
            phase: SessionPhase::Active,
            message: message.clone(),
        });
        state.lease = None;
        self.publish(SessionEvent::TrackingInterrupted(message));
        self.set_phase(state, SessionPhase::Error);
    }

    async fn release_remote(&self, session_id: &SessionId) {
        match self.service.release_session(session_id).await {
            Ok(()) => debug!(%session_id, "remote session released"),
            Err(err) => warn!(%session_id, error = %err, "failed to release remote session"),
        }
    }

    /// Creates the remote session and starts tracking on it. A session that
    /// was created but could not start tracking is released again.
    async fn open_remote(
        &self,
        request: StartAnalysisRequest,
    ) -> Result<SessionId, TransportError> {
        let response = self.service.start_analysis(request).await?;
        let session_id = response.session_id;
        self.set_half_open(Some(session_id.clone()));
        if let Err(err) = self.service.start_tracking(&session_id).await {
            self.release_remote(&session_id).await;
            self.set_half_open(None);
            return Err(err);
        }
        Ok(session_id)
    }
}

/// Armed while `start` waits on the detector. If the start future is
/// dropped before it settles, the controller goes back to `Idle` and any
/// remote session created so far is released.
struct PendingStart {
    inner: Arc<ControllerInner>,
    armed: bool,
}

impl PendingStart {
    fn arm(inner: Arc<ControllerInner>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingStart {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let half_open = self.inner.set_half_open(None);
        warn!(session_id = ?half_open, "session start abandoned; rolling back to idle");

        let rolled_back = match self.inner.state.try_lock() {
            Ok(mut state) => {
                self.inner.abandon_start(&mut state);
                true
            }
            Err(_) => false,
        };
        if rolled_back && half_open.is_none() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("no runtime to finish rolling back the abandoned start");
            return;
        };
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            if !rolled_back {
                let mut state = inner.state.lock().await;
                inner.abandon_start(&mut state);
            }
            if let Some(session_id) = half_open {
                inner.release_remote(&session_id).await;
            }
        });
    }
}

fn ensure_startable(phase: SessionPhase) -> Result<(), TrackingError> {
    match phase {
        SessionPhase::Idle => Ok(()),
        phase if phase.is_running() => Err(TrackingError::AlreadyRunning { phase }),
        from => Err(TrackingError::InvalidTransition {
            from,
            action: "start",
        }),
    }
}

/// Drives one tracking session at a time against a `DetectionService`.
///
/// This is the owner handle: dropping it cancels status polling and frees
/// the camera slot.
pub struct TrackingSessionController {
    inner: Arc<ControllerInner>,
}

impl TrackingSessionController {
    pub fn new(service: Arc<dyn DetectionService>, capture: CaptureSlot) -> Self {
        Self::with_dependencies(
            service,
            Arc::new(SystemClock),
            capture,
            TrackingOptions::default(),
        )
    }

    pub fn with_dependencies(
        service: Arc<dyn DetectionService>,
        clock: Arc<dyn Clock>,
        capture: CaptureSlot,
        options: TrackingOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(ControllerInner {
                service,
                clock,
                capture,
                options,
                state: Mutex::new(SessionState::default()),
                events,
                poll_task: StdMutex::new(None),
                half_open: StdMutex::new(None),
            }),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn capture(&self) -> &CaptureSlot {
        &self.inner.capture
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.state.lock().await.phase
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock().await;
        SessionSnapshot {
            phase: state.phase,
            session: state.session.clone(),
            total_steps: state.steps.len(),
            process_complete: state.process_complete,
            remote_elapsed_seconds: state.remote_elapsed_seconds,
            results: state.results.clone(),
            result_source: state.result_source,
            failure: state.failure.clone(),
        }
    }

    /// Idle → Preparing → Active.
    ///
    /// Preconditions are checked in order: the plan, then the camera, then
    /// the detector's readiness. Any failure there leaves the controller
    /// idle with nothing created remotely. The state lock is not held while
    /// waiting on the detector, and dropping the returned future before it
    /// settles rolls the controller back to `Idle`.
    pub async fn start(&self, plan: SessionPlan) -> Result<TrackingSession, TrackingError> {
        let inner = &self.inner;
        let (plan, lease) = {
            let state = inner.state.lock().await;
            ensure_startable(state.phase)?;
            let plan = plan.validated()?;
            let lease = inner.capture.hand_off_to_detector()?;
            (plan, lease)
        };

        let availability = inner
            .service
            .tracking_status()
            .await
            .map_err(|err| PreconditionFailure::DetectorUnreachable(err.to_string()))?;
        if !availability.available {
            return Err(PreconditionFailure::DetectorUnavailable.into());
        }
        if !availability.model_loaded {
            return Err(PreconditionFailure::ModelNotLoaded.into());
        }

        let mut state = inner.state.lock().await;
        ensure_startable(state.phase)?;
        state.lease = Some(lease);
        state.steps = plan.steps.clone();
        inner.set_phase(&mut state, SessionPhase::Preparing);
        info!(
            environment_id = plan.environment_id.0,
            process_id = plan.process_id.0,
            total_steps = plan.total_steps(),
            "starting tracking session"
        );
        let pending = PendingStart::arm(Arc::clone(inner));
        drop(state);

        let opened = inner
            .open_remote(StartAnalysisRequest {
                environment_id: plan.environment_id,
                process_id: plan.process_id,
            })
            .await;

        let mut state = inner.state.lock().await;
        pending.disarm();
        inner.set_half_open(None);
        let session_id = match opened {
            Ok(session_id) => session_id,
            Err(source) => {
                error!(error = %source, "failed to start tracking session");
                state.session = None;
                state.lease = None;
                state.failure = Some(SessionFailure {
                    phase: SessionPhase::Preparing,
                    message: source.to_string(),
                });
                inner.set_phase(&mut state, SessionPhase::Error);
                return Err(TrackingError::Transport {
                    phase: SessionPhase::Preparing,
                    source,
                });
            }
        };

        if let Some(lease) = state.lease.as_ref() {
            lease.bind_session(&session_id);
        }
        let session = TrackingSession {
            session_id: session_id.clone(),
            environment_id: plan.environment_id,
            process_id: plan.process_id,
            start_time_epoch_ms: inner.clock.now_epoch_ms(),
            current_step_index: 0,
            step_events: Vec::new(),
        };
        state.session = Some(session.clone());
        inner.set_phase(&mut state, SessionPhase::Active);
        self.spawn_poll_loop(session_id.clone());
        info!(%session_id, "tracking session active");
        Ok(session)
    }

    fn spawn_poll_loop(&self, session_id: SessionId) {
        let weak: Weak<ControllerInner> = Arc::downgrade(&self.inner);
        let period = self.inner.options.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.poll_once(&session_id).await {
                    break;
                }
            }
            debug!(%session_id, "status polling finished");
        });

        let previous = self
            .inner
            .poll_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Active → Stopping → Completed.
    ///
    /// Polling is cancelled before the detector is asked to stop. Results
    /// come from the detector when it returns them and from the local
    /// scorer otherwise; either way they are handed to the results
    /// endpoint and the stop succeeds.
    pub async fn stop(&self) -> Result<SessionOutcome, TrackingError> {
        let inner = &self.inner;
        let session_id = {
            let mut state = inner.state.lock().await;
            let session_id = match (state.phase, state.session_id()) {
                (SessionPhase::Active, Some(session_id)) => session_id.clone(),
                (from, _) => {
                    return Err(TrackingError::InvalidTransition {
                        from,
                        action: "stop",
                    })
                }
            };
            inner.cancel_polling();
            inner.set_phase(&mut state, SessionPhase::Stopping);
            session_id
        };
        info!(%session_id, "stopping tracking session");

        let (results, source) = match inner.service.stop_analysis(&session_id).await {
            Ok(StopAnalysisResponse {
                results: Some(results),
                ..
            }) => (results, ResultSource::Remote),
            Ok(_) => {
                warn!(%session_id, "detector returned no results; scoring locally");
                (self.score_locally().await, ResultSource::LocalFallback)
            }
            Err(err) => {
                warn!(%session_id, error = %err, "stop request failed; scoring locally");
                (self.score_locally().await, ResultSource::LocalFallback)
            }
        };

        let persisted = match inner.service.save_results(&session_id, &results).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%session_id, error = %err, "failed to persist session results");
                false
            }
        };
        inner.release_remote(&session_id).await;

        let mut state = inner.state.lock().await;
        state.lease = None;
        state.results = Some(results.clone());
        state.result_source = Some(source);
        info!(
            %session_id,
            overall = results.overall_adherence,
            completion = results.completion_rate,
            timing = results.time_adherence,
            ?source,
            "tracking session completed"
        );
        inner.publish(SessionEvent::Completed {
            results: results.clone(),
            source,
        });
        inner.set_phase(&mut state, SessionPhase::Completed);

        Ok(SessionOutcome {
            session_id,
            results,
            source,
            persisted,
        })
    }

    async fn score_locally(&self) -> ScoreResult {
        let state = self.inner.state.lock().await;
        let now = self.inner.clock.now_epoch_ms();
        let (events, elapsed_ms) = match state.session.as_ref() {
            Some(session) => (
                session.step_events.as_slice(),
                (now - session.start_time_epoch_ms).max(0),
            ),
            None => (&[][..], 0),
        };
        scoring::local_result(events, &state.steps, elapsed_ms as f64 / 1000.0)
    }

    /// Completed/Error → Idle. A session that ended in error is released
    /// remotely as well.
    pub async fn reset(&self) -> Result<(), TrackingError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        let release = match state.phase {
            SessionPhase::Idle => return Ok(()),
            SessionPhase::Error => state.session_id().cloned(),
            SessionPhase::Completed => None,
            from => {
                return Err(TrackingError::InvalidTransition {
                    from,
                    action: "reset",
                })
            }
        };
        inner.cancel_polling();
        *state = SessionState::default();
        inner.publish(SessionEvent::StateChanged(SessionPhase::Idle));
        drop(state);

        if let Some(session_id) = release {
            inner.release_remote(&session_id).await;
        }
        Ok(())
    }

    /// Teardown: cancels polling, frees the camera and releases whatever
    /// session the detector may still hold.
    pub async fn shutdown(self) {
        let inner = &self.inner;
        inner.cancel_polling();
        let release = {
            let mut state = inner.state.lock().await;
            state.lease = None;
            match state.phase {
                SessionPhase::Active | SessionPhase::Stopping | SessionPhase::Error => {
                    state.session_id().cloned()
                }
                _ => None,
            }
        };
        if let Some(session_id) = release {
            inner.release_remote(&session_id).await;
        }
        info!("tracking controller shut down");
    }
}

impl Drop for TrackingSessionController {
    fn drop(&mut self) {
        self.inner.cancel_polling();
        if let Ok(mut state) = self.inner.state.try_lock() {
            state.lease = None;
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
