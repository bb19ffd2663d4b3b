//! Job orchestration state machine.
//!
//! One [`Orchestrator`] drives at most one solver run at a time:
//!
//! ```text
//!   Idle ──→ Submitting ──→ SubmitFailed
//!                 │
//!                 └──→ Polling ──→ PollFailed
//!                         │   ──→ UnexpectedStatus
//!                         │   ──→ Completed ──(settle delay)──→ success signal
//!                         └─┐
//!                           ↺ (Queued / Active)
//! ```
//!
//! **Invariants:**
//! - Every run is tagged with a generation. `submit` and `cancel` advance
//!   it; a response for an older generation never touches state.
//! - Ticks never overlap: the loop awaits each status query before waiting
//!   for the next interval tick.
//! - A failed tick ends the run. Nothing is retried.
//! - Once a terminal state is reached the poll task has exited, so no
//!   further tick can be scheduled.
//! - Losing the session (expiry or logout) ends the run in `PollFailed`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::job::{JobRequest, JobStatus, ProblemId, RemoteStatus};
use crate::session::Session;
use crate::solver::{Solver, Submission};

/// State of the current (or last) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    /// No run, or the last run was cancelled.
    Idle,
    /// Waiting for the backend to accept the job.
    Submitting,
    /// Job accepted; status is being polled.
    Polling {
        problem_id: ProblemId,
        /// Most recent status seen, `None` before the first tick resolves.
        last_status: Option<JobStatus>,
    },
    /// Submission failed; polling never started.
    SubmitFailed(ClientError),
    /// A status query failed.
    PollFailed(ClientError),
    /// The backend reported a status outside the known vocabulary.
    UnexpectedStatus(String),
    /// The solver finished.
    Completed { problem_id: ProblemId },
}

impl OrchestratorState {
    /// Check if no further automatic transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorState::SubmitFailed(_)
                | OrchestratorState::PollFailed(_)
                | OrchestratorState::UnexpectedStatus(_)
                | OrchestratorState::Completed { .. }
        )
    }

    /// Check if a run is in flight.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrchestratorState::Submitting | OrchestratorState::Polling { .. }
        )
    }

    /// The error a failed run ended with.
    pub fn failure(&self) -> Option<ClientError> {
        match self {
            OrchestratorState::SubmitFailed(e) | OrchestratorState::PollFailed(e) => {
                Some(e.clone())
            }
            OrchestratorState::UnexpectedStatus(raw) => {
                Some(ClientError::UnexpectedStatus(raw.clone()))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorState::Idle => write!(f, "Idle"),
            OrchestratorState::Submitting => write!(f, "Submitting"),
            OrchestratorState::Polling {
                problem_id,
                last_status: Some(status),
            } => write!(f, "Polling {problem_id} ({status})"),
            OrchestratorState::Polling { problem_id, .. } => write!(f, "Polling {problem_id}"),
            OrchestratorState::SubmitFailed(e) => write!(f, "Submit failed: {e}"),
            OrchestratorState::PollFailed(e) => write!(f, "Poll failed: {e}"),
            OrchestratorState::UnexpectedStatus(raw) => write!(f, "Unexpected status: {raw}"),
            OrchestratorState::Completed { problem_id } => write!(f, "Completed {problem_id}"),
        }
    }
}

/// Notifications delivered to the owner of an [`Orchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    /// The state changed.
    Transition {
        generation: u64,
        state: OrchestratorState,
    },
    /// Results are ready. Fired once per successful run, after the settle
    /// delay, carrying the key supplied to `submit`.
    Completed {
        generation: u64,
        problem_id: ProblemId,
        correlation_key: String,
    },
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    poll_interval: Duration,
    settle_delay: Duration,
}

struct Run {
    generation: u64,
    cancel: CancellationToken,
}

struct Inner {
    state: OrchestratorState,
    generation: u64,
    run: Option<Run>,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.run.as_ref().is_some_and(|r| r.generation == generation)
    }

    fn end_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel.cancel();
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    events: mpsc::UnboundedSender<OrchestratorEvent>,
}

enum Tick {
    Continue,
    Done,
    Stop,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `state`, emitting an event only if it differs.
    fn transition(&self, inner: &mut Inner, state: OrchestratorState) {
        if inner.state != state {
            self.enter(inner, state);
        }
    }

    fn enter(&self, inner: &mut Inner, state: OrchestratorState) {
        tracing::debug!(generation = inner.generation, from = %inner.state, to = %state, "Orchestrator transition");
        inner.state = state.clone();
        // The owner may have dropped the receiver; state is still readable.
        let _ = self.events.send(OrchestratorEvent::Transition {
            generation: inner.generation,
            state,
        });
    }

    /// Supersede any run in flight and open a new generation.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut inner = self.lock();
        if let Some(old) = inner.run.take() {
            tracing::info!(generation = old.generation, "Superseding run in flight");
            old.cancel.cancel();
        }
        inner.generation += 1;
        let cancel = CancellationToken::new();
        inner.run = Some(Run {
            generation: inner.generation,
            cancel: cancel.clone(),
        });
        let generation = inner.generation;
        // Announced even when the superseded run was also submitting.
        self.enter(&mut inner, OrchestratorState::Submitting);
        (generation, cancel)
    }

    /// End the run with a failure, unless it has already been superseded.
    fn fail(&self, generation: u64, state: OrchestratorState) {
        let mut inner = self.lock();
        if !inner.is_current(generation) {
            return;
        }
        inner.end_run();
        tracing::error!(generation, "Run failed: {}", state);
        self.transition(&mut inner, state);
    }

    fn apply_tick(
        &self,
        generation: u64,
        problem_id: &ProblemId,
        result: ClientResult<RemoteStatus>,
    ) -> Tick {
        let mut inner = self.lock();
        if !inner.is_current(generation) {
            tracing::debug!(generation, %problem_id, "Discarding stale status response");
            return Tick::Stop;
        }

        match result {
            Ok(RemoteStatus::Known(status @ (JobStatus::Queued | JobStatus::Active))) => {
                let state = OrchestratorState::Polling {
                    problem_id: problem_id.clone(),
                    last_status: Some(status),
                };
                self.transition(&mut inner, state);
                Tick::Continue
            }
            Ok(RemoteStatus::Known(JobStatus::Done)) => {
                tracing::info!(generation, %problem_id, "Solver finished");
                let state = OrchestratorState::Completed {
                    problem_id: problem_id.clone(),
                };
                self.transition(&mut inner, state);
                Tick::Done
            }
            Ok(RemoteStatus::Unrecognized(raw)) => {
                inner.end_run();
                tracing::error!(generation, %problem_id, status = %raw, "Unexpected solver status");
                self.transition(&mut inner, OrchestratorState::UnexpectedStatus(raw));
                Tick::Stop
            }
            Err(e) => {
                inner.end_run();
                tracing::error!(generation, %problem_id, "Error polling solver status: {}", e);
                self.transition(&mut inner, OrchestratorState::PollFailed(e));
                Tick::Stop
            }
        }
    }

    fn finish(&self, generation: u64, problem_id: ProblemId, correlation_key: String) {
        let mut inner = self.lock();
        if !inner.is_current(generation) {
            tracing::debug!(generation, %problem_id, "Run cancelled during settle delay");
            return;
        }
        inner.run = None;
        tracing::info!(generation, %problem_id, correlation_key = %correlation_key, "Results ready");
        let _ = self.events.send(OrchestratorEvent::Completed {
            generation,
            problem_id,
            correlation_key,
        });
    }
}

/// Drives one solver run at a time: submit, poll, report.
pub struct Orchestrator {
    solver: Arc<dyn Solver>,
    timing: Timing,
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Create an orchestrator and the receiver its events are delivered on.
    ///
    /// Fails with `Configuration` if `config.poll_interval` is zero.
    pub fn new(
        solver: Arc<dyn Solver>,
        config: &ClientConfig,
    ) -> ClientResult<(Self, mpsc::UnboundedReceiver<OrchestratorEvent>)> {
        if config.poll_interval.is_zero() {
            return Err(ClientError::Configuration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        let (events, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            solver,
            timing: Timing {
                poll_interval: config.poll_interval,
                settle_delay: config.settle_delay,
            },
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: OrchestratorState::Idle,
                    generation: 0,
                    run: None,
                }),
                events,
            }),
        };
        Ok((orchestrator, rx))
    }

    /// Submit a job and start polling it.
    ///
    /// Any run already in flight is cancelled first. On success the poll
    /// loop runs in the background and the outcome is reported through
    /// events; `correlation_key` is handed back in the success signal.
    ///
    /// Returns `Superseded` if `cancel` or another `submit` happened while
    /// the backend was still answering.
    pub async fn submit(
        &self,
        request: JobRequest,
        correlation_key: impl Into<String>,
    ) -> ClientResult<Submission> {
        let correlation_key = correlation_key.into();
        let (generation, cancel) = self.shared.begin();
        tracing::info!(generation, subjects = request.len(), "Submitting solver job");

        let result = self.solver.submit(&request).await;

        let mut inner = self.shared.lock();
        if !inner.is_current(generation) {
            tracing::debug!(generation, "Discarding submit response for superseded run");
            return Err(ClientError::Superseded);
        }

        let submission = match result {
            Ok(submission) => submission,
            Err(e) => {
                inner.end_run();
                tracing::error!(generation, "Error submitting solver job: {}", e);
                self.shared
                    .transition(&mut inner, OrchestratorState::SubmitFailed(e.clone()));
                return Err(e);
            }
        };

        self.shared.transition(
            &mut inner,
            OrchestratorState::Polling {
                problem_id: submission.problem_id.clone(),
                last_status: None,
            },
        );
        drop(inner);

        tokio::spawn(poll(
            self.shared.clone(),
            self.solver.clone(),
            self.timing,
            generation,
            submission.problem_id.clone(),
            correlation_key,
            cancel,
        ));
        Ok(submission)
    }

    /// Stop the current run. Idempotent; a no-op without a run.
    ///
    /// A status query already on the wire is allowed to finish, but its
    /// response is discarded.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        let Some(run) = inner.run.take() else {
            return;
        };
        run.cancel.cancel();
        inner.generation += 1;
        tracing::info!(generation = run.generation, "Run cancelled");
        if inner.state.is_active() {
            self.shared.transition(&mut inner, OrchestratorState::Idle);
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.shared.lock().state.clone()
    }

    /// Current generation. Advances on every `submit` and effective `cancel`.
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.shared.lock().state, OrchestratorState::Polling { .. })
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}

enum Wake {
    Tick,
    SessionChanged { sender_alive: bool },
}

fn session_gone(session: &mut watch::Receiver<Option<Session>>) -> bool {
    session.borrow_and_update().is_none()
}

async fn poll(
    shared: Arc<Shared>,
    solver: Arc<dyn Solver>,
    timing: Timing,
    generation: u64,
    problem_id: ProblemId,
    correlation_key: String,
    cancel: CancellationToken,
) {
    let mut session = solver.session();
    let mut ticker = tokio::time::interval(timing.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let wake = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            changed = session.changed() => Wake::SessionChanged { sender_alive: changed.is_ok() },
            _ = ticker.tick() => Wake::Tick,
        };

        match wake {
            Wake::SessionChanged { sender_alive } => {
                if !sender_alive || session_gone(&mut session) {
                    shared.fail(
                        generation,
                        OrchestratorState::PollFailed(ClientError::SessionExpired),
                    );
                    return;
                }
                continue;
            }
            Wake::Tick => {}
        }

        if session_gone(&mut session) {
            shared.fail(
                generation,
                OrchestratorState::PollFailed(ClientError::SessionExpired),
            );
            return;
        }

        tracing::debug!(generation, %problem_id, "Polling solver status");
        let result = solver.status(&problem_id).await;
        match shared.apply_tick(generation, &problem_id, result) {
            Tick::Continue => {}
            Tick::Done => break,
            Tick::Stop => return,
        }
    }

    // Give the backend time to materialize results before the owner is
    // told to fetch them.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(generation, %problem_id, "Success signal suppressed");
        }
        _ = tokio::time::sleep(timing.settle_delay) => {
            shared.finish(generation, problem_id, correlation_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{SectionId, SubjectAssignment};
    use crate::session::Identity;
    use crate::session::Role;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Solver that answers from a queue and never blocks.
    struct QueueSolver {
        statuses: Mutex<VecDeque<ClientResult<RemoteStatus>>>,
        session: watch::Sender<Option<Session>>,
    }

    impl QueueSolver {
        fn new(statuses: Vec<ClientResult<RemoteStatus>>) -> Arc<Self> {
            let session = Session::new(
                "tok",
                Identity {
                    username: "ana".into(),
                    role: Role::Scheduler,
                },
            );
            let (tx, _) = watch::channel(Some(session));
            Arc::new(Self {
                statuses: Mutex::new(statuses.into()),
                session: tx,
            })
        }
    }

    #[async_trait]
    impl Solver for QueueSolver {
        async fn submit(&self, _request: &JobRequest) -> ClientResult<Submission> {
            Ok(Submission {
                problem_id: ProblemId::new("p1"),
                message: None,
            })
        }

        async fn status(&self, _problem_id: &ProblemId) -> ClientResult<RemoteStatus> {
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ClientError::NetworkUnavailable("script exhausted".into())))
        }

        fn session(&self) -> watch::Receiver<Option<Session>> {
            self.session.subscribe()
        }
    }

    fn request() -> JobRequest {
        JobRequest::new(vec![SubjectAssignment::new(
            "MATH101",
            "Calculus",
            3,
            SectionId(7),
        )])
        .unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_state_classification() {
        assert!(!OrchestratorState::Idle.is_terminal());
        assert!(OrchestratorState::Submitting.is_active());
        assert!(OrchestratorState::UnexpectedStatus("X".into()).is_terminal());
        assert_eq!(
            OrchestratorState::UnexpectedStatus("X".into()).failure(),
            Some(ClientError::UnexpectedStatus("X".into()))
        );
        assert!(
            OrchestratorState::Completed {
                problem_id: ProblemId::new("p1")
            }
            .failure()
            .is_none()
        );
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let config = ClientConfig {
            poll_interval: Duration::ZERO,
            ..ClientConfig::default()
        };
        let err = Orchestrator::new(QueueSolver::new(vec![]), &config).err();
        assert!(matches!(err, Some(ClientError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_noop() {
        let (orchestrator, mut rx) =
            Orchestrator::new(QueueSolver::new(vec![]), &ClientConfig::default()).unwrap();
        orchestrator.cancel();
        orchestrator.cancel();
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
        assert_eq!(orchestrator.generation(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_is_terminal() {
        let solver = QueueSolver::new(vec![
            Ok(RemoteStatus::Known(JobStatus::Queued)),
            Ok(RemoteStatus::Unrecognized("PAUSED".into())),
        ]);
        let (orchestrator, mut rx) =
            Orchestrator::new(solver.clone(), &ClientConfig::default()).unwrap();

        orchestrator.submit(request(), "7").await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(
            orchestrator.state(),
            OrchestratorState::UnexpectedStatus("PAUSED".into())
        );
        assert!(solver.statuses.lock().unwrap().is_empty());
        let completed = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, OrchestratorEvent::Completed { .. }))
            .count();
        assert_eq!(completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_ends_run() {
        let solver = QueueSolver::new(vec![Err(ClientError::NetworkUnavailable(
            "connection reset".into(),
        ))]);
        let (orchestrator, _rx) = Orchestrator::new(solver, &ClientConfig::default()).unwrap();

        orchestrator.submit(request(), "7").await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(
            orchestrator.state(),
            OrchestratorState::PollFailed(ClientError::NetworkUnavailable(
                "connection reset".into()
            ))
        );
        assert!(!orchestrator.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_settle_suppresses_signal() {
        let solver = QueueSolver::new(vec![Ok(RemoteStatus::Known(JobStatus::Done))]);
        let (orchestrator, mut rx) =
            Orchestrator::new(solver, &ClientConfig::default()).unwrap();

        orchestrator.submit(request(), "7").await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(
            orchestrator.state(),
            OrchestratorState::Completed { .. }
        ));

        orchestrator.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        // Terminal state is kept; only the pending signal is dropped.
        assert!(matches!(
            orchestrator.state(),
            OrchestratorState::Completed { .. }
        ));
        assert!(
            !drain(&mut rx)
                .iter()
                .any(|e| matches!(e, OrchestratorEvent::Completed { .. }))
        );
    }
}
