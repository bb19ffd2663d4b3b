//! Solver trait and its backend client.
//!
//! The [`Solver`] trait is the seam the orchestrator drives:
//!
//! ```text
//!   submit() ──→ status() ──→ status() ──→ ... ──→ Done
//!   (async)      (async)      (async)
//! ```
//!
//! | Method | Endpoint | Errors |
//! |--------|----------|--------|
//! | `submit()` | `POST /schedules/solve` | `ValidationRejected`, `SessionExpired`, `NetworkUnavailable`, `InvalidResponse` |
//! | `status()` | `GET /schedules/status/{problemId}` | `SessionExpired`, `NetworkUnavailable`, `Backend`, `InvalidResponse` |
//!
//! [`SolverClient`] routes both calls through
//! [`SessionManager::authorized_call`], so a 401/403 on either one ends the
//! session before the error reaches the orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;

use crate::error::{ClientError, ClientResult};
use crate::job::{JobRequest, ProblemId, RemoteStatus};
use crate::session::{Session, SessionManager};
use crate::transport::ApiRequest;

/// Accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub problem_id: ProblemId,
    /// Free-form acknowledgement from the backend, if it sent one.
    pub message: Option<String>,
}

/// Trait for remote solvers.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Submit a job. Not retried.
    async fn submit(&self, request: &JobRequest) -> ClientResult<Submission>;

    /// Query the status of a submitted job.
    async fn status(&self, problem_id: &ProblemId) -> ClientResult<RemoteStatus>;

    /// Session feed the orchestrator watches while polling.
    fn session(&self) -> watch::Receiver<Option<Session>>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    problem_id: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    /// Kept loose: a missing or non-string status is reported as
    /// unrecognized rather than as a malformed response.
    #[serde(default)]
    status: Option<serde_json::Value>,
}

impl StatusResponse {
    fn into_remote_status(self) -> RemoteStatus {
        match self.status {
            Some(serde_json::Value::String(raw)) => RemoteStatus::parse(&raw),
            None | Some(serde_json::Value::Null) => {
                RemoteStatus::Unrecognized("undefined".to_string())
            }
            Some(other) => RemoteStatus::Unrecognized(other.to_string()),
        }
    }
}

/// Solver backed by the scheduling API.
pub struct SolverClient {
    session: Arc<SessionManager>,
}

impl SolverClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Solver for SolverClient {
    async fn submit(&self, request: &JobRequest) -> ClientResult<Submission> {
        let response = self
            .session
            .authorized_call(ApiRequest::post("/schedules/solve", request)?)
            .await?;

        if response.is_client_error() {
            return Err(ClientError::ValidationRejected(response.message()));
        }
        if !response.is_success() {
            return Err(response.into_backend_error());
        }

        let body: SubmitResponse = response.json()?;
        let problem_id = body
            .problem_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ClientError::InvalidResponse("Backend did not return a problemId.".to_string())
            })?;

        tracing::info!(
            problem_id = %problem_id,
            section_id = %request.section_id(),
            subjects = request.len(),
            "Solver job submitted"
        );
        Ok(Submission {
            problem_id: ProblemId(problem_id),
            message: body.message,
        })
    }

    async fn status(&self, problem_id: &ProblemId) -> ClientResult<RemoteStatus> {
        let path = format!("/schedules/status/{problem_id}");
        let response = self.session.authorized_call(ApiRequest::get(path)).await?;
        if !response.is_success() {
            return Err(response.into_backend_error());
        }

        let status = response.json::<StatusResponse>()?.into_remote_status();
        tracing::debug!(%problem_id, status = status.wire_name(), "Solver status");
        Ok(status)
    }

    fn session(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}
