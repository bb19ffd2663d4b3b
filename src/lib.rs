//! Solver Client — submit long-running scheduling jobs and track them to completion.
//!
//! This crate lets an authenticated user hand a timetable optimization job to
//! a remote solver, follow its progress by polling, and learn when results
//! are ready, all inside a session that can expire at any moment.
//!
//! # Overview
//!
//! The client is made of two loosely coupled parts:
//! - A [`SessionManager`] that owns the credential, attaches it to every
//!   authenticated call, and tears the session down on 401/403
//! - An [`Orchestrator`] that submits a [`JobRequest`] through a [`Solver`],
//!   polls its status at a fixed cadence, and reports one terminal outcome
//!
//! Supporting types:
//! - [`Transport`] / [`HttpTransport`] for moving requests to the backend
//! - [`ClientConfig`] for the API root and timing constants
//! - [`ClientError`] with categorized error variants
//!
//! # Lifecycle
//!
//! ```text
//!   login() ──→ submit() ──→ status() ──→ status() ──→ ... ──→ Completed
//!   (async)      (async)      (tick)       (tick)              (event)
//! ```
//!
//! ```ignore
//! use std::sync::Arc;
//! use solver_client::{
//!     ClientConfig, FileSessionStore, HttpTransport, JobRequest, Orchestrator, SessionManager,
//!     SolverClient,
//! };
//!
//! let config = ClientConfig::from_env()?;
//! let transport = Arc::new(HttpTransport::new(config.clone())?);
//! let session = Arc::new(SessionManager::new(transport, Arc::new(FileSessionStore::new("session.json"))));
//! session.login("ana", "correct horse").await?;
//!
//! let solver = Arc::new(SolverClient::new(session.clone()));
//! let (orchestrator, mut events) = Orchestrator::new(solver, &config)?;
//! orchestrator.submit(request, request.section_id().to_string()).await?;
//! while let Some(event) = events.recv().await { /* ... */ }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod session;
pub mod solver;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use job::{JobRequest, JobStatus, ProblemId, RemoteStatus, SectionId, SubjectAssignment};
pub use orchestrator::{Orchestrator, OrchestratorEvent, OrchestratorState};
pub use session::{
    Access, FileSessionStore, Identity, MemorySessionStore, RequestGate, Role, Session,
    SessionManager, SessionStore,
};
pub use solver::{Solver, SolverClient, Submission};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
