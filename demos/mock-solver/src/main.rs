//! In-process mock scheduling backend driving the solver client.
//!
//! The mock accepts any login, hands out problem ids on submit, and walks
//! each job through `SOLVING_SCHEDULED → SOLVING_ACTIVE → NOT_SOLVING`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use solver_client::{
    ApiRequest, ApiResponse, ClientConfig, ClientResult, JobRequest, MemorySessionStore, Method,
    Orchestrator, OrchestratorEvent, SectionId, SessionManager, SolverClient, SubjectAssignment,
    Transport,
};
use tracing_subscriber::EnvFilter;

/// Status queries a job answers with before it reports done.
const POLLS_UNTIL_DONE: u32 = 3;

/// In-memory mock backend.
struct MockBackend {
    jobs: Mutex<HashMap<String, u32>>,
    next_id: Mutex<u64>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
        }
    }

    fn solve(&self) -> ApiResponse {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("mock-{}", *next)
        };
        self.jobs.lock().unwrap().insert(id.clone(), 0);
        ApiResponse::json_body(
            200,
            json!({ "problemId": id, "message": "Schedule generation started" }),
        )
    }

    fn status(&self, id: &str) -> ApiResponse {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(polls) = jobs.get_mut(id) else {
            return ApiResponse::json_body(404, json!({ "message": format!("Unknown problem {id}") }));
        };
        *polls += 1;
        let status = match *polls {
            1 => "SOLVING_SCHEDULED",
            n if n < POLLS_UNTIL_DONE => "SOLVING_ACTIVE",
            _ => "NOT_SOLVING",
        };
        ApiResponse::json_body(200, json!({ "status": status }))
    }
}

#[async_trait]
impl Transport for MockBackend {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let authorized = request.bearer() == Some("mock-token");
        let response = match (request.method, request.path.as_str()) {
            (Method::Post, "/auth/login") => ApiResponse::json_body(
                200,
                json!({ "token": "mock-token", "role": "ROLE_SCHEDULER" }),
            ),
            (Method::Post, "/auth/register") => ApiResponse::new(201, ""),
            _ if !authorized => ApiResponse::new(401, ""),
            (Method::Post, "/schedules/solve") => self.solve(),
            (Method::Get, path) => match path.strip_prefix("/schedules/status/") {
                Some(id) => self.status(id),
                None => ApiResponse::new(404, ""),
            },
            _ => ApiResponse::new(404, ""),
        };
        Ok(response)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig {
        poll_interval: Duration::from_millis(200),
        settle_delay: Duration::from_millis(300),
        ..ClientConfig::default()
    };

    let backend = Arc::new(MockBackend::new());
    let session = Arc::new(SessionManager::new(
        backend,
        Arc::new(MemorySessionStore::new()),
    ));
    let logged_in = session.login("scheduler", "mock-password").await?;
    println!(
        "Logged in as {} ({})",
        logged_in.identity().username,
        logged_in.role()
    );

    let section = SectionId(12);
    let request = JobRequest::new(vec![
        SubjectAssignment::new("MATH101", "Calculus I", 3, section).major(),
        SubjectAssignment::new("PHYS101", "Physics I", 4, section).with_teacher(5),
        SubjectAssignment::new("ENG102", "Technical Writing", 2, section),
    ])?;

    let solver = Arc::new(SolverClient::new(session.clone()));
    let (orchestrator, mut events) = Orchestrator::new(solver, &config)?;

    let submission = orchestrator.submit(request, section.to_string()).await?;
    println!("Problem ID: {}", submission.problem_id);
    if let Some(message) = &submission.message {
        println!("Backend:    {message}");
    }
    println!();

    while let Some(event) = events.recv().await {
        match event {
            OrchestratorEvent::Transition { generation, state } => {
                println!("[gen {generation}] {state}");
                if let Some(err) = state.failure() {
                    println!("\nRun failed: {err}");
                    break;
                }
            }
            OrchestratorEvent::Completed {
                problem_id,
                correlation_key,
                ..
            } => {
                println!("\n{problem_id} is ready; open the schedule for section {correlation_key}");
                break;
            }
        }
    }

    session.logout();
    Ok(())
}
