//! Job payload and status types.
//!
//! The remote solver's lifecycle, as seen by the client:
//!
//! ```text
//!   submit() ──→ Queued ──→ Active ──→ Done
//!                  │           │
//!                  └───────────┴──→ Unrecognized(raw)   (fatal to the run)
//! ```
//!
//! **Invariants:**
//! - A [`JobRequest`] holds 1..=10 assignments, all for the same section.
//! - Every assignment has a non-empty code and name and positive hours.
//! - A [`ProblemId`] belongs to exactly one submission.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Maximum number of assignments in one submission.
pub const MAX_ASSIGNMENTS: usize = 10;

/// Backend identifier of a class section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub i64);

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One subject to be placed on a section's timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAssignment {
    pub subject_code: String,
    pub subject_name: String,
    /// Preferred teacher; `None` lets the solver choose.
    pub teacher_id: Option<i64>,
    #[serde(rename = "classHoursPerWeek")]
    pub weekly_hours: u32,
    pub is_major: bool,
    pub section_id: SectionId,
}

impl SubjectAssignment {
    pub fn new(
        subject_code: impl Into<String>,
        subject_name: impl Into<String>,
        weekly_hours: u32,
        section_id: SectionId,
    ) -> Self {
        Self {
            subject_code: subject_code.into(),
            subject_name: subject_name.into(),
            teacher_id: None,
            weekly_hours,
            is_major: false,
            section_id,
        }
    }

    pub fn with_teacher(mut self, teacher_id: i64) -> Self {
        self.teacher_id = Some(teacher_id);
        self
    }

    pub fn major(mut self) -> Self {
        self.is_major = true;
        self
    }
}

/// A validated submission payload. Serializes as a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct JobRequest {
    assignments: Vec<SubjectAssignment>,
}

impl JobRequest {
    /// Validate and wrap a list of assignments.
    ///
    /// This is the form-side check; the orchestrator trusts whatever
    /// `JobRequest` it is handed.
    pub fn new(assignments: Vec<SubjectAssignment>) -> ClientResult<Self> {
        let Some(first) = assignments.first() else {
            return Err(ClientError::ValidationRejected(
                "At least one subject is required.".to_string(),
            ));
        };
        if assignments.len() > MAX_ASSIGNMENTS {
            return Err(ClientError::ValidationRejected(format!(
                "At most {MAX_ASSIGNMENTS} subjects can be scheduled at once."
            )));
        }
        let section_id = first.section_id;
        for (i, a) in assignments.iter().enumerate() {
            if a.subject_code.trim().is_empty() || a.subject_name.trim().is_empty() {
                return Err(ClientError::ValidationRejected(format!(
                    "Subject Code and Name are required for all subjects (row {}).",
                    i + 1
                )));
            }
            if a.weekly_hours == 0 {
                return Err(ClientError::ValidationRejected(format!(
                    "Weekly hours must be positive for {}.",
                    a.subject_code
                )));
            }
            if a.section_id != section_id {
                return Err(ClientError::ValidationRejected(
                    "All subjects must target the same section.".to_string(),
                ));
            }
        }
        Ok(Self { assignments })
    }

    /// The section every assignment targets.
    pub fn section_id(&self) -> SectionId {
        self.assignments[0].section_id
    }

    pub fn assignments(&self) -> &[SubjectAssignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Always `false` for a constructed request.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Identifier of one solver run, returned by the backend on submit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemId(pub String);

impl ProblemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProblemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProblemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProblemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Known solver states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted, solver not started yet.
    Queued,
    /// Solver is working.
    Active,
    /// Solver stopped; results can be fetched.
    Done,
}

impl JobStatus {
    /// Check if the solver is still working on the job.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Active)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Done)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "Queued"),
            JobStatus::Active => write!(f, "Active"),
            JobStatus::Done => write!(f, "Done"),
        }
    }
}

/// A status value as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Known(JobStatus),
    /// Anything outside the known vocabulary, kept verbatim for diagnosis.
    Unrecognized(String),
}

impl RemoteStatus {
    /// Map the backend's status vocabulary.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "SOLVING_SCHEDULED" => RemoteStatus::Known(JobStatus::Queued),
            "SOLVING_ACTIVE" => RemoteStatus::Known(JobStatus::Active),
            "NOT_SOLVING" => RemoteStatus::Known(JobStatus::Done),
            other => RemoteStatus::Unrecognized(other.to_string()),
        }
    }

    /// The backend's spelling of this status.
    pub fn wire_name(&self) -> &str {
        match self {
            RemoteStatus::Known(JobStatus::Queued) => "SOLVING_SCHEDULED",
            RemoteStatus::Known(JobStatus::Active) => "SOLVING_ACTIVE",
            RemoteStatus::Known(JobStatus::Done) => "NOT_SOLVING",
            RemoteStatus::Unrecognized(raw) => raw,
        }
    }
}
