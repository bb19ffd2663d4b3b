//! Client error types.
//!
//! Errors are categorized by how the caller recovers from them. Nothing in
//! this crate retries automatically; every failure is surfaced once.
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Input** | `ValidationRejected`, `InvalidCredentials`, `UsernameTaken`, `WeakCredential` | User corrects input |
//! | **Session** | `SessionExpired`, `NotAuthenticated` | Log in again |
//! | **Transport** | `NetworkUnavailable`, `Backend`, `InvalidResponse` | Surface, re-check later |
//! | **Run** | `UnexpectedStatus`, `Superseded` | Terminal for that run |
//! | **Local** | `Storage`, `Configuration` | Fix environment |

use thiserror::Error;

/// Errors that can occur while talking to the solver backend.
///
/// Payloads are plain strings so errors can be cloned into terminal
/// orchestrator states and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ClientError {
    // ── Input errors (user corrects input) ──────────────────────────
    /// The backend rejected the job payload (4xx on submit).
    #[error("Validation rejected: {0}")]
    ValidationRejected(String),

    /// Login was refused by the backend.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Registration failed because the username already exists.
    #[error("Username taken: {0}")]
    UsernameTaken(String),

    /// Registration failed because the password was not acceptable.
    #[error("Weak credential: {0}")]
    WeakCredential(String),

    // ── Session errors (log in again) ───────────────────────────────
    /// An authenticated call was answered with 401/403. The session has
    /// already been cleared by the time the caller sees this.
    #[error("Session expired")]
    SessionExpired,

    /// An authenticated call was attempted without a session.
    #[error("Not authenticated")]
    NotAuthenticated,

    // ── Transport errors ────────────────────────────────────────────
    /// The backend could not be reached.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The backend answered with a status outside the handled set.
    #[error("Backend error ({status}): {message}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The backend answered with a body that could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // ── Run errors ──────────────────────────────────────────────────
    /// The solver reported a status value outside the known set.
    #[error("Solver finished with unexpected status: {0}")]
    UnexpectedStatus(String),

    /// The run was cancelled or replaced before the backend answered.
    #[error("Superseded by a newer run")]
    Superseded,

    // ── Local errors ────────────────────────────────────────────────
    /// Durable session storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Returns `true` for the authorization failure that tears down the
    /// session and any in-flight orchestration.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::NotAuthenticated)
    }

    /// Returns `true` if the user can fix this by changing their input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::ValidationRejected(_)
                | Self::InvalidCredentials(_)
                | Self::UsernameTaken(_)
                | Self::WeakCredential(_)
        )
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors() {
        assert!(ClientError::SessionExpired.is_session_expired());
        assert!(ClientError::NotAuthenticated.is_session_expired());
        assert!(!ClientError::NetworkUnavailable("down".into()).is_session_expired());
    }

    #[test]
    fn test_user_correctable() {
        assert!(ClientError::ValidationRejected("bad".into()).is_user_correctable());
        assert!(ClientError::UsernameTaken("bob".into()).is_user_correctable());
        assert!(!ClientError::SessionExpired.is_user_correctable());
        assert!(!ClientError::UnexpectedStatus("FOO".into()).is_user_correctable());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::UnexpectedStatus("PAUSED".into());
        assert_eq!(
            err.to_string(),
            "Solver finished with unexpected status: PAUSED"
        );
        let err = ClientError::Backend {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Backend error (500): boom");
    }
}
