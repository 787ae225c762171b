//! Remote document service client.
//!
//! Two seams are exposed to the orchestrator:
//!
//! - [`SessionManager`]: `login` / `logoff` against the service
//! - [`DocumentUploader`]: one upload attempt per call, classified as an [`Outcome`]
//!
//! The HTTP implementations are [`RemoteSession`] and [`RemoteUploader`]. The
//! uploader holds an `Arc<RemoteSession>` and sends every request through the
//! session's cookie-carrying client.

mod session;
mod upload;

pub use session::{RemoteSession, SessionState};
pub use upload::{build_index_fields, classify_status, content_type_for, IndexField, RemoteUploader};

use async_trait::async_trait;
use serde::Serialize;

use crate::staging::StagingRecord;

/// Establishes and tears down the authenticated session.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Log in and verify the session with an authenticated probe.
    /// Never errors; failures are logged and reported as `false`.
    async fn login(&self) -> bool;

    /// End the session. A no-op when no session is established; failures are
    /// logged and swallowed.
    async fn logoff(&self);
}

/// Performs a single upload attempt for one staging record.
#[async_trait]
pub trait DocumentUploader: Send + Sync {
    async fn upload(&self, record: &StagingRecord) -> Outcome;
}

/// Result of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The service stored the document under `remote_id`.
    Success { remote_id: i64 },
    /// The service already holds this document.
    SkippedDuplicate,
    /// Permanent per-record failure; never retried.
    Rejected { reason: String },
    /// The session is no longer valid.
    AuthExpired,
    /// Transport, serialization or unexpected response error.
    GeneralFailure { reason: String },
}

impl Outcome {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Outcome::Rejected {
            reason: reason.into(),
        }
    }

    pub fn general(reason: impl Into<String>) -> Self {
        Outcome::GeneralFailure {
            reason: reason.into(),
        }
    }

    /// Progress tag printed for this outcome.
    pub fn tag(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "SUCCESS",
            Outcome::SkippedDuplicate => "SKIPPED",
            Outcome::Rejected { .. } | Outcome::AuthExpired | Outcome::GeneralFailure { .. } => {
                "FAILED"
            }
        }
    }

    /// Short human-readable detail for log lines.
    pub fn detail(&self) -> String {
        match self {
            Outcome::Success { remote_id } => format!("document {}", remote_id),
            Outcome::SkippedDuplicate => "duplicate".to_string(),
            Outcome::Rejected { reason } => format!("rejected: {}", reason),
            Outcome::AuthExpired => "session expired".to_string(),
            Outcome::GeneralFailure { reason } => format!("error: {}", reason),
        }
    }
}
