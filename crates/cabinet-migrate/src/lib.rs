//! # cabinet-migrate
//!
//! Resumable document upload from a staging table into a document-management
//! platform.
//!
//! A staging table holds one row per document: where the file lives, which
//! file cabinet it goes to, and the index fields to attach. This library walks
//! the rows that are still pending, uploads each file over an authenticated
//! session, and records the assigned document id so an interrupted run picks
//! up where it stopped.
//!
//! - **Staging store** with PostgreSQL and in-memory backends
//! - **Session handling** with a single relogin per record on expiry
//! - **Per-record outcomes** (uploaded, duplicate, rejected, failed)
//! - **Rate limiting** through a fixed delay between attempts
//!
//! ## Example
//!
//! ```rust,no_run
//! use cabinet_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> cabinet_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new(), false).await?;
//!     println!("Uploaded {} documents", result.records_uploaded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod remote;
pub mod staging;

// Re-exports for convenient access
pub use config::{Config, RemoteConfig, StagingConfig, UploadConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator, RunStatus};
pub use remote::{
    DocumentUploader, Outcome, RemoteSession, RemoteUploader, SessionManager, SessionState,
};
pub use staging::{
    MemoryStagingStore, PgStagingStore, StagingRecord, StagingStore, StagingSummary,
};
