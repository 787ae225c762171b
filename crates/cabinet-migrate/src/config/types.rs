//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote document service configuration.
    pub remote: RemoteConfig,

    /// Staging store configuration (PostgreSQL).
    pub staging: StagingConfig,

    /// Upload loop behavior.
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Remote document service configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Platform base URL, e.g. `https://dms.example.com/DocuWare/Platform`.
    pub base_url: String,

    /// Login name.
    pub username: String,

    /// Password.
    pub password: String,

    /// Organization the account belongs to.
    pub organization: String,

    /// Index field that carries the staging `object_id` (default: "OBJECT_ID").
    #[serde(default = "default_object_id_field")]
    pub object_id_field: String,

    /// Timeout for logon, probe and logoff requests (default: 30).
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,

    /// Timeout for document uploads (default: 600).
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

impl RemoteConfig {
    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("organization", &self.organization)
            .field("object_id_field", &self.object_id_field)
            .field("login_timeout_secs", &self.login_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .finish()
    }
}

/// Staging store (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema holding the staging table (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// Staging table name (default: "staging_documents").
    #[serde(default = "default_staging_table")]
    pub table: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,

    /// Maximum pooled connections (default: 2).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl fmt::Debug for StagingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Upload loop behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UploadConfig {
    /// Fixed pause before every upload attempt, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
}

impl UploadConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// Default value functions for serde
fn default_object_id_field() -> String {
    "OBJECT_ID".to_string()
}

fn default_login_timeout() -> u64 {
    30
}

fn default_upload_timeout() -> u64 {
    600
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_staging_table() -> String {
    "staging_documents".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_max_connections() -> usize {
    2
}
