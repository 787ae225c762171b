//! Cookie-based session against the document service.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::SessionManager;
use crate::config::RemoteConfig;
use crate::error::Result;

/// Lifecycle of the process-wide session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Authenticated,
    /// A request came back 401; a relogin is needed.
    Expired,
    Terminated,
}

/// The one live session with the document service.
///
/// Owns the HTTP client and its cookie jar. Logging in again replaces the
/// session cookie in place, so clones of the client handed to the uploader
/// pick it up without coordination.
pub struct RemoteSession {
    client: Client,
    base: String,
    username: String,
    password: String,
    organization: String,
    login_timeout: Duration,
    state: Mutex<SessionState>,
}

impl RemoteSession {
    /// Build a session for `config`. No request is sent until [`login`].
    ///
    /// [`login`]: SessionManager::login
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(concat!("cabinet-migrate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base: config.base().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            organization: config.organization.clone(),
            login_timeout: config.login_timeout(),
            state: Mutex::new(SessionState::Uninitialized),
        })
    }

    /// HTTP client carrying the session cookie.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Base URL without trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Flag the session as expired after an authorization failure.
    pub fn mark_expired(&self) {
        if self.state() == SessionState::Authenticated {
            debug!("Session marked expired");
            self.set_state(SessionState::Expired);
        }
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    async fn logon(&self) -> std::result::Result<(), String> {
        let url = format!("{}/Account/Logon", self.base);
        let form = [
            ("UserName", self.username.as_str()),
            ("Password", self.password.as_str()),
            ("Organization", self.organization.as_str()),
            ("RememberMe", "false"),
            ("RedirectToMyselfInCaseOfError", "false"),
        ];

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .timeout(self.login_timeout)
            .send()
            .await
            .map_err(|e| format!("logon request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("logon rejected: HTTP {}", response.status()));
        }
        Ok(())
    }

    async fn probe(&self) -> std::result::Result<(), String> {
        let url = format!("{}/FileCabinets", self.base);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(self.login_timeout)
            .send()
            .await
            .map_err(|e| format!("session probe failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("session probe rejected: HTTP {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionManager for RemoteSession {
    async fn login(&self) -> bool {
        debug!("Logging in to {} as {}", self.base, self.username);

        if let Err(e) = self.logon().await {
            warn!("Login failed: {}", e);
            return false;
        }
        if let Err(e) = self.probe().await {
            warn!("Login failed: {}", e);
            return false;
        }

        self.set_state(SessionState::Authenticated);
        info!("Logged in to {} ({})", self.base, self.organization);
        true
    }

    async fn logoff(&self) {
        match self.state() {
            SessionState::Authenticated | SessionState::Expired => {}
            state => {
                debug!("Logoff skipped, session is {:?}", state);
                return;
            }
        }

        let url = format!("{}/Account/Logoff", self.base);
        let result = self
            .client
            .get(&url)
            .timeout(self.login_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => info!("Logged off"),
            Ok(response) => warn!("Logoff returned HTTP {}", response.status()),
            Err(e) => warn!("Logoff request failed: {}", e),
        }

        self.set_state(SessionState::Terminated);
    }
}
