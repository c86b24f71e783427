//! Authenticated session and security-token lifecycle.
//!
//! A [`SessionManager`] owns one [`WikiApi`] value (and with it the cookie jar
//! of the session), the login state and the per-kind token cache. Everything
//! else in the crate borrows it read-only.
//!
//! `connect` is serialised: the first caller performs the handshake while
//! concurrent callers wait for its result. Tokens are cached per kind in their
//! own cell, so fetching an `edit` token never blocks on another kind.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use crate::contract::{Credentials, LoginResponse, WikiApi};
use crate::error::AuthError;

/// Observable login state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    /// No credentials configured; requests go out without a login.
    Anonymous,
    Authenticated,
    Failed(AuthError),
}

pub struct SessionManager<A> {
    api: A,
    credentials: Option<Credentials>,
    status: Mutex<SessionStatus>,
    tokens: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl<A: WikiApi> SessionManager<A> {
    pub fn new(api: A, credentials: Credentials) -> Self {
        Self::with_credentials(api, Some(credentials))
    }

    /// A session that never logs in, for read-only use.
    pub fn anonymous(api: A) -> Self {
        Self::with_credentials(api, None)
    }

    fn with_credentials(api: A, credentials: Option<Credentials>) -> Self {
        Self {
            api,
            credentials,
            status: Mutex::new(SessionStatus::Unauthenticated),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Transport used by the session, for collaborators issuing authorised requests.
    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn status(&self) -> SessionStatus {
        self.status.lock().await.clone()
    }

    /// Makes sure the session is logged in. Idempotent; a rejected login is
    /// remembered and returned again without further network calls.
    pub async fn connect(&self) -> Result<(), AuthError> {
        let mut status = self.status.lock().await;
        match &*status {
            SessionStatus::Authenticated | SessionStatus::Anonymous => return Ok(()),
            SessionStatus::Failed(e) => return Err(e.clone()),
            SessionStatus::Unauthenticated => {}
        }

        let Some(credentials) = &self.credentials else {
            debug!("[SESSION] No credentials configured, using an anonymous session");
            *status = SessionStatus::Anonymous;
            return Ok(());
        };

        info!(user = %credentials.username, "[SESSION] Logging in");
        match self.handshake(credentials).await {
            Ok(()) => {
                info!(user = %credentials.username, "[SESSION] Login succeeded");
                *status = SessionStatus::Authenticated;
                Ok(())
            }
            Err(e) => {
                error!(user = %credentials.username, error = %e, "[SESSION][ERROR] Login failed");
                *status = SessionStatus::Failed(e.clone());
                Err(e)
            }
        }
    }

    async fn handshake(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let first = self.api.login(credentials, None).await?;
        if first.is_success() {
            return Ok(());
        }

        let Some(login_token) = first.token.clone().filter(|t| !t.is_empty()) else {
            return Err(AuthError::LoginRejected(describe(&first)));
        };
        debug!(result = %first.result, "[SESSION] Login needs a continuation token, resubmitting");

        let second = self.api.login(credentials, Some(login_token)).await?;
        if second.is_success() {
            Ok(())
        } else {
            Err(AuthError::LoginRejected(describe(&second)))
        }
    }

    /// Returns the token of the given kind, fetching it once per process.
    pub async fn token(&self, kind: &str) -> Result<String, AuthError> {
        self.connect().await?;

        let cell = {
            let mut tokens = self.tokens.lock().await;
            Arc::clone(tokens.entry(kind.to_string()).or_default())
        };

        let token = cell.get_or_try_init(|| self.fetch_token(kind)).await?;
        Ok(token.clone())
    }

    async fn fetch_token(&self, kind: &str) -> Result<String, AuthError> {
        debug!(kind, "[SESSION] Fetching token");
        match self.api.fetch_token(kind).await? {
            Some(token) if !token.is_empty() => Ok(token),
            _ => {
                warn!(kind, "[SESSION] Remote did not supply the requested token");
                Err(AuthError::TokenUnavailable(kind.to_string()))
            }
        }
    }
}

fn describe(response: &LoginResponse) -> String {
    match &response.reason {
        Some(reason) if !reason.is_empty() => format!("{} ({reason})", response.result),
        _ => response.result.clone(),
    }
}
