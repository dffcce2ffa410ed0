// ── Session manager ──
//
// Owns the account credentials and keeps the shared client logged in.
// Startup login retries with exponential backoff; re-login after a
// session-expiry signal is a single attempt.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tracing::{debug, info, warn};
use velis_api::{Credentials, VelisClient};

use crate::error::CoreError;

/// Retry schedule for the startup login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginRetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for LoginRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl LoginRetryPolicy {
    /// Wait after the `attempt`-th failure (1-based): doubles each time,
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1_u32 << exponent)
            .min(self.max_backoff)
    }
}

pub struct SessionManager {
    client: Arc<VelisClient>,
    credentials: Credentials,
    policy: LoginRetryPolicy,
}

impl SessionManager {
    pub fn new(client: Arc<VelisClient>, credentials: Credentials, policy: LoginRetryPolicy) -> Self {
        Self {
            client,
            credentials,
            policy,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_authenticated()
    }

    /// Single login attempt. The new token is installed on the shared
    /// client and returned.
    pub async fn login(&self) -> Result<SecretString, CoreError> {
        let token = self.client.login(&self.credentials).await?;
        info!(user = %self.credentials.username, "logged in");
        Ok(token)
    }

    /// Log in, retrying per the policy. Returns the last error once
    /// attempts are exhausted.
    pub async fn login_with_retry(&self) -> Result<SecretString, CoreError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.login().await {
                Ok(token) => return Ok(token),
                Err(e) if attempt >= attempts => {
                    warn!(error = %e, attempt, "login failed, giving up");
                    return Err(e);
                }
                Err(e) => {
                    let wait = self.policy.backoff(attempt);
                    warn!(error = %e, attempt, "login failed, retrying in {wait:?}");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Re-authenticate after the server rejected the token.
    pub async fn relogin(&self) -> Result<SecretString, CoreError> {
        debug!("session expired, logging in again");
        self.login().await
    }
}
