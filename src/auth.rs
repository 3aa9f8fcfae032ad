//! Resolve the OAuth2 access token used against the monitoring API.
//!
//! An explicitly given token wins. Otherwise Application Default Credentials are used: a service
//! account key named by `GOOGLE_APPLICATION_CREDENTIALS`, the gcloud user credentials, or the
//! metadata server on Compute Engine, GKE and Cloud Run.

use std::fmt;
use std::time::Duration;

use gcp_auth::TokenProvider;
use tokio::runtime::Builder;
use tracing::debug;

/// Read-only access to Cloud Monitoring.
pub const MONITORING_READ_SCOPE: &str = "https://www.googleapis.com/auth/monitoring.read";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("could not start token runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("no application default credentials: {0}")]
    Credentials(#[from] gcp_auth::Error),
    #[error("timed out after {0:?} waiting for an access token")]
    Timeout(Duration),
    #[error("credentials provider returned an empty access token")]
    EmptyToken,
}

/// A bearer token. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: &str) -> Self {
        AccessToken(token.trim().to_owned())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Use `explicit` when given, Application Default Credentials otherwise.
pub fn resolve(explicit: Option<&str>, timeout: Duration) -> Result<AccessToken, AuthError> {
    match explicit.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => {
            debug!("using access token from command line or environment");
            Ok(AccessToken::new(token))
        }
        None => application_default(timeout),
    }
}

/// Asks the first available ADC provider for a token with [MONITORING_READ_SCOPE].
///
/// The providers are async, so they run on a current thread runtime that is dropped again before
/// the blocking monitoring client is used.
pub fn application_default(timeout: Duration) -> Result<AccessToken, AuthError> {
    let runtime = Builder::new_current_thread().enable_all().build()?;

    let token = runtime.block_on(async {
        let lookup = async {
            let provider = gcp_auth::provider().await?;
            debug!("using application default credentials");
            provider.token(&[MONITORING_READ_SCOPE]).await
        };
        tokio::time::timeout(timeout, lookup)
            .await
            .map_err(|_| AuthError::Timeout(timeout))?
            .map_err(AuthError::from)
    })?;

    non_empty(token.as_str())
}

fn non_empty(token: &str) -> Result<AccessToken, AuthError> {
    let token = AccessToken::new(token);
    if token.secret().is_empty() {
        return Err(AuthError::EmptyToken);
    }
    Ok(token)
}
