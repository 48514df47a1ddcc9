//! Authenticated session against the engine.
//!
//! Owns the current bearer token and its expiry, renewing via AppRole login
//! when needed. Concurrent callers may both observe an expired token and both
//! renew; that race is tolerated (renewal is idempotent engine-side, last
//! write wins) rather than serialized.

use crate::{
    config::AuthMethod,
    error::{TransitError, TransitResult},
    wire::AuthResponse,
};
use secrecy::{ExposeSecret, SecretString};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Session holding the current engine credential.
pub struct AuthSession {
    auth: AuthMethod,
    addr: String,
    token_margin: Duration,
    http: reqwest::Client,
    token: RwLock<Option<SecretString>>,
    expiry: RwLock<Option<Instant>>,
}

impl AuthSession {
    /// Create a session; no round trip happens until the first operation.
    #[must_use]
    pub fn new(
        auth: AuthMethod,
        addr: impl Into<String>,
        token_margin: Duration,
        http: reqwest::Client,
    ) -> Self {
        Self {
            auth,
            addr: addr.into(),
            token_margin,
            http,
            token: RwLock::new(None),
            expiry: RwLock::new(None),
        }
    }

    /// Whether crypto operations should pass values through unchanged.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.auth.is_disabled()
    }

    /// Return a non-expired bearer token, renewing first if necessary.
    ///
    /// `Ok(None)` means the session is unconfigured and the caller must
    /// degrade to passthrough. A static token is defined as never expiring.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::AuthenticationFailed`] when renewal fails; the
    /// prior session state is left untouched so the next call retries.
    pub async fn ensure_valid(&self) -> TransitResult<Option<SecretString>> {
        match &self.auth {
            AuthMethod::Disabled => Ok(None),
            AuthMethod::Token(token) => Ok(Some(token.clone())),
            AuthMethod::AppRole { role_id, secret_id } => {
                let needs_login = {
                    let token = self.token.read().await;
                    let expiry = self.expiry.read().await;
                    match (&*token, &*expiry) {
                        (Some(_), Some(exp)) => Instant::now() >= *exp,
                        _ => true,
                    }
                };

                if needs_login {
                    self.login(role_id, secret_id).await?;
                }

                self.token
                    .read()
                    .await
                    .clone()
                    .map(Some)
                    .ok_or_else(|| TransitError::auth_failed("no token after login"))
            }
        }
    }

    /// Exchange AppRole credentials for a bearer token.
    #[instrument(skip_all, fields(role_id = %role_id))]
    async fn login(&self, role_id: &str, secret_id: &SecretString) -> TransitResult<()> {
        let url = format!("{}/v1/auth/approle/login", self.addr);
        let body = serde_json::json!({
            "role_id": role_id,
            "secret_id": secret_id.expose_secret(),
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransitError::auth_failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TransitError::auth_failed(format!("Status {status}: {text}")));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| TransitError::auth_failed(e.to_string()))?;

        let lease = Duration::from_secs(auth.auth.lease_duration);
        // Expiry already carries the safety margin so a request never races
        // the real lease mid-flight.
        let expiry = Instant::now() + lease.saturating_sub(self.token_margin);

        *self.token.write().await = Some(SecretString::from(auth.auth.client_token));
        *self.expiry.write().await = Some(expiry);

        info!(
            lease_secs = lease.as_secs(),
            renewable = auth.auth.renewable,
            "Authenticated with transit engine"
        );
        Ok(())
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("addr", &self.addr)
            .field("auth", &self.auth)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
