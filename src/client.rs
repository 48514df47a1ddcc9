//! Transit engine HTTP client with circuit breaker and logging integration.

use crate::{
    breaker::CircuitBreaker,
    config::TransitConfig,
    envelope,
    error::{TransitError, TransitResult},
    session::AuthSession,
    wire::{
        BatchCiphertext, BatchDecryptResponse, BatchEncryptResponse, BatchPlaintext,
        DecryptResponse, EncryptResponse, EngineHealth, HealthResponse, KeyInfo, KeyInfoResponse,
    },
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

/// Client for the engine's encrypt/decrypt/rewrap surface.
///
/// All plaintext stays out of log output; values are only ever logged as
/// counts. When the session is unconfigured every operation passes values
/// through unchanged so the host application degrades to plaintext instead of
/// failing.
#[derive(Debug)]
pub struct TransitCipherClient {
    config: TransitConfig,
    http: Client,
    session: AuthSession,
    breaker: CircuitBreaker,
}

impl TransitCipherClient {
    /// Create a new transit client.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::Http`] when the HTTP client cannot be built.
    pub fn new(config: TransitConfig) -> TransitResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(TransitError::Http)?;

        if config.auth.is_disabled() {
            warn!(
                "Transit encryption is DISABLED; PII fields will be stored in plaintext. \
                 Configure a token or AppRole credentials to enable it."
            );
        }

        let session = AuthSession::new(
            config.auth.clone(),
            config.addr.clone(),
            config.token_margin,
            http.clone(),
        );
        let breaker = CircuitBreaker::new(config.breaker_threshold, config.breaker_cooldown);

        Ok(Self {
            config,
            http,
            session,
            breaker,
        })
    }

    /// Whether the client is in passthrough mode.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.session.is_disabled()
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &TransitConfig {
        &self.config
    }

    /// Encrypt one plaintext value, returning an envelope string.
    #[instrument(skip_all)]
    pub async fn encrypt(&self, plaintext: &str) -> TransitResult<String> {
        if self.is_disabled() {
            return Ok(plaintext.to_string());
        }

        let body = serde_json::json!({ "plaintext": BASE64.encode(plaintext) });
        let response: EncryptResponse = self
            .request(reqwest::Method::POST, &self.key_path("encrypt"), Some(body))
            .await?;

        debug!(key_version = ?response.data.key_version, "Encrypted value");
        Ok(response.data.ciphertext)
    }

    /// Decrypt one value.
    ///
    /// Input without the ciphertext marker is returned unchanged with no
    /// network call; that leniency is what keeps pre-encryption rows readable
    /// during a migration window.
    #[instrument(skip_all)]
    pub async fn decrypt(&self, value: &str) -> TransitResult<String> {
        if !envelope::is_ciphertext(value) || self.is_disabled() {
            return Ok(value.to_string());
        }

        let body = serde_json::json!({ "ciphertext": value });
        let response: DecryptResponse = self
            .request(reqwest::Method::POST, &self.key_path("decrypt"), Some(body))
            .await?;

        decode_plaintext(&response.data.plaintext)
    }

    /// Encrypt many values in one engine round trip, preserving input order.
    ///
    /// An empty input performs zero network calls.
    #[instrument(skip_all, fields(count = values.len()))]
    pub async fn encrypt_batch(&self, values: &[String]) -> TransitResult<Vec<String>> {
        if values.is_empty() || self.is_disabled() {
            return Ok(values.to_vec());
        }

        let batch_input: Vec<BatchPlaintext> = values
            .iter()
            .map(|v| BatchPlaintext {
                plaintext: BASE64.encode(v),
            })
            .collect();
        let body = serde_json::json!({ "batch_input": batch_input });

        let response: BatchEncryptResponse = self
            .request(reqwest::Method::POST, &self.key_path("encrypt"), Some(body))
            .await?;
        let results = response.data.batch_results;

        if results.len() != values.len() {
            return Err(TransitError::cipher(format!(
                "batch result count mismatch: sent {}, got {}",
                values.len(),
                results.len()
            )));
        }

        let mut out = Vec::with_capacity(values.len());
        for (index, item) in results.into_iter().enumerate() {
            if let Some(reason) = item.error {
                return Err(TransitError::BatchItem { index, reason });
            }
            let ciphertext = item.ciphertext.ok_or_else(|| TransitError::BatchItem {
                index,
                reason: "no ciphertext in batch result".to_string(),
            })?;
            out.push(ciphertext);
        }
        Ok(out)
    }

    /// Decrypt many values in one engine round trip, preserving input order.
    ///
    /// Entries without the ciphertext marker are short-circuited locally and
    /// never sent to the engine; a batch with no envelope entries performs
    /// zero network calls. Per-item engine failures are attributed to the
    /// position in the caller's input.
    #[instrument(skip_all, fields(count = values.len()))]
    pub async fn decrypt_batch(&self, values: &[String]) -> TransitResult<Vec<String>> {
        if self.is_disabled() {
            return Ok(values.to_vec());
        }

        let mut out: Vec<Option<String>> = Vec::with_capacity(values.len());
        let mut pending: Vec<usize> = Vec::new();
        for (index, value) in values.iter().enumerate() {
            if envelope::is_ciphertext(value) {
                out.push(None);
                pending.push(index);
            } else {
                out.push(Some(value.clone()));
            }
        }

        if pending.is_empty() {
            return Ok(values.to_vec());
        }
        debug!(
            enveloped = pending.len(),
            passthrough = values.len() - pending.len(),
            "Decrypting batch"
        );

        let batch_input: Vec<BatchCiphertext> = pending
            .iter()
            .map(|&i| BatchCiphertext {
                ciphertext: values[i].clone(),
            })
            .collect();
        let body = serde_json::json!({ "batch_input": batch_input });

        let response: BatchDecryptResponse = self
            .request(reqwest::Method::POST, &self.key_path("decrypt"), Some(body))
            .await?;
        let results = response.data.batch_results;

        if results.len() != pending.len() {
            return Err(TransitError::cipher(format!(
                "batch result count mismatch: sent {}, got {}",
                pending.len(),
                results.len()
            )));
        }

        for (item, &index) in results.into_iter().zip(&pending) {
            if let Some(reason) = item.error {
                return Err(TransitError::BatchItem { index, reason });
            }
            let encoded = item.plaintext.ok_or_else(|| TransitError::BatchItem {
                index,
                reason: "no plaintext in batch result".to_string(),
            })?;
            out[index] = Some(decode_plaintext(&encoded)?);
        }

        out.into_iter()
            .enumerate()
            .map(|(index, value)| {
                value.ok_or_else(|| {
                    TransitError::cipher(format!("missing batch result for item {index}"))
                })
            })
            .collect()
    }

    /// Re-encrypt existing ciphertext under the newest key version.
    ///
    /// Ciphertext in, ciphertext out; plaintext never reaches the caller.
    #[instrument(skip_all)]
    pub async fn rewrap(&self, ciphertext: &str) -> TransitResult<String> {
        if self.is_disabled() {
            return Ok(ciphertext.to_string());
        }

        let body = serde_json::json!({ "ciphertext": ciphertext });
        let response: EncryptResponse = self
            .request(reqwest::Method::POST, &self.key_path("rewrap"), Some(body))
            .await?;

        debug!(key_version = ?response.data.key_version, "Rewrapped value");
        Ok(response.data.ciphertext)
    }

    /// Fetch metadata for the configured key, including its newest version.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::InvalidConfig`] when the session is
    /// unconfigured, since there is no engine to ask.
    pub async fn key_info(&self) -> TransitResult<KeyInfo> {
        if self.is_disabled() {
            return Err(TransitError::InvalidConfig(
                "transit encryption is disabled".to_string(),
            ));
        }

        let path = format!("{}/keys/{}", self.config.mount, self.config.key_name);
        let response: KeyInfoResponse =
            self.request(reqwest::Method::GET, &path, None).await?;
        Ok(response.data)
    }

    /// Best-effort reachability probe. Never returns an error.
    ///
    /// The engine answers `/sys/health` with a JSON body on 200 (unsealed),
    /// 429 (standby), 501 (uninitialized), and 503 (sealed) alike.
    pub async fn health_check(&self) -> EngineHealth {
        let url = format!("{}/v1/sys/health", self.config.addr);
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                return EngineHealth {
                    error: Some(e.to_string()),
                    ..EngineHealth::default()
                }
            }
        };

        match response.json::<HealthResponse>().await {
            Ok(health) => EngineHealth {
                ok: health.initialized && !health.sealed,
                sealed: Some(health.sealed),
                version: health.version,
                error: None,
            },
            Err(e) => EngineHealth {
                error: Some(e.to_string()),
                ..EngineHealth::default()
            },
        }
    }

    fn key_path(&self, operation: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.mount, operation, self.config.key_name
        )
    }

    /// Breaker-gated request; retryable failures feed the breaker.
    async fn request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> TransitResult<T> {
        if !self.breaker.allow_request().await {
            warn!(path, "Circuit breaker open for transit engine");
            return Err(TransitError::CircuitOpen);
        }

        let result = self.do_request(method, path, body).await;

        match &result {
            Ok(_) => self.breaker.record_success().await,
            Err(e) if e.is_retryable() => self.breaker.record_failure().await,
            Err(_) => {}
        }

        result
    }

    async fn do_request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> TransitResult<T> {
        let token = self
            .session
            .ensure_valid()
            .await?
            .ok_or_else(|| TransitError::auth_failed("no credential configured"))?;
        let url = format!("{}/v1/{}", self.config.addr, path);

        let mut request = self
            .http
            .request(method, &url)
            .header("X-Vault-Token", token.expose_secret());

        if let Some(b) = body {
            request = request.json(&b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransitError::unavailable(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            403 => return Err(TransitError::PermissionDenied(path.to_string())),
            404 => {
                return Err(TransitError::InvalidConfig(format!(
                    "unknown engine path: {path}"
                )))
            }
            429 => return Err(TransitError::RateLimited),
            s if s >= 500 => {
                let text = response.text().await.unwrap_or_default();
                return Err(TransitError::unavailable(format!("Status {status}: {text}")));
            }
            _ if !status.is_success() => {
                // Transit answers 400 with an errors array for rejected
                // payloads; that is an operation failure, not an outage.
                let text = response.text().await.unwrap_or_default();
                return Err(TransitError::cipher(format!("Status {status}: {text}")));
            }
            _ => {}
        }

        response.json().await.map_err(TransitError::from)
    }
}

/// Decode the engine's base64 plaintext back into a string.
fn decode_plaintext(encoded: &str) -> TransitResult<String> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| TransitError::cipher(format!("invalid base64 plaintext: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| TransitError::cipher(format!("plaintext is not valid UTF-8: {e}")))
}
