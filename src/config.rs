//! Transit client configuration.

use secrecy::SecretString;
use std::time::Duration;

/// How the client authenticates to the engine.
///
/// At most one mode is active per session. `Disabled` is an explicit degraded
/// mode: every crypto operation passes values through unchanged so the host
/// application keeps running with plaintext instead of going down.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Static token, defined as never expiring (administrative use).
    Token(SecretString),
    /// AppRole credentials exchanged for a short-lived token on demand.
    AppRole {
        /// Role identifier
        role_id: String,
        /// Role secret
        secret_id: SecretString,
    },
    /// No credentials configured; crypto operations are passthrough.
    Disabled,
}

impl AuthMethod {
    /// Resolve the auth method from the standard Vault environment variables.
    ///
    /// A static token wins over AppRole credentials when both are present.
    #[must_use]
    pub fn from_env() -> Self {
        if let Ok(token) = std::env::var("VAULT_TOKEN") {
            if !token.is_empty() {
                return Self::Token(SecretString::from(token));
            }
        }
        match (std::env::var("VAULT_ROLE_ID"), std::env::var("VAULT_SECRET_ID")) {
            (Ok(role_id), Ok(secret_id)) if !role_id.is_empty() && !secret_id.is_empty() => {
                Self::AppRole {
                    role_id,
                    secret_id: SecretString::from(secret_id),
                }
            }
            _ => Self::Disabled,
        }
    }

    /// Whether encryption is disabled for this session.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

/// Transit client configuration.
#[derive(Debug, Clone)]
pub struct TransitConfig {
    /// Engine address
    pub addr: String,
    /// Transit engine mount path
    pub mount: String,
    /// Named encryption key within the mount
    pub key_name: String,
    /// Authentication mode
    pub auth: AuthMethod,
    /// Request timeout
    pub timeout: Duration,
    /// Margin subtracted from the token lease so renewal never races expiry
    pub token_margin: Duration,
    /// Records fetched per rewrap scan page
    pub rewrap_batch_size: usize,
    /// Concurrent records rewrapped within one page
    pub rewrap_concurrency: usize,
    /// Consecutive retryable failures before the breaker opens
    pub breaker_threshold: u32,
    /// Cooldown before the breaker lets a probe request through
    pub breaker_cooldown: Duration,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            addr: std::env::var("VAULT_ADDR")
                .unwrap_or_else(|_| "http://127.0.0.1:8200".to_string()),
            mount: "transit".to_string(),
            key_name: std::env::var("VAULT_TRANSIT_KEY").unwrap_or_else(|_| "pii".to_string()),
            auth: AuthMethod::from_env(),
            timeout: Duration::from_secs(30),
            token_margin: Duration::from_secs(300),
            rewrap_batch_size: 100,
            rewrap_concurrency: 8,
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

impl TransitConfig {
    /// Create a configuration for the given engine address and key.
    #[must_use]
    pub fn new(addr: impl Into<String>, key_name: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            addr: addr.into(),
            key_name: key_name.into(),
            auth,
            ..Default::default()
        }
    }

    /// Set the transit mount path.
    #[must_use]
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the token renewal margin.
    #[must_use]
    pub const fn with_token_margin(mut self, margin: Duration) -> Self {
        self.token_margin = margin;
        self
    }

    /// Set the rewrap scan page size (clamped to 1-1000).
    #[must_use]
    pub fn with_rewrap_batch_size(mut self, size: usize) -> Self {
        self.rewrap_batch_size = size.clamp(1, 1000);
        self
    }

    /// Set the rewrap concurrency width (clamped to 1-64).
    #[must_use]
    pub fn with_rewrap_concurrency(mut self, width: usize) -> Self {
        self.rewrap_concurrency = width.clamp(1, 64);
        self
    }

    /// Set the circuit breaker failure threshold.
    #[must_use]
    pub const fn with_breaker_threshold(mut self, threshold: u32) -> Self {
        self.breaker_threshold = threshold;
        self
    }

    /// Set the circuit breaker cooldown.
    #[must_use]
    pub const fn with_breaker_cooldown(mut self, cooldown: Duration) -> Self {
        self.breaker_cooldown = cooldown;
        self
    }
}
