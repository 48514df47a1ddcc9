//! Serde types for the engine's HTTP surface.

use serde::{Deserialize, Serialize};

/// AppRole login response.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// Issued credential and lease
    pub auth: AuthData,
}

/// Credential block of a login response.
#[derive(Debug, Deserialize)]
pub struct AuthData {
    /// Bearer token for subsequent requests
    pub client_token: String,
    /// Lease duration in seconds
    pub lease_duration: u64,
    /// Whether the token lease can be renewed
    #[serde(default)]
    pub renewable: bool,
}

/// Single-item encrypt response.
#[derive(Debug, Deserialize)]
pub struct EncryptResponse {
    /// Response payload
    pub data: EncryptData,
}

/// Payload of an encrypt response.
#[derive(Debug, Deserialize)]
pub struct EncryptData {
    /// Envelope-formatted ciphertext
    pub ciphertext: String,
    /// Key version the ciphertext was produced under
    #[serde(default)]
    pub key_version: Option<u64>,
}

/// Single-item decrypt response.
#[derive(Debug, Deserialize)]
pub struct DecryptResponse {
    /// Response payload
    pub data: DecryptData,
}

/// Payload of a decrypt response.
#[derive(Debug, Deserialize)]
pub struct DecryptData {
    /// Base64-encoded plaintext
    pub plaintext: String,
}

/// One entry of a `batch_input` request, base64 plaintext form.
#[derive(Debug, Serialize)]
pub struct BatchPlaintext {
    /// Base64-encoded plaintext
    pub plaintext: String,
}

/// One entry of a `batch_input` request, ciphertext form.
#[derive(Debug, Serialize)]
pub struct BatchCiphertext {
    /// Envelope-formatted ciphertext
    pub ciphertext: String,
}

/// Batch encrypt response.
#[derive(Debug, Deserialize)]
pub struct BatchEncryptResponse {
    /// Response payload
    pub data: BatchEncryptData,
}

/// Payload of a batch encrypt response.
#[derive(Debug, Deserialize)]
pub struct BatchEncryptData {
    /// Per-item results in input order
    pub batch_results: Vec<BatchEncryptItem>,
}

/// One result of a batch encrypt, either ciphertext or an item error.
#[derive(Debug, Deserialize)]
pub struct BatchEncryptItem {
    /// Envelope-formatted ciphertext when the item succeeded
    #[serde(default)]
    pub ciphertext: Option<String>,
    /// Key version when the item succeeded
    #[serde(default)]
    pub key_version: Option<u64>,
    /// Engine-reported reason when the item failed
    #[serde(default)]
    pub error: Option<String>,
}

/// Batch decrypt response.
#[derive(Debug, Deserialize)]
pub struct BatchDecryptResponse {
    /// Response payload
    pub data: BatchDecryptData,
}

/// Payload of a batch decrypt response.
#[derive(Debug, Deserialize)]
pub struct BatchDecryptData {
    /// Per-item results in input order
    pub batch_results: Vec<BatchDecryptItem>,
}

/// One result of a batch decrypt, either plaintext or an item error.
#[derive(Debug, Deserialize)]
pub struct BatchDecryptItem {
    /// Base64-encoded plaintext when the item succeeded
    #[serde(default)]
    pub plaintext: Option<String>,
    /// Engine-reported reason when the item failed
    #[serde(default)]
    pub error: Option<String>,
}

/// Key metadata response (`GET /{mount}/keys/{key}`).
#[derive(Debug, Deserialize)]
pub struct KeyInfoResponse {
    /// Response payload
    pub data: KeyInfo,
}

/// Metadata for a named transit key.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyInfo {
    /// Key name
    pub name: String,
    /// Newest key version; envelopes below this are stale
    pub latest_version: u64,
    /// Oldest version the engine will still decrypt
    #[serde(default)]
    pub min_decryption_version: u64,
}

/// `GET /sys/health` body.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    /// Whether the engine storage is initialized
    #[serde(default)]
    pub initialized: bool,
    /// Whether the engine is sealed
    #[serde(default)]
    pub sealed: bool,
    /// Engine build version
    #[serde(default)]
    pub version: Option<String>,
}

/// Best-effort engine reachability status. Never an error.
#[derive(Debug, Clone, Default)]
pub struct EngineHealth {
    /// Reachable, initialized, and unsealed
    pub ok: bool,
    /// Seal status when the engine answered
    pub sealed: Option<bool>,
    /// Engine build version when the engine answered
    pub version: Option<String>,
    /// Transport or decode failure, when unreachable
    pub error: Option<String>,
}
