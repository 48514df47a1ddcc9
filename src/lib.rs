//! HashiCorp Vault Transit client for field-level PII encryption.
//!
//! Keeps application data stores free of plaintext PII: named record fields
//! are encrypted through an external transit engine, decrypted on read, and
//! migrated onto new key versions after rotation via a rewrap sweep. Values
//! are tagged with the `vault:v{N}:` envelope marker; anything without the
//! marker is treated as legacy plaintext and passed through, so mixed
//! datasets survive a zero-downtime migration. With no credentials configured
//! the client degrades loudly to passthrough instead of taking the host
//! application down.

pub mod breaker;
pub mod client;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod repo;
pub mod rewrap;
pub mod session;
pub mod store;
pub mod wire;

pub use client::TransitCipherClient;
pub use codec::FieldCodec;
pub use config::{AuthMethod, TransitConfig};
pub use error::{TransitError, TransitResult};
pub use repo::EncryptedRepository;
pub use rewrap::{RewrapFailure, RewrapOrchestrator, RewrapReport};
pub use session::AuthSession;
pub use store::{Record, RecordStore, ScanPage, StoreError};
pub use wire::{EngineHealth, KeyInfo};
