//! Record store collaborator contract.
//!
//! The core never talks to a database directly; the host application supplies
//! an implementation of [`RecordStore`]. Three capabilities are required:
//! point lookup, a cursor-driven full-table scan, and per-record save.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// An externally-owned document with no fixed schema.
///
/// PII field names are supplied by the caller per invocation; each named field
/// independently holds either plaintext or a ciphertext envelope.
pub type Record = serde_json::Map<String, Value>;

/// One page of a cursor-driven scan.
#[derive(Debug, Default)]
pub struct ScanPage {
    /// Records in this page
    pub records: Vec<Record>,
    /// Opaque cursor for the next page; `None` means the scan is exhausted
    pub cursor: Option<String>,
}

/// Failure reported by a record store implementation.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct StoreError(String);

impl StoreError {
    /// Create a store error from any message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Store capabilities the core depends on.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a single record matching the filter document.
    async fn find_one(&self, filter: &Value) -> Result<Option<Record>, StoreError>;

    /// Fetch the next page of at most `limit` records. Pass the cursor from
    /// the previous page, or `None` to start from the beginning.
    async fn scan(&self, cursor: Option<&str>, limit: usize) -> Result<ScanPage, StoreError>;

    /// Persist one record, replacing any stored version of it.
    async fn save(&self, record: Record) -> Result<(), StoreError>;
}

/// Best-effort identity of a record for reporting, taken from `_id` or `id`.
#[must_use]
pub fn record_id(record: &Record) -> String {
    for key in ["_id", "id"] {
        match record.get(key) {
            Some(Value::String(s)) => return s.clone(),
            Some(v) if !v.is_null() => return v.to_string(),
            _ => {}
        }
    }
    "<unknown>".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_prefers_underscore_id() {
        let mut record = Record::new();
        record.insert("_id".to_string(), json!("abc-123"));
        record.insert("id".to_string(), json!("other"));
        assert_eq!(record_id(&record), "abc-123");
    }

    #[test]
    fn test_record_id_numeric() {
        let mut record = Record::new();
        record.insert("id".to_string(), json!(42));
        assert_eq!(record_id(&record), "42");
    }

    #[test]
    fn test_record_id_missing() {
        assert_eq!(record_id(&Record::new()), "<unknown>");
    }
}
