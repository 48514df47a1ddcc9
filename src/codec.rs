//! Field-level encryption over schema-free records.
//!
//! Bridges records to the cipher client: distinct field values are collected,
//! pushed through one batch call, and scattered back onto the same field
//! names. Batching is per record rather than across records so a failed batch
//! only takes down one record's operation.

use crate::{client::TransitCipherClient, envelope, error::TransitResult, store::Record};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Applies encrypt/decrypt to named fields of records.
#[derive(Debug, Clone)]
pub struct FieldCodec {
    client: Arc<TransitCipherClient>,
}

impl FieldCodec {
    /// Create a codec over an existing client.
    #[must_use]
    pub fn new(client: Arc<TransitCipherClient>) -> Self {
        Self { client }
    }

    /// Encrypt the named fields of a record in place.
    ///
    /// Fields that are absent, null, non-string, empty, or already enveloped
    /// are left untouched, which makes the call idempotent: applying it twice
    /// is the same as applying it once.
    #[instrument(skip_all, fields(fields = fields.len()))]
    pub async fn encrypt_fields(&self, record: &mut Record, fields: &[&str]) -> TransitResult<()> {
        let targets = collect_fields(record, fields, |value| !envelope::is_ciphertext(value));
        self.apply(record, targets, |client, values| async move {
            client.encrypt_batch(&values).await
        })
        .await
    }

    /// Decrypt the named fields of a record in place.
    ///
    /// Every non-empty string field is collected; the client short-circuits
    /// non-envelope values locally, so records written before encryption was
    /// enabled come back unchanged.
    #[instrument(skip_all, fields(fields = fields.len()))]
    pub async fn decrypt_fields(&self, record: &mut Record, fields: &[&str]) -> TransitResult<()> {
        let targets = collect_fields(record, fields, |_| true);
        self.apply(record, targets, |client, values| async move {
            client.decrypt_batch(&values).await
        })
        .await
    }

    /// Decrypt the named fields of every record.
    ///
    /// Records are independent of each other: one batch round trip per
    /// record, no cross-record ordering.
    pub async fn decrypt_many(&self, records: &mut [Record], fields: &[&str]) -> TransitResult<()> {
        for record in records {
            self.decrypt_fields(record, fields).await?;
        }
        Ok(())
    }

    async fn apply<F, Fut>(
        &self,
        record: &mut Record,
        targets: Vec<(String, String)>,
        op: F,
    ) -> TransitResult<()>
    where
        F: FnOnce(Arc<TransitCipherClient>, Vec<String>) -> Fut,
        Fut: std::future::Future<Output = TransitResult<Vec<String>>>,
    {
        if targets.is_empty() {
            return Ok(());
        }
        let (names, values): (Vec<String>, Vec<String>) = targets.into_iter().unzip();
        let results = op(Arc::clone(&self.client), values).await?;
        for (name, result) in names.into_iter().zip(results) {
            record.insert(name, Value::String(result));
        }
        Ok(())
    }
}

/// Collect `(field name, value)` pairs for non-empty string fields passing
/// the predicate.
fn collect_fields(
    record: &Record,
    fields: &[&str],
    eligible: impl Fn(&str) -> bool,
) -> Vec<(String, String)> {
    let mut targets = Vec::new();
    for &field in fields {
        if let Some(Value::String(value)) = record.get(field) {
            if !value.is_empty() && eligible(value) {
                targets.push((field.to_string(), value.clone()));
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut record = Record::new();
        for (key, value) in pairs {
            record.insert((*key).to_string(), value.clone());
        }
        record
    }

    #[test]
    fn test_collect_skips_ineligible_shapes() {
        let record = record(&[
            ("email", json!("a@b.com")),
            ("phone", json!("")),
            ("age", json!(41)),
            ("note", Value::Null),
        ]);
        let targets = collect_fields(&record, &["email", "phone", "age", "note", "missing"], |_| {
            true
        });
        assert_eq!(targets, vec![("email".to_string(), "a@b.com".to_string())]);
    }

    #[test]
    fn test_collect_encrypt_predicate_skips_envelopes() {
        let record = record(&[
            ("email", json!("vault:v1:AAAA")),
            ("name", json!("Ada")),
        ]);
        let targets = collect_fields(&record, &["email", "name"], |v| !envelope::is_ciphertext(v));
        assert_eq!(targets, vec![("name".to_string(), "Ada".to_string())]);
    }

    #[tokio::test]
    async fn test_passthrough_codec_leaves_record_intact() {
        use crate::config::{AuthMethod, TransitConfig};

        let config = TransitConfig::new("http://127.0.0.1:8200", "pii", AuthMethod::Disabled);
        let client = Arc::new(TransitCipherClient::new(config).unwrap());
        let codec = FieldCodec::new(client);

        let mut r = record(&[("email", json!("a@b.com"))]);
        codec.encrypt_fields(&mut r, &["email"]).await.unwrap();
        assert_eq!(r.get("email"), Some(&json!("a@b.com")));

        codec.decrypt_fields(&mut r, &["email"]).await.unwrap();
        assert_eq!(r.get("email"), Some(&json!("a@b.com")));
    }
}
