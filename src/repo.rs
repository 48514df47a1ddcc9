//! Encrypting repository over a record store.
//!
//! The single interception point where PII crosses the storage boundary:
//! fields are encrypted immediately before a write and decrypted immediately
//! after a read. Callers that go through this layer can never persist
//! plaintext PII, without any reliance on ORM lifecycle hooks.

use crate::{
    codec::FieldCodec,
    error::TransitResult,
    store::{Record, RecordStore},
};
use serde_json::Value;

/// Record store wrapper that enforces field encryption at the boundary.
#[derive(Debug)]
pub struct EncryptedRepository<S> {
    store: S,
    codec: FieldCodec,
    fields: Vec<String>,
}

impl<S: RecordStore> EncryptedRepository<S> {
    /// Wrap a store, encrypting the given PII fields on every write.
    pub fn new(
        store: S,
        codec: FieldCodec,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            store,
            codec,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Encrypt the configured fields, then persist the record.
    pub async fn save(&self, mut record: Record) -> TransitResult<()> {
        self.codec
            .encrypt_fields(&mut record, &self.field_refs())
            .await?;
        self.store.save(record).await?;
        Ok(())
    }

    /// Fetch a record and decrypt the configured fields.
    pub async fn find_one(&self, filter: &Value) -> TransitResult<Option<Record>> {
        let Some(mut record) = self.store.find_one(filter).await? else {
            return Ok(None);
        };
        self.codec
            .decrypt_fields(&mut record, &self.field_refs())
            .await?;
        Ok(Some(record))
    }

    /// The underlying store, for operations that never touch PII fields.
    pub const fn store(&self) -> &S {
        &self.store
    }

    fn field_refs(&self) -> Vec<&str> {
        self.fields.iter().map(String::as_str).collect()
    }
}
