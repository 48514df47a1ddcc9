//! Post-rotation rewrap sweep over a record store.
//!
//! After the engine's key is rotated, at-rest ciphertext is still wrapped
//! under older key versions. The orchestrator scans the full store in bounded
//! pages, rewraps every stale envelope to the newest version, and persists
//! only records that actually changed. One bad record never aborts the run;
//! it is reported and skipped, which also makes the sweep resumable: a re-run
//! finds already-rewrapped records unchanged and writes nothing.

use crate::{
    client::TransitCipherClient,
    envelope,
    error::TransitResult,
    store::{record_id, Record, RecordStore},
};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// One record the sweep could not rewrap or persist.
#[derive(Debug, Clone)]
pub struct RewrapFailure {
    /// Identity of the affected record
    pub record_id: String,
    /// What went wrong
    pub reason: String,
}

/// Outcome of a full sweep.
#[derive(Debug, Default)]
pub struct RewrapReport {
    /// Records seen by the scan
    pub records_scanned: u64,
    /// Records rewritten with at least one rewrapped field
    pub records_changed: u64,
    /// Individual field values rewrapped
    pub values_rewrapped: u64,
    /// Records skipped after a rewrap or persistence failure
    pub failures: Vec<RewrapFailure>,
}

enum RecordOutcome {
    Unchanged,
    Rewrapped(u64),
    Failed(RewrapFailure),
}

/// Streams the record store and rewraps stale ciphertext.
pub struct RewrapOrchestrator {
    client: Arc<TransitCipherClient>,
    store: Arc<dyn RecordStore>,
    fields: Arc<Vec<String>>,
    batch_size: usize,
    concurrency: usize,
}

impl RewrapOrchestrator {
    /// Create an orchestrator rewrapping the given PII fields.
    ///
    /// Page size and concurrency width default to the client configuration.
    pub fn new(
        client: Arc<TransitCipherClient>,
        store: Arc<dyn RecordStore>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let batch_size = client.config().rewrap_batch_size.max(1);
        let concurrency = client.config().rewrap_concurrency.max(1);
        Self {
            client,
            store,
            fields: Arc::new(fields.into_iter().map(Into::into).collect()),
            batch_size,
            concurrency,
        }
    }

    /// Override the scan page size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Override the per-page concurrency width.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Run the sweep to completion.
    ///
    /// Holds no lock across the scan; interrupting between pages and
    /// re-running converges on the same end state.
    ///
    /// # Errors
    ///
    /// Fails only on scan errors or when the newest key version cannot be
    /// determined; per-record failures land in the report instead.
    #[instrument(skip_all)]
    pub async fn run(&self) -> TransitResult<RewrapReport> {
        let mut report = RewrapReport::default();

        if self.client.is_disabled() {
            warn!("Transit encryption is disabled; nothing to rewrap");
            return Ok(report);
        }

        let key = self.client.key_info().await?;
        info!(
            key = %key.name,
            latest_version = key.latest_version,
            min_decryption_version = key.min_decryption_version,
            "Starting rewrap sweep"
        );

        let mut cursor: Option<String> = None;
        loop {
            let page = self.store.scan(cursor.as_deref(), self.batch_size).await?;
            report.records_scanned += page.records.len() as u64;
            debug!(page_len = page.records.len(), "Processing scan page");

            let mut tasks: JoinSet<RecordOutcome> = JoinSet::new();
            for record in page.records {
                while tasks.len() >= self.concurrency {
                    if let Some(joined) = tasks.join_next().await {
                        absorb(&mut report, joined);
                    }
                }
                let client = Arc::clone(&self.client);
                let store = Arc::clone(&self.store);
                let fields = Arc::clone(&self.fields);
                let latest = key.latest_version;
                tasks.spawn(async move {
                    process_record(&client, &*store, &fields, record, latest).await
                });
            }
            while let Some(joined) = tasks.join_next().await {
                absorb(&mut report, joined);
            }

            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        info!(
            records_scanned = report.records_scanned,
            records_changed = report.records_changed,
            values_rewrapped = report.values_rewrapped,
            failed = report.failures.len(),
            "Rewrap sweep complete"
        );
        Ok(report)
    }
}

fn absorb(report: &mut RewrapReport, joined: Result<RecordOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(RecordOutcome::Unchanged) => {}
        Ok(RecordOutcome::Rewrapped(values)) => {
            report.records_changed += 1;
            report.values_rewrapped += values;
        }
        Ok(RecordOutcome::Failed(failure)) => report.failures.push(failure),
        Err(join_error) => report.failures.push(RewrapFailure {
            record_id: "<unknown>".to_string(),
            reason: join_error.to_string(),
        }),
    }
}

/// Inspect one record, rewrap its stale envelopes, and persist it if changed.
async fn process_record(
    client: &TransitCipherClient,
    store: &dyn RecordStore,
    fields: &[String],
    mut record: Record,
    latest_version: u64,
) -> RecordOutcome {
    let id = record_id(&record);
    let mut values_rewrapped = 0u64;

    for field in fields {
        let value = match record.get(field.as_str()) {
            Some(Value::String(s)) => s.clone(),
            _ => continue,
        };
        // Plaintext and malformed values are out of scope for the sweep;
        // staleness is decided by the envelope's version tag.
        let stale = matches!(envelope::parse(&value), Some(e) if e.version < latest_version);
        if !stale {
            continue;
        }

        match client.rewrap(&value).await {
            Ok(rewrapped) => {
                record.insert(field.clone(), Value::String(rewrapped));
                values_rewrapped += 1;
            }
            Err(e) => {
                error!(record_id = %id, field = %field, error = %e, "Rewrap failed");
                return RecordOutcome::Failed(RewrapFailure {
                    record_id: id,
                    reason: e.to_string(),
                });
            }
        }
    }

    if values_rewrapped == 0 {
        return RecordOutcome::Unchanged;
    }

    match store.save(record).await {
        Ok(()) => RecordOutcome::Rewrapped(values_rewrapped),
        Err(e) => {
            error!(record_id = %id, error = %e, "Failed to persist rewrapped record");
            RecordOutcome::Failed(RewrapFailure {
                record_id: id,
                reason: e.to_string(),
            })
        }
    }
}
