//! Rewrap orchestrator tests with an in-memory store and a stub engine.

use async_trait::async_trait;
use pii_transit_client::{
    AuthMethod, EncryptedRepository, FieldCodec, Record, RecordStore, RewrapOrchestrator,
    ScanPage, StoreError, TransitCipherClient, TransitConfig,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory record store keyed by `_id`, counting persisted writes.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<BTreeMap<String, Record>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    async fn insert(&self, record: Record) {
        let id = record
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.records.lock().await.insert(id, record);
    }

    fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    async fn get(&self, id: &str) -> Option<Record> {
        self.records.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_one(&self, filter: &Value) -> Result<Option<Record>, StoreError> {
        let id = filter
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::new("filter must carry an _id"))?;
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn scan(&self, cursor: Option<&str>, limit: usize) -> Result<ScanPage, StoreError> {
        let records = self.records.lock().await;
        let page: Vec<Record> = records
            .iter()
            .filter(|(id, _)| cursor.is_none_or(|c| id.as_str() > c))
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect();
        let cursor = page
            .last()
            .and_then(|record| record.get("_id"))
            .and_then(Value::as_str)
            .filter(|last| records.keys().any(|id| id.as_str() > *last))
            .map(String::from);
        Ok(ScanPage {
            records: page,
            cursor,
        })
    }

    async fn save(&self, record: Record) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.insert(record).await;
        Ok(())
    }
}

fn client(addr: &str) -> Arc<TransitCipherClient> {
    let config = TransitConfig::new(addr, "pii", AuthMethod::Token(SecretString::from("s.test")));
    Arc::new(TransitCipherClient::new(config).unwrap())
}

fn record(id: &str, email: &str) -> Record {
    let mut record = Record::new();
    record.insert("_id".to_string(), json!(id));
    record.insert("email".to_string(), json!(email));
    record
}

async fn mount_key_info(server: &MockServer, latest_version: u64) {
    Mock::given(method("GET"))
        .and(path("/v1/transit/keys/pii"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "name": "pii",
                "latest_version": latest_version,
                "min_decryption_version": 1
            }
        })))
        .mount(server)
        .await;
}

async fn mount_rewrap(server: &MockServer, from: &str, to: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/transit/rewrap/pii"))
        .and(body_json(json!({ "ciphertext": from })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "ciphertext": to, "key_version": 2 }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sweep_rewraps_only_stale_envelopes() {
    let server = MockServer::start().await;
    mount_key_info(&server, 2).await;
    mount_rewrap(&server, "vault:v1:AAA", "vault:v2:AAA").await;

    let store = Arc::new(MemoryStore::default());
    store.insert(record("r1", "vault:v1:AAA")).await;
    store.insert(record("r2", "plain@b.com")).await;
    store.insert(record("r3", "vault:v2:CCC")).await;

    let orchestrator = RewrapOrchestrator::new(
        client(&server.uri()),
        Arc::clone(&store) as Arc<dyn RecordStore>,
        ["email"],
    )
    .with_batch_size(2);

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.records_scanned, 3);
    assert_eq!(report.records_changed, 1);
    assert_eq!(report.values_rewrapped, 1);
    assert!(report.failures.is_empty());
    assert_eq!(store.save_count(), 1);

    let r1 = store.get("r1").await.unwrap();
    assert_eq!(r1.get("email"), Some(&json!("vault:v2:AAA")));
    // Plaintext and current-version records are untouched.
    let r2 = store.get("r2").await.unwrap();
    assert_eq!(r2.get("email"), Some(&json!("plain@b.com")));
    let r3 = store.get("r3").await.unwrap();
    assert_eq!(r3.get("email"), Some(&json!("vault:v2:CCC")));
}

#[tokio::test]
async fn second_sweep_without_rotation_writes_nothing() {
    let server = MockServer::start().await;
    mount_key_info(&server, 2).await;
    mount_rewrap(&server, "vault:v1:AAA", "vault:v2:AAA").await;

    let store = Arc::new(MemoryStore::default());
    store.insert(record("r1", "vault:v1:AAA")).await;

    let orchestrator = RewrapOrchestrator::new(
        client(&server.uri()),
        Arc::clone(&store) as Arc<dyn RecordStore>,
        ["email"],
    );

    let first = orchestrator.run().await.unwrap();
    assert_eq!(first.records_changed, 1);
    assert_eq!(store.save_count(), 1);

    let second = orchestrator.run().await.unwrap();
    assert_eq!(second.records_scanned, 1);
    assert_eq!(second.records_changed, 0);
    assert_eq!(second.values_rewrapped, 0);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn one_bad_record_is_skipped_not_fatal() {
    let server = MockServer::start().await;
    mount_key_info(&server, 2).await;
    mount_rewrap(&server, "vault:v1:GOOD", "vault:v2:GOOD").await;
    Mock::given(method("POST"))
        .and(path("/v1/transit/rewrap/pii"))
        .and(body_json(json!({ "ciphertext": "vault:v1:BAD" })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "errors": ["invalid ciphertext"] })),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    store.insert(record("r1", "vault:v1:BAD")).await;
    store.insert(record("r2", "vault:v1:GOOD")).await;

    let orchestrator = RewrapOrchestrator::new(
        client(&server.uri()),
        Arc::clone(&store) as Arc<dyn RecordStore>,
        ["email"],
    );

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.records_scanned, 2);
    assert_eq!(report.records_changed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].record_id, "r1");
    assert!(report.failures[0].reason.contains("invalid ciphertext"));

    // The healthy record still landed.
    let r2 = store.get("r2").await.unwrap();
    assert_eq!(r2.get("email"), Some(&json!("vault:v2:GOOD")));
    let r1 = store.get("r1").await.unwrap();
    assert_eq!(r1.get("email"), Some(&json!("vault:v1:BAD")));
}

#[tokio::test]
async fn disabled_client_sweep_is_a_no_op() {
    let config = TransitConfig::new("http://127.0.0.1:8200", "pii", AuthMethod::Disabled);
    let client = Arc::new(TransitCipherClient::new(config).unwrap());
    let store = Arc::new(MemoryStore::default());
    store.insert(record("r1", "vault:v1:AAA")).await;

    let orchestrator =
        RewrapOrchestrator::new(client, Arc::clone(&store) as Arc<dyn RecordStore>, ["email"]);

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.records_scanned, 0);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn repository_encrypts_on_save_and_decrypts_on_find() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/transit/encrypt/pii"))
        .and(body_json(json!({
            "batch_input": [{ "plaintext": "YWxpY2VAZXhhbXBsZS5jb20=" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "batch_results": [
                { "ciphertext": "vault:v1:ALICE", "key_version": 1 }
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/transit/decrypt/pii"))
        .and(body_json(json!({
            "batch_input": [{ "ciphertext": "vault:v1:ALICE" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "batch_results": [{ "plaintext": "YWxpY2VAZXhhbXBsZS5jb20=" }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let store = MemoryStore::default();
    let repo = EncryptedRepository::new(store, FieldCodec::new(client), ["email"]);

    repo.save(record("u1", "alice@example.com")).await.unwrap();

    // Nothing in the store holds plaintext PII.
    let at_rest = repo.store().get("u1").await.unwrap();
    assert_eq!(at_rest.get("email"), Some(&json!("vault:v1:ALICE")));

    let found = repo.find_one(&json!({ "_id": "u1" })).await.unwrap().unwrap();
    assert_eq!(found.get("email"), Some(&json!("alice@example.com")));
}
