//! In-memory fakes for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::ArtifactRecord;
use crate::repository::{ArtifactStore, StoreError};
use crate::scrapers::{FetchError, PayloadFetcher};
use crate::storage::{validate_identity, ContentError, ContentStore};

/// Payload fetcher serving fixed responses keyed by URL. Unknown URLs are 404.
#[derive(Default)]
pub struct StaticFetcher {
    responses: Mutex<HashMap<String, Result<Vec<u8>, u16>>>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.set_page(url, body);
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.set_status(url, status);
        self
    }

    pub fn set_page(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.into()));
    }

    pub fn set_status(&self, url: &str, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(status));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PayloadFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Artifact store held in memory, with switchable failures.
pub struct MemoryArtifactStore {
    target: String,
    records: Mutex<BTreeMap<String, ArtifactRecord>>,
    fail_ping: AtomicBool,
    fail_list: AtomicBool,
    fail_upsert: Mutex<HashSet<String>>,
    fail_delete: Mutex<HashSet<String>>,
}

impl MemoryArtifactStore {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            records: Mutex::new(BTreeMap::new()),
            fail_ping: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_upsert: Mutex::new(HashSet::new()),
            fail_delete: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.fail_ping.store(unreachable, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upsert_for(&self, identity: &str) {
        self.fail_upsert
            .lock()
            .unwrap()
            .insert(identity.to_string());
    }

    pub fn fail_delete_for(&self, identity: &str) {
        self.fail_delete
            .lock()
            .unwrap()
            .insert(identity.to_string());
    }

    pub fn snapshot(&self) -> BTreeMap<String, ArtifactRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn insert(&self, record: ArtifactRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.identity.clone(), record);
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    fn crawl_target(&self) -> &str {
        &self.target
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(StoreError::target_wide("store unreachable"));
        }
        Ok(())
    }

    async fn get(&self, identity: &str) -> Result<Option<ArtifactRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(identity).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ArtifactRecord>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::target_wide("list failed"));
        }
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn upsert(&self, record: &ArtifactRecord) -> Result<(), StoreError> {
        if self.fail_upsert.lock().unwrap().contains(&record.identity) {
            return Err(StoreError::new(record.identity.as_str(), "upsert failed"));
        }

        let mut records = self.records.lock().unwrap();
        let mut next = record.clone();
        next.crawl_target = self.target.clone();
        if let Some(existing) = records.get(&record.identity) {
            next.first_seen_at = existing.first_seen_at;
        }
        records.insert(record.identity.clone(), next);
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<(), StoreError> {
        if self.fail_delete.lock().unwrap().contains(identity) {
            return Err(StoreError::new(identity, "delete failed"));
        }
        self.records.lock().unwrap().remove(identity);
        Ok(())
    }
}

/// Content store held in memory, with switchable failures and a write counter.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_prepare: AtomicBool,
    fail_write: Mutex<HashSet<String>>,
    writes: AtomicUsize,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unusable(&self, unusable: bool) {
        self.fail_prepare.store(unusable, Ordering::SeqCst);
    }

    pub fn fail_write_for(&self, identity: &str) {
        self.fail_write
            .lock()
            .unwrap()
            .insert(identity.to_string());
    }

    pub fn blob(&self, identity: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(identity).cloned()
    }

    pub fn put(&self, identity: &str, bytes: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(identity.to_string(), bytes.to_vec());
    }

    pub fn remove(&self, identity: &str) {
        self.blobs.lock().unwrap().remove(identity);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn io_error(identity: &str, message: &str) -> ContentError {
    ContentError::Io {
        identity: identity.to_string(),
        source: std::io::Error::other(message.to_string()),
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn prepare(&self) -> Result<(), ContentError> {
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(io_error("", "root not writable"));
        }
        Ok(())
    }

    async fn write(&self, identity: &str, bytes: &[u8]) -> Result<(), ContentError> {
        validate_identity(identity)?;
        if self.fail_write.lock().unwrap().contains(identity) {
            return Err(io_error(identity, "disk full"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.put(identity, bytes);
        Ok(())
    }

    async fn read(&self, identity: &str) -> Result<Option<Vec<u8>>, ContentError> {
        validate_identity(identity)?;
        Ok(self.blob(identity))
    }

    async fn delete(&self, identity: &str) -> Result<(), ContentError> {
        validate_identity(identity)?;
        self.remove(identity);
        Ok(())
    }

    async fn exists(&self, identity: &str) -> Result<bool, ContentError> {
        validate_identity(identity)?;
        Ok(self.blobs.lock().unwrap().contains_key(identity))
    }

    async fn list(&self) -> Result<Vec<String>, ContentError> {
        Ok(self.blobs.lock().unwrap().keys().cloned().collect())
    }
}
