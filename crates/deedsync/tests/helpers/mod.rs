//! Test helpers for deedsync integration tests
//!
//! This module provides:
//! - In-memory record and object stores that log every call in order
//! - Builders for on-disk source trees

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use deedsync::ingest::{DocumentRecord, Party, RecordStore, StoreSession};
use deedsync::storage::ObjectStore;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A store call, in the order the store saw it
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    AbstractLookup(String),
    InsertDocument(Option<String>),
    FindDocument(String),
    InsertParties(i64, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredParty {
    pub document_id: i64,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Default)]
struct Tables {
    documents: Vec<(i64, DocumentRecord)>,
    parties: Vec<StoredParty>,
    calls: Vec<StoreCall>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: Mutex<Tables>,
    abstracts: HashSet<String>,
    /// Document inserts with these PRSERVs fail
    rejected: HashSet<String>,
    /// Lookups of these PRSERVs return an error instead of a miss
    broken_lookups: HashSet<String>,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicUsize,
}

/// Record store backed by vectors
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MemoryRecordStoreBuilder {
        MemoryRecordStoreBuilder::default()
    }

    pub fn documents(&self) -> Vec<(i64, DocumentRecord)> {
        self.inner.tables.lock().unwrap().documents.clone()
    }

    pub fn parties(&self) -> Vec<StoredParty> {
        self.inner.tables.lock().unwrap().parties.clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.tables.lock().unwrap().calls.clone()
    }

    pub fn document_by_prserv(&self, prserv: &str) -> Option<(i64, DocumentRecord)> {
        self.documents()
            .into_iter()
            .find(|(_, doc)| doc.prserv.as_deref() == Some(prserv))
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.inner.sessions_opened.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecordStoreBuilder {
    inner: Inner,
}

impl MemoryRecordStoreBuilder {
    pub fn abstract_code(mut self, code: &str) -> Self {
        self.inner.abstracts.insert(code.to_string());
        self
    }

    pub fn reject_document(mut self, prserv: &str) -> Self {
        self.inner.rejected.insert(prserv.to_string());
        self
    }

    pub fn break_lookup(mut self, prserv: &str) -> Self {
        self.inner.broken_lookups.insert(prserv.to_string());
        self
    }

    pub fn build(self) -> MemoryRecordStore {
        MemoryRecordStore {
            inner: Arc::new(self.inner),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    type Session = MemorySession;

    async fn session(&self) -> Result<MemorySession> {
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.inner.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            inner: Arc::clone(&self.inner),
        })
    }
}

pub struct MemorySession {
    inner: Arc<Inner>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn abstract_exists(&mut self, code: &str) -> Result<bool> {
        let mut tables = self.inner.tables.lock().unwrap();
        tables.calls.push(StoreCall::AbstractLookup(code.to_string()));
        Ok(self.inner.abstracts.contains(code))
    }

    async fn insert_document(&mut self, document: &DocumentRecord) -> Result<i64> {
        let mut tables = self.inner.tables.lock().unwrap();
        tables.calls.push(StoreCall::InsertDocument(document.prserv.clone()));

        if let Some(prserv) = &document.prserv {
            if self.inner.rejected.contains(prserv) {
                return Err(anyhow!("duplicate key value violates unique constraint"));
            }
        }

        let id = tables.documents.len() as i64 + 1;
        tables.documents.push((id, document.clone()));
        Ok(id)
    }

    async fn find_document_id(&mut self, prserv: &str) -> Result<Option<i64>> {
        let mut tables = self.inner.tables.lock().unwrap();
        tables.calls.push(StoreCall::FindDocument(prserv.to_string()));

        if self.inner.broken_lookups.contains(prserv) {
            return Err(anyhow!("connection reset by peer"));
        }

        Ok(tables
            .documents
            .iter()
            .find(|(_, doc)| doc.prserv.as_deref() == Some(prserv))
            .map(|(id, _)| *id))
    }

    async fn insert_parties(&mut self, document_id: i64, parties: &[Party]) -> Result<()> {
        let mut tables = self.inner.tables.lock().unwrap();
        tables.calls.push(StoreCall::InsertParties(document_id, parties.len()));
        for party in parties {
            tables.parties.push(StoredParty {
                document_id,
                name: party.name.clone(),
                role: party.role.to_string(),
            });
        }
        Ok(())
    }
}

/// Object store backed by a map of key to bytes
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing_keys: HashSet<String>,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts to `key` return an error
    pub fn failing_on(keys: &[&str]) -> Self {
        Self {
            failing_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.contains(key) {
            return Err(anyhow!("Access Denied"));
        }
        let body = tokio::fs::read(path).await?;
        let previous = self.objects.lock().unwrap().insert(key.to_string(), body);
        assert!(previous.is_none(), "object {key} written twice");
        Ok(())
    }
}

/// Write `contents` to `root/rel`, creating parent directories
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Join rows into an extract: records end with `{EOR}` and a newline
pub fn extract(rows: &[&str]) -> String {
    rows.iter().map(|row| format!("{row}{{EOR}}\n")).collect()
}

/// Create `root/<folder>/BLU/` with both extracts
pub fn source_folder(root: &Path, folder: &str, prime: &[&str], multi: &[&str]) {
    write_file(root, &format!("{folder}/BLU/WASTP_prime.txt"), &extract(prime));
    write_file(root, &format!("{folder}/BLU/WASTP_multi.txt"), &extract(multi));
}
