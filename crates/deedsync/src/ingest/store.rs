//! Destination record store seen by the loaders

use anyhow::Result;
use async_trait::async_trait;

use super::decode::{DocumentRecord, Party};

/// Hands out one session per chunk worker.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    type Session: StoreSession;

    async fn session(&self) -> Result<Self::Session>;
}

/// Statements available to a loader.
///
/// Every write commits before it returns; nothing is held open between
/// records, so a failed record never rolls back the ones before it.
#[async_trait]
pub trait StoreSession: Send + 'static {
    /// Whether `code` is a known abstract code
    async fn abstract_exists(&mut self, code: &str) -> Result<bool>;

    /// Insert one document and commit, returning its generated id
    async fn insert_document(&mut self, document: &DocumentRecord) -> Result<i64>;

    /// Id of the first committed document with this natural key
    async fn find_document_id(&mut self, prserv: &str) -> Result<Option<i64>>;

    /// Insert all parties of one detail record in a single transaction
    async fn insert_parties(&mut self, document_id: i64, parties: &[Party]) -> Result<()>;
}
