//! Chunk workers for the header and detail phases

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::decode::{decode_document, decode_party, ColumnMap};
use super::source::RawRecord;
use super::store::{RecordStore, StoreSession};
use crate::engine::{ChunkWorker, Outcome, WorkItem};

/// Writes header records as `document` rows
pub struct HeaderLoader<S> {
    store: Arc<S>,
    columns: Arc<ColumnMap>,
}

impl<S: RecordStore> HeaderLoader<S> {
    pub fn new(store: Arc<S>, columns: Arc<ColumnMap>) -> Self {
        Self { store, columns }
    }
}

#[async_trait]
impl<S: RecordStore> ChunkWorker<RawRecord> for HeaderLoader<S> {
    type Handle = S::Session;

    async fn acquire(&self) -> Result<S::Session> {
        self.store.session().await
    }

    async fn process(&self, session: &mut S::Session, record: &RawRecord) -> Result<Outcome> {
        let mut document = decode_document(record, &self.columns);
        if !document.degraded.is_empty() {
            debug!(
                record = %record.identity(),
                columns = ?document.degraded,
                "Malformed values stored as null"
            );
        }

        // Unknown or blank codes are dropped, never the record.
        let code = document
            .abstract_code
            .take()
            .filter(|code| !code.trim().is_empty());
        if let Some(code) = code {
            if session.abstract_exists(&code).await? {
                document.abstract_code = Some(code);
            } else {
                debug!(record = %record.identity(), code = %code, "Unknown abstract code dropped");
            }
        }

        match session.insert_document(&document).await {
            Ok(_) => Ok(Outcome::Committed),
            Err(err) => Ok(Outcome::failed(format!(
                "insert failed for PRSERV={}: {err:#}",
                document.prserv.as_deref().unwrap_or_default()
            ))),
        }
    }
}

/// Writes detail records as `party` rows under their document
pub struct DetailLoader<S> {
    store: Arc<S>,
    columns: Arc<ColumnMap>,
}

impl<S: RecordStore> DetailLoader<S> {
    pub fn new(store: Arc<S>, columns: Arc<ColumnMap>) -> Self {
        Self { store, columns }
    }
}

#[async_trait]
impl<S: RecordStore> ChunkWorker<RawRecord> for DetailLoader<S> {
    type Handle = S::Session;

    async fn acquire(&self) -> Result<S::Session> {
        self.store.session().await
    }

    async fn process(&self, session: &mut S::Session, record: &RawRecord) -> Result<Outcome> {
        let party = decode_party(record, &self.columns);

        let Some(prserv) = party.prserv.as_deref() else {
            return Ok(Outcome::skipped("parent not found: PRSERV is blank"));
        };

        // A failed lookup is not a miss; let it abort the chunk.
        let Some(document_id) = session.find_document_id(prserv).await? else {
            return Ok(Outcome::skipped(format!("parent not found: PRSERV={prserv}")));
        };

        let parties = party.parties();
        if parties.is_empty() {
            debug!(record = %record.identity(), prserv, "No party names, nothing to write");
            return Ok(Outcome::Committed);
        }

        match session.insert_parties(document_id, &parties).await {
            Ok(()) => Ok(Outcome::Committed),
            Err(err) => Ok(Outcome::failed(format!(
                "party insert failed for PRSERV={prserv}: {err:#}"
            ))),
        }
    }
}
