//! PostgreSQL record store
//!
//! Tables follow `schema/land_records.sql`: `abstract`, `document` and
//! `party`. Every chunk worker holds its own pooled connection for the life
//! of its chunk.

use anyhow::{Context, Result};
use async_trait::async_trait;
use deedsync_common::DeedsyncError;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::ingest::{DocumentRecord, Party, RecordStore, StoreSession};

/// Pool size that lets `required` workers each hold a connection at once
pub fn pool_size(configured: u32, required: u32) -> u32 {
    configured.max(required).max(1)
}

/// Open the connection pool, sized for `required` concurrent workers.
pub async fn connect(config: &DatabaseConfig, required: u32) -> deedsync_common::Result<PgPool> {
    let max_connections = pool_size(config.max_connections, required);
    if max_connections > config.max_connections {
        warn!(
            configured = config.max_connections,
            required, "Raising database pool size so every worker gets a connection"
        );
    }

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DeedsyncError::Database(format!("Failed to connect: {e}")))?;

    info!(max_connections, "Database connection pool created");

    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    type Session = PgSession;

    async fn session(&self) -> Result<PgSession> {
        let conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire database connection")?;
        Ok(PgSession { conn })
    }
}

/// One pooled connection, returned to the pool on drop
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl StoreSession for PgSession {
    async fn abstract_exists(&mut self, code: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM abstract WHERE abstract_code = $1 LIMIT 1",
        )
        .bind(code)
        .fetch_optional(&mut *self.conn)
        .await
        .context("Failed to look up abstract code")?;

        Ok(found.is_some())
    }

    async fn insert_document(&mut self, document: &DocumentRecord) -> Result<i64> {
        // single statement, committed on return in autocommit mode
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO document (
                prserv, book, page, clerk_number, instrument_type, acres,
                abstract_code, sub_block, legal_description, file_stamp_date,
                filing_date, remarks, finalized_by, gf_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING document_id
            "#,
        )
        .bind(&document.prserv)
        .bind(&document.book)
        .bind(&document.page)
        .bind(&document.clerk_number)
        .bind(&document.instrument_type)
        .bind(document.acres)
        .bind(&document.abstract_code)
        .bind(&document.sub_block)
        .bind(&document.legal_description)
        .bind(document.file_stamp_date)
        .bind(document.filing_date)
        .bind(&document.remarks)
        .bind(&document.finalized_by)
        .bind(document.gf_number)
        .fetch_one(&mut *self.conn)
        .await
        .context("Failed to insert document")?;

        Ok(id)
    }

    async fn find_document_id(&mut self, prserv: &str) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT document_id FROM document WHERE prserv = $1 ORDER BY document_id LIMIT 1",
        )
        .bind(prserv)
        .fetch_optional(&mut *self.conn)
        .await
        .context("Failed to look up document by PRSERV")
    }

    async fn insert_parties(&mut self, document_id: i64, parties: &[Party]) -> Result<()> {
        let mut tx = self
            .conn
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for party in parties {
            sqlx::query("INSERT INTO party (document_id, name, role) VALUES ($1, $2, $3)")
                .bind(document_id)
                .bind(&party.name)
                .bind(party.role.as_str())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert {} '{}'", party.role, party.name))?;
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }
}
