//! SQLite-backed repository for documents and chunks
//!
//! Every read and write takes a tenant id, which makes it structurally
//! impossible to issue a query that forgets the tenant filter. Chunk rows
//! copy their tenant from the owning document row at write time; the value
//! is never taken from caller input.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::retrieval::RetrievedChunk;
use crate::types::{Chunk, ChunkMetadata, Document, DocumentStatus, NewChunk};

/// SQLite chunk and document repository
pub struct ChunkStore {
    conn: Arc<Mutex<Connection>>,
    /// Expected embedding dimension; a mismatch at write time is a fatal
    /// configuration error, not a per-chunk error
    dimensions: usize,
}

impl ChunkStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("failed to open database: {e}")))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        };

        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("failed to open in-memory database: {e}")))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        };

        store.migrate()?;
        Ok(store)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::database(format!("failed to set pragmas: {e}")))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                storage_locator TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                processing_started_at TEXT,
                processing_completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_tenant ON documents(tenant_id);

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                token_count INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_tenant ON chunks(tenant_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_tenant_document ON chunks(tenant_id, document_id);
        "#,
        )
        .map_err(|e| Error::database(format!("failed to run migrations: {e}")))?;

        tracing::debug!("Database migrations complete");
        Ok(())
    }

    // ==================== Document operations ====================

    /// Register a document (normally done by the upload path)
    pub fn insert_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO documents (
                id, tenant_id, storage_locator, status, error_message,
                processing_started_at, processing_completed_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                doc.id.to_string(),
                doc.tenant_id.to_string(),
                doc.storage_locator,
                doc.status.as_str(),
                doc.error_message,
                doc.processing_started_at.map(|t| t.to_rfc3339()),
                doc.processing_completed_at.map(|t| t.to_rfc3339()),
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Fetch a document within a tenant's scope
    pub fn get_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, storage_locator, status, error_message,
                    processing_started_at, processing_completed_at, created_at, updated_at
             FROM documents WHERE id = ?1 AND tenant_id = ?2",
        )?;

        let doc = stmt
            .query_row(
                params![document_id.to_string(), tenant_id.to_string()],
                row_to_document,
            )
            .optional()?;

        Ok(doc)
    }

    /// Transition a document to `processing`, recording the start time and
    /// clearing any previous failure
    pub fn mark_processing(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();

        let changed = conn.execute(
            "UPDATE documents
             SET status = 'processing', error_message = NULL,
                 processing_started_at = ?1, processing_completed_at = NULL, updated_at = ?1
             WHERE id = ?2 AND tenant_id = ?3",
            params![now, document_id.to_string(), tenant_id.to_string()],
        )?;

        if changed == 0 {
            return Err(Error::NotFound(format!(
                "document {document_id} not found for tenant {tenant_id}"
            )));
        }
        Ok(())
    }

    /// Transition a document to `completed`
    pub fn mark_completed(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();

        let changed = conn.execute(
            "UPDATE documents
             SET status = 'completed', processing_completed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND tenant_id = ?3",
            params![now, document_id.to_string(), tenant_id.to_string()],
        )?;

        if changed == 0 {
            return Err(Error::NotFound(format!(
                "document {document_id} not found for tenant {tenant_id}"
            )));
        }
        Ok(())
    }

    /// Transition a document to `failed`, persisting the error message
    pub fn mark_failed(&self, tenant_id: Uuid, document_id: Uuid, message: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();

        let changed = conn.execute(
            "UPDATE documents
             SET status = 'failed', error_message = ?1,
                 processing_completed_at = ?2, updated_at = ?2
             WHERE id = ?3 AND tenant_id = ?4",
            params![message, now, document_id.to_string(), tenant_id.to_string()],
        )?;

        if changed == 0 {
            return Err(Error::NotFound(format!(
                "document {document_id} not found for tenant {tenant_id}"
            )));
        }
        Ok(())
    }

    // ==================== Chunk operations ====================

    /// Persist one batch of chunks in a single transaction
    ///
    /// This is the durable checkpoint of the embedding batcher: once this
    /// returns, the batch survives a crash of the process. The tenant id on
    /// every row is copied from the owning document inside the transaction.
    pub fn insert_chunk_batch(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        chunks: &[NewChunk],
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(Error::config(format!(
                    "embedding dimension mismatch: got {}, chunk store expects {}",
                    chunk.embedding.len(),
                    self.dimensions
                )));
            }
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        // Owning document's tenant is the source of truth for chunk rows.
        let owner_tenant: String = tx
            .query_row(
                "SELECT tenant_id FROM documents WHERE id = ?1",
                params![document_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("document {document_id} not found")))?;

        if owner_tenant != tenant_id.to_string() {
            return Err(Error::validation(format!(
                "document {document_id} does not belong to tenant {tenant_id}"
            )));
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunks (
                    id, document_id, tenant_id, chunk_index, content,
                    token_count, embedding, metadata, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;

            let now = Utc::now().to_rfc3339();
            for chunk in chunks {
                stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    document_id.to_string(),
                    owner_tenant,
                    chunk.chunk_index,
                    chunk.content,
                    chunk.token_count,
                    embedding_to_blob(&chunk.embedding),
                    serde_json::to_string(&chunk.metadata)?,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete all chunks for a document; returns the number removed
    pub fn delete_chunks(&self, tenant_id: Uuid, document_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock();

        let deleted = conn.execute(
            "DELETE FROM chunks WHERE tenant_id = ?1 AND document_id = ?2",
            params![tenant_id.to_string(), document_id.to_string()],
        )?;

        Ok(deleted)
    }

    /// Count chunks for a document
    pub fn count_chunks(&self, tenant_id: Uuid, document_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE tenant_id = ?1 AND document_id = ?2",
            params![tenant_id.to_string(), document_id.to_string()],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// All chunks of a document in re-assembly order
    pub fn chunks_for_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, document_id, tenant_id, chunk_index, content,
                    token_count, embedding, metadata, created_at
             FROM chunks WHERE tenant_id = ?1 AND document_id = ?2
             ORDER BY chunk_index ASC",
        )?;

        let rows = stmt.query_map(
            params![tenant_id.to_string(), document_id.to_string()],
            row_to_raw_chunk,
        )?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(raw_to_chunk(row?)?);
        }
        Ok(chunks)
    }

    /// Ranked nearest-neighbor search over one tenant's chunks
    ///
    /// The tenant filter (and the optional document filter) are bind
    /// parameters of the one query that feeds ranking; rows of other tenants
    /// never leave the store. Results are cosine-similarity descending,
    /// limited to `top_k`.
    pub fn search_similar(
        &self,
        tenant_id: Uuid,
        document_ids: Option<&[Uuid]>,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if query_embedding.len() != self.dimensions {
            return Err(Error::config(format!(
                "query embedding dimension mismatch: got {}, chunk store expects {}",
                query_embedding.len(),
                self.dimensions
            )));
        }

        // An explicitly empty document scope matches nothing.
        if document_ids.is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();

        let base = "SELECT id, document_id, tenant_id, chunk_index, content,
                           token_count, embedding, metadata, created_at
                    FROM chunks WHERE tenant_id = ?1";

        let mut bind_values: Vec<String> = vec![tenant_id.to_string()];

        let sql = match document_ids {
            Some(ids) if !ids.is_empty() => {
                let placeholders: Vec<String> = (0..ids.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect();
                bind_values.extend(ids.iter().map(|id| id.to_string()));
                format!("{base} AND document_id IN ({})", placeholders.join(", "))
            }
            _ => base.to_string(),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind_values.iter()), row_to_raw_chunk)?;

        let mut scored = Vec::new();
        for row in rows {
            let chunk = raw_to_chunk(row?)?;
            if chunk.embedding.len() != query_embedding.len() {
                return Err(Error::config(format!(
                    "stored embedding dimension mismatch for chunk {}: got {}, expected {}",
                    chunk.id,
                    chunk.embedding.len(),
                    query_embedding.len()
                )));
            }
            let similarity = cosine_similarity(query_embedding, &chunk.embedding);
            scored.push(RetrievedChunk { chunk, similarity });
        }

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);

        Ok(scored)
    }

    /// Expected embedding dimension
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Intermediate row representation, decoded outside the rusqlite closure
struct RawChunk {
    id: String,
    document_id: String,
    tenant_id: String,
    chunk_index: u32,
    content: String,
    token_count: u32,
    embedding: Vec<u8>,
    metadata: String,
    created_at: String,
}

fn row_to_raw_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawChunk> {
    Ok(RawChunk {
        id: row.get(0)?,
        document_id: row.get(1)?,
        tenant_id: row.get(2)?,
        chunk_index: row.get(3)?,
        content: row.get(4)?,
        token_count: row.get(5)?,
        embedding: row.get(6)?,
        metadata: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn raw_to_chunk(raw: RawChunk) -> Result<Chunk> {
    let metadata: ChunkMetadata = serde_json::from_str(&raw.metadata)?;
    Ok(Chunk {
        id: parse_uuid(&raw.id)?,
        document_id: parse_uuid(&raw.document_id)?,
        tenant_id: parse_uuid(&raw.tenant_id)?,
        chunk_index: raw.chunk_index,
        content: raw.content,
        token_count: raw.token_count,
        embedding: blob_to_embedding(&raw.embedding)?,
        metadata,
        created_at: parse_timestamp(&raw.created_at)?,
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let tenant_id: String = row.get(1)?;
    let status: String = row.get(3)?;
    let started: Option<String> = row.get(5)?;
    let completed: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Document {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        tenant_id: Uuid::parse_str(&tenant_id).unwrap_or_default(),
        storage_locator: row.get(2)?,
        status: DocumentStatus::parse(&status).unwrap_or(DocumentStatus::Uploaded),
        error_message: row.get(4)?,
        processing_started_at: started.as_deref().and_then(parse_timestamp_opt),
        processing_completed_at: completed.as_deref().and_then(parse_timestamp_opt),
        created_at: parse_timestamp_opt(&created_at).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp_opt(&updated_at).unwrap_or_else(Utc::now),
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::database(format!("invalid uuid in store: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::database(format!("invalid timestamp in store: {e}")))
}

fn parse_timestamp_opt(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

/// Encode an embedding as little-endian f32 bytes
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode little-endian f32 bytes back into an embedding
fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::database(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity of two equal-length vectors; 0.0 when either is zero
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
