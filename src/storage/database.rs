//! SQLite persistence for engines, documents, chunks, and conversations
//!
//! Soft deletes set `deleted_at` and keep the row for audit; hard deletes
//! remove the row and cascade to owned entities. References and results are
//! denormalized snapshots and survive both.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    EngineType, HistoryEntry, QueryDocument, QueryDocumentChunk, QueryEngine, QueryReference,
    QueryResult, UserQuery,
};

/// SQLite-backed store for all service entities
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run schema migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::Storage(format!("failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS query_engines (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                engine_type TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                llm_model TEXT,
                embedding_model TEXT NOT NULL,
                vector_store TEXT,
                index_id TEXT,
                doc_url TEXT,
                is_public INTEGER NOT NULL DEFAULT 0,
                created_by TEXT NOT NULL DEFAULT '',
                parent_engine_id TEXT,
                params TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_query_engines_name ON query_engines(name);
            CREATE INDEX IF NOT EXISTS idx_query_engines_parent ON query_engines(parent_engine_id);

            CREATE TABLE IF NOT EXISTS query_documents (
                id TEXT PRIMARY KEY,
                engine_id TEXT NOT NULL,
                doc_url TEXT NOT NULL,
                index_file TEXT,
                index_start INTEGER,
                index_end INTEGER,
                created_at TEXT NOT NULL,
                UNIQUE(engine_id, doc_url)
            );

            CREATE INDEX IF NOT EXISTS idx_query_documents_engine ON query_documents(engine_id);

            CREATE TABLE IF NOT EXISTS query_document_chunks (
                id TEXT PRIMARY KEY,
                engine_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                clean_text TEXT NOT NULL,
                sentences TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                UNIQUE(engine_id, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_engine ON query_document_chunks(engine_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_document ON query_document_chunks(document_id);

            CREATE TABLE IF NOT EXISTS user_queries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT,
                engine_id TEXT NOT NULL,
                prompt TEXT NOT NULL,
                response TEXT,
                history TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_user_queries_user ON user_queries(user_id);

            CREATE TABLE IF NOT EXISTS query_results (
                id TEXT PRIMARY KEY,
                engine_id TEXT NOT NULL,
                engine_name TEXT NOT NULL,
                reference_ids TEXT NOT NULL DEFAULT '[]',
                response TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS query_references (
                id TEXT PRIMARY KEY,
                engine_id TEXT NOT NULL,
                engine_name TEXT NOT NULL,
                document_id TEXT NOT NULL,
                document_url TEXT NOT NULL,
                chunk_id TEXT,
                chunk_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        "#,
        )
        .map_err(|e| Error::Storage(format!("failed to run migrations: {}", e)))?;

        tracing::debug!("database migrations complete");
        Ok(())
    }

    // ==================== Engines ====================

    /// Insert a new engine row
    pub fn create_engine(&self, engine: &QueryEngine) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO query_engines (
                id, name, engine_type, description, llm_model, embedding_model,
                vector_store, index_id, doc_url, is_public, created_by,
                parent_engine_id, params, created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, NULL)
            "#,
            params![
                engine.id.to_string(),
                engine.name,
                engine.engine_type.as_str(),
                engine.description,
                engine.llm_model,
                engine.embedding_model,
                engine.vector_store,
                engine.index_id,
                engine.doc_url,
                engine.is_public as i64,
                engine.created_by,
                engine.parent_engine_id.map(|id| id.to_string()),
                serde_json::to_string(&engine.params)?,
                engine.created_at.to_rfc3339(),
                engine.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch an engine by id, excluding soft-deleted rows
    pub fn find_engine(&self, id: Uuid) -> Result<Option<QueryEngine>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM query_engines WHERE id = ?1 AND deleted_at IS NULL",
            params![id.to_string()],
            row_to_engine,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Fetch an engine by name, excluding soft-deleted rows
    pub fn find_engine_by_name(&self, name: &str) -> Result<Option<QueryEngine>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM query_engines WHERE name = ?1 AND deleted_at IS NULL",
            params![name],
            row_to_engine,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List all live engines, newest first
    pub fn list_engines(&self) -> Result<Vec<QueryEngine>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM query_engines WHERE deleted_at IS NULL ORDER BY created_at DESC",
        )?;
        let engines = stmt
            .query_map([], row_to_engine)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(engines)
    }

    /// Engines that point at this engine as their parent
    pub fn find_child_engines(&self, parent_id: Uuid) -> Result<Vec<QueryEngine>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM query_engines WHERE parent_engine_id = ?1 AND deleted_at IS NULL",
        )?;
        let engines = stmt
            .query_map(params![parent_id.to_string()], row_to_engine)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(engines)
    }

    /// Update an engine's description
    pub fn update_engine_description(&self, id: Uuid, description: &str) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE query_engines SET description = ?1, updated_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
            params![description, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Engine {} not found", id)));
        }
        Ok(())
    }

    /// Record the built index id, making the engine queryable
    pub fn set_engine_index(&self, id: Uuid, index_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE query_engines SET index_id = ?1, updated_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
            params![index_id, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Engine {} not found", id)));
        }
        Ok(())
    }

    /// Soft-delete an engine (retained for audit)
    pub fn soft_delete_engine(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE query_engines SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Engine {} not found", id)));
        }
        Ok(())
    }

    /// Hard-delete an engine, cascading to its documents and chunks.
    /// References and results are denormalized snapshots and are retained.
    pub fn hard_delete_engine(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let engine_id = id.to_string();

        tx.execute(
            "DELETE FROM query_document_chunks WHERE engine_id = ?1",
            params![engine_id],
        )?;
        tx.execute(
            "DELETE FROM query_documents WHERE engine_id = ?1",
            params![engine_id],
        )?;
        tx.execute("DELETE FROM query_engines WHERE id = ?1", params![engine_id])?;

        tx.commit()?;
        Ok(())
    }

    // ==================== Documents & chunks ====================

    /// Persist a completed build's documents and chunks in one transaction
    pub fn persist_build(
        &self,
        documents: &[QueryDocument],
        chunks: &[QueryDocumentChunk],
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for doc in documents {
            tx.execute(
                r#"
                INSERT INTO query_documents (
                    id, engine_id, doc_url, index_file, index_start, index_end, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    doc.id.to_string(),
                    doc.engine_id.to_string(),
                    doc.doc_url,
                    doc.index_file,
                    doc.index_start,
                    doc.index_end,
                    doc.created_at.to_rfc3339(),
                ],
            )?;
        }

        for chunk in chunks {
            tx.execute(
                r#"
                INSERT INTO query_document_chunks (
                    id, engine_id, document_id, chunk_index, text, clean_text,
                    sentences, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    chunk.id.to_string(),
                    chunk.engine_id.to_string(),
                    chunk.document_id.to_string(),
                    chunk.index as i64,
                    chunk.text,
                    chunk.clean_text,
                    serde_json::to_string(&chunk.sentences)?,
                    chunk.created_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Documents belonging to an engine, in ingestion order
    pub fn documents_for_engine(&self, engine_id: Uuid) -> Result<Vec<QueryDocument>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM query_documents WHERE engine_id = ?1 ORDER BY created_at, doc_url",
        )?;
        let documents = stmt
            .query_map(params![engine_id.to_string()], row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(documents)
    }

    /// Fetch a document by id
    pub fn find_document(&self, id: Uuid) -> Result<Option<QueryDocument>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM query_documents WHERE id = ?1",
            params![id.to_string()],
            row_to_document,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Fetch a chunk by its engine-wide index
    pub fn find_chunk_by_index(
        &self,
        engine_id: Uuid,
        index: u32,
    ) -> Result<Option<QueryDocumentChunk>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM query_document_chunks WHERE engine_id = ?1 AND chunk_index = ?2",
            params![engine_id.to_string(), index as i64],
            row_to_chunk,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Number of chunks persisted for an engine
    pub fn chunk_count(&self, engine_id: Uuid) -> Result<u32> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM query_document_chunks WHERE engine_id = ?1",
            params![engine_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    // ==================== User queries ====================

    /// Insert a new conversation
    pub fn create_user_query(&self, query: &UserQuery) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO user_queries (
                id, user_id, title, engine_id, prompt, response, history,
                created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)
            "#,
            params![
                query.id.to_string(),
                query.user_id,
                query.title,
                query.engine_id.to_string(),
                query.prompt,
                query.response,
                serde_json::to_string(&query.history)?,
                query.created_at.to_rfc3339(),
                query.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a conversation by id, excluding soft-deleted rows
    pub fn find_user_query(&self, id: Uuid) -> Result<Option<UserQuery>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM user_queries WHERE id = ?1 AND deleted_at IS NULL",
            params![id.to_string()],
            row_to_user_query,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Conversations for a user, newest first
    pub fn queries_for_user(
        &self,
        user_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<UserQuery>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM user_queries WHERE user_id = ?1 AND deleted_at IS NULL
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
        )?;
        let queries = stmt
            .query_map(
                params![user_id, limit as i64, skip as i64],
                row_to_user_query,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(queries)
    }

    /// Update a conversation's title
    pub fn update_query_title(&self, id: Uuid, title: &str) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE user_queries SET title = ?1, updated_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
            params![title, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Query {} not found", id)));
        }
        Ok(())
    }

    /// Append one human/AI turn pair to a conversation's history.
    ///
    /// Runs read-append-write inside a single transaction so concurrent
    /// in-process continuations serialize instead of losing updates.
    pub fn update_history(
        &self,
        id: Uuid,
        prompt: &str,
        response: &str,
        references: &[QueryReference],
    ) -> Result<UserQuery> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut query = tx
            .query_row(
                "SELECT * FROM user_queries WHERE id = ?1 AND deleted_at IS NULL",
                params![id.to_string()],
                row_to_user_query,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Query {} not found", id)))?;

        query.append_turn(prompt, response, references);

        tx.execute(
            "UPDATE user_queries SET response = ?1, history = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                query.response,
                serde_json::to_string(&query.history)?,
                query.updated_at.to_rfc3339(),
                id.to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(query)
    }

    /// Soft-delete a conversation
    pub fn soft_delete_user_query(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE user_queries SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Query {} not found", id)));
        }
        Ok(())
    }

    /// Hard-delete a conversation
    pub fn hard_delete_user_query(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM user_queries WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    // ==================== Results & references ====================

    /// Persist a query result and its references in one transaction,
    /// exactly once per generated turn
    pub fn persist_query_result(
        &self,
        result: &QueryResult,
        references: &[QueryReference],
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for reference in references {
            tx.execute(
                r#"
                INSERT INTO query_references (
                    id, engine_id, engine_name, document_id, document_url,
                    chunk_id, chunk_text, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    reference.id.to_string(),
                    reference.engine_id.to_string(),
                    reference.engine_name,
                    reference.document_id.to_string(),
                    reference.document_url,
                    reference.chunk_id.map(|id| id.to_string()),
                    reference.chunk_text,
                    reference.created_at.to_rfc3339(),
                ],
            )?;
        }

        tx.execute(
            r#"
            INSERT INTO query_results (
                id, engine_id, engine_name, reference_ids, response, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                result.id.to_string(),
                result.engine_id.to_string(),
                result.engine_name,
                serde_json::to_string(&result.reference_ids)?,
                result.response,
                result.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Fetch a result by id
    pub fn find_result(&self, id: Uuid) -> Result<Option<QueryResult>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM query_results WHERE id = ?1",
            params![id.to_string()],
            row_to_result,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Load the references behind a result, preserving order
    pub fn references_for_result(&self, result: &QueryResult) -> Result<Vec<QueryReference>> {
        let conn = self.conn.lock();
        let mut references = Vec::with_capacity(result.reference_ids.len());
        for reference_id in &result.reference_ids {
            let reference = conn
                .query_row(
                    "SELECT * FROM query_references WHERE id = ?1",
                    params![reference_id.to_string()],
                    row_to_reference,
                )
                .optional()?;
            if let Some(reference) = reference {
                references.push(reference);
            }
        }
        Ok(references)
    }
}

// ==================== Row mapping ====================

fn parse_uuid(value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_engine(row: &rusqlite::Row) -> rusqlite::Result<QueryEngine> {
    let id: String = row.get("id")?;
    let engine_type: String = row.get("engine_type")?;
    let parent_engine_id: Option<String> = row.get("parent_engine_id")?;
    let params_json: String = row.get("params")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    let params: HashMap<String, serde_json::Value> =
        serde_json::from_str(&params_json).unwrap_or_default();

    Ok(QueryEngine {
        id: parse_uuid(id)?,
        name: row.get("name")?,
        engine_type: EngineType::parse(&engine_type).unwrap_or(EngineType::VectorSearch),
        description: row.get("description")?,
        llm_model: row.get("llm_model")?,
        embedding_model: row.get("embedding_model")?,
        vector_store: row.get("vector_store")?,
        index_id: row.get("index_id")?,
        doc_url: row.get("doc_url")?,
        is_public: row.get::<_, i64>("is_public")? != 0,
        created_by: row.get("created_by")?,
        parent_engine_id: parent_engine_id.and_then(|s| Uuid::parse_str(&s).ok()),
        params,
        created_at: parse_timestamp(created_at),
        updated_at: parse_timestamp(updated_at),
    })
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<QueryDocument> {
    let id: String = row.get("id")?;
    let engine_id: String = row.get("engine_id")?;
    let created_at: String = row.get("created_at")?;

    Ok(QueryDocument {
        id: parse_uuid(id)?,
        engine_id: parse_uuid(engine_id)?,
        doc_url: row.get("doc_url")?,
        index_file: row.get("index_file")?,
        index_start: row.get("index_start")?,
        index_end: row.get("index_end")?,
        created_at: parse_timestamp(created_at),
    })
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<QueryDocumentChunk> {
    let id: String = row.get("id")?;
    let engine_id: String = row.get("engine_id")?;
    let document_id: String = row.get("document_id")?;
    let sentences_json: String = row.get("sentences")?;
    let created_at: String = row.get("created_at")?;

    Ok(QueryDocumentChunk {
        id: parse_uuid(id)?,
        engine_id: parse_uuid(engine_id)?,
        document_id: parse_uuid(document_id)?,
        index: row.get::<_, i64>("chunk_index")? as u32,
        text: row.get("text")?,
        clean_text: row.get("clean_text")?,
        sentences: serde_json::from_str(&sentences_json).unwrap_or_default(),
        created_at: parse_timestamp(created_at),
    })
}

fn row_to_user_query(row: &rusqlite::Row) -> rusqlite::Result<UserQuery> {
    let id: String = row.get("id")?;
    let engine_id: String = row.get("engine_id")?;
    let history_json: String = row.get("history")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    let history: Vec<HistoryEntry> = serde_json::from_str(&history_json).unwrap_or_default();

    Ok(UserQuery {
        id: parse_uuid(id)?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        engine_id: parse_uuid(engine_id)?,
        prompt: row.get("prompt")?,
        response: row.get("response")?,
        history,
        created_at: parse_timestamp(created_at),
        updated_at: parse_timestamp(updated_at),
    })
}

fn row_to_result(row: &rusqlite::Row) -> rusqlite::Result<QueryResult> {
    let id: String = row.get("id")?;
    let engine_id: String = row.get("engine_id")?;
    let reference_ids_json: String = row.get("reference_ids")?;
    let created_at: String = row.get("created_at")?;

    Ok(QueryResult {
        id: parse_uuid(id)?,
        engine_id: parse_uuid(engine_id)?,
        engine_name: row.get("engine_name")?,
        reference_ids: serde_json::from_str(&reference_ids_json).unwrap_or_default(),
        response: row.get("response")?,
        created_at: parse_timestamp(created_at),
    })
}

fn row_to_reference(row: &rusqlite::Row) -> rusqlite::Result<QueryReference> {
    let id: String = row.get("id")?;
    let engine_id: String = row.get("engine_id")?;
    let document_id: String = row.get("document_id")?;
    let chunk_id: Option<String> = row.get("chunk_id")?;
    let created_at: String = row.get("created_at")?;

    Ok(QueryReference {
        id: parse_uuid(id)?,
        engine_id: parse_uuid(engine_id)?,
        engine_name: row.get("engine_name")?,
        document_id: parse_uuid(document_id)?,
        document_url: row.get("document_url")?,
        chunk_id: chunk_id.and_then(|s| Uuid::parse_str(&s).ok()),
        chunk_text: row.get("chunk_text")?,
        created_at: parse_timestamp(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngineSpec, EngineType};

    fn spec(name: &str) -> EngineSpec {
        EngineSpec {
            name: name.to_string(),
            engine_type: EngineType::VectorSearch,
            doc_url: Some("gs://corpus/docs".into()),
            embedding_model: "embed-1".into(),
            llm_model: None,
            vector_store: None,
            description: Some("test engine".into()),
            is_public: false,
            created_by: "tester".into(),
            parent_engine_id: None,
            params: HashMap::new(),
        }
    }

    fn engine_with_build(db: &Database, name: &str) -> (QueryEngine, QueryDocument) {
        let engine = QueryEngine::new(&spec(name));
        db.create_engine(&engine).unwrap();

        let document = QueryDocument::new(engine.id, "gs://corpus/docs/a.txt".into());
        let chunks: Vec<QueryDocumentChunk> = (0..3)
            .map(|i| {
                QueryDocumentChunk::new(
                    engine.id,
                    document.id,
                    i,
                    format!("chunk {i}"),
                    format!("chunk {i}"),
                    vec![format!("chunk {i}")],
                )
            })
            .collect();

        db.persist_build(std::slice::from_ref(&document), &chunks)
            .unwrap();
        (engine, document)
    }

    #[test]
    fn engine_round_trips() {
        let db = Database::in_memory().unwrap();
        let engine = QueryEngine::new(&spec("manuals"));
        db.create_engine(&engine).unwrap();

        let found = db.find_engine(engine.id).unwrap().unwrap();
        assert_eq!(found.name, "manuals");
        assert_eq!(found.engine_type, EngineType::VectorSearch);
        assert_eq!(found.embedding_model, "embed-1");

        let by_name = db.find_engine_by_name("manuals").unwrap();
        assert!(by_name.is_some());
    }

    #[test]
    fn soft_deleted_engine_is_invisible_and_name_is_reusable() {
        let db = Database::in_memory().unwrap();
        let engine = QueryEngine::new(&spec("manuals"));
        db.create_engine(&engine).unwrap();

        db.soft_delete_engine(engine.id).unwrap();
        assert!(db.find_engine(engine.id).unwrap().is_none());
        assert!(db.find_engine_by_name("manuals").unwrap().is_none());

        // the name is free again for a new engine
        let replacement = QueryEngine::new(&spec("manuals"));
        db.create_engine(&replacement).unwrap();
        assert!(db.find_engine_by_name("manuals").unwrap().is_some());
    }

    #[test]
    fn hard_delete_cascades_to_documents_and_chunks() {
        let db = Database::in_memory().unwrap();
        let (engine, document) = engine_with_build(&db, "manuals");
        assert_eq!(db.chunk_count(engine.id).unwrap(), 3);

        db.hard_delete_engine(engine.id).unwrap();

        assert!(db.find_engine(engine.id).unwrap().is_none());
        assert!(db.find_document(document.id).unwrap().is_none());
        assert_eq!(db.chunk_count(engine.id).unwrap(), 0);
    }

    #[test]
    fn chunk_lookup_by_engine_index() {
        let db = Database::in_memory().unwrap();
        let (engine, _) = engine_with_build(&db, "manuals");

        let chunk = db.find_chunk_by_index(engine.id, 1).unwrap().unwrap();
        assert_eq!(chunk.text, "chunk 1");
        assert!(db.find_chunk_by_index(engine.id, 99).unwrap().is_none());
    }

    #[test]
    fn duplicate_chunk_index_is_rejected() {
        let db = Database::in_memory().unwrap();
        let (engine, document) = engine_with_build(&db, "manuals");

        let duplicate = QueryDocumentChunk::new(
            engine.id,
            document.id,
            0,
            "dup".into(),
            "dup".into(),
            vec![],
        );
        assert!(db.persist_build(&[], &[duplicate]).is_err());
    }

    #[test]
    fn update_history_appends_exactly_one_pair() {
        let db = Database::in_memory().unwrap();
        let (engine, _) = engine_with_build(&db, "manuals");

        let query = UserQuery::new("user-1".into(), engine.id, "first prompt".into());
        db.create_user_query(&query).unwrap();

        db.update_history(query.id, "first prompt", "first answer", &[])
            .unwrap();
        let updated = db
            .update_history(query.id, "second prompt", "second answer", &[])
            .unwrap();

        assert_eq!(updated.history.len(), 4);
        assert!(updated.history[0].is_human());
        assert!(updated.history[3].is_ai());
        assert_eq!(updated.response.as_deref(), Some("second answer"));

        // earlier entries are untouched
        assert_eq!(updated.history[1].content(), "first answer");

        let reloaded = db.find_user_query(query.id).unwrap().unwrap();
        assert_eq!(reloaded.history.len(), 4);
    }

    #[test]
    fn user_query_listing_skips_deleted_and_paginates() {
        let db = Database::in_memory().unwrap();
        let (engine, _) = engine_with_build(&db, "manuals");

        let mut ids = Vec::new();
        for i in 0..3 {
            let q = UserQuery::new("user-1".into(), engine.id, format!("prompt {i}"));
            db.create_user_query(&q).unwrap();
            ids.push(q.id);
        }
        db.soft_delete_user_query(ids[0]).unwrap();

        let queries = db.queries_for_user("user-1", 0, 10).unwrap();
        assert_eq!(queries.len(), 2);

        let limited = db.queries_for_user("user-1", 0, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn result_and_references_round_trip_in_order() {
        let db = Database::in_memory().unwrap();
        let (engine, document) = engine_with_build(&db, "manuals");

        let references: Vec<QueryReference> = (0..2)
            .map(|i| {
                QueryReference::new(
                    &engine,
                    document.id,
                    format!("gs://corpus/docs/{i}.txt"),
                    None,
                    format!("ref text {i}"),
                )
            })
            .collect();
        let result = QueryResult::new(&engine, &references, "the answer".into());

        db.persist_query_result(&result, &references).unwrap();

        let found = db.find_result(result.id).unwrap().unwrap();
        assert_eq!(found.response, "the answer");

        let loaded = db.references_for_result(&found).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].chunk_text, "ref text 0");
        assert_eq!(loaded[1].chunk_text, "ref text 1");
    }

    #[test]
    fn references_survive_chunk_deletion() {
        let db = Database::in_memory().unwrap();
        let (engine, document) = engine_with_build(&db, "manuals");

        let chunk = db.find_chunk_by_index(engine.id, 0).unwrap().unwrap();
        let reference = QueryReference::new(
            &engine,
            document.id,
            "gs://corpus/docs/a.txt".into(),
            Some(chunk.id),
            chunk.text.clone(),
        );
        let result = QueryResult::new(&engine, std::slice::from_ref(&reference), "answer".into());
        db.persist_query_result(&result, std::slice::from_ref(&reference))
            .unwrap();

        db.hard_delete_engine(engine.id).unwrap();

        let loaded = db.references_for_result(&result).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].chunk_text, "chunk 0");
    }
}
