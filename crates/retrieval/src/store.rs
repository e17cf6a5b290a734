//! SQLite-backed corpus store.
//!
//! Documents live in `documents`, their vectors one value per row in
//! `embeddings(doc_id, dim, value)` so similarity can be aggregated in SQL,
//! and corpus-wide facts (dimensions, embedding model) in `corpus_meta`.
//! The query path opens the store read-only.

use crate::types::{Document, Embedding, Language};
use chrono::Utc;
use lingua_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub const META_DIMENSIONS: &str = "dimensions";
pub const META_EMBEDDING_MODEL: &str = "embedding_model";
pub const META_IMPORTED_AT: &str = "imported_at";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    position INTEGER NOT NULL UNIQUE,
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    content TEXT NOT NULL,
    source_language TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS embeddings (
    doc_id TEXT NOT NULL,
    dim INTEGER NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (doc_id, dim)
);

CREATE TABLE IF NOT EXISTS corpus_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Dot products and squared norms of every stored document against the query,
/// computed by aggregation. SQLite builds may lack math functions, so the
/// cosine is finished in Rust and ranked there with the same value that is
/// returned.
const TOP_N_SQL: &str = r#"
WITH query AS (
    SELECT CAST(key AS INTEGER) AS dim, CAST(value AS REAL) AS q
    FROM json_each(?1)
),
query_norm AS (
    SELECT SUM(q * q) AS qq FROM query
),
scored AS (
    SELECT
        e.doc_id AS doc_id,
        SUM(e.value * query.q) AS dot,
        SUM(e.value * e.value) AS dd
    FROM embeddings AS e
    JOIN query ON query.dim = e.dim
    GROUP BY e.doc_id
)
SELECT
    d.id,
    d.position,
    s.dot,
    s.dd,
    qn.qq
FROM documents AS d
JOIN scored AS s ON s.doc_id = d.id
CROSS JOIN query_norm AS qn
ORDER BY d.position ASC
"#;

/// Read access to documents by id.
///
/// Implemented by the corpus store and by plain maps, so context assembly can
/// run against either.
pub trait DocumentLookup {
    fn lookup(&self, id: &str) -> AppResult<Option<Document>>;
}

impl DocumentLookup for HashMap<String, Document> {
    fn lookup(&self, id: &str) -> AppResult<Option<Document>> {
        Ok(self.get(id).cloned())
    }
}

/// Summary of a stored corpus.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub path: Option<PathBuf>,
    pub documents: usize,
    pub dimensions: Option<usize>,
    pub embedding_model: Option<String>,
    pub imported_at: Option<String>,
    pub languages: BTreeMap<String, usize>,
    pub db_size_bytes: u64,
}

/// Handle to the SQLite corpus. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CorpusStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

fn storage_err(context: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Storage(format!("{}: {}", context, e))
}

impl CorpusStore {
    /// Open (creating if needed) a writable store.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create corpus directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(storage_err("Failed to open corpus store"))?;
        conn.execute_batch(SCHEMA)
            .map_err(storage_err("Failed to create corpus tables"))?;

        tracing::debug!("Opened corpus store at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing store for queries only.
    pub fn open_read_only(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Storage(format!(
                "No corpus found at {:?}. Run 'lingua corpus import' first.",
                path
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(storage_err("Failed to open corpus store"))?;

        tracing::debug!("Opened corpus store read-only at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Transient store, used by tests and dry runs.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(storage_err("Failed to open corpus store"))?;
        conn.execute_batch(SCHEMA)
            .map_err(storage_err("Failed to create corpus tables"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("Corpus store lock poisoned".to_string()))
    }

    /// Run blocking work against the connection on the blocking pool.
    pub async fn with_connection<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = store.lock()?;
            f(&conn)
        })
        .await
        .map_err(|e| AppError::Storage(format!("Corpus task failed: {}", e)))?
    }

    /// Insert or replace documents, keeping the position of ids already
    /// present. Returns the number of rows written.
    pub fn insert_documents(&self, documents: &[Document]) -> AppResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        self.write_documents(documents, false)
    }

    /// Replace the whole corpus with `documents` in one transaction. On error
    /// the previous corpus is left untouched.
    pub fn replace_all(&self, documents: &[Document]) -> AppResult<usize> {
        let written = self.write_documents(documents, true)?;
        tracing::info!("Replaced corpus with {} documents", written);
        Ok(written)
    }

    fn write_documents(&self, documents: &[Document], clear: bool) -> AppResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(storage_err("Failed to begin transaction"))?;

        if clear {
            tx.execute_batch(
                "DELETE FROM embeddings; DELETE FROM documents; DELETE FROM corpus_meta;",
            )
            .map_err(storage_err("Failed to clear corpus"))?;
        }

        let mut dimensions = read_meta(&tx, META_DIMENSIONS)?
            .map(|v| parse_dimensions(&v))
            .transpose()?;

        let mut next_position: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM documents",
                [],
                |row| row.get(0),
            )
            .map_err(storage_err("Failed to read next position"))?;

        for doc in documents {
            let dims = doc.embedding.dimensions();
            if dims == 0 {
                return Err(AppError::InvalidArgument(format!(
                    "Document '{}' has no embedding",
                    doc.id
                )));
            }
            match dimensions {
                Some(expected) if expected != dims => {
                    return Err(AppError::InvalidArgument(format!(
                        "Document '{}' has {} dimensions, corpus has {}",
                        doc.id, dims, expected
                    )));
                }
                Some(_) => {}
                None => {
                    write_meta(&tx, META_DIMENSIONS, &dims.to_string())?;
                    dimensions = Some(dims);
                }
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT position FROM documents WHERE id = ?1",
                    [&doc.id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err("Failed to look up document"))?;

            let position = existing.unwrap_or_else(|| {
                let p = next_position;
                next_position += 1;
                p
            });

            tx.execute(
                "INSERT OR REPLACE INTO documents (position, id, title, url, content, source_language)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    position,
                    doc.id,
                    doc.title,
                    doc.url,
                    doc.content,
                    doc.source_language.code(),
                ],
            )
            .map_err(storage_err("Failed to insert document"))?;

            tx.execute("DELETE FROM embeddings WHERE doc_id = ?1", [&doc.id])
                .map_err(storage_err("Failed to clear embedding"))?;

            let mut stmt = tx
                .prepare_cached("INSERT INTO embeddings (doc_id, dim, value) VALUES (?1, ?2, ?3)")
                .map_err(storage_err("Failed to prepare embedding insert"))?;
            for (dim, value) in doc.embedding.values().iter().enumerate() {
                stmt.execute(params![doc.id, dim as i64, value])
                    .map_err(storage_err("Failed to insert embedding"))?;
            }
        }

        write_meta(&tx, META_IMPORTED_AT, &Utc::now().to_rfc3339())?;
        tx.commit().map_err(storage_err("Failed to commit documents"))?;

        tracing::debug!("Stored {} documents", documents.len());
        Ok(documents.len())
    }

    /// Record the model the corpus was embedded with.
    pub fn set_embedding_model(&self, model: &str) -> AppResult<()> {
        let conn = self.lock()?;
        write_meta(&conn, META_EMBEDDING_MODEL, model)
    }

    pub fn meta(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.lock()?;
        read_meta(&conn, key)
    }

    /// Embedding dimensionality shared by every stored document.
    pub fn dimensions(&self) -> AppResult<Option<usize>> {
        self.meta(META_DIMENSIONS)?
            .map(|v| parse_dimensions(&v))
            .transpose()
    }

    pub fn count(&self) -> AppResult<usize> {
        let conn = self.lock()?;
        count_documents(&conn)
    }

    pub fn get_document(&self, id: &str) -> AppResult<Option<Document>> {
        let conn = self.lock()?;
        load_document(&conn, id)
    }

    /// Every document in insertion order.
    pub fn all_documents(&self) -> AppResult<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM documents ORDER BY position ASC")
            .map_err(storage_err("Failed to prepare document scan"))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(storage_err("Failed to scan documents"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err("Failed to read document id"))?;

        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = load_document(&conn, &id)? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    /// Fetch a set of documents on the blocking pool. Missing ids are absent
    /// from the result.
    pub async fn load_documents(&self, ids: Vec<String>) -> AppResult<HashMap<String, Document>> {
        self.with_connection(move |conn| {
            let mut found = HashMap::with_capacity(ids.len());
            for id in ids {
                if let Some(doc) = load_document(conn, &id)? {
                    found.insert(id, doc);
                }
            }
            Ok(found)
        })
        .await
    }

    /// Top `n` documents by cosine similarity, computed in SQL.
    ///
    /// Ties keep insertion order. A zero-norm query or document scores 0.0.
    pub fn top_n_by_cosine(&self, query: &Embedding, n: usize) -> AppResult<Vec<(String, f64)>> {
        let conn = self.lock()?;
        top_n_by_cosine(&conn, query, n)
    }

    pub fn stats(&self) -> AppResult<CorpusStats> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT source_language, COUNT(*) FROM documents GROUP BY source_language")
            .map_err(storage_err("Failed to prepare language stats"))?;
        let languages = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })
            .map_err(storage_err("Failed to count languages"))?
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(storage_err("Failed to read language stats"))?;

        let db_size_bytes = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(CorpusStats {
            path: self.path.clone(),
            documents: count_documents(&conn)?,
            dimensions: read_meta(&conn, META_DIMENSIONS)?
                .map(|v| parse_dimensions(&v))
                .transpose()?,
            embedding_model: read_meta(&conn, META_EMBEDDING_MODEL)?,
            imported_at: read_meta(&conn, META_IMPORTED_AT)?,
            languages,
            db_size_bytes,
        })
    }
}

impl DocumentLookup for CorpusStore {
    fn lookup(&self, id: &str) -> AppResult<Option<Document>> {
        self.get_document(id)
    }
}

pub(crate) fn top_n_by_cosine(
    conn: &Connection,
    query: &Embedding,
    n: usize,
) -> AppResult<Vec<(String, f64)>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let query_json = serde_json::to_string(query.values())?;

    let mut stmt = conn
        .prepare_cached(TOP_N_SQL)
        .map_err(storage_err("Failed to prepare similarity query"))?;

    let rows = stmt
        .query_map(params![query_json], |row| {
            let id: String = row.get(0)?;
            let position: i64 = row.get(1)?;
            let dot: f64 = row.get(2)?;
            let dd: f64 = row.get(3)?;
            let qq: f64 = row.get(4)?;
            Ok((id, position, dot, dd, qq))
        })
        .map_err(storage_err("Failed to run similarity query"))?;

    let mut scored = Vec::new();
    for row in rows {
        let (id, position, dot, dd, qq) =
            row.map_err(storage_err("Failed to read similarity row"))?;
        let similarity = if dd == 0.0 || qq == 0.0 {
            0.0
        } else {
            (dot / (dd.sqrt() * qq.sqrt())).clamp(-1.0, 1.0)
        };
        scored.push((id, position, similarity));
    }

    // Equal scores keep insertion order.
    scored.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.1.cmp(&b.1)));
    scored.truncate(n);

    Ok(scored
        .into_iter()
        .map(|(id, _, similarity)| (id, similarity))
        .collect())
}

fn load_document(conn: &Connection, id: &str) -> AppResult<Option<Document>> {
    let row = conn
        .query_row(
            "SELECT id, title, url, content, source_language FROM documents WHERE id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()
        .map_err(storage_err("Failed to load document"))?;

    let Some((id, title, url, content, language)) = row else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare_cached("SELECT value FROM embeddings WHERE doc_id = ?1 ORDER BY dim ASC")
        .map_err(storage_err("Failed to prepare embedding load"))?;
    let values = stmt
        .query_map([&id], |row| row.get::<_, f64>(0))
        .map_err(storage_err("Failed to load embedding"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(storage_err("Failed to read embedding value"))?;

    let source_language = language
        .parse::<Language>()
        .map_err(|e| AppError::Storage(format!("Invalid language for '{}': {}", id, e)))?;

    Ok(Some(Document {
        id,
        title,
        url,
        content,
        embedding: Embedding::new(values),
        source_language,
    }))
}

fn count_documents(conn: &Connection) -> AppResult<usize> {
    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| {
        row.get::<_, i64>(0).map(|v| v as usize)
    })
    .map_err(storage_err("Failed to count documents"))
}

fn read_meta(conn: &Connection, key: &str) -> AppResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM corpus_meta WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
    .map_err(storage_err("Failed to read corpus metadata"))
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO corpus_meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(storage_err("Failed to write corpus metadata"))?;
    Ok(())
}

fn parse_dimensions(value: &str) -> AppResult<usize> {
    value
        .parse()
        .map_err(|_| AppError::Storage(format!("Invalid stored dimensions '{}'", value)))
}
