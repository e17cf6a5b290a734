//! Corpus import and export.
//!
//! Records are read from JSON arrays or JSON Lines files, one object per
//! document:
//!
//! ```json
//! {"title": "...", "url": "https://...", "html": "...", "embedding": [0.1, ...]}
//! ```
//!
//! `html` is accepted as an alias for `content`. Records without an `id` get
//! one derived from their URL; records without an `embedding` are embedded on
//! import when requested, otherwise skipped.

use crate::embeddings::EmbeddingClient;
use crate::ids::document_id;
use crate::store::CorpusStore;
use crate::types::{Document, Embedding, Language};
use lingua_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use walkdir::WalkDir;

/// Texts sent to the embedding client per progress step.
const EMBED_PROGRESS_STEP: usize = 100;

/// One document as it appears in an import or export file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub url: String,

    #[serde(default, alias = "html")]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl From<Document> for CorpusRecord {
    fn from(doc: Document) -> Self {
        Self {
            id: Some(doc.id),
            title: doc.title,
            url: doc.url,
            content: doc.content,
            embedding: Some(doc.embedding.into_values()),
            source_language: Some(doc.source_language.code().to_string()),
            source_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Jsonl,
    Json,
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" | "ndjson" => Ok(ExportFormat::Jsonl),
            "json" => Ok(ExportFormat::Json),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown export format '{}', expected jsonl or json",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Embed records that carry no embedding
    pub embed: bool,
    /// Clear the store before importing
    pub reset: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub files: usize,
    pub records: usize,
    pub imported: usize,
    pub embedded: usize,
    pub skipped: usize,
    pub duration_secs: f64,
}

/// Expand files and directories into the list of `.json` / `.jsonl` inputs.
pub fn collect_input_files(paths: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_corpus_file(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            return Err(AppError::InvalidArgument(format!(
                "Input path does not exist: {:?}",
                path
            )));
        }
    }

    Ok(files)
}

fn is_corpus_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl") | Some("ndjson")
    )
}

/// Parse one input file, JSON array or JSON Lines.
pub fn read_records(path: &Path) -> AppResult<Vec<CorpusRecord>> {
    let text = fs::read_to_string(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string());

    let mut records: Vec<CorpusRecord> = if text.trim_start().starts_with('[') {
        serde_json::from_str(&text).map_err(|e| {
            AppError::Serialization(format!("Failed to parse {:?}: {}", path, e))
        })?
    } else {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| {
                    AppError::Serialization(format!("{:?} line {}: {}", path, i + 1, e))
                })
            })
            .collect::<AppResult<_>>()?
    };

    for record in &mut records {
        if record.source_file.is_none() {
            record.source_file = file_name.clone();
        }
    }

    Ok(records)
}

/// Import every record under `paths` into `store`.
///
/// `embedder` is required when `options.embed` is set. Nothing is written
/// until every file has been parsed and embedded; with `options.reset` the
/// old corpus is replaced in the same transaction.
pub async fn import_corpus(
    store: &CorpusStore,
    paths: &[PathBuf],
    options: &ImportOptions,
    embedder: Option<&EmbeddingClient>,
) -> AppResult<ImportStats> {
    let start = Instant::now();
    let files = collect_input_files(paths)?;
    let mut stats = ImportStats {
        files: files.len(),
        ..Default::default()
    };

    tracing::info!("Importing corpus from {} files", files.len());

    let mut ready: Vec<Document> = Vec::new();
    let mut pending: Vec<(Document, String)> = Vec::new();

    for file in &files {
        let records = read_records(file)?;
        tracing::debug!("Read {} records from {:?}", records.len(), file);
        stats.records += records.len();

        for record in records {
            if record.content.trim().is_empty() {
                tracing::warn!("Skipping record without content: {}", record.url);
                stats.skipped += 1;
                continue;
            }

            let (doc, needs_embedding) = to_document(record)?;
            if needs_embedding {
                if options.embed {
                    let text = doc.content.clone();
                    pending.push((doc, text));
                } else {
                    tracing::warn!(
                        "Skipping '{}': no embedding (use --embed to compute one)",
                        doc.id
                    );
                    stats.skipped += 1;
                }
            } else {
                ready.push(doc);
            }
        }
    }

    let mut embedding_model = None;
    if !pending.is_empty() {
        let embedder = embedder.ok_or_else(|| {
            AppError::Config("An embedding client is required to embed records".to_string())
        })?;

        let total = pending.len();
        for step in pending.chunks(EMBED_PROGRESS_STEP) {
            let texts: Vec<String> = step.iter().map(|(_, text)| text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;
            for ((doc, _), embedding) in step.iter().zip(vectors) {
                let mut doc = doc.clone();
                doc.embedding = embedding;
                ready.push(doc);
            }
            stats.embedded += step.len();
            tracing::info!("Embedded {}/{} records", stats.embedded, total);
        }

        embedding_model = Some(embedder.model_name());
    }

    stats.imported = if options.reset {
        store.replace_all(&ready)?
    } else {
        store.insert_documents(&ready)?
    };
    if let Some(model) = embedding_model {
        store.set_embedding_model(model)?;
    }
    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Imported {} documents ({} embedded, {} skipped) in {:.2}s",
        stats.imported,
        stats.embedded,
        stats.skipped,
        stats.duration_secs
    );

    Ok(stats)
}

fn to_document(record: CorpusRecord) -> AppResult<(Document, bool)> {
    let id = match record.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => document_id(&record.url, &record.title, &record.content),
    };

    let source_language = match record.source_language.as_deref() {
        Some(code) => code.parse::<Language>().map_err(|e| {
            AppError::InvalidArgument(format!("Record '{}': {}", id, e))
        })?,
        None => Language::detect(&format!("{} {}", record.title, record.content)),
    };

    let needs_embedding = record.embedding.as_ref().map_or(true, |e| e.is_empty());

    Ok((
        Document {
            id,
            title: record.title,
            url: record.url,
            content: record.content,
            embedding: Embedding::new(record.embedding.unwrap_or_default()),
            source_language,
        },
        needs_embedding,
    ))
}

/// Write every stored document to `out`. Returns the number written.
pub fn export_corpus(store: &CorpusStore, out: &Path, format: ExportFormat) -> AppResult<usize> {
    let documents = store.all_documents()?;
    let count = documents.len();
    let records: Vec<CorpusRecord> = documents.into_iter().map(CorpusRecord::from).collect();

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(fs::File::create(out)?);

    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &records)?;
            writeln!(writer)?;
        }
        ExportFormat::Jsonl => {
            for record in &records {
                serde_json::to_writer(&mut writer, record)?;
                writeln!(writer)?;
            }
        }
    }
    writer.flush()?;

    tracing::info!("Exported {} documents to {:?}", count, out);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingConfig;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_json_array_with_html_alias() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "talk.yiwu.io.json",
            r#"[{"title": "經期", "url": "https://talk.yiwu.io/t/topic/7", "html": "<p>內容</p>"}]"#,
        );

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "<p>內容</p>");
        assert_eq!(records[0].source_file.as_deref(), Some("talk.yiwu.io.json"));
    }

    #[test]
    fn test_read_jsonl_reports_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "bad.jsonl",
            "{\"title\": \"a\", \"content\": \"x\"}\n\nnot json\n",
        );
        let err = read_records(&path).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_collect_input_files_filters_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.jsonl", "");
        write(dir.path(), "a.json", "[]");
        write(dir.path(), "notes.txt", "ignored");

        let files = collect_input_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.jsonl"]);

        assert!(collect_input_files(&[dir.path().join("missing")]).is_err());
    }

    #[tokio::test]
    async fn test_import_with_and_without_embeddings() {
        let dir = TempDir::new().unwrap();
        let input = write(
            dir.path(),
            "corpus.jsonl",
            concat!(
                r#"{"title": "Cramps", "url": "https://helloclue.com/articles/cycle-a-z/cramps", "content": "heat helps", "embedding": [1.0, 0.0, 0.0, 0.0]}"#,
                "\n",
                r#"{"title": "經痛", "url": "https://talk.yiwu.io/t/topic/42", "html": "熱敷有幫助"}"#,
                "\n",
                r#"{"title": "Empty", "url": "https://example.org/empty", "content": "  "}"#,
                "\n"
            ),
        );

        let store = CorpusStore::open_in_memory().unwrap();
        let stats = import_corpus(&store, &[input.clone()], &ImportOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.imported, 1);
        assert_eq!(stats.skipped, 2);

        let embedder = EmbeddingClient::from_config(&EmbeddingConfig::mock(4)).unwrap();
        let options = ImportOptions {
            embed: true,
            reset: true,
        };
        let stats = import_corpus(&store, &[input], &options, Some(&embedder))
            .await
            .unwrap();
        assert_eq!(stats.imported, 2);
        assert_eq!(stats.embedded, 1);

        let doc = store.get_document("talk_yiwu_io.42").unwrap().unwrap();
        assert_eq!(doc.source_language, Language::Chinese);
        assert_eq!(doc.embedding.dimensions(), 4);
        assert!(store
            .get_document("helloclue_com.cramps")
            .unwrap()
            .is_some());
        assert_eq!(
            store.meta(crate::store::META_EMBEDDING_MODEL).unwrap().as_deref(),
            Some("trigram-v1")
        );
    }

    #[tokio::test]
    async fn test_failed_reset_import_keeps_corpus() {
        let dir = TempDir::new().unwrap();
        let input = write(
            dir.path(),
            "broken.jsonl",
            concat!(
                r#"{"title": "New", "url": "https://example.org/new", "content": "x", "embedding": [1.0, 0.0]}"#,
                "\n",
                "{not json\n"
            ),
        );

        let store = CorpusStore::open_in_memory().unwrap();
        store
            .insert_documents(&[Document {
                id: "kept".to_string(),
                title: "Kept".to_string(),
                url: "https://example.org/kept".to_string(),
                content: "still here".to_string(),
                embedding: Embedding::new(vec![0.0, 1.0]),
                source_language: Language::English,
            }])
            .unwrap();

        let options = ImportOptions {
            embed: false,
            reset: true,
        };
        let err = import_corpus(&store, &[input], &options, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get_document("kept").unwrap().is_some());

        let unembeddable = write(
            dir.path(),
            "raw.jsonl",
            "{\"title\": \"Raw\", \"url\": \"https://example.org/raw\", \"content\": \"text\"}\n",
        );
        let options = ImportOptions {
            embed: true,
            reset: true,
        };
        assert!(import_corpus(&store, &[unembeddable], &options, None)
            .await
            .is_err());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_export_formats() {
        let dir = TempDir::new().unwrap();
        let store = CorpusStore::open_in_memory().unwrap();
        store
            .insert_documents(&[
                Document {
                    id: "a".to_string(),
                    title: "A".to_string(),
                    url: "https://example.org/a".to_string(),
                    content: "alpha".to_string(),
                    embedding: Embedding::new(vec![0.5, 0.5]),
                    source_language: Language::English,
                },
                Document {
                    id: "b".to_string(),
                    title: "B".to_string(),
                    url: "https://example.org/b".to_string(),
                    content: "beta".to_string(),
                    embedding: Embedding::new(vec![0.0, 1.0]),
                    source_language: Language::Chinese,
                },
            ])
            .unwrap();

        let jsonl = dir.path().join("out/corpus.jsonl");
        assert_eq!(export_corpus(&store, &jsonl, ExportFormat::Jsonl).unwrap(), 2);
        let records = read_records(&jsonl).unwrap();
        assert_eq!(records[0].id.as_deref(), Some("a"));
        assert_eq!(records[1].source_language.as_deref(), Some("zh"));
        assert_eq!(records[1].embedding, Some(vec![0.0, 1.0]));

        let json = dir.path().join("corpus.json");
        export_corpus(&store, &json, ExportFormat::Json).unwrap();
        let parsed: Vec<CorpusRecord> =
            serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("JSONL".parse::<ExportFormat>().unwrap(), ExportFormat::Jsonl);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("csv".parse::<ExportFormat>().is_err());
    }
}
