// defense-providers/src/json.rs
// ============================================================================
// Module: JSON Retrieval Provider
// Description: RetrievalPort backed by a tenant-partitioned tree of JSON/YAML
//              evidence files.
// Purpose: Answer evidence queries from documents a company has uploaded,
//          without ever crossing into another company's partition.
// Dependencies: defense-core, jsonpath_lib, serde_json, serde_yaml, tokio
// ============================================================================

//! ## Overview
//! Evidence documents live under `{root}/{company_id}/*.json` (or
//! `.yaml`/`.yml`) for company-private material and `{root}/_shared/*` for
//! material visible to every tenant. A query loads every document in both
//! directories, scores it against `query.text` with a keyword-overlap
//! heuristic, and returns the top `query.limit` results ordered by
//! descending relevance.
//!
//! File reads are bounded by `max_bytes` and every resolved path is checked
//! to still live under its partition root before it is opened. The teacher
//! has no JSON-document evidence provider of its own to imitate directly;
//! this enforcement is instead modeled on the allowlist/denylist-plus-hard-
//! size-limit discipline `EnvProvider` (`env.rs`) applies to environment
//! variable lookups, adapted from key/value bounds to a path-confinement
//! check.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use defense_core::RetrievalError;
use defense_core::RetrievalPort;
use defense_core::RetrievalQuery;
use defense_core::RetrievalResult;
use jsonpath_lib::select;
use serde_json::Value;

/// Directory name under `root` holding documents visible to every tenant.
const SHARED_PARTITION: &str = "_shared";

/// Configuration for [`JsonRetrievalProvider`].
#[derive(Debug, Clone)]
pub struct JsonRetrievalProviderConfig {
    /// Root directory containing one subdirectory per company, plus
    /// [`SHARED_PARTITION`].
    pub root: PathBuf,
    /// Maximum size, in bytes, of any single evidence file.
    pub max_bytes: usize,
    /// Whether `.yaml`/`.yml` files are parsed in addition to `.json`.
    pub allow_yaml: bool,
    /// `JSONPath` expression selecting a document's body text, evaluated
    /// against each element of the file's document array.
    pub text_jsonpath: String,
    /// `JSONPath` expression selecting a document's title, if any.
    pub title_jsonpath: String,
    /// `JSONPath` expression selecting a document's stable id, if any.
    pub id_jsonpath: String,
}

impl Default for JsonRetrievalProviderConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            max_bytes: 1024 * 1024,
            allow_yaml: true,
            text_jsonpath: "$.text".to_string(),
            title_jsonpath: "$.title".to_string(),
            id_jsonpath: "$.id".to_string(),
        }
    }
}

/// One evidence document extracted from a file via `JSONPath`.
#[derive(Debug, Clone)]
struct EvidenceDocument {
    id: Option<String>,
    title: Option<String>,
    text: String,
}

/// Selects the first string value `path` resolves to within `node`.
fn select_first_string(node: &Value, path: &str) -> Option<String> {
    let matches = select(node, path).ok()?;
    matches.first().and_then(|value| value.as_str()).map(str::to_string)
}

/// Extracts one [`EvidenceDocument`] from a document node via the
/// configured `JSONPath` expressions. Returns `None` when `text_jsonpath`
/// resolves to nothing, since a document without body text cannot be
/// scored or cited.
fn extract_document(node: &Value, config: &JsonRetrievalProviderConfig) -> Option<EvidenceDocument> {
    let text = select_first_string(node, &config.text_jsonpath)?;
    Some(EvidenceDocument {
        id: select_first_string(node, &config.id_jsonpath),
        title: select_first_string(node, &config.title_jsonpath),
        text,
    })
}

/// [`RetrievalPort`] backed by a tenant-partitioned directory of evidence
/// files.
pub struct JsonRetrievalProvider {
    config: JsonRetrievalProviderConfig,
}

impl JsonRetrievalProvider {
    /// Creates a provider rooted at `config.root`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Unavailable`] when the root does not exist
    /// or is not a directory.
    pub fn new(config: JsonRetrievalProviderConfig) -> Result<Self, RetrievalError> {
        if !config.root.is_dir() {
            return Err(RetrievalError::Unavailable(format!(
                "json retrieval root is not a directory: {}",
                config.root.display()
            )));
        }
        Ok(Self { config })
    }
}

#[async_trait]
impl RetrievalPort for JsonRetrievalProvider {
    async fn query(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let config = self.config.clone();
        let company = query.company_id.as_str().to_string();
        let text = query.text.clone();
        let limit = query.limit;

        tokio::task::spawn_blocking(move || collect_results(&config, &company, &text, limit))
            .await
            .map_err(|err| RetrievalError::Unavailable(format!("retrieval task panicked: {err}")))?
    }
}

/// Loads every evidence document visible to `company`, scores it against
/// `text`, and returns the top `limit` results.
fn collect_results(
    config: &JsonRetrievalProviderConfig,
    company: &str,
    text: &str,
    limit: usize,
) -> Result<Vec<RetrievalResult>, RetrievalError> {
    let query_tokens = tokenize(text);

    let mut scored: Vec<RetrievalResult> = Vec::new();
    for partition in [company, SHARED_PARTITION] {
        let dir = config.root.join(partition);
        if !dir.is_dir() {
            continue;
        }
        for (source_id, document) in load_partition(&dir, config)? {
            let doc_tokens = tokenize(&document.text);
            let title_tokens = document.title.as_deref().map(tokenize).unwrap_or_default();
            let relevance = score(&query_tokens, &doc_tokens, &title_tokens);
            scored.push(RetrievalResult {
                source_id: document.id.unwrap_or(source_id),
                excerpt: document.text,
                relevance,
            });
        }
    }

    scored.sort_by(|left, right| {
        right
            .relevance
            .partial_cmp(&left.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| left.source_id.cmp(&right.source_id))
    });
    scored.truncate(limit);
    Ok(scored)
}

/// Loads every supported evidence file directly inside `dir`.
fn load_partition(
    dir: &Path,
    config: &JsonRetrievalProviderConfig,
) -> Result<Vec<(String, EvidenceDocument)>, RetrievalError> {
    let canonical_dir = dir
        .canonicalize()
        .map_err(|err| RetrievalError::Unavailable(format!("cannot read evidence dir: {err}")))?;
    let entries = fs::read_dir(&canonical_dir)
        .map_err(|err| RetrievalError::Unavailable(format!("cannot list evidence dir: {err}")))?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|err| RetrievalError::Degraded(format!("cannot read dir entry: {err}")))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let resolved = match path.canonicalize() {
            Ok(resolved) if resolved.starts_with(&canonical_dir) => resolved,
            _ => continue,
        };
        let Some(ext) = resolved.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        let is_yaml = ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml");
        if !ext.eq_ignore_ascii_case("json") && !(config.allow_yaml && is_yaml) {
            continue;
        }
        let source_id = resolved.file_stem().map_or_else(
            || "evidence".to_string(),
            |stem| stem.to_string_lossy().to_string(),
        );
        match read_documents(&resolved, config, is_yaml) {
            Ok(parsed) => {
                for (index, document) in parsed.into_iter().enumerate() {
                    let id = if index == 0 {
                        source_id.clone()
                    } else {
                        format!("{source_id}#{index}")
                    };
                    documents.push((id, document));
                }
            }
            Err(_) => continue,
        }
    }
    Ok(documents)
}

/// Reads and parses one evidence file, enforcing `config.max_bytes`, then
/// extracts each document node via the configured `JSONPath` expressions.
fn read_documents(
    path: &Path,
    config: &JsonRetrievalProviderConfig,
    is_yaml: bool,
) -> Result<Vec<EvidenceDocument>, RetrievalError> {
    let metadata = fs::metadata(path)
        .map_err(|err| RetrievalError::Degraded(format!("cannot stat evidence file: {err}")))?;
    if metadata.len() > config.max_bytes as u64 {
        return Err(RetrievalError::Degraded(format!(
            "evidence file exceeds {} bytes: {}",
            config.max_bytes,
            path.display()
        )));
    }
    let content = fs::read(path)
        .map_err(|err| RetrievalError::Degraded(format!("cannot read evidence file: {err}")))?;

    let value: Value = if is_yaml {
        serde_yaml::from_slice(&content)
            .map_err(|err| RetrievalError::Degraded(format!("invalid yaml evidence: {err}")))?
    } else {
        serde_json::from_slice(&content)
            .map_err(|err| RetrievalError::Degraded(format!("invalid json evidence: {err}")))?
    };
    let nodes = document_nodes(value);
    Ok(nodes.iter().filter_map(|node| extract_document(node, config)).collect())
}

/// Splits a parsed file into document nodes, accepting a bare document, a
/// bare array, or an object carrying a `documents` array.
fn document_nodes(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(ref map) if map.contains_key("documents") => {
            match map.get("documents").cloned() {
                Some(Value::Array(items)) => items,
                _ => vec![value],
            }
        }
        single => vec![single],
    }
}

/// Splits `text` into lower-cased alphanumeric tokens.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Keyword-overlap relevance score in `0.0..=1.0`: the fraction of query
/// tokens present in the document body, with a small bonus for title hits.
fn score(
    query_tokens: &BTreeSet<String>,
    doc_tokens: &BTreeSet<String>,
    title_tokens: &BTreeSet<String>,
) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let body_hits = query_tokens.intersection(doc_tokens).count();
    let title_hits = query_tokens.intersection(title_tokens).count();
    let base = body_hits as f32 / query_tokens.len() as f32;
    let bonus = 0.1 * (title_hits as f32 / query_tokens.len() as f32);
    (base + bonus).min(1.0)
}
