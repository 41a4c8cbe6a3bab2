//! Import and export of annotation data
//!
//! The management surface over the store: a versioned export envelope,
//! tolerant import parsing (envelope or a raw storage dump), merge/replace
//! policies and per-URL summaries. All validation runs before the first
//! store write, so a rejected import leaves the store untouched.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotations::{now_iso, Annotation, AnnotationStore, MissingId};
use crate::error::StoreError;

/// Export envelope format tag
pub const EXPORT_FORMAT: &str = "web-annotations-export";
/// Export envelope version
pub const EXPORT_VERSION: u32 = 1;

const BLOCKED_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Annotations grouped by URL key
pub type AnnotationMap = BTreeMap<String, Vec<Annotation>>;

/// Export envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub format: String,
    pub version: u32,
    pub exported_at: String,
    pub annotations_by_url: AnnotationMap,
}

impl ExportPayload {
    pub fn new(annotations_by_url: AnnotationMap) -> Self {
        Self {
            format: EXPORT_FORMAT.to_string(),
            version: EXPORT_VERSION,
            exported_at: now_iso(),
            annotations_by_url,
        }
    }

    pub fn url_count(&self) -> usize {
        self.annotations_by_url.len()
    }

    pub fn annotation_count(&self) -> usize {
        count_annotations(&self.annotations_by_url)
    }
}

/// How imported data combines with what is already stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Overwrite matching records in place, append the rest
    #[default]
    Merge,
    /// Drop every stored annotation first
    Replace,
}

impl FromStr for ImportMode {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(ImportMode::Merge),
            "replace" => Ok(ImportMode::Replace),
            other => Err(ImportError::InvalidMode(other.to_string())),
        }
    }
}

/// Reasons an import is rejected before anything is written
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("JSON must be an object")]
    NotAnObject,

    #[error("No valid annotation data found")]
    NoValidRecords,

    #[error("Invalid import mode: {0}")]
    InvalidMode(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Counts reported after an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub mode: ImportMode,
    pub url_count: usize,
    pub annotation_count: usize,
}

/// One row of the per-URL summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlSummary {
    pub url: String,
    pub count: usize,
}

/// Store-wide counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    pub url_count: usize,
    pub annotation_count: usize,
    /// Ordered by count, highest first
    pub urls: Vec<UrlSummary>,
}

/// Storage keys that may hold annotation lists
pub fn is_safe_storage_key(key: &str) -> bool {
    !key.is_empty() && !BLOCKED_KEYS.contains(&key)
}

/// Sanitize a raw key→list map, dropping unsafe keys, non-list values,
/// invalid records and lists that end up empty
pub fn extract_annotation_map(raw: &serde_json::Map<String, Value>) -> AnnotationMap {
    raw.iter()
        .filter(|(key, value)| is_safe_storage_key(key) && value.is_array())
        .filter_map(|(key, value)| {
            let annotations = Annotation::sanitize_list(value, MissingId::Synthesize);
            (!annotations.is_empty()).then(|| (key.clone(), annotations))
        })
        .collect()
}

/// Parse an import payload: the export envelope or a raw storage dump
pub fn parse_import_payload(parsed: &Value) -> Result<AnnotationMap, ImportError> {
    let object = parsed.as_object().ok_or(ImportError::NotAnObject)?;

    let candidate = match (object.get("format"), object.get("annotationsByUrl")) {
        (Some(Value::String(format)), Some(Value::Object(inner))) if format == EXPORT_FORMAT => inner,
        _ => object,
    };

    let map = extract_annotation_map(candidate);
    if map.is_empty() {
        return Err(ImportError::NoValidRecords);
    }
    Ok(map)
}

/// Parse import text
pub fn parse_import_text(text: &str) -> Result<AnnotationMap, ImportError> {
    let value: Value = serde_json::from_str(text.trim())?;
    parse_import_payload(&value)
}

/// Identity used when merging
pub fn annotation_identity(annotation: &Annotation) -> String {
    if !annotation.id.is_empty() {
        return format!("id:{}", annotation.id);
    }

    let (start, end) = match annotation.position {
        Some(p) => (p.start as i64, p.end as i64),
        None => (-1, -1),
    };
    format!(
        "{}|{}|{}|{}",
        annotation.text,
        start,
        end,
        annotation.created_at.as_deref().unwrap_or_default()
    )
}

/// Merge incoming records into an existing list.
///
/// A record whose identity already exists replaces it in place; new
/// records are appended in incoming order.
pub fn merge_annotations(existing: &[Annotation], incoming: &[Annotation]) -> Vec<Annotation> {
    let mut result: Vec<Annotation> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for annotation in existing.iter().chain(incoming) {
        let key = annotation_identity(annotation);
        match index_by_key.get(&key) {
            Some(&index) => result[index] = annotation.clone(),
            None => {
                index_by_key.insert(key, result.len());
                result.push(annotation.clone());
            }
        }
    }

    result
}

/// Every sanitized annotation list in the store
pub async fn load_all(store: &dyn AnnotationStore) -> Result<AnnotationMap, StoreError> {
    let raw: serde_json::Map<String, Value> = store.get_all().await?.into_iter().collect();
    Ok(extract_annotation_map(&raw))
}

/// Build the export envelope for everything stored
pub async fn export_all(store: &dyn AnnotationStore) -> Result<ExportPayload, StoreError> {
    let payload = ExportPayload::new(load_all(store).await?);
    tracing::info!(
        "Exported {} annotation(s) across {} URL(s)",
        payload.annotation_count(),
        payload.url_count()
    );
    Ok(payload)
}

/// Apply an already validated import
pub async fn import(
    store: &dyn AnnotationStore,
    incoming: AnnotationMap,
    mode: ImportMode,
) -> Result<ImportSummary, StoreError> {
    let summary = ImportSummary {
        mode,
        url_count: incoming.len(),
        annotation_count: count_annotations(&incoming),
    };

    match mode {
        ImportMode::Replace => {
            // Only annotation lists are replaced; other keys stay untouched.
            let stale: Vec<String> = load_all(store)
                .await?
                .into_keys()
                .filter(|key| !incoming.contains_key(key))
                .collect();
            store.replace_entries(to_values(&incoming)?, &stale).await?;
        }
        ImportMode::Merge => {
            let existing = load_all(store).await?;
            let merged: AnnotationMap = incoming
                .iter()
                .map(|(url, list)| {
                    let current = existing.get(url).map(Vec::as_slice).unwrap_or_default();
                    (url.clone(), merge_annotations(current, list))
                })
                .collect();
            if !merged.is_empty() {
                store.set_many(to_values(&merged)?).await?;
            }
        }
    }

    tracing::info!(
        "Imported {} annotation(s) across {} URL(s) ({:?})",
        summary.annotation_count,
        summary.url_count,
        mode
    );
    Ok(summary)
}

/// Per-URL counts, highest first
pub async fn summarize(store: &dyn AnnotationStore) -> Result<StoreSummary, StoreError> {
    let map = load_all(store).await?;

    let mut urls: Vec<UrlSummary> = map
        .iter()
        .map(|(url, list)| UrlSummary {
            url: url.clone(),
            count: list.len(),
        })
        .collect();
    urls.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(StoreSummary {
        url_count: urls.len(),
        annotation_count: count_annotations(&map),
        urls,
    })
}

/// Erase everything stored for one URL key
pub async fn remove_url_entry(store: &dyn AnnotationStore, key: &str) -> Result<(), StoreError> {
    store.remove(key).await?;
    tracing::info!("Removed annotations for {}", key);
    Ok(())
}

/// Download file name for an export taken at `now`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}-{}.json", EXPORT_FORMAT, stamp)
}

fn count_annotations(map: &AnnotationMap) -> usize {
    map.values().map(Vec::len).sum()
}

fn to_values(map: &AnnotationMap) -> Result<BTreeMap<String, Value>, StoreError> {
    map.iter()
        .map(|(key, list)| Ok((key.clone(), serde_json::to_value(list)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{HighlightColor, MemoryStore, TextPosition, TextQuote};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(id: &str, text: &str, comment: &str) -> Value {
        json!({ "id": id, "text": text, "comment": comment, "color": "cyan" })
    }

    #[test]
    fn test_parse_envelope() {
        let payload = json!({
            "format": "web-annotations-export",
            "version": 1,
            "exportedAt": "2024-01-01T00:00:00.000Z",
            "annotationsByUrl": {
                "https://example.com/": [record("a", "hello", "")]
            }
        });

        let map = parse_import_payload(&payload).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["https://example.com/"][0].color, HighlightColor::Cyan);
    }

    #[test]
    fn test_parse_raw_storage_dump_drops_unsafe_keys() {
        let payload = json!({
            "https://example.com/": [record("a", "hello", ""), { "text": "  " }],
            "__proto__": [record("b", "evil", "")],
            "": [record("c", "blank key", "")],
            "settings": { "theme": "dark" }
        });

        let map = parse_import_payload(&payload).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["https://example.com/"]);
        assert_eq!(map["https://example.com/"].len(), 1);
    }

    #[test]
    fn test_parse_rejections() {
        assert!(matches!(parse_import_payload(&json!([1, 2])), Err(ImportError::NotAnObject)));
        assert!(matches!(
            parse_import_payload(&json!({ "k": [{ "id": "x" }] })),
            Err(ImportError::NoValidRecords)
        ));
        assert!(matches!(parse_import_text("{oops"), Err(ImportError::Json(_))));
        assert!(matches!("upsert".parse::<ImportMode>(), Err(ImportError::InvalidMode(_))));
    }

    #[test]
    fn test_missing_ids_are_synthesized() {
        let map = parse_import_payload(&json!({ "k": [{ "text": "hello" }] })).unwrap();
        assert!(map["k"][0].id.starts_with("imp-"));
    }

    #[test]
    fn test_identity_without_id() {
        let mut a = Annotation::new("t", HighlightColor::Yellow, TextPosition::new(1, 3), TextQuote::default());
        a.id.clear();
        a.created_at = None;
        assert_eq!(annotation_identity(&a), "t|1|3|");

        a.position = None;
        a.created_at = Some("2024".to_string());
        assert_eq!(annotation_identity(&a), "t|-1|-1|2024");
    }

    #[test]
    fn test_merge_overwrites_in_place_and_appends() {
        let existing = Annotation::sanitize_list(
            &json!([record("a", "one", ""), record("b", "two", "")]),
            MissingId::Reject,
        );
        let incoming = Annotation::sanitize_list(
            &json!([record("c", "three", ""), record("a", "one", "updated")]),
            MissingId::Reject,
        );

        let merged = merge_annotations(&existing, &incoming);
        let ids: Vec<&str> = merged.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[0].comment, "updated");
    }

    #[test]
    fn test_export_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(
            export_file_name(now),
            "web-annotations-export-2024-03-05T14-07-09-000Z.json"
        );
    }

    #[tokio::test]
    async fn test_merge_import_keeps_single_record_with_later_comment() {
        let store = MemoryStore::new();
        for comment in ["first", "second"] {
            let map = parse_import_payload(&json!({ "u": [record("same", "text", comment)] })).unwrap();
            import(&store, map, ImportMode::Merge).await.unwrap();
        }

        let stored = store.get("u").await.unwrap().unwrap();
        let list = Annotation::sanitize_list(&stored, MissingId::Reject);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].comment, "second");
    }

    #[tokio::test]
    async fn test_merge_leaves_other_keys_alone() {
        let store = MemoryStore::new();
        store.set("keep", json!([record("k", "kept", "")])).await.unwrap();

        let map = parse_import_payload(&json!({ "new": [record("n", "fresh", "")] })).unwrap();
        import(&store, map, ImportMode::Merge).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert!(all.contains_key("keep"));
        assert!(all.contains_key("new"));
    }

    #[tokio::test]
    async fn test_replace_removes_existing_keys() {
        let store = MemoryStore::new();
        store.set("old", json!([record("o", "old", "")])).await.unwrap();

        let map = parse_import_payload(&json!({ "new": [record("n", "fresh", "")] })).unwrap();
        let summary = import(&store, map, ImportMode::Replace).await.unwrap();

        assert_eq!(summary.annotation_count, 1);
        let all = store.get_all().await.unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_replace_keeps_non_annotation_keys() {
        let mut seed = BTreeMap::new();
        seed.insert("settings".to_string(), json!({ "theme": "dark" }));
        seed.insert("old".to_string(), json!([record("o", "old", "")]));
        let store = MemoryStore::with_entries(seed);

        let map = parse_import_payload(&json!({ "new": [record("n", "fresh", "")] })).unwrap();
        import(&store, map, ImportMode::Replace).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["new", "settings"]);
        assert_eq!(all["settings"], json!({ "theme": "dark" }));
    }

    /// Reads succeed, every write fails
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl AnnotationStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            self.0.get(key).await
        }

        async fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.0.remove(key).await
        }

        async fn get_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
            self.0.get_all().await
        }

        async fn set_many(&self, _entries: BTreeMap<String, Value>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }

        async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
            self.0.remove_many(keys).await
        }
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_existing_data() {
        let store = ReadOnlyStore(MemoryStore::new());
        store.0.set("old", json!([record("o", "old", "")])).await.unwrap();

        let map = parse_import_payload(&json!({ "new": [record("n", "fresh", "")] })).unwrap();
        let result = import(&store, map, ImportMode::Replace).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        let all = store.get_all().await.unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["old"]);
    }

    #[tokio::test]
    async fn test_summary_orders_by_count() {
        let store = MemoryStore::new();
        store.set("a", json!([record("1", "x", "")])).await.unwrap();
        store
            .set("b", json!([record("2", "y", ""), record("3", "z", "")]))
            .await
            .unwrap();
        store.set("junk", json!("not a list")).await.unwrap();

        let summary = summarize(&store).await.unwrap();
        assert_eq!(summary.url_count, 2);
        assert_eq!(summary.annotation_count, 3);
        assert_eq!(summary.urls[0].url, "b");

        remove_url_entry(&store, "b").await.unwrap();
        assert_eq!(summarize(&store).await.unwrap().annotation_count, 1);
    }

    #[tokio::test]
    async fn test_export_round_trips_through_import() {
        let store = MemoryStore::new();
        store.set("u", json!([record("a", "hello", "note")])).await.unwrap();

        let payload = export_all(&store).await.unwrap();
        assert_eq!(payload.format, EXPORT_FORMAT);
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("annotationsByUrl").is_some());

        let map = parse_import_payload(&value).unwrap();
        assert_eq!(map["u"][0].comment, "note");
    }
}
