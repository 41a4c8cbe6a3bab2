//! Per-URL annotation API routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotations::{url_key, Annotation, MissingId};
use crate::error::{AppError, Result};
use crate::interchange::{self, is_safe_storage_key, StoreSummary};
use crate::state::AppState;

/// Create the annotations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_annotations).put(replace_annotations).delete(delete_annotations))
        .route("/summary", get(summary))
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

impl UrlQuery {
    fn key(&self) -> Result<String> {
        let key = url_key(self.url.trim());
        if !is_safe_storage_key(&key) {
            return Err(AppError::BadRequest(format!("Unusable page URL: {:?}", self.url)));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize)]
pub struct AnnotationList {
    pub key: String,
    pub annotations: Vec<Annotation>,
}

/// Stored annotations for one page
async fn list_annotations(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<AnnotationList>> {
    let key = query.key()?;
    let annotations = match state.store().get(&key).await? {
        Some(value) => Annotation::sanitize_list(&value, MissingId::Reject),
        None => Vec::new(),
    };
    Ok(Json(AnnotationList { key, annotations }))
}

/// Overwrite the list for one page; an empty list removes the entry
async fn replace_annotations(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
    Json(body): Json<Value>,
) -> Result<Json<AnnotationList>> {
    let key = query.key()?;
    if !body.is_array() {
        return Err(AppError::BadRequest("Expected a list of annotations".to_string()));
    }

    let annotations = Annotation::sanitize_list(&body, MissingId::Synthesize);
    if annotations.is_empty() {
        state.store().remove(&key).await?;
    } else {
        let value = serde_json::to_value(&annotations)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        state.store().set(&key, value).await?;
    }

    tracing::debug!("Stored {} annotation(s) for {}", annotations.len(), key);
    Ok(Json(AnnotationList { key, annotations }))
}

/// Erase everything stored for one page
async fn delete_annotations(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<StatusCode> {
    let key = query.key()?;
    interchange::remove_url_entry(state.store(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Store-wide counts
async fn summary(State(state): State<AppState>) -> Result<Json<StoreSummary>> {
    Ok(Json(interchange::summarize(state.store()).await?))
}
