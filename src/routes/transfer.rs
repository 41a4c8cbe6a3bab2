//! Import and export routes

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::interchange::{self, export_file_name, parse_import_payload, ImportMode, ImportSummary};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export", get(export))
        .route("/import", post(import))
}

/// Download everything as an export envelope
async fn export(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let payload = interchange::export_all(state.store()).await?;
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(Utc::now()));

    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(payload)))
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    pub mode: Option<String>,
}

/// Validate a payload fully, then merge or replace
async fn import(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(body): Json<Value>,
) -> Result<Json<ImportSummary>> {
    let mode = match query.mode.as_deref() {
        Some(mode) => mode.parse::<ImportMode>()?,
        None => ImportMode::default(),
    };
    let incoming = parse_import_payload(&body)?;

    let summary = interchange::import(state.store(), incoming, mode).await?;
    Ok(Json(summary))
}
