//! Server-side highlight rendering
//!
//! Takes a page snapshot, paints the annotations stored for its URL and
//! returns the painted HTML with the ids that could and could not be placed.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::anchoring::repaint_all;
use crate::annotations::{url_key, Annotation, MissingId};
use crate::dom::{parse_html, to_html};
use crate::error::Result;
use crate::html::sanitize_html;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/render", post(render))
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub html: String,
    pub painted: Vec<String>,
    pub orphaned: Vec<String>,
}

async fn render(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>> {
    let key = url_key(&request.url);
    let annotations = match state.store().get(&key).await? {
        Some(value) => Annotation::sanitize_list(&value, MissingId::Reject),
        None => Vec::new(),
    };

    let clean = sanitize_html(&request.html)?;
    let mut doc = parse_html(&clean);
    let root = doc.content_root();
    let report = repaint_all(&mut doc, root, &annotations, state.policy(), state.paint_config());

    tracing::info!("Rendered {}: {}", key, report);
    Ok(Json(RenderResponse {
        html: to_html(&doc, doc.root()),
        painted: report.painted,
        orphaned: report.orphaned,
    }))
}
