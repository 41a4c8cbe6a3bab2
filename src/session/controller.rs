//! Page session controller
//!
//! One [`PageSession`] per active page owns its state: the annotation list
//! for the current URL key, the interaction mode, the current color and the
//! comment drafts. Handlers mutate the list, then persist it before
//! returning, so two rapid actions never interleave their writes.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::anchoring::painter;
use crate::anchoring::{
    build_annotation, is_range_highlightable, normalize_whitespace, repaint_all,
    segments_for_range, ExclusionPolicy, PaintConfig, PaintPlan, RepaintReport,
};
use crate::annotations::{url_key, Annotation, AnnotationStore, HighlightColor, MissingId};
use crate::dom::{Document, DomRange, NodeId};

use super::signals::{InboundSignal, OutboundSignal};

/// How long a jumped-to highlight keeps its focus class
pub const FOCUS_DURATION: Duration = Duration::from_millis(1200);

const PREVIEW_CHARS: usize = 140;

/// Interaction mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Idle,
    Highlight,
    Erase,
}

/// Mouse button that ended a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
    Auxiliary,
}

/// One row of the annotation list panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub id: String,
    pub color: HighlightColor,
    pub preview: String,
    pub comment: String,
    pub created_at: Option<String>,
    /// Whether the comment editor is open for this row
    pub editing: bool,
}

/// State for the page currently open
pub struct PageSession<S: AnnotationStore + ?Sized> {
    store: Arc<S>,
    url_key: String,
    annotations: Vec<Annotation>,
    mode: Mode,
    color: HighlightColor,
    chrome_visible: bool,
    list_visible: bool,
    active_comment_editor: Option<String>,
    comment_drafts: HashMap<String, String>,
    outbound: mpsc::UnboundedSender<OutboundSignal>,
    policy: ExclusionPolicy,
    paint: PaintConfig,
}

impl<S: AnnotationStore + ?Sized> PageSession<S> {
    /// Start a session: load the stored list for `url` and paint it
    pub async fn activate(
        store: Arc<S>,
        url: &str,
        outbound: mpsc::UnboundedSender<OutboundSignal>,
        doc: &mut Document,
    ) -> Self {
        Self::activate_with_config(store, url, outbound, doc, PaintConfig::default()).await
    }

    pub async fn activate_with_config(
        store: Arc<S>,
        url: &str,
        outbound: mpsc::UnboundedSender<OutboundSignal>,
        doc: &mut Document,
        paint: PaintConfig,
    ) -> Self {
        let mut session = Self {
            store,
            url_key: url_key(url),
            annotations: Vec::new(),
            mode: Mode::Idle,
            color: HighlightColor::default(),
            chrome_visible: false,
            list_visible: false,
            active_comment_editor: None,
            comment_drafts: HashMap::new(),
            outbound,
            policy: ExclusionPolicy::default(),
            paint,
        };

        session.load().await;
        session.repaint(doc);
        tracing::info!(
            "Activated session for {} with {} annotation(s)",
            session.url_key,
            session.annotations.len()
        );
        session
    }

    // ---- accessors ----------------------------------------------------

    pub fn url_key(&self) -> &str {
        &self.url_key
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn color(&self) -> HighlightColor {
        self.color
    }

    pub fn is_chrome_visible(&self) -> bool {
        self.chrome_visible
    }

    pub fn is_list_visible(&self) -> bool {
        self.list_visible
    }

    pub fn active_comment_editor(&self) -> Option<&str> {
        self.active_comment_editor.as_deref()
    }

    pub fn comment_draft(&self, annotation_id: &str) -> Option<&str> {
        self.comment_drafts.get(annotation_id).map(String::as_str)
    }

    // ---- storage ------------------------------------------------------

    /// Replace the in-memory list with what is stored for the current key.
    ///
    /// Read failures leave the page with an empty list.
    pub async fn load(&mut self) {
        self.annotations = match self.store.get(&self.url_key).await {
            Ok(Some(value)) => Annotation::sanitize_list(&value, MissingId::Reject),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!("Failed to read annotations from storage: {}", e);
                Vec::new()
            }
        };
    }

    /// Write the in-memory list; an empty list removes the key.
    ///
    /// Failures are logged and the in-memory state is kept, so the next
    /// mutation retries.
    pub async fn persist(&self) {
        let result = if self.annotations.is_empty() {
            self.store.remove(&self.url_key).await
        } else {
            match serde_json::to_value(&self.annotations) {
                Ok(value) => self.store.set(&self.url_key, value).await,
                Err(e) => Err(e.into()),
            }
        };

        if let Err(e) = result {
            tracing::error!("Failed to persist annotations: {}", e);
        }
    }

    /// Strip every wrapper and paint the whole list again
    pub fn repaint(&self, doc: &mut Document) -> RepaintReport {
        let root = doc.content_root();
        repaint_all(doc, root, &self.annotations, &self.policy, &self.paint)
    }

    // ---- handlers -----------------------------------------------------

    pub fn handle_inbound(&mut self, doc: &mut Document, signal: InboundSignal) {
        match signal {
            InboundSignal::TogglePanel => {
                self.chrome_visible = !self.chrome_visible;
                if self.chrome_visible {
                    self.set_mode(Mode::Highlight);
                } else {
                    self.list_visible = false;
                    self.set_mode(Mode::Idle);
                    doc.clear_selection();
                }
            }
        }
    }

    /// Turn the live selection into a painted, persisted annotation.
    ///
    /// Returns the new annotation's id. The selection is cleared whether or
    /// not a highlight was created.
    pub async fn handle_mouse_up(&mut self, doc: &mut Document, button: MouseButton) -> Option<String> {
        if !self.chrome_visible || self.mode != Mode::Highlight || button != MouseButton::Primary {
            return None;
        }

        let range = *doc.selection()?;
        if range.is_collapsed() {
            return None;
        }

        let created = self.highlight_range(doc, &range);
        doc.clear_selection();
        let annotation = created?;

        let id = annotation.id.clone();
        self.annotations.push(annotation);
        self.persist().await;
        Some(id)
    }

    fn highlight_range(&self, doc: &mut Document, range: &DomRange) -> Option<Annotation> {
        if !is_range_highlightable(doc, range, &self.policy) {
            return None;
        }

        let segments = segments_for_range(doc, range, &self.policy);
        if segments.is_empty() {
            return None;
        }

        let root = doc.content_root();
        let annotation = build_annotation(doc, root, range, self.color, &self.policy)?;

        PaintPlan::new(segments)
            .commit(doc, &annotation, &self.paint)
            .is_painted()
            .then_some(annotation)
    }

    /// Erase the annotation under `target` while in erase mode
    pub async fn handle_erase_click(&mut self, doc: &mut Document, target: NodeId) -> Option<String> {
        if !self.chrome_visible || self.mode != Mode::Erase {
            return None;
        }

        let id = painter::annotation_at(doc, target, &self.paint)?;
        painter::unpaint(doc, &id, &self.paint);
        self.annotations.retain(|a| a.id != id);
        if self.active_comment_editor.as_deref() == Some(id.as_str()) {
            self.active_comment_editor = None;
        }
        self.comment_drafts.remove(&id);

        self.persist().await;
        Some(id)
    }

    /// Remove every annotation on the page
    pub async fn erase_all(&mut self, doc: &mut Document) {
        painter::unpaint_all(doc, &self.paint);
        self.annotations.clear();
        self.active_comment_editor = None;
        self.comment_drafts.clear();
        self.persist().await;
    }

    pub fn handle_escape(&mut self, doc: &mut Document) {
        doc.clear_selection();
        if self.chrome_visible {
            self.set_mode(Mode::Idle);
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Toolbar button behavior: pressing the active mode returns to idle
    pub fn toggle_mode(&mut self, mode: Mode) {
        let next = if self.mode == mode { Mode::Idle } else { mode };
        self.set_mode(next);
    }

    /// Pick a palette color, which also arms highlighting
    pub fn set_color(&mut self, color: HighlightColor) {
        self.color = color;
        self.set_mode(Mode::Highlight);
    }

    /// The list panel can only be open while the chrome is visible
    pub fn set_list_visible(&mut self, visible: bool) {
        self.list_visible = visible && self.chrome_visible;
    }

    pub fn toggle_list(&mut self) {
        self.set_list_visible(!self.list_visible);
    }

    // ---- comments -----------------------------------------------------

    pub fn begin_comment_edit(&mut self, annotation_id: &str) {
        self.active_comment_editor = Some(annotation_id.to_string());
        if let Some(annotation) = self.annotations.iter().find(|a| a.id == annotation_id) {
            self.comment_drafts
                .entry(annotation_id.to_string())
                .or_insert_with(|| annotation.comment.clone());
        }
    }

    pub fn update_comment_draft(&mut self, annotation_id: &str, draft: &str) {
        self.comment_drafts
            .insert(annotation_id.to_string(), draft.to_string());
    }

    pub fn cancel_comment_edit(&mut self, annotation_id: &str) {
        if self.active_comment_editor.as_deref() == Some(annotation_id) {
            self.active_comment_editor = None;
        }
        self.comment_drafts.remove(annotation_id);
    }

    /// Save the trimmed draft as the annotation's comment
    pub async fn commit_comment_edit(&mut self, doc: &mut Document, annotation_id: &str) -> bool {
        let Some(index) = self.annotations.iter().position(|a| a.id == annotation_id) else {
            return false;
        };

        let comment = self
            .comment_drafts
            .get(annotation_id)
            .map(|draft| draft.trim().to_string())
            .unwrap_or_default();
        self.annotations[index].comment = comment.clone();

        self.persist().await;
        painter::update_comment(doc, annotation_id, &comment, &self.paint);
        self.active_comment_editor = None;
        self.comment_drafts.remove(annotation_id);
        true
    }

    // ---- list panel ---------------------------------------------------

    /// Jump to an annotation; the caller clears focus after [`FOCUS_DURATION`]
    pub fn focus_annotation(&self, doc: &mut Document, annotation_id: &str) -> Option<NodeId> {
        painter::focus(doc, annotation_id, &self.paint)
    }

    pub fn clear_focus(&self, doc: &mut Document) {
        painter::clear_focus(doc, &self.paint);
    }

    /// Rows for the list panel, newest first; undated annotations go last
    pub fn list_entries(&self) -> Vec<ListEntry> {
        let mut ordered: Vec<&Annotation> = self.annotations.iter().collect();
        ordered.sort_by(|a, b| compare_newest_first(a.created_at.as_deref(), b.created_at.as_deref()));

        ordered
            .into_iter()
            .map(|annotation| ListEntry {
                id: annotation.id.clone(),
                color: annotation.color,
                preview: format_preview(&annotation.text),
                comment: annotation.comment.clone(),
                created_at: annotation.created_at.clone(),
                editing: self.active_comment_editor.as_deref() == Some(annotation.id.as_str()),
            })
            .collect()
    }

    // ---- outbound -----------------------------------------------------

    pub fn open_options(&self) {
        self.send(OutboundSignal::OpenOptions);
    }

    pub fn open_repository(&self) {
        self.send(OutboundSignal::OpenRepository);
    }

    fn send(&self, signal: OutboundSignal) {
        if self.outbound.send(signal).is_err() {
            tracing::debug!("No listener for {}", signal.type_name());
        }
    }

    // ---- lifecycle ----------------------------------------------------

    /// Switch to a new location; reloads only when the URL key changed.
    ///
    /// A reload also compacts the document, so node ids taken before it
    /// are no longer valid.
    pub async fn navigate(&mut self, doc: &mut Document, url: &str) -> bool {
        let next = url_key(url);
        if next == self.url_key {
            return false;
        }

        tracing::info!("Navigated from {} to {}", self.url_key, next);
        self.url_key = next;
        self.annotations.clear();
        self.active_comment_editor = None;
        self.comment_drafts.clear();
        self.load().await;
        self.repaint(doc);
        let dropped = doc.compact();
        tracing::debug!("Compacted document after navigation: {} node(s) dropped", dropped);
        true
    }

    /// End the session, leaving the document without highlights
    pub fn teardown(self, doc: &mut Document) {
        painter::unpaint_all(doc, &self.paint);
        doc.clear_selection();
        doc.compact();
        tracing::debug!("Session for {} torn down", self.url_key);
    }
}

fn compare_newest_first(a: Option<&str>, b: Option<&str>) -> Ordering {
    let parse = |value: Option<&str>| value.and_then(|v| DateTime::parse_from_rfc3339(v).ok());
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Whitespace-normalized text, cut to 140 chars with an ellipsis
pub fn format_preview(text: &str) -> String {
    let clean = normalize_whitespace(text);
    if clean.chars().count() <= PREVIEW_CHARS {
        return clean;
    }
    let cut: String = clean.chars().take(PREVIEW_CHARS - 3).collect();
    format!("{}...", cut)
}
