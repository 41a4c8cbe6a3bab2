//! Highlight painting
//!
//! The only part of the engine that mutates the document. Painting is split
//! in two phases: a [`PaintPlan`] is computed from a snapshot without touching
//! the tree, then [`PaintPlan::commit`] wraps each segment. Segments are
//! committed last-first so splitting one node never shifts the offsets of a
//! segment that is still pending.

use std::fmt;

use crate::annotations::Annotation;
use crate::dom::{Document, DomError, NodeId};

use super::linearize::{linearize, ExclusionPolicy, TextSnapshot};
use super::resolver::{resolve, ResolvedSpan};
use super::segments::{segments_for_span, Segment};

/// Class carried by every highlight wrapper
pub const HIGHLIGHT_CLASS: &str = "web-highlight";
/// Class added while a highlight is being jumped to
pub const HIGHLIGHT_FOCUS_CLASS: &str = "web-highlight-focus";
/// Default background alpha
pub const HIGHLIGHT_BACKGROUND_ALPHA: f32 = 0.5;

/// Configuration for highlight wrappers
#[derive(Debug, Clone, PartialEq)]
pub struct PaintConfig {
    /// Wrapper element tag
    pub tag: String,
    /// CSS class identifying wrappers
    pub class_name: String,
    /// CSS class toggled by focus
    pub focus_class: String,
    /// Data attribute for the annotation id
    pub id_attribute: String,
    /// Data attribute holding the comment shown on hover
    pub comment_attribute: String,
    /// Alpha of the translucent background
    pub alpha: f32,
}

impl Default for PaintConfig {
    fn default() -> Self {
        Self {
            tag: "span".to_string(),
            class_name: HIGHLIGHT_CLASS.to_string(),
            focus_class: HIGHLIGHT_FOCUS_CLASS.to_string(),
            id_attribute: "data-annotation-id".to_string(),
            comment_attribute: "data-comment".to_string(),
            alpha: HIGHLIGHT_BACKGROUND_ALPHA,
        }
    }
}

impl PaintConfig {
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    fn is_wrapper(&self, doc: &Document, node: NodeId) -> bool {
        doc.tag_name(node) == Some(self.tag.as_str()) && doc.has_class(node, &self.class_name)
    }
}

/// Why a single segment could not be wrapped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WrapError {
    #[error("Text node {0:?} is no longer in the document")]
    Detached(NodeId),

    #[error("Segment {start}..{end} does not fit a node of length {length}")]
    OutOfRange {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Segments to wrap for one annotation, computed without touching the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintPlan {
    segments: Vec<Segment>,
}

/// Outcome of committing a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintReport {
    /// Wrappers created, in commit order
    pub wrapped: Vec<NodeId>,
    /// Segments that could not be wrapped
    pub failed: usize,
}

impl PaintReport {
    /// A paint counts as applied when at least one segment was wrapped
    pub fn is_painted(&self) -> bool {
        !self.wrapped.is_empty()
    }
}

impl PaintPlan {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Plan the segments covering a resolved span
    pub fn for_span(snapshot: &TextSnapshot, span: &ResolvedSpan) -> Self {
        Self::new(segments_for_span(snapshot, span.start, span.end))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Wrap every planned segment, last first
    pub fn commit(
        &self,
        doc: &mut Document,
        annotation: &Annotation,
        config: &PaintConfig,
    ) -> PaintReport {
        let mut report = PaintReport::default();

        for segment in self.segments.iter().rev() {
            match wrap_segment(doc, segment, annotation, config) {
                Ok(wrapper) => report.wrapped.push(wrapper),
                Err(e) => {
                    tracing::warn!(id = %annotation.id, "Failed to wrap highlight segment: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Isolate a segment's text in its own node and wrap it
pub fn wrap_segment(
    doc: &mut Document,
    segment: &Segment,
    annotation: &Annotation,
    config: &PaintConfig,
) -> Result<NodeId, WrapError> {
    let node = segment.node;
    let parent = doc.parent(node).ok_or(WrapError::Detached(node))?;
    if !doc.is_connected(node) {
        return Err(WrapError::Detached(node));
    }
    if !doc.is_text(node) {
        return Err(DomError::NotText(node).into());
    }

    let length = doc.node_length(node);
    if segment.is_empty() || segment.end > length {
        return Err(WrapError::OutOfRange {
            start: segment.start,
            end: segment.end,
            length,
        });
    }

    let selected = doc.split_text(node, segment.start)?;
    doc.split_text(selected, segment.len())?;

    let wrapper = doc.create_element(&config.tag);
    doc.set_attr(wrapper, "class", &config.class_name);
    doc.set_attr(wrapper, &config.id_attribute, &annotation.id);
    doc.set_attr(
        wrapper,
        "style",
        &format!("background-color: {}", annotation.color.background(config.alpha)),
    );
    apply_comment(doc, wrapper, &annotation.comment, config);

    doc.replace_child(parent, wrapper, selected)?;
    doc.append_child(wrapper, selected)?;
    Ok(wrapper)
}

fn apply_comment(doc: &mut Document, wrapper: NodeId, comment: &str, config: &PaintConfig) {
    let comment = comment.trim();
    if comment.is_empty() {
        doc.remove_attr(wrapper, &config.comment_attribute);
    } else {
        doc.set_attr(wrapper, &config.comment_attribute, comment);
    }
}

/// Resolve and paint one annotation against the current document state
pub fn paint_annotation(
    doc: &mut Document,
    root: NodeId,
    annotation: &Annotation,
    policy: &ExclusionPolicy,
    config: &PaintConfig,
) -> Option<ResolvedSpan> {
    let snapshot = linearize(doc, root, policy);
    let span = resolve(annotation, &snapshot)?;

    let plan = PaintPlan::for_span(&snapshot, &span);
    if plan.is_empty() {
        return None;
    }

    plan.commit(doc, annotation, config)
        .is_painted()
        .then_some(span)
}

/// Wrappers in document order, optionally limited to one annotation
pub fn wrappers(doc: &Document, annotation_id: Option<&str>, config: &PaintConfig) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .filter(|&node| config.is_wrapper(doc, node))
        .filter(|&node| match annotation_id {
            Some(id) => doc.attr(node, &config.id_attribute) == Some(id),
            None => true,
        })
        .collect()
}

/// Annotation id of the wrapper enclosing `node`, if any
pub fn annotation_at(doc: &Document, node: NodeId, config: &PaintConfig) -> Option<String> {
    let wrapper = doc.closest(node, |d, el| config.is_wrapper(d, el))?;
    doc.attr(wrapper, &config.id_attribute)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn unwrap(doc: &mut Document, wrapper: NodeId) -> Result<(), DomError> {
    let Some(parent) = doc.parent(wrapper) else {
        return Ok(());
    };

    for child in doc.children(wrapper).to_vec() {
        doc.insert_before(parent, child, Some(wrapper))?;
    }
    doc.remove_child(parent, wrapper)?;
    doc.normalize(parent);
    Ok(())
}

fn unwrap_all(doc: &mut Document, targets: Vec<NodeId>) -> usize {
    let mut removed = 0;
    for wrapper in targets {
        match unwrap(doc, wrapper) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to unwrap highlight: {}", e),
        }
    }
    removed
}

/// Remove every wrapper belonging to one annotation; returns how many were removed
pub fn unpaint(doc: &mut Document, annotation_id: &str, config: &PaintConfig) -> usize {
    let targets = wrappers(doc, Some(annotation_id), config);
    unwrap_all(doc, targets)
}

/// Strip every highlight wrapper from the document
pub fn unpaint_all(doc: &mut Document, config: &PaintConfig) -> usize {
    let targets = wrappers(doc, None, config);
    unwrap_all(doc, targets)
}

/// Outcome of a full repaint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepaintReport {
    pub painted: Vec<String>,
    pub orphaned: Vec<String>,
}

impl fmt::Display for RepaintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} painted, {} orphaned", self.painted.len(), self.orphaned.len())
    }
}

/// Reset to the unannotated baseline, then paint every annotation.
///
/// Annotations are painted in descending stored start offset; ties keep
/// their list order.
pub fn repaint_all(
    doc: &mut Document,
    root: NodeId,
    annotations: &[Annotation],
    policy: &ExclusionPolicy,
    config: &PaintConfig,
) -> RepaintReport {
    unpaint_all(doc, config);

    let mut ordered: Vec<&Annotation> = annotations.iter().collect();
    ordered.sort_by(|a, b| b.sort_offset().cmp(&a.sort_offset()));

    let mut report = RepaintReport::default();
    for annotation in ordered {
        match paint_annotation(doc, root, annotation, policy, config) {
            Some(_) => report.painted.push(annotation.id.clone()),
            None => report.orphaned.push(annotation.id.clone()),
        }
    }

    tracing::debug!("Repainted annotations: {}", report);
    report
}

/// Refresh the hover comment on every wrapper of an annotation
pub fn update_comment(doc: &mut Document, annotation_id: &str, comment: &str, config: &PaintConfig) {
    for wrapper in wrappers(doc, Some(annotation_id), config) {
        apply_comment(doc, wrapper, comment, config);
    }
}

/// Mark one annotation's wrappers as focused, clearing any previous focus.
///
/// Returns the first wrapper (the one to scroll to), or `None` when the
/// annotation is not painted.
pub fn focus(doc: &mut Document, annotation_id: &str, config: &PaintConfig) -> Option<NodeId> {
    let targets = wrappers(doc, Some(annotation_id), config);
    if targets.is_empty() {
        return None;
    }

    clear_focus(doc, config);
    for &wrapper in &targets {
        doc.add_class(wrapper, &config.focus_class);
    }
    targets.first().copied()
}

pub fn clear_focus(doc: &mut Document, config: &PaintConfig) {
    for wrapper in wrappers(doc, None, config) {
        if doc.has_class(wrapper, &config.focus_class) {
            doc.remove_class(wrapper, &config.focus_class);
        }
    }
}
