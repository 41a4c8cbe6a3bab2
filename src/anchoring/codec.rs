//! Anchor building
//!
//! Turns a live selection range into a durable anchor: a linear offset pair
//! plus up to [`CONTEXT_CHARS`] chars of context on either side. Nothing in
//! here mutates the document.

use std::cmp::Ordering;

use crate::annotations::{Annotation, HighlightColor, TextPosition, TextQuote};
use crate::dom::{BoundaryPoint, Document, DomRange, NodeId};

use super::linearize::{linearize, ExclusionPolicy, TextSnapshot};

/// Context window captured on each side of a selection
pub const CONTEXT_CHARS: usize = 40;

/// Offset pair plus quote context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    pub position: Option<TextPosition>,
    pub quote: TextQuote,
}

/// Whether a selection may become a highlight.
///
/// The range must be non-collapsed, live under the content root, and stay
/// clear of every annotation UI root currently in the document.
pub fn is_range_highlightable(doc: &Document, range: &DomRange, policy: &ExclusionPolicy) -> bool {
    if range.is_collapsed() {
        return false;
    }

    let common = range.common_ancestor(doc);
    if !doc.is_connected(common) || !doc.contains(doc.content_root(), common) {
        return false;
    }

    let ancestor = if doc.is_text(common) {
        doc.parent(common)
    } else {
        Some(common)
    };

    for ui_root in policy.ui_roots(doc) {
        if ancestor.map(|a| doc.contains(ui_root, a)).unwrap_or(false) {
            return false;
        }
        if range.intersects_node(doc, ui_root) {
            return false;
        }
    }

    true
}

/// Linear offset of a boundary point within a snapshot.
///
/// Runs wholly before the point contribute their full length; the run that
/// holds the point contributes the in-node offset. Returns `None` when the
/// point cannot be measured (disconnected node, offset past the node end).
pub fn linear_offset(doc: &Document, snapshot: &TextSnapshot, point: BoundaryPoint) -> Option<usize> {
    if !doc.is_connected(point.node) || point.offset > doc.node_length(point.node) {
        return None;
    }

    let mut total = 0;
    for run in snapshot.runs() {
        if run.node == point.node {
            return Some(total + point.offset.min(run.len));
        }

        if !doc.is_connected(run.node) {
            continue;
        }

        let run_start = BoundaryPoint::new(run.node, 0);
        let run_end = BoundaryPoint::new(run.node, run.len);

        if doc.compare_points(point, run_start) == Ordering::Less {
            return Some(total);
        }
        if doc.compare_points(point, run_end) == Ordering::Greater {
            total += run.len;
            continue;
        }
        return Some(total);
    }

    Some(total)
}

/// Build the durable anchor for a range against an existing snapshot
pub fn build_anchor(doc: &Document, snapshot: &TextSnapshot, range: &DomRange) -> Anchor {
    let start = linear_offset(doc, snapshot, range.start);
    let end = linear_offset(doc, snapshot, range.end);

    let Some(position) = start.zip(end).and_then(|(s, e)| TextPosition::new(s, e)) else {
        return Anchor::default();
    };

    let prefix_start = position.start.saturating_sub(CONTEXT_CHARS);
    let suffix_end = (position.end + CONTEXT_CHARS).min(snapshot.char_len());

    Anchor {
        position: Some(position),
        quote: TextQuote {
            prefix: snapshot.slice(prefix_start, position.start).to_string(),
            suffix: snapshot.slice(position.end, suffix_end).to_string(),
        },
    }
}

/// Create an annotation from a selection, or `None` for blank selections
pub fn build_annotation(
    doc: &Document,
    root: NodeId,
    range: &DomRange,
    color: HighlightColor,
    policy: &ExclusionPolicy,
) -> Option<Annotation> {
    let text = range.to_string(doc);
    if text.trim().is_empty() {
        return None;
    }

    let snapshot = linearize(doc, root, policy);
    let anchor = build_anchor(doc, &snapshot, range);
    if anchor.position.is_none() {
        tracing::debug!("Selection has no linear position; relying on text search");
    }

    Some(Annotation::new(&text, color, anchor.position, anchor.quote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn first_text(doc: &Document, needle: &str) -> NodeId {
        doc.descendants(doc.root())
            .find(|&n| doc.text(n).map(|t| t.contains(needle)).unwrap_or(false))
            .unwrap()
    }

    #[test]
    fn test_build_annotation_scenario() {
        let doc = parse_html("<p>The quick brown fox jumps</p>");
        let text = first_text(&doc, "quick");
        let range = DomRange::within(text, 4, 15);

        let annotation = build_annotation(
            &doc,
            doc.content_root(),
            &range,
            HighlightColor::Yellow,
            &ExclusionPolicy::default(),
        )
        .unwrap();

        assert_eq!(annotation.text, "quick brown");
        assert_eq!(annotation.position, Some(TextPosition { start: 4, end: 15 }));
        assert_eq!(annotation.quote.prefix, "The ");
        assert_eq!(annotation.quote.suffix, " fox jumps");
        assert_eq!(annotation.comment, "");
    }

    #[test]
    fn test_offsets_across_inline_markup() {
        let doc = parse_html("<p>The <b>quick</b> brown</p>");
        let policy = ExclusionPolicy::default();
        let snapshot = linearize(&doc, doc.content_root(), &policy);
        let quick = first_text(&doc, "quick");
        let brown = first_text(&doc, "brown");

        let range = DomRange::new(BoundaryPoint::new(quick, 2), BoundaryPoint::new(brown, 3));
        let anchor = build_anchor(&doc, &snapshot, &range);
        assert_eq!(anchor.position, Some(TextPosition { start: 6, end: 12 }));
    }

    #[test]
    fn test_element_boundary_points() {
        let doc = parse_html("<p>The <b>quick</b> brown</p>");
        let snapshot = linearize(&doc, doc.content_root(), &ExclusionPolicy::default());
        let b = doc
            .descendants(doc.root())
            .find(|&n| doc.tag_name(n) == Some("b"))
            .unwrap();
        let p = doc.parent(b).unwrap();

        // (p, 1) sits right before <b>, (p, 2) right after it
        assert_eq!(linear_offset(&doc, &snapshot, BoundaryPoint::new(p, 1)), Some(4));
        assert_eq!(linear_offset(&doc, &snapshot, BoundaryPoint::new(p, 2)), Some(9));
    }

    #[test]
    fn test_context_is_clamped_to_window() {
        let body = format!("{}target{}", "a".repeat(60), "b".repeat(60));
        let doc = parse_html(&format!("<p>{}</p>", body));
        let text = first_text(&doc, "target");
        let snapshot = linearize(&doc, doc.content_root(), &ExclusionPolicy::default());

        let anchor = build_anchor(&doc, &snapshot, &DomRange::within(text, 60, 66));
        assert_eq!(anchor.quote.prefix.chars().count(), CONTEXT_CHARS);
        assert_eq!(anchor.quote.suffix.chars().count(), CONTEXT_CHARS);
    }

    #[test]
    fn test_blank_selection_is_rejected() {
        let doc = parse_html("<p>a    b</p>");
        let text = first_text(&doc, "a");
        let range = DomRange::within(text, 1, 4);

        let annotation = build_annotation(
            &doc,
            doc.content_root(),
            &range,
            HighlightColor::Yellow,
            &ExclusionPolicy::default(),
        );
        assert!(annotation.is_none());
    }

    #[test]
    fn test_selection_inside_toolbar_is_not_highlightable() {
        let doc = parse_html(
            "<p>page text</p><div id=\"annotation-toolbar\"><button>Highlight</button></div>",
        );
        let policy = ExclusionPolicy::default();
        let page = first_text(&doc, "page");
        let button = first_text(&doc, "Highlight");

        assert!(is_range_highlightable(&doc, &DomRange::within(page, 0, 4), &policy));
        assert!(!is_range_highlightable(&doc, &DomRange::within(button, 0, 4), &policy));
        assert!(!is_range_highlightable(
            &doc,
            &DomRange::new(BoundaryPoint::new(page, 0), BoundaryPoint::new(button, 3)),
            &policy
        ));
        assert!(!is_range_highlightable(&doc, &DomRange::within(page, 2, 2), &policy));
    }

    #[test]
    fn test_detached_point_has_no_offset() {
        let mut doc = parse_html("<p>hello</p>");
        let text = first_text(&doc, "hello");
        let snapshot = linearize(&doc, doc.content_root(), &ExclusionPolicy::default());
        doc.detach(text);

        assert_eq!(linear_offset(&doc, &snapshot, BoundaryPoint::new(text, 1)), None);
    }
}
