//! Text linearization
//!
//! Walks the content subtree and records every eligible text node in
//! document order. The concatenation of their contents (no separators)
//! defines the single offset space anchors are expressed in.
//!
//! Snapshots own copies of the text they describe. Nothing is cached
//! between calls: the tree can change between building an anchor and
//! resolving it, so each call re-walks the live document.

use crate::dom::{Document, NodeId};

/// Element id of the floating toolbar
pub const TOOLBAR_ID: &str = "annotation-toolbar";
/// Element id of the annotation list panel
pub const ANNOTATION_LIST_PANEL_ID: &str = "annotation-list-panel";
/// Element id of the hover tooltip showing comments
pub const ANNOTATION_COMMENT_TOOLTIP_ID: &str = "annotation-comment-tooltip";

const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "textarea", "input", "select", "option",
];

/// Which subtrees never contribute page text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPolicy {
    /// Element ids owned by the annotation UI
    pub element_ids: Vec<String>,
    /// Non-content element kinds
    pub tags: Vec<String>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            element_ids: [TOOLBAR_ID, ANNOTATION_LIST_PANEL_ID, ANNOTATION_COMMENT_TOOLTIP_ID]
                .iter()
                .map(|id| id.to_string())
                .collect(),
            tags: EXCLUDED_TAGS.iter().map(|tag| tag.to_string()).collect(),
        }
    }
}

impl ExclusionPolicy {
    /// Whether an element is itself an exclusion root
    pub fn matches(&self, doc: &Document, element: NodeId) -> bool {
        if let Some(tag) = doc.tag_name(element) {
            if self.tags.iter().any(|t| t == tag) {
                return true;
            }
        }
        doc.attr(element, "id")
            .map(|id| self.element_ids.iter().any(|e| e == id))
            .unwrap_or(false)
    }

    /// Whether a text node contributes to the linearized text
    pub fn accepts_text(&self, doc: &Document, node: NodeId) -> bool {
        match doc.text(node) {
            Some(text) if !text.is_empty() => {}
            _ => return false,
        }
        let Some(parent) = doc.parent(node) else {
            return false;
        };
        if !doc.is_element(parent) {
            return false;
        }
        doc.closest(parent, |d, el| self.matches(d, el)).is_none()
    }

    /// UI roots (by id) currently present in the document
    pub fn ui_roots(&self, doc: &Document) -> Vec<NodeId> {
        self.element_ids
            .iter()
            .filter_map(|id| doc.get_element_by_id(id))
            .collect()
    }
}

/// One text node's contribution to the linear text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub node: NodeId,
    pub text: String,
    /// Global char offset of the first character
    pub start: usize,
    /// Length in chars
    pub len: usize,
}

impl TextRun {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Ordered text runs plus their concatenation
#[derive(Debug, Clone, Default)]
pub struct TextSnapshot {
    runs: Vec<TextRun>,
    full_text: String,
    /// Byte offset of every char boundary in `full_text`, including the end
    boundaries: Vec<usize>,
}

impl TextSnapshot {
    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Length of the linear text in chars
    pub fn char_len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Chars `[start, end)` of the linear text, clamped to its bounds
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let len = self.char_len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        &self.full_text[self.byte_at(start)..self.byte_at(end)]
    }

    pub(crate) fn byte_at(&self, char_index: usize) -> usize {
        self.boundaries
            .get(char_index)
            .copied()
            .unwrap_or(self.full_text.len())
    }

    pub(crate) fn char_at_byte(&self, byte: usize) -> usize {
        match self.boundaries.binary_search(&byte) {
            Ok(index) => index,
            Err(index) => index,
        }
    }

    fn push(&mut self, node: NodeId, text: &str) {
        let start = self.char_len();
        let base = self.full_text.len();
        if self.boundaries.is_empty() {
            self.boundaries.push(0);
        }
        let mut len = 0;
        for (offset, c) in text.char_indices() {
            self.boundaries.push(base + offset + c.len_utf8());
            len += 1;
        }
        self.full_text.push_str(text);
        self.runs.push(TextRun {
            node,
            text: text.to_string(),
            start,
            len,
        });
    }
}

/// Linearize the subtree under `root`
pub fn linearize(doc: &Document, root: NodeId, policy: &ExclusionPolicy) -> TextSnapshot {
    let mut snapshot = TextSnapshot {
        boundaries: vec![0],
        ..TextSnapshot::default()
    };

    for node in doc.descendants(root) {
        if !policy.accepts_text(doc, node) {
            continue;
        }
        if let Some(text) = doc.text(node) {
            snapshot.push(node, text);
        }
    }

    tracing::trace!(
        runs = snapshot.runs.len(),
        chars = snapshot.char_len(),
        "Linearized document text"
    );
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_linearize_concatenates_in_document_order() {
        let doc = parse_html("<p>The <b>quick</b> brown</p><p>fox</p>");
        let snapshot = linearize(&doc, doc.content_root(), &ExclusionPolicy::default());

        assert_eq!(snapshot.full_text(), "The quick brownfox");
        assert_eq!(snapshot.runs().len(), 4);
        assert_eq!(snapshot.runs()[1].start, 4);
        assert_eq!(snapshot.runs()[1].len, 5);
    }

    #[test]
    fn test_linearize_skips_excluded_subtrees() {
        let doc = parse_html(concat!(
            "<p>keep</p>",
            "<div id=\"annotation-toolbar\"><span>toolbar</span></div>",
            "<script>var x = 1;</script>",
            "<textarea>typed</textarea>",
            "<p>this</p>",
        ));
        let snapshot = linearize(&doc, doc.content_root(), &ExclusionPolicy::default());
        assert_eq!(snapshot.full_text(), "keepthis");
    }

    #[test]
    fn test_linearize_is_deterministic() {
        let doc = parse_html("<p>one <i>two</i> three</p>");
        let policy = ExclusionPolicy::default();
        let a = linearize(&doc, doc.content_root(), &policy);
        let b = linearize(&doc, doc.content_root(), &policy);
        assert_eq!(a.runs(), b.runs());
        assert_eq!(a.full_text(), b.full_text());
    }

    #[test]
    fn test_slice_uses_char_offsets() {
        let doc = parse_html("<p>naïve café</p>");
        let snapshot = linearize(&doc, doc.content_root(), &ExclusionPolicy::default());

        assert_eq!(snapshot.char_len(), 10);
        assert_eq!(snapshot.slice(6, 10), "café");
        assert_eq!(snapshot.slice(6, 99), "café");
        assert_eq!(snapshot.slice(8, 2), "");
    }

    #[test]
    fn test_empty_document() {
        let doc = parse_html("");
        let snapshot = linearize(&doc, doc.content_root(), &ExclusionPolicy::default());
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.char_len(), 0);
        assert_eq!(snapshot.slice(0, 5), "");
    }
}
