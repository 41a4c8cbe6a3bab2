//! Boundary points and ranges
//!
//! Point ordering follows the DOM Standard's "position of a boundary point"
//! algorithm, so a point expressed against an element (`(parent, child index)`)
//! and one expressed inside a text node compare the way a browser would.

use std::cmp::Ordering;

use super::tree::{Document, NodeId};

/// A position in the tree: a node plus an offset (chars for text, child index otherwise)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A live selection range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
}

impl DomRange {
    pub fn new(start: BoundaryPoint, end: BoundaryPoint) -> Self {
        Self { start, end }
    }

    /// Range spanning `start..end` chars of a single text node
    pub fn within(node: NodeId, start: usize, end: usize) -> Self {
        Self::new(BoundaryPoint::new(node, start), BoundaryPoint::new(node, end))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Deepest node containing both boundary points
    pub fn common_ancestor(&self, doc: &Document) -> NodeId {
        doc.ancestors(self.start.node)
            .find(|&candidate| doc.contains(candidate, self.end.node))
            .unwrap_or_else(|| doc.root())
    }

    /// Whether any part of `node` lies inside the range
    pub fn intersects_node(&self, doc: &Document, node: NodeId) -> bool {
        let Some(parent) = doc.parent(node) else {
            return true;
        };
        let Some(index) = doc.index_in_parent(node) else {
            return false;
        };

        let before = BoundaryPoint::new(parent, index);
        let after = BoundaryPoint::new(parent, index + 1);
        doc.compare_points(before, self.end) == Ordering::Less
            && doc.compare_points(after, self.start) == Ordering::Greater
    }

    /// Char window `[from, to)` of a text node covered by this range, if any
    pub fn text_window(&self, doc: &Document, node: NodeId) -> Option<(usize, usize)> {
        let length = doc.text(node)?.chars().count();
        let node_start = BoundaryPoint::new(node, 0);
        let node_end = BoundaryPoint::new(node, length);

        if doc.compare_points(node_end, self.start) == Ordering::Less
            || doc.compare_points(node_start, self.end) == Ordering::Greater
        {
            return None;
        }

        let from = if node == self.start.node {
            self.start.offset.min(length)
        } else {
            0
        };
        let to = if node == self.end.node {
            self.end.offset.min(length)
        } else {
            length
        };
        Some((from, to.max(from)))
    }

    /// The selected text, as `Range.toString()` reports it
    pub fn to_string(&self, doc: &Document) -> String {
        let root = self.common_ancestor(doc);
        let mut out = String::new();
        for node in doc.descendants(root) {
            let Some((from, to)) = self.text_window(doc, node) else {
                continue;
            };
            if let Some(text) = doc.text(node) {
                out.extend(text.chars().skip(from).take(to - from));
            }
        }
        out
    }
}

impl Document {
    /// Order two boundary points
    pub fn compare_points(&self, a: BoundaryPoint, b: BoundaryPoint) -> Ordering {
        if a.node == b.node {
            return a.offset.cmp(&b.offset);
        }

        if self.compare_tree_order(a.node, b.node) == Ordering::Greater {
            return self.compare_points(b, a).reverse();
        }

        if self.contains(a.node, b.node) {
            let child = self
                .ancestors(b.node)
                .find(|&n| self.parent(n) == Some(a.node));
            if let Some(index) = child.and_then(|c| self.index_in_parent(c)) {
                if index < a.offset {
                    return Ordering::Greater;
                }
            }
        }

        Ordering::Less
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `<p>The <b>quick</b> fox</p>`
    fn sample() -> (Document, NodeId, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let t1 = doc.create_text("The ");
        let b = doc.create_element("b");
        let t2 = doc.create_text("quick");
        let t3 = doc.create_text(" fox");
        doc.append_child(doc.root(), p).unwrap();
        doc.append_child(p, t1).unwrap();
        doc.append_child(p, b).unwrap();
        doc.append_child(b, t2).unwrap();
        doc.append_child(p, t3).unwrap();
        (doc, p, t1, t2, t3)
    }

    #[test]
    fn test_compare_points_same_node() {
        let (doc, _, t1, _, _) = sample();
        let a = BoundaryPoint::new(t1, 1);
        let b = BoundaryPoint::new(t1, 3);
        assert_eq!(doc.compare_points(a, b), Ordering::Less);
        assert_eq!(doc.compare_points(b, a), Ordering::Greater);
    }

    #[test]
    fn test_compare_points_element_offsets() {
        let (doc, p, t1, t2, _) = sample();
        // (p, 1) sits between "The " and <b>
        let between = BoundaryPoint::new(p, 1);
        assert_eq!(
            doc.compare_points(between, BoundaryPoint::new(t1, 4)),
            Ordering::Greater
        );
        assert_eq!(
            doc.compare_points(between, BoundaryPoint::new(t2, 0)),
            Ordering::Less
        );
    }

    #[test]
    fn test_to_string_across_nodes() {
        let (doc, _, t1, _, t3) = sample();
        let range = DomRange::new(BoundaryPoint::new(t1, 1), BoundaryPoint::new(t3, 2));
        assert_eq!(range.to_string(&doc), "he quick f");
    }

    #[test]
    fn test_to_string_with_element_boundaries() {
        let (doc, p, _, _, _) = sample();
        let range = DomRange::new(BoundaryPoint::new(p, 1), BoundaryPoint::new(p, 2));
        assert_eq!(range.to_string(&doc), "quick");
    }

    #[test]
    fn test_intersects_node() {
        let (doc, _, t1, t2, t3) = sample();
        let range = DomRange::within(t2, 1, 3);
        assert!(range.intersects_node(&doc, t2));
        assert!(!range.intersects_node(&doc, t1));
        assert!(!range.intersects_node(&doc, t3));
    }

    #[test]
    fn test_common_ancestor() {
        let (doc, p, t1, t2, _) = sample();
        let range = DomRange::new(BoundaryPoint::new(t1, 0), BoundaryPoint::new(t2, 2));
        assert_eq!(range.common_ancestor(&doc), p);
        assert!(!range.is_collapsed());
    }
}
