//! Segment building
//!
//! A span in linear text may cross several text nodes. Segments are the
//! per-node pieces of it, in document order.

use crate::dom::{Document, DomRange, NodeId};

use super::linearize::{ExclusionPolicy, TextSnapshot};

/// Node-local `[start, end)` char window of one text node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Minimal ordered segments covering linear chars `[start, end)`
pub fn segments_for_span(snapshot: &TextSnapshot, start: usize, end: usize) -> Vec<Segment> {
    let mut segments = Vec::new();

    for run in snapshot.runs() {
        if run.end() <= start {
            continue;
        }
        if run.start >= end {
            break;
        }

        let local_start = start.saturating_sub(run.start);
        let local_end = (end - run.start).min(run.len);
        if local_end > local_start {
            segments.push(Segment {
                node: run.node,
                start: local_start,
                end: local_end,
            });
        }
    }

    segments
}

/// Segments of the eligible text nodes touched by a live range
pub fn segments_for_range(doc: &Document, range: &DomRange, policy: &ExclusionPolicy) -> Vec<Segment> {
    let common = range.common_ancestor(doc);
    let root = if doc.is_text(common) {
        match doc.parent(common) {
            Some(parent) => parent,
            None => return Vec::new(),
        }
    } else {
        common
    };

    doc.descendants(root)
        .filter(|&node| policy.accepts_text(doc, node) && range.intersects_node(doc, node))
        .filter_map(|node| {
            let length = doc.node_length(node);
            let start = if node == range.start.node {
                range.start.offset.min(length)
            } else {
                0
            };
            let end = if node == range.end.node {
                range.end.offset.min(length)
            } else {
                length
            };
            (end > start).then_some(Segment { node, start, end })
        })
        .collect()
}
