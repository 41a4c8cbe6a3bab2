//! Arena tree
//!
//! Removing a node only detaches it, so a stale [`NodeId`] held by a
//! snapshot keeps pointing at a readable (but disconnected) node instead of
//! dangling. Splits, merges and unwraps therefore grow the arena; a
//! long-lived document is shrunk back with [`Document::compact`], which
//! renumbers every node.

use std::cmp::Ordering;

use super::range::{BoundaryPoint, DomRange};

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Node payload
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// The document root
    Document,
    /// An element with its lowercase tag name and attributes in source order
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    /// Character data
    Text(String),
    /// Comment (kept for faithful serialization, never linearized)
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// Errors raised by structural mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node {0:?} is not a text node")]
    NotText(NodeId),

    #[error("Offset {offset} is out of range for a node of length {length}")]
    OffsetOutOfRange { offset: usize, length: usize },

    #[error("Node {0:?} is not attached to a parent")]
    Detached(NodeId),

    #[error("Node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Inserting {0:?} would create a cycle")]
    HierarchyRequest(NodeId),
}

/// An arena-allocated document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    selection: Option<DomRange>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the root node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            root: NodeId(0),
            selection: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<body>` element, if the document has one
    pub fn body(&self) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|&id| self.tag_name(id) == Some("body"))
    }

    /// The subtree holding page content: `<body>` when present, the root otherwise
    pub fn content_root(&self) -> NodeId {
        self.body().unwrap_or(self.root)
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    // ---- construction -------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Comment(text.to_string()))
    }

    // ---- accessors ----------------------------------------------------

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.node(id).data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Element { .. })
    }

    /// Character data of a text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|value| value.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Node length as used by boundary points: chars for text, child count otherwise
    pub fn node_length(&self, id: NodeId) -> usize {
        match &self.node(id).data {
            NodeData::Text(text) | NodeData::Comment(text) => text.chars().count(),
            _ => self.node(id).children.len(),
        }
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Concatenated text of every descendant text node
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter_map(|node| self.text(node))
            .collect()
    }

    // ---- attribute mutation -------------------------------------------

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            match attrs.iter_mut().find(|(key, _)| key == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            attrs.retain(|(key, _)| key != name);
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let next = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &next);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(existing) = self.attr(id, "class") else {
            return;
        };
        let next: Vec<&str> = existing
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect();
        let next = next.join(" ");
        self.set_attr(id, "class", &next);
    }

    /// Replace the character data of a text node
    pub fn set_text(&mut self, id: NodeId, value: &str) -> Result<(), DomError> {
        match &mut self.node_mut(id).data {
            NodeData::Text(text) => {
                *text = value.to_string();
                Ok(())
            }
            _ => Err(DomError::NotText(id)),
        }
    }

    // ---- structural mutation ------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (or at the end)
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest(child));
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        self.detach(child);

        let index = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|&c| c == reference)
                .unwrap_or(self.children(parent).len()),
            None => self.children(parent).len(),
        };
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child);
        Ok(())
    }

    /// Put `replacement` where `old` currently sits
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        replacement: NodeId,
        old: NodeId,
    ) -> Result<(), DomError> {
        if self.parent(old) != Some(parent) {
            return Err(DomError::NotAChild { parent, child: old });
        }
        if replacement == old {
            return Ok(());
        }
        self.insert_before(parent, replacement, Some(old))?;
        self.detach(old);
        Ok(())
    }

    /// Unlink a node from its parent; a no-op for parentless nodes
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&c| c != id);
            self.node_mut(id).parent = None;
        }
    }

    /// Split a text node at a char offset, returning the new node holding the tail.
    ///
    /// The tail is inserted right after the original when the node has a parent.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let text = self.text(id).ok_or(DomError::NotText(id))?;
        let length = text.chars().count();
        if offset > length {
            return Err(DomError::OffsetOutOfRange { offset, length });
        }

        let byte = text
            .char_indices()
            .nth(offset)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let tail = text[byte..].to_string();
        let head = text[..byte].to_string();

        self.set_text(id, &head)?;
        let tail_id = self.create_text(&tail);

        if let Some(parent) = self.parent(id) {
            let next = self.index_in_parent(id).map(|i| i + 1).unwrap_or(0);
            self.node_mut(parent).children.insert(next, tail_id);
            self.node_mut(tail_id).parent = Some(parent);
        }

        Ok(tail_id)
    }

    /// Merge adjacent text nodes and drop empty ones throughout a subtree
    pub fn normalize(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());

        for child in children {
            if let Some(text) = self.text(child) {
                if text.is_empty() {
                    self.node_mut(child).parent = None;
                    continue;
                }
                if let Some(&previous) = kept.last() {
                    if let Some(previous_text) = self.text(previous) {
                        let merged = format!("{}{}", previous_text, text);
                        // Both ids are text nodes, so these cannot fail.
                        let _ = self.set_text(previous, &merged);
                        self.node_mut(child).parent = None;
                        continue;
                    }
                }
                kept.push(child);
            } else {
                self.normalize(child);
                kept.push(child);
            }
        }

        self.node_mut(id).children = kept;
    }

    // ---- traversal ----------------------------------------------------

    /// Pre-order traversal of `id` and everything beneath it
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: vec![id],
        }
    }

    /// Inclusive ancestors, starting at `id`
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&node| self.parent(node))
    }

    /// Whether `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether the node is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// Nearest inclusive ancestor element matching `predicate`
    pub fn closest<F>(&self, id: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        self.ancestors(id)
            .find(|&node| self.is_element(node) && predicate(self, node))
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|&node| self.attr(node, "id") == Some(element_id))
    }

    /// Path of child indices from the topmost ancestor down to `id`
    fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path: Vec<usize> = self
            .ancestors(id)
            .filter_map(|node| self.index_in_parent(node))
            .collect();
        path.reverse();
        path
    }

    /// Tree-order comparison; ancestors precede their descendants
    pub fn compare_tree_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        self.path(a).cmp(&self.path(b))
    }

    // ---- compaction ---------------------------------------------------

    /// Number of allocated nodes, detached ones included
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Drop every node unreachable from the root and renumber the rest in
    /// tree order. Returns how many nodes were dropped.
    ///
    /// Every [`NodeId`] obtained before the call is invalid afterwards. The
    /// selection is carried over when both of its endpoints survive.
    pub fn compact(&mut self) -> usize {
        let order: Vec<NodeId> = self.descendants(self.root).collect();
        let dropped = self.nodes.len() - order.len();
        if dropped == 0 {
            return 0;
        }

        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        for (index, old) in order.iter().enumerate() {
            remap[old.0] = Some(NodeId(index));
        }
        let lookup = |id: NodeId| remap[id.0];

        let nodes = order
            .iter()
            .map(|&old| {
                let node = self.node(old);
                Node {
                    parent: node.parent.and_then(lookup),
                    children: node.children.iter().filter_map(|&c| lookup(c)).collect(),
                    data: node.data.clone(),
                }
            })
            .collect();

        let point = |p: BoundaryPoint| lookup(p.node).map(|node| BoundaryPoint::new(node, p.offset));
        self.selection = self
            .selection
            .and_then(|range| Some(DomRange::new(point(range.start)?, point(range.end)?)));

        self.nodes = nodes;
        self.root = NodeId(0);
        dropped
    }

    // ---- selection ----------------------------------------------------

    pub fn selection(&self) -> Option<&DomRange> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, range: DomRange) {
        self.selection = Some(range);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}
