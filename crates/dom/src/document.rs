use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Index of a node inside its [`Document`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element { name: String, attributes: Vec<(String, String)> },
    Text(String),
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

#[derive(Debug)]
pub(crate) struct Arena {
    pub(crate) nodes: Vec<NodeData>,
}

impl Arena {
    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData { kind, parent: Some(parent), children: Vec::new() });
        self.nodes[parent.0].children.push(id);
        id
    }
}

/// Shared handle to an output tree.
///
/// Clones refer to the same tree; equality is identity.
#[derive(Clone)]
pub struct Document {
    inner: Arc<RwLock<Arena>>,
}

impl Document {
    pub fn new() -> Self {
        let root = NodeData { kind: NodeKind::Document, parent: None, children: Vec::new() };
        Self { inner: Arc::new(RwLock::new(Arena { nodes: vec![root] })) }
    }

    /// The document node. It has no name and no parent.
    pub fn root(&self) -> NodeRef {
        NodeRef { document: self.clone(), id: NodeId(0) }
    }

    /// First element child of the document node.
    pub fn document_element(&self) -> Option<NodeRef> {
        self.root().children().into_iter().find(NodeRef::is_element)
    }

    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Arena> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document").field("nodes", &self.node_count()).finish()
    }
}

/// Cursor into a [`Document`].
#[derive(Clone, PartialEq, Eq)]
pub struct NodeRef {
    document: Document,
    id: NodeId,
}

impl NodeRef {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.document.read().nodes[self.id.0].kind.clone()
    }

    pub fn is_element(&self) -> bool {
        matches!(self.document.read().nodes[self.id.0].kind, NodeKind::Element { .. })
    }

    /// Element name; `None` for the document node and text nodes.
    pub fn name(&self) -> Option<String> {
        match &self.document.read().nodes[self.id.0].kind {
            NodeKind::Element { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        let parent = self.document.read().nodes[self.id.0].parent?;
        Some(self.at(parent))
    }

    pub fn children(&self) -> Vec<NodeRef> {
        let ids = self.document.read().nodes[self.id.0].children.clone();
        ids.into_iter().map(|id| self.at(id)).collect()
    }

    /// First element child called `name`.
    pub fn child_element(&self, name: &str) -> Option<NodeRef> {
        self.children().into_iter().find(|child| child.name().as_deref() == Some(name))
    }

    /// Creates a new element as last child and returns a cursor to it.
    pub fn append_element(&self, name: &str) -> NodeRef {
        let kind = NodeKind::Element { name: name.to_owned(), attributes: Vec::new() };
        let id = self.document.write().push(self.id, kind);
        self.at(id)
    }

    pub fn append_text(&self, text: &str) -> NodeRef {
        let id = self.document.write().push(self.id, NodeKind::Text(text.to_owned()));
        self.at(id)
    }

    /// Deep-copies `source` (which may live in another document) as last child.
    pub fn append_copy(&self, source: &NodeRef) -> NodeRef {
        // preorder; the parent index points into `copied`
        let copied: Vec<(NodeKind, Option<usize>)> = {
            let arena = source.document.read();
            let mut copied = Vec::new();
            let mut stack = vec![(source.id, None)];
            while let Some((id, parent)) = stack.pop() {
                let node = &arena.nodes[id.0];
                let index = copied.len();
                copied.push((node.kind.clone(), parent));
                stack.extend(node.children.iter().rev().map(|child| (*child, Some(index))));
            }
            copied
        };

        let mut arena = self.document.write();
        let mut ids: Vec<NodeId> = Vec::with_capacity(copied.len());
        for (kind, parent) in copied {
            let parent = parent.map_or(self.id, |index| ids[index]);
            ids.push(arena.push(parent, kind));
        }
        drop(arena);
        self.at(ids.first().copied().unwrap_or(self.id))
    }

    /// Sets (or replaces) an attribute. Ignored on non-element nodes.
    pub fn set_attribute(&self, key: &str, value: &str) {
        let mut arena = self.document.write();
        if let NodeKind::Element { attributes, .. } = &mut arena.nodes[self.id.0].kind {
            match attributes.iter_mut().find(|(existing, _)| existing == key) {
                Some(entry) => entry.1 = value.to_owned(),
                None => attributes.push((key.to_owned(), value.to_owned())),
            }
        }
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        match &self.document.read().nodes[self.id.0].kind {
            NodeKind::Element { attributes, .. } => {
                attributes.iter().find(|(existing, _)| existing == key).map(|(_, v)| v.clone())
            }
            _ => None,
        }
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        match &self.document.read().nodes[self.id.0].kind {
            NodeKind::Element { attributes, .. } => attributes.clone(),
            _ => Vec::new(),
        }
    }

    /// Concatenated text of all descendant text nodes, in document order.
    pub fn text_content(&self) -> String {
        fn collect(arena: &Arena, id: NodeId, out: &mut String) {
            let node = &arena.nodes[id.0];
            if let NodeKind::Text(text) = &node.kind {
                out.push_str(text);
            }
            for child in &node.children {
                collect(arena, *child, out);
            }
        }
        let arena = self.document.read();
        let mut out = String::new();
        collect(&arena, self.id, &mut out);
        out
    }

    /// Appends to this node's text if it is a text node.
    pub(crate) fn merge_text(&self, text: &str) -> bool {
        let mut arena = self.document.write();
        match &mut arena.nodes[self.id.0].kind {
            NodeKind::Text(existing) => {
                existing.push_str(text);
                true
            }
            _ => false,
        }
    }

    fn at(&self, id: NodeId) -> NodeRef {
        NodeRef { document: self.document.clone(), id }
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef").field("id", &self.id.0).field("kind", &self.kind()).finish()
    }
}
