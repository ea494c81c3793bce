use std::fmt;

/// Index of a node in its [`Document`] arena.
///
/// Ids are never reused within a document; detaching a node keeps its slot
/// alive so outstanding handles stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload of one DOM node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        name: String,
        /// Attribute pairs in document order.
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

/// A mutable XML document: a node arena plus a designated root element.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    doctype: Option<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document with a root element of the given name.
    pub fn with_root(name: &str) -> (Self, NodeId) {
        let mut doc = Self::new();
        let root = doc.create_element(name);
        doc.set_root(root);
        (doc, root)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element {
            name: name.to_string(),
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, node: NodeId) {
        self.root = Some(node);
    }

    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    pub fn set_doctype(&mut self, doctype: Option<String>) {
        self.doctype = doctype;
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Text(_))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Comment(_))
    }

    /// Element tag name, or `None` for text and comment nodes.
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Character content of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(s) | NodeKind::Comment(s) => Some(s),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        match &mut self.node_mut(id).kind {
            NodeKind::Text(s) | NodeKind::Comment(s) => {
                s.clear();
                s.push_str(text);
            }
            NodeKind::Element { .. } => {}
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.node(id).parent?;
        self.node(parent).children.iter().position(|&c| c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let pos = self.position_in_parent(id)?;
        self.node(parent).children.get(pos + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let pos = self.position_in_parent(id)?;
        if pos == 0 {
            None
        } else {
            self.node(parent).children.get(pos - 1).copied()
        }
    }

    /// Detach `child` from its current parent, if any.
    pub fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.node(child).parent {
            self.node_mut(parent).children.retain(|&c| c != child);
            self.node_mut(child).parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Insert `child` into `parent` immediately before `before`.
    ///
    /// Falls back to appending when `before` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId) {
        self.detach(child);
        let pos = self
            .node(parent)
            .children
            .iter()
            .position(|&c| c == before);
        match pos {
            Some(pos) => self.node_mut(parent).children.insert(pos, child),
            None => self.node_mut(parent).children.push(child),
        }
        self.node_mut(child).parent = Some(parent);
    }

    /// Insert `child` into `parent` immediately after `after`.
    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, after: NodeId) {
        match self.next_sibling(after) {
            Some(next) if next != child => self.insert_before(parent, child, next),
            Some(_) => {}
            None => self.append_child(parent, child),
        }
    }

    // ── Attributes ────────────────────────────────────────────────────────

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Set or replace an attribute. `None` removes it.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: Option<&str>) {
        if let NodeKind::Element { attrs, .. } = &mut self.node_mut(id).kind {
            match value {
                Some(value) => match attrs.iter_mut().find(|(k, _)| k == name) {
                    Some(pair) => pair.1 = value.to_string(),
                    None => attrs.push((name.to_string(), value.to_string())),
                },
                None => attrs.retain(|(k, _)| k != name),
            }
        }
    }

    pub fn attribute_names(&self, id: NodeId) -> Vec<String> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => attrs.iter().map(|(k, _)| k.clone()).collect(),
            _ => Vec::new(),
        }
    }

    // ── Content helpers ───────────────────────────────────────────────────

    /// Concatenated text of all text children of an element.
    ///
    /// Returns `None` when the element has no text child at all, which is
    /// distinct from an empty text child.
    pub fn text_content(&self, id: NodeId) -> Option<String> {
        let mut out: Option<String> = None;
        for &child in self.children(id) {
            if let NodeKind::Text(s) = &self.node(child).kind {
                out.get_or_insert_with(String::new).push_str(s);
            }
        }
        out
    }

    /// Replace the element's text content with a single text child.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        let texts: Vec<NodeId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_text(c))
            .collect();
        match texts.split_first() {
            Some((&first, rest)) => {
                self.set_text(first, text);
                for &extra in rest {
                    self.detach(extra);
                }
            }
            None => {
                let t = self.create_text(text);
                self.append_child(id, t);
            }
        }
    }

    /// Child elements only, in order.
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// True when the node is a text node containing only whitespace.
    pub fn is_whitespace(&self, id: NodeId) -> bool {
        match &self.node(id).kind {
            NodeKind::Text(s) => s.chars().all(char::is_whitespace),
            _ => false,
        }
    }

    /// Deep-copy a subtree out of another document into this one.
    pub fn import_node(&mut self, other: &Document, node: NodeId) -> NodeId {
        let copy = self.push(other.node(node).kind.clone());
        for &child in other.children(node) {
            let c = self.import_node(other, child);
            self.append_child(copy, c);
        }
        copy
    }

    /// Shallow node equivalence across documents: same kind, name and value.
    /// Attributes and children are not considered.
    pub fn shallow_eq(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        match (&self.node(a).kind, &other.node(b).kind) {
            (NodeKind::Element { name: na, .. }, NodeKind::Element { name: nb, .. }) => na == nb,
            (NodeKind::Text(ta), NodeKind::Text(tb)) => ta == tb,
            (NodeKind::Comment(ca), NodeKind::Comment(cb)) => ca == cb,
            _ => false,
        }
    }

    /// Deep subtree equivalence across documents: shallow equivalence plus
    /// equal attributes (order-insensitive) and pairwise-equal non-blank
    /// children.
    pub fn deep_eq(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        if !self.shallow_eq(a, other, b) {
            return false;
        }
        let attrs_a = self.attribute_names(a);
        let attrs_b = other.attribute_names(b);
        if attrs_a.len() != attrs_b.len() {
            return false;
        }
        for name in &attrs_a {
            if self.attribute(a, name) != other.attribute(b, name) {
                return false;
            }
        }
        let kids_a: Vec<NodeId> = self
            .children(a)
            .iter()
            .copied()
            .filter(|&c| !self.is_whitespace(c))
            .collect();
        let kids_b: Vec<NodeId> = other
            .children(b)
            .iter()
            .copied()
            .filter(|&c| !other.is_whitespace(c))
            .collect();
        kids_a.len() == kids_b.len()
            && kids_a
                .iter()
                .zip(&kids_b)
                .all(|(&ca, &cb)| self.deep_eq(ca, other, cb))
    }

    // ── Reindent ──────────────────────────────────────────────────────────

    /// Rebuild whitespace-only text nodes so nested elements print indented.
    ///
    /// Elements with non-whitespace text children are left untouched (mixed
    /// content keeps its exact spacing).
    pub fn reindent(&mut self, indent: &str) {
        if let Some(root) = self.root {
            self.reindent_node(root, indent, 0);
        }
    }

    fn reindent_node(&mut self, id: NodeId, indent: &str, depth: usize) {
        if !self.is_element(id) {
            return;
        }
        let children = self.node(id).children.clone();
        let has_structure = children
            .iter()
            .any(|&c| self.is_element(c) || self.is_comment(c));
        let has_real_text = children
            .iter()
            .any(|&c| self.is_text(c) && !self.is_whitespace(c));

        if has_structure && !has_real_text {
            // Drop old whitespace and weave fresh separators in.
            let kept: Vec<NodeId> = children
                .iter()
                .copied()
                .filter(|&c| !self.is_whitespace(c))
                .collect();
            let inner = format!("\n{}", indent.repeat(depth + 1));
            let closing = format!("\n{}", indent.repeat(depth));
            let mut rebuilt = Vec::with_capacity(kept.len() * 2 + 1);
            for &c in &kept {
                let ws = self.create_text(&inner);
                rebuilt.push(ws);
                rebuilt.push(c);
            }
            if !kept.is_empty() {
                let ws = self.create_text(&closing);
                rebuilt.push(ws);
            }
            for &n in &rebuilt {
                self.node_mut(n).parent = Some(id);
            }
            self.node_mut(id).children = rebuilt;
        }

        for &c in &children {
            self.reindent_node(c, indent, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let (mut doc, root) = Document::with_root("Book");
        let a = doc.create_element("Chapter");
        let b = doc.create_element("Chapter");
        doc.append_child(root, a);
        doc.append_child(root, b);
        (doc, root, a, b)
    }

    #[test]
    fn append_and_sibling_navigation() {
        let (doc, root, a, b) = sample();
        assert_eq!(doc.children(root), &[a, b]);
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.prev_sibling(b), Some(a));
        assert_eq!(doc.parent(a), Some(root));
    }

    #[test]
    fn insert_before_repositions() {
        let (mut doc, root, a, b) = sample();
        let c = doc.create_element("Summary");
        doc.insert_before(root, c, b);
        assert_eq!(doc.children(root), &[a, c, b]);
        // Moving an existing child works too.
        doc.insert_before(root, b, a);
        assert_eq!(doc.children(root), &[b, a, c]);
    }

    #[test]
    fn detach_clears_parent() {
        let (mut doc, root, a, b) = sample();
        doc.detach(a);
        assert_eq!(doc.children(root), &[b]);
        assert_eq!(doc.parent(a), None);
    }

    #[test]
    fn attributes_roundtrip_and_remove() {
        let (mut doc, root, ..) = sample();
        doc.set_attribute(root, "lang", Some("en"));
        assert_eq!(doc.attribute(root, "lang"), Some("en"));
        doc.set_attribute(root, "lang", Some("fr"));
        assert_eq!(doc.attribute(root, "lang"), Some("fr"));
        doc.set_attribute(root, "lang", None);
        assert_eq!(doc.attribute(root, "lang"), None);
    }

    #[test]
    fn text_content_distinguishes_absent_from_empty() {
        let (mut doc, _, a, _) = sample();
        assert_eq!(doc.text_content(a), None);
        doc.set_text_content(a, "");
        assert_eq!(doc.text_content(a), Some(String::new()));
        doc.set_text_content(a, "intro");
        assert_eq!(doc.text_content(a), Some("intro".to_string()));
    }

    #[test]
    fn import_node_deep_copies() {
        let (mut src, _, a, _) = sample();
        src.set_text_content(a, "one");
        let mut dst = Document::new();
        let copy = dst.import_node(&src, a);
        assert_eq!(dst.element_name(copy), Some("Chapter"));
        assert_eq!(dst.text_content(copy), Some("one".to_string()));
    }

    #[test]
    fn deep_eq_checks_attrs_and_children() {
        let (mut src, _, a, _) = sample();
        src.set_text_content(a, "one");
        src.set_attribute(a, "n", Some("1"));
        src.set_attribute(a, "m", Some("2"));

        let mut dst = Document::new();
        let copy = dst.import_node(&src, a);
        assert!(src.deep_eq(a, &dst, copy));

        // Attribute order does not matter, values do.
        dst.set_attribute(copy, "n", None);
        dst.set_attribute(copy, "n", Some("1"));
        assert!(src.deep_eq(a, &dst, copy));
        dst.set_attribute(copy, "m", Some("3"));
        assert!(!src.deep_eq(a, &dst, copy));

        dst.set_attribute(copy, "m", Some("2"));
        dst.set_text_content(copy, "two");
        assert!(!src.deep_eq(a, &dst, copy));
    }

    #[test]
    fn reindent_adds_whitespace_children() {
        let (mut doc, root, a, _) = sample();
        doc.set_text_content(a, "x");
        doc.reindent("  ");
        let kids = doc.children(root);
        assert!(doc.is_whitespace(kids[0]));
        assert_eq!(doc.text(kids[0]), Some("\n  "));
        // Mixed-content element keeps its text untouched.
        assert_eq!(doc.text_content(a), Some("x".to_string()));
    }
}
