//! The slice of the DOM the keep-alive cache and the component registry
//! need, behind a trait so that both can run against a real document in
//! the browser as well as against [`MemoryDom`] on the server and in
//! tests.
use std::{cell::RefCell, fmt, rc::Rc};

/// A document able to create, move and remove nodes.
///
/// Node handles are cheap clones referring to the same underlying node;
/// equality is node identity.
pub trait Dom: Clone + 'static {
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    fn create_element(&self, tag: &str) -> Self::Node;
    fn body(&self) -> Option<Self::Node>;
    /// Append `child` as the last child of `parent`, moving it from
    /// wherever it currently is.
    fn append_child(&self, parent: &Self::Node, child: &Self::Node);
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    /// Detach `node` (and its subtree) from the document.
    fn remove(&self, node: &Self::Node);
    fn tag_name(&self, node: &Self::Node) -> String;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);
    fn set_text(&self, node: &Self::Node, text: &str);
    /// Attach an open shadow root to `host`; `None` if that is refused.
    fn attach_shadow(&self, host: &Self::Node) -> Option<Self::Node>;
    fn shadow_root(&self, host: &Self::Node) -> Option<Self::Node>;
    /// Run `listener` whenever `node` is clicked, for as long as the
    /// document lives.
    fn on_click(&self, node: &Self::Node, listener: Rc<dyn Fn()>);
}

/// Identity of a node inside a [`MemoryDom`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// An in-process document.
///
/// It starts with a `<body>` and nothing else.  Clones share the same
/// document.
#[derive(Clone)]
pub struct MemoryDom {
    arena: Rc<RefCell<Arena>>,
}

struct Arena {
    nodes: Vec<NodeData>,
    body: NodeId,
}

#[derive(Default)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    shadow: Option<NodeId>,
    listeners: Vec<Rc<dyn Fn()>>,
}

impl Arena {
    fn insert(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            tag: tag.to_string(),
            ..Default::default()
        });
        id
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node.0].parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let mut arena = Arena {
            nodes: Vec::new(),
            body: NodeId(0),
        };
        arena.body = arena.insert("body");
        Self {
            arena: Rc::new(RefCell::new(arena)),
        }
    }

    pub fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.arena.borrow().nodes[node.0].children.clone()
    }

    pub fn text(&self, node: &NodeId) -> String {
        self.arena.borrow().nodes[node.0].text.clone()
    }

    /// Whether `node` is `ancestor` or lives somewhere below it.
    pub fn contains(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        self.arena.borrow().is_inclusive_ancestor(*ancestor, *node)
    }

    /// Whether `node` is reachable from `<body>`.
    pub fn is_connected(&self, node: &NodeId) -> bool {
        let arena = self.arena.borrow();
        arena.is_inclusive_ancestor(arena.body, *node)
    }

    pub fn node_count(&self) -> usize {
        self.arena.borrow().nodes.len()
    }

    /// Dispatch a click on `node`, returning the number of listeners run.
    pub fn click(&self, node: &NodeId) -> usize {
        // listeners are free to change the document
        let listeners = self.arena.borrow().nodes[node.0].listeners.clone();
        for listener in &listeners {
            (**listener)();
        }
        listeners.len()
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn create_element(&self, tag: &str) -> NodeId {
        self.arena.borrow_mut().insert(tag)
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.arena.borrow().body)
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) {
        let mut arena = self.arena.borrow_mut();
        // the DOM refuses to create a cycle
        if arena.is_inclusive_ancestor(*child, *parent) {
            return;
        }
        arena.detach(*child);
        arena.nodes[parent.0].children.push(*child);
        arena.nodes[child.0].parent = Some(*parent);
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes[node.0].parent
    }

    fn remove(&self, node: &NodeId) {
        self.arena.borrow_mut().detach(*node);
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.arena.borrow().nodes[node.0].tag.clone()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.arena.borrow().nodes[node.0]
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) {
        let mut arena = self.arena.borrow_mut();
        let attributes = &mut arena.nodes[node.0].attributes;
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn set_text(&self, node: &NodeId, text: &str) {
        self.arena.borrow_mut().nodes[node.0].text = text.to_string();
    }

    fn attach_shadow(&self, host: &NodeId) -> Option<NodeId> {
        let mut arena = self.arena.borrow_mut();
        if arena.nodes[host.0].shadow.is_some() {
            return None;
        }
        let shadow = arena.insert("#shadow-root");
        arena.nodes[host.0].shadow = Some(shadow);
        Some(shadow)
    }

    fn shadow_root(&self, host: &NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes[host.0].shadow
    }

    fn on_click(&self, node: &NodeId, listener: Rc<dyn Fn()>) {
        self.arena.borrow_mut().nodes[node.0].listeners.push(listener);
    }
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDom")
            .field("nodes", &self.node_count())
            .finish()
    }
}
