//! Arena-backed document tree with structural-change notifications.
//!
//! This is the core's view of the rendering host's document: a tree of
//! element, text and image nodes. Mutating operations that insert nodes emit
//! a [`MutationBatch`] to every subscriber, which is how the mutation watcher
//! learns about new content. Attribute writes are not reported; markers set
//! by the redaction engine therefore never feed back as changes by
//! themselves, while the nodes it inserts do.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Identifier of a node within one document. Never reused.
pub type NodeId = usize;

/// Attributes describing an image node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttrs {
    /// Resolved source locator.
    pub src: String,
    /// Rendered width in pixels.
    pub width: u32,
    /// Rendered height in pixels.
    pub height: u32,
    /// Alternative text, possibly empty.
    pub alt: String,
}

impl ImageAttrs {
    /// Creates image attributes with an empty alt text.
    pub fn new(src: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            src: src.into(),
            width,
            height,
            alt: String::new(),
        }
    }

    /// Sets the alt text.
    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }
}

/// The payload of a document node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Container element with a tag name.
    Element { tag: String },
    /// Run of visible text.
    Text { content: String },
    /// Image reference.
    Image { attrs: ImageAttrs },
}

/// One batch of structural changes: the roots of newly inserted subtrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationBatch {
    /// Topmost inserted node per insertion, in insertion order.
    pub added: Vec<NodeId>,
}

/// A detached subtree, built up before attaching to a document.
///
/// Attaching a fragment emits a single change batch whose only root is the
/// fragment's own root, no matter how many descendants it carries.
#[derive(Debug, Clone)]
pub struct Fragment {
    kind: NodeKind,
    attrs: BTreeMap<String, String>,
    children: Vec<Fragment>,
}

impl Fragment {
    /// An element fragment with the given tag.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element { tag: tag.into() },
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// A text fragment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text {
                content: content.into(),
            },
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// An image fragment.
    pub fn image(attrs: ImageAttrs) -> Self {
        Self {
            kind: NodeKind::Image { attrs },
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Sets an attribute on the fragment root.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Appends a child fragment.
    pub fn child(mut self, child: Fragment) -> Self {
        self.children.push(child);
        self
    }
}

struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    attrs: BTreeMap<String, String>,
}

struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn alloc(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
            attrs: BTreeMap::new(),
        });
        id
    }

    /// Depth-first preorder walk of `root` and its descendants.
    fn walk(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.nodes[id].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    fn attach_fragment(&mut self, parent: NodeId, fragment: Fragment) -> NodeId {
        let id = self.alloc(Some(parent), fragment.kind);
        self.nodes[id].attrs = fragment.attrs;
        self.nodes[parent].children.push(id);
        for child in fragment.children {
            self.attach_fragment(id, child);
        }
        id
    }
}

/// A live, concurrently-mutable document tree.
///
/// All methods take `&self`; the tree is guarded internally so the scanner,
/// watcher and redaction engine can share one handle.
pub struct Document {
    tree: RwLock<Tree>,
    watchers: Mutex<Vec<UnboundedSender<MutationBatch>>>,
}

impl Document {
    /// Creates a document holding only a `body` root element.
    pub fn new() -> Self {
        let mut tree = Tree { nodes: Vec::new() };
        tree.alloc(
            None,
            NodeKind::Element {
                tag: "body".to_string(),
            },
        );
        Self {
            tree: RwLock::new(tree),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        0
    }

    /// Subscribes to structural-change batches.
    ///
    /// Dropping the receiver unsubscribes; the sender side is pruned on the
    /// next notification.
    pub fn subscribe(&self) -> UnboundedReceiver<MutationBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().push(tx);
        rx
    }

    fn notify(&self, batch: MutationBatch) {
        let mut watchers = self.watchers.lock();
        watchers.retain(|tx| tx.send(batch.clone()).is_ok());
    }

    /// Attaches a detached fragment under `parent`, reporting one new root.
    pub fn attach(&self, parent: NodeId, fragment: Fragment) -> NodeId {
        let id = self.tree.write().attach_fragment(parent, fragment);
        self.notify(MutationBatch { added: vec![id] });
        id
    }

    /// Appends an element child, reporting it as a new root.
    pub fn append_element(&self, parent: NodeId, tag: impl Into<String>) -> NodeId {
        self.attach(parent, Fragment::element(tag))
    }

    /// Appends a text child, reporting it as a new root.
    pub fn append_text(&self, parent: NodeId, content: impl Into<String>) -> NodeId {
        self.attach(parent, Fragment::text(content))
    }

    /// Appends an image child, reporting it as a new root.
    pub fn append_image(&self, parent: NodeId, attrs: ImageAttrs) -> NodeId {
        self.attach(parent, Fragment::image(attrs))
    }

    /// Reads an attribute.
    pub fn attr(&self, node: NodeId, key: &str) -> Option<String> {
        self.tree.read().nodes.get(node)?.attrs.get(key).cloned()
    }

    /// Writes an attribute. Attribute writes do not produce change batches.
    pub fn set_attr(&self, node: NodeId, key: impl Into<String>, value: impl Into<String>) {
        if let Some(n) = self.tree.write().nodes.get_mut(node) {
            n.attrs.insert(key.into(), value.into());
        }
    }

    /// True if `node` or any descendant carries the attribute.
    pub fn subtree_has_attr(&self, node: NodeId, key: &str) -> bool {
        let tree = self.tree.read();
        if node >= tree.nodes.len() {
            return false;
        }
        tree.walk(node)
            .into_iter()
            .any(|id| tree.nodes[id].attrs.contains_key(key))
    }

    /// The node's payload, if it exists.
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.tree.read().nodes.get(node).map(|n| n.kind.clone())
    }

    /// Child ids of a node, in document order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .read()
            .nodes
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Collapsed visible text of the subtree: text runs joined by newlines.
    pub fn visible_text(&self, root: NodeId) -> String {
        let tree = self.tree.read();
        if root >= tree.nodes.len() {
            return String::new();
        }
        let runs: Vec<&str> = tree
            .walk(root)
            .into_iter()
            .filter_map(|id| match &tree.nodes[id].kind {
                NodeKind::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        runs.join("\n")
    }

    /// All image nodes under `root`, in document order.
    pub fn images_under(&self, root: NodeId) -> Vec<(NodeId, ImageAttrs)> {
        let tree = self.tree.read();
        if root >= tree.nodes.len() {
            return Vec::new();
        }
        tree.walk(root)
            .into_iter()
            .filter_map(|id| match &tree.nodes[id].kind {
                NodeKind::Image { attrs } => Some((id, attrs.clone())),
                _ => None,
            })
            .collect()
    }

    /// Replaces every occurrence of `sentence` inside text nodes of the
    /// subtree with a `mark` element carrying `mark_attr`.
    ///
    /// The mark's text is `replacement` when given (masking) or the original
    /// sentence (highlighting). Matching is on the exact fragment within a
    /// single text node; the surrounding text is split around each inserted
    /// mark. Only the mark elements are reported as new roots; the split
    /// remainders travel with them. Returns the occurrence count.
    pub fn mark_sentence(
        &self,
        root: NodeId,
        sentence: &str,
        replacement: Option<&str>,
        mark_attr: &str,
    ) -> usize {
        if sentence.is_empty() {
            return 0;
        }
        let mut inserted = Vec::new();
        let mut replaced = 0;
        {
            let mut tree = self.tree.write();
            if root >= tree.nodes.len() {
                return 0;
            }
            let targets: Vec<NodeId> = tree
                .walk(root)
                .into_iter()
                .filter(|&id| {
                    matches!(&tree.nodes[id].kind,
                        NodeKind::Text { content } if content.contains(sentence))
                })
                .collect();
            for id in targets {
                let Some(parent) = tree.nodes[id].parent else {
                    continue;
                };
                let content = match &tree.nodes[id].kind {
                    NodeKind::Text { content } => content.clone(),
                    _ => continue,
                };
                let pieces: Vec<String> =
                    content.split(sentence).map(str::to_string).collect();
                let occurrences = pieces.len() - 1;
                if occurrences == 0 {
                    continue;
                }
                replaced += occurrences;

                // The first piece stays in the original node; each match
                // becomes a mark followed by the next piece.
                tree.nodes[id].kind = NodeKind::Text {
                    content: pieces[0].clone(),
                };
                let mut pos = tree.nodes[parent]
                    .children
                    .iter()
                    .position(|&c| c == id)
                    .map(|p| p + 1)
                    .unwrap_or(tree.nodes[parent].children.len());
                for piece in pieces.into_iter().skip(1) {
                    let mark = tree.alloc(
                        Some(parent),
                        NodeKind::Element {
                            tag: "mark".to_string(),
                        },
                    );
                    tree.nodes[mark]
                        .attrs
                        .insert(mark_attr.to_string(), "true".to_string());
                    let mark_text = tree.alloc(
                        Some(mark),
                        NodeKind::Text {
                            content: replacement.unwrap_or(sentence).to_string(),
                        },
                    );
                    tree.nodes[mark].children.push(mark_text);
                    tree.nodes[parent].children.insert(pos, mark);
                    pos += 1;
                    inserted.push(mark);

                    if !piece.is_empty() {
                        let tail = tree.alloc(Some(parent), NodeKind::Text { content: piece });
                        tree.nodes[parent].children.insert(pos, tail);
                        pos += 1;
                    }
                }
            }
        }
        if !inserted.is_empty() {
            self.notify(MutationBatch { added: inserted });
        }
        replaced
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_read_back() {
        let doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "Hello there, this is fine.");
        let img = doc.append_image(p, ImageAttrs::new("https://e.com/cat.jpg", 800, 600));

        assert_eq!(doc.visible_text(p), "Hello there, this is fine.");
        assert_eq!(doc.images_under(doc.root()).len(), 1);
        assert!(matches!(doc.kind(img), Some(NodeKind::Image { .. })));
    }

    #[test]
    fn visible_text_joins_runs_with_newlines() {
        let doc = Document::new();
        let div = doc.append_element(doc.root(), "div");
        doc.append_text(div, "First run");
        let p = doc.append_element(div, "p");
        doc.append_text(p, "Second run");

        assert_eq!(doc.visible_text(div), "First run\nSecond run");
    }

    #[test]
    fn attach_fragment_reports_single_root() {
        let doc = Document::new();
        let mut rx = doc.subscribe();

        let frag = Fragment::element("article")
            .child(Fragment::text("Some long enough sentence here."))
            .child(Fragment::image(ImageAttrs::new("https://e.com/a.png", 640, 480)));
        let root = doc.attach(doc.root(), frag);

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.added, vec![root]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn attribute_writes_do_not_notify() {
        let doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        let mut rx = doc.subscribe();

        doc.set_attr(p, "data-veil-filtered", "true");
        assert!(rx.try_recv().is_err());
        assert_eq!(doc.attr(p, "data-veil-filtered").as_deref(), Some("true"));
    }

    #[test]
    fn subtree_attr_lookup_sees_descendants() {
        let doc = Document::new();
        let outer = doc.append_element(doc.root(), "div");
        let inner = doc.append_element(outer, "span");
        doc.set_attr(inner, "data-veil-masked", "true");

        assert!(doc.subtree_has_attr(outer, "data-veil-masked"));
        assert!(!doc.subtree_has_attr(doc.root(), "missing"));
    }

    #[test]
    fn mark_sentence_masks_and_splits() {
        let doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "before I hate you so much after");
        let mut rx = doc.subscribe();

        let mask = "*".repeat("I hate you so much".chars().count());
        let n = doc.mark_sentence(p, "I hate you so much", Some(&mask), "data-veil-masked");
        assert_eq!(n, 1);
        assert_eq!(doc.visible_text(p), format!("before \n{mask}\n after"));

        // Only the mark element is reported.
        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.added.len(), 1);
        let mark = batch.added[0];
        assert_eq!(doc.attr(mark, "data-veil-masked").as_deref(), Some("true"));
        assert!(matches!(
            doc.kind(mark),
            Some(NodeKind::Element { tag }) if tag == "mark"
        ));
    }

    #[test]
    fn mark_sentence_handles_repeats_in_one_node() {
        let doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "bad words. and bad words. again");

        let n = doc.mark_sentence(p, "bad words", Some(&"*".repeat(9)), "data-veil-masked");
        assert_eq!(n, 2);
        assert!(!doc.visible_text(p).contains("bad words"));
    }

    #[test]
    fn mark_sentence_highlight_keeps_text() {
        let doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "keep this awful sentence visible");

        let n = doc.mark_sentence(p, "awful sentence", None, "data-veil-masked");
        assert_eq!(n, 1);
        assert!(doc.visible_text(p).contains("awful sentence"));
        assert!(doc.subtree_has_attr(p, "data-veil-masked"));
    }

    #[test]
    fn mark_sentence_misses_cleanly() {
        let doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "nothing objectionable here");
        let mut rx = doc.subscribe();

        assert_eq!(doc.mark_sentence(p, "absent", Some("******"), "m"), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let doc = Document::new();
        let rx = doc.subscribe();
        drop(rx);
        // Next notification must not fail or leak the sender.
        doc.append_element(doc.root(), "p");
        assert!(doc.watchers.lock().is_empty());
    }
}
