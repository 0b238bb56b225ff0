//! Mutable HTML document tree
//!
//! Markup is parsed with `scraper` (html5ever underneath, so malformed input
//! is recovered the way browsers recover it) and copied into an arena of
//! nodes addressed by [`NodeId`]. The arena owns every node; parent/child
//! links are indices, so the tree can be edited in place without reference
//! cycles. Nodes detached by [`Document::replace`] stay in the arena but are
//! no longer reachable from the root and are skipped by queries and
//! serialization.

mod serialize;

use crate::{Error, Result};
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Payload of a single node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// Tag name and attributes of an element
///
/// Attribute order is source order; [`Document::set_attr`] keeps an existing
/// attribute in place and appends new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct Slot {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Attribute condition for [`Document::find_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrFilter<'a> {
    /// Every element with the tag
    Any,
    /// The attribute is present (with any value)
    Has(&'a str),
    /// The attribute is a whitespace-separated token list containing the
    /// token, compared ASCII case-insensitively (e.g. `rel="preload stylesheet"`)
    Token(&'a str, &'a str),
}

impl AttrFilter<'_> {
    fn matches(&self, el: &ElementData) -> bool {
        match *self {
            AttrFilter::Any => true,
            AttrFilter::Has(name) => el.attr(name).is_some(),
            AttrFilter::Token(name, token) => el
                .attr(name)
                .map(|v| v.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case(token)))
                .unwrap_or(false),
        }
    }
}

/// An HTML document owned as an arena of nodes
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Slot>,
}

impl Document {
    /// Parse a full HTML document.
    ///
    /// Structurally invalid markup is repaired rather than rejected; the only
    /// failure is a parse that yields no element at all.
    pub fn parse(html: &str) -> Result<Self> {
        let parsed = Html::parse_document(html);
        if !parsed.errors.is_empty() {
            log::debug!("recovered from {} markup errors", parsed.errors.len());
        }

        let mut doc = Self {
            nodes: vec![Slot {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        };

        // Iterative copy so deeply nested markup cannot exhaust the stack.
        let mut stack: Vec<(NodeRef<Node>, NodeId)> = parsed
            .tree
            .root()
            .children()
            .rev()
            .map(|child| (child, doc.root()))
            .collect();

        while let Some((node, parent)) = stack.pop() {
            let kind = match node.value() {
                Node::Doctype(d) => NodeKind::Doctype {
                    name: d.name().to_string(),
                    public_id: d.public_id().to_string(),
                    system_id: d.system_id().to_string(),
                },
                Node::Element(el) => NodeKind::Element(ElementData {
                    name: el.name().to_string(),
                    attrs: el
                        .attrs
                        .iter()
                        .map(|(name, value)| {
                            (
                                qualified_name(&name.ns, name.prefix.as_deref(), &name.local),
                                value.to_string(),
                            )
                        })
                        .collect(),
                }),
                Node::Text(text) => NodeKind::Text((**text).to_owned()),
                Node::Comment(comment) => NodeKind::Comment((**comment).to_owned()),
                // Template contents and other containers are flattened into the parent.
                Node::Document | Node::Fragment => {
                    for child in node.children().rev() {
                        stack.push((child, parent));
                    }
                    continue;
                }
                _ => continue,
            };

            let id = doc.alloc(kind);
            doc.append(parent, id);
            for child in node.children().rev() {
                stack.push((child, id));
            }
        }

        if doc.document_element().is_none() {
            return Err(Error::ParseError("markup produced no root element".into()));
        }
        Ok(doc)
    }

    /// The document node every reachable node descends from
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The top-level element (normally `<html>`)
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&id| matches!(self.kind(id), NodeKind::Element(_)))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    /// Every element named `tag` that satisfies `filter`, in document order,
    /// at any depth.
    pub fn find_all(&self, tag: &str, filter: AttrFilter<'_>) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&id| match self.element(id) {
                Some(el) => el.name.eq_ignore_ascii_case(tag) && filter.matches(el),
                None => false,
            })
            .collect()
    }

    /// Pre-order list of the nodes below `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    /// Set an attribute on an element. Returns `false` if `id` is not an element.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let NodeKind::Element(el) = &mut self.nodes[id.0].kind else {
            return false;
        };
        match el.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attrs.push((name.to_ascii_lowercase(), value.to_string())),
        }
        true
    }

    /// Concatenated text of every text node below `id`
    pub fn text(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match self.kind(n) {
                NodeKind::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Allocate a detached element; attach it with [`Document::replace`].
    pub fn create_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.alloc(NodeKind::Element(ElementData {
            name: name.to_ascii_lowercase(),
            attrs,
        }))
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
        let text_node = self.alloc(NodeKind::Text(text.to_string()));
        self.append(id, text_node);
    }

    /// Put `new` where `old` is among its siblings and detach `old`.
    ///
    /// `new` is first detached from wherever it currently is. Returns `false`
    /// without changing anything when `old` has no parent, or when `new` is
    /// `old` itself or one of its ancestors (which would create a cycle).
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.parent(old) else {
            return false;
        };
        if self.is_ancestor_or_self(new, old) {
            return false;
        }

        self.detach(new);
        let siblings = &mut self.nodes[parent.0].children;
        let Some(pos) = siblings.iter().position(|&c| c == old) else {
            return false;
        };
        siblings[pos] = new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        true
    }

    /// Serialize the reachable tree back to HTML.
    pub fn serialize(&self) -> String {
        serialize::to_html(self)
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Slot {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.parent(id);
        }
        false
    }
}

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Attribute name as written in markup. The parser files `xlink:href`,
/// `xml:lang` and `xmlns:*` on SVG/MathML elements under their namespace and
/// keeps only the local part, so the prefix is restored here.
fn qualified_name(ns: &str, prefix: Option<&str>, local: &str) -> String {
    let prefix = match ns {
        "" => None,
        XML_NS => Some("xml"),
        XMLNS_NS if local == "xmlns" => None,
        XMLNS_NS => Some("xmlns"),
        XLINK_NS => Some("xlink"),
        _ => prefix,
    };
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}
