//! Read-only tree handles exposed to hosts.

use super::language::{NodeKind, SyntaxElement, SyntaxNode};
use crate::base::{TextRange, TextSize};
use crate::tables::Language;
use rowan::GreenNode;

/// A snapshot of one external scanner's state at a token boundary, kept so
/// incremental re-lexing can restart mid-document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExternalSnapshot {
    /// End offset of the external token that produced this snapshot.
    pub end: TextSize,
    pub terminal: crate::base::SymbolId,
    pub state: Vec<u8>,
}

/// An immutable concrete syntax tree.
///
/// Trees are snapshots: [`Tree::edit`] returns a new tree and never touches
/// nodes reachable from previously handed-out trees (green nodes are
/// structurally shared, copy-on-write along the replaced path only).
#[derive(Debug, Clone)]
pub struct Tree {
    green: GreenNode,
    language: Language,
    /// Byte ranges (current coordinates) whose old structure cannot be
    /// trusted until the next re-parse.
    dirty: Vec<TextRange>,
    pub(crate) external_states: Vec<ExternalSnapshot>,
}

impl Tree {
    pub(crate) fn new(
        green: GreenNode,
        language: Language,
        dirty: Vec<TextRange>,
        external_states: Vec<ExternalSnapshot>,
    ) -> Tree {
        Tree {
            green,
            language,
            dirty,
            external_states,
        }
    }

    pub fn root_node(&self) -> Node {
        Node {
            elem: SyntaxNode::new_root(self.green.clone()).into(),
            language: self.language.clone(),
        }
    }

    pub(crate) fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Full source text reproduced from the leaves.
    pub fn text(&self) -> String {
        self.syntax().text().to_string()
    }

    pub fn len(&self) -> TextSize {
        self.syntax().text_range().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == TextSize::new(0)
    }

    /// Invalidated byte ranges recorded by edits since the last parse.
    pub fn dirty_ranges(&self) -> &[TextRange] {
        &self.dirty
    }

    /// True when the tree contains any error or missing marker.
    pub fn has_error(&self) -> bool {
        self.root_node().has_error()
    }

    /// Ranges of all error and missing markers, in document order.
    pub fn error_ranges(&self) -> Vec<TextRange> {
        self.root_node()
            .descendants()
            .filter(|n| n.is_error() || n.is_missing())
            .map(|n| n.range())
            .collect()
    }
}

/// A node handle: terminal leaf or non-terminal internal node.
///
/// Kind names resolve through the compiled language's symbol table.
#[derive(Debug, Clone)]
pub struct Node {
    elem: SyntaxElement,
    language: Language,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.elem == other.elem
    }
}

impl Eq for Node {}

impl Node {
    fn wrap(&self, elem: SyntaxElement) -> Node {
        Node {
            elem,
            language: self.language.clone(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match &self.elem {
            SyntaxElement::Node(n) => n.kind(),
            SyntaxElement::Token(t) => t.kind(),
        }
    }

    pub fn kind_name(&self) -> &str {
        match self.kind().symbol() {
            Some(sym) => self.language.grammar().name(sym),
            None => "ERROR",
        }
    }

    pub fn range(&self) -> TextRange {
        self.elem.text_range()
    }

    pub fn start(&self) -> TextSize {
        self.range().start()
    }

    pub fn end(&self) -> TextSize {
        self.range().end()
    }

    pub fn text(&self) -> String {
        match &self.elem {
            SyntaxElement::Node(n) => n.text().to_string(),
            SyntaxElement::Token(t) => t.text().to_string(),
        }
    }

    /// True for terminal leaves.
    pub fn is_leaf(&self) -> bool {
        matches!(self.elem, SyntaxElement::Token(_))
    }

    /// An error marker: wraps input the parser had to skip (or text spliced
    /// by an edit and not yet re-parsed).
    pub fn is_error(&self) -> bool {
        self.kind().is_error()
    }

    /// A missing marker: a zero-width leaf synthesized for an expected but
    /// absent token.
    pub fn is_missing(&self) -> bool {
        match &self.elem {
            SyntaxElement::Token(t) => !t.kind().is_error() && t.text().is_empty(),
            SyntaxElement::Node(_) => false,
        }
    }

    /// True when any error or missing marker occurs in this subtree.
    pub fn has_error(&self) -> bool {
        self.descendants().any(|n| n.is_error() || n.is_missing())
    }

    pub fn parent(&self) -> Option<Node> {
        self.elem.parent().map(|p| self.wrap(p.into()))
    }

    pub fn child_count(&self) -> usize {
        match &self.elem {
            SyntaxElement::Node(n) => n.children_with_tokens().count(),
            SyntaxElement::Token(_) => 0,
        }
    }

    pub fn children(&self) -> impl Iterator<Item = Node> + '_ {
        let iter = match &self.elem {
            SyntaxElement::Node(n) => Some(n.children_with_tokens()),
            SyntaxElement::Token(_) => None,
        };
        iter.into_iter().flatten().map(|e| self.wrap(e))
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.children().nth(index)
    }

    pub fn next_sibling(&self) -> Option<Node> {
        self.elem.next_sibling_or_token().map(|e| self.wrap(e))
    }

    pub fn prev_sibling(&self) -> Option<Node> {
        self.elem.prev_sibling_or_token().map(|e| self.wrap(e))
    }

    /// Pre-order traversal of this subtree, the node itself included.
    pub fn descendants(&self) -> Box<dyn Iterator<Item = Node> + '_> {
        match &self.elem {
            SyntaxElement::Node(n) => {
                Box::new(n.descendants_with_tokens().map(|e| self.wrap(e)))
            }
            SyntaxElement::Token(_) => Box::new(std::iter::once(self.clone())),
        }
    }

    /// The smallest node fully containing `range`.
    ///
    /// Must be called on a node whose range contains `range`.
    pub fn covering(&self, range: TextRange) -> Node {
        match &self.elem {
            SyntaxElement::Node(n) => self.wrap(n.covering_element(range)),
            SyntaxElement::Token(_) => self.clone(),
        }
    }

    /// The leaf at `offset`, if any.
    pub fn leaf_at(&self, offset: TextSize) -> Option<Node> {
        if !self.range().contains_inclusive(offset) {
            return None;
        }
        let mut current = self.clone();
        while let SyntaxElement::Node(n) = &current.elem {
            let next = n
                .children_with_tokens()
                .find(|c| c.text_range().contains_inclusive(offset) && !c.text_range().is_empty());
            match next {
                Some(child) => current = self.wrap(child),
                None => break,
            }
        }
        current.is_leaf().then_some(current)
    }

}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{:?}", self.kind_name(), self.range())
    }
}
