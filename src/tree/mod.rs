//! Tree/edit model: persistent concrete syntax trees with localized edits.
//!
//! Built on rowan green/red trees: green nodes are the immutable,
//! structurally shared store (unaffected subtrees are referenced across
//! edits, never copied), red [`SyntaxNode`]s derive absolute offsets on
//! demand. The engine constructs green nodes bottom-up during reduction;
//! [`Tree::edit`] replaces only the path from the touched children to the
//! root, so snapshots held by other callers are never disturbed.
//!
//! Invariant: concatenating all leaf byte ranges in order reproduces the
//! parsed byte range exactly. Missing markers are zero-width leaves, so the
//! invariant survives error recovery.

mod edit;
mod language;
mod node;

pub use edit::InputEdit;
pub use language::{Cst, ERROR_KIND, NodeKind, SyntaxElement, SyntaxNode, SyntaxToken};
pub use node::{Node, Tree};

pub(crate) use language::{GreenElement, raw};
pub(crate) use node::ExternalSnapshot;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{TextRange, TextSize};
    use crate::grammar::{GrammarBuilder, alt, tok};
    use crate::tables::Language;
    use rowan::{GreenNode, GreenToken};

    fn word_language() -> Language {
        let mut g = GrammarBuilder::new();
        g.token("word", "[a-z]+");
        g.token("space", " +");
        g.extra("space");
        g.rule("doc", [alt([tok("word")])]);
        Language::compile(g.build().unwrap()).unwrap()
    }

    /// Hand-build `doc(word "hello" space " " word "world")` greens.
    fn sample_tree(language: &Language) -> Tree {
        let grammar = language.grammar();
        let word = raw(NodeKind::from(grammar.symbol_named("word").unwrap()));
        let space = raw(NodeKind::from(grammar.symbol_named("space").unwrap()));
        let doc = raw(NodeKind::from(grammar.symbol_named("doc").unwrap()));
        let green = GreenNode::new(
            doc,
            [
                rowan::NodeOrToken::Token(GreenToken::new(word, "hello")),
                rowan::NodeOrToken::Token(GreenToken::new(space, " ")),
                rowan::NodeOrToken::Token(GreenToken::new(word, "world")),
            ],
        );
        Tree::new(green, language.clone(), Vec::new(), Vec::new())
    }

    #[test]
    fn test_leaf_concatenation() {
        let language = word_language();
        let tree = sample_tree(&language);
        assert_eq!(tree.text(), "hello world");
        assert_eq!(tree.len(), TextSize::new(11));
        assert_eq!(tree.root_node().kind_name(), "doc");
    }

    #[test]
    fn test_traversal() {
        let language = word_language();
        let tree = sample_tree(&language);
        let root = tree.root_node();
        assert_eq!(root.child_count(), 3);
        let first = root.child(0).unwrap();
        assert_eq!(first.kind_name(), "word");
        assert_eq!(first.text(), "hello");
        assert_eq!(first.next_sibling().unwrap().kind_name(), "space");
        assert_eq!(first.parent().unwrap(), root);
        assert!(first.is_leaf());
    }

    #[test]
    fn test_covering() {
        let language = word_language();
        let tree = sample_tree(&language);
        let root = tree.root_node();
        let covering = root.covering(TextRange::new(TextSize::new(7), TextSize::new(9)));
        assert_eq!(covering.text(), "world");
        let covering = root.covering(TextRange::new(TextSize::new(2), TextSize::new(9)));
        assert_eq!(covering, root);
    }

    #[test]
    fn test_edit_replaces_only_touched_children() {
        let language = word_language();
        let tree = sample_tree(&language);
        // hello world -> hello wooorld
        let edit = InputEdit::replace(TextSize::new(8), TextSize::new(8), "oo");
        let edited = tree.edit(&edit);
        assert_eq!(edited.text(), "hello wooorld");
        // The untouched leading children are shared, the touched word is an
        // error-kind splice.
        let root = edited.root_node();
        assert_eq!(root.child(0).unwrap().text(), "hello");
        assert!(root.child(2).unwrap().is_error());
        // Old snapshot untouched.
        assert_eq!(tree.text(), "hello world");
        assert!(!edited.dirty_ranges().is_empty());
    }

    #[test]
    fn test_edit_delete_whole_token() {
        let language = word_language();
        let tree = sample_tree(&language);
        // Delete " world".
        let edit = InputEdit::delete(TextSize::new(5), TextSize::new(11));
        let edited = tree.edit(&edit);
        assert_eq!(edited.text(), "hello");
        assert_eq!(tree.text(), "hello world");
    }

    #[test]
    fn test_edit_shifts_prior_dirty_ranges() {
        let language = word_language();
        let tree = sample_tree(&language);
        let first = tree.edit(&InputEdit::replace(TextSize::new(9), TextSize::new(10), "L"));
        let second = first.edit(&InputEdit::insert(TextSize::new(0), "xx"));
        // The range from the first edit moved right by two bytes.
        assert!(
            second
                .dirty_ranges()
                .iter()
                .any(|r| r.contains(TextSize::new(11)))
        );
        assert_eq!(second.text(), "xxhello worLd");
    }

    #[test]
    fn test_missing_marker_detection() {
        let language = word_language();
        let grammar = language.grammar();
        let word = raw(NodeKind::from(grammar.symbol_named("word").unwrap()));
        let doc = raw(NodeKind::from(grammar.symbol_named("doc").unwrap()));
        let green = GreenNode::new(
            doc,
            [rowan::NodeOrToken::Token(GreenToken::new(word, ""))],
        );
        let tree = Tree::new(green, language.clone(), Vec::new(), Vec::new());
        let leaf = tree.root_node().child(0).unwrap();
        assert!(leaf.is_missing());
        assert!(!leaf.is_error());
        assert!(tree.has_error());
    }
}
