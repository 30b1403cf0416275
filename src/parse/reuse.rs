//! Subtree reuse for incremental re-parsing.

use crate::base::{SymbolId, TextRange, TextSize};
use crate::grammar::SymbolKind;
use crate::tables::Language;
use crate::tree::{SyntaxElement, SyntaxNode, Tree};
use rowan::GreenNode;

/// Walks the previous tree looking for subtrees that can be pushed onto
/// the new parse wholesale.
///
/// The cursor applies the tree-side conditions: a candidate starts exactly
/// at the requested offset, lies outside every invalidated range, contains
/// no error or missing marker, and is a visible non-terminal whose
/// following token is also clean. The engine applies the table-side
/// conditions (goto viability after bounded reduction, lookahead action in
/// the landing state) before committing.
pub(crate) struct ReuseCursor {
    root: SyntaxNode,
    dirty: Vec<TextRange>,
}

/// A reusable-subtree candidate, table checks still pending.
pub(crate) struct Candidate {
    pub green: GreenNode,
    pub symbol: SymbolId,
    pub range: TextRange,
    /// First meaningful terminal inside the subtree: the lookahead a
    /// from-scratch parse would see when it reached this offset.
    pub first_terminal: SymbolId,
    /// Terminal following the subtree in the old tree; `None` means the
    /// subtree ran to the old end of input.
    pub following: Option<SymbolId>,
}

impl ReuseCursor {
    pub fn new(old: &Tree) -> ReuseCursor {
        ReuseCursor {
            root: old.syntax(),
            dirty: old.dirty_ranges().to_vec(),
        }
    }

    /// Viable candidates starting at `pos`, outermost first.
    pub fn candidates(&self, pos: TextSize, language: &Language) -> Vec<Candidate> {
        let mut out = Vec::new();
        if pos >= self.root.text_range().end() {
            return out;
        }
        let grammar = language.grammar();

        // Nodes starting exactly at `pos`, outermost first. The root is
        // never a candidate: nothing may follow it.
        let mut chain: Vec<SyntaxNode> = Vec::new();
        let mut node = self.root.clone();
        loop {
            let next = node.children_with_tokens().find(|c| {
                let range = c.text_range();
                range.start() <= pos && pos < range.end()
            });
            match next {
                Some(SyntaxElement::Node(child)) => {
                    if child.text_range().start() == pos {
                        chain.push(child.clone());
                    }
                    node = child;
                }
                _ => break,
            }
        }

        let extras = grammar.extras_set();
        for candidate in chain {
            let range = candidate.text_range();
            if self.dirty.iter().any(|d| touches(range, *d)) {
                continue;
            }
            let Some(symbol) = candidate.kind().symbol() else {
                continue;
            };
            if grammar.is_terminal(symbol)
                || !matches!(grammar.symbol(symbol).kind, SymbolKind::Rule { hidden: false })
            {
                continue;
            }
            if self.subtree_has_error(&candidate) {
                continue;
            }
            let Some(first_terminal) = self.first_terminal(&candidate, language) else {
                continue;
            };
            let Some(following) = self.following_terminal(range.end(), language, &extras) else {
                continue;
            };
            out.push(Candidate {
                green: candidate.green().into_owned(),
                symbol,
                range,
                first_terminal,
                following,
            });
        }
        out
    }

    fn subtree_has_error(&self, node: &SyntaxNode) -> bool {
        node.descendants_with_tokens().any(|elem| match elem {
            SyntaxElement::Node(n) => n.kind().is_error(),
            SyntaxElement::Token(t) => t.kind().is_error() || t.text().is_empty(),
        })
    }

    /// First non-trivia token inside the subtree.
    fn first_terminal(&self, node: &SyntaxNode, language: &Language) -> Option<SymbolId> {
        let grammar = language.grammar();
        let extras = grammar.extras_set();
        node.descendants_with_tokens().find_map(|elem| match elem {
            SyntaxElement::Token(t) => {
                let sym = t.kind().symbol()?;
                (!t.text().is_empty() && grammar.is_terminal(sym) && !extras.contains(sym))
                    .then_some(sym)
            }
            SyntaxElement::Node(_) => None,
        })
    }

    /// The old tree's next meaningful terminal after `end`, provided it is
    /// clean. `Some(None)` means the old input ended there.
    fn following_terminal(
        &self,
        end: TextSize,
        language: &Language,
        extras: &crate::base::TokenSet,
    ) -> Option<Option<SymbolId>> {
        let grammar = language.grammar();
        let mut token = self.root.token_at_offset(end).right_biased();
        // `token_at_offset` can hand back the token ending at `end`; the
        // lookahead is whatever starts at or after it.
        if let Some(t) = &token {
            if t.text_range().start() < end {
                token = t.next_token();
            }
        }
        while let Some(t) = &token {
            let is_trivia = t
                .kind()
                .symbol()
                .is_some_and(|sym| extras.contains(sym));
            if !t.text().is_empty() && !is_trivia {
                break;
            }
            token = t.next_token();
        }

        match token {
            Some(t) => {
                if self.dirty.iter().any(|d| touches(t.text_range(), *d)) {
                    return None;
                }
                match t.kind().symbol() {
                    Some(terminal) if grammar.is_terminal(terminal) => Some(Some(terminal)),
                    _ => None,
                }
            }
            None => Some(None),
        }
    }
}

fn touches(range: TextRange, dirty: TextRange) -> bool {
    range.start() < dirty.end() && dirty.start() < range.end()
        || dirty.is_empty() && range.start() <= dirty.start() && dirty.start() < range.end()
}
