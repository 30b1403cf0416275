//! Text edits over immutable trees.
//!
//! `Tree::edit` splices replacement text into the tree without parsing:
//! children of the covering node that the edit touches collapse into a
//! single error-kind token holding the edited text, everything else is
//! shared with the old tree. The result is immediately consistent (leaf
//! concatenation equals the post-edit source) and records which ranges a
//! later re-parse must treat as invalidated.

use super::language::{ERROR_KIND, SyntaxElement, raw};
use super::node::Tree;
use crate::base::{TextRange, TextSize};
use rowan::{GreenNode, GreenToken, NodeOrToken};

/// A text mutation: bytes `start..old_end` were replaced by `text`
/// (spanning `start..new_end` afterwards).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEdit {
    pub start: TextSize,
    pub old_end: TextSize,
    pub new_end: TextSize,
    pub text: String,
}

impl InputEdit {
    pub fn replace(start: TextSize, old_end: TextSize, text: impl Into<String>) -> InputEdit {
        let text = text.into();
        InputEdit {
            start,
            old_end,
            new_end: start + TextSize::of(text.as_str()),
            text,
        }
    }

    pub fn insert(at: TextSize, text: impl Into<String>) -> InputEdit {
        Self::replace(at, at, text)
    }

    pub fn delete(start: TextSize, old_end: TextSize) -> InputEdit {
        Self::replace(start, old_end, "")
    }

    pub fn old_range(&self) -> TextRange {
        TextRange::new(self.start, self.old_end)
    }

    pub fn new_range(&self) -> TextRange {
        TextRange::new(self.start, self.new_end)
    }

    /// Signed length change.
    fn delta(&self) -> i64 {
        i64::from(u32::from(self.new_end)) - i64::from(u32::from(self.old_end))
    }
}

/// Re-lexing margin: nodes touching this many bytes around the edit are
/// also invalidated, because longest-match lexing can join tokens across
/// the edit boundary.
const DIRTY_MARGIN: u32 = 1;

impl Tree {
    /// Apply a text edit, returning the updated tree.
    ///
    /// This never blocks on a parse and never mutates the receiver; the
    /// caller decides when to re-parse (feeding this tree back to
    /// `Parser::parse` reuses everything outside the dirty ranges).
    pub fn edit(&self, edit: &InputEdit) -> Tree {
        debug_assert_eq!(
            edit.new_end - edit.start,
            TextSize::of(edit.text.as_str()),
            "edit range inconsistent with replacement text",
        );
        debug_assert!(edit.old_end <= self.len(), "edit past end of tree");

        let root = self.syntax();
        let covering = match root.covering_element(edit.old_range()) {
            SyntaxElement::Node(n) => n,
            SyntaxElement::Token(t) => t.parent().expect("token has a parent"),
        };

        // Split the covering node's children into an untouched prefix, the
        // affected middle, and an untouched suffix.
        let mut prefix: Vec<NodeOrToken<GreenNode, GreenToken>> = Vec::new();
        let mut suffix: Vec<NodeOrToken<GreenNode, GreenToken>> = Vec::new();
        let mut affected_text = String::new();
        let mut affected_start = edit.start;
        let mut seen_affected = false;
        for child in covering.children_with_tokens() {
            let range = child.text_range();
            let green = green_of(&child);
            if range.end() <= edit.start && !touches(range, edit.old_range()) {
                prefix.push(green);
            } else if range.start() >= edit.old_end && !touches(range, edit.old_range()) {
                suffix.push(green);
            } else {
                if !seen_affected {
                    affected_start = range.start();
                    seen_affected = true;
                }
                match &child {
                    SyntaxElement::Node(n) => affected_text.push_str(&n.text().to_string()),
                    SyntaxElement::Token(t) => affected_text.push_str(t.text()),
                }
            }
        }

        let mut middle = String::new();
        if seen_affected {
            let from = u32::from(edit.start - affected_start) as usize;
            let to = u32::from(edit.old_end - affected_start) as usize;
            middle.push_str(&affected_text[..from]);
            middle.push_str(&edit.text);
            middle.push_str(&affected_text[to..]);
        } else {
            middle.push_str(&edit.text);
        }

        let mut children = prefix;
        if !middle.is_empty() {
            children.push(NodeOrToken::Token(GreenToken::new(raw(ERROR_KIND), &middle)));
        }
        children.extend(suffix);

        let new_green = covering.replace_with(GreenNode::new(
            raw(covering.kind()),
            children,
        ));

        // Shift prior dirty ranges past the edit, merge overlapping ones
        // into the edited span, and fold in the re-lexing margin.
        let delta = edit.delta();
        let new_len = TextSize::new(u32::from(self.len()).saturating_add_signed(delta as i32));
        let mut merged_start =
            TextSize::new(u32::from(edit.start).saturating_sub(DIRTY_MARGIN));
        let mut merged_end = (edit.new_end + TextSize::new(DIRTY_MARGIN)).min(new_len);
        let mut dirty = Vec::with_capacity(self.dirty_ranges().len() + 1);
        for &range in self.dirty_ranges() {
            if range.end() <= edit.start {
                dirty.push(range);
            } else if range.start() >= edit.old_end {
                dirty.push(shift(range, delta));
            } else {
                merged_start = merged_start.min(range.start());
                merged_end = merged_end.max(shift(range, delta).end().min(new_len));
            }
        }
        dirty.push(TextRange::new(merged_start, merged_end.max(merged_start)));
        dirty.sort_by_key(|r| r.start());

        // External scanner snapshots taken at or past the edit are stale.
        let external_states = self
            .external_states
            .iter()
            .filter(|snap| snap.end <= merged_start)
            .cloned()
            .collect();

        Tree::new(new_green, self.language().clone(), dirty, external_states)
    }
}

fn green_of(elem: &SyntaxElement) -> NodeOrToken<GreenNode, GreenToken> {
    match elem {
        SyntaxElement::Node(n) => NodeOrToken::Node(n.green().into_owned()),
        SyntaxElement::Token(t) => NodeOrToken::Token(t.green().to_owned()),
    }
}

/// Whether `range` is invalidated by an edit of `edited`. For an empty
/// edit range (pure insertion point) this holds exactly when the point
/// falls strictly inside `range`.
fn touches(range: TextRange, edited: TextRange) -> bool {
    range.start() < edited.end() && edited.start() < range.end()
}

fn shift(range: TextRange, delta: i64) -> TextRange {
    let s = (i64::from(u32::from(range.start())) + delta).max(0) as u32;
    let e = (i64::from(u32::from(range.end())) + delta).max(0) as u32;
    TextRange::new(TextSize::new(s), TextSize::new(e))
}
