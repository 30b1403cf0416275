//! Lexical automaton compiled from terminal patterns.
//!
//! Each terminal pattern is lowered by Thompson construction into a shared
//! NFA with tagged accept states. Scanning simulates the automaton with a
//! state set, which keeps the table serializable and lets a parse state's
//! valid lookahead set select which entry states are seeded.

use super::pattern::{CharClass, Pattern};
use crate::base::SymbolId;
use crate::grammar::{Grammar, GrammarError, SymbolKind};
use serde::{Deserialize, Serialize};

/// Edge predicate on a single character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum CharSpec {
    Any,
    Char(char),
    Class(CharClass),
}

impl CharSpec {
    pub(crate) fn matches(&self, c: char) -> bool {
        match self {
            CharSpec::Any => true,
            CharSpec::Char(x) => c == *x,
            CharSpec::Class(class) => class.matches(c),
        }
    }
}

/// Identifies which terminal an accept state belongs to and how ties are
/// broken: declared priority first, then literals over patterns, then
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AcceptTag {
    pub terminal: SymbolId,
    pub priority: i32,
    pub is_literal: bool,
}

impl AcceptTag {
    /// True when `self` beats `other` for an equal-length match.
    pub(crate) fn beats(&self, other: &AcceptTag) -> bool {
        (self.priority, self.is_literal, std::cmp::Reverse(self.terminal.0))
            > (other.priority, other.is_literal, std::cmp::Reverse(other.terminal.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct NfaState {
    pub epsilon: Vec<u32>,
    pub edges: Vec<(CharSpec, u32)>,
    pub accept: Option<AcceptTag>,
}

/// The combined lexical automaton for one grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexTable {
    states: Vec<NfaState>,
    /// Entry state per terminal id; `None` for externals and end-of-input.
    entries: Vec<Option<u32>>,
}

impl LexTable {
    pub fn build(grammar: &Grammar) -> Result<LexTable, GrammarError> {
        let mut table = LexTable {
            states: Vec::new(),
            entries: vec![None; grammar.terminal_count()],
        };
        for id in 0..grammar.terminal_count() as u16 {
            let sym = SymbolId(id);
            if sym == grammar.eof() {
                continue;
            }
            let info = grammar.symbol(sym);
            let (pattern, priority, is_literal) = match &info.kind {
                SymbolKind::Token { pattern, priority } => {
                    let parsed = Pattern::parse(pattern).map_err(|reason| {
                        GrammarError::BadPattern {
                            name: info.name.clone(),
                            reason,
                        }
                    })?;
                    (parsed, *priority, false)
                }
                SymbolKind::Literal => (Pattern::literal(&info.name), 0, true),
                SymbolKind::External => continue,
                SymbolKind::Rule { .. } => unreachable!("terminal range"),
            };

            let (start, end) = table.compile(&pattern);
            table.states[end as usize].accept = Some(AcceptTag {
                terminal: sym,
                priority,
                is_literal,
            });
            if table.nullable(start) {
                return Err(GrammarError::BadPattern {
                    name: info.name.clone(),
                    reason: "pattern matches the empty string".to_string(),
                });
            }
            table.entries[sym.index()] = Some(start);
        }
        Ok(table)
    }

    pub(crate) fn entry(&self, terminal: SymbolId) -> Option<u32> {
        self.entries.get(terminal.index()).copied().flatten()
    }

    pub(crate) fn state(&self, id: u32) -> &NfaState {
        &self.states[id as usize]
    }

    fn push(&mut self) -> u32 {
        self.states.push(NfaState::default());
        (self.states.len() - 1) as u32
    }

    fn edge(&mut self, from: u32, spec: CharSpec, to: u32) {
        self.states[from as usize].edges.push((spec, to));
    }

    fn eps(&mut self, from: u32, to: u32) {
        self.states[from as usize].epsilon.push(to);
    }

    /// Thompson construction. Returns (start, end); the fragment has no
    /// edges out of `end`.
    fn compile(&mut self, pattern: &Pattern) -> (u32, u32) {
        match pattern {
            Pattern::Char(c) => {
                let (s, e) = (self.push(), self.push());
                self.edge(s, CharSpec::Char(*c), e);
                (s, e)
            }
            Pattern::Any => {
                let (s, e) = (self.push(), self.push());
                self.edge(s, CharSpec::Any, e);
                (s, e)
            }
            Pattern::Class(class) => {
                let (s, e) = (self.push(), self.push());
                self.edge(s, CharSpec::Class(class.clone()), e);
                (s, e)
            }
            Pattern::Seq(parts) => {
                let s = self.push();
                let mut prev = s;
                for part in parts {
                    let (ps, pe) = self.compile(part);
                    self.eps(prev, ps);
                    prev = pe;
                }
                let e = self.push();
                self.eps(prev, e);
                (s, e)
            }
            Pattern::Alt(branches) => {
                let (s, e) = (self.push(), self.push());
                for branch in branches {
                    let (bs, be) = self.compile(branch);
                    self.eps(s, bs);
                    self.eps(be, e);
                }
                (s, e)
            }
            Pattern::Repeat(inner) => {
                let (is, ie) = self.compile(inner);
                let (s, e) = (self.push(), self.push());
                self.eps(s, is);
                self.eps(s, e);
                self.eps(ie, is);
                self.eps(ie, e);
                (s, e)
            }
            Pattern::Repeat1(inner) => {
                let (is, ie) = self.compile(inner);
                let e = self.push();
                self.eps(ie, is);
                self.eps(ie, e);
                (is, e)
            }
            Pattern::Optional(inner) => {
                let (is, ie) = self.compile(inner);
                let (s, e) = (self.push(), self.push());
                self.eps(s, is);
                self.eps(s, e);
                self.eps(ie, e);
                (s, e)
            }
        }
    }

    /// True when the epsilon closure of `start` contains an accept state.
    fn nullable(&self, start: u32) -> bool {
        let mut seen = vec![start];
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if self.states[id as usize].accept.is_some() {
                return true;
            }
            for &next in &self.states[id as usize].epsilon {
                if !seen.contains(&next) {
                    seen.push(next);
                    stack.push(next);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarBuilder, alt, tok};

    fn lex_table(pattern: &str) -> Result<LexTable, GrammarError> {
        let mut g = GrammarBuilder::new();
        g.token("t", pattern);
        g.rule("s", [alt([tok("t")])]);
        LexTable::build(&g.build().unwrap())
    }

    #[test]
    fn test_build_simple() {
        let table = lex_table("[0-9]+").unwrap();
        assert!(table.entry(SymbolId(0)).is_some());
    }

    #[test]
    fn test_empty_matching_pattern_rejected() {
        let err = lex_table("a*").unwrap_err();
        assert!(matches!(err, GrammarError::BadPattern { .. }));
        let err = lex_table("").unwrap_err();
        assert!(matches!(err, GrammarError::BadPattern { .. }));
    }

    #[test]
    fn test_accept_tag_ordering() {
        let kw = AcceptTag { terminal: SymbolId(1), priority: 0, is_literal: true };
        let ident = AcceptTag { terminal: SymbolId(0), priority: 0, is_literal: false };
        assert!(kw.beats(&ident));
        let high = AcceptTag { terminal: SymbolId(2), priority: 5, is_literal: false };
        assert!(high.beats(&kw));
        // Same priority and kind: earlier declaration wins.
        let early = AcceptTag { terminal: SymbolId(0), priority: 0, is_literal: false };
        let late = AcceptTag { terminal: SymbolId(3), priority: 0, is_literal: false };
        assert!(early.beats(&late));
    }
}
