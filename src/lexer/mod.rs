//! Lexer/scanner: turns raw text into tokens on demand.
//!
//! The scanner is driven by the parse engine: given a byte offset and the
//! current parse state's valid lookahead set, it produces the next token by
//! longest match over the compiled lexical automaton, with declared
//! priority (then literal-over-pattern, then declaration order) breaking
//! ties between equal-length matches. Context-sensitive tokens come from
//! host-registered [`ExternalScanner`] hooks, which are consulted before
//! the automaton.
//!
//! Scanning is restartable from any byte offset; the only cross-token state
//! is the external scanners' own, which they snapshot per token.

mod external;
mod nfa;
mod pattern;

pub use external::ExternalScanner;
pub use nfa::LexTable;
pub use pattern::{CharClass, ClassItem, Pattern};

use crate::base::{SymbolId, TextRange, TextSize, TokenSet};

/// A token produced by the scanner: a terminal symbol and the byte range it
/// covers. Immutable once emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedToken {
    pub terminal: SymbolId,
    pub range: TextRange,
}

/// Outcome of one scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lexed {
    Token(ScannedToken),
    /// End of input reached.
    Eof,
    /// No valid terminal matches at this offset; the engine enters error
    /// recovery.
    UnexpectedByte(TextSize),
}

/// Table-driven scanner over one source text.
pub struct Scanner<'a> {
    text: &'a str,
    lex: &'a LexTable,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str, lex: &'a LexTable) -> Self {
        Self { text, lex }
    }

    /// Scan the next token at `at`, considering only terminals in `valid`.
    pub fn scan(&self, at: TextSize, valid: &TokenSet) -> Lexed {
        let start = u32::from(at) as usize;
        if start >= self.text.len() {
            return Lexed::Eof;
        }

        let mut current: Vec<u32> = Vec::new();
        for terminal in valid.iter() {
            if let Some(entry) = self.lex.entry(terminal) {
                self.add_closure(entry, &mut current);
            }
        }
        if current.is_empty() {
            return Lexed::UnexpectedByte(at);
        }

        let mut best: Option<(usize, nfa::AcceptTag)> = None;
        let mut len = 0usize;
        let mut next: Vec<u32> = Vec::new();
        for c in self.text[start..].chars() {
            next.clear();
            for &id in &current {
                for (spec, to) in &self.lex.state(id).edges {
                    if spec.matches(c) {
                        self.add_closure(*to, &mut next);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            len += c.len_utf8();

            for &id in &current {
                if let Some(tag) = self.lex.state(id).accept {
                    let better = match &best {
                        Some((best_len, best_tag)) => {
                            len > *best_len || (len == *best_len && tag.beats(best_tag))
                        }
                        None => true,
                    };
                    if better {
                        best = Some((len, tag));
                    }
                }
            }
        }

        match best {
            Some((len, tag)) => Lexed::Token(ScannedToken {
                terminal: tag.terminal,
                range: TextRange::at(at, TextSize::new(len as u32)),
            }),
            None => Lexed::UnexpectedByte(at),
        }
    }

    fn add_closure(&self, id: u32, set: &mut Vec<u32>) {
        if set.contains(&id) {
            return;
        }
        set.push(id);
        let mut stack = vec![id];
        while let Some(s) = stack.pop() {
            for &next in &self.lex.state(s).epsilon {
                if !set.contains(&next) {
                    set.push(next);
                    stack.push(next);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, GrammarBuilder, alt, lit, nt, tok};

    fn ident_grammar() -> Grammar {
        let mut g = GrammarBuilder::new();
        g.token("ident", r"[_\p{ID_Start}][_\p{ID_Continue}]*");
        g.token("number", "[0-9]+");
        g.token("space", r"\s+");
        g.extra("space");
        g.rule(
            "item",
            [
                alt([lit("if"), nt("value")]),
                alt([nt("value")]),
            ],
        );
        g.rule("value", [alt([tok("ident")]), alt([tok("number")])]);
        g.build().unwrap()
    }

    fn all_terminals(grammar: &Grammar) -> TokenSet {
        (0..grammar.terminal_count() as u16)
            .map(SymbolId)
            .filter(|&s| s != grammar.eof())
            .collect()
    }

    #[test]
    fn test_longest_match() {
        let grammar = ident_grammar();
        let lex = LexTable::build(&grammar).unwrap();
        let scanner = Scanner::new("iffy", &lex);
        let valid = all_terminals(&grammar);
        let Lexed::Token(token) = scanner.scan(TextSize::new(0), &valid) else {
            panic!("expected token")
        };
        // `iffy` is an identifier, not the keyword `if` plus `fy`.
        assert_eq!(token.terminal, grammar.symbol_named("ident").unwrap());
        assert_eq!(token.range, TextRange::new(TextSize::new(0), TextSize::new(4)));
    }

    #[test]
    fn test_keyword_beats_ident_at_equal_length() {
        let grammar = ident_grammar();
        let lex = LexTable::build(&grammar).unwrap();
        let scanner = Scanner::new("if x", &lex);
        let valid = all_terminals(&grammar);
        let Lexed::Token(token) = scanner.scan(TextSize::new(0), &valid) else {
            panic!("expected token")
        };
        assert_eq!(token.terminal, grammar.symbol_named("if").unwrap());
    }

    #[test]
    fn test_valid_set_restricts_matches() {
        let grammar = ident_grammar();
        let lex = LexTable::build(&grammar).unwrap();
        let scanner = Scanner::new("abc", &lex);
        let only_number: TokenSet = [grammar.symbol_named("number").unwrap()]
            .into_iter()
            .collect();
        assert_eq!(
            scanner.scan(TextSize::new(0), &only_number),
            Lexed::UnexpectedByte(TextSize::new(0))
        );
    }

    #[test]
    fn test_scan_from_offset_and_eof() {
        let grammar = ident_grammar();
        let lex = LexTable::build(&grammar).unwrap();
        let scanner = Scanner::new("a 42", &lex);
        let valid = all_terminals(&grammar);
        let Lexed::Token(token) = scanner.scan(TextSize::new(2), &valid) else {
            panic!("expected token")
        };
        assert_eq!(token.terminal, grammar.symbol_named("number").unwrap());
        assert_eq!(token.range, TextRange::new(TextSize::new(2), TextSize::new(4)));
        assert_eq!(scanner.scan(TextSize::new(4), &valid), Lexed::Eof);
    }

    #[test]
    fn test_unexpected_byte() {
        let grammar = ident_grammar();
        let lex = LexTable::build(&grammar).unwrap();
        let scanner = Scanner::new("§", &lex);
        let valid = all_terminals(&grammar);
        assert_eq!(
            scanner.scan(TextSize::new(0), &valid),
            Lexed::UnexpectedByte(TextSize::new(0))
        );
    }
}
