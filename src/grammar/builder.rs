//! Structured declarative form accepted by the grammar model.

use super::validate;
use super::{
    Assoc, Grammar, GrammarError, Precedence, Production, SymbolId, SymbolInfo, SymbolKind,
};
use crate::base::ProductionId;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

/// One element of a production right-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elem {
    /// Reference to a named terminal (declared via `token` or `external`).
    Token(SmolStr),
    /// Anonymous literal terminal, interned on first use.
    Literal(SmolStr),
    /// Reference to a rule (non-terminal).
    Rule(SmolStr),
}

/// Reference a named terminal.
pub fn tok(name: &str) -> Elem {
    Elem::Token(name.into())
}

/// An anonymous literal terminal such as `"+"` or `"if"`.
pub fn lit(text: &str) -> Elem {
    Elem::Literal(text.into())
}

/// Reference a rule (non-terminal).
pub fn nt(name: &str) -> Elem {
    Elem::Rule(name.into())
}

/// One alternative of a rule: a symbol sequence plus optional precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub elems: Vec<Elem>,
    pub precedence: Option<SmolStr>,
}

/// Build an alternative from a symbol sequence. An empty sequence is an
/// epsilon production.
pub fn alt<I: IntoIterator<Item = Elem>>(elems: I) -> Alternative {
    Alternative {
        elems: elems.into_iter().collect(),
        precedence: None,
    }
}

impl Alternative {
    /// Attach a declared precedence level to this alternative.
    pub fn prec(mut self, level: &str) -> Self {
        self.precedence = Some(level.into());
        self
    }
}

#[derive(Debug, Clone)]
struct TokenDef {
    pattern: String,
    priority: i32,
}

/// Accepts a declarative grammar description and produces a validated,
/// normalized [`Grammar`].
///
/// Declaration order is significant: it is the final tie-break for lexical
/// and parse-table conflicts, so rules and terminals are kept in insertion
/// order throughout.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    rules: IndexMap<SmolStr, Vec<Alternative>>,
    tokens: IndexMap<SmolStr, TokenDef>,
    externals: IndexSet<SmolStr>,
    extras: Vec<SmolStr>,
    precedence: IndexMap<SmolStr, (i32, Assoc)>,
    hidden: FxHashSet<SmolStr>,
    start: Option<SmolStr>,
    expected_conflicts: Vec<Vec<SmolStr>>,
    duplicate: Option<SmolStr>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named terminal with a lexical pattern.
    pub fn token(&mut self, name: &str, pattern: &str) -> &mut Self {
        self.token_with_priority(name, pattern, 0)
    }

    /// Declare a named terminal with a lexical pattern and an explicit
    /// match priority (higher wins ties among equal-length matches).
    pub fn token_with_priority(&mut self, name: &str, pattern: &str, priority: i32) -> &mut Self {
        self.note_name(name);
        self.tokens.insert(
            name.into(),
            TokenDef {
                pattern: pattern.to_string(),
                priority,
            },
        );
        self
    }

    /// Declare a terminal recognized by a host-registered external scanner.
    pub fn external(&mut self, name: &str) -> &mut Self {
        self.note_name(name);
        self.externals.insert(name.into());
        self
    }

    /// Mark a declared terminal as trivia: valid between any two tokens.
    pub fn extra(&mut self, name: &str) -> &mut Self {
        self.extras.push(name.into());
        self
    }

    /// Declare a precedence level with its associativity.
    pub fn precedence(&mut self, name: &str, level: i32, assoc: Assoc) -> &mut Self {
        self.precedence.insert(name.into(), (level, assoc));
        self
    }

    /// Declare a rule as a list of alternatives. The first declared rule is
    /// the default start rule.
    pub fn rule<I: IntoIterator<Item = Alternative>>(&mut self, name: &str, alts: I) -> &mut Self {
        self.note_name(name);
        self.rules.insert(name.into(), alts.into_iter().collect());
        self
    }

    /// Hide a rule: its node is spliced into the parent instead of appearing
    /// in the tree.
    pub fn hide(&mut self, name: &str) -> &mut Self {
        self.hidden.insert(name.into());
        self
    }

    /// Designate the start rule explicitly.
    pub fn start(&mut self, name: &str) -> &mut Self {
        self.start = Some(name.into());
        self
    }

    /// Declare a set of rules whose conflicts are acceptable local
    /// ambiguity, to be explored by generalized parsing rather than
    /// resolved at compile time.
    pub fn expected_conflict(&mut self, rules: &[&str]) -> &mut Self {
        self.expected_conflicts
            .push(rules.iter().map(|r| SmolStr::from(*r)).collect());
        self
    }

    fn note_name(&mut self, name: &str) {
        let taken = self.rules.contains_key(name)
            || self.tokens.contains_key(name)
            || self.externals.contains(name);
        if taken && self.duplicate.is_none() {
            self.duplicate = Some(name.into());
        }
    }

    /// Validate and flatten into a [`Grammar`].
    pub fn build(&self) -> Result<Grammar, GrammarError> {
        if let Some(name) = &self.duplicate {
            return Err(GrammarError::DuplicateSymbol(name.clone()));
        }

        let start_name = match self.start.clone().or_else(|| {
            self.rules.keys().next().cloned()
        }) {
            Some(name) => name,
            None => return Err(GrammarError::UndefinedStart("<none>".into())),
        };
        if !self.rules.contains_key(&start_name) {
            return Err(GrammarError::UndefinedStart(start_name));
        }

        // Symbol table layout: named tokens, literals (first-use order),
        // externals, end-of-input, then rules.
        let mut symbols: Vec<SymbolInfo> = Vec::new();
        let mut literal_ids: IndexMap<SmolStr, SymbolId> = IndexMap::new();

        for (name, def) in &self.tokens {
            symbols.push(SymbolInfo {
                name: name.clone(),
                kind: SymbolKind::Token {
                    pattern: def.pattern.clone(),
                    priority: def.priority,
                },
            });
        }
        for (_, alts) in &self.rules {
            for alternative in alts {
                for elem in &alternative.elems {
                    if let Elem::Literal(text) = elem {
                        literal_ids.entry(text.clone()).or_insert_with(|| {
                            symbols.push(SymbolInfo {
                                name: text.clone(),
                                kind: SymbolKind::Literal,
                            });
                            SymbolId((symbols.len() - 1) as u16)
                        });
                    }
                }
            }
        }
        for name in &self.externals {
            symbols.push(SymbolInfo {
                name: name.clone(),
                kind: SymbolKind::External,
            });
        }
        let eof = SymbolId(symbols.len() as u16);
        symbols.push(SymbolInfo {
            name: "<eof>".into(),
            kind: SymbolKind::Literal,
        });
        let terminal_count = symbols.len() as u16;

        let mut rule_ids: IndexMap<SmolStr, SymbolId> = IndexMap::new();
        for (name, _) in &self.rules {
            rule_ids.insert(name.clone(), SymbolId(symbols.len() as u16));
            symbols.push(SymbolInfo {
                name: name.clone(),
                kind: SymbolKind::Rule {
                    hidden: self.hidden.contains(name),
                },
            });
        }

        // Reserved node kinds sit at the top of the u16 range.
        if symbols.len() > (u16::MAX - 8) as usize {
            return Err(GrammarError::TooManySymbols(symbols.len()));
        }

        let token_id = |name: &SmolStr| -> Option<SymbolId> {
            self.tokens
                .get_index_of(name)
                .map(|i| SymbolId(i as u16))
                .or_else(|| {
                    self.externals.get_index_of(name).map(|i| {
                        SymbolId((self.tokens.len() + literal_ids.len() + i) as u16)
                    })
                })
        };

        // Flatten rule alternatives into productions.
        let mut productions: Vec<Production> = Vec::new();
        let mut prods_by_rule: Vec<Vec<ProductionId>> = vec![Vec::new(); self.rules.len()];
        for (rule_idx, (rule_name, alts)) in self.rules.iter().enumerate() {
            if alts.is_empty() {
                return Err(GrammarError::EmptyRule(rule_name.clone()));
            }
            let lhs = rule_ids[rule_name];
            for alternative in alts {
                let mut rhs = Vec::with_capacity(alternative.elems.len());
                for elem in &alternative.elems {
                    let id = match elem {
                        Elem::Token(name) => token_id(name).ok_or_else(|| {
                            GrammarError::UndefinedSymbol {
                                name: name.clone(),
                                in_rule: rule_name.clone(),
                            }
                        })?,
                        Elem::Literal(text) => literal_ids[text],
                        Elem::Rule(name) => *rule_ids.get(name).ok_or_else(|| {
                            GrammarError::UndefinedSymbol {
                                name: name.clone(),
                                in_rule: rule_name.clone(),
                            }
                        })?,
                    };
                    rhs.push(id);
                }
                let precedence = match &alternative.precedence {
                    Some(level_name) => {
                        let (level, assoc) = *self.precedence.get(level_name).ok_or_else(|| {
                            GrammarError::UnknownPrecedence {
                                name: level_name.clone(),
                                in_rule: rule_name.clone(),
                            }
                        })?;
                        Some(Precedence { level, assoc })
                    }
                    None => None,
                };
                prods_by_rule[rule_idx].push(ProductionId(productions.len() as u32));
                productions.push(Production { lhs, rhs, precedence });
            }
        }

        let mut extras = Vec::with_capacity(self.extras.len());
        for name in &self.extras {
            let id = token_id(name).ok_or_else(|| GrammarError::UndefinedSymbol {
                name: name.clone(),
                in_rule: "<extras>".into(),
            })?;
            extras.push(id);
        }

        let mut expected_conflicts = Vec::with_capacity(self.expected_conflicts.len());
        for set in &self.expected_conflicts {
            let mut ids = Vec::with_capacity(set.len());
            for name in set {
                let id = *rule_ids.get(name).ok_or_else(|| GrammarError::UndefinedSymbol {
                    name: name.clone(),
                    in_rule: "<conflicts>".into(),
                })?;
                ids.push(id);
            }
            expected_conflicts.push(ids);
        }

        let grammar = Grammar {
            symbols,
            productions,
            prods_by_rule,
            terminal_count,
            start: rule_ids[&start_name],
            eof,
            extras,
            expected_conflicts,
        };
        validate::check(&grammar)?;
        Ok(grammar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arith() -> GrammarBuilder {
        let mut g = GrammarBuilder::new();
        g.token("number", "[0-9]+");
        g.precedence("sum", 1, Assoc::Left);
        g.rule(
            "expr",
            [
                alt([nt("expr"), lit("+"), nt("expr")]).prec("sum"),
                alt([tok("number")]),
            ],
        );
        g
    }

    #[test]
    fn test_build_arith() {
        let grammar = arith().build().unwrap();
        assert_eq!(grammar.production_count(), 2);
        assert_eq!(grammar.name(grammar.start()), "expr");
        // number, "+", <eof> are the terminals
        assert_eq!(grammar.terminal_count(), 3);
        let plus = grammar.symbol_named("+").unwrap();
        assert!(grammar.is_terminal(plus));
        assert_eq!(
            grammar.production(ProductionId(0)).precedence,
            Some(Precedence { level: 1, assoc: Assoc::Left })
        );
    }

    #[test]
    fn test_undefined_symbol() {
        let mut g = arith();
        g.rule("stmt", [alt([nt("missing")])]);
        g.start("stmt");
        let err = g.build().unwrap_err();
        assert!(matches!(err, GrammarError::UndefinedSymbol { .. }));
    }

    #[test]
    fn test_undefined_start() {
        let mut g = arith();
        g.start("nope");
        assert_eq!(
            g.build().unwrap_err(),
            GrammarError::UndefinedStart("nope".into())
        );
    }

    #[test]
    fn test_empty_grammar() {
        let g = GrammarBuilder::new();
        assert!(matches!(g.build().unwrap_err(), GrammarError::UndefinedStart(_)));
    }

    #[test]
    fn test_unknown_precedence() {
        let mut g = GrammarBuilder::new();
        g.token("number", "[0-9]+");
        g.rule("expr", [alt([tok("number")]).prec("nope")]);
        assert!(matches!(
            g.build().unwrap_err(),
            GrammarError::UnknownPrecedence { .. }
        ));
    }

    #[test]
    fn test_unreachable_rule() {
        let mut g = arith();
        g.rule("orphan", [alt([tok("number")])]);
        assert_eq!(
            g.build().unwrap_err(),
            GrammarError::UnreachableRule("orphan".into())
        );
    }

    #[test]
    fn test_duplicate_symbol() {
        let mut g = arith();
        g.token("expr", "x");
        assert_eq!(
            g.build().unwrap_err(),
            GrammarError::DuplicateSymbol("expr".into())
        );
    }

    #[test]
    fn test_extras_and_externals() {
        let mut g = arith();
        g.token("space", r"\s+");
        g.extra("space");
        g.external("heredoc");
        let grammar = g.build().unwrap();
        let space = grammar.symbol_named("space").unwrap();
        assert_eq!(grammar.extras(), &[space]);
        let heredoc = grammar.symbol_named("heredoc").unwrap();
        assert!(grammar.is_external(heredoc));
        assert!(grammar.is_terminal(heredoc));
    }
}
