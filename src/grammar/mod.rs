//! Grammar model: validated, normalized in-memory representation of a
//! declarative grammar description.
//!
//! A grammar arrives through [`GrammarBuilder`] as rule name → list of
//! alternative symbol sequences, plus terminal patterns, precedence levels
//! with associativity, extras (trivia terminals), external terminals, and a
//! designated start rule. `build()` validates the description and flattens
//! it into index-based tables: symbols and productions live in flat arrays
//! and refer to each other by [`SymbolId`]/[`ProductionId`], so the cyclic
//! rule graph carries no ownership cycles.
//!
//! The built [`Grammar`] is immutable and performs no I/O.

mod builder;
mod validate;

pub use builder::{Alternative, Elem, GrammarBuilder, alt, lit, nt, tok};

use crate::base::{ProductionId, SymbolId, TokenSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

/// Errors detected while building or compiling a grammar.
///
/// Anything discovered at this stage is fatal to the compilation; nothing
/// here can occur while parsing text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// A rule body references a symbol that was never declared.
    #[error("undefined symbol `{name}` referenced from rule `{in_rule}`")]
    UndefinedSymbol { name: SmolStr, in_rule: SmolStr },

    /// The designated start rule does not exist (or the grammar has no rules).
    #[error("start rule `{0}` is not defined")]
    UndefinedStart(SmolStr),

    /// A rule is not reachable from the start rule.
    #[error("rule `{0}` is unreachable from the start rule")]
    UnreachableRule(SmolStr),

    /// A production references a precedence level that was never declared.
    #[error("unknown precedence level `{name}` in rule `{in_rule}`")]
    UnknownPrecedence { name: SmolStr, in_rule: SmolStr },

    /// A rule was declared with no alternatives.
    #[error("rule `{0}` has no productions")]
    EmptyRule(SmolStr),

    /// A name was declared twice (rules and terminals share one namespace).
    #[error("symbol `{0}` is declared more than once")]
    DuplicateSymbol(SmolStr),

    /// A terminal pattern failed to parse or can match the empty string.
    #[error("invalid pattern for terminal `{name}`: {reason}")]
    BadPattern { name: SmolStr, reason: String },

    /// A declared-acceptable ambiguity would require more simultaneous
    /// actions than the configured generalized-parsing bound.
    #[error(
        "grammar is ambiguous beyond the configured bound in state {state}: \
         {count} simultaneous actions on `{lookahead}` (max {bound})"
    )]
    AmbiguityBound {
        state: u32,
        lookahead: SmolStr,
        count: usize,
        bound: usize,
    },

    /// The grammar exceeds the symbol index space.
    #[error("grammar defines too many symbols ({0})")]
    TooManySymbols(usize),
}

/// Associativity of a precedence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assoc {
    Left,
    Right,
    None,
}

/// A resolved precedence annotation on a production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precedence {
    pub level: i32,
    pub assoc: Assoc,
}

/// What a symbol is, and how it is recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Named terminal matched by a lexical pattern.
    Token { pattern: String, priority: i32 },
    /// Anonymous terminal matched by its exact text (the symbol name).
    Literal,
    /// Terminal recognized by a host-registered external scanner.
    External,
    /// Non-terminal expanded via productions. Hidden rules are inlined into
    /// their parent node in the tree.
    Rule { hidden: bool },
}

/// One entry in the flat symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: SmolStr,
    pub kind: SymbolKind,
}

impl SymbolInfo {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, SymbolKind::Rule { .. })
    }
}

/// An ordered sequence of symbols with optional precedence metadata.
///
/// Owned by the grammar; immutable after build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
    pub precedence: Option<Precedence>,
}

/// A validated, normalized grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    symbols: Vec<SymbolInfo>,
    productions: Vec<Production>,
    /// Productions of each non-terminal, indexed by non-terminal ordinal.
    prods_by_rule: Vec<Vec<ProductionId>>,
    /// Number of terminal symbols, including the reserved end-of-input
    /// terminal. Terminals occupy symbol ids `0..terminal_count`.
    terminal_count: u16,
    start: SymbolId,
    eof: SymbolId,
    extras: Vec<SymbolId>,
    expected_conflicts: Vec<Vec<SymbolId>>,
}

impl Grammar {
    pub fn symbol(&self, id: SymbolId) -> &SymbolInfo {
        &self.symbols[id.index()]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.symbols[id.index()].name
    }

    pub fn symbol_named(&self, name: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|s| s.name == name)
            .map(|i| SymbolId(i as u16))
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Terminal count, end-of-input included.
    pub fn terminal_count(&self) -> usize {
        self.terminal_count as usize
    }

    pub fn nonterminal_count(&self) -> usize {
        self.symbols.len() - self.terminal_count as usize
    }

    pub fn is_terminal(&self, id: SymbolId) -> bool {
        id.0 < self.terminal_count
    }

    /// Ordinal of a non-terminal within the non-terminal block.
    pub fn nt_ordinal(&self, id: SymbolId) -> usize {
        debug_assert!(!self.is_terminal(id));
        (id.0 - self.terminal_count) as usize
    }

    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id.index()]
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    pub fn productions_of(&self, rule: SymbolId) -> &[ProductionId] {
        &self.prods_by_rule[self.nt_ordinal(rule)]
    }

    pub fn start(&self) -> SymbolId {
        self.start
    }

    pub fn eof(&self) -> SymbolId {
        self.eof
    }

    pub fn extras(&self) -> &[SymbolId] {
        &self.extras
    }

    pub fn extras_set(&self) -> TokenSet {
        self.extras.iter().copied().collect()
    }

    pub fn is_hidden(&self, id: SymbolId) -> bool {
        matches!(self.symbols[id.index()].kind, SymbolKind::Rule { hidden: true })
    }

    pub fn is_external(&self, id: SymbolId) -> bool {
        matches!(self.symbols[id.index()].kind, SymbolKind::External)
    }

    /// Declared-acceptable local ambiguities: sets of rule symbols whose
    /// conflicts the table compiler keeps for generalized parsing.
    pub fn expected_conflicts(&self) -> &[Vec<SymbolId>] {
        &self.expected_conflicts
    }

    /// All symbols, terminals first.
    pub fn symbols(&self) -> &[SymbolInfo] {
        &self.symbols
    }

    /// Human-readable rendering of a production, for diagnostics.
    pub fn describe_production(&self, id: ProductionId) -> String {
        let prod = self.production(id);
        let mut out = format!("{} :=", self.name(prod.lhs));
        if prod.rhs.is_empty() {
            out.push_str(" <empty>");
        }
        for &sym in &prod.rhs {
            out.push(' ');
            out.push_str(self.name(sym));
        }
        out
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "grammar: {} symbols ({} terminals), {} productions, start `{}`",
            self.symbols.len(),
            self.terminal_count,
            self.productions.len(),
            self.name(self.start),
        )?;
        for i in 0..self.productions.len() {
            writeln!(f, "  {}", self.describe_production(ProductionId(i as u32)))?;
        }
        Ok(())
    }
}
