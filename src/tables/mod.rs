//! Table compiler: turns a [`Grammar`] into the deterministic
//! state-transition tables the runtime engine drives.
//!
//! The compiler builds an LR(1) item-set automaton over the grammar. For
//! each state and lookahead it determines the legal actions; genuine
//! ambiguities are either resolved deterministically (precedence, then
//! associativity, then declaration order — the last recorded as an
//! [`UnresolvedConflictWarning`]) or, when covered by a declared expected
//! conflict, retained for runtime generalized parsing bounded by
//! [`CompileOptions::max_parallel_stacks`].
//!
//! The compiled [`Language`] is immutable, shared read-only by any number
//! of concurrent parses, and serializable as a versioned artifact.

mod artifact;
mod build;
mod first;
mod items;

pub use artifact::{ABI_VERSION, ArtifactError};

use crate::base::{ProductionId, StateId, SymbolId, TokenSet};
use crate::grammar::{Grammar, GrammarError};
use crate::lexer::LexTable;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// One table action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
}

/// A node in the compiled table: transitions for one parse state.
///
/// A cell usually holds one action; it holds several only where the
/// grammar declared the ambiguity acceptable for generalized parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseState {
    /// Indexed by terminal symbol id.
    actions: Vec<Vec<Action>>,
    /// Indexed by non-terminal ordinal.
    gotos: Vec<Option<StateId>>,
    /// Terminals with at least one action: the scanner's valid set.
    valid: TokenSet,
}

/// The compiled shift/reduce/goto table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseTable {
    states: Vec<ParseState>,
    start_state: StateId,
}

impl ParseTable {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn start_state(&self) -> StateId {
        self.start_state
    }

    pub(crate) fn actions(&self, state: StateId, terminal: SymbolId) -> &[Action] {
        &self.states[state.index()].actions[terminal.index()]
    }

    pub(crate) fn goto(&self, state: StateId, nt_ordinal: usize) -> Option<StateId> {
        self.states[state.index()].gotos[nt_ordinal]
    }

    pub(crate) fn valid(&self, state: StateId) -> &TokenSet {
        &self.states[state.index()].valid
    }
}

/// A compile-time ambiguity that was resolved only by the default
/// declaration-order tie-break, kept so grammar authors can audit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedConflictWarning {
    pub state: StateId,
    pub lookahead: SmolStr,
    pub chosen: SmolStr,
    pub discarded: Vec<SmolStr>,
}

impl fmt::Display for UnresolvedConflictWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflict on `{}` in {}: chose {}, discarded {}",
            self.lookahead,
            self.state,
            self.chosen,
            self.discarded.join(", "),
        )
    }
}

/// Knobs for table compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Maximum simultaneous alternative stacks generalized parsing may
    /// explore; ambiguity cells wider than this are a compile error.
    pub max_parallel_stacks: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_parallel_stacks: 16,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct LanguageData {
    pub grammar: Grammar,
    pub table: ParseTable,
    pub lex: LexTable,
    pub warnings: Vec<UnresolvedConflictWarning>,
    pub max_stacks: u32,
}

/// A compiled grammar: the immutable artifact shared read-only by every
/// parse of that language. Cloning is cheap (a reference-count bump).
#[derive(Debug, Clone)]
pub struct Language {
    data: Arc<LanguageData>,
}

impl Language {
    /// Compile a grammar with default options.
    pub fn compile(grammar: Grammar) -> Result<Language, GrammarError> {
        Self::compile_with(grammar, CompileOptions::default())
    }

    pub fn compile_with(
        grammar: Grammar,
        options: CompileOptions,
    ) -> Result<Language, GrammarError> {
        let lex = LexTable::build(&grammar)?;
        let (table, warnings) = build::build_table(&grammar, &options)?;
        debug!(
            states = table.state_count(),
            warnings = warnings.len(),
            start = grammar.name(grammar.start()),
            "grammar compiled"
        );
        for warning in &warnings {
            warn!(%warning, "conflict resolved by declaration order");
        }
        Ok(Language {
            data: Arc::new(LanguageData {
                grammar,
                table,
                lex,
                warnings,
                max_stacks: options.max_parallel_stacks as u32,
            }),
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.data.grammar
    }

    /// Ambiguities resolved only by declaration-order tie-break.
    pub fn warnings(&self) -> &[UnresolvedConflictWarning] {
        &self.data.warnings
    }

    pub fn max_stacks(&self) -> usize {
        self.data.max_stacks as usize
    }

    pub(crate) fn table(&self) -> &ParseTable {
        &self.data.table
    }

    pub(crate) fn lex(&self) -> &LexTable {
        &self.data.lex
    }

    pub(crate) fn from_data(data: LanguageData) -> Language {
        Language {
            data: Arc::new(data),
        }
    }

    pub(crate) fn data(&self) -> &LanguageData {
        &self.data
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data) || self.data == other.data
    }
}
