//! Incremental parser engine.
//!
//! [`Parser`] drives the compiled tables against a token stream, keeping
//! one parse stack — or a bounded forest of alternatives where the grammar
//! declared local ambiguity — and always produces a tree spanning the whole
//! input: syntax problems become error/missing markers, never failures.
//! The only host-visible errors are resource caps.
//!
//! Parsing is single-threaded cooperative; the engine never spawns threads
//! and never blocks on I/O (the full source is handed in up front).
//! Independent parses may run concurrently on their own parsers, sharing
//! one [`Language`] read-only.

mod engine;
mod reuse;
mod stack;

use crate::base::SymbolId;
use crate::grammar::GrammarError;
use crate::lexer::ExternalScanner;
use crate::tables::Language;
use crate::tree::Tree;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failures a parse can surface to the host. Syntax errors are not here:
/// they are recovered into the tree.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The cancellation token was signalled. No new tree is produced; any
    /// prior tree remains valid.
    #[error("parse cancelled")]
    Cancelled,

    /// The configured operation cap was exceeded.
    #[error("parse exceeded its operation limit")]
    Exhausted,
}

/// Per-parse resource limits.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Cap on total engine operations; exceeding it aborts the parse with
    /// [`ParseError::Exhausted`].
    pub op_limit: Option<u64>,
    /// Cooperative cancellation, checked between steps.
    pub cancellation: Option<CancellationToken>,
    /// Override for the language's generalized-parsing stack bound.
    pub max_stacks: Option<usize>,
}

/// A parser for one compiled language.
///
/// Owns the mutable per-parse machinery (external scanners, options); the
/// language itself is shared and immutable.
pub struct Parser {
    language: Language,
    externals: FxHashMap<SymbolId, Box<dyn ExternalScanner>>,
    options: ParseOptions,
}

impl Parser {
    pub fn new(language: Language) -> Parser {
        Parser {
            language,
            externals: FxHashMap::default(),
            options: ParseOptions::default(),
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn set_options(&mut self, options: ParseOptions) {
        self.options = options;
    }

    /// Attach an external scanner for a terminal declared with
    /// `GrammarBuilder::external`.
    pub fn set_external_scanner(
        &mut self,
        name: &str,
        scanner: Box<dyn ExternalScanner>,
    ) -> Result<(), GrammarError> {
        let grammar = self.language.grammar();
        let terminal = grammar
            .symbol_named(name)
            .filter(|&sym| grammar.is_external(sym))
            .ok_or_else(|| GrammarError::UndefinedSymbol {
                name: name.into(),
                in_rule: "<externals>".into(),
            })?;
        self.externals.insert(terminal, scanner);
        Ok(())
    }

    /// Parse `text`, reusing unaffected structure from `old_tree` when one
    /// is given (it must describe the same text, i.e. come from
    /// [`Tree::edit`] applications mirroring the text's edits).
    pub fn parse(&mut self, text: &str, old_tree: Option<&Tree>) -> Result<Tree, ParseError> {
        debug_assert!(text.len() <= u32::MAX as usize, "input too large");
        let engine = engine::Engine::new(
            &self.language,
            text,
            old_tree.filter(|t| u32::from(t.len()) as usize == text.len()),
            &mut self.externals,
            &self.options,
        );
        let tree = engine.run()?;
        debug!(
            bytes = text.len(),
            incremental = old_tree.is_some(),
            has_error = tree.has_error(),
            "parse finished"
        );
        Ok(tree)
    }
}
