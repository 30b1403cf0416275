//! # canopy
//!
//! Grammar compilation and incremental, error-tolerant parsing with
//! lossless syntax trees.
//!
//! A declarative grammar description goes in one end; out the other comes
//! a compiled language whose parser produces a concrete syntax tree for
//! *any* input — valid or not — and can cheaply re-parse after small edits
//! by reusing unaffected subtrees.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! parse    → incremental engine: stack forest, recovery, subtree reuse
//!   ↓
//! tree     → rowan-based CST, Node accessors, text edits
//!   ↓
//! tables   → LR(1) compiler, conflict resolution, versioned artifacts
//!   ↓
//! lexer    → pattern NFA, valid-set-driven scanner, external hooks
//!   ↓
//! grammar  → builder, validation, flattened symbol/production tables
//!   ↓
//! base     → ids, byte offsets, line index, token sets
//! ```
//!
//! ## Quick tour
//!
//! ```
//! use canopy::{Assoc, GrammarBuilder, InputEdit, Language, Parser, alt, lit, nt, tok};
//!
//! let mut g = GrammarBuilder::new();
//! g.token("number", "[0-9]+");
//! g.precedence("sum", 1, Assoc::Left);
//! g.rule(
//!     "expr",
//!     [
//!         alt([nt("expr"), lit("+"), nt("expr")]).prec("sum"),
//!         alt([tok("number")]),
//!     ],
//! );
//! let language = Language::compile(g.build()?)?;
//!
//! let mut parser = Parser::new(language);
//! let tree = parser.parse("1+2+3", None).unwrap();
//! assert!(!tree.has_error());
//!
//! // Edit "1+2+3" into "1+20+3", then re-parse incrementally.
//! let edited = tree.edit(&InputEdit::insert(3.into(), "0"));
//! let tree2 = parser.parse("1+20+3", Some(&edited)).unwrap();
//! assert_eq!(tree2.text(), "1+20+3");
//! # Ok::<(), canopy::GrammarError>(())
//! ```

// ============================================================================
// MODULES (dependency order: base → grammar → lexer → tables → tree → parse)
// ============================================================================

/// Foundation types: symbol/production/state ids, TextRange, TokenSet
pub mod base;

/// Grammar model: builder, validation, flattened tables
pub mod grammar;

/// Lexer: pattern automaton, scanner, external scanner hooks
pub mod lexer;

/// Table compiler: LR(1) construction, conflicts, compiled artifacts
pub mod tables;

/// Tree/edit model: rowan CST, node accessors, text edits
pub mod tree;

/// Incremental parser engine: stack forest, recovery, reuse
pub mod parse;

// Re-export the host embedding surface
pub use base::{LineCol, LineIndex, ProductionId, StateId, SymbolId, TextRange, TextSize, TokenSet};
pub use grammar::{
    Alternative, Assoc, Elem, Grammar, GrammarBuilder, GrammarError, alt, lit, nt, tok,
};
pub use lexer::ExternalScanner;
pub use parse::{ParseError, ParseOptions, Parser};
pub use tables::{ABI_VERSION, ArtifactError, CompileOptions, Language, UnresolvedConflictWarning};
pub use tree::{InputEdit, Node, NodeKind, Tree};
