//! Index newtypes into the flat grammar tables.
//!
//! Grammars are cyclic reference graphs (deep recursion, mutual rule
//! references), so symbols and productions are addressed by integer index
//! into flat arrays rather than by direct object reference.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a grammar symbol (terminal or non-terminal).
///
/// Terminals occupy the low indices, in declaration order, followed by the
/// reserved end-of-input terminal; non-terminals follow. See
/// `Grammar::terminal_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u16);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Identifies a production (one alternative of a rule).
///
/// Production 0 is always the augmented start production added by the table
/// compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductionId(pub u32);

impl ProductionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProductionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Identifies a state in the compiled parse table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub u32);

impl StateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state {}", self.0)
    }
}
