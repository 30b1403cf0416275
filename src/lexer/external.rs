//! External scanner hooks for context-sensitive tokens.

use super::ScannedToken;
use crate::base::{SymbolId, TextSize, TokenSet};

/// Host-provided recognizer for tokens the lexical automaton cannot
/// express (indentation, string interpolation, heredocs).
///
/// The engine consults registered external scanners before the automaton
/// whenever the current parse state's valid lookahead set contains an
/// external terminal. The scanner sees the raw text, the offset to scan
/// from, the terminal being requested, and the full valid set; it returns
/// a token starting exactly at that offset, or `None`.
///
/// Implementations may keep internal state across calls within one parse.
/// To support incremental re-lexing from an arbitrary offset, that state
/// must round-trip through [`serialize_state`](Self::serialize_state) /
/// [`restore_state`](Self::restore_state): the engine snapshots it after
/// every external token and restores the snapshot taken at a reuse boundary
/// before scanning resumes there.
pub trait ExternalScanner: Send {
    fn scan(
        &mut self,
        text: &str,
        offset: TextSize,
        terminal: SymbolId,
        valid: &TokenSet,
    ) -> Option<ScannedToken>;

    /// Snapshot of the scanner's internal state. Stateless scanners keep
    /// the default.
    fn serialize_state(&self) -> Vec<u8> {
        Vec::new()
    }

    fn restore_state(&mut self, _state: &[u8]) {}
}
