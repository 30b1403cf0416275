//! Post-build validation of the flattened grammar.

use super::{Grammar, GrammarError};
use rustc_hash::FxHashSet;

/// Check invariants that only hold for the whole grammar: every rule must
/// be reachable from the start rule.
pub(super) fn check(grammar: &Grammar) -> Result<(), GrammarError> {
    let mut reachable = FxHashSet::default();
    let mut worklist = vec![grammar.start()];
    reachable.insert(grammar.start());
    while let Some(rule) = worklist.pop() {
        for &prod_id in grammar.productions_of(rule) {
            for &sym in &grammar.production(prod_id).rhs {
                if !grammar.is_terminal(sym) && reachable.insert(sym) {
                    worklist.push(sym);
                }
            }
        }
    }

    for (i, info) in grammar.symbols().iter().enumerate() {
        if info.is_terminal() {
            continue;
        }
        let id = crate::base::SymbolId(i as u16);
        if !reachable.contains(&id) {
            return Err(GrammarError::UnreachableRule(info.name.clone()));
        }
    }
    Ok(())
}
