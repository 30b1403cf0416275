//! FIRST sets and nullability, computed to fixpoint over the flat symbol
//! tables.

use crate::base::{SymbolId, TokenSet};
use crate::grammar::Grammar;

pub(crate) struct FirstSets {
    /// Indexed by symbol id. Terminals contain themselves.
    first: Vec<TokenSet>,
    nullable: Vec<bool>,
}

impl FirstSets {
    pub(crate) fn compute(grammar: &Grammar) -> FirstSets {
        let n = grammar.symbol_count();
        let mut first = vec![TokenSet::new(grammar.terminal_count()); n];
        let mut nullable = vec![false; n];
        for i in 0..grammar.terminal_count() {
            first[i].insert(SymbolId(i as u16));
        }

        let mut changed = true;
        while changed {
            changed = false;
            for p in 0..grammar.production_count() {
                let prod = grammar.production(crate::base::ProductionId(p as u32));
                let lhs = prod.lhs.index();
                let mut all_nullable = true;
                for &sym in &prod.rhs {
                    let sym_first = first[sym.index()].clone();
                    let before = first[lhs].len();
                    first[lhs].union_with(&sym_first);
                    if first[lhs].len() != before {
                        changed = true;
                    }
                    if !nullable[sym.index()] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !nullable[lhs] {
                    nullable[lhs] = true;
                    changed = true;
                }
            }
        }
        FirstSets { first, nullable }
    }

    pub(crate) fn nullable(&self, sym: SymbolId) -> bool {
        self.nullable[sym.index()]
    }

    /// FIRST of a symbol sequence followed by a terminal lookahead.
    pub(crate) fn first_of_seq(&self, seq: &[SymbolId], tail: SymbolId) -> TokenSet {
        let mut out = TokenSet::default();
        for &sym in seq {
            out.union_with(&self.first[sym.index()]);
            if !self.nullable(sym) {
                return out;
            }
        }
        out.insert(tail);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarBuilder, alt, lit, nt, tok};

    #[test]
    fn test_first_through_nullable() {
        let mut g = GrammarBuilder::new();
        g.token("x", "x");
        g.rule("s", [alt([nt("opt"), tok("x")])]);
        g.rule("opt", [alt([lit("!")]), alt([])]);
        let grammar = g.build().unwrap();
        let firsts = FirstSets::compute(&grammar);

        let s = grammar.symbol_named("s").unwrap();
        let opt = grammar.symbol_named("opt").unwrap();
        let x = grammar.symbol_named("x").unwrap();
        let bang = grammar.symbol_named("!").unwrap();

        assert!(firsts.nullable(opt));
        assert!(!firsts.nullable(s));
        let first_s = firsts.first_of_seq(&[s], grammar.eof());
        assert!(first_s.contains(x));
        assert!(first_s.contains(bang));
        assert!(!first_s.contains(grammar.eof()));
    }
}
