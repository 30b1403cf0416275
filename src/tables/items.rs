//! LR(1) items and item-set operations.

use super::first::FirstSets;
use crate::base::{ProductionId, SymbolId};
use crate::grammar::{Grammar, Precedence};
use std::collections::{BTreeMap, BTreeSet};

/// An LR(1) item: a production, a dot position, and one terminal lookahead.
///
/// `prod == ProdView::augmented_id()` is the synthetic start production
/// `__start := <start rule>`, which never appears in the grammar itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Item {
    pub prod: u32,
    pub dot: u16,
    pub lookahead: SymbolId,
}

/// View over grammar productions plus the augmented start production.
pub(crate) struct ProdView<'g> {
    grammar: &'g Grammar,
    aug_rhs: [SymbolId; 1],
}

impl<'g> ProdView<'g> {
    pub(crate) fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            aug_rhs: [grammar.start()],
        }
    }

    pub(crate) fn augmented_id(&self) -> u32 {
        self.grammar.production_count() as u32
    }

    pub(crate) fn rhs(&self, prod: u32) -> &[SymbolId] {
        if prod == self.augmented_id() {
            &self.aug_rhs
        } else {
            &self.grammar.production(ProductionId(prod)).rhs
        }
    }

    /// `None` for the augmented production.
    pub(crate) fn lhs(&self, prod: u32) -> Option<SymbolId> {
        if prod == self.augmented_id() {
            None
        } else {
            Some(self.grammar.production(ProductionId(prod)).lhs)
        }
    }

    pub(crate) fn precedence(&self, prod: u32) -> Option<Precedence> {
        if prod == self.augmented_id() {
            None
        } else {
            self.grammar.production(ProductionId(prod)).precedence
        }
    }

    /// The symbol after the dot, if the item is not complete.
    pub(crate) fn next_symbol(&self, item: Item) -> Option<SymbolId> {
        self.rhs(item.prod).get(item.dot as usize).copied()
    }

    /// Close an item set under non-terminal expansion.
    pub(crate) fn closure(&self, items: &mut BTreeSet<Item>, firsts: &FirstSets) {
        let mut worklist: Vec<Item> = items.iter().copied().collect();
        while let Some(item) = worklist.pop() {
            let rhs = self.rhs(item.prod);
            let Some(&next) = rhs.get(item.dot as usize) else {
                continue;
            };
            if self.grammar.is_terminal(next) {
                continue;
            }
            let lookaheads = firsts.first_of_seq(&rhs[item.dot as usize + 1..], item.lookahead);
            for &prod in self.grammar.productions_of(next) {
                for lookahead in lookaheads.iter() {
                    let new = Item {
                        prod: prod.0,
                        dot: 0,
                        lookahead,
                    };
                    if items.insert(new) {
                        worklist.push(new);
                    }
                }
            }
        }
    }

    /// All goto successors of a closed item set, grouped by transition
    /// symbol in symbol-id order (deterministic state numbering).
    pub(crate) fn successors(
        &self,
        items: &BTreeSet<Item>,
        firsts: &FirstSets,
    ) -> BTreeMap<SymbolId, BTreeSet<Item>> {
        let mut by_symbol: BTreeMap<SymbolId, BTreeSet<Item>> = BTreeMap::new();
        for &item in items {
            if let Some(next) = self.next_symbol(item) {
                by_symbol.entry(next).or_default().insert(Item {
                    prod: item.prod,
                    dot: item.dot + 1,
                    lookahead: item.lookahead,
                });
            }
        }
        for set in by_symbol.values_mut() {
            self.closure(set, firsts);
        }
        by_symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarBuilder, alt, lit, nt, tok};

    #[test]
    fn test_closure_expands_nonterminals() {
        let mut g = GrammarBuilder::new();
        g.token("number", "[0-9]+");
        g.rule("expr", [alt([nt("term")]), alt([nt("expr"), lit("+"), nt("term")])]);
        g.rule("term", [alt([tok("number")])]);
        let grammar = g.build().unwrap();
        let firsts = FirstSets::compute(&grammar);
        let view = ProdView::new(&grammar);

        let mut items = BTreeSet::from([Item {
            prod: view.augmented_id(),
            dot: 0,
            lookahead: grammar.eof(),
        }]);
        view.closure(&mut items, &firsts);

        // Closure reaches both expr productions and the term production.
        let prods: BTreeSet<u32> = items.iter().map(|i| i.prod).collect();
        assert_eq!(prods.len(), 4);
    }
}
