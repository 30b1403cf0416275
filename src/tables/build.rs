//! Item-set automaton construction and conflict resolution.

use super::first::FirstSets;
use super::items::{Item, ProdView};
use super::{Action, CompileOptions, ParseState, ParseTable, UnresolvedConflictWarning};
use crate::base::{ProductionId, StateId, SymbolId, TokenSet};
use crate::grammar::{Assoc, Grammar, GrammarError, Precedence};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use tracing::debug;

pub(crate) fn build_table(
    grammar: &Grammar,
    options: &CompileOptions,
) -> Result<(ParseTable, Vec<UnresolvedConflictWarning>), GrammarError> {
    let firsts = FirstSets::compute(grammar);
    let view = ProdView::new(grammar);

    // Canonical LR(1): states are closed item sets, deduplicated by
    // identity. BTreeSet keys make state numbering deterministic.
    let mut start_set = BTreeSet::from([Item {
        prod: view.augmented_id(),
        dot: 0,
        lookahead: grammar.eof(),
    }]);
    view.closure(&mut start_set, &firsts);

    let mut sets: Vec<BTreeSet<Item>> = vec![start_set.clone()];
    let mut ids: FxHashMap<Vec<Item>, u32> = FxHashMap::default();
    ids.insert(start_set.into_iter().collect(), 0);
    let mut transitions: Vec<Vec<(SymbolId, u32)>> = Vec::new();

    let mut idx = 0;
    while idx < sets.len() {
        let successors = view.successors(&sets[idx], &firsts);
        let mut outgoing = Vec::with_capacity(successors.len());
        for (sym, set) in successors {
            let key: Vec<Item> = set.iter().copied().collect();
            let id = match ids.get(&key) {
                Some(&id) => id,
                None => {
                    let id = sets.len() as u32;
                    ids.insert(key, id);
                    sets.push(set);
                    id
                }
            };
            outgoing.push((sym, id));
        }
        transitions.push(outgoing);
        idx += 1;
    }
    debug!(states = sets.len(), "item-set automaton constructed");

    let mut warnings = Vec::new();
    let mut states = Vec::with_capacity(sets.len());
    for (s, set) in sets.iter().enumerate() {
        let state_id = StateId(s as u32);
        let mut actions: Vec<Vec<Action>> = vec![Vec::new(); grammar.terminal_count()];
        let mut gotos: Vec<Option<StateId>> = vec![None; grammar.nonterminal_count()];

        let mut shift_targets: FxHashMap<SymbolId, StateId> = FxHashMap::default();
        for &(sym, target) in &transitions[s] {
            if grammar.is_terminal(sym) {
                shift_targets.insert(sym, StateId(target));
            } else {
                gotos[grammar.nt_ordinal(sym)] = Some(StateId(target));
            }
        }

        // Reduce/accept candidates per lookahead terminal.
        let mut reduces: FxHashMap<SymbolId, Vec<u32>> = FxHashMap::default();
        let mut accept_on_eof = false;
        for &item in set {
            if view.next_symbol(item).is_some() {
                continue;
            }
            if item.prod == view.augmented_id() {
                accept_on_eof = true;
            } else {
                let entry = reduces.entry(item.lookahead).or_default();
                if !entry.contains(&item.prod) {
                    entry.push(item.prod);
                }
            }
        }

        let mut lookaheads: BTreeSet<SymbolId> = shift_targets.keys().copied().collect();
        lookaheads.extend(reduces.keys().copied());
        if accept_on_eof {
            lookaheads.insert(grammar.eof());
        }

        for terminal in lookaheads {
            let mut cands = Candidates {
                accept: accept_on_eof && terminal == grammar.eof(),
                shift: shift_targets.get(&terminal).copied(),
                shift_prec: None,
                involved: FxHashSet::default(),
                reduces: Vec::new(),
            };
            if cands.shift.is_some() {
                for &item in set {
                    if view.next_symbol(item) == Some(terminal) {
                        if let Some(lhs) = view.lhs(item.prod) {
                            cands.involved.insert(lhs);
                        }
                        if let Some(prec) = view.precedence(item.prod) {
                            let better = cands
                                .shift_prec
                                .is_none_or(|existing| prec.level > existing.level);
                            if better {
                                cands.shift_prec = Some(prec);
                            }
                        }
                    }
                }
            }
            if let Some(prods) = reduces.get(&terminal) {
                let mut sorted = prods.clone();
                sorted.sort_unstable();
                for prod in sorted {
                    let lhs = view.lhs(prod).expect("grammar production");
                    cands.involved.insert(lhs);
                    cands.reduces.push((prod, view.precedence(prod)));
                }
            }

            actions[terminal.index()] =
                resolve(state_id, terminal, cands, grammar, options, &mut warnings)?;
        }

        let valid: TokenSet = (0..grammar.terminal_count())
            .map(|i| SymbolId(i as u16))
            .filter(|t| !actions[t.index()].is_empty())
            .collect();

        states.push(ParseState {
            actions,
            gotos,
            valid,
        });
    }

    Ok((
        ParseTable {
            states,
            start_state: StateId(0),
        },
        warnings,
    ))
}

struct Candidates {
    accept: bool,
    shift: Option<StateId>,
    shift_prec: Option<Precedence>,
    /// Rules involved in this cell, for expected-conflict matching.
    involved: FxHashSet<SymbolId>,
    /// In declaration order.
    reduces: Vec<(u32, Option<Precedence>)>,
}

/// Decide the action list for one (state, lookahead) cell.
///
/// Policy, in order: declared precedence level, then associativity at equal
/// levels, then retention for declared expected conflicts, then
/// declaration-order tie-break recorded as an [`UnresolvedConflictWarning`].
fn resolve(
    state: StateId,
    terminal: SymbolId,
    cands: Candidates,
    grammar: &Grammar,
    options: &CompileOptions,
    warnings: &mut Vec<UnresolvedConflictWarning>,
) -> Result<Vec<Action>, GrammarError> {
    if cands.accept {
        // The augmented rule has a single production; accept wins its cell.
        return Ok(vec![Action::Accept]);
    }

    let single_shift = cands.shift.is_some() && cands.reduces.is_empty();
    let single_reduce = cands.shift.is_none() && cands.reduces.len() == 1;
    if single_shift {
        return Ok(vec![Action::Shift(cands.shift.unwrap())]);
    }
    if single_reduce {
        return Ok(vec![Action::Reduce(ProductionId(cands.reduces[0].0))]);
    }

    // Declared acceptable ambiguity: keep every candidate for generalized
    // parsing, bounded by the configured stack count.
    let expected = grammar
        .expected_conflicts()
        .iter()
        .any(|set| cands.involved.iter().all(|lhs| set.contains(lhs)));
    if expected {
        let mut all = Vec::new();
        if let Some(target) = cands.shift {
            all.push(Action::Shift(target));
        }
        all.extend(
            cands
                .reduces
                .iter()
                .map(|&(p, _)| Action::Reduce(ProductionId(p))),
        );
        if all.len() > options.max_parallel_stacks {
            return Err(GrammarError::AmbiguityBound {
                state: state.0,
                lookahead: grammar.name(terminal).into(),
                count: all.len(),
                bound: options.max_parallel_stacks,
            });
        }
        return Ok(all);
    }

    // Precedence resolution.
    let mut keep_shift = cands.shift.is_some();
    let mut reduces = cands.reduces.clone();
    let mut fully_resolved = true;

    if keep_shift {
        if let Some(sp) = cands.shift_prec {
            reduces.retain(|&(_, rp)| match rp {
                Some(rp) if rp.level > sp.level => {
                    keep_shift = false;
                    true
                }
                Some(rp) if rp.level < sp.level => false,
                Some(rp) => match rp.assoc {
                    Assoc::Left => {
                        keep_shift = false;
                        true
                    }
                    Assoc::Right => false,
                    Assoc::None => {
                        fully_resolved = false;
                        true
                    }
                },
                None => {
                    fully_resolved = false;
                    true
                }
            });
        } else {
            fully_resolved = false;
        }
    }
    if reduces.len() > 1 {
        if reduces.iter().all(|(_, p)| p.is_some()) {
            let max = reduces.iter().map(|(_, p)| p.unwrap().level).max().unwrap();
            let at_max: Vec<_> = reduces
                .iter()
                .copied()
                .filter(|(_, p)| p.unwrap().level == max)
                .collect();
            if at_max.len() < reduces.len() {
                reduces = at_max;
            }
            if reduces.len() > 1 {
                fully_resolved = false;
            }
        } else {
            fully_resolved = false;
        }
    }

    let remaining = usize::from(keep_shift) + reduces.len();
    if fully_resolved && remaining == 1 {
        debug!(
            %state,
            lookahead = grammar.name(terminal),
            "conflict resolved by precedence"
        );
        return Ok(if keep_shift {
            vec![Action::Shift(cands.shift.unwrap())]
        } else {
            vec![Action::Reduce(ProductionId(reduces[0].0))]
        });
    }

    // Default tie-break: shift over reduce, earlier production over later.
    // Recorded so grammar authors can audit it.
    let (chosen, chosen_desc) = if keep_shift {
        (
            Action::Shift(cands.shift.unwrap()),
            "shift".to_string(),
        )
    } else {
        let prod = reduces.iter().map(|&(p, _)| p).min().unwrap();
        (
            Action::Reduce(ProductionId(prod)),
            format!("reduce ({})", grammar.describe_production(ProductionId(prod))),
        )
    };
    let mut discarded = Vec::new();
    if cands.shift.is_some() && !matches!(chosen, Action::Shift(_)) {
        discarded.push("shift".into());
    }
    for &(p, _) in &cands.reduces {
        if chosen != Action::Reduce(ProductionId(p)) {
            discarded.push(
                format!("reduce ({})", grammar.describe_production(ProductionId(p))).into(),
            );
        }
    }
    warnings.push(UnresolvedConflictWarning {
        state,
        lookahead: grammar.name(terminal).into(),
        chosen: chosen_desc.into(),
        discarded,
    });
    Ok(vec![chosen])
}
