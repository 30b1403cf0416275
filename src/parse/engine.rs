//! The parse loop: token-at-a-time shift/reduce over a bounded stack
//! forest, with error recovery and old-tree reuse.

use super::reuse::ReuseCursor;
use super::stack::ParseStack;
use super::{ParseError, ParseOptions};
use crate::base::{ProductionId, SymbolId, TextSize, TokenSet};
use crate::grammar::Grammar;
use crate::lexer::{ExternalScanner, Lexed, ScannedToken, Scanner};
use crate::tables::{Action, Language, ParseTable};
use crate::tree::{ERROR_KIND, ExternalSnapshot, GreenElement, NodeKind, Tree, raw};
use rowan::{GreenNode, GreenToken, NodeOrToken};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

/// Bound on reduce chains walked while probing whether an insertion lets
/// the parse proceed.
const SIM_REDUCE_LIMIT: usize = 64;
/// Bound on worklist steps within a single token's shift/reduce closure.
/// Only degenerate epsilon-cycle grammars approach it.
const WORKLIST_LIMIT: usize = 100_000;
/// Consecutive missing-token insertions before recovery falls back to
/// skipping input.
const MISSING_STREAK_LIMIT: u32 = 32;

pub(crate) struct Engine<'a> {
    language: &'a Language,
    text: &'a str,
    scanner: Scanner<'a>,
    externals: &'a mut FxHashMap<SymbolId, Box<dyn ExternalScanner>>,
    options: &'a ParseOptions,
    max_stacks: usize,
    extras: TokenSet,
    all_terminals: TokenSet,
    stacks: Vec<ParseStack>,
    pos: TextSize,
    /// Trivia and skipped-input greens waiting to ride on the next shift,
    /// in byte order. The flag marks skipped input needing an error wrap.
    pending: Vec<(GreenElement, bool)>,
    missing_streak: u32,
    forks: u32,
    ops: u64,
    snapshots: Vec<ExternalSnapshot>,
    reuse: Option<ReuseCursor>,
    old_snapshots: Vec<ExternalSnapshot>,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        language: &'a Language,
        text: &'a str,
        old_tree: Option<&Tree>,
        externals: &'a mut FxHashMap<SymbolId, Box<dyn ExternalScanner>>,
        options: &'a ParseOptions,
    ) -> Engine<'a> {
        let grammar = language.grammar();
        let all_terminals: TokenSet = (0..grammar.terminal_count() as u16)
            .map(SymbolId)
            .filter(|&s| s != grammar.eof())
            .collect();
        Engine {
            language,
            text,
            scanner: Scanner::new(text, language.lex()),
            externals,
            max_stacks: options.max_stacks.unwrap_or_else(|| language.max_stacks()),
            options,
            extras: grammar.extras_set(),
            all_terminals,
            stacks: vec![ParseStack::root(language.table().start_state())],
            pos: TextSize::new(0),
            pending: Vec::new(),
            missing_streak: 0,
            forks: 0,
            ops: 0,
            snapshots: Vec::new(),
            reuse: old_tree.map(ReuseCursor::new),
            old_snapshots: old_tree
                .map(|t| t.external_states.clone())
                .unwrap_or_default(),
        }
    }

    fn grammar(&self) -> &'a Grammar {
        self.language.grammar()
    }

    fn table(&self) -> &'a ParseTable {
        self.language.table()
    }

    pub(crate) fn run(mut self) -> Result<Tree, ParseError> {
        loop {
            self.tick()?;
            // Old subtrees may carry their own leading trivia, so reuse is
            // probed both at the raw position and past freshly lexed extras.
            if self.try_reuse() {
                continue;
            }
            self.collect_trivia();
            if self.try_reuse() {
                continue;
            }
            match self.lex() {
                Lexed::Eof => {
                    if let Some(green) = self.finish()? {
                        let snapshots = std::mem::take(&mut self.snapshots);
                        return Ok(Tree::new(
                            green,
                            self.language.clone(),
                            Vec::new(),
                            snapshots,
                        ));
                    }
                }
                Lexed::UnexpectedByte(at) => self.skip_byte(at),
                Lexed::Token(token) => {
                    if !self.advance(token)? {
                        self.recover(token)?;
                    }
                }
            }
        }
    }

    /// Per-step budget: operation cap and cooperative cancellation.
    fn tick(&mut self) -> Result<(), ParseError> {
        self.ops += 1;
        if let Some(limit) = self.options.op_limit {
            if self.ops > limit {
                return Err(ParseError::Exhausted);
            }
        }
        if let Some(token) = &self.options.cancellation {
            if token.is_cancelled() {
                return Err(ParseError::Cancelled);
            }
        }
        Ok(())
    }

    /// Consume extras (whitespace, comments) at the current position; they
    /// attach as leading elements of whatever shifts next.
    fn collect_trivia(&mut self) {
        if self.extras.is_empty() {
            return;
        }
        while let Lexed::Token(token) = self.scanner.scan(self.pos, &self.extras) {
            let text = &self.text[token.range];
            let green = GreenToken::new(raw(NodeKind::from(token.terminal)), text);
            self.pending.push((NodeOrToken::Token(green), false));
            self.pos = token.range.end();
        }
    }

    /// Splice a subtree of the previous parse onto the stack, skipping its
    /// whole span.
    fn try_reuse(&mut self) -> bool {
        if self.stacks.len() != 1 {
            return false;
        }
        let Some(cursor) = &self.reuse else {
            return false;
        };
        let eof = self.grammar().eof();
        for candidate in cursor.candidates(self.pos, self.language) {
            // A from-scratch parse may reduce before this subtree's symbol
            // can attach; replay those reductions against the subtree's
            // first terminal.
            let mut stack = self.stacks[0].clone();
            let Some(landing) =
                self.attach_with_reduces(&mut stack, candidate.symbol, candidate.first_terminal)
            else {
                continue;
            };
            let lookahead = candidate.following.unwrap_or(eof);
            if self.table().actions(landing, lookahead).is_empty() {
                continue;
            }

            trace!(
                from = u32::from(self.pos),
                to = u32::from(candidate.range.end()),
                symbol = self.grammar().name(candidate.symbol),
                "reusing subtree"
            );
            let mut elements = self.flush_pending();
            elements.push(NodeOrToken::Node(candidate.green));
            stack.push(landing, elements);
            self.stacks = vec![stack];

            let span_start = self.pos;
            self.pos = candidate.range.end();
            // Carry external scanner snapshots taken inside the reused span
            // and restore the state recorded at its end boundary.
            for snap in &self.old_snapshots {
                if span_start < snap.end && snap.end <= self.pos {
                    self.snapshots.push(snap.clone());
                    if snap.end == self.pos {
                        if let Some(scanner) = self.externals.get_mut(&snap.terminal) {
                            scanner.restore_state(&snap.state);
                        }
                    }
                }
            }
            return true;
        }
        false
    }

    /// Reduce (bounded, driven by the subtree's first terminal) until the
    /// non-terminal has a goto from the top state.
    fn attach_with_reduces(
        &self,
        stack: &mut ParseStack,
        symbol: SymbolId,
        first_terminal: SymbolId,
    ) -> Option<crate::base::StateId> {
        let nt = self.grammar().nt_ordinal(symbol);
        for _ in 0..SIM_REDUCE_LIMIT {
            if let Some(landing) = self.table().goto(stack.top_state(), nt) {
                return Some(landing);
            }
            let actions = self.table().actions(stack.top_state(), first_terminal);
            let Some(Action::Reduce(prod)) = actions.first().copied() else {
                return None;
            };
            if !self.apply_reduce(stack, prod) {
                return None;
            }
        }
        None
    }

    fn lex(&mut self) -> Lexed {
        let mut valid = TokenSet::default();
        for stack in &self.stacks {
            valid.union_with(self.table().valid(stack.top_state()));
        }

        // External scanners get the first chance at context-sensitive
        // terminals the state admits.
        for terminal in valid.iter() {
            if !self.grammar().is_external(terminal) {
                continue;
            }
            let Some(scanner) = self.externals.get_mut(&terminal) else {
                continue;
            };
            if let Some(token) = scanner.scan(self.text, self.pos, terminal, &valid) {
                if token.range.start() == self.pos && !token.range.is_empty() {
                    self.snapshots.push(ExternalSnapshot {
                        end: token.range.end(),
                        terminal: token.terminal,
                        state: scanner.serialize_state(),
                    });
                    return Lexed::Token(token);
                }
            }
        }

        match self.scanner.scan(self.pos, &valid) {
            // A token no current state admits can still be consumed through
            // recovery, which skips fewer bytes than dropping it char by
            // char.
            Lexed::UnexpectedByte(at) => match self.scanner.scan(self.pos, &self.all_terminals) {
                Lexed::Token(token) => Lexed::Token(token),
                _ => Lexed::UnexpectedByte(at),
            },
            other => other,
        }
    }

    /// One generalized LR step: apply every table action for `token` on
    /// every live stack. Returns false when no stack could consume it.
    fn advance(&mut self, token: ScannedToken) -> Result<bool, ParseError> {
        let terminal = token.terminal;
        let table = self.table();
        let mut worklist: Vec<ParseStack> = self.stacks.clone();
        let mut visited: FxHashSet<Vec<crate::base::StateId>> = FxHashSet::default();
        let mut shifted: Vec<(ParseStack, crate::base::StateId)> = Vec::new();

        let mut steps = 0;
        while let Some(stack) = worklist.pop() {
            self.tick()?;
            steps += 1;
            if steps > WORKLIST_LIMIT {
                break;
            }
            let actions = table.actions(stack.top_state(), terminal).to_vec();
            for (i, action) in actions.iter().enumerate() {
                let mut branch = stack.clone();
                if i > 0 {
                    self.forks += 1;
                    branch.fork_order = self.forks;
                }
                match action {
                    Action::Shift(target) => shifted.push((branch, *target)),
                    Action::Reduce(prod) => {
                        if self.apply_reduce(&mut branch, *prod)
                            && visited.insert(branch.signature())
                        {
                            worklist.push(branch);
                        }
                    }
                    Action::Accept => {}
                }
            }
        }

        if shifted.is_empty() {
            return Ok(false);
        }

        let text = &self.text[token.range];
        let green: GreenElement =
            NodeOrToken::Token(GreenToken::new(raw(NodeKind::from(terminal)), text));
        let flushed = self.flush_pending();

        let mut next = Vec::with_capacity(shifted.len());
        for (mut stack, target) in shifted {
            let mut elements = flushed.clone();
            elements.push(green.clone());
            stack.push(target, elements);
            next.push(stack);
        }
        self.stacks = self.merge_and_prune(next);
        self.pos = token.range.end();
        self.missing_streak = 0;
        trace!(
            terminal = self.grammar().name(terminal),
            pos = u32::from(self.pos),
            stacks = self.stacks.len(),
            "shift"
        );
        Ok(true)
    }

    /// Pop one production body, build its node (or splice a hidden rule's
    /// children), and transition via goto.
    fn apply_reduce(&self, stack: &mut ParseStack, prod_id: ProductionId) -> bool {
        let grammar = self.grammar();
        let prod = grammar.production(prod_id);
        let Some(frames) = stack.pop(prod.rhs.len()) else {
            return false;
        };
        let elements: Vec<GreenElement> =
            frames.into_iter().flat_map(|f| f.elements).collect();
        let new_elements = if grammar.is_hidden(prod.lhs) {
            elements
        } else {
            vec![NodeOrToken::Node(GreenNode::new(
                raw(NodeKind::from(prod.lhs)),
                elements,
            ))]
        };
        let Some(target) = self
            .table()
            .goto(stack.top_state(), grammar.nt_ordinal(prod.lhs))
        else {
            return false;
        };
        stack.push(target, new_elements);
        true
    }

    /// Stacks that converged on the same state sequence at this position
    /// are duplicates; keep the best-ranked of each and cap the forest.
    fn merge_and_prune(&self, mut stacks: Vec<ParseStack>) -> Vec<ParseStack> {
        stacks.sort_by_key(|s| s.rank());
        let mut seen: FxHashSet<Vec<crate::base::StateId>> = FxHashSet::default();
        let mut out = Vec::new();
        for stack in stacks {
            if seen.insert(stack.signature()) {
                out.push(stack);
            }
        }
        if out.len() > self.max_stacks {
            trace!(dropped = out.len() - self.max_stacks, "pruning stack forest");
            out.truncate(self.max_stacks);
        }
        out
    }

    /// End of input: run the reduce closure on EOF and accept, or recover.
    fn finish(&mut self) -> Result<Option<GreenNode>, ParseError> {
        let eof = self.grammar().eof();
        let table = self.table();
        let mut worklist: Vec<ParseStack> = self.stacks.clone();
        let mut visited: FxHashSet<Vec<crate::base::StateId>> = FxHashSet::default();
        let mut accepted: Vec<ParseStack> = Vec::new();

        let mut steps = 0;
        while let Some(stack) = worklist.pop() {
            self.tick()?;
            steps += 1;
            if steps > WORKLIST_LIMIT {
                break;
            }
            let actions = table.actions(stack.top_state(), eof).to_vec();
            for (i, action) in actions.iter().enumerate() {
                let mut branch = stack.clone();
                if i > 0 {
                    self.forks += 1;
                    branch.fork_order = self.forks;
                }
                match action {
                    Action::Accept => accepted.push(branch),
                    Action::Reduce(prod) => {
                        if self.apply_reduce(&mut branch, *prod)
                            && visited.insert(branch.signature())
                        {
                            worklist.push(branch);
                        }
                    }
                    Action::Shift(_) => {}
                }
            }
        }

        if !accepted.is_empty() {
            accepted.sort_by_key(|s| s.rank());
            let best = accepted.swap_remove(0);
            return Ok(Some(self.build_root(best, false)));
        }

        // No stack can finish. Prefer zero-width insertions; failing that,
        // close out with whatever has been parsed.
        self.collapse_to_best();
        if self.missing_streak < MISSING_STREAK_LIMIT && self.insert_missing_to_finish() {
            return Ok(None);
        }
        let stack = self.stacks.swap_remove(0);
        Ok(Some(self.build_root(stack, true)))
    }

    /// Recovery for a token no stack can consume: insert the cheapest
    /// viable missing terminal (zero bytes skipped), otherwise skip the
    /// token into a pending error wrap.
    fn recover(&mut self, token: ScannedToken) -> Result<(), ParseError> {
        self.tick()?;
        self.collapse_to_best();
        if self.missing_streak < MISSING_STREAK_LIMIT && self.try_missing(token.terminal) {
            return Ok(());
        }
        let text = &self.text[token.range];
        let green = GreenToken::new(raw(NodeKind::from(token.terminal)), text);
        self.pending.push((NodeOrToken::Token(green), true));
        self.pos = token.range.end();
        self.stacks[0].errors += 1;
        self.missing_streak = 0;
        trace!(
            terminal = self.grammar().name(token.terminal),
            pos = u32::from(self.pos),
            "skipped token"
        );
        Ok(())
    }

    /// A byte no terminal can start: skip one character as raw error text.
    fn skip_byte(&mut self, at: TextSize) {
        let start = u32::from(at) as usize;
        let ch = self.text[start..].chars().next().expect("in bounds");
        let text = &self.text[start..start + ch.len_utf8()];
        let green = GreenToken::new(raw(ERROR_KIND), text);
        self.pending.push((NodeOrToken::Token(green), true));
        self.pos = at + TextSize::new(ch.len_utf8() as u32);
        for stack in &mut self.stacks {
            stack.errors += 1;
        }
        trace!(pos = u32::from(self.pos), "skipped unexpected byte");
    }

    /// Try inserting a zero-width missing token that lets the real
    /// lookahead proceed. Candidates are the current state's valid
    /// terminals in declaration order.
    fn try_missing(&mut self, lookahead: SymbolId) -> bool {
        let grammar = self.grammar();
        let eof = grammar.eof();
        let valid = self.table().valid(self.stacks[0].top_state()).clone();
        for terminal in valid.iter() {
            if terminal == lookahead || terminal == eof || self.extras.contains(terminal) {
                continue;
            }
            let mut candidate = self.stacks[0].clone();
            if !self.shift_missing(&mut candidate, terminal) {
                continue;
            }
            if !self.can_progress(&candidate, lookahead) {
                continue;
            }
            // Commit: pending trivia flushes ahead of the synthetic token.
            let mut elements = self.flush_pending();
            let top = candidate.frames.last_mut().expect("just shifted");
            elements.append(&mut top.elements);
            top.elements = elements;
            candidate.errors += 1;
            self.missing_streak += 1;
            trace!(
                terminal = grammar.name(terminal),
                pos = u32::from(self.pos),
                "inserted missing token"
            );
            self.stacks = vec![candidate];
            return true;
        }
        false
    }

    /// At end of input: search (breadth-first, bounded depth) for the
    /// shortest sequence of missing-token insertions after which the parse
    /// accepts. Skipping is impossible here, so insertion depth stands in
    /// for the skipped-bytes comparison.
    fn insert_missing_to_finish(&mut self) -> bool {
        const DEPTH_LIMIT: usize = 8;
        let grammar = self.grammar();
        let eof = grammar.eof();
        let mut queue: std::collections::VecDeque<(ParseStack, usize)> =
            std::collections::VecDeque::new();
        let mut visited: FxHashSet<Vec<crate::base::StateId>> = FxHashSet::default();
        queue.push_back((self.stacks[0].clone(), 0));

        while let Some((stack, depth)) = queue.pop_front() {
            let valid = self.table().valid(stack.top_state()).clone();
            for terminal in valid.iter() {
                if terminal == eof || self.extras.contains(terminal) {
                    continue;
                }
                let mut candidate = stack.clone();
                if !self.shift_missing(&mut candidate, terminal) {
                    continue;
                }
                if self.can_progress(&candidate, eof) {
                    candidate.errors += depth as u32 + 1;
                    self.missing_streak += depth as u32 + 1;
                    trace!(
                        inserted = depth + 1,
                        pos = u32::from(self.pos),
                        "closed input with missing tokens"
                    );
                    self.stacks = vec![candidate];
                    return true;
                }
                if depth + 1 < DEPTH_LIMIT && visited.insert(candidate.signature()) {
                    queue.push_back((candidate, depth + 1));
                }
            }
        }
        false
    }

    /// Reduce as needed, then shift `terminal` as a zero-width token.
    fn shift_missing(&self, stack: &mut ParseStack, terminal: SymbolId) -> bool {
        for _ in 0..SIM_REDUCE_LIMIT {
            let actions = self.table().actions(stack.top_state(), terminal).to_vec();
            if let Some(Action::Shift(target)) =
                actions.iter().find(|a| matches!(a, Action::Shift(_)))
            {
                let green = GreenToken::new(raw(NodeKind::from(terminal)), "");
                stack.push(*target, vec![NodeOrToken::Token(green)]);
                return true;
            }
            match actions.first() {
                Some(Action::Reduce(prod)) => {
                    if !self.apply_reduce(stack, *prod) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        false
    }

    /// Whether `lookahead` has a viable action after bounded reduction.
    fn can_progress(&self, stack: &ParseStack, lookahead: SymbolId) -> bool {
        let mut candidate = stack.clone();
        for _ in 0..SIM_REDUCE_LIMIT {
            let actions = self.table().actions(candidate.top_state(), lookahead);
            if actions.is_empty() {
                return false;
            }
            if actions
                .iter()
                .any(|a| matches!(a, Action::Shift(_) | Action::Accept))
            {
                return true;
            }
            let Some(Action::Reduce(prod)) = actions.first().copied() else {
                return false;
            };
            if !self.apply_reduce(&mut candidate, prod) {
                return false;
            }
        }
        false
    }

    fn collapse_to_best(&mut self) {
        if self.stacks.len() > 1 {
            self.stacks.sort_by_key(|s| s.rank());
            self.stacks.truncate(1);
        }
    }

    /// Wrap pending trivia, grouping consecutive skipped input into error
    /// nodes, preserving byte order.
    fn flush_pending(&mut self) -> Vec<GreenElement> {
        let mut out = Vec::new();
        let mut run: Vec<GreenElement> = Vec::new();
        for (elem, is_error) in std::mem::take(&mut self.pending) {
            if is_error {
                run.push(elem);
            } else {
                if !run.is_empty() {
                    out.push(NodeOrToken::Node(GreenNode::new(
                        raw(ERROR_KIND),
                        std::mem::take(&mut run),
                    )));
                }
                out.push(elem);
            }
        }
        if !run.is_empty() {
            out.push(NodeOrToken::Node(GreenNode::new(raw(ERROR_KIND), run)));
        }
        out
    }

    /// Assemble the root node. `forced` marks an input that never reduced
    /// to the start rule; its parsed prefix is wrapped as an error.
    fn build_root(&mut self, stack: ParseStack, forced: bool) -> GreenNode {
        let body: Vec<GreenElement> = stack
            .frames
            .into_iter()
            .skip(1)
            .flat_map(|f| f.elements)
            .collect();
        let mut children: Vec<GreenElement> = Vec::new();
        if forced && !body.is_empty() {
            children.push(NodeOrToken::Node(GreenNode::new(raw(ERROR_KIND), body)));
        } else {
            children.extend(body);
        }
        let trailing = self.flush_pending();

        let start_kind = raw(NodeKind::from(self.grammar().start()));
        if children.len() == 1 {
            if let NodeOrToken::Node(node) = &children[0] {
                if node.kind() == start_kind {
                    if trailing.is_empty() {
                        return node.clone();
                    }
                    // Trailing trivia/errors fold into the start node rather
                    // than nesting it under a second one.
                    let mut inner: Vec<GreenElement> = node
                        .children()
                        .map(|c| match c {
                            NodeOrToken::Node(n) => NodeOrToken::Node(n.to_owned()),
                            NodeOrToken::Token(t) => NodeOrToken::Token(t.to_owned()),
                        })
                        .collect();
                    inner.extend(trailing);
                    return GreenNode::new(start_kind, inner);
                }
            }
        }
        children.extend(trailing);
        GreenNode::new(start_kind, children)
    }
}
