//! Bitset over terminal symbols.

use super::SymbolId;
use serde::{Deserialize, Serialize};

/// A set of terminal symbols, stored as a bitset indexed by [`SymbolId`].
///
/// Used for the per-state valid lookahead sets consumed by the scanner and
/// handed to external scanner hooks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenSet {
    words: Vec<u64>,
}

impl TokenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
        }
    }

    pub fn insert(&mut self, id: SymbolId) {
        let idx = id.index();
        if idx / 64 >= self.words.len() {
            self.words.resize(idx / 64 + 1, 0);
        }
        self.words[idx / 64] |= 1 << (idx % 64);
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        let idx = id.index();
        self.words
            .get(idx / 64)
            .is_some_and(|w| w & (1 << (idx % 64)) != 0)
    }

    pub fn union_with(&mut self, other: &TokenSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..64)
                .filter(move |bit| w & (1 << bit) != 0)
                .map(move |bit| SymbolId((wi * 64 + bit) as u16))
        })
    }
}

impl FromIterator<SymbolId> for TokenSet {
    fn from_iter<I: IntoIterator<Item = SymbolId>>(iter: I) -> Self {
        let mut set = TokenSet::default();
        for id in iter {
            set.insert(id);
        }
        set
    }
}
