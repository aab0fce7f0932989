//! Bookkeeping of where a list's elements ended up after matching.
//!
//! One [`ListMatchStats`] instance tracks a single tracked list (head or
//! update) against the root list: which indices made it into the merge
//! result, which were matched to a root element but dropped, and which
//! vanished without any root counterpart. Derived views are recomputed
//! on demand from the two underlying index sets.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

/// Match statistics for one tracked list.
#[derive(Clone, Debug, Default)]
pub struct ListMatchStats {
    list: Vec<Value>,
    root: Vec<Value>,
    in_result_idx: BTreeSet<usize>,
    not_in_result_root_match_idx: BTreeSet<usize>,
    root_matches: BTreeMap<usize, usize>,
}

impl ListMatchStats {
    /// Stats for `list` matched against the ancestor `root`.
    pub fn new(list: Vec<Value>, root: Vec<Value>) -> Self {
        Self {
            list,
            root,
            in_result_idx: BTreeSet::new(),
            not_in_result_root_match_idx: BTreeSet::new(),
            root_matches: BTreeMap::new(),
        }
    }

    /// Mark the element at `idx` as present in the merge result.
    pub fn move_to_result(&mut self, idx: usize) {
        self.in_result_idx.insert(idx);
        self.not_in_result_root_match_idx.remove(&idx);
    }

    /// Record that the element at `idx` matched the root element at
    /// `root_idx`.
    pub fn add_root_match(&mut self, idx: usize, root_idx: usize) {
        self.root_matches.insert(idx, root_idx);
        if !self.in_result_idx.contains(&idx) {
            self.not_in_result_root_match_idx.insert(idx);
        }
    }

    /// Indices present in the merge result.
    pub fn in_result_idx(&self) -> &BTreeSet<usize> {
        &self.in_result_idx
    }

    /// Indices absent from the merge result.
    pub fn not_in_result_idx(&self) -> BTreeSet<usize> {
        (0..self.list.len())
            .filter(|idx| !self.in_result_idx.contains(idx))
            .collect()
    }

    /// Indices absent from the result that matched a root element.
    pub fn not_in_result_root_match_idx(&self) -> &BTreeSet<usize> {
        &self.not_in_result_root_match_idx
    }

    /// Indices absent from the result with no root counterpart.
    pub fn not_in_result_not_root_match_idx(&self) -> BTreeSet<usize> {
        self.not_in_result_idx()
            .difference(&self.not_in_result_root_match_idx)
            .copied()
            .collect()
    }

    /// Elements present in the merge result.
    pub fn in_result(&self) -> Vec<Value> {
        self.elements(self.in_result_idx.iter())
    }

    /// Elements absent from the merge result.
    pub fn not_in_result(&self) -> Vec<Value> {
        self.elements(self.not_in_result_idx().iter())
    }

    /// Elements absent from the result that matched a root element.
    pub fn not_in_result_root_match(&self) -> Vec<Value> {
        self.elements(self.not_in_result_root_match_idx.iter())
    }

    /// Elements absent from the result with no root counterpart.
    pub fn not_in_result_not_root_match(&self) -> Vec<Value> {
        self.elements(self.not_in_result_not_root_match_idx().iter())
    }

    /// Dropped (element, matched root element) pairs.
    pub fn not_in_result_root_match_pairs(&self) -> Vec<(Value, Value)> {
        self.not_in_result_root_match_idx
            .iter()
            .map(|&idx| {
                (
                    self.list[idx].clone(),
                    self.root[self.root_matches[&idx]].clone(),
                )
            })
            .collect()
    }

    /// Root elements never matched by any tracked element.
    pub fn not_matched_root_objects(&self) -> Vec<Value> {
        let matched: BTreeSet<usize> = self.root_matches.values().copied().collect();
        self.root
            .iter()
            .enumerate()
            .filter(|(idx, _)| !matched.contains(idx))
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    fn elements<'a>(&self, indices: impl Iterator<Item = &'a usize>) -> Vec<Value> {
        indices.map(|&idx| self.list[idx].clone()).collect()
    }
}
