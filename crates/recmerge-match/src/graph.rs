//! Match graph construction over root, head and update lists.
//!
//! The builder links elements denoting the same entity across the three
//! lists into one node per entity, then derives the order constraints
//! the sequencer must respect.
//!
//! Matching is a transitive closure: equality is only checked pairwise
//! (root-head, root-update, head-update) and need not be transitive
//! through the third list, so every seed element is expanded
//! breadth-first across all three pairwise relations until its full
//! equivalence class is known. A class in which any list offers more
//! than one candidate is ambiguous; it produces no node and is reported
//! as a single manual-merge choice instead.
//!
//! # Key Types
//!
//! - [`MatchGraphBuilder`] -- runs the matching
//! - [`MatchGraph`] -- nodes, precedence edges, source chains, ambiguous
//!   choices and per-list stats
//! - [`MatchNode`] -- one entity with up to three (index, value) slots

use std::collections::{BTreeSet, VecDeque};

use serde_json::Value;
use tracing::debug;

use recmerge_core::Source;

use crate::comparator::{Comparator, MatchTable};
use crate::stats::ListMatchStats;

/// One entity identity across the three lists.
///
/// Each slot holds the source index and value of this entity in that
/// list, or `None` where the list has no counterpart. No two nodes of
/// one graph claim the same index of the same list.
#[derive(Clone, Debug)]
pub struct MatchNode {
    pub root: Option<(usize, Value)>,
    pub head: Option<(usize, Value)>,
    pub update: Option<(usize, Value)>,
}

impl MatchNode {
    /// The (root, head, update) values of this entity.
    pub fn triple(&self) -> (Option<&Value>, Option<&Value>, Option<&Value>) {
        (
            self.root.as_ref().map(|(_, v)| v),
            self.head.as_ref().map(|(_, v)| v),
            self.update.as_ref().map(|(_, v)| v),
        )
    }
}

/// Output of [`MatchGraphBuilder::build`].
#[derive(Clone, Debug)]
pub struct MatchGraph {
    /// Entity nodes; a node's id is its position here.
    pub nodes: Vec<MatchNode>,
    /// Precedence edges: `successors[a]` holds every node that must come
    /// after node `a` in some participating list.
    pub successors: Vec<Vec<usize>>,
    /// Node ids owning head indices, in head order. Empty when head does
    /// not participate.
    pub head_chain: Vec<usize>,
    /// Node ids owning update indices, in update order. Empty when
    /// update does not participate.
    pub update_chain: Vec<usize>,
    /// One `[root, head, update]` candidate triple per ambiguous class;
    /// a slot is `null` when absent or an array when several elements of
    /// that list are candidates.
    pub ambiguous: Vec<Value>,
    /// Where head elements ended up.
    pub head_stats: ListMatchStats,
    /// Where update elements ended up.
    pub update_stats: ListMatchStats,
}

impl MatchGraph {
    /// The node chain of a participating source list.
    pub fn chain(&self, source: Source) -> &[usize] {
        match source {
            Source::Head => &self.head_chain,
            Source::Update => &self.update_chain,
            Source::Root => &[],
        }
    }
}

/// Builds the match graph for one list field.
pub struct MatchGraphBuilder<'a> {
    root: &'a [Value],
    head: &'a [Value],
    update: &'a [Value],
    sources: &'a [Source],
    comparator: &'a dyn Comparator,
}

impl<'a> MatchGraphBuilder<'a> {
    /// A builder seeding nodes from `sources`, in that order.
    ///
    /// Non-participating lists still contribute matches to nodes and
    /// stats, but never seed nodes or impose order constraints.
    pub fn new(
        root: &'a [Value],
        head: &'a [Value],
        update: &'a [Value],
        sources: &'a [Source],
        comparator: &'a dyn Comparator,
    ) -> Self {
        Self {
            root,
            head,
            update,
            sources,
            comparator,
        }
    }

    /// Run the matching and return the resulting graph.
    pub fn build(self) -> MatchGraph {
        let root_head = self.comparator.match_table(self.root, self.head);
        let root_update = self.comparator.match_table(self.root, self.update);
        let head_update = self.comparator.match_table(self.head, self.update);
        let tables = PairTables {
            root_head,
            root_update,
            head_update,
        };

        let mut nodes: Vec<MatchNode> = Vec::new();
        let mut ambiguous: Vec<Value> = Vec::new();
        let mut head_to_node: Vec<Option<usize>> = vec![None; self.head.len()];
        let mut update_to_node: Vec<Option<usize>> = vec![None; self.update.len()];
        let mut consumed = Consumed {
            root: vec![false; self.root.len()],
            head: vec![false; self.head.len()],
            update: vec![false; self.update.len()],
        };

        for &source in self.sources {
            for seed_idx in 0..self.list_of(source).len() {
                if consumed.get(source, seed_idx) {
                    continue;
                }
                let class = self.closure(source, seed_idx, &tables);
                class.mark_consumed(&mut consumed);

                if class.is_ambiguous() {
                    ambiguous.push(class.choice_body(self.root, self.head, self.update));
                    continue;
                }
                let node_id = nodes.len();
                if let Some(&idx) = class.head.first() {
                    head_to_node[idx] = Some(node_id);
                }
                if let Some(&idx) = class.update.first() {
                    update_to_node[idx] = Some(node_id);
                }
                nodes.push(class.into_node(self.root, self.head, self.update));
            }
        }
        debug!(
            nodes = nodes.len(),
            ambiguous = ambiguous.len(),
            "match graph populated"
        );

        let head_stats = self.track_stats(
            self.head,
            &head_to_node,
            &nodes,
            |table, idx| table.root_head.l2_matches(idx),
            &tables,
        );
        let update_stats = self.track_stats(
            self.update,
            &update_to_node,
            &nodes,
            |table, idx| table.root_update.l2_matches(idx),
            &tables,
        );

        let head_chain = if self.participates(Source::Head) {
            head_to_node.iter().filter_map(|&n| n).collect()
        } else {
            Vec::new()
        };
        let update_chain = if self.participates(Source::Update) {
            update_to_node.iter().filter_map(|&n| n).collect()
        } else {
            Vec::new()
        };

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for chain in [&head_chain, &update_chain] {
            for pair in chain.windows(2) {
                if !successors[pair[0]].contains(&pair[1]) {
                    successors[pair[0]].push(pair[1]);
                }
            }
        }

        MatchGraph {
            nodes,
            successors,
            head_chain,
            update_chain,
            ambiguous,
            head_stats,
            update_stats,
        }
    }

    fn participates(&self, source: Source) -> bool {
        self.sources.contains(&source)
    }

    fn list_of(&self, source: Source) -> &[Value] {
        match source {
            Source::Root => self.root,
            Source::Head => self.head,
            Source::Update => self.update,
        }
    }

    /// Breadth-first expansion of the equivalence class of one element
    /// over the three pairwise match tables.
    fn closure(&self, source: Source, idx: usize, tables: &PairTables) -> MatchClass {
        let mut class = MatchClass::default();
        let mut queue = VecDeque::new();
        queue.push_back((source, idx));
        while let Some((at, i)) = queue.pop_front() {
            if !class.insert(at, i) {
                continue;
            }
            let (first, second) = match at {
                Source::Root => (
                    (Source::Head, tables.root_head.l1_matches(i)),
                    (Source::Update, tables.root_update.l1_matches(i)),
                ),
                Source::Head => (
                    (Source::Root, tables.root_head.l2_matches(i)),
                    (Source::Update, tables.head_update.l1_matches(i)),
                ),
                Source::Update => (
                    (Source::Root, tables.root_update.l2_matches(i)),
                    (Source::Head, tables.head_update.l2_matches(i)),
                ),
            };
            for (other, matches) in [first, second] {
                for &j in matches {
                    queue.push_back((other, j));
                }
            }
        }
        class
    }

    fn track_stats(
        &self,
        list: &[Value],
        to_node: &[Option<usize>],
        nodes: &[MatchNode],
        root_matches: impl Fn(&PairTables, usize) -> &[usize],
        tables: &PairTables,
    ) -> ListMatchStats {
        let mut stats = ListMatchStats::new(list.to_vec(), self.root.to_vec());
        for idx in 0..list.len() {
            match to_node[idx] {
                Some(node_id) => {
                    if let Some((root_idx, _)) = nodes[node_id].root {
                        stats.add_root_match(idx, root_idx);
                    }
                    stats.move_to_result(idx);
                }
                None => {
                    if let Some(&root_idx) = root_matches(tables, idx).first() {
                        stats.add_root_match(idx, root_idx);
                    }
                }
            }
        }
        stats
    }
}

struct PairTables {
    root_head: MatchTable,
    root_update: MatchTable,
    head_update: MatchTable,
}

#[derive(Default)]
struct MatchClass {
    root: BTreeSet<usize>,
    head: BTreeSet<usize>,
    update: BTreeSet<usize>,
}

struct Consumed {
    root: Vec<bool>,
    head: Vec<bool>,
    update: Vec<bool>,
}

impl Consumed {
    fn get(&self, source: Source, idx: usize) -> bool {
        match source {
            Source::Root => self.root[idx],
            Source::Head => self.head[idx],
            Source::Update => self.update[idx],
        }
    }
}

impl MatchClass {
    fn insert(&mut self, source: Source, idx: usize) -> bool {
        match source {
            Source::Root => self.root.insert(idx),
            Source::Head => self.head.insert(idx),
            Source::Update => self.update.insert(idx),
        }
    }

    fn is_ambiguous(&self) -> bool {
        self.root.len() > 1 || self.head.len() > 1 || self.update.len() > 1
    }

    fn mark_consumed(&self, consumed: &mut Consumed) {
        for &idx in &self.root {
            consumed.root[idx] = true;
        }
        for &idx in &self.head {
            consumed.head[idx] = true;
        }
        for &idx in &self.update {
            consumed.update[idx] = true;
        }
    }

    fn into_node(self, root: &[Value], head: &[Value], update: &[Value]) -> MatchNode {
        let slot = |set: &BTreeSet<usize>, list: &[Value]| {
            set.first().map(|&idx| (idx, list[idx].clone()))
        };
        MatchNode {
            root: slot(&self.root, root),
            head: slot(&self.head, head),
            update: slot(&self.update, update),
        }
    }

    /// The `[root, head, update]` candidate triple of an ambiguous class.
    fn choice_body(&self, root: &[Value], head: &[Value], update: &[Value]) -> Value {
        let slot = |set: &BTreeSet<usize>, list: &[Value]| match set.len() {
            0 => Value::Null,
            1 => list[*set.first().expect("non-empty set")].clone(),
            _ => Value::Array(set.iter().map(|&idx| list[idx].clone()).collect()),
        };
        Value::Array(vec![
            slot(&self.root, root),
            slot(&self.head, head),
            slot(&self.update, update),
        ])
    }
}
