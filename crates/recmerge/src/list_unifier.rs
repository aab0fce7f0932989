//! Entity-wise unification of one list field across the three versions.
//!
//! [`ListUnifier`] matches the root, head and update lists into entity
//! nodes, sequences the surviving entities into one output order, and
//! reports whatever could not be decided automatically as conflicts.
//! The output is a list of aligned `(root, head, update)` triples; the
//! caller merges each triple into a single element afterwards.
//!
//! All conflict paths are relative to the list itself: the whole-list
//! conflicts sit at the empty path and insertion conflicts at `(idx,)`.

use serde_json::Value;
use tracing::debug;

use recmerge_core::{Conflict, ConflictKind, ListPolicy, MergeError, MergeResult, Path};
use recmerge_match::{
    best_effort_order, toposort, Comparator, ListMatchStats, MatchGraphBuilder,
};

/// One aligned entity: its value in each version, where present.
pub type Triple = (Option<Value>, Option<Value>, Option<Value>);

/// Result of unifying a single list field.
#[derive(Clone, Debug)]
pub struct UnifiedList {
    /// Kept entities in output order.
    pub triples: Vec<Triple>,
    /// Where the head elements ended up.
    pub head_stats: ListMatchStats,
    /// Where the update elements ended up.
    pub update_stats: ListMatchStats,
    /// Conflicts raised while unifying, with list-relative paths.
    pub conflicts: Vec<Conflict>,
}

/// Unifies list fields under one policy and comparator.
pub struct ListUnifier<'a> {
    policy: ListPolicy,
    comparator: &'a dyn Comparator,
    manual_merge_limit: Option<usize>,
}

impl<'a> ListUnifier<'a> {
    pub fn new(policy: ListPolicy, comparator: &'a dyn Comparator) -> Self {
        Self {
            policy,
            comparator,
            manual_merge_limit: None,
        }
    }

    /// Fail unification outright when more than `limit` entities need a
    /// manual merge, instead of reporting them one by one.
    pub fn with_manual_merge_limit(mut self, limit: usize) -> Self {
        self.manual_merge_limit = Some(limit);
        self
    }

    pub fn unify(&self, root: &[Value], head: &[Value], update: &[Value]) -> MergeResult<UnifiedList> {
        let graph = MatchGraphBuilder::new(root, head, update, self.policy.sources(), self.comparator)
            .build();

        let mut conflicts = Vec::new();
        if let Some(limit) = self.manual_merge_limit {
            if graph.ambiguous.len() > limit {
                return Err(MergeError::ManualMergeLimit {
                    count: graph.ambiguous.len(),
                    limit,
                });
            }
        }
        for choice in &graph.ambiguous {
            conflicts.push(Conflict::new(
                ConflictKind::ManualMerge,
                Path::root(),
                Some(choice.clone()),
            ));
        }

        let pick_first = self.policy.pick_first();
        let order = match toposort(&graph, pick_first) {
            Some(order) => order,
            None => {
                debug!("order constraints are cyclic, sequencing best effort");
                conflicts.push(Conflict::new(ConflictKind::Reorder, Path::root(), None));
                best_effort_order(&graph, pick_first)
            }
        };
        let mut triples: Vec<Triple> = order
            .into_iter()
            .map(|id| {
                let (r, h, u) = graph.nodes[id].triple();
                (r.cloned(), h.cloned(), u.cloned())
            })
            .collect();

        if self.policy.conflict_on_head_delete() {
            for removed in graph.head_stats.not_in_result_not_root_match() {
                conflicts.push(Conflict::new(
                    ConflictKind::AddBackToHead,
                    Path::root(),
                    Some(removed),
                ));
            }
        }

        if self.policy.conflict_on_new_update() {
            let mut dropped = Vec::new();
            for (idx, (r, h, u)) in triples.iter().enumerate() {
                if r.is_none() && h.is_none() && u.is_some() {
                    conflicts.push(Conflict::new(
                        ConflictKind::Insert,
                        Path::root().child(idx),
                        u.clone(),
                    ));
                    dropped.push(idx);
                }
            }
            for idx in dropped.into_iter().rev() {
                triples.remove(idx);
            }
        }

        Ok(UnifiedList {
            triples,
            head_stats: graph.head_stats,
            update_stats: graph.update_stats,
            conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use recmerge_match::{ExactComparator, PrimaryKeyComparator};

    fn strs(raw: &[&str]) -> Vec<Value> {
        raw.iter().map(|&v| json!(v)).collect()
    }

    fn ints(raw: &[i64]) -> Vec<Value> {
        raw.iter().map(|&v| json!(v)).collect()
    }

    fn unify(policy: ListPolicy, root: &[Value], head: &[Value], update: &[Value]) -> UnifiedList {
        ListUnifier::new(policy, &ExactComparator)
            .unify(root, head, update)
            .unwrap()
    }

    /// The value each triple contributes to a union-style result.
    fn picked(unified: &UnifiedList) -> Vec<Value> {
        unified
            .triples
            .iter()
            .map(|(_, h, u)| h.clone().or_else(|| u.clone()).unwrap())
            .collect()
    }

    #[test]
    fn keep_only_policies_take_one_side() {
        let root = strs(&["bad", "random"]);
        let head = strs(&["cool", "nice", "random"]);
        let update = strs(&["fun", "nice", "healthy"]);

        let unified = unify(ListPolicy::KeepOnlyHead, &root, &head, &update);
        assert_eq!(picked(&unified), strs(&["cool", "nice", "random"]));
        assert!(unified.conflicts.is_empty());

        let unified = unify(ListPolicy::KeepOnlyUpdate, &root, &head, &update);
        assert_eq!(picked(&unified), strs(&["fun", "nice", "healthy"]));
        assert!(unified.conflicts.is_empty());
    }

    #[test]
    fn union_respects_both_source_orders() {
        let root = strs(&["bad", "random"]);
        let head = strs(&["cool", "nice", "random"]);
        let update = strs(&["fun", "nice", "healthy"]);

        let unified = unify(ListPolicy::UnionHeadFirst, &root, &head, &update);
        assert_eq!(
            picked(&unified),
            strs(&["cool", "fun", "nice", "random", "healthy"])
        );
        assert!(unified.conflicts.is_empty());

        let unified = unify(ListPolicy::UnionUpdateFirst, &root, &head, &update);
        assert_eq!(
            picked(&unified),
            strs(&["fun", "cool", "nice", "healthy", "random"])
        );
        assert!(unified.conflicts.is_empty());
    }

    #[test]
    fn cyclic_order_falls_back_and_reports_reorder() {
        let root = Vec::new();
        let head = ints(&[1, 2, 5, 3]);
        let update = ints(&[3, 1, 2, 4]);

        let unified = unify(ListPolicy::UnionHeadFirst, &root, &head, &update);
        assert_eq!(picked(&unified), ints(&[1, 2, 5, 3, 4]));
        assert_eq!(
            unified.conflicts,
            vec![Conflict::new(ConflictKind::Reorder, Path::root(), None)]
        );

        let unified = unify(ListPolicy::UnionUpdateFirst, &root, &head, &update);
        assert_eq!(picked(&unified), ints(&[3, 1, 2, 4, 5]));
        assert_eq!(
            unified.conflicts,
            vec![Conflict::new(ConflictKind::Reorder, Path::root(), None)]
        );
    }

    #[test]
    fn head_delete_flags_only_manual_additions() {
        // "cool" exists only in head; "random" was already in root, so
        // the update deleting it is not worth an add-back.
        let root = strs(&["bad", "random"]);
        let head = strs(&["cool", "nice", "random"]);
        let update = strs(&["fun", "nice", "healthy"]);

        let unified = unify(ListPolicy::KeepUpdateConflictOnHeadDelete, &root, &head, &update);
        assert_eq!(picked(&unified), strs(&["fun", "nice", "healthy"]));
        assert_eq!(
            unified.conflicts,
            vec![Conflict::new(
                ConflictKind::AddBackToHead,
                Path::root(),
                Some(json!("cool")),
            )]
        );
    }

    #[test]
    fn new_update_entity_becomes_insert_conflict() {
        let root = ints(&[1]);
        let head = ints(&[1, 2]);
        let update = ints(&[3]);

        let unified = unify(ListPolicy::KeepHeadConflictOnNewUpdate, &root, &head, &update);
        assert_eq!(picked(&unified), ints(&[1, 2]));
        assert_eq!(
            unified.conflicts,
            vec![Conflict::new(
                ConflictKind::Insert,
                Path::root().child(0),
                Some(json!(3)),
            )]
        );
    }

    #[test]
    fn ambiguous_matches_become_manual_merge_choices() {
        let cmp = PrimaryKeyComparator::from_fields(["k"]);
        let root = Vec::new();
        let head = vec![json!({"k": 1, "v": "h"})];
        let update = vec![json!({"k": 1, "v": "u1"}), json!({"k": 1, "v": "u2"})];

        let unified = ListUnifier::new(ListPolicy::UnionHeadFirst, &cmp)
            .unify(&root, &head, &update)
            .unwrap();
        assert!(unified.triples.is_empty());
        assert_eq!(
            unified.conflicts,
            vec![Conflict::new(
                ConflictKind::ManualMerge,
                Path::root(),
                Some(json!([
                    null,
                    {"k": 1, "v": "h"},
                    [{"k": 1, "v": "u1"}, {"k": 1, "v": "u2"}]
                ])),
            )]
        );
    }

    #[test]
    fn manual_merge_limit_fails_hard() {
        let cmp = PrimaryKeyComparator::from_fields(["k"]);
        let root = Vec::new();
        let head = vec![json!({"k": 1, "v": "h"})];
        let update = vec![json!({"k": 1, "v": "u1"}), json!({"k": 1, "v": "u2"})];

        let err = ListUnifier::new(ListPolicy::UnionHeadFirst, &cmp)
            .with_manual_merge_limit(0)
            .unify(&root, &head, &update)
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::ManualMergeLimit { count: 1, limit: 0 }
        ));

        // At or under the limit the choices are reported as conflicts.
        let unified = ListUnifier::new(ListPolicy::UnionHeadFirst, &cmp)
            .with_manual_merge_limit(1)
            .unify(&root, &head, &update)
            .unwrap();
        assert_eq!(unified.conflicts.len(), 1);
    }
}
