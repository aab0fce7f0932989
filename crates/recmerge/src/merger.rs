//! The top-level three-way merge driver.
//!
//! [`Merger`] walks the document tree, merging objects and scalars with
//! [`ObjectMerger`](crate::ObjectMerger) and handing every deferred list
//! field to [`ListUnifier`](crate::ListUnifier). Unified entities are
//! merged recursively, so nested entity lists work at any depth.
//!
//! Besides the merged document the driver keeps aligned copies of the
//! three inputs, in which matched list entities share the same index
//! (absent slots carry [`ALIGNMENT_PLACEHOLDER`]), and per-list match
//! statistics keyed by the list's absolute path. All of these are
//! populated even when the merge reports conflicts.
//!
//! Per-path configuration is addressed by config keys: the dotted path
//! of a field with list indices left out, so one key covers every
//! element of a list (`"people.tags"`, not `"people.0.tags"`).

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use recmerge_core::{
    get_at_path, set_at_path, Conflict, ListPolicy, MergeError, MergeResult, Path,
    ALIGNMENT_PLACEHOLDER,
};
use recmerge_match::{Comparator, ExactComparator, ListMatchStats};

use crate::list_unifier::{ListUnifier, UnifiedList};
use crate::object_merger::ObjectMerger;
use crate::resolver::FieldResolver;

/// Three-way merger for a pair of edits over a common ancestor.
///
/// `root` is the common ancestor, `head` and `update` the two revisions
/// of it. Configure with the builder methods, then call [`merge`](Self::merge)
/// once and read the output fields.
pub struct Merger {
    root: Value,
    head: Value,
    update: Value,
    default_resolver: FieldResolver,
    default_list_policy: ListPolicy,
    field_resolvers: HashMap<String, FieldResolver>,
    list_policies: HashMap<String, ListPolicy>,
    comparators: HashMap<String, Box<dyn Comparator>>,
    data_lists: HashSet<String>,
    manual_merge_limit: Option<usize>,

    /// The merged document, populated even when conflicts occurred.
    pub merged: Option<Value>,
    /// Every conflict raised during the merge, with absolute paths.
    pub conflicts: Vec<Conflict>,
    /// `root` with matched list entities moved to their unified index.
    pub aligned_root: Value,
    /// `head` aligned the same way.
    pub aligned_head: Value,
    /// `update` aligned the same way.
    pub aligned_update: Value,
    /// Head-side match statistics per unified list field.
    pub head_stats: HashMap<Path, ListMatchStats>,
    /// Update-side match statistics per unified list field.
    pub update_stats: HashMap<Path, ListMatchStats>,
}

impl Merger {
    pub fn new(
        root: Value,
        head: Value,
        update: Value,
        default_resolver: impl Into<FieldResolver>,
        default_list_policy: ListPolicy,
    ) -> Self {
        let aligned_root = root.clone();
        let aligned_head = head.clone();
        let aligned_update = update.clone();
        Self {
            root,
            head,
            update,
            default_resolver: default_resolver.into(),
            default_list_policy,
            field_resolvers: HashMap::new(),
            list_policies: HashMap::new(),
            comparators: HashMap::new(),
            data_lists: HashSet::new(),
            manual_merge_limit: None,
            merged: None,
            conflicts: Vec::new(),
            aligned_root,
            aligned_head,
            aligned_update,
            head_stats: HashMap::new(),
            update_stats: HashMap::new(),
        }
    }

    /// Resolve conflicts under `config_key` with `resolver` instead of
    /// the default.
    pub fn with_field_resolver(
        mut self,
        config_key: impl Into<String>,
        resolver: impl Into<FieldResolver>,
    ) -> Self {
        self.field_resolvers
            .insert(config_key.into(), resolver.into());
        self
    }

    /// Unify the list at `config_key` under `policy` instead of the
    /// default.
    pub fn with_list_policy(mut self, config_key: impl Into<String>, policy: ListPolicy) -> Self {
        self.list_policies.insert(config_key.into(), policy);
        self
    }

    /// Match entities of the list at `config_key` with `comparator`
    /// instead of exact equality.
    pub fn with_comparator(
        mut self,
        config_key: impl Into<String>,
        comparator: impl Comparator + 'static,
    ) -> Self {
        self.comparators
            .insert(config_key.into(), Box::new(comparator));
        self
    }

    /// Treat the list at `config_key` as plain data merged index by
    /// index, not as a list of entities.
    pub fn with_data_list(mut self, config_key: impl Into<String>) -> Self {
        self.data_lists.insert(config_key.into());
        self
    }

    /// Fail the whole merge when any single list accumulates more than
    /// `limit` manual-merge choices.
    pub fn with_manual_merge_limit(mut self, limit: usize) -> Self {
        self.manual_merge_limit = Some(limit);
        self
    }

    /// Run the merge and populate the output fields.
    ///
    /// Returns [`MergeError::Conflicts`] when conflicts occurred; the
    /// merged document and the aligned copies are still populated in
    /// that case. [`MergeError::ManualMergeLimit`] aborts the merge.
    pub fn merge(&mut self) -> MergeResult<()> {
        self.merged = None;
        self.conflicts.clear();
        self.head_stats.clear();
        self.update_stats.clear();
        self.aligned_root = self.root.clone();
        self.aligned_head = self.head.clone();
        self.aligned_update = self.update.clone();

        let root = self.root.clone();
        let head = self.head.clone();
        let update = self.update.clone();
        self.merged =
            self.recursive_merge(Some(root), Some(&head), Some(&update), &Path::root())?;
        debug!(conflicts = self.conflicts.len(), "merge finished");

        if self.conflicts.is_empty() {
            Ok(())
        } else {
            Err(MergeError::Conflicts(self.conflicts.clone()))
        }
    }

    fn recursive_merge(
        &mut self,
        root: Option<Value>,
        head: Option<&Value>,
        update: Option<&Value>,
        path: &Path,
    ) -> MergeResult<Option<Value>> {
        let both_lists = matches!(
            (head, update),
            (Some(Value::Array(_)), Some(Value::Array(_)))
        );

        let (mut base, lists) = if both_lists && !self.data_lists.contains(&path.config_key()) {
            // The node itself is an entity list; unify it as a whole.
            let base = match root {
                Some(value @ Value::Array(_)) => value,
                _ => Value::Array(Vec::new()),
            };
            (Some(base), vec![Path::root()])
        } else {
            self.merge_objects(root.as_ref(), head, update, path)
        };

        for rel in lists {
            let abs = path.join(&rel);
            let root_l = array_at(base.as_ref(), &rel);
            let head_l = array_at(head, &rel);
            let update_l = array_at(update, &rel);

            let unified = self.unify_list(&root_l, &head_l, &update_l, &abs)?;

            let mut merged_list = Vec::with_capacity(unified.triples.len());
            for (idx, (r, h, u)) in unified.triples.iter().enumerate() {
                let element =
                    self.recursive_merge(r.clone(), h.as_ref(), u.as_ref(), &abs.child(idx))?;
                if let Some(element) = element {
                    merged_list.push(element);
                }
            }

            let merged_list = Value::Array(merged_list);
            match base.as_mut() {
                Some(b) => {
                    set_at_path(b, &rel, merged_list);
                }
                None => base = Some(merged_list),
            }
            self.record_alignment(unified, &abs);
        }

        Ok(base)
    }

    /// Merge everything but the entity lists of one node, which come
    /// back as the second member for later unification.
    fn merge_objects(
        &mut self,
        root: Option<&Value>,
        head: Option<&Value>,
        update: Option<&Value>,
        path: &Path,
    ) -> (Option<Value>, Vec<Path>) {
        let data_lists = subtree_config(&self.data_lists, path);
        let mut merger = ObjectMerger::new(
            &self.default_resolver,
            &self.field_resolvers,
            &data_lists,
            path.clone(),
        );
        let merged = merger.merge(root, head, update);
        let ObjectMerger {
            skipped_lists,
            conflicts,
            ..
        } = merger;
        self.conflicts
            .extend(conflicts.into_iter().map(|c| c.with_prefix(path)));
        (merged, skipped_lists)
    }

    fn unify_list(
        &mut self,
        root: &[Value],
        head: &[Value],
        update: &[Value],
        abs: &Path,
    ) -> MergeResult<UnifiedList> {
        let config_key = abs.config_key();
        let policy = self
            .list_policies
            .get(&config_key)
            .copied()
            .unwrap_or(self.default_list_policy);
        let comparator: &dyn Comparator = match self.comparators.get(&config_key) {
            Some(comparator) => comparator.as_ref(),
            None => &ExactComparator,
        };

        let mut unifier = ListUnifier::new(policy, comparator);
        if let Some(limit) = self.manual_merge_limit {
            unifier = unifier.with_manual_merge_limit(limit);
        }
        let unified = unifier.unify(root, head, update)?;

        self.conflicts
            .extend(unified.conflicts.iter().map(|c| c.with_prefix(abs)));
        Ok(unified)
    }

    fn record_alignment(&mut self, unified: UnifiedList, abs: &Path) {
        let slot = |value: &Option<Value>| {
            value
                .clone()
                .unwrap_or_else(|| Value::String(ALIGNMENT_PLACEHOLDER.to_owned()))
        };
        let root_list: Vec<Value> = unified.triples.iter().map(|(r, _, _)| slot(r)).collect();
        let head_list: Vec<Value> = unified.triples.iter().map(|(_, h, _)| slot(h)).collect();
        let update_list: Vec<Value> = unified.triples.iter().map(|(_, _, u)| slot(u)).collect();

        // Only put the aligned list back where the path already leads
        // somewhere; the root may lack the whole subtree.
        set_at_path(&mut self.aligned_root, abs, Value::Array(root_list));
        set_at_path(&mut self.aligned_head, abs, Value::Array(head_list));
        set_at_path(&mut self.aligned_update, abs, Value::Array(update_list));

        self.head_stats.insert(abs.clone(), unified.head_stats);
        self.update_stats.insert(abs.clone(), unified.update_stats);
    }
}

fn array_at(value: Option<&Value>, rel: &Path) -> Vec<Value> {
    value
        .and_then(|v| get_at_path(v, rel))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Project a set of config keys onto the subtree at `path`, keeping the
/// part of each key below it.
fn subtree_config(config: &HashSet<String>, path: &Path) -> HashSet<String> {
    let prefix = path.config_key();
    if prefix.is_empty() {
        return config.clone();
    }
    let dotted = format!("{prefix}.");
    config
        .iter()
        .filter_map(|key| key.strip_prefix(&dotted).map(str::to_owned))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    use recmerge_core::{path_from_dotted, ConflictKind, ObjectPolicy};
    use recmerge_match::PrimaryKeyComparator;

    fn badges() -> (Value, Value, Value) {
        (
            json!({"badges": ["bad", "random"]}),
            json!({"badges": ["cool", "nice", "random"]}),
            json!({"badges": ["fun", "nice", "healthy"]}),
        )
    }

    #[test]
    fn keep_only_policies_pick_one_side() {
        let (root, head, update) = badges();
        let mut merger = Merger::new(
            root.clone(),
            head.clone(),
            update.clone(),
            ObjectPolicy::KeepHead,
            ListPolicy::KeepOnlyHead,
        );
        merger.merge().unwrap();
        assert_eq!(merger.merged, Some(json!({"badges": ["cool", "nice", "random"]})));

        let mut merger = Merger::new(
            root,
            head,
            update,
            ObjectPolicy::KeepHead,
            ListPolicy::KeepOnlyUpdate,
        );
        merger.merge().unwrap();
        assert_eq!(merger.merged, Some(json!({"badges": ["fun", "nice", "healthy"]})));
    }

    #[test]
    fn union_keeps_order_constraints_from_both_sides() {
        let (root, head, update) = badges();
        let mut merger = Merger::new(
            root.clone(),
            head.clone(),
            update.clone(),
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        );
        merger.merge().unwrap();
        assert_eq!(
            merger.merged,
            Some(json!({"badges": ["cool", "fun", "nice", "random", "healthy"]}))
        );

        let mut merger = Merger::new(
            root,
            head,
            update,
            ObjectPolicy::KeepHead,
            ListPolicy::UnionUpdateFirst,
        );
        merger.merge().unwrap();
        assert_eq!(
            merger.merged,
            Some(json!({"badges": ["fun", "cool", "nice", "healthy", "random"]}))
        );
    }

    #[test]
    fn cyclic_top_level_lists_report_reorder() {
        let mut merger = Merger::new(
            json!([]),
            json!([1, 2, 5, 3]),
            json!([3, 1, 2, 4]),
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        );
        merger.merge().unwrap_err();
        assert_eq!(merger.merged, Some(json!([1, 2, 5, 3, 4])));
        assert_eq!(
            merger.conflicts,
            vec![Conflict::new(ConflictKind::Reorder, Path::root(), None)]
        );

        let mut merger = Merger::new(
            json!([]),
            json!([1, 2, 5, 3]),
            json!([3, 1, 2, 4]),
            ObjectPolicy::KeepHead,
            ListPolicy::UnionUpdateFirst,
        );
        merger.merge().unwrap_err();
        assert_eq!(merger.merged, Some(json!([3, 1, 2, 4, 5])));
    }

    #[test]
    fn head_delete_conflict_carries_the_list_path() {
        let (root, head, update) = badges();
        let mut merger = Merger::new(
            root,
            head,
            update,
            ObjectPolicy::KeepHead,
            ListPolicy::KeepUpdateConflictOnHeadDelete,
        );
        merger.merge().unwrap_err();
        assert_eq!(merger.merged, Some(json!({"badges": ["fun", "nice", "healthy"]})));
        assert_eq!(
            merger.conflicts,
            vec![Conflict::new(
                ConflictKind::AddBackToHead,
                path_from_dotted("badges"),
                Some(json!("cool")),
            )]
        );
    }

    #[test]
    fn entity_merge_aligns_lists_and_reports_field_conflicts() {
        let root = json!({"people": [{"name": "Jimmy", "age": 30}]});
        let head = json!({"people": [
            {"name": "Jimmy", "age": 31},
            {"name": "George"},
        ]});
        let update = json!({"people": [
            {"name": "John"},
            {"name": "Jimmy", "age": 32},
        ]});

        let mut merger = Merger::new(
            root,
            head,
            update,
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        )
        .with_comparator("people", PrimaryKeyComparator::from_fields(["name"]));
        let err = merger.merge().unwrap_err();
        assert_eq!(err.conflicts(), merger.conflicts.as_slice());

        assert_eq!(
            merger.merged,
            Some(json!({"people": [
                {"name": "John"},
                {"name": "Jimmy", "age": 31},
                {"name": "George"},
            ]}))
        );
        assert_eq!(
            merger.conflicts,
            vec![Conflict::new(
                ConflictKind::SetField,
                path_from_dotted("people")
                    .child(1usize)
                    .child("age"),
                Some(json!(32)),
            )]
        );

        let placeholder = json!(ALIGNMENT_PLACEHOLDER);
        assert_eq!(
            merger.aligned_root,
            json!({"people": [
                placeholder,
                {"name": "Jimmy", "age": 30},
                placeholder,
            ]})
        );
        assert_eq!(
            merger.aligned_head,
            json!({"people": [
                placeholder,
                {"name": "Jimmy", "age": 31},
                {"name": "George"},
            ]})
        );
        assert_eq!(
            merger.aligned_update,
            json!({"people": [
                {"name": "John"},
                {"name": "Jimmy", "age": 32},
                placeholder,
            ]})
        );

        let people = path_from_dotted("people");
        assert_eq!(
            merger.head_stats[&people].in_result(),
            vec![json!({"name": "Jimmy", "age": 31}), json!({"name": "George"})]
        );
        assert!(merger.update_stats[&people].not_in_result().is_empty());
    }

    #[test]
    fn per_list_policy_overrides_the_default() {
        let mut merger = Merger::new(
            json!({"a": [1], "b": [1]}),
            json!({"a": [1, 2], "b": [1, 2]}),
            json!({"a": [3], "b": [3]}),
            ObjectPolicy::KeepHead,
            ListPolicy::KeepOnlyHead,
        )
        .with_list_policy("b", ListPolicy::KeepOnlyUpdate);
        merger.merge().unwrap();
        assert_eq!(merger.merged, Some(json!({"a": [1, 2], "b": [3]})));
    }

    #[test]
    fn field_resolver_override_flips_the_winner() {
        let mut merger = Merger::new(
            json!({"name": "Jim", "age": 30}),
            json!({"name": "Johnny", "age": 31}),
            json!({"name": "Jonathan", "age": 32}),
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        )
        .with_field_resolver("name", ObjectPolicy::KeepUpdate);
        merger.merge().unwrap_err();
        assert_eq!(merger.merged, Some(json!({"name": "Jonathan", "age": 31})));
        // Fields merge in map order, so the age conflict comes first.
        assert_eq!(
            merger.conflicts,
            vec![
                Conflict::new(
                    ConflictKind::SetField,
                    path_from_dotted("age"),
                    Some(json!(32)),
                ),
                Conflict::new(
                    ConflictKind::SetField,
                    path_from_dotted("name"),
                    Some(json!("Johnny")),
                ),
            ]
        );
    }

    #[test]
    fn keep_longest_default_prefers_the_heavier_value() {
        let mut merger = Merger::new(
            json!({"bio": "old"}),
            json!({"bio": "tiny"}),
            json!({"bio": "a much longer biography"}),
            FieldResolver::keep_longest(),
            ListPolicy::UnionHeadFirst,
        );
        merger.merge().unwrap_err();
        assert_eq!(
            merger.merged,
            Some(json!({"bio": "a much longer biography"}))
        );
    }

    #[test]
    fn data_lists_merge_in_place() {
        let mut merger = Merger::new(
            json!({"matrix": [[0, 0], [0, 0]]}),
            json!({"matrix": [[1, 1], [0, 0]]}),
            json!({"matrix": [[0, 0], [1, 1]]}),
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        )
        .with_data_list("matrix");
        merger.merge().unwrap();
        assert_eq!(merger.merged, Some(json!({"matrix": [[1, 1], [1, 1]]})));
        assert!(merger.head_stats.is_empty());
    }

    #[test]
    fn non_list_root_is_coerced_for_unification() {
        let mut merger = Merger::new(
            json!({"l": 5}),
            json!({"l": [1]}),
            json!({"l": [1]}),
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        );
        merger.merge().unwrap();
        assert_eq!(merger.merged, Some(json!({"l": [1]})));
    }

    #[test]
    fn manual_merge_limit_aborts_the_merge() {
        let mut merger = Merger::new(
            json!({"l": []}),
            json!({"l": [{"k": 1, "v": "h"}]}),
            json!({"l": [{"k": 1, "v": "u1"}, {"k": 1, "v": "u2"}]}),
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        )
        .with_comparator("l", PrimaryKeyComparator::from_fields(["k"]))
        .with_manual_merge_limit(0);
        let err = merger.merge().unwrap_err();
        assert!(matches!(err, MergeError::ManualMergeLimit { count: 1, limit: 0 }));
        assert_eq!(merger.merged, None);
    }

    #[test]
    fn nested_entity_lists_unify_at_depth() {
        let root = json!({"people": [{"name": "Jimmy", "tags": ["a"]}]});
        let head = json!({"people": [{"name": "Jimmy", "tags": ["a", "b"]}]});
        let update = json!({"people": [{"name": "Jimmy", "tags": ["c", "a"]}]});

        let mut merger = Merger::new(
            root,
            head,
            update,
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        )
        .with_comparator("people", PrimaryKeyComparator::from_fields(["name"]));
        merger.merge().unwrap();
        assert_eq!(
            merger.merged,
            Some(json!({"people": [{"name": "Jimmy", "tags": ["c", "a", "b"]}]}))
        );
        // Nested stats are keyed by the absolute path with indices.
        let tags = path_from_dotted("people").child(0usize).child("tags");
        assert_eq!(merger.head_stats[&tags].in_result(), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn lists_under_equal_subobjects_still_unify() {
        let mut merger = Merger::new(
            json!({"o": {"l": ["a", "x"]}}),
            json!({"o": {"l": ["a", "b"]}}),
            json!({"o": {"l": ["a", "b"]}}),
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        );
        merger.merge().unwrap();
        assert_eq!(merger.merged, Some(json!({"o": {"l": ["a", "b"]}})));

        let l = path_from_dotted("o.l");
        assert_eq!(merger.head_stats[&l].in_result(), vec![json!("a"), json!("b")]);
        assert_eq!(merger.head_stats[&l].not_matched_root_objects(), vec![json!("x")]);
        assert_eq!(
            merger.aligned_root,
            json!({"o": {"l": ["a", ALIGNMENT_PLACEHOLDER]}})
        );
    }

    #[test]
    fn duplicate_keys_under_equal_subobjects_still_conflict() {
        let sides = json!({"o": {"l": [{"k": 1, "v": "x"}, {"k": 1, "v": "y"}]}});
        let mut merger = Merger::new(
            json!({"o": {"l": []}}),
            sides.clone(),
            sides,
            ObjectPolicy::KeepHead,
            ListPolicy::UnionHeadFirst,
        )
        .with_comparator("o.l", PrimaryKeyComparator::from_fields(["k"]));
        merger.merge().unwrap_err();

        // The ambiguous entities drop out of the merge and come back as
        // a manual-merge choice instead.
        assert_eq!(merger.merged, Some(json!({"o": {"l": []}})));
        assert_eq!(
            merger.conflicts,
            vec![Conflict::new(
                ConflictKind::ManualMerge,
                path_from_dotted("o.l"),
                Some(json!([
                    null,
                    [{"k": 1, "v": "x"}, {"k": 1, "v": "y"}],
                    [{"k": 1, "v": "x"}, {"k": 1, "v": "y"}]
                ])),
            )]
        );
    }

    fn arb_doc() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::from),
            // Lists of distinct scalars, so exact matching stays
            // unambiguous.
            prop::collection::btree_set(0i64..100, 0..4)
                .prop_map(|s| Value::Array(s.into_iter().map(Value::from).collect())),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop::collection::btree_map("[a-z]{1,3}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect()))
        })
    }

    proptest! {
        #[test]
        fn stats_partition_every_list_index(
            root in arb_doc(),
            head in arb_doc(),
            update in arb_doc(),
        ) {
            let mut merger = Merger::new(
                root,
                head,
                update,
                ObjectPolicy::KeepHead,
                ListPolicy::UnionHeadFirst,
            );
            // Soft conflicts are fine here; only the stats matter.
            let _ = merger.merge();
            for stats in merger.head_stats.values().chain(merger.update_stats.values()) {
                let in_result = stats.in_result_idx();
                let dropped = stats.not_in_result_idx();
                prop_assert!(in_result.is_disjoint(&dropped));

                let root_matched = stats.not_in_result_root_match_idx().clone();
                let unmatched = stats.not_in_result_not_root_match_idx();
                prop_assert!(root_matched.is_disjoint(&unmatched));
                let rejoined: std::collections::BTreeSet<usize> =
                    root_matched.union(&unmatched).copied().collect();
                prop_assert_eq!(rejoined, dropped);
            }
        }

        #[test]
        fn merging_identical_documents_is_identity(doc in arb_doc()) {
            let mut merger = Merger::new(
                doc.clone(),
                doc.clone(),
                doc.clone(),
                ObjectPolicy::KeepHead,
                ListPolicy::UnionHeadFirst,
            );
            merger.merge().unwrap();
            prop_assert_eq!(merger.merged, Some(doc));
            prop_assert!(merger.conflicts.is_empty());
        }
    }
}
