//! Merge policies.
//!
//! Two closed policy dimensions drive the engine: [`ObjectPolicy`] picks
//! the winning side when a scalar or object field cannot be resolved by
//! three-way comparison, and [`ListPolicy`] selects which lists contribute
//! entities to a unified list, how order ties break, and which deletions
//! or insertions must be reported as conflicts.
//!
//! Every dispatch over these enums is an exhaustive `match`, so extending
//! a policy dimension is a compile error until each site handles it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three versions taking part in a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Root,
    Head,
    Update,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Root => f.write_str("root"),
            Source::Head => f.write_str("head"),
            Source::Update => f.write_str("update"),
        }
    }
}

/// Fallback winner for scalar and object field conflicts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectPolicy {
    /// On an unresolvable field the head value stays.
    #[default]
    KeepHead,
    /// On an unresolvable field the update value wins.
    KeepUpdate,
}

/// Entity selection and ordering policy for list unification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListPolicy {
    /// Keep only entities present in head.
    KeepOnlyHead,
    /// Keep only entities present in update.
    KeepOnlyUpdate,
    /// Keep entities from both lists; head order wins ties.
    #[default]
    UnionHeadFirst,
    /// Keep entities from both lists; update order wins ties.
    UnionUpdateFirst,
    /// Keep only update entities, flagging every head entity the update
    /// dropped with an `ADD_BACK_TO_HEAD` conflict.
    KeepUpdateConflictOnHeadDelete,
    /// Keep entities from both lists, flagging head entities the update
    /// dropped with an `ADD_BACK_TO_HEAD` conflict.
    UnionConflictOnHeadDelete,
    /// Keep only head entities, flagging entities that appear for the
    /// first time in update with an `INSERT` conflict.
    KeepHeadConflictOnNewUpdate,
}

impl ListPolicy {
    /// The lists whose entities seed the match graph, in seeding order.
    ///
    /// Root never seeds nodes; root elements only join a node by matching
    /// a seeded head or update element.
    pub fn sources(self) -> &'static [Source] {
        match self {
            ListPolicy::KeepOnlyHead => &[Source::Head],
            ListPolicy::KeepOnlyUpdate => &[Source::Update],
            ListPolicy::UnionHeadFirst => &[Source::Update, Source::Head],
            ListPolicy::UnionUpdateFirst => &[Source::Update, Source::Head],
            ListPolicy::KeepUpdateConflictOnHeadDelete => &[Source::Update],
            ListPolicy::UnionConflictOnHeadDelete => &[Source::Update, Source::Head],
            ListPolicy::KeepHeadConflictOnNewUpdate => &[Source::Head, Source::Update],
        }
    }

    /// The source whose order wins when the sequencer may pick either of
    /// two unordered nodes.
    pub fn pick_first(self) -> Source {
        match self {
            ListPolicy::KeepOnlyHead => Source::Head,
            ListPolicy::UnionHeadFirst => Source::Head,
            ListPolicy::KeepOnlyUpdate
            | ListPolicy::UnionUpdateFirst
            | ListPolicy::KeepUpdateConflictOnHeadDelete
            | ListPolicy::UnionConflictOnHeadDelete
            | ListPolicy::KeepHeadConflictOnNewUpdate => Source::Update,
        }
    }

    /// Whether dropping a head entity from the result is a conflict.
    pub fn conflict_on_head_delete(self) -> bool {
        matches!(
            self,
            ListPolicy::KeepUpdateConflictOnHeadDelete | ListPolicy::UnionConflictOnHeadDelete
        )
    }

    /// Whether an entity new in update is a conflict.
    pub fn conflict_on_new_update(self) -> bool {
        matches!(self, ListPolicy::KeepHeadConflictOnNewUpdate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_policies_seed_from_both_lists() {
        assert_eq!(
            ListPolicy::UnionHeadFirst.sources(),
            &[Source::Update, Source::Head]
        );
        assert_eq!(
            ListPolicy::UnionUpdateFirst.sources(),
            &[Source::Update, Source::Head]
        );
    }

    #[test]
    fn keep_only_policies_seed_from_one_list() {
        assert_eq!(ListPolicy::KeepOnlyHead.sources(), &[Source::Head]);
        assert_eq!(ListPolicy::KeepOnlyUpdate.sources(), &[Source::Update]);
        assert_eq!(
            ListPolicy::KeepUpdateConflictOnHeadDelete.sources(),
            &[Source::Update]
        );
    }

    #[test]
    fn tie_break_follows_policy_name() {
        assert_eq!(ListPolicy::UnionHeadFirst.pick_first(), Source::Head);
        assert_eq!(ListPolicy::UnionUpdateFirst.pick_first(), Source::Update);
        assert_eq!(
            ListPolicy::KeepHeadConflictOnNewUpdate.pick_first(),
            Source::Update
        );
    }

    #[test]
    fn conflict_flags_match_policy() {
        assert!(ListPolicy::KeepUpdateConflictOnHeadDelete.conflict_on_head_delete());
        assert!(ListPolicy::UnionConflictOnHeadDelete.conflict_on_head_delete());
        assert!(!ListPolicy::UnionHeadFirst.conflict_on_head_delete());
        assert!(ListPolicy::KeepHeadConflictOnNewUpdate.conflict_on_new_update());
        assert!(!ListPolicy::KeepOnlyHead.conflict_on_new_update());
    }
}
