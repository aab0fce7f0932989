//! Entity matching for the recmerge three-way merge engine.
//!
//! Links the elements of root, head and update lists that denote the
//! same entity, and orders the matched entities for the final merged
//! list. Equality between elements is pluggable through the
//! [`Comparator`] trait; matched entities form a [`MatchGraph`] whose
//! precedence edges are linearized by the sequencer.
//!
//! # Key Types
//!
//! - [`Comparator`] / [`ExactComparator`] / [`PrimaryKeyComparator`] /
//!   [`DistanceComparator`] -- entity equality
//! - [`MatchGraphBuilder`] / [`MatchGraph`] / [`MatchNode`] -- entity
//!   grouping and order constraints
//! - [`toposort`] / [`best_effort_order`] -- sequencing
//! - [`ListMatchStats`] -- where each list's elements ended up

pub mod comparator;
pub mod distance;
pub mod graph;
pub mod sequence;
pub mod stats;

pub use comparator::{Comparator, ExactComparator, MatchTable, NormalizeFn, PrimaryKeyComparator};
pub use distance::{AssignmentSolver, DistanceComparator, DistanceFn, KuhnMunkresSolver};
pub use graph::{MatchGraph, MatchGraphBuilder, MatchNode};
pub use sequence::{best_effort_order, toposort};
pub use stats::ListMatchStats;
