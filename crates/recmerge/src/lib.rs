//! Three-way semantic merge of JSON documents.
//!
//! Given a common ancestor (`root`) and two revisions of it (`head` and
//! `update`), [`Merger`] produces one merged document plus a list of
//! [`Conflict`]s for everything that needed a policy fallback. Lists are
//! not merged positionally: their elements are matched into entities by
//! a configurable [`Comparator`], sequenced to respect both sides'
//! ordering, and merged entity by entity.
//!
//! ```no_run
//! use recmerge::{ListPolicy, Merger, ObjectPolicy};
//! use serde_json::json;
//!
//! let mut merger = Merger::new(
//!     json!({"badges": ["bad", "random"]}),
//!     json!({"badges": ["cool", "nice", "random"]}),
//!     json!({"badges": ["fun", "nice", "healthy"]}),
//!     ObjectPolicy::KeepHead,
//!     ListPolicy::UnionHeadFirst,
//! );
//! merger.merge()?;
//! assert_eq!(
//!     merger.merged,
//!     Some(json!({"badges": ["cool", "fun", "nice", "random", "healthy"]})),
//! );
//! # Ok::<(), recmerge::MergeError>(())
//! ```
//!
//! # Key Types
//!
//! - [`Merger`] -- the merge driver and its output fields
//! - [`ObjectMerger`] / [`ListUnifier`] -- the two merge passes, usable
//!   standalone
//! - [`FieldResolver`] -- fixed or callback-based conflict resolution per
//!   field
//! - [`Comparator`] implementations -- exact, primary-key and
//!   distance-based entity matching

pub mod list_unifier;
pub mod merger;
pub mod object_merger;
pub mod resolver;

pub use list_unifier::{ListUnifier, Triple, UnifiedList};
pub use merger::Merger;
pub use object_merger::ObjectMerger;
pub use resolver::{FieldResolver, ResolverFn};

pub use recmerge_core::{
    path_from_dotted, Conflict, ConflictKind, ListPolicy, MergeError, MergeResult, ObjectPolicy,
    PatchOp, Path, PathSegment, Source, ALIGNMENT_PLACEHOLDER,
};
pub use recmerge_match::{
    AssignmentSolver, Comparator, DistanceComparator, DistanceFn, ExactComparator, KuhnMunkresSolver,
    ListMatchStats, MatchGraph, MatchGraphBuilder, NormalizeFn, PrimaryKeyComparator,
};
