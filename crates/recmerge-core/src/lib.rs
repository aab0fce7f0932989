//! Core data model for the recmerge three-way merge engine.
//!
//! Holds the vocabulary shared by the matching and merging crates: tree
//! paths, merge policies, conflict records, error types and navigation
//! helpers over JSON values. Versions of a value that are absent are
//! modelled as `Option<serde_json::Value>` being `None`, never as a
//! sentinel value inside the tree.
//!
//! # Key Types
//!
//! - [`Path`] / [`PathSegment`] -- location in a JSON tree, renderable as an
//!   RFC 6901 pointer or projected to a dotted config key
//! - [`Conflict`] / [`ConflictKind`] -- recorded fallback resolutions, with
//!   JSON-Patch serialization
//! - [`ObjectPolicy`] / [`ListPolicy`] / [`Source`] -- the closed policy enums
//!   driving field fallbacks and list unification
//! - [`MergeError`] -- batched conflict error and hard limit errors

pub mod conflict;
pub mod error;
pub mod ops;
pub mod path;
pub mod value;

pub use conflict::{Conflict, ConflictKind, PatchOp};
pub use error::{MergeError, MergeResult};
pub use ops::{ListPolicy, ObjectPolicy, Source};
pub use path::{path_from_dotted, Path, PathSegment};
pub use value::{
    get_at_path, get_at_path_mut, get_dotted, remove_at_path, set_at_path, value_weight,
    ALIGNMENT_PLACEHOLDER,
};
