//! Conflicts recorded during a merge.
//!
//! A [`Conflict`] marks a point where automatic resolution applied a
//! fallback or could not be performed at all. Conflicts are value types:
//! comparable and hashable so duplicates arising from overlapping
//! resolution rules can be collapsed in a set.
//!
//! Conflicts serialize to a JSON-Patch-like representation
//! ([RFC 6902](https://tools.ietf.org/html/rfc6902)) with paths rendered
//! as JSON pointers ([RFC 6901](https://tools.ietf.org/html/rfc6901)) and
//! the original conflict kind carried in a `$type` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::Path;

/// The closed set of conflict kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// The list at the conflict path might need to be reordered: the two
    /// source orders contradicted each other and a best-effort order was
    /// emitted instead.
    Reorder,
    /// The triple in the conflict body matched ambiguously and has to be
    /// merged by hand, then added back at the conflict path.
    ManualMerge,
    /// The entity in the conflict body was dropped from the list at the
    /// conflict path even though head carried it; it may need to be added
    /// back.
    AddBackToHead,
    /// The value in the conflict body lost a field-level resolution and
    /// may need to be set at the conflict path.
    SetField,
    /// The losing side deleted the field at the conflict path; it may need
    /// to be removed from the result.
    RemoveField,
    /// The entity in the conflict body is new in update and was excluded
    /// from the result by the list policy.
    Insert,
}

impl ConflictKind {
    /// The JSON-Patch operation this kind maps to.
    fn patch_op(self) -> &'static str {
        match self {
            ConflictKind::Reorder | ConflictKind::SetField => "replace",
            ConflictKind::ManualMerge | ConflictKind::AddBackToHead | ConflictKind::Insert => "add",
            ConflictKind::RemoveField => "remove",
        }
    }

    /// Whether the pointer gets a `/-` append marker.
    fn appends(self) -> bool {
        matches!(self.patch_op(), "add")
    }
}

/// A single JSON-Patch entry produced from a conflict.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    /// JSON pointer to the conflicting location.
    pub path: String,
    /// JSON-Patch operation name.
    pub op: String,
    /// The conflict payload (`null` when the conflict carries none).
    pub value: Value,
    /// The originating conflict kind.
    #[serde(rename = "$type")]
    pub kind: ConflictKind,
}

/// A recorded merge conflict.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Conflict {
    /// What kind of resolution failure this records.
    pub kind: ConflictKind,
    /// Where in the merged tree it happened.
    pub path: Path,
    /// Optional payload, usually the losing or dropped value.
    pub body: Option<Value>,
}

impl Conflict {
    /// Create a conflict.
    pub fn new(kind: ConflictKind, path: Path, body: Option<Value>) -> Self {
        Self { kind, path, body }
    }

    /// Returns the same conflict lifted under `prefix`.
    pub fn with_prefix(&self, prefix: &Path) -> Self {
        Self {
            kind: self.kind,
            path: self.path.with_prefix(prefix),
            body: self.body.clone(),
        }
    }

    /// Expand into JSON-Patch entries.
    ///
    /// A body that is a JSON array expands to one entry per non-null
    /// element; any other body produces a single entry. [`RemoveField`]
    /// always emits exactly one entry even with a null value.
    ///
    /// [`RemoveField`]: ConflictKind::RemoveField
    pub fn to_patch_ops(&self) -> Vec<PatchOp> {
        let pointer = if self.kind.appends() {
            // An append marker under the root still needs a bare prefix.
            let prefix = if self.path.is_root() {
                String::new()
            } else {
                self.path.pointer()
            };
            format!("{prefix}/-")
        } else {
            self.path.pointer()
        };
        let op = self.kind.patch_op();

        let values: Vec<Value> = match &self.body {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => vec![Value::Null],
        };

        values
            .into_iter()
            .filter(|value| !value.is_null() || self.kind == ConflictKind::RemoveField)
            .map(|value| PatchOp {
                path: pointer.clone(),
                op: op.to_owned(),
                value,
                kind: self.kind,
            })
            .collect()
    }

    /// Serialize the JSON-Patch entries to a JSON string.
    pub fn to_patch_json(&self) -> String {
        // PatchOp contains only plainly serializable fields.
        serde_json::to_string(&self.to_patch_ops()).unwrap_or_else(|_| "[]".to_owned())
    }
}
