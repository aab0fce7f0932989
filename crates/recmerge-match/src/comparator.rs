//! Pluggable entity equality between list elements.
//!
//! A [`Comparator`] decides whether two elements of two lists denote the
//! same real-world entity. The match graph builder consumes the full
//! pairwise relation as a [`MatchTable`], which comparators may produce
//! element-by-element (the default) or in one global pass (see the
//! distance comparator).
//!
//! # Key Types
//!
//! - [`Comparator`] -- the equality capability
//! - [`ExactComparator`] -- deep JSON equality
//! - [`PrimaryKeyComparator`] -- equality on configured key field sets with
//!   per-field normalization
//! - [`MatchTable`] -- symmetric pairwise match relation between two lists

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use recmerge_core::get_dotted;

/// Normalization applied to a field value before comparison.
pub type NormalizeFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// The full match relation between two lists.
///
/// Symmetric by construction: `l1_matches(i)` contains `j` exactly when
/// `l2_matches(j)` contains `i`.
#[derive(Clone, Debug, Default)]
pub struct MatchTable {
    l1_to_l2: Vec<Vec<usize>>,
    l2_to_l1: Vec<Vec<usize>>,
}

impl MatchTable {
    /// Empty relation between lists of the given lengths.
    pub fn new(l1_len: usize, l2_len: usize) -> Self {
        Self {
            l1_to_l2: vec![Vec::new(); l1_len],
            l2_to_l1: vec![Vec::new(); l2_len],
        }
    }

    /// Record that `l1[i]` and `l2[j]` are the same entity.
    pub fn add(&mut self, i: usize, j: usize) {
        if !self.l1_to_l2[i].contains(&j) {
            self.l1_to_l2[i].push(j);
            self.l2_to_l1[j].push(i);
        }
    }

    /// Indices in the second list matching `l1[i]`.
    pub fn l1_matches(&self, i: usize) -> &[usize] {
        &self.l1_to_l2[i]
    }

    /// Indices in the first list matching `l2[j]`.
    pub fn l2_matches(&self, j: usize) -> &[usize] {
        &self.l2_to_l1[j]
    }
}

/// Decides whether two list elements are the same entity.
pub trait Comparator: Send + Sync {
    /// Whether `a` and `b` denote the same entity.
    fn equal(&self, a: &Value, b: &Value) -> bool;

    /// The pairwise relation between two whole lists.
    ///
    /// The default checks every pair with [`equal`]; comparators that
    /// optimize over whole lists at once override this.
    ///
    /// [`equal`]: Comparator::equal
    fn match_table(&self, l1: &[Value], l2: &[Value]) -> MatchTable {
        let mut table = MatchTable::new(l1.len(), l2.len());
        for (i, a) in l1.iter().enumerate() {
            for (j, b) in l2.iter().enumerate() {
                if self.equal(a, b) {
                    table.add(i, j);
                }
            }
        }
        table
    }
}

/// Entities are the same only when deeply equal.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactComparator;

impl Comparator for ExactComparator {
    fn equal(&self, a: &Value, b: &Value) -> bool {
        a == b
    }
}

/// Equality on configured primary-key field sets.
///
/// Two objects are the same entity when they are deeply equal, or when
/// for at least one configured key set every field in the set is present
/// in both objects and compares equal after normalization. A field
/// missing on either side fails that whole set.
///
/// Key fields are dotted paths of object keys (`"group.id"`). Each set is
/// a conjunction; the sets themselves are alternatives.
#[derive(Clone, Default)]
pub struct PrimaryKeyComparator {
    key_sets: Vec<Vec<String>>,
    normalizers: HashMap<String, NormalizeFn>,
}

impl PrimaryKeyComparator {
    /// Comparator over the given key sets.
    pub fn new<S, F, K>(key_sets: K) -> Self
    where
        S: Into<String>,
        F: IntoIterator<Item = S>,
        K: IntoIterator<Item = F>,
    {
        Self {
            key_sets: key_sets
                .into_iter()
                .map(|set| set.into_iter().map(Into::into).collect())
                .collect(),
            normalizers: HashMap::new(),
        }
    }

    /// Comparator where each listed field is its own single-field key set.
    pub fn from_fields<S, F>(fields: F) -> Self
    where
        S: Into<String>,
        F: IntoIterator<Item = S>,
    {
        Self::new(fields.into_iter().map(|f| [f]))
    }

    /// Normalize `field` with `normalize` before every comparison.
    pub fn with_normalizer(
        mut self,
        field: impl Into<String>,
        normalize: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.normalizers.insert(field.into(), Arc::new(normalize));
        self
    }

    fn normalized(&self, field: &str, value: &Value) -> Value {
        match self.normalizers.get(field) {
            Some(normalize) => normalize(value),
            None => value.clone(),
        }
    }

    fn key_set_matches(&self, set: &[String], a: &Value, b: &Value) -> bool {
        set.iter().all(|field| {
            match (get_dotted(a, field), get_dotted(b, field)) {
                (Some(va), Some(vb)) => self.normalized(field, va) == self.normalized(field, vb),
                _ => false,
            }
        })
    }
}

impl Comparator for PrimaryKeyComparator {
    fn equal(&self, a: &Value, b: &Value) -> bool {
        if a == b {
            return true;
        }
        self.key_sets
            .iter()
            .any(|set| !set.is_empty() && self.key_set_matches(set, a, b))
    }
}
