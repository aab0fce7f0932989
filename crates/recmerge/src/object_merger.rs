//! Three-way merge of scalars and objects, deferring entity lists.
//!
//! [`ObjectMerger`] merges one tree node field by field. List-valued
//! fields present in both head and update are not merged here: they are
//! recorded as skipped and the merged value temporarily keeps the root's
//! list, so the caller can unify them entity by entity afterwards. Only
//! lists configured as plain data are merged in place, index by index.
//!
//! Each field resolves through a fixed ladder: equal head and update win
//! outright, a side equal to root yields to the other side, and anything
//! else falls back to the configured [`FieldResolver`], recording one
//! conflict for the losing value.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use recmerge_core::{Conflict, ConflictKind, ObjectPolicy, Path};

use crate::resolver::FieldResolver;

/// Merges the non-list parts of one tree node.
pub struct ObjectMerger<'a> {
    default: &'a FieldResolver,
    overrides: &'a HashMap<String, FieldResolver>,
    /// Dotted keys, relative to this node, whose lists are plain data.
    data_lists: &'a HashSet<String>,
    /// Absolute location of this node, for override lookup.
    base_path: Path,
    /// List fields deferred to entity unification, relative to this node.
    pub skipped_lists: Vec<Path>,
    /// Conflicts recorded so far, with node-relative paths.
    pub conflicts: Vec<Conflict>,
}

impl<'a> ObjectMerger<'a> {
    pub fn new(
        default: &'a FieldResolver,
        overrides: &'a HashMap<String, FieldResolver>,
        data_lists: &'a HashSet<String>,
        base_path: Path,
    ) -> Self {
        Self {
            default,
            overrides,
            data_lists,
            base_path,
            skipped_lists: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Merge one node. `None` inputs mean the version lacks this node
    /// entirely; a `None` result means every version deleted it.
    pub fn merge(
        &mut self,
        root: Option<&Value>,
        head: Option<&Value>,
        update: Option<&Value>,
    ) -> Option<Value> {
        match (head, update) {
            (Some(Value::Object(h)), Some(Value::Object(u))) => {
                let r = root.and_then(Value::as_object);
                Some(Value::Object(self.merge_maps(r, h, u, &Path::root())))
            }
            _ => self.merge_base_values(root, head, update),
        }
    }

    /// The pick ladder for values that are not an object on both sides.
    fn merge_base_values(
        &mut self,
        root: Option<&Value>,
        head: Option<&Value>,
        update: Option<&Value>,
    ) -> Option<Value> {
        if head == update {
            return head.cloned();
        }
        if head.is_none() {
            return update.cloned();
        }
        if update.is_none() {
            return head.cloned();
        }
        if head == root {
            return update.cloned();
        }
        if update == root {
            return head.cloned();
        }
        let (winner, loser) = match self.rule_for(&Path::root(), head, update) {
            ObjectPolicy::KeepHead => (head, update),
            ObjectPolicy::KeepUpdate => (update, head),
        };
        self.push_conflict(ConflictKind::SetField, Path::root(), loser.cloned());
        winner.cloned()
    }

    fn merge_maps(
        &mut self,
        root: Option<&Map<String, Value>>,
        head: &Map<String, Value>,
        update: &Map<String, Value>,
        rel: &Path,
    ) -> Map<String, Value> {
        let empty = Map::new();
        let root = root.unwrap_or(&empty);
        let mut out = Map::new();
        let keys = head
            .keys()
            .chain(update.keys().filter(|key| !head.contains_key(*key)));
        for key in keys {
            let field = rel.child(key.as_str());
            if let Some(value) =
                self.merge_field(root.get(key), head.get(key), update.get(key), &field)
            {
                out.insert(key.clone(), value);
            }
        }
        out
    }

    fn merge_field(
        &mut self,
        root: Option<&Value>,
        head: Option<&Value>,
        update: Option<&Value>,
        rel: &Path,
    ) -> Option<Value> {
        match (head, update) {
            // Checked ahead of equality: even identical lists go through
            // entity unification so stats and alignment cover them.
            (Some(Value::Array(h)), Some(Value::Array(u))) => {
                if self.is_data_list(rel) {
                    let r = root.and_then(Value::as_array);
                    Some(Value::Array(self.merge_data_list(r, h, u, rel)))
                } else {
                    // Deferred: the caller unifies this list by entity.
                    // Until then the merged tree carries the root's value.
                    debug!(path = %rel, "deferring list field to unification");
                    self.skipped_lists.push(rel.clone());
                    root.cloned()
                }
            }
            // Objects recurse even when deeply equal, so lists nested
            // anywhere inside still get deferred.
            (Some(Value::Object(h)), Some(Value::Object(u))) => {
                let r = root.and_then(Value::as_object);
                Some(Value::Object(self.merge_maps(r, h, u, rel)))
            }
            (Some(h), Some(u)) if h == u => Some(h.clone()),
            // Update deleted the field.
            (Some(h), None) => {
                if root == Some(h) {
                    return None;
                }
                if root.is_none() {
                    return Some(h.clone());
                }
                match self.rule_for(rel, head, update) {
                    ObjectPolicy::KeepHead => {
                        self.push_conflict(ConflictKind::RemoveField, rel.clone(), None);
                        Some(h.clone())
                    }
                    ObjectPolicy::KeepUpdate => {
                        self.push_conflict(ConflictKind::SetField, rel.clone(), Some(h.clone()));
                        None
                    }
                }
            }
            // Head deleted the field.
            (None, Some(u)) => {
                if root == Some(u) {
                    return None;
                }
                if root.is_none() {
                    return Some(u.clone());
                }
                match self.rule_for(rel, head, update) {
                    ObjectPolicy::KeepHead => {
                        self.push_conflict(ConflictKind::SetField, rel.clone(), Some(u.clone()));
                        None
                    }
                    ObjectPolicy::KeepUpdate => {
                        self.push_conflict(ConflictKind::RemoveField, rel.clone(), None);
                        Some(u.clone())
                    }
                }
            }
            // Both changed it, differently.
            (Some(h), Some(u)) => {
                if root == Some(h) {
                    return Some(u.clone());
                }
                if root == Some(u) {
                    return Some(h.clone());
                }
                match self.rule_for(rel, head, update) {
                    ObjectPolicy::KeepHead => {
                        self.push_conflict(ConflictKind::SetField, rel.clone(), Some(u.clone()));
                        Some(h.clone())
                    }
                    ObjectPolicy::KeepUpdate => {
                        self.push_conflict(ConflictKind::SetField, rel.clone(), Some(h.clone()));
                        Some(u.clone())
                    }
                }
            }
            (None, None) => None,
        }
    }

    /// Index-wise merge of a plain data list.
    fn merge_data_list(
        &mut self,
        root: Option<&Vec<Value>>,
        head: &[Value],
        update: &[Value],
        rel: &Path,
    ) -> Vec<Value> {
        let empty = Vec::new();
        let root = root.unwrap_or(&empty);
        let mut out = Vec::new();
        for idx in 0..head.len().max(update.len()) {
            let at = rel.child(idx);
            if let Some(value) = self.merge_field(root.get(idx), head.get(idx), update.get(idx), &at)
            {
                out.push(value);
            }
        }
        out
    }

    fn is_data_list(&self, rel: &Path) -> bool {
        self.data_lists.contains(&rel.config_key())
    }

    /// Find the resolution rule for a conflicting field by climbing the
    /// absolute dotted path from most specific to least.
    fn rule_for(&self, rel: &Path, head: Option<&Value>, update: Option<&Value>) -> ObjectPolicy {
        let mut current = self.base_path.join(rel).config_key();
        let mut down_path: Vec<String> = Vec::new();
        while !current.is_empty() {
            if let Some(resolver) = self.overrides.get(&current) {
                if let Some(policy) = resolver.resolve(head, update, &down_path) {
                    return policy;
                }
            }
            match current.rfind('.') {
                Some(pos) => {
                    down_path.push(current[pos + 1..].to_owned());
                    current.truncate(pos);
                }
                None => down_path.push(std::mem::take(&mut current)),
            }
        }
        let field: Vec<String> = rel.segments().iter().map(ToString::to_string).collect();
        self.default
            .resolve(head, update, &field)
            .unwrap_or(ObjectPolicy::KeepHead)
    }

    fn push_conflict(&mut self, kind: ConflictKind, path: Path, body: Option<Value>) {
        let conflict = Conflict::new(kind, path, body);
        // Overlapping resolutions can record the same conflict twice.
        if !self.conflicts.contains(&conflict) {
            self.conflicts.push(conflict);
        }
    }
}
