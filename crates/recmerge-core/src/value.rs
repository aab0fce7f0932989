//! Navigation helpers over [`serde_json::Value`] trees.
//!
//! The engine addresses tree locations with [`Path`] values mixing map
//! keys and list indices. These helpers get, set and remove values at
//! such locations without panicking on missing intermediate nodes.

use serde_json::Value;

use crate::path::{Path, PathSegment};

/// Marker written into aligned list views where a version has no
/// counterpart for a matched entity.
pub const ALIGNMENT_PLACEHOLDER: &str = "#$PLACEHOLDER$#";

/// Resolve `path` inside `value`, if every segment exists.
pub fn get_at_path<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(key) => current.as_object()?.get(key)?,
            PathSegment::Index(idx) => current.as_array()?.get(*idx)?,
        };
    }
    Some(current)
}

/// Mutable variant of [`get_at_path`].
pub fn get_at_path_mut<'a>(value: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(key) => current.as_object_mut()?.get_mut(key)?,
            PathSegment::Index(idx) => current.as_array_mut()?.get_mut(*idx)?,
        };
    }
    Some(current)
}

/// Write `new` at `path` inside `value`.
///
/// The root path replaces the whole tree. A key on an object inserts or
/// overwrites; an index must already be in bounds. Returns `false`
/// without mutating anything when the location cannot be reached.
pub fn set_at_path(value: &mut Value, path: &Path, new: Value) -> bool {
    let Some((last, parent_segments)) = path.segments().split_last() else {
        *value = new;
        return true;
    };
    let parent_path: Path = parent_segments.iter().cloned().collect();
    let Some(parent) = get_at_path_mut(value, &parent_path) else {
        return false;
    };
    match (last, parent) {
        (PathSegment::Key(key), Value::Object(map)) => {
            map.insert(key.clone(), new);
            true
        }
        (PathSegment::Index(idx), Value::Array(items)) if *idx < items.len() => {
            items[*idx] = new;
            true
        }
        _ => false,
    }
}

/// Remove and return the value at `path`, if present.
pub fn remove_at_path(value: &mut Value, path: &Path) -> Option<Value> {
    let (last, parent_segments) = path.segments().split_last()?;
    let parent_path: Path = parent_segments.iter().cloned().collect();
    let parent = get_at_path_mut(value, &parent_path)?;
    match (last, parent) {
        (PathSegment::Key(key), Value::Object(map)) => map.remove(key),
        (PathSegment::Index(idx), Value::Array(items)) if *idx < items.len() => {
            Some(items.remove(*idx))
        }
        _ => None,
    }
}

/// Resolve a dotted key path of object keys, as used by comparator and
/// policy configuration.
pub fn get_dotted<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in dotted.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

/// Size used to pick the "longer" of two values: character count for
/// strings, element count for arrays, entry count for objects, zero for
/// everything else.
pub fn value_weight(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_navigates_keys_and_indices() {
        let value = json!({"a": [{"b": 1}, {"b": 2}]});
        let path = Path::root().child("a").child(1usize).child("b");
        assert_eq!(get_at_path(&value, &path), Some(&json!(2)));
        let missing = Path::root().child("a").child(5usize);
        assert_eq!(get_at_path(&value, &missing), None);
    }

    #[test]
    fn set_inserts_object_keys_but_not_new_indices() {
        let mut value = json!({"a": {"b": 1}, "l": [1, 2]});
        assert!(set_at_path(
            &mut value,
            &Path::root().child("a").child("c"),
            json!(3)
        ));
        assert!(set_at_path(
            &mut value,
            &Path::root().child("l").child(0usize),
            json!(9)
        ));
        assert!(!set_at_path(
            &mut value,
            &Path::root().child("l").child(7usize),
            json!(9)
        ));
        assert_eq!(value, json!({"a": {"b": 1, "c": 3}, "l": [9, 2]}));
    }

    #[test]
    fn set_at_root_replaces_tree() {
        let mut value = json!({"a": 1});
        assert!(set_at_path(&mut value, &Path::root(), json!([1, 2])));
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn remove_returns_old_value() {
        let mut value = json!({"a": [1, 2, 3]});
        let removed = remove_at_path(&mut value, &Path::root().child("a").child(1usize));
        assert_eq!(removed, Some(json!(2)));
        assert_eq!(value, json!({"a": [1, 3]}));
    }

    #[test]
    fn dotted_lookup_only_follows_object_keys() {
        let value = json!({"group": {"id": "Grp"}, "list": [1]});
        assert_eq!(get_dotted(&value, "group.id"), Some(&json!("Grp")));
        assert_eq!(get_dotted(&value, "list.0"), None);
    }

    #[test]
    fn weight_counts_chars_and_elements() {
        assert_eq!(value_weight(&json!("héllo")), 5);
        assert_eq!(value_weight(&json!([1, 2, 3])), 3);
        assert_eq!(value_weight(&json!({"a": 1})), 1);
        assert_eq!(value_weight(&json!(42)), 0);
        assert_eq!(value_weight(&Value::Null), 0);
    }
}
