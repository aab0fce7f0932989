//! Per-field conflict resolution rules.
//!
//! When a field cannot be merged by three-way comparison, a
//! [`FieldResolver`] decides which side wins. Resolvers are registered
//! under dotted field paths; lookup climbs from the most specific path
//! upward, so a rule at `a.b` covers `a.b.c` unless `a.b.c` has its own.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use recmerge_core::{value_weight, ObjectPolicy};

/// Custom resolution callback.
///
/// Receives the head and update values of the conflicting field and the
/// path segments between the rule's registration point and the field.
/// Returning `None` defers to the next rule up the path.
pub type ResolverFn =
    Arc<dyn Fn(Option<&Value>, Option<&Value>, &[String]) -> Option<ObjectPolicy> + Send + Sync>;

/// Decides the winning side for one conflicting field.
#[derive(Clone)]
pub enum FieldResolver {
    /// Always pick the same side.
    Fixed(ObjectPolicy),
    /// Delegate to a callback.
    Custom(ResolverFn),
}

impl FieldResolver {
    /// Resolver from a callback.
    pub fn custom(
        resolve: impl Fn(Option<&Value>, Option<&Value>, &[String]) -> Option<ObjectPolicy>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        FieldResolver::Custom(Arc::new(resolve))
    }

    /// Resolver keeping whichever value is longer.
    ///
    /// Length is character count for strings and element count for
    /// arrays and objects; ties keep head.
    pub fn keep_longest() -> Self {
        Self::custom(|head, update, _down_path| {
            let head_len = head.map_or(0, value_weight);
            let update_len = update.map_or(0, value_weight);
            if head_len >= update_len {
                Some(ObjectPolicy::KeepHead)
            } else {
                Some(ObjectPolicy::KeepUpdate)
            }
        })
    }

    /// Apply this resolver to a conflicting field.
    pub fn resolve(
        &self,
        head: Option<&Value>,
        update: Option<&Value>,
        down_path: &[String],
    ) -> Option<ObjectPolicy> {
        match self {
            FieldResolver::Fixed(policy) => Some(*policy),
            FieldResolver::Custom(resolve) => resolve(head, update, down_path),
        }
    }
}

impl From<ObjectPolicy> for FieldResolver {
    fn from(policy: ObjectPolicy) -> Self {
        FieldResolver::Fixed(policy)
    }
}

impl fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldResolver::Fixed(policy) => f.debug_tuple("Fixed").field(policy).finish(),
            FieldResolver::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
