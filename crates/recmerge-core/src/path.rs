//! Paths into a JSON value tree.
//!
//! A [`Path`] is an ordered sequence of map keys and sequence indices. It
//! renders to two distinct string forms:
//!
//! - [`Path::pointer`] -- the RFC 6901 style `/a/0/b` wire form,
//! - [`Path::config_key`] -- the dotted `a.b` form used to look up
//!   per-field configuration, with index segments dropped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step into a value tree: a map key or a sequence index.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// An index into a sequence.
    Index(usize),
    /// A key into a map.
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{i}"),
            PathSegment::Key(k) => write!(f, "{k}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// An ordered sequence of segments identifying a location in a value tree.
///
/// The empty path identifies the tree root.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(pub Vec<PathSegment>);

impl Path {
    /// The empty path (tree root).
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns `true` for the empty path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments as a slice.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Returns a new path with all of `suffix` appended.
    pub fn join(&self, suffix: &Path) -> Self {
        let mut segments = self.0.clone();
        segments.extend(suffix.0.iter().cloned());
        Self(segments)
    }

    /// Returns a new path with `prefix` prepended, used when conflicts
    /// discovered in a subtree are lifted to absolute coordinates.
    pub fn with_prefix(&self, prefix: &Path) -> Self {
        prefix.join(self)
    }

    /// Render as an RFC 6901 style JSON pointer: `/` plus the segments
    /// joined by `/`. The root path renders as `/`.
    pub fn pointer(&self) -> String {
        let mut out = String::from("/");
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(&seg.to_string());
        }
        out
    }

    /// Project to a dotted configuration key, dropping index segments.
    ///
    /// `a.0.b` becomes `"a.b"`; the root path becomes `""`. This is the
    /// form under which per-field policies, comparators and data-list
    /// markers are registered.
    pub fn config_key(&self) -> String {
        let keys: Vec<&str> = self
            .0
            .iter()
            .filter_map(|seg| match seg {
                PathSegment::Key(k) => Some(k.as_str()),
                PathSegment::Index(_) => None,
            })
            .collect();
        keys.join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pointer())
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for Path {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

/// Build a [`Path`] from a `/`-free dotted key string, every segment a key.
pub fn path_from_dotted(dotted: &str) -> Path {
    if dotted.is_empty() {
        return Path::root();
    }
    dotted.split('.').collect()
}
