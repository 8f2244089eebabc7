//! Node paths
//!
//! Paths address nodes in the tree store. Segments carry a 1-based
//! same-name-sibling index (`sameNameSibling[2]`); index 1 is implied when
//! omitted. Relative paths use `.` and `..` segments so that a link between
//! two nodes keeps resolving wherever the containing subtree is stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error raised for syntactically invalid paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("Invalid path '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// `.`
    Current,
    /// `..`
    Parent,
    /// A child name with its same-name-sibling index
    Child { name: String, index: usize },
}

impl Segment {
    pub fn child(name: impl Into<String>, index: usize) -> Self {
        Segment::Child {
            name: name.into(),
            index: index.max(1),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Current => f.write_str("."),
            Segment::Parent => f.write_str(".."),
            Segment::Child { name, index } if *index > 1 => write!(f, "{}[{}]", name, index),
            Segment::Child { name, .. } => f.write_str(name),
        }
    }
}

/// An absolute or relative node path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath {
    absolute: bool,
    segments: Vec<Segment>,
}

/// Characters that cannot appear in a node name
const RESERVED: [char; 3] = ['/', '[', ']'];

/// Replace characters that would break path syntax
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" => "_".to_string(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

impl NodePath {
    /// The root path `/`
    pub fn root() -> Self {
        Self {
            absolute: true,
            segments: Vec::new(),
        }
    }

    /// The empty relative path `.`
    pub fn current() -> Self {
        Self {
            absolute: false,
            segments: Vec::new(),
        }
    }

    pub fn parse(path: &str) -> Result<Self, PathError> {
        let invalid = |reason: &str| PathError::Invalid {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Err(invalid("empty path"));
        }

        let absolute = path.starts_with('/');
        let mut segments = Vec::new();
        for raw in path.split('/').filter(|s| !s.is_empty()) {
            let segment = match raw {
                "." => Segment::Current,
                ".." => Segment::Parent,
                _ => match raw.find('[') {
                    Some(open) => {
                        if !raw.ends_with(']') {
                            return Err(invalid("unterminated index"));
                        }
                        let name = &raw[..open];
                        let index: usize = raw[open + 1..raw.len() - 1]
                            .parse()
                            .map_err(|_| invalid("index is not a number"))?;
                        if name.is_empty() || index == 0 {
                            return Err(invalid("empty name or zero index"));
                        }
                        Segment::child(name, index)
                    }
                    None => {
                        if raw.contains(']') {
                            return Err(invalid("unexpected ']'"));
                        }
                        Segment::child(raw, 1)
                    }
                },
            };
            segments.push(segment);
        }

        Ok(Self { absolute, segments })
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_root(&self) -> bool {
        self.absolute && self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Name of the last segment, if it is a child segment
    pub fn name(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Child { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Append a child segment
    pub fn child(&self, name: impl Into<String>, index: usize) -> Self {
        let mut path = self.clone();
        path.segments.push(Segment::child(name, index));
        path
    }

    /// Parent of an absolute path; `None` for the root
    pub fn parent(&self) -> Option<Self> {
        let normalized = self.normalize();
        if normalized.segments.is_empty() {
            return None;
        }
        let mut parent = normalized;
        parent.segments.pop();
        Some(parent)
    }

    /// Collapse `.` segments and fold `..` into the preceding child segment.
    ///
    /// Leading `..` segments of relative paths are kept; on absolute paths they
    /// stop at the root.
    pub fn normalize(&self) -> Self {
        let mut out: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Current => {}
                Segment::Parent => match out.last() {
                    Some(Segment::Child { .. }) => {
                        out.pop();
                    }
                    _ if self.absolute => {}
                    _ => out.push(Segment::Parent),
                },
                child => out.push(child.clone()),
            }
        }
        Self {
            absolute: self.absolute,
            segments: out,
        }
    }

    /// Resolve `other` against this path. Absolute `other` paths are returned as-is.
    pub fn resolve(&self, other: &NodePath) -> NodePath {
        if other.absolute {
            return other.normalize();
        }
        let mut joined = self.clone();
        joined.segments.extend(other.segments.iter().cloned());
        joined.normalize()
    }

    /// Relative path leading from `self` to `target`; both must be absolute.
    pub fn relativize(&self, target: &NodePath) -> Option<NodePath> {
        if !self.absolute || !target.absolute {
            return None;
        }
        let from = self.normalize();
        let to = target.normalize();
        let common = from
            .segments
            .iter()
            .zip(to.segments.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments = Vec::new();
        for _ in common..from.segments.len() {
            segments.push(Segment::Parent);
        }
        segments.extend(to.segments[common..].iter().cloned());
        if segments.is_empty() {
            segments.push(Segment::Current);
        }
        Some(NodePath {
            absolute: false,
            segments,
        })
    }

    /// Whether `self` lies at or below `ancestor`
    pub fn starts_with(&self, ancestor: &NodePath) -> bool {
        let me = self.normalize();
        let other = ancestor.normalize();
        me.absolute == other.absolute
            && me.segments.len() >= other.segments.len()
            && me.segments[..other.segments.len()] == other.segments[..]
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        } else if self.segments.is_empty() {
            return f.write_str(".");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodePath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = NodePath::parse("/models/doc.xml/root/sameNameSibling[2]").unwrap();
        assert!(path.is_absolute());
        assert_eq!(path.segments().len(), 4);
        assert_eq!(path.to_string(), "/models/doc.xml/root/sameNameSibling[2]");

        // index 1 is implied
        let path = NodePath::parse("/a/b[1]").unwrap();
        assert_eq!(path.to_string(), "/a/b");
        assert_eq!(NodePath::root().to_string(), "/");
    }

    #[test]
    fn test_parse_rejects_bad_indexes() {
        assert!(NodePath::parse("/a/b[0]").is_err());
        assert!(NodePath::parse("/a/b[x]").is_err());
        assert!(NodePath::parse("/a/b[2").is_err());
        assert!(NodePath::parse("").is_err());
    }

    #[test]
    fn test_relativize_and_resolve() {
        let from = NodePath::parse("/models/a.xsd/mm:dependencies/mm:dependency[2]").unwrap();
        let to = NodePath::parse("/dependencies/types/b.xsd").unwrap();

        let relative = from.relativize(&to).unwrap();
        assert_eq!(relative.to_string(), "../../../../dependencies/types/b.xsd");
        assert_eq!(from.resolve(&relative), to);
    }

    #[test]
    fn test_normalize_keeps_leading_parents_on_relative_paths() {
        let path = NodePath::parse("../a/./b/../c").unwrap();
        assert_eq!(path.normalize().to_string(), "../a/c");

        let absolute = NodePath::parse("/../a").unwrap();
        assert_eq!(absolute.normalize().to_string(), "/a");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("a/b[1]"), "a_b_1_");
        assert_eq!(sanitize_name(".."), "__");
        assert_eq!(sanitize_name(""), "_");
    }
}
