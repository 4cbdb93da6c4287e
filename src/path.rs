//! Dotted path addressing shared by trees, sources and layers.
//!
//! `"database.pool.size"` parses to the segments `["database", "pool", "size"]`.
//! The empty string is the empty path, which addresses the node itself.

use std::fmt;

use crate::error::StratumError;

/// A parsed dotted path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<String>);

impl Path {
    /// The empty path ("self").
    pub fn empty() -> Self {
        Path(Vec::new())
    }

    /// Parse a dotted path. Empty segments (`"a..b"`, `".a"`) are rejected.
    pub fn parse(s: &str) -> Result<Self, StratumError> {
        if s.is_empty() {
            return Ok(Path::empty());
        }
        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(StratumError::InvalidPath(s.to_string()));
        }
        Ok(Path(segments))
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Concatenate two paths.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Path(segments)
    }

    /// Append one segment.
    pub fn child(&self, segment: &str) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Path(segments)
    }

    pub fn lowercased(&self) -> Path {
        Path(self.0.iter().map(|s| s.to_lowercase()).collect())
    }

    /// Whether `self` is a (non-strict) prefix of `other`.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.0.len() <= other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// `self` without the leading `prefix`, if it starts with it.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        prefix
            .is_prefix_of(self)
            .then(|| Path(self.0[prefix.0.len()..].to_vec()))
    }

    /// The dotted form, e.g. `"database.url"`.
    pub fn name(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Join a prefix and a key with a dot, skipping the dot for an empty prefix.
pub fn dotted(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else if key.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested() {
        let path = Path::parse("database.pool.size").unwrap();
        assert_eq!(path.segments(), ["database", "pool", "size"]);
        assert_eq!(path.name(), "database.pool.size");
    }

    #[test]
    fn empty_string_is_empty_path() {
        assert!(Path::parse("").unwrap().is_empty());
    }

    #[test]
    fn empty_segment_rejected() {
        assert!(matches!(
            Path::parse("a..b"),
            Err(StratumError::InvalidPath(_))
        ));
        assert!(Path::parse(".a").is_err());
        assert!(Path::parse("a.").is_err());
    }

    #[test]
    fn prefix_relation() {
        let a = Path::parse("a").unwrap();
        let ab = Path::parse("a.b").unwrap();
        assert!(a.is_prefix_of(&ab));
        assert!(ab.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(Path::empty().is_prefix_of(&a));
    }

    #[test]
    fn strip_leading_segments() {
        let ab = Path::parse("a.b").unwrap();
        assert_eq!(ab.strip_prefix(&Path::parse("a").unwrap()).unwrap().name(), "b");
        assert!(ab.strip_prefix(&ab).unwrap().is_empty());
        assert_eq!(ab.strip_prefix(&Path::parse("b").unwrap()), None);
    }

    #[test]
    fn join_and_child() {
        let a = Path::parse("a").unwrap();
        let bc = Path::parse("b.c").unwrap();
        assert_eq!(a.join(&bc).name(), "a.b.c");
        assert_eq!(a.child("x").name(), "a.x");
    }

    #[test]
    fn dotted_skips_empty_prefix() {
        assert_eq!(dotted("", "host"), "host");
        assert_eq!(dotted("database", "url"), "database.url");
    }
}
