//! Paths into nested values.
//!
//! A [`Path`] is an ordered sequence of segments, each an object key or an
//! array index, identifying a location inside a [`Value`](super::Value)
//! tree. Paths parse from the usual dot/bracket notation
//! (`"user.address[0].city"`) and display back in canonical form.
//!
//! The matching rule used by path-scoped listeners lives here too:
//! [`Path::intersects`] is true when one path is a (possibly equal) prefix
//! of the other. Ancestor, descendant, and exact matches all count;
//! siblings never do.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One step of a [`Path`]: an object key or an array index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// A location inside a nested value.
///
/// Paths are small (segments are stored inline up to a typical depth) and
/// cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Path {
    segments: SmallVec<[Segment; 4]>,
}

impl Path {
    /// The empty path, addressing the root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse dot/bracket notation.
    ///
    /// Dotted segments become keys; bracketed segments become indices when
    /// they are all digits and keys otherwise. The parser is lenient:
    /// there is no failure case, and the empty string parses to the empty
    /// path.
    pub fn parse(text: &str) -> Self {
        let mut segments = SmallVec::new();
        let mut rest = text;

        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']').unwrap_or(stripped.len());
                let inside = &stripped[..end];
                if !inside.is_empty() {
                    match inside.parse::<usize>() {
                        Ok(index) => segments.push(Segment::Index(index)),
                        Err(_) => segments.push(Segment::Key(inside.to_string())),
                    }
                }
                rest = stripped[end..].strip_prefix(']').unwrap_or("");
                rest = rest.strip_prefix('.').unwrap_or(rest);
            } else {
                let end = rest
                    .find(|c| c == '.' || c == '[')
                    .unwrap_or(rest.len());
                let head = &rest[..end];
                if !head.is_empty() {
                    segments.push(Segment::Key(head.to_string()));
                }
                rest = &rest[end..];
                rest = rest.strip_prefix('.').unwrap_or(rest);
            }
        }

        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// A copy of this path with one more segment appended.
    pub fn join(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Whether `prefix` is a (possibly equal) leading run of this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        prefix.segments.len() <= self.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// The path-listener matching rule: true when either path is a prefix
    /// of the other (ancestor, descendant, or equal); false for siblings
    /// and unrelated paths.
    pub fn intersects(&self, other: &Path) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{key}")?;
                }
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        Path::parse(text)
    }
}

impl From<String> for Path {
    fn from(text: String) -> Self {
        Path::parse(&text)
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }
}

impl FromIterator<Segment> for Path {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> Segment {
        Segment::Key(k.to_string())
    }

    #[test]
    fn parse_dotted_keys() {
        let path = Path::parse("user.address.city");
        assert_eq!(
            path.segments(),
            &[key("user"), key("address"), key("city")]
        );
    }

    #[test]
    fn parse_bracket_indices() {
        let path = Path::parse("items[0].name");
        assert_eq!(
            path.segments(),
            &[key("items"), Segment::Index(0), key("name")]
        );
    }

    #[test]
    fn parse_bracket_key_and_chained_indices() {
        let path = Path::parse("grid[1][2]");
        assert_eq!(
            path.segments(),
            &[key("grid"), Segment::Index(1), Segment::Index(2)]
        );

        let path = Path::parse("map[not-a-number]");
        assert_eq!(path.segments(), &[key("map"), key("not-a-number")]);
    }

    #[test]
    fn parse_empty_is_root() {
        assert!(Path::parse("").is_empty());
        assert_eq!(Path::parse(""), Path::root());
    }

    #[test]
    fn display_round_trips() {
        for text in ["user.address.city", "items[0].name", "grid[1][2]"] {
            assert_eq!(Path::parse(text).to_string(), text);
        }
    }

    #[test]
    fn intersects_ancestor_descendant_equal() {
        let listened = Path::parse("user.address");

        assert!(Path::parse("user.address").intersects(&listened));
        assert!(Path::parse("user.address.zip").intersects(&listened));
        assert!(Path::parse("user").intersects(&listened));
        assert!(!Path::parse("user.name").intersects(&listened));
        assert!(!Path::parse("settings.theme").intersects(&listened));
    }

    #[test]
    fn root_intersects_everything() {
        assert!(Path::root().intersects(&Path::parse("a.b.c")));
        assert!(Path::parse("a.b.c").intersects(&Path::root()));
    }

    #[test]
    fn index_and_key_segments_are_distinct() {
        assert_ne!(Path::parse("a[0]"), Path::parse("a.0"));
    }
}
