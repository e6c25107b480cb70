//! Catalog models.
//!
//! Values here are built fresh from every query; nothing holds on to them.

use crate::error::{Error, ErrorKind};
use derive_more::Display;
use std::str::FromStr;

/// A browsing facet of the archive.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grouping {
    #[display("Authors")]
    Authors,
    #[display("Collections")]
    Collections,
    #[display("Formats")]
    Formats,
}

impl Grouping {
    /// Every grouping, in directory listing order.
    pub const ALL: [Grouping; 3] = [Self::Authors, Self::Collections, Self::Formats];

    /// Identifier path segment.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Authors => "Authors",
            Self::Collections => "Collections",
            Self::Formats => "Formats",
        }
    }

    pub fn from_path(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|grouping| grouping.path() == segment)
    }

    /// Stable lowercase key, used by the persistent index.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Authors => "authors",
            Self::Collections => "collections",
            Self::Formats => "formats",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|grouping| grouping.key() == key)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Authors => "Modules by author",
            Self::Collections => "Modules by collection",
            Self::Formats => "Modules by format",
        }
    }
}

/// Letter bucket: a single uppercase ASCII letter, or `#` for everything else.
///
/// Ordering puts `#` first, then `A`..`Z`.
///
/// ```
/// use modvfs_catalog::Bucket;
///
/// assert_eq!("B".parse::<Bucket>().unwrap(), Bucket::of("Beispiel"));
/// assert_eq!(Bucket::of("4-Mat"), Bucket::NON_LETTER);
/// assert!("b".parse::<Bucket>().is_err());
/// assert!("AB".parse::<Bucket>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket(u8);

impl Bucket {
    pub const NON_LETTER: Bucket = Bucket(b'#');

    /// Bucket for an uppercase ASCII letter.
    pub fn letter(c: char) -> Option<Self> {
        c.is_ascii_uppercase().then_some(Self(c as u8))
    }

    /// The bucket a name is listed under.
    pub fn of(name: &str) -> Self {
        match name.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => Self(c.to_ascii_uppercase() as u8),
            _ => Self::NON_LETTER,
        }
    }

    /// `#`, then `A`..`Z`.
    pub fn all() -> impl Iterator<Item = Bucket> {
        std::iter::once(Self::NON_LETTER).chain((b'A'..=b'Z').map(Self))
    }

    pub fn is_letter(&self) -> bool {
        self.0 != b'#'
    }

    pub fn as_char(&self) -> char {
        self.0 as char
    }

    pub fn contains(&self, name: &str) -> bool {
        Self::of(name) == *self
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Bucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some('#'), None) => Ok(Self::NON_LETTER),
            (Some(c), None) => Self::letter(c).ok_or_else(|| Error::from(ErrorKind::InvalidBucket(s.to_string()))),
            _ => exn::bail!(ErrorKind::InvalidBucket(s.to_string())),
        }
    }
}

/// A named set of tracks within one grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Catalog-assigned; only meaningful within one grouping.
    pub id: u32,
    pub name: String,
    /// Hint only, may be stale.
    pub tracks: u32,
}

impl Group {
    pub fn new(id: u32, name: impl Into<String>, tracks: u32) -> Self {
        Self { id, name: name.into(), tracks }
    }

    /// Pluralized track count, e.g. "1 track" or "12 tracks".
    pub fn description(&self) -> String {
        match self.tracks {
            1 => "1 track".to_string(),
            n => format!("{n} tracks"),
        }
    }
}

/// A downloadable module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Decoded remote path, starting from `/pub/`.
    pub path: String,
    pub filename: String,
    pub size: u64,
}

impl Track {
    /// The filename is the last path segment.
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let filename = path.rsplit('/').next().unwrap_or_default().to_string();
        Self { path, filename, size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("#", '#')]
    #[case("A", 'A')]
    #[case("Z", 'Z')]
    fn bucket_parses(#[case] input: &str, #[case] expected: char) {
        assert_eq!(input.parse::<Bucket>().unwrap().as_char(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("a")]
    #[case("AB")]
    #[case("##")]
    #[case("Ä")]
    #[case("%")]
    fn bucket_rejects(#[case] input: &str) {
        let err = input.parse::<Bucket>().unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidBucket(input.to_string()));
    }

    #[test]
    fn bucket_order_starts_with_sentinel() {
        let all: Vec<String> = Bucket::all().map(|b| b.to_string()).collect();
        assert_eq!(all.len(), 27);
        assert_eq!(all[0], "#");
        assert_eq!(all[1], "A");
        assert_eq!(all[26], "Z");
        let mut sorted: Vec<Bucket> = Bucket::all().collect();
        sorted.reverse();
        sorted.sort();
        assert_eq!(sorted, Bucket::all().collect::<Vec<_>>());
    }

    #[rstest]
    #[case("Beispiel", "B")]
    #[case("beispiel", "B")]
    #[case("4-Mat", "#")]
    #[case("Ørjan", "#")]
    #[case("", "#")]
    fn bucket_of_name(#[case] name: &str, #[case] bucket: &str) {
        assert_eq!(Bucket::of(name).to_string(), bucket);
        assert!(bucket.parse::<Bucket>().unwrap().contains(name));
    }

    #[test]
    fn grouping_paths_round_trip() {
        for grouping in Grouping::ALL {
            assert_eq!(Grouping::from_path(grouping.path()), Some(grouping));
            assert_eq!(Grouping::from_key(grouping.key()), Some(grouping));
        }
        assert_eq!(Grouping::from_path("authors"), None);
        assert_eq!(Grouping::from_path("Countries"), None);
    }

    #[rstest]
    #[case(0, "0 tracks")]
    #[case(1, "1 track")]
    #[case(12, "12 tracks")]
    fn group_description(#[case] tracks: u32, #[case] expected: &str) {
        assert_eq!(Group::new(1, "x", tracks).description(), expected);
    }

    #[test]
    fn track_filename_is_last_segment() {
        let track = Track::new("/pub/modules/Protracker/Beispiel/track1.mod", 1234);
        assert_eq!(track.filename, "track1.mod");
        assert_eq!(track.size, 1234);
    }
}
