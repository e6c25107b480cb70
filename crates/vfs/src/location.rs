//! Identifier codec.
//!
//! Identifiers look like `scheme:/Category/Letter/GroupName/filename?id=<n>`.
//! Path segments are percent-encoded; the group id is always a query
//! parameter, never a path segment. The decoder also accepts the id attached
//! to the group segment, as in `scheme:/Authors/B/Beispiel?id=42/track1.mod`.

use crate::error::{ErrorKind, Result};
use modvfs_catalog::{Bucket, Grouping};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::fmt::Write;

/// Characters escaped in path segments.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const MAX_DEPTH: usize = 4;

/// A group as addressed by an identifier: its id, plus the name shown in
/// the path. Only the id is used for lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupRef {
    pub id: u32,
    pub name: String,
}

impl GroupRef {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// A decoded identifier. The variant is the resolution depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Root,
    Category(Grouping),
    Bucket(Grouping, Bucket),
    Group(Grouping, Bucket, GroupRef),
    Track(Grouping, Bucket, GroupRef, String),
}

impl Location {
    pub fn depth(&self) -> usize {
        match self {
            Self::Root => 0,
            Self::Category(..) => 1,
            Self::Bucket(..) => 2,
            Self::Group(..) => 3,
            Self::Track(..) => 4,
        }
    }

    pub fn grouping(&self) -> Option<Grouping> {
        match self {
            Self::Root => None,
            Self::Category(grouping)
            | Self::Bucket(grouping, ..)
            | Self::Group(grouping, ..)
            | Self::Track(grouping, ..) => Some(*grouping),
        }
    }

    /// The location one level up, or `None` for the root.
    pub fn parent(&self) -> Option<Location> {
        match self {
            Self::Root => None,
            Self::Category(_) => Some(Self::Root),
            Self::Bucket(grouping, _) => Some(Self::Category(*grouping)),
            Self::Group(grouping, bucket, _) => Some(Self::Bucket(*grouping, *bucket)),
            Self::Track(grouping, bucket, group, _) => Some(Self::Group(*grouping, *bucket, group.clone())),
        }
    }

    fn segments(&self) -> Vec<String> {
        match self {
            Self::Root => vec![],
            Self::Category(grouping) => vec![grouping.path().to_string()],
            Self::Bucket(grouping, bucket) => vec![grouping.path().to_string(), bucket.to_string()],
            Self::Group(grouping, bucket, group) => {
                vec![grouping.path().to_string(), bucket.to_string(), group.name.clone()]
            },
            Self::Track(grouping, bucket, group, filename) => {
                vec![grouping.path().to_string(), bucket.to_string(), group.name.clone(), filename.clone()]
            },
        }
    }

    fn group(&self) -> Option<&GroupRef> {
        match self {
            Self::Group(_, _, group) | Self::Track(_, _, group, _) => Some(group),
            _ => None,
        }
    }

    /// Canonical identifier under `scheme`.
    ///
    /// Empty group names and filenames have no path form and are
    /// [`ErrorKind::Malformed`].
    pub fn encode(&self, scheme: &str) -> Result<String> {
        let segments = self.segments();
        if segments.iter().any(String::is_empty) {
            exn::bail!(ErrorKind::Malformed(format!("empty path segment under {scheme}:")));
        }
        let mut encoded = format!("{scheme}:");
        if segments.is_empty() {
            encoded.push('/');
        }
        for segment in segments {
            encoded.push('/');
            encoded.extend(utf8_percent_encode(&segment, SEGMENT));
        }
        if let Some(group) = self.group() {
            // Writing into a String cannot fail.
            let _ = write!(encoded, "?id={}", group.id);
        }
        Ok(encoded)
    }

    /// Decode an identifier under `scheme`.
    ///
    /// Anything that does not follow the grammar, including a bucket that is
    /// neither an uppercase letter nor `#`, is [`ErrorKind::Malformed`].
    pub fn decode(scheme: &str, identifier: &str) -> Result<Location> {
        let malformed = |reason: &str| ErrorKind::Malformed(format!("{reason}: {identifier}"));
        let Some(rest) = strip_scheme(identifier, scheme) else {
            exn::bail!(malformed("unexpected scheme"));
        };
        if !rest.starts_with('/') {
            exn::bail!(malformed("expected an absolute path"));
        }
        let (path, query) = split_query(rest);

        let mut segments = Vec::new();
        for raw in path.split('/').filter(|s| !s.is_empty()) {
            let Ok(segment) = percent_decode_str(raw).decode_utf8() else {
                exn::bail!(malformed("segment is not UTF-8"));
            };
            segments.push(segment.into_owned());
        }
        if segments.len() > MAX_DEPTH {
            exn::bail!(malformed("too many segments"));
        }
        let mut segments = segments.into_iter();

        let Some(category) = segments.next() else {
            return Ok(Location::Root);
        };
        let Some(grouping) = Grouping::from_path(&category) else {
            exn::bail!(malformed("unknown category"));
        };
        let Some(letter) = segments.next() else {
            return Ok(Location::Category(grouping));
        };
        let Ok(bucket) = letter.parse::<Bucket>() else {
            exn::bail!(malformed("invalid bucket"));
        };
        let Some(name) = segments.next() else {
            return Ok(Location::Bucket(grouping, bucket));
        };
        let Some(id) = query_id(query) else {
            exn::bail!(malformed("missing or invalid group id"));
        };
        let group = GroupRef { id, name };
        match segments.next() {
            None => Ok(Location::Group(grouping, bucket, group)),
            Some(filename) => Ok(Location::Track(grouping, bucket, group, filename)),
        }
    }
}

fn strip_scheme<'a>(identifier: &'a str, scheme: &str) -> Option<&'a str> {
    let (prefix, rest) = identifier.split_once(':')?;
    prefix.eq_ignore_ascii_case(scheme).then_some(rest)
}

/// Split off the query. In the inline form the query sits between the group
/// segment and the filename, so anything after its next `/` is path again.
fn split_query(rest: &str) -> (String, Option<&str>) {
    let Some((path, after)) = rest.split_once('?') else {
        return (rest.to_string(), None);
    };
    match after.split_once('/') {
        Some((query, tail)) => (format!("{path}/{tail}"), Some(query)),
        None => (path.to_string(), Some(after)),
    }
}

/// The `id` query parameter, in canonical decimal form (ASCII digits, no
/// sign, no leading zero). `None` if absent or not canonical.
fn query_id(query: Option<&str>) -> Option<u32> {
    let (_, value) = query?.split('&').filter_map(|pair| pair.split_once('=')).find(|(key, _)| *key == "id")?;
    let canonical = !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit())
        && (value == "0" || !value.starts_with('0'));
    canonical.then(|| value.parse().ok()).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn b() -> Bucket {
        Bucket::letter('B').unwrap()
    }

    fn beispiel() -> GroupRef {
        GroupRef::new(42, "Beispiel")
    }

    #[rstest]
    #[case(Location::Root, "catalog:/")]
    #[case(Location::Category(Grouping::Authors), "catalog:/Authors")]
    #[case(Location::Bucket(Grouping::Formats, Bucket::NON_LETTER), "catalog:/Formats/%23")]
    #[case(Location::Group(Grouping::Authors, b(), beispiel()), "catalog:/Authors/B/Beispiel?id=42")]
    #[case(
        Location::Track(Grouping::Authors, b(), beispiel(), "track1.mod".to_string()),
        "catalog:/Authors/B/Beispiel/track1.mod?id=42"
    )]
    #[case(
        Location::Track(Grouping::Collections, b(), GroupRef::new(7, "Best of 100%"), "a?b #1.xm".to_string()),
        "catalog:/Collections/B/Best%20of%20100%25/a%3Fb%20%231.xm?id=7"
    )]
    fn test_encode_and_decode(#[case] location: Location, #[case] identifier: &str) {
        assert_eq!(location.encode("catalog").unwrap(), identifier);
        assert_eq!(Location::decode("catalog", identifier).unwrap(), location);
    }

    #[test]
    fn test_round_trip_every_bucket() {
        for bucket in Bucket::all() {
            let location = Location::Group(Grouping::Formats, bucket, GroupRef::new(3, "Name/with/slashes"));
            assert_eq!(Location::decode("modland", &location.encode("modland").unwrap()).unwrap(), location);
        }
    }

    #[rstest]
    #[case::group_name(Location::Group(Grouping::Authors, b(), GroupRef::new(1, "")))]
    #[case::filename(Location::Track(Grouping::Authors, b(), beispiel(), String::new()))]
    #[case::both(Location::Track(Grouping::Formats, b(), GroupRef::new(1, ""), String::new()))]
    fn test_empty_names_are_not_encodable(#[case] location: Location) {
        let err = location.encode("catalog").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed(_)));
    }

    #[rstest]
    #[case("catalog:/Authors/B/Beispiel?id=42/track1.mod")]
    #[case("catalog:/Authors/B/Beispiel/track1.mod?id=42")]
    #[case("catalog:/Authors/B/Beispiel/track1.mod?foo=bar&id=42")]
    #[case("CATALOG:/Authors//B/Beispiel/track1.mod?id=42")]
    fn test_accepted_forms(#[case] identifier: &str) {
        let expected = Location::Track(Grouping::Authors, b(), beispiel(), "track1.mod".to_string());
        assert_eq!(Location::decode("catalog", identifier).unwrap(), expected);
    }

    #[rstest]
    #[case("modland:/Authors")]
    #[case("catalog:Authors")]
    #[case("catalog:/Artists")]
    #[case("catalog:/Authors/1/x")]
    #[case("catalog:/Authors/b")]
    #[case("catalog:/Authors/BB")]
    #[case("catalog:/Authors/B/Beispiel")]
    #[case("catalog:/Authors/B/Beispiel?id=x")]
    #[case("catalog:/Authors/B/Beispiel?id=-1")]
    #[case("catalog:/Authors/B/Beispiel?id=+42")]
    #[case("catalog:/Authors/B/Beispiel?id=042")]
    #[case("catalog:/Authors/B/Beispiel?id=")]
    #[case("catalog:/Authors/B/Beispiel?id=4294967296")]
    #[case("catalog:/Authors/B/Beispiel/track1.mod/extra?id=42")]
    #[case("catalog:/Authors/B/%FF?id=42")]
    fn test_rejected_forms(#[case] identifier: &str) {
        let err = Location::decode("catalog", identifier).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed(_)), "{identifier}");
    }

    #[test]
    fn test_parent_chain() {
        let track = Location::Track(Grouping::Authors, b(), beispiel(), "track1.mod".to_string());
        let mut chain = vec![track.depth()];
        let mut current = track;
        while let Some(parent) = current.parent() {
            chain.push(parent.depth());
            current = parent;
        }
        assert_eq!(chain, vec![4, 3, 2, 1, 0]);
        assert_eq!(current, Location::Root);
    }
}
