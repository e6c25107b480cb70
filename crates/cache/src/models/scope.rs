use modvfs_catalog::{Bucket, Grouping};
use std::fmt::{self, Display};

/// A record set that is refreshed from the remote as a unit.
///
/// Its [`Display`] form is the key under which the refresh time is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Groups listed under one letter bucket.
    Bucket(Grouping, Bucket),
    /// Tracks of one group.
    Tracks(Grouping, u32),
}

impl Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucket(grouping, bucket) => write!(f, "{}/bucket/{bucket}", grouping.key()),
            Self::Tracks(grouping, id) => write!(f, "{}/tracks/{id}", grouping.key()),
        }
    }
}
