use crate::location::{GroupRef, Location};
use modvfs_catalog::{Bucket, Group, Grouping, Track};
use url::Url;

/// A resolved node. Nodes are plain values: they hold no reference to their
/// parent or to the catalog, and are rebuilt from their identifier on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Root,
    Category(Grouping),
    Bucket(Grouping, Bucket),
    Group(Grouping, Bucket, Group),
    Track(Grouping, Bucket, GroupRef, Track),
    /// A file addressed by its storage URL. It has no parent.
    Detached(Url, Track),
}

impl Node {
    /// The location this node was resolved from; `None` for detached files.
    pub fn location(&self) -> Option<Location> {
        Some(match self {
            Self::Root => Location::Root,
            Self::Category(grouping) => Location::Category(*grouping),
            Self::Bucket(grouping, bucket) => Location::Bucket(*grouping, *bucket),
            Self::Group(grouping, bucket, group) => {
                Location::Group(*grouping, *bucket, GroupRef::new(group.id, group.name.clone()))
            },
            Self::Track(grouping, bucket, group, track) => {
                Location::Track(*grouping, *bucket, group.clone(), track.filename.clone())
            },
            Self::Detached(..) => return None,
        })
    }

    pub fn name(&self) -> String {
        match self {
            Self::Root => String::new(),
            Self::Category(grouping) => grouping.path().to_string(),
            Self::Bucket(_, bucket) => bucket.to_string(),
            Self::Group(_, _, group) => group.name.clone(),
            Self::Track(.., track) | Self::Detached(_, track) => track.filename.clone(),
        }
    }

    pub fn description(&self) -> Option<String> {
        match self {
            Self::Category(grouping) => Some(grouping.description().to_string()),
            Self::Group(_, _, group) => Some(group.description()),
            _ => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        !self.is_file()
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::Track(..) | Self::Detached(..))
    }

    /// Byte size from catalog metadata, for files. Detached files report 0.
    pub fn size(&self) -> Option<u64> {
        self.track().map(|track| track.size)
    }

    pub fn track(&self) -> Option<&Track> {
        match self {
            Self::Track(.., track) | Self::Detached(_, track) => Some(track),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_node_exposes_catalog_metadata() {
        let node = Node::Group(Grouping::Authors, Bucket::of("Beispiel"), Group::new(42, "Beispiel", 12));
        assert_eq!(node.name(), "Beispiel");
        assert_eq!(node.description().as_deref(), Some("12 tracks"));
        assert!(node.is_dir());
        assert_eq!(node.size(), None);
        assert_eq!(node.location().unwrap().depth(), 3);
    }

    #[test]
    fn test_detached_file_has_no_location() {
        let url = Url::parse("https://ftp.modland.com/pub/modules/Protracker/Beispiel/track1.mod").unwrap();
        let node = Node::Detached(url, Track::new("/pub/modules/Protracker/Beispiel/track1.mod", 0));
        assert!(node.is_file());
        assert_eq!(node.name(), "track1.mod");
        assert_eq!(node.size(), Some(0));
        assert_eq!(node.location(), None);
    }
}
