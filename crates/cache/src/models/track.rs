use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use modvfs_catalog::Track;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TrackRow {
    pub path: String,
    pub filename: String,
    pub size: i64,
}
impl TryFrom<&Track> for TrackRow {
    type Error = Error;
    fn try_from(track: &Track) -> Result<Self, Self::Error> {
        Ok(Self {
            path: track.path.clone(),
            filename: track.filename.clone(),
            size: i64::try_from(track.size).or_raise(|| ErrorKind::InvalidData("track size"))?,
        })
    }
}
impl TryFrom<TrackRow> for Track {
    type Error = Error;
    fn try_from(row: TrackRow) -> Result<Self, Self::Error> {
        Ok(Track {
            path: row.path,
            filename: row.filename,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("track size"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_to_row() {
        let track = Track::new("/pub/modules/Protracker/Beispiel/track1.mod", 2048);
        let row = TrackRow::try_from(&track).unwrap();
        assert_eq!(row.filename, "track1.mod");
        assert_eq!(row.size, 2048);
        assert_eq!(Track::try_from(row).unwrap(), track);
    }

    #[test]
    fn test_oversized_track_is_invalid() {
        let mut track = Track::new("/pub/modules/x.mod", 0);
        track.size = u64::MAX;
        assert!(TrackRow::try_from(&track).is_err());
    }
}
