use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use modvfs_catalog::Group;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GroupRow {
    pub id: i64,
    pub name: String,
    pub tracks: i64,
}
impl From<&Group> for GroupRow {
    fn from(group: &Group) -> Self {
        Self { id: i64::from(group.id), name: group.name.clone(), tracks: i64::from(group.tracks) }
    }
}
impl TryFrom<GroupRow> for Group {
    type Error = Error;
    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        Ok(Group::new(
            u32::try_from(row.id).or_raise(|| ErrorKind::InvalidData("group id"))?,
            row.name,
            u32::try_from(row.tracks).or_raise(|| ErrorKind::InvalidData("track count"))?,
        ))
    }
}
