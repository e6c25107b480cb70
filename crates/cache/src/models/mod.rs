mod group;
mod scope;
mod track;

pub(crate) use self::group::GroupRow;
pub use self::scope::Scope;
pub(crate) use self::track::TrackRow;
