//! CLI Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("could not open the catalog index")]
    Index,
    #[display("could not open the content cache")]
    Storage,
    #[display("could not set up the remote catalog")]
    Remote,
    #[display("virtual filesystem error")]
    Vfs,
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("not a directory: {_0}")]
    NotADirectory(#[error(not(source))] String),
    #[display("could not write output")]
    Output,
}
