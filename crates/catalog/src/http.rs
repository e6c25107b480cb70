//! HTTP transport contract.
//!
//! The catalog only needs `fetch(url) -> (optional size, byte stream)`.
//! Providers never retry; a failure is reported once and propagated.

use crate::error::Result;
use async_trait::async_trait;
use std::io::{Cursor, Read};
use std::sync::Arc;
use url::Url;

/// A successful response.
///
/// The body is a blocking reader and must be consumed off the async runtime
/// (e.g. inside [`spawn_blocking`](tokio::task::spawn_blocking)).
pub struct HttpResponse {
    /// Declared length, if the server sent one.
    pub size: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self { size: Some(data.len() as u64), body: Box::new(Cursor::new(data)) }
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse").field("size", &self.size).finish_non_exhaustive()
    }
}

#[async_trait]
pub trait HttpProvider: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<HttpResponse>;
}

pub type HttpHandle = Arc<dyn HttpProvider>;

#[cfg(feature = "http")]
pub use self::reqwest_provider::ReqwestProvider;

#[cfg(feature = "http")]
mod reqwest_provider {
    use super::{HttpProvider, HttpResponse};
    use crate::error::{ErrorKind, Result};
    use async_trait::async_trait;
    use exn::ResultExt;
    use futures::TryStreamExt;
    use tokio_util::io::{StreamReader, SyncIoBridge};
    use url::Url;

    /// [`HttpProvider`] backed by a shared [`reqwest::Client`].
    ///
    /// Bodies are streamed: the returned reader pulls chunks from the
    /// connection as it is read, which must happen on a blocking thread of the
    /// runtime that issued the request.
    #[derive(Clone)]
    pub struct ReqwestProvider {
        client: reqwest::Client,
    }

    impl ReqwestProvider {
        pub fn new() -> Result<Self> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("modvfs/", env!("CARGO_PKG_VERSION")))
                .build()
                .or_raise(|| ErrorKind::Transport("failed to build HTTP client".to_string()))?;
            Ok(Self { client })
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl HttpProvider for ReqwestProvider {
        #[tracing::instrument(level = "debug", skip(self), fields(url = %url))]
        async fn fetch(&self, url: &Url) -> Result<HttpResponse> {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .or_raise(|| ErrorKind::Transport(url.to_string()))?;
            let size = response.content_length();
            let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
            let body = SyncIoBridge::new(StreamReader::new(stream));
            tracing::debug!(bytes = ?size, "Response received");
            Ok(HttpResponse { size, body: Box::new(body) })
        }
    }
}
