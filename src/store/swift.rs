use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use reqwest::{Body, Client, Method, RequestBuilder, Response, Url};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{ObjectStore, TransferError};
use crate::auth::{AUTH_TOKEN_HEADER, Session};
use crate::core::ObjectKey;

/// Swift / Cloud Files REST backend.
///
/// Every call builds its own request from the shared, read-only session and
/// client; nothing is mutated between calls.
pub struct SwiftStore {
    client: Client,
    session: Arc<Session>,
}

impl SwiftStore {
    pub fn new(client: Client, session: Arc<Session>) -> Self {
        Self { client, session }
    }

    fn base_url(&self) -> Result<Url, TransferError> {
        Url::parse(&self.session.endpoint)
            .map_err(|e| TransferError::Url(format!("{}: {}", self.session.endpoint, e)))
    }

    /// `{endpoint}/{container}/{segments...}` with each segment percent-encoded.
    fn url_for<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, TransferError> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| TransferError::Url(format!("{} cannot be a base", self.session.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn container_url(&self) -> Result<Url, TransferError> {
        match self.session.container.as_deref() {
            Some(container) => self.url_for([container]),
            None => self.base_url(),
        }
    }

    /// `{endpoint}/{container}/{key}`, keeping empty segments of the key.
    ///
    /// URL parsing folds `.` and `..` segments (also when written as `%2E`),
    /// so such keys cannot be addressed and are refused.
    fn object_url(&self, key: &ObjectKey) -> Result<Url, TransferError> {
        let container = self
            .session
            .container
            .as_deref()
            .ok_or_else(|| TransferError::Url("no container in session".to_string()))?;
        if key.segments().any(|segment| segment == "." || segment == "..") {
            return Err(TransferError::UnaddressableKey(key.to_string()));
        }
        self.url_for(std::iter::once(container).chain(key.segments()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, &self.session.token)
    }
}

/// Turn a non-success status into a [`TransferError::Status`].
fn check_status(method: &'static str, res: Response) -> Result<Response, TransferError> {
    let status = res.status();
    if status.is_success() {
        Ok(res)
    } else {
        Err(TransferError::Status {
            method,
            url: res.url().to_string(),
            status: status.as_u16(),
        })
    }
}

/// Split a text/plain listing body into names, dropping blank lines.
pub(crate) fn parse_listing(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ObjectStore for SwiftStore {
    async fn list(&self, marker: Option<&str>) -> Result<Vec<String>, TransferError> {
        let url = self.container_url()?;
        let mut req = self.request(Method::GET, url).header(ACCEPT, "text/plain");
        if let Some(marker) = marker {
            req = req.query(&[("marker", marker)]);
        }

        let res = check_status("GET", req.send().await?)?;
        let body = res.text().await?;
        let names = parse_listing(&body);

        debug!(marker = ?marker, count = names.len(), "Listing page received");
        Ok(names)
    }

    async fn create_container(&self) -> Result<u16, TransferError> {
        let url = self.container_url()?;
        let res = self
            .request(Method::PUT, url)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        Ok(res.status().as_u16())
    }

    async fn upload(&self, key: &ObjectKey, source: &Path) -> Result<u64, TransferError> {
        let url = self.object_url(key)?;

        let file = File::open(source)
            .await
            .map_err(|e| TransferError::io(source, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| TransferError::io(source, e))?
            .len();

        let res = self
            .request(Method::PUT, url)
            .header(CONTENT_LENGTH, len)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        check_status("PUT", res)?;

        Ok(len)
    }

    async fn download(&self, key: &ObjectKey, destination: &Path) -> Result<u64, TransferError> {
        let url = self.object_url(key)?;
        let mut res = check_status("GET", self.request(Method::GET, url).send().await?)?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::io(parent, e))?;
        }
        let mut file = File::create(destination)
            .await
            .map_err(|e| TransferError::io(destination, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = res.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(destination, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| TransferError::io(destination, e))?;

        Ok(written)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), TransferError> {
        let url = self.object_url(key)?;
        check_status("DELETE", self.request(Method::DELETE, url).send().await?)?;
        Ok(())
    }
}
