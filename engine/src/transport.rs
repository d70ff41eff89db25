//! Talking to the marker server.
//!
//! The sync loop is generic over [`Transport`] so tests can script server
//! behaviour without a network.

use crate::{error::Result, wire::SnapshotDoc, Error, SyncVersion};
use std::future::Future;

/// The three operations the server offers.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Fetch the current document immediately.
    fn fetch(&self) -> impl Future<Output = Result<SnapshotDoc>> + Send;

    /// Wait for a document whose version differs from `version`.
    ///
    /// May block for a long time; the caller applies its own timeout.
    fn poll(&self, version: &SyncVersion) -> impl Future<Output = Result<SnapshotDoc>> + Send;

    /// Upload the full local state.
    fn push(&self, doc: &SnapshotDoc) -> impl Future<Output = Result<()>> + Send;
}

/// [`Transport`] over HTTP, against `{base}/api/markers/...`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/markers/{path}", self.base_url)
    }

    async fn get_document(&self, url: String) -> Result<SnapshotDoc> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(network)?;

        let body = response.text().await.map_err(network)?;
        SnapshotDoc::from_json(&body)
    }
}

fn network(e: reqwest::Error) -> Error {
    Error::Network(e.to_string())
}

impl Transport for HttpTransport {
    async fn fetch(&self) -> Result<SnapshotDoc> {
        self.get_document(self.url("get")).await
    }

    async fn poll(&self, version: &SyncVersion) -> Result<SnapshotDoc> {
        self.get_document(self.url(&format!("poll/{version}"))).await
    }

    async fn push(&self, doc: &SnapshotDoc) -> Result<()> {
        self.client
            .post(self.url("post"))
            .json(doc)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(network)?;
        Ok(())
    }
}
