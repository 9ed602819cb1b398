//! GitHub repository backend: blobs are committed under `media/` through the
//! contents API.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{check_response, transport_error, BlobRef, BlobStore, StorageError};
use crate::config::GitHubConfig;

const MEDIA_DIR: &str = "media";
const USER_AGENT: &str = concat!("driveseal/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct PutContentRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
}

#[derive(Deserialize)]
struct PutContentResponse {
    content: ContentEntry,
}

#[derive(Deserialize)]
struct ContentEntry {
    path: String,
}

pub struct GitHubBlobStore {
    config: GitHubConfig,
    api_base: String,
    http: reqwest::Client,
}

impl GitHubBlobStore {
    pub fn new(config: GitHubConfig, http: reqwest::Client) -> Self {
        Self::with_api_base(config, http, "https://api.github.com")
    }

    pub fn with_api_base(config: GitHubConfig, http: reqwest::Client, api_base: &str) -> Self {
        Self {
            config,
            api_base: api_base.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{path}",
            self.api_base, self.config.owner, self.config.repo
        )
    }
}

#[async_trait]
impl BlobStore for GitHubBlobStore {
    fn kind(&self) -> &'static str {
        "github"
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<BlobRef, StorageError> {
        let path = format!("{MEDIA_DIR}/{name}");
        let body = PutContentRequest {
            message: format!("Add {name}"),
            content: STANDARD.encode(&data),
            branch: &self.config.branch,
        };

        let resp = self
            .http
            .put(self.contents_url(&path))
            .bearer_auth(&self.config.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("github upload", e))?;
        let resp = check_response("github upload", resp).await?;
        let created: PutContentResponse = resp
            .json()
            .await
            .map_err(|e| transport_error("github upload response", e))?;

        tracing::debug!(path = %created.content.path, size = data.len(), "committed blob to github");
        Ok(BlobRef(created.content.path))
    }

    async fn get(&self, blob: &BlobRef) -> Result<Bytes, StorageError> {
        let resp = self
            .http
            .get(self.contents_url(blob.as_str()))
            .query(&[("ref", self.config.branch.as_str())])
            .bearer_auth(&self.config.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github.raw")
            .send()
            .await
            .map_err(|e| transport_error("github download", e))?;
        let resp = check_response("github download", resp).await?;
        resp.bytes()
            .await
            .map_err(|e| transport_error("github download body", e))
    }
}
