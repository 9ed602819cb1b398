//! Google Drive v3 backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::{check_response, transport_error, BlobRef, BlobStore, Quota, StorageError};
use crate::config::DriveConfig;

/// Refresh the access token this long before Google says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    pub token_url: String,
    pub api_base: String,
    pub upload_base: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            token_url: "https://oauth2.googleapis.com/token".into(),
            api_base: "https://www.googleapis.com/drive/v3".into(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".into(),
        }
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct About {
    storage_quota: StorageQuota,
}

/// Drive reports byte counts as decimal strings; `limit` is absent for
/// unlimited accounts.
#[derive(Deserialize)]
struct StorageQuota {
    limit: Option<String>,
    usage: Option<String>,
}

pub struct DriveBlobStore {
    config: DriveConfig,
    endpoints: DriveEndpoints,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

impl DriveBlobStore {
    pub fn new(config: DriveConfig, http: reqwest::Client) -> Self {
        Self::with_endpoints(config, http, DriveEndpoints::default())
    }

    pub fn with_endpoints(
        config: DriveConfig,
        http: reqwest::Client,
        endpoints: DriveEndpoints,
    ) -> Self {
        Self {
            config,
            endpoints,
            http,
            token: Mutex::new(None),
        }
    }

    /// Return a valid access token, exchanging the refresh token when the
    /// cached one is missing or about to expire.
    ///
    /// The lock is held across the exchange so concurrent callers share a
    /// single refresh.
    async fn access_token(&self) -> Result<String, StorageError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("refreshing drive access token");
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| transport_error("drive token refresh", e))?;
        let resp = check_response("drive token refresh", resp).await?;
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| transport_error("drive token response", e))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

/// Build a `multipart/related` body: JSON metadata part, then the media part.
fn related_body(boundary: &str, metadata: &serde_json::Value, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn parse_count(field: &str, value: Option<String>) -> Result<Option<u64>, StorageError> {
    value
        .map(|v| {
            v.parse::<u64>()
                .map_err(|e| StorageError::Upstream(format!("drive quota {field} {v:?}: {e}")))
        })
        .transpose()
}

#[async_trait]
impl BlobStore for DriveBlobStore {
    fn kind(&self) -> &'static str {
        "drive"
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<BlobRef, StorageError> {
        let token = self.access_token().await?;
        let boundary = format!("driveseal-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({
            "name": name,
            "parents": [self.config.folder_id],
        });

        let resp = self
            .http
            .post(format!("{}/files", self.endpoints.upload_base))
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(related_body(&boundary, &metadata, &data))
            .send()
            .await
            .map_err(|e| transport_error("drive upload", e))?;
        let resp = check_response("drive upload", resp).await?;
        let created: CreatedFile = resp
            .json()
            .await
            .map_err(|e| transport_error("drive upload response", e))?;

        tracing::debug!(drive_id = %created.id, size = data.len(), "stored blob in drive");
        Ok(BlobRef(created.id))
    }

    async fn get(&self, blob: &BlobRef) -> Result<Bytes, StorageError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/files/{}", self.endpoints.api_base, blob.as_str()))
            .query(&[("alt", "media")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error("drive download", e))?;
        let resp = check_response("drive download", resp).await?;
        resp.bytes()
            .await
            .map_err(|e| transport_error("drive download body", e))
    }

    async fn quota(&self) -> Result<Quota, StorageError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/about", self.endpoints.api_base))
            .query(&[("fields", "storageQuota")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error("drive quota", e))?;
        let resp = check_response("drive quota", resp).await?;
        let about: About = resp
            .json()
            .await
            .map_err(|e| transport_error("drive quota response", e))?;

        let used = parse_count("usage", about.storage_quota.usage)?.unwrap_or(0);
        let total = parse_count("limit", about.storage_quota.limit)?;
        Ok(Quota::new(used, total))
    }
}
