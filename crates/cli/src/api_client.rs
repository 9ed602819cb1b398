use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::config::CliConfig;

pub struct ApiClient {
    client: Client,
    base_url: String,
}

// --- Response types matching the relay ---

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub custom_domain_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuotaResponse {
    pub used: u64,
    pub total: Option<u64>,
    pub free: Option<u64>,
}

#[derive(Debug)]
pub struct DownloadedFile {
    /// Name from `Content-Disposition`, reduced to a bare file name.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    code: String,
    message: String,
}

impl ApiClient {
    pub fn from_config(config: &CliConfig) -> Result<Self> {
        Self::new(&config.server.endpoint)
    }

    pub fn new(endpoint: &str) -> Result<Self> {
        let base_url = endpoint.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("endpoint must be an http(s) URL, got '{endpoint}'");
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    /// Resolve a URL returned by the relay, which may be path-only.
    pub fn absolute_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            url.to_string()
        }
    }

    /// POST /upload: send a file as the `file` part of a multipart form.
    pub async fn upload(&self, path: &Path, mime: Option<&str>) -> Result<UploadResponse> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("file path has no UTF-8 file name")?
            .to_string();

        let mut part = Part::bytes(data).file_name(file_name);
        if let Some(mime) = mime {
            part = part
                .mime_str(mime)
                .with_context(|| format!("invalid content type '{mime}'"))?;
        }
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("failed to send upload")?;

        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .context("failed to parse upload response")
    }

    /// GET /file/{id}: the decrypted file and its stored name.
    pub async fn download(&self, id: &str) -> Result<DownloadedFile> {
        let resp = self
            .client
            .get(format!("{}/file/{id}", self.base_url))
            .send()
            .await
            .context("failed to request file")?;

        let resp = Self::check_response(resp).await?;
        let header = |name: HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let filename = header(CONTENT_DISPOSITION).and_then(|v| filename_from_disposition(&v));
        let content_type = header(CONTENT_TYPE);

        let data = resp
            .bytes()
            .await
            .context("failed to read file body")?
            .to_vec();
        Ok(DownloadedFile {
            filename,
            content_type,
            data,
        })
    }

    /// GET /quota: storage figures of the relay's blob store.
    pub async fn quota(&self) -> Result<QuotaResponse> {
        let resp = self
            .client
            .get(format!("{}/quota", self.base_url))
            .send()
            .await
            .context("failed to request quota")?;

        let resp = Self::check_response(resp).await?;
        resp.json().await.context("failed to parse quota response")
    }

    /// Check HTTP response status; extract API error body if present.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();

        // JSON routes answer with the structured shape, file routes with plain text
        if let Ok(api_err) = serde_json::from_str::<ApiErrorBody>(&body_text) {
            bail!(
                "API error (HTTP {}): [{}] {}",
                status,
                api_err.error.code,
                api_err.error.message
            );
        }

        bail!("API error (HTTP {}): {}", status, body_text);
    }
}

/// Pull a safe file name out of a `Content-Disposition` value.
///
/// `filename*` (RFC 5987, UTF-8) wins over the quoted `filename`. Directory
/// components are dropped so a hostile server cannot steer the write path.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(value).into_iter().skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let raw = raw.trim();
                if let Some(encoded) = raw
                    .get(..7)
                    .filter(|prefix| prefix.eq_ignore_ascii_case("utf-8''"))
                    .map(|_| &raw[7..])
                {
                    extended = percent_decode(encoded);
                }
            }
            "filename" => plain = Some(unquote(raw.trim())),
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

/// Split on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn percent_decode(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
