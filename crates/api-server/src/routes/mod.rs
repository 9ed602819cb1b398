use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::services::ServeDir;

use crate::config::AppConfig;
use crate::metadata::{self, MetadataStore};
use crate::storage::{self, BlobStore};

pub mod file;
mod health;
pub mod proxy;
pub mod quota;
pub mod upload;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    /// Client for pass-through requests (CDN proxy).
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            blobs,
            metadata,
            http: reqwest::Client::new(),
        }
    }

    /// Build the backends named in `config`. Nothing is contacted yet; the
    /// metadata store connects on first use.
    pub async fn connect(config: AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let blobs = storage::connect(&config.blob, http.clone()).await;
        let metadata = metadata::connect(&config.metadata);
        Ok(Self {
            config: Arc::new(config),
            blobs,
            metadata,
            http,
        })
    }
}

/// All routes. Unmatched paths go to the CDN proxy when repository
/// coordinates are configured, otherwise to the public directory if any.
pub fn router(config: &AppConfig) -> Router<AppState> {
    let routes = Router::new()
        .merge(health::router())
        .merge(upload::router(config.max_upload_bytes))
        .merge(file::router())
        .merge(quota::router());

    if config.cdn.is_some() {
        routes.fallback(proxy::cdn_proxy)
    } else if let Some(dir) = &config.public_dir {
        routes.fallback_service(ServeDir::new(dir))
    } else {
        routes
    }
}
