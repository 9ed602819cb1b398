use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use driveseal_crypto::EnvelopeFormat;

/// 50 MB, the larger of the ceilings the relay has shipped with.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Envelope used for new uploads. Existing files keep the one they were sealed with.
    pub envelope: EnvelopeFormat,
    pub upstream_timeout: Duration,
    pub public_dir: Option<PathBuf>,
    /// When set, retrieval URLs handed back after an upload are absolute on this host.
    pub custom_domain: Option<String>,
    pub blob: BlobConfig,
    pub metadata: MetadataConfig,
    pub cdn: Option<CdnConfig>,
}

#[derive(Debug, Clone)]
pub enum BlobConfig {
    Drive(DriveConfig),
    GitHub(GitHubConfig),
    S3(S3Config),
    Memory,
}

impl BlobConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BlobConfig::Drive(_) => "drive",
            BlobConfig::GitHub(_) => "github",
            BlobConfig::S3(_) => "s3",
            BlobConfig::Memory => "memory",
        }
    }
}

#[derive(Clone)]
pub struct DriveConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub folder_id: String,
}

impl std::fmt::Debug for DriveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveConfig")
            .field("client_id", &self.client_id)
            .field("folder_id", &self.folder_id)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

#[derive(Clone)]
pub enum MetadataConfig {
    Mongo { uri: String, database: String },
    Memory,
}

impl MetadataConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataConfig::Mongo { .. } => "mongo",
            MetadataConfig::Memory => "memory",
        }
    }
}

impl std::fmt::Debug for MetadataConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataConfig::Mongo { database, .. } => f
                .debug_struct("Mongo")
                .field("database", database)
                .finish_non_exhaustive(),
            MetadataConfig::Memory => f.write_str("Memory"),
        }
    }
}

pub const JSDELIVR_GH_BASE: &str = "https://cdn.jsdelivr.net/gh";

/// Repository coordinates for the jsDelivr pass-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// `https://cdn.jsdelivr.net/gh` outside of tests.
    pub base_url: String,
}

impl CdnConfig {
    pub fn new(owner: String, repo: String, branch: String) -> Self {
        Self::with_base_url(owner, repo, branch, JSDELIVR_GH_BASE)
    }

    pub fn with_base_url(owner: String, repo: String, branch: String, base_url: &str) -> Self {
        Self {
            owner,
            repo,
            branch,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn target_url(&self, path_and_query: &str) -> String {
        let path = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{path_and_query}")
        };
        format!(
            "{}/{}/{}@{}{path}",
            self.base_url, self.owner, self.repo, self.branch
        )
    }
}

impl Default for AppConfig {
    /// Self-contained configuration backed by in-memory stores.
    fn default() -> Self {
        Self {
            port: 3000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            envelope: EnvelopeFormat::Plain,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            public_dir: None,
            custom_domain: None,
            blob: BlobConfig::Memory,
            metadata: MetadataConfig::Memory,
            cdn: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_map(vars: &HashMap<&str, &str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let port = parse_or(var("PORT"), "PORT", 3000u16)?;
        let max_upload_bytes =
            parse_or(var("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let envelope = parse_or(var("ENVELOPE"), "ENVELOPE", EnvelopeFormat::Plain)?;
        let timeout_secs = parse_or(
            var("UPSTREAM_TIMEOUT_SECS"),
            "UPSTREAM_TIMEOUT_SECS",
            DEFAULT_UPSTREAM_TIMEOUT.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "UPSTREAM_TIMEOUT_SECS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let github_owner = var("GITHUB_USERNAME");
        let github_repo = var("GITHUB_REPO");
        let github_branch = var("GITHUB_BRANCH").unwrap_or_else(|| "main".into());

        let blob_backend = var("BLOB_BACKEND").unwrap_or_else(|| "drive".into());
        let blob = match blob_backend.to_ascii_lowercase().as_str() {
            "drive" => BlobConfig::Drive(DriveConfig {
                client_id: required("GOOGLE_CLIENT_ID")?,
                client_secret: required("GOOGLE_CLIENT_SECRET")?,
                refresh_token: required("GOOGLE_REFRESH_TOKEN")?,
                folder_id: required("GOOGLE_FOLDER_ID")?,
            }),
            "github" => BlobConfig::GitHub(GitHubConfig {
                token: required("GITHUB_TOKEN")?,
                owner: github_owner.clone().ok_or(ConfigError::Missing("GITHUB_USERNAME"))?,
                repo: github_repo.clone().ok_or(ConfigError::Missing("GITHUB_REPO"))?,
                branch: github_branch.clone(),
            }),
            "s3" => BlobConfig::S3(S3Config {
                bucket: required("S3_BUCKET")?,
                region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".into()),
                endpoint_url: var("S3_ENDPOINT_URL"),
                force_path_style: parse_or(
                    var("S3_FORCE_PATH_STYLE"),
                    "S3_FORCE_PATH_STYLE",
                    false,
                )?,
            }),
            "memory" => BlobConfig::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "BLOB_BACKEND",
                    value: other.to_string(),
                    reason: "expected drive, github, s3 or memory".into(),
                })
            }
        };

        let metadata_backend = var("METADATA_BACKEND").unwrap_or_else(|| "mongo".into());
        let metadata = match metadata_backend.to_ascii_lowercase().as_str() {
            "mongo" => MetadataConfig::Mongo {
                uri: required("MONGO_URI")?,
                database: var("MONGO_DATABASE").unwrap_or_else(|| "Uploader".into()),
            },
            "memory" => MetadataConfig::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "METADATA_BACKEND",
                    value: other.to_string(),
                    reason: "expected mongo or memory".into(),
                })
            }
        };

        let cdn = match (github_owner, github_repo) {
            (Some(owner), Some(repo)) => Some(CdnConfig::new(owner, repo, github_branch)),
            _ => None,
        };

        Ok(Self {
            port,
            max_upload_bytes,
            envelope,
            upstream_timeout: Duration::from_secs(timeout_secs),
            public_dir: var("PUBLIC_DIR").map(PathBuf::from),
            custom_domain: var("CUSTOM_DOMAIN")
                .map(|d| d.trim_end_matches('/').to_string()),
            blob,
            metadata,
            cdn,
        })
    }

    /// Retrieval path for a stored file, relative to this server.
    pub fn file_url(&self, id: &str) -> String {
        format!("/file/{id}")
    }

    /// Absolute link on the custom domain, when one is configured.
    pub fn custom_domain_url(&self, id: &str) -> Option<String> {
        self.custom_domain.as_ref().map(|domain| {
            if domain.starts_with("http://") || domain.starts_with("https://") {
                format!("{domain}/file/{id}")
            } else {
                format!("https://{domain}/file/{id}")
            }
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([("BLOB_BACKEND", "memory"), ("METADATA_BACKEND", "memory")])
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_map(&memory_vars()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.envelope, EnvelopeFormat::Plain);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert!(config.cdn.is_none());
        assert_eq!(config.file_url("abc"), "/file/abc");
        assert_eq!(config.custom_domain_url("abc"), None);
    }

    #[test]
    fn test_drive_requires_credentials() {
        let vars = HashMap::from([
            ("METADATA_BACKEND", "memory"),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
        ]);
        let err = AppConfig::from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GOOGLE_REFRESH_TOKEN")));
    }

    #[test]
    fn test_drive_and_mongo() {
        let vars = HashMap::from([
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_REFRESH_TOKEN", "refresh"),
            ("GOOGLE_FOLDER_ID", "folder"),
            ("MONGO_URI", "mongodb://localhost:27017"),
            ("ENVELOPE", "obfuscated"),
            ("MAX_UPLOAD_BYTES", "20971520"),
        ]);
        let config = AppConfig::from_map(&vars).unwrap();
        assert_eq!(config.blob.kind(), "drive");
        assert_eq!(config.envelope, EnvelopeFormat::Obfuscated);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        match config.metadata {
            MetadataConfig::Mongo { database, .. } => assert_eq!(database, "Uploader"),
            MetadataConfig::Memory => panic!("expected mongo"),
        }
    }

    #[test]
    fn test_debug_hides_secrets() {
        let vars = HashMap::from([
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "very-secret"),
            ("GOOGLE_REFRESH_TOKEN", "refresh-secret"),
            ("GOOGLE_FOLDER_ID", "folder"),
            ("MONGO_URI", "mongodb://user:hunter2@db"),
        ]);
        let rendered = format!("{:?}", AppConfig::from_map(&vars).unwrap());
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("refresh-secret"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_github_backend_enables_cdn() {
        let mut vars = memory_vars();
        vars.insert("BLOB_BACKEND", "github");
        vars.insert("GITHUB_TOKEN", "ghp_x");
        vars.insert("GITHUB_USERNAME", "octo");
        vars.insert("GITHUB_REPO", "media");
        vars.insert("CUSTOM_DOMAIN", "files.example.com/");
        let config = AppConfig::from_map(&vars).unwrap();
        assert_eq!(config.blob.kind(), "github");
        let cdn = config.cdn.clone().unwrap();
        assert_eq!(
            cdn.target_url("/media/a.dat"),
            "https://cdn.jsdelivr.net/gh/octo/media@main/media/a.dat"
        );
        assert_eq!(config.file_url("abc"), "/file/abc");
        assert_eq!(
            config.custom_domain_url("abc").as_deref(),
            Some("https://files.example.com/file/abc")
        );
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = memory_vars();
        vars.insert("PORT", "not-a-port");
        assert!(matches!(
            AppConfig::from_map(&vars),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));

        let mut vars = memory_vars();
        vars.insert("ENVELOPE", "rot13");
        assert!(matches!(
            AppConfig::from_map(&vars),
            Err(ConfigError::Invalid { name: "ENVELOPE", .. })
        ));

        let mut vars = memory_vars();
        vars.insert("BLOB_BACKEND", "ftp");
        assert!(matches!(
            AppConfig::from_map(&vars),
            Err(ConfigError::Invalid { name: "BLOB_BACKEND", .. })
        ));

        let mut vars = memory_vars();
        vars.insert("UPSTREAM_TIMEOUT_SECS", "0");
        assert!(AppConfig::from_map(&vars).is_err());
    }
}
