use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use crate::models::evaluation::FileToken;

/// Media collaborator: fetches submitted recordings and archives them for
/// reviewers.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Download the recording at `url` into `local_path`.
    async fn download(&self, url: &str, local_path: &Path) -> Result<(), StorageError>;

    /// Archive a local file, returning the token that references it.
    async fn upload(&self, local_path: &Path) -> Result<FileToken, StorageError>;
}

/// Cloudflare R2 (S3-compatible) media store. Remote recordings are fetched
/// over plain HTTP.
pub struct R2Client {
    bucket: Box<Bucket>,
    http: Client,
}

impl R2Client {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            bucket,
            http: Client::new(),
        })
    }
}

/// Object key for an archived recording.
pub fn object_key(local_path: &Path) -> Result<String, StorageError> {
    let file_name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidPath(local_path.display().to_string()))?;
    Ok(format!("recordings/{}", file_name))
}

fn content_type_for(local_path: &Path) -> &'static str {
    match local_path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "audio/mpeg",
    }
}

#[async_trait]
impl MediaStore for R2Client {
    async fn download(&self, url: &str, local_path: &Path) -> Result<(), StorageError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| StorageError::InvalidUrl(format!("{}: {}", url, e)))?;

        let response = self.http.get(parsed).send().await.map_err(StorageError::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(StorageError::Http)?;
        tokio::fs::write(local_path, &bytes).await?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path) -> Result<FileToken, StorageError> {
        let key = object_key(local_path)?;
        let data = tokio::fs::read(local_path).await?;

        self.bucket
            .put_object_with_content_type(&key, &data, content_type_for(local_path))
            .await
            .map_err(StorageError::S3)?;
        Ok(FileToken(key))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned status {0}")]
    Status(u16),

    #[error("Invalid recording URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid local path: {0}")]
    InvalidPath(String),

    #[error("File I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
