use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;

/// Path prefix under which stored objects are served.
pub const PUBLIC_PREFIX: &str = "/api/files/";

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];
const VIDEO_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/mov",
    "video/quicktime",
    "video/avi",
];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid media key: {0}")]
    InvalidKey(String),
    #[error("invalid {kind} format: {content_type}")]
    UnsupportedType {
        kind: MediaKind,
        content_type: String,
    },
    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },
    #[error("unknown media type: {0}")]
    UnknownKind(String),
    #[error("media storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_TYPES,
            MediaKind::Video => VIDEO_TYPES,
        }
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_types().contains(&essence.as_str())
    }

    pub fn max_bytes(&self, limits: &StorageConfig) -> u64 {
        match self {
            MediaKind::Image => limits.max_image_bytes,
            MediaKind::Video => limits.max_video_bytes,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = MediaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(MediaError::UnknownKind(other.to_string())),
        }
    }
}

fn extension_for_type(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/mov" | "video/quicktime" => "mov",
        "video/avi" => "avi",
        _ => "bin",
    }
}

pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

fn file_extension(original_name: Option<&str>, content_type: &str) -> String {
    original_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| extension_for_type(content_type).to_string())
}

/// Builds `tours/<kind>s/<unix millis>_<random>.<ext>`.
pub fn generate_key(kind: MediaKind, original_name: Option<&str>, content_type: &str) -> String {
    format!(
        "tours/{}s/{}_{}.{}",
        kind.as_str(),
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        file_extension(original_name, content_type)
    )
}

pub fn validate_key(key: &str) -> Result<(), MediaError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(MediaError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub fn public_url(key: &str) -> String {
    format!("{PUBLIC_PREFIX}{key}")
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub etag: String,
}

impl StoredObject {
    pub fn new(key: &str, data: Vec<u8>) -> Self {
        let etag = format!(
            "\"{}\"",
            BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(&data))
        );
        Self {
            content_type: content_type_for_key(key),
            data,
            etag,
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), MediaError>;
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, MediaError>;
    /// Returns whether an object was removed.
    async fn delete(&self, key: &str) -> Result<bool, MediaError>;
}

pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, MediaError> {
        validate_key(key)?;
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(MediaError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), MediaError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        debug!("stored {} bytes at {}", data.len(), key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, MediaError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(StoredObject::new(key, data))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, MediaError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub key: String,
    pub url: String,
}

/// Validates uploads against the per-kind type and size rules before
/// handing them to the store.
#[derive(Clone)]
pub struct MediaHandler {
    store: Arc<dyn MediaStore>,
    limits: StorageConfig,
}

impl MediaHandler {
    pub fn new(store: Arc<dyn MediaStore>, limits: StorageConfig) -> Self {
        Self { store, limits }
    }

    pub fn check_upload(
        &self,
        kind: MediaKind,
        content_type: &str,
        size: u64,
    ) -> Result<(), MediaError> {
        if !kind.accepts(content_type) {
            return Err(MediaError::UnsupportedType {
                kind,
                content_type: content_type.to_string(),
            });
        }

        let max = kind.max_bytes(&self.limits);
        if size > max {
            warn!("{} upload too large: {} bytes (max {})", kind, size, max);
            return Err(MediaError::TooLarge { size, max });
        }
        Ok(())
    }

    pub async fn upload(
        &self,
        kind: MediaKind,
        original_name: Option<&str>,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadedMedia, MediaError> {
        self.check_upload(kind, content_type, data.len() as u64)?;

        let essence = content_type.split(';').next().unwrap_or_default().trim();
        let key = generate_key(kind, original_name, &essence.to_ascii_lowercase());
        self.store.put(&key, data).await?;

        Ok(UploadedMedia {
            url: public_url(&key),
            key,
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<StoredObject>, MediaError> {
        self.store.get(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, MediaError> {
        self.store.delete(key).await
    }
}
