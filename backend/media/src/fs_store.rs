//! Filesystem-backed media store.
//!
//! Objects live under a root directory at their storage key and are published
//! at `{public_base_url}/{key}`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Utc};
use meterline_core::{MediaStore, MeterError, MeterResult, StoredMedia};
use tokio::fs;
use tracing::{debug, info};

use crate::mime_detect::extension_for;

/// Storage key for attachment `index` of message `message_sid`:
/// `{prefix}/{YYYY}/{MM}/{message_sid}_{index}.{ext}`.
pub fn storage_key(
    prefix: &str,
    now: DateTime<Utc>,
    message_sid: &str,
    index: usize,
    content_type: &str,
) -> String {
    let prefix = prefix.trim_matches('/');
    let name = format!(
        "{}/{:02}/{}_{}.{}",
        now.year(),
        now.month(),
        message_sid,
        index,
        extension_for(content_type)
    );
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

/// Reject keys that would escape the store root.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains('\\')
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

pub struct FsMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> MeterResult<PathBuf> {
        if !is_safe_key(key) {
            return Err(MeterError::Storage(format!("unsafe media key: {key}")));
        }
        Ok(self.root.join(key))
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn store(&self, key: &str, bytes: Bytes, content_type: &str) -> MeterResult<StoredMedia> {
        let path = self.path_for(key).map_err(|e| MeterError::Upload(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MeterError::Upload(format!("{}: {e}", parent.display())))?;
        }
        fs::write(&path, &bytes)
            .await
            .map_err(|e| MeterError::Upload(format!("{}: {e}", path.display())))?;

        let stored = StoredMedia {
            key: key.to_string(),
            public_url: self.public_url(key),
        };
        info!(key, content_type, size = bytes.len(), url = %stored.public_url, "Stored media");
        Ok(stored)
    }

    async fn load(&self, media: &StoredMedia) -> MeterResult<Bytes> {
        let path = self.path_for(&media.key)?;
        debug!(path = %path.display(), "Loading stored media");
        let data = fs::read(&path)
            .await
            .map_err(|e| MeterError::Storage(format!("{}: {e}", path.display())))?;
        Ok(Bytes::from(data))
    }
}
