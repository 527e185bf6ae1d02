//! # Image Store
//!
//! Turns image content references into files the gateway can attach.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  queued (offline) add                                                  │
//! │     reference ──copy──► <images>/image_<uuid>.jpg   (kept until sent)  │
//! │                                                                         │
//! │  foreground upload                                                     │
//! │     reference ──copy──► <cache>/temp_image_<millis>.jpg ──read──► part │
//! │                                                                         │
//! │  background drain                                                      │
//! │     persisted path ─────────────────────────────────read──► part       │
//! │                                                                         │
//! │  An unreadable image never fails the upload: it goes out without one. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use stockline_core::{Caller, CoreError};

use crate::error::SyncResult;
use crate::gateway::ImageAttachment;

/// Local image files for queued and foreground uploads.
#[derive(Debug, Clone)]
pub struct ImageStore {
    image_dir: PathBuf,
    cache_dir: PathBuf,
}

impl ImageStore {
    pub fn new(image_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        ImageStore {
            image_dir: image_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Copies the referenced image to a stable location for a queued upload.
    ///
    /// ## Returns
    /// Path of the copy, `<image_dir>/image_<uuid>.jpg`.
    pub async fn persist(&self, reference: &str) -> SyncResult<PathBuf> {
        let source = resolve_reference(reference)?;
        tokio::fs::create_dir_all(&self.image_dir).await?;

        let target = self.image_dir.join(format!("image_{}.jpg", Uuid::new_v4()));
        tokio::fs::copy(&source, &target).await?;

        debug!(source = %source.display(), target = %target.display(), "Image persisted");
        Ok(target)
    }

    /// Loads the image to attach to a create request.
    ///
    /// A foreground caller's reference is first copied into the cache
    /// directory; a background caller's path is read as is. Any failure is
    /// logged and the upload proceeds without an image.
    pub async fn load_attachment(&self, reference: &str, caller: Caller) -> Option<ImageAttachment> {
        let result = match caller {
            Caller::Foreground => self.load_via_cache(reference).await,
            Caller::Background => self.load_direct(reference).await,
        };

        match result {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                warn!(reference = %reference, error = %e, "Image unavailable, uploading without it");
                None
            }
        }
    }

    async fn load_via_cache(&self, reference: &str) -> SyncResult<ImageAttachment> {
        let source = resolve_reference(reference)?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let temp = self
            .cache_dir
            .join(format!("temp_image_{}.jpg", Utc::now().timestamp_millis()));
        tokio::fs::copy(&source, &temp).await?;

        let attachment = read_attachment(&temp).await;
        if let Err(e) = tokio::fs::remove_file(&temp).await {
            debug!(path = %temp.display(), error = %e, "Could not remove temp image");
        }
        attachment
    }

    async fn load_direct(&self, reference: &str) -> SyncResult<ImageAttachment> {
        let path = resolve_reference(reference)?;
        read_attachment(&path).await
    }

    /// Deletes a persisted image once its upload is done.
    ///
    /// Only files inside the image directory are touched.
    pub async fn discard(&self, path: &str) {
        let path = Path::new(path);
        if !path.starts_with(&self.image_dir) {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!(path = %path.display(), error = %e, "Could not remove persisted image");
        }
    }
}

async fn read_attachment(path: &Path) -> SyncResult<ImageAttachment> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.jpg".to_string());

    Ok(ImageAttachment { file_name, bytes })
}

/// Maps a content reference to a local path.
///
/// Accepts plain paths and `file://` URIs.
pub fn resolve_reference(reference: &str) -> Result<PathBuf, CoreError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(CoreError::InvalidImageReference("empty reference".to_string()));
    }

    if reference.contains("://") {
        let url = Url::parse(reference).map_err(|e| CoreError::InvalidImageReference(e.to_string()))?;
        if url.scheme() != "file" {
            return Err(CoreError::InvalidImageReference(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        return url
            .to_file_path()
            .map_err(|_| CoreError::InvalidImageReference(reference.to_string()));
    }

    Ok(PathBuf::from(reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> ImageStore {
        ImageStore::new(root.join("images"), root.join("cache"))
    }

    #[test]
    fn test_resolve_reference() {
        assert_eq!(resolve_reference("/tmp/a.jpg").unwrap(), PathBuf::from("/tmp/a.jpg"));
        assert_eq!(resolve_reference("file:///tmp/a.jpg").unwrap(), PathBuf::from("/tmp/a.jpg"));
        assert!(resolve_reference("content://media/external/1").is_err());
        assert!(resolve_reference("  ").is_err());
    }

    #[tokio::test]
    async fn test_persist_copies_into_image_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("picked.jpg");
        std::fs::write(&source, b"jpeg-bytes").unwrap();

        let store = store(dir.path());
        let persisted = store.persist(source.to_str().unwrap()).await.unwrap();

        assert!(persisted.starts_with(store.image_dir()));
        let name = persisted.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("image_") && name.ends_with(".jpg"));
        assert_eq!(std::fs::read(&persisted).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_persist_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.persist("/definitely/not/here.jpg").await.is_err());
    }

    #[tokio::test]
    async fn test_load_attachment_foreground_and_background() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("picked.jpg");
        std::fs::write(&source, b"abc").unwrap();
        let store = store(dir.path());

        let fg = store
            .load_attachment(&format!("file://{}", source.display()), Caller::Foreground)
            .await
            .unwrap();
        assert_eq!(fg.bytes, b"abc");
        assert!(fg.file_name.starts_with("temp_image_"));

        let bg = store
            .load_attachment(source.to_str().unwrap(), Caller::Background)
            .await
            .unwrap();
        assert_eq!(bg.file_name, "picked.jpg");
    }

    #[tokio::test]
    async fn test_load_attachment_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.load_attachment("/nope.jpg", Caller::Background).await.is_none());
    }

    #[tokio::test]
    async fn test_discard_only_inside_image_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.jpg");
        std::fs::write(&outside, b"x").unwrap();
        let store = store(dir.path());

        let persisted = store.persist(outside.to_str().unwrap()).await.unwrap();
        store.discard(persisted.to_str().unwrap()).await;
        store.discard(outside.to_str().unwrap()).await;

        assert!(!persisted.exists());
        assert!(outside.exists());
    }
}
