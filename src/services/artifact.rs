use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::ImageFormat;

/// Persists event images as transient PNGs under the cache directory and
/// removes them once their job reaches a terminal outcome.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    cache_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Write image bytes to `event_image_<epoch-millis>.png`, re-encoded as
    /// PNG. Any failure is downgraded to "no artifact": delivery proceeds
    /// without an image rather than dropping the event.
    pub fn persist(&self, image_bytes: &[u8]) -> Option<PathBuf> {
        match self.try_persist(image_bytes) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "event image persisted");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist event image, proceeding without");
                None
            }
        }
    }

    fn try_persist(&self, image_bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        let decoded = image::load_from_memory(image_bytes)?;

        std::fs::create_dir_all(&self.cache_dir)?;

        let file_name = format!("event_image_{}.png", Utc::now().timestamp_millis());
        let path = self.cache_dir.join(file_name);

        let mut encoded = Cursor::new(Vec::new());
        decoded.write_to(&mut encoded, ImageFormat::Png)?;
        std::fs::write(&path, encoded.into_inner())?;

        Ok(path)
    }

    /// Idempotent delete: a missing path is a no-op, other I/O errors are
    /// logged and swallowed.
    pub fn delete(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "event image deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete event image")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ArtifactError {
    #[error("image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("cache write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(2, 2, Rgb([10u8, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn persists_png_into_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("cache"));

        let path = store.persist(&png_bytes()).expect("image should persist");
        assert!(path.exists());

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("event_image_"));
        assert!(name.ends_with(".png"));

        // Re-encoded output must itself be a readable PNG
        image::open(&path).expect("persisted file should decode");
    }

    #[test]
    fn undecodable_bytes_yield_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.persist(b"definitely not an image").is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store.persist(&png_bytes()).unwrap();
        store.delete(&path);
        assert!(!path.exists());

        // Second delete and a never-existing path are both no-ops
        store.delete(&path);
        store.delete(&dir.path().join("missing.png"));
    }
}
