use crate::ingest::load_frame;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use urban_vision::{Snapshot, SnapshotSource, SourceError};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Replays the images of a directory in name order, wrapping around at the end.
/// Stands in for a live camera endpoint.
pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: AtomicUsize,
    hour_of_day: Option<u8>,
}

impl DirectorySource {
    pub fn open(dir: &Path, hour_of_day: Option<u8>) -> std::io::Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        files.sort();
        Ok(Self::from_files(files, hour_of_day))
    }

    pub fn from_files(files: Vec<PathBuf>, hour_of_day: Option<u8>) -> Self {
        Self {
            files,
            next: AtomicUsize::new(0),
            hour_of_day,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl SnapshotSource for DirectorySource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        if self.files.is_empty() {
            return Err(SourceError::Unavailable("snapshot directory holds no images".into()));
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.files.len();
        let path = self.files[index].clone();
        debug!(path = %path.display(), "fetching snapshot");

        let frame = tokio::task::spawn_blocking(move || load_frame(&path))
            .await
            .map_err(|err| SourceError::Unavailable(format!("decoder task failed: {err}")))??;
        Ok(Snapshot {
            frame,
            hour_of_day: self.hour_of_day,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn cycles_through_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(20, 10, Rgb([0, 0, 0])).save(dir.path().join("b.png")).unwrap();
        RgbImage::from_pixel(10, 20, Rgb([0, 0, 0])).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a snapshot").unwrap();

        let source = DirectorySource::open(dir.path(), Some(7)).unwrap();
        assert_eq!(source.len(), 2);

        let widths: Vec<u32> = [
            source.fetch().await.unwrap(),
            source.fetch().await.unwrap(),
            source.fetch().await.unwrap(),
        ]
        .iter()
        .map(|snapshot| snapshot.frame.width())
        .collect();
        assert_eq!(widths, vec![10, 20, 10]);
        assert_eq!(source.fetch().await.unwrap().hour_of_day, Some(7));
    }

    #[tokio::test]
    async fn empty_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::open(dir.path(), None).unwrap();
        assert!(source.is_empty());
        assert!(matches!(source.fetch().await, Err(SourceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"\xff\xd8 truncated").unwrap();
        let source = DirectorySource::open(dir.path(), None).unwrap();
        assert!(matches!(source.fetch().await, Err(SourceError::Decode(_))));
    }
}
