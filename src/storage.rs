// SPDX-License-Identifier: GPL-3.0-only

//! Picture storage
//!
//! Saves filtered photos into the user's shared picture directory as JPEG,
//! named after the local capture time.

use crate::config::Config;
use crate::constants::storage;
use crate::errors::StorageError;
use image::RgbaImage;
use image::codecs::jpeg::JpegEncoder;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Record created by one save
#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    pub path: PathBuf,
    /// File name without extension
    pub display_name: String,
    pub mime_type: &'static str,
    /// Album path relative to the home directory
    pub relative_path: String,
}

/// Resolve an album path like `Pictures/FilterCamera` to a directory
///
/// A leading `Pictures` component maps to the XDG picture directory; anything
/// else is taken relative to the home directory.
pub fn resolve_album_dir(relative_path: &str) -> Option<PathBuf> {
    let relative = Path::new(relative_path);
    if let Ok(rest) = relative.strip_prefix("Pictures")
        && let Some(pictures) = dirs::picture_dir()
    {
        return Some(pictures.join(rest));
    }
    dirs::home_dir().map(|home| home.join(relative))
}

/// Writes images into the picture album
#[derive(Debug, Clone)]
pub struct ImagePersister {
    album_dir: PathBuf,
    relative_path: String,
    quality: u8,
}

impl ImagePersister {
    pub fn new(album_dir: PathBuf, relative_path: impl Into<String>, quality: u8) -> Self {
        Self {
            album_dir,
            relative_path: relative_path.into(),
            quality: quality.clamp(1, 100),
        }
    }

    /// Persister for the album named in the config
    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        let album_dir = resolve_album_dir(&config.album_path).ok_or_else(|| {
            StorageError::InsertFailed("no home or picture directory".to_string())
        })?;
        Ok(Self::new(album_dir, &config.album_path, config.jpeg_quality))
    }

    pub fn album_dir(&self) -> &Path {
        &self.album_dir
    }

    /// Save `image` as a JPEG named after the current local time
    pub async fn save_image(&self, image: Arc<RgbaImage>) -> Result<SavedImage, StorageError> {
        let display_name = chrono::Local::now()
            .format(storage::DISPLAY_NAME_FORMAT)
            .to_string();
        let persister = self.clone();

        tokio::task::spawn_blocking(move || persister.save_blocking(&image, &display_name))
            .await
            .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }

    /// Write `image` as a JPEG at an explicit path, replacing any file there
    pub async fn export_image(
        &self,
        image: Arc<RgbaImage>,
        path: PathBuf,
    ) -> Result<PathBuf, StorageError> {
        let persister = self.clone();

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::InsertFailed(format!("{}: {}", parent.display(), e))
                })?;
            }
            let file = File::create(&path)
                .map_err(|e| StorageError::OpenFailed(format!("{}: {}", path.display(), e)))?;
            if let Err(e) = persister.write_jpeg(file, &image) {
                remove_partial(&path);
                return Err(e);
            }
            info!(path = %path.display(), "Image exported");
            Ok(path)
        })
        .await
        .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }

    fn save_blocking(&self, image: &RgbaImage, display_name: &str) -> Result<SavedImage, StorageError> {
        let (path, display_name) = self.insert_record(display_name).inspect_err(|e| {
            error!(error = %e, "Failed to create new picture record.");
        })?;

        let file = match OpenOptions::new().write(true).truncate(true).open(&path) {
            Ok(file) => file,
            Err(e) => {
                remove_partial(&path);
                return Err(StorageError::OpenFailed(format!("{}: {}", path.display(), e)));
            }
        };

        if let Err(e) = self.write_jpeg(file, image) {
            error!(path = %path.display(), error = %e, "Failed to save bitmap");
            remove_partial(&path);
            return Err(e);
        }

        info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "Photo saved"
        );

        Ok(SavedImage {
            path,
            display_name,
            mime_type: storage::MIME_TYPE,
            relative_path: self.relative_path.clone(),
        })
    }

    /// Create an empty record, suffixing the name when it is taken
    fn insert_record(&self, display_name: &str) -> Result<(PathBuf, String), StorageError> {
        std::fs::create_dir_all(&self.album_dir).map_err(|e| {
            StorageError::InsertFailed(format!("{}: {}", self.album_dir.display(), e))
        })?;

        for attempt in 0..=storage::MAX_NAME_COLLISIONS {
            let name = if attempt == 0 {
                display_name.to_string()
            } else {
                format!("{}-{}", display_name, attempt)
            };
            let path = self
                .album_dir
                .join(format!("{}.{}", name, storage::EXTENSION));

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(path = %path.display(), "Created media record");
                    return Ok((path, name));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::InsertFailed(format!("{}: {}", path.display(), e)));
                }
            }
        }

        Err(StorageError::InsertFailed(format!(
            "no free name for {}",
            display_name
        )))
    }

    fn write_jpeg(&self, file: File, image: &RgbaImage) -> Result<(), StorageError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(StorageError::EncodeFailed("empty image".to_string()));
        }

        // JPEG has no alpha channel
        let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();

        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.quality).encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        writer.flush()?;
        Ok(())
    }
}

fn remove_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove partial record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn persister(dir: &Path) -> ImagePersister {
        ImagePersister::new(dir.join("album"), storage::RELATIVE_PATH, storage::JPEG_QUALITY)
    }

    fn photo() -> RgbaImage {
        RgbaImage::from_fn(20, 10, |x, y| Rgba([x as u8 * 10, y as u8 * 20, 90, 255]))
    }

    #[tokio::test]
    async fn test_save_writes_one_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let persister = persister(dir.path());

        let saved = persister.save_image(Arc::new(photo())).await.unwrap();

        assert_eq!(saved.mime_type, "image/jpeg");
        assert_eq!(saved.relative_path, "Pictures/FilterCamera");
        assert_eq!(saved.path.extension().unwrap(), "jpg");
        assert_eq!(std::fs::read_dir(persister.album_dir()).unwrap().count(), 1);

        let decoded = image::open(&saved.path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[test]
    fn test_display_name_shape() {
        let name = chrono::Local::now()
            .format(storage::DISPLAY_NAME_FORMAT)
            .to_string();
        // 2024-05-01-12-30-45-123
        assert_eq!(name.len(), 23);
        assert_eq!(name.matches('-').count(), 6);
    }

    #[test]
    fn test_same_millisecond_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let persister = persister(dir.path());
        let image = photo();

        let first = persister.save_blocking(&image, "2024-01-01-00-00-00-000").unwrap();
        let second = persister.save_blocking(&image, "2024-01-01-00-00-00-000").unwrap();

        assert_eq!(first.display_name, "2024-01-01-00-00-00-000");
        assert_eq!(second.display_name, "2024-01-01-00-00-00-000-1");
        assert_ne!(first.path, second.path);
    }

    #[test]
    fn test_unwritable_album_is_insert_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("album");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = persister(dir.path()).save_blocking(&photo(), "name");
        assert!(matches!(result, Err(StorageError::InsertFailed(_))));
    }

    #[tokio::test]
    async fn test_export_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.jpg");

        let path = persister(dir.path())
            .export_image(Arc::new(photo()), target.clone())
            .await
            .unwrap();

        assert_eq!(path, target);
        assert_eq!(image::open(&path).unwrap().width(), 20);
    }

    #[test]
    fn test_empty_image_leaves_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let persister = persister(dir.path());

        let result = persister.save_blocking(&RgbaImage::new(0, 0), "empty");
        assert!(matches!(result, Err(StorageError::EncodeFailed(_))));
        assert_eq!(std::fs::read_dir(persister.album_dir()).unwrap().count(), 0);
    }
}
