//! Resolving image references into decoded images.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::error::LoadError;

/// An image handed to the pipeline: already decoded, or a reference to one.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Decoded image.
    Image(DynamicImage),
    /// Path to an image file.
    Path(PathBuf),
    /// Encoded image data (PNG, JPEG, ...).
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Whether the source obviously holds no image at all.
    pub fn is_empty(&self) -> bool {
        match self {
            ImageSource::Image(image) => {
                let (width, height) = image.dimensions();
                width == 0 || height == 0
            }
            ImageSource::Path(path) => path.as_os_str().is_empty(),
            ImageSource::Bytes(data) => data.is_empty(),
        }
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Image(image)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(data: Vec<u8>) -> Self {
        ImageSource::Bytes(data)
    }
}

/// Resolves an [`ImageSource`] into an in-memory image.
pub trait ImageLoader: Send + Sync {
    /// Resolve the source into a decoded image.
    fn resolve(&self, source: ImageSource) -> Result<DynamicImage, LoadError>;
}

/// Loader reading image files from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsImageLoader {
    base_dir: Option<PathBuf>,
}

impl FsImageLoader {
    /// Create a loader resolving paths as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ImageLoader for FsImageLoader {
    fn resolve(&self, source: ImageSource) -> Result<DynamicImage, LoadError> {
        match source {
            ImageSource::Image(image) => Ok(image),
            ImageSource::Path(path) => {
                let path = self.full_path(&path);
                if !path.exists() {
                    return Err(LoadError::NotFound(path));
                }

                let data = std::fs::read(&path).map_err(|source| LoadError::Read {
                    path: path.clone(),
                    source,
                })?;
                debug!("Read {} bytes from {}", data.len(), path.display());

                Ok(image::load_from_memory(&data)?)
            }
            ImageSource::Bytes(data) => Ok(image::load_from_memory(&data)?),
        }
    }
}
