//! Tiered, aspect-preserving image resizing.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DocumentProcessor, Result};
use crate::error::ProcessingError;

/// Images whose longest side exceeds `source` are scaled to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeTier {
    /// Tier name (for logs).
    pub name: String,
    /// Longest side must be strictly greater than this.
    pub source: u32,
    /// Longest side after resizing.
    pub target: u32,
}

impl ResizeTier {
    pub fn new(name: impl Into<String>, source: u32, target: u32) -> Self {
        Self {
            name: name.into(),
            source,
            target,
        }
    }

    /// Large, medium and small tiers.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("large", 2000, 1024),
            Self::new("medium", 1024, 800),
            Self::new("small", 600, 600),
        ]
    }
}

/// Resizes images so their longest side matches a size tier.
#[derive(Debug, Clone)]
pub struct ImageResizer {
    tiers: Vec<ResizeTier>,
    fallback_size: u32,
    filter: FilterType,
}

impl ImageResizer {
    /// Create a resizer with the default tiers.
    pub fn new() -> Self {
        Self {
            tiers: ResizeTier::defaults(),
            fallback_size: 600,
            filter: FilterType::Lanczos3,
        }
    }

    /// Replace the size tiers.
    pub fn with_tiers(mut self, tiers: Vec<ResizeTier>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Set the target size used when no tier matches.
    pub fn with_fallback_size(mut self, size: u32) -> Self {
        self.fallback_size = size;
        self
    }

    /// Set the resampling filter.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Target length of the longest side for an image whose longest side is `max_dimension`.
    pub fn target_size(&self, max_dimension: u32) -> u32 {
        self.tiers
            .iter()
            .find(|tier| max_dimension > tier.source)
            .map(|tier| {
                debug!("Image matches size tier '{}'", tier.name);
                tier.target
            })
            .unwrap_or(self.fallback_size)
    }

    fn scaled_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
        let longest = width.max(height) as u64;
        let new_width = (width as u64 * target as u64 / longest) as u32;
        let new_height = (height as u64 * target as u64 / longest) as u32;
        (new_width.max(1), new_height.max(1))
    }
}

impl Default for ImageResizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for ImageResizer {
    fn name(&self) -> &str {
        "image-resizer"
    }

    fn process(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ProcessingError::EmptyImage { width, height });
        }

        let target = self.target_size(width.max(height));
        if target == 0 {
            return Err(ProcessingError::Failed(
                "resize target must be greater than zero".to_string(),
            ));
        }
        if target == width.max(height) {
            return Ok(image.clone());
        }

        let (new_width, new_height) = Self::scaled_dimensions(width, height, target);
        debug!(
            "Resizing image {}x{} -> {}x{}",
            width, height, new_width, new_height
        );

        Ok(image.resize_exact(new_width, new_height, self.filter))
    }
}
