//! Colour format normalization.

use std::fmt;
use std::str::FromStr;

use image::{ColorType, DynamicImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DocumentProcessor, Result};
use crate::error::ProcessingError;

/// Pixel layout an image is converted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    /// 8-bit RGB.
    #[default]
    Rgb8,
    /// 8-bit RGB with alpha.
    Rgba8,
    /// 8-bit grayscale.
    Luma8,
    /// 8-bit grayscale with alpha.
    LumaAlpha8,
}

impl ColorFormat {
    fn color_type(self) -> ColorType {
        match self {
            ColorFormat::Rgb8 => ColorType::Rgb8,
            ColorFormat::Rgba8 => ColorType::Rgba8,
            ColorFormat::Luma8 => ColorType::L8,
            ColorFormat::LumaAlpha8 => ColorType::La8,
        }
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorFormat::Rgb8 => "rgb8",
            ColorFormat::Rgba8 => "rgba8",
            ColorFormat::Luma8 => "luma8",
            ColorFormat::LumaAlpha8 => "luma_alpha8",
        };
        f.write_str(name)
    }
}

impl FromStr for ColorFormat {
    type Err = ProcessingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rgb" | "rgb8" => Ok(ColorFormat::Rgb8),
            "rgba" | "rgba8" => Ok(ColorFormat::Rgba8),
            "l" | "l8" | "luma" | "luma8" | "gray" | "grey" => Ok(ColorFormat::Luma8),
            "la" | "la8" | "luma_alpha8" => Ok(ColorFormat::LumaAlpha8),
            other => Err(ProcessingError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Converts images to a fixed colour format.
#[derive(Debug, Clone, Default)]
pub struct FormatConverter {
    target: ColorFormat,
}

impl FormatConverter {
    pub fn new(target: ColorFormat) -> Self {
        Self { target }
    }

    /// Target colour format.
    pub fn target(&self) -> ColorFormat {
        self.target
    }
}

impl DocumentProcessor for FormatConverter {
    fn name(&self) -> &str {
        "format-converter"
    }

    fn process(&self, image: &DynamicImage) -> Result<DynamicImage> {
        if image.color() == self.target.color_type() {
            return Ok(image.clone());
        }

        debug!("Converting {:?} image to {}", image.color(), self.target);

        let converted = match self.target {
            ColorFormat::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
            ColorFormat::Rgba8 => DynamicImage::ImageRgba8(image.to_rgba8()),
            ColorFormat::Luma8 => DynamicImage::ImageLuma8(image.to_luma8()),
            ColorFormat::LumaAlpha8 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        };
        Ok(converted)
    }
}
