//! Configuration structures for the document pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::processors::{ColorFormat, DocumentProcessor, FormatConverter, ImageResizer, ResizeTier};

/// Main configuration for docpipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocpipeConfig {
    /// Image loading configuration.
    pub loader: LoaderConfig,

    /// Processor chain configuration.
    pub processing: ProcessingConfig,
}

/// Image loading configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory that relative image paths are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,
}

/// Processor chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Normalize the colour format before anything else.
    pub convert_format: bool,

    /// Target colour format.
    pub target_format: ColorFormat,

    /// Resize images by size tier.
    pub resize: bool,

    /// Size tiers, checked in order.
    pub resize_tiers: Vec<ResizeTier>,

    /// Target size when no tier matches.
    pub fallback_size: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            convert_format: true,
            target_format: ColorFormat::default(),
            resize: true,
            resize_tiers: ResizeTier::defaults(),
            fallback_size: 600,
        }
    }
}

impl ProcessingConfig {
    /// Build the processor chain described by this configuration.
    pub fn build_processors(&self) -> Vec<Box<dyn DocumentProcessor>> {
        let mut processors: Vec<Box<dyn DocumentProcessor>> = Vec::new();

        if self.convert_format {
            processors.push(Box::new(FormatConverter::new(self.target_format)));
        }

        if self.resize {
            processors.push(Box::new(
                ImageResizer::new()
                    .with_tiers(self.resize_tiers.clone())
                    .with_fallback_size(self.fallback_size),
            ));
        }

        processors
    }
}

impl DocpipeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
