//! Persisted settings for mosaic sources.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};

use crate::pipeline::compose::MosaicOptions;
use crate::pipeline::layout::TileLayout;
use crate::types::{CacheBudget, Dimensions};

use super::Result;

/// Settings shared by every level build of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub tile_size: Dimensions,
    pub layout: TileLayout,
    /// Decode the tiles of one level on the rayon pool.
    pub parallel_decode: bool,
    pub mosaic: MosaicOptions,
    /// Budget for decoded full-resolution storage tiles kept by file-backed decoders.
    pub tile_cache: CacheBudget,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            tile_size: Dimensions::new(512, 512),
            layout: TileLayout::Uniform,
            parallel_decode: true,
            mosaic: MosaicOptions::default(),
            tile_cache: CacheBudget::default(),
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.tile_size.width > 0 && self.tile_size.height > 0,
            "tile size must be positive, got {}x{}",
            self.tile_size.width,
            self.tile_size.height
        );
        if let TileLayout::Decompressed { default_image_width } = self.layout {
            ensure!(default_image_width > 0, "default image width must be positive");
        }
        Ok(())
    }

    /// Read a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading source config {}", path.display()))?;
        let config: SourceConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing source config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialising source config")?;
        let mut file = fs::File::create(path)
            .with_context(|| format!("creating source config {}", path.display()))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}
