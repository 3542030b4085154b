//! Overlay compositing of positioned tiles into one level image.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MosaicError, Result};
use crate::pipeline::registry::TileRegistry;
use crate::pipeline::synth::PositionedTile;
use crate::raster::Raster;
use crate::types::{Dimensions, PixelRect};

/// Source samples below this are treated as background when no thresholds are configured.
pub const DEFAULT_SOURCE_THRESHOLD: f64 = 1.0;

/// Per-build controls of the overlay rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicOptions {
    /// Per-band value written where no source is eligible. Defaults to 0.
    pub background: Option<Vec<f64>>,
    /// `thresholds[source][band]`: a source sample is eligible when it is at least this value.
    /// Short arrays reuse their first entry.
    pub thresholds: Option<Vec<Vec<f64>>>,
    /// Give each source a region of interest covering its full extent, so every covered sample is
    /// eligible regardless of thresholds.
    pub create_source_roi: bool,
}

impl MosaicOptions {
    fn threshold(&self, source: usize, band: usize) -> f64 {
        let Some(thresholds) = &self.thresholds else {
            return DEFAULT_SOURCE_THRESHOLD;
        };
        thresholds
            .get(source)
            .or_else(|| thresholds.first())
            .and_then(|row| row.get(band).or_else(|| row.first()))
            .copied()
            .unwrap_or(DEFAULT_SOURCE_THRESHOLD)
    }

    fn background(&self, band: usize) -> f64 {
        self.background
            .as_ref()
            .and_then(|values| values.get(band).or_else(|| values.first()))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Composited raster for one pyramid level.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicImage {
    pub level: u32,
    pub raster: Raster,
}

impl MosaicImage {
    pub fn dimensions(&self) -> Dimensions {
        self.raster.dimensions
    }
}

/// Merge `tiles` in input order into an image of exactly `expected` size.
///
/// For every output sample the first tile whose sample is eligible wins. The merged extent may
/// fall short of `expected` because of rounding, in which case the last column and row are
/// replicated outward; exceeding `expected` is a consistency error.
pub fn compose(
    level: u32,
    expected: Dimensions,
    tiles: &[PositionedTile],
    registry: &TileRegistry,
    options: &MosaicOptions,
) -> Result<MosaicImage> {
    let Some(first) = tiles.first() else {
        return Err(MosaicError::Precondition("no tiles found to mosaic".into()));
    };
    let bands = registry.get(first.handle)?.bands;

    let mut extent = Dimensions::new(0, 0);
    for tile in tiles {
        let raster = registry.get(tile.handle)?;
        if raster.bands != bands {
            return Err(MosaicError::Precondition(format!(
                "storage tile {} has {} bands, expected {bands}",
                tile.storage_index, raster.bands
            )));
        }
        extent.width = extent.width.max(tile.origin.x + raster.width());
        extent.height = extent.height.max(tile.origin.y + raster.height());
    }

    if extent.width > expected.width {
        return Err(MosaicError::Consistency(format!(
            "mosaic width {} exceeds the level image width {} on level {level}",
            extent.width, expected.width
        )));
    }
    if extent.height > expected.height {
        return Err(MosaicError::Consistency(format!(
            "mosaic height {} exceeds the level image height {} on level {level}",
            extent.height, expected.height
        )));
    }

    let rois: Option<Vec<PixelRect>> = options.create_source_roi.then(|| {
        tiles
            .iter()
            .map(|tile| PixelRect {
                x: tile.origin.x,
                y: tile.origin.y,
                width: tile.dimensions.width,
                height: tile.dimensions.height,
            })
            .collect()
    });

    let mut output = Raster::filled(extent, bands, 0.0);
    let mut filled = vec![false; extent.area() * bands];
    for (source, tile) in tiles.iter().enumerate() {
        let raster = registry.get(tile.handle)?;
        let roi = rois.as_ref().map(|rois| rois[source]);
        for y in 0..raster.height() {
            let out_y = tile.origin.y + y;
            for x in 0..raster.width() {
                let out_x = tile.origin.x + x;
                if let Some(roi) = roi {
                    if !contains(roi, out_x, out_y) {
                        continue;
                    }
                }
                let base = (out_y as usize * extent.width as usize + out_x as usize) * bands;
                for band in 0..bands {
                    if filled[base + band] {
                        continue;
                    }
                    let value = raster.sample(x, y, band);
                    if roi.is_some() || value >= options.threshold(source, band) {
                        output.set_sample(out_x, out_y, band, value);
                        filled[base + band] = true;
                    }
                }
            }
        }
    }

    for (index, done) in filled.iter().enumerate() {
        if !done {
            let band = index % bands;
            let pixel = index / bands;
            let x = (pixel % extent.width as usize) as u32;
            let y = (pixel / extent.width as usize) as u32;
            output.set_sample(x, y, band, options.background(band));
        }
    }

    let raster = if extent != expected {
        debug!(
            target: "mosaic::compose",
            level,
            right_pad = expected.width - extent.width,
            bottom_pad = expected.height - extent.height,
            "padding mosaic to level size"
        );
        output.pad_replicate(expected.width, expected.height)?
    } else {
        output
    };

    Ok(MosaicImage { level, raster })
}

fn contains(rect: PixelRect, x: u32, y: u32) -> bool {
    (x as u64) >= rect.x as u64
        && (y as u64) >= rect.y as u64
        && (x as u64) < rect.right()
        && (y as u64) < rect.bottom()
}
