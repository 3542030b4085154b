//! Storage tiles kept as ordinary image files (PNG, JPEG, TIFF).

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, ensure};
use image::{ImageFormat, ImageReader};
use parking_lot::Mutex;
use tracing::trace;

use crate::cache::{MemoryCache, TileKey};
use crate::fs::TileCatalog;
use crate::pipeline::layout::TilePlacement;
use crate::pipeline::synth::TileDecoder;
use crate::raster::Raster;
use crate::stats::MosaicStats;
use crate::types::{CacheBudget, Dimensions, PixelRect};

use super::Result;
use super::resize::{LevelFilter, resize_tile};

/// 8-bit interleaved pixels of a decoded tile (gray, gray+alpha, RGB or RGBA).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTile {
    pub dimensions: Dimensions,
    pub bands: usize,
    pub pixels: Vec<u8>,
}

impl DecodedTile {
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Copy out a sub-rectangle.
    pub fn crop(&self, region: PixelRect) -> Result<DecodedTile> {
        ensure!(
            region.right() <= self.dimensions.width as u64
                && region.bottom() <= self.dimensions.height as u64,
            "region {:?} exceeds tile of {}x{}",
            region,
            self.dimensions.width,
            self.dimensions.height
        );
        if region.offset() == Default::default() && region.dimensions() == self.dimensions {
            return Ok(self.clone());
        }

        let stride = self.dimensions.width as usize * self.bands;
        let row_len = region.width as usize * self.bands;
        let mut pixels = Vec::with_capacity(row_len * region.height as usize);
        for y in region.y..region.y + region.height {
            let start = y as usize * stride + region.x as usize * self.bands;
            pixels.extend_from_slice(&self.pixels[start..start + row_len]);
        }
        Ok(DecodedTile { dimensions: region.dimensions(), bands: self.bands, pixels })
    }

    pub fn to_raster(&self) -> Result<Raster> {
        Ok(Raster::from_u8(self.dimensions, self.bands, &self.pixels)?)
    }
}

/// Decode one encoded tile. The file name, when it has a known extension, selects the format.
pub fn decode_tile(name: &Path, data: &[u8]) -> Result<DecodedTile> {
    if data.is_empty() {
        return Err(anyhow!("empty tile data for {:?}", name));
    }

    let reader = if let Some(format) = infer_format(name) {
        ImageReader::with_format(Cursor::new(data), format)
    } else {
        ImageReader::new(Cursor::new(data)).with_guessed_format().context("guessing tile format")?
    };
    let image = reader.decode().with_context(|| format!("decoding tile {:?}", name))?;

    let dimensions = Dimensions::new(image.width(), image.height());
    let (bands, pixels) = match image.color().channel_count() {
        1 => (1, image.into_luma8().into_raw()),
        2 => (2, image.into_luma_alpha8().into_raw()),
        3 => (3, image.into_rgb8().into_raw()),
        _ => (4, image.into_rgba8().into_raw()),
    };
    Ok(DecodedTile { dimensions, bands, pixels })
}

fn infer_format(path: &Path) -> Option<ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| ImageFormat::from_extension(&ext))
}

/// Decoder for products whose storage tiles are listed in a [`TileCatalog`].
///
/// Full-resolution tiles are decoded once and kept in a byte-budgeted LRU, so building several
/// levels does not re-read the files.
#[derive(Debug)]
pub struct ImageTileDecoder {
    cache: Mutex<MemoryCache>,
    filter: LevelFilter,
    stats: Option<Arc<MosaicStats>>,
}

impl Default for ImageTileDecoder {
    fn default() -> Self {
        Self::new(CacheBudget::default())
    }
}

impl ImageTileDecoder {
    pub fn new(budget: CacheBudget) -> Self {
        Self { cache: Mutex::new(MemoryCache::new(budget)), filter: LevelFilter::default(), stats: None }
    }

    pub fn with_filter(mut self, filter: LevelFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_stats(mut self, stats: Arc<MosaicStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn cached_bytes(&self) -> usize {
        self.cache.lock().bytes_used()
    }

    /// Forget every decoded tile.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn storage_tile(&self, storage_index: usize, catalog: &TileCatalog) -> Result<Arc<DecodedTile>> {
        let key = TileKey::new(storage_index);
        let cached = self.cache.lock().get(&key);
        if let Some(stats) = &self.stats {
            stats.record_cache_lookup(cached.is_some());
        }
        if let Some(tile) = cached {
            return Ok(tile);
        }

        let name = catalog
            .entry(storage_index)
            .ok_or_else(|| anyhow!("storage tile {storage_index} missing from catalog"))?
            .to_path_buf();
        let bytes = catalog.read(storage_index)?;
        let tile = Arc::new(decode_tile(&name, &bytes)?);
        trace!(
            target: "mosaic::codec",
            storage_index,
            width = tile.dimensions.width,
            height = tile.dimensions.height,
            "decoded storage tile {}",
            name.display()
        );

        self.cache.lock().insert(key, Arc::clone(&tile));
        Ok(tile)
    }
}

impl TileDecoder for ImageTileDecoder {
    type Context = TileCatalog;

    fn decode(&self, placement: &TilePlacement, catalog: &TileCatalog) -> anyhow::Result<Raster> {
        let tile = self.storage_tile(placement.storage_index, catalog)?;
        let clipped = tile
            .crop(placement.region_in_storage_tile)
            .with_context(|| format!("clipping storage tile {}", placement.storage_index))?;
        let leveled = if placement.level == 0 {
            clipped
        } else {
            resize_tile(&clipped, placement.level_size, self.filter)?
        };
        leveled.to_raster()
    }

    fn release(&self) {
        self.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, RgbImage, Rgb};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).expect("encode tile");
        buf.into_inner()
    }

    #[test]
    fn decodes_gray_png_as_single_band() {
        let gray = GrayImage::from_fn(3, 2, |x, y| Luma([(x + 10 * y) as u8]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);
        let tile = decode_tile(Path::new("t0.png"), &bytes).unwrap();
        assert_eq!(tile.bands, 1);
        assert_eq!(tile.dimensions, Dimensions::new(3, 2));
        assert_eq!(tile.pixels, vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn guesses_format_without_extension() {
        let rgb = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        let bytes = encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Png);
        let tile = decode_tile(Path::new("tile_without_extension"), &bytes).unwrap();
        assert_eq!(tile.bands, 3);
        assert_eq!(&tile.pixels[..3], &[1, 2, 3]);
    }

    #[test]
    fn empty_data_is_rejected() {
        assert!(decode_tile(Path::new("t.png"), &[]).is_err());
    }

    #[test]
    fn crop_checks_bounds() {
        let tile = DecodedTile { dimensions: Dimensions::new(4, 2), bands: 2, pixels: (0..16).collect() };
        let cropped = tile.crop(PixelRect::new(1, 1, 2, 1)).unwrap();
        assert_eq!(cropped.pixels, vec![10, 11, 12, 13]);
        assert!(tile.crop(PixelRect::new(3, 0, 2, 1)).is_err());
    }
}
