//! Downsample decoded storage tiles to a pyramid level with `fast_image_resize`.

use anyhow::{anyhow, ensure};
use fast_image_resize as fir;
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

use super::{DecodedTile, Result};

/// Filtering kernels used when reducing a tile to a lower resolution level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelFilter {
    /// Pick one source pixel per output pixel. Keeps class maps and masks intact.
    #[default]
    Nearest,
    /// Area average.
    Box,
    Bilinear,
    Lanczos3,
}

impl From<LevelFilter> for fir::ResizeAlg {
    fn from(value: LevelFilter) -> Self {
        use fir::FilterType;
        match value {
            LevelFilter::Nearest => fir::ResizeAlg::Nearest,
            LevelFilter::Box => fir::ResizeAlg::Convolution(FilterType::Box),
            LevelFilter::Bilinear => fir::ResizeAlg::Convolution(FilterType::Bilinear),
            LevelFilter::Lanczos3 => fir::ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

fn pixel_type(bands: usize) -> Result<fir::PixelType> {
    Ok(match bands {
        1 => fir::PixelType::U8,
        2 => fir::PixelType::U8x2,
        3 => fir::PixelType::U8x3,
        4 => fir::PixelType::U8x4,
        other => return Err(anyhow!("cannot resize tiles with {other} bands")),
    })
}

/// Resize an 8-bit interleaved tile to `target`.
pub fn resize_tile(source: &DecodedTile, target: Dimensions, filter: LevelFilter) -> Result<DecodedTile> {
    ensure!(source.dimensions.width > 0 && source.dimensions.height > 0, "source tile has zero dimensions");
    ensure!(target.width > 0 && target.height > 0, "target dimensions must be non-zero");

    if source.dimensions == target {
        return Ok(source.clone());
    }

    let pixel_type = pixel_type(source.bands)?;
    ensure!(
        source.pixels.len() >= source.dimensions.area() * source.bands,
        "source buffer is smaller than expected"
    );

    let src_view = fir::images::ImageRef::new(
        source.dimensions.width,
        source.dimensions.height,
        &source.pixels,
        pixel_type,
    )
    .map_err(|err| anyhow!("failed to prepare source tile: {err}"))?;
    let mut dst_image = fir::images::Image::new(target.width, target.height, pixel_type);

    let has_alpha = matches!(source.bands, 2 | 4);
    let options = fir::ResizeOptions::new().resize_alg(filter.into()).use_alpha(has_alpha);

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| anyhow!("tile resize failed: {err}"))?;

    Ok(DecodedTile { dimensions: target, bands: source.bands, pixels: dst_image.into_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> DecodedTile {
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(if (x + y) % 2 == 0 { 200 } else { 10 });
            }
        }
        DecodedTile { dimensions: Dimensions::new(width, height), bands: 1, pixels }
    }

    #[test]
    fn reduces_to_requested_level_size() {
        let resized = resize_tile(&checker(9, 5), Dimensions::new(5, 3), LevelFilter::Nearest).unwrap();
        assert_eq!(resized.dimensions, Dimensions::new(5, 3));
        assert_eq!(resized.pixels.len(), 15);
        assert!(resized.pixels.iter().all(|&v| v == 200 || v == 10));
    }

    #[test]
    fn box_filter_averages() {
        let resized = resize_tile(&checker(4, 4), Dimensions::new(2, 2), LevelFilter::Box).unwrap();
        assert!(resized.pixels.iter().all(|&v| v > 10 && v < 200));
    }

    #[test]
    fn identical_size_is_a_copy() {
        let tile = checker(3, 3);
        assert_eq!(resize_tile(&tile, Dimensions::new(3, 3), LevelFilter::Lanczos3).unwrap(), tile);
    }

    #[test]
    fn zero_target_fails() {
        let err = resize_tile(&checker(2, 2), Dimensions::new(0, 2), LevelFilter::Nearest).unwrap_err();
        assert!(err.to_string().contains("target dimensions"));
    }
}
