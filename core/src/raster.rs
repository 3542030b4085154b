//! Band-interleaved sample buffers used for decoded tiles and composited mosaics.

use crate::error::{MosaicError, Result};
use crate::pipeline::level::level_size;
use crate::types::{Dimensions, PixelRect};

/// Multi-band raster stored row-major, band-interleaved, with `f64` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub dimensions: Dimensions,
    pub bands: usize,
    samples: Vec<f64>,
}

impl Raster {
    /// Allocate a raster filled with a constant value in every band.
    pub fn filled(dimensions: Dimensions, bands: usize, value: f64) -> Self {
        Self { dimensions, bands, samples: vec![value; dimensions.area() * bands] }
    }

    pub fn from_samples(dimensions: Dimensions, bands: usize, samples: Vec<f64>) -> Result<Self> {
        if bands == 0 {
            return Err(MosaicError::Precondition("raster must carry at least one band".into()));
        }
        let expected = dimensions.area() * bands;
        if samples.len() != expected {
            return Err(MosaicError::Precondition(format!(
                "raster {}x{}x{bands} expects {expected} samples, got {}",
                dimensions.width,
                dimensions.height,
                samples.len()
            )));
        }
        Ok(Self { dimensions, bands, samples })
    }

    /// Build a raster by evaluating `f(x, y, band)` at every sample.
    pub fn from_fn(
        dimensions: Dimensions,
        bands: usize,
        mut f: impl FnMut(u32, u32, usize) -> f64,
    ) -> Self {
        let mut samples = Vec::with_capacity(dimensions.area() * bands);
        for y in 0..dimensions.height {
            for x in 0..dimensions.width {
                for band in 0..bands {
                    samples.push(f(x, y, band));
                }
            }
        }
        Self { dimensions, bands, samples }
    }

    /// Interpret 8-bit interleaved pixels (gray, RGB, or RGBA) as a raster.
    pub fn from_u8(dimensions: Dimensions, bands: usize, pixels: &[u8]) -> Result<Self> {
        let samples = pixels.iter().map(|&value| value as f64).collect();
        Self::from_samples(dimensions, bands, samples)
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn byte_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f64>()
    }

    fn index(&self, x: u32, y: u32, band: usize) -> usize {
        ((y as usize * self.dimensions.width as usize) + x as usize) * self.bands + band
    }

    pub fn sample(&self, x: u32, y: u32, band: usize) -> f64 {
        self.samples[self.index(x, y, band)]
    }

    pub fn set_sample(&mut self, x: u32, y: u32, band: usize, value: f64) {
        let index = self.index(x, y, band);
        self.samples[index] = value;
    }

    /// All bands of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> &[f64] {
        let start = self.index(x, y, 0);
        &self.samples[start..start + self.bands]
    }

    /// Copy out a sub-rectangle. The rectangle must lie inside the raster.
    pub fn crop(&self, rect: PixelRect) -> Result<Raster> {
        rect.validate("crop region")?;
        if rect.right() > self.width() as u64 || rect.bottom() > self.height() as u64 {
            return Err(MosaicError::Precondition(format!(
                "crop region {rect:?} exceeds raster {}x{}",
                self.width(),
                self.height()
            )));
        }

        let row_len = rect.width as usize * self.bands;
        let mut samples = Vec::with_capacity(rect.dimensions().area() * self.bands);
        for y in rect.y..rect.y + rect.height {
            let start = self.index(rect.x, y, 0);
            samples.extend_from_slice(&self.samples[start..start + row_len]);
        }
        Ok(Raster { dimensions: rect.dimensions(), bands: self.bands, samples })
    }

    /// Nearest-neighbour decimation by `2^level`, producing `level_size` on each axis.
    pub fn subsample(&self, level: u32) -> Raster {
        if level == 0 {
            return self.clone();
        }
        let target = Dimensions {
            width: level_size(self.width(), level),
            height: level_size(self.height(), level),
        };
        let step = 1u64 << level;
        let mut samples = Vec::with_capacity(target.area() * self.bands);
        for y in 0..target.height {
            let src_y = (y as u64 * step) as u32;
            for x in 0..target.width {
                let src_x = (x as u64 * step) as u32;
                samples.extend_from_slice(self.pixel(src_x, src_y));
            }
        }
        Raster { dimensions: target, bands: self.bands, samples }
    }

    /// Grow the raster on the right and bottom by copying the last column and row outward.
    pub fn pad_replicate(&self, width: u32, height: u32) -> Result<Raster> {
        if width < self.width() || height < self.height() {
            return Err(MosaicError::Consistency(format!(
                "cannot pad {}x{} down to {width}x{height}",
                self.width(),
                self.height()
            )));
        }
        if width == self.width() && height == self.height() {
            return Ok(self.clone());
        }
        if self.dimensions.area() == 0 {
            return Err(MosaicError::Precondition("cannot pad an empty raster".into()));
        }

        let last_x = self.width() - 1;
        let last_y = self.height() - 1;
        let dimensions = Dimensions { width, height };
        let mut samples = Vec::with_capacity(dimensions.area() * self.bands);
        for y in 0..height {
            let src_y = y.min(last_y);
            for x in 0..width {
                samples.extend_from_slice(self.pixel(x.min(last_x), src_y));
            }
        }
        Ok(Raster { dimensions, bands: self.bands, samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Raster {
        Raster::from_fn(Dimensions::new(width, height), 1, |x, y, _| (y * 100 + x) as f64)
    }

    #[test]
    fn crop_copies_requested_window() {
        let raster = gradient(6, 4);
        let cropped = raster.crop(PixelRect::new(2, 1, 3, 2)).unwrap();
        assert_eq!(cropped.dimensions, Dimensions::new(3, 2));
        assert_eq!(cropped.samples(), &[102.0, 103.0, 104.0, 202.0, 203.0, 204.0]);
    }

    #[test]
    fn crop_outside_bounds_is_rejected() {
        let raster = gradient(4, 4);
        assert!(raster.crop(PixelRect::new(2, 2, 3, 1)).is_err());
    }

    #[test]
    fn subsample_rounds_sizes_up() {
        let raster = gradient(5, 3);
        let level1 = raster.subsample(1);
        assert_eq!(level1.dimensions, Dimensions::new(3, 2));
        assert_eq!(level1.sample(2, 1, 0), 204.0);
    }

    #[test]
    fn pad_replicates_edges() {
        let raster = gradient(2, 2);
        let padded = raster.pad_replicate(4, 3).unwrap();
        assert_eq!(padded.sample(3, 0, 0), 1.0);
        assert_eq!(padded.sample(0, 2, 0), 100.0);
        assert_eq!(padded.sample(3, 2, 0), 101.0);
    }

    #[test]
    fn pad_never_crops() {
        let raster = gradient(4, 4);
        let err = raster.pad_replicate(3, 4).unwrap_err();
        assert!(err.is_fatal_consistency());
    }
}
