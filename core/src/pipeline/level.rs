//! Pyramid level geometry and the multi-level model of a mosaic source.

use serde::{Deserialize, Serialize};

use crate::error::{MosaicError, Result};
use crate::types::Dimensions;

/// Levels are added while the scaled image area stays at or above this many pixels.
const MIN_LEVEL_AREA: f64 = 512.0 * 512.0;

/// Size of `base` after `level` halvings, rounding up.
pub fn level_size(base: u32, level: u32) -> u32 {
    if level >= 32 {
        return u32::from(base > 0);
    }
    let size = base >> level;
    if (size as u64) << level < base as u64 { size + 1 } else { size }
}

/// Exact fractional size of `base` at `level`. Exact in `f64` for every `u32` input.
pub fn level_size_exact(base: u32, level: u32) -> f64 {
    base as f64 / (2.0f64).powi(level as i32)
}

pub fn level_dimensions(base: Dimensions, level: u32) -> Dimensions {
    Dimensions { width: level_size(base.width, level), height: level_size(base.height, level) }
}

/// Number of tiles of `tile_size` needed to cover `dimension`.
pub fn tile_count(dimension: u32, tile_size: u32) -> Result<u32> {
    if dimension == 0 || tile_size == 0 {
        return Err(MosaicError::Precondition(format!(
            "tile count needs positive inputs, got dimension={dimension} tile_size={tile_size}"
        )));
    }
    Ok(dimension.div_ceil(tile_size))
}

/// Default pyramid depth for an image of the given size.
pub fn level_count(width: u32, height: u32) -> u32 {
    let mut count = 1;
    let mut scale = 1.0f64;
    while (width as f64 * scale) * (height as f64 * scale) >= MIN_LEVEL_AREA {
        count += 1;
        scale /= 2.0;
    }
    count
}

/// Two-dimensional affine transform mapping image pixels to model coordinates.
///
/// `x' = m00*x + m01*y + m02`, `y' = m10*x + m11*y + m12`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m11: f64,
    pub m02: f64,
    pub m12: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self { m00: 1.0, m10: 0.0, m01: 0.0, m11: 1.0, m02: 0.0, m12: 0.0 }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self { m00: sx, m10: 0.0, m01: 0.0, m11: sy, m02: 0.0, m12: 0.0 }
    }

    /// Apply `other` first, then `self`.
    pub fn concatenate(&self, other: &AffineTransform) -> AffineTransform {
        AffineTransform {
            m00: self.m00 * other.m00 + self.m01 * other.m10,
            m01: self.m00 * other.m01 + self.m01 * other.m11,
            m02: self.m00 * other.m02 + self.m01 * other.m12 + self.m02,
            m10: self.m10 * other.m00 + self.m11 * other.m10,
            m11: self.m10 * other.m01 + self.m11 * other.m11,
            m12: self.m10 * other.m02 + self.m11 * other.m12 + self.m12,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.m00 * x + self.m01 * y + self.m02, self.m10 * x + self.m11 * y + self.m12)
    }
}

/// Supplies georeferencing for a mosaic source. Consulted once, when the model is built.
pub trait GeoTransformProvider {
    fn image_to_model(&self) -> AffineTransform;

    /// Explicit pyramid depth; `None` derives it from the image size.
    fn level_count(&self) -> Option<u32> {
        None
    }
}

impl GeoTransformProvider for AffineTransform {
    fn image_to_model(&self) -> AffineTransform {
        *self
    }
}

/// Axis-aligned bounds in model coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Level count, base size, and image-to-model transform of a pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiLevelModel {
    level_count: u32,
    image_to_model: AffineTransform,
    dimensions: Dimensions,
}

impl MultiLevelModel {
    pub fn new(level_count: u32, image_to_model: AffineTransform, dimensions: Dimensions) -> Result<Self> {
        dimensions.validate("multi-level model")?;
        if level_count == 0 {
            return Err(MosaicError::Precondition("level count must be at least 1".into()));
        }
        Ok(Self { level_count, image_to_model, dimensions })
    }

    pub fn from_provider(provider: &dyn GeoTransformProvider, dimensions: Dimensions) -> Result<Self> {
        let level_count = provider
            .level_count()
            .unwrap_or_else(|| level_count(dimensions.width, dimensions.height));
        Self::new(level_count, provider.image_to_model(), dimensions)
    }

    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn scale(&self, level: u32) -> f64 {
        (2.0f64).powi(level as i32)
    }

    pub fn check_level(&self, level: u32) -> Result<()> {
        if level >= self.level_count {
            return Err(MosaicError::Precondition(format!(
                "level {level} outside pyramid of {} levels",
                self.level_count
            )));
        }
        Ok(())
    }

    /// Transform from level-`level` pixels to model coordinates.
    pub fn image_to_model(&self, level: u32) -> AffineTransform {
        let scale = self.scale(level);
        self.image_to_model.concatenate(&AffineTransform::scale(scale, scale))
    }

    pub fn level_dimensions(&self, level: u32) -> Dimensions {
        level_dimensions(self.dimensions, level)
    }

    pub fn model_bounds(&self) -> ModelBounds {
        let w = self.dimensions.width as f64;
        let h = self.dimensions.height as f64;
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
            .map(|(x, y)| self.image_to_model.apply(x, y));
        let mut bounds = ModelBounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            bounds.min_x = bounds.min_x.min(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_x = bounds.max_x.max(x);
            bounds.max_y = bounds.max_y.max(y);
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn level_zero_is_identity() {
        for base in [1, 7, 256, 1000, 750] {
            assert_eq!(level_size(base, 0), base);
        }
    }

    #[test]
    fn halves_with_ceiling() {
        assert_eq!(level_size(1000, 1), 500);
        assert_eq!(level_size(750, 3), 94);
        assert_eq!(level_size(232, 3), 29);
        assert_eq!(level_size(1, 5), 1);
        assert_relative_eq!(level_size_exact(750, 3), 93.75);
    }

    #[test]
    fn level_size_is_non_increasing() {
        for base in [1u32, 3, 255, 1001, 65_537] {
            let sizes: Vec<u32> = (0..20).map(|level| level_size(base, level)).collect();
            assert!(sizes.windows(2).all(|pair| pair[1] <= pair[0]));
        }
    }

    #[test]
    fn tile_count_rounds_up_and_rejects_zero() {
        assert_eq!(tile_count(1000, 256).unwrap(), 4);
        assert_eq!(tile_count(750, 256).unwrap(), 3);
        assert_eq!(tile_count(512, 256).unwrap(), 2);
        assert!(tile_count(0, 256).unwrap_err().is_precondition());
        assert!(tile_count(10, 0).is_err());
    }

    #[test]
    fn level_count_grows_with_area() {
        assert_eq!(level_count(256, 256), 1);
        assert_eq!(level_count(512, 512), 2);
        assert_eq!(level_count(1000, 750), 2);
        assert_eq!(level_count(4096, 4096), 5);
    }

    #[test]
    fn level_transform_scales_pixels() {
        let base = AffineTransform { m02: 100.0, m12: 50.0, m00: 10.0, m11: -10.0, ..AffineTransform::identity() };
        let model = MultiLevelModel::new(3, base, Dimensions::new(1000, 750)).unwrap();
        let (x, y) = model.image_to_model(2).apply(1.0, 1.0);
        assert_relative_eq!(x, 140.0);
        assert_relative_eq!(y, 10.0);

        let bounds = model.model_bounds();
        assert_relative_eq!(bounds.min_x, 100.0);
        assert_relative_eq!(bounds.max_x, 10_100.0);
        assert_relative_eq!(bounds.min_y, -7_450.0);
        assert_relative_eq!(bounds.max_y, 50.0);
    }

    #[test]
    fn rejects_levels_outside_pyramid() {
        let model = MultiLevelModel::new(2, AffineTransform::identity(), Dimensions::new(10, 10)).unwrap();
        assert!(model.check_level(1).is_ok());
        assert!(model.check_level(2).unwrap_err().is_precondition());
    }
}
