//! Shared geometry primitives exchanged between the layout, synthesis, and compositing stages.

use serde::{Deserialize, Serialize};

use crate::error::MosaicError;

/// Width and height of a raster, tile, or storage grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Reject zero-sized dimensions.
    pub fn validate(&self, what: &str) -> Result<(), MosaicError> {
        if self.width == 0 || self.height == 0 {
            return Err(MosaicError::Precondition(format!(
                "{what} must have positive dimensions, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Integer pixel offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelOffset {
    pub x: u32,
    pub y: u32,
}

impl PixelOffset {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Rectangle in base-resolution pixel coordinates.
///
/// Used both for the read window of a mosaic source and for the clipped region of a storage tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin.
    pub fn from_dimensions(dimensions: Dimensions) -> Self {
        Self { x: 0, y: 0, width: dimensions.width, height: dimensions.height }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions { width: self.width, height: self.height }
    }

    pub fn offset(&self) -> PixelOffset {
        PixelOffset { x: self.x, y: self.y }
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Reject empty rectangles and rectangles reaching past the `u32` coordinate range.
    pub fn validate(&self, what: &str) -> Result<(), MosaicError> {
        self.dimensions().validate(what)?;
        if self.right() > u32::MAX as u64 || self.bottom() > u32::MAX as u64 {
            return Err(MosaicError::Precondition(format!(
                "{what} {}x{} at ({}, {}) extends past the addressable pixel range",
                self.width, self.height, self.x, self.y
            )));
        }
        Ok(())
    }
}

/// Translation in level-scaled output coordinates.
///
/// Fractional parts are kept so cumulative placement can carry the rounding residual of each tile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelOffset {
    pub x: f64,
    pub y: f64,
}

impl LevelOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Reject negative or non-finite translations.
    pub fn validate(&self, what: &str) -> Result<(), MosaicError> {
        if !(self.x.is_finite() && self.y.is_finite()) || self.x < 0.0 || self.y < 0.0 {
            return Err(MosaicError::Precondition(format!(
                "{what} must be finite and non-negative, got ({}, {})",
                self.x, self.y
            )));
        }
        Ok(())
    }

    /// Output pixel where a tile translated by this offset starts.
    pub fn to_pixel(self) -> PixelOffset {
        PixelOffset { x: self.x.max(0.0).floor() as u32, y: self.y.max(0.0).floor() as u32 }
    }
}

impl std::ops::Add for LevelOffset {
    type Output = LevelOffset;

    fn add(self, rhs: Self) -> Self::Output {
        LevelOffset { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

/// Byte budget for decoded storage tiles held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBudget {
    pub bytes_max: usize,
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self { bytes_max: 512 * 1024 * 1024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sized_rect() {
        let err = PixelRect::new(4, 4, 0, 10).validate("read window").unwrap_err();
        assert!(matches!(err, MosaicError::Precondition(_)));
        assert!(err.to_string().contains("read window"));
    }

    #[test]
    fn rejects_rect_past_pixel_range() {
        let wide = PixelRect::new(u32::MAX - 10, 0, 100, 10).validate("read window").unwrap_err();
        assert!(wide.is_precondition());
        let tall = PixelRect::new(0, u32::MAX - 10, 100, 100).validate("read window").unwrap_err();
        assert!(tall.is_precondition());
        PixelRect::new(u32::MAX - 100, 0, 100, 1).validate("read window").unwrap();
    }

    #[test]
    fn rejects_negative_translation() {
        assert!(LevelOffset::new(-0.5, 0.0).validate("translate").unwrap_err().is_precondition());
        assert!(LevelOffset::new(0.0, f64::NAN).validate("translate").is_err());
        LevelOffset::new(3.5, 0.0).validate("translate").unwrap();
    }

    #[test]
    fn level_offset_floors_fractional_translation() {
        let offset = LevelOffset::new(62.5, 187.75);
        assert_eq!(offset.to_pixel(), PixelOffset::new(62, 187));
    }
}
