//! Resolve which storage tiles feed a read window and where each lands in level space.
//!
//! Placements are always emitted row-major: top-to-bottom, then left-to-right within a row. The
//! compositor relies on this order for its overlay tie-break.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{MosaicError, Result};
use crate::pipeline::level::{level_size, level_size_exact, tile_count};
use crate::types::{Dimensions, LevelOffset, PixelRect};

/// How storage tiles partition the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TileLayout {
    /// Fixed-size tiles anchored at the read window origin; the last row and column are truncated.
    Uniform,
    /// Tile boundaries fixed by a product-wide image width, independent of the read window.
    Decompressed { default_image_width: u32 },
}

/// One storage tile intersecting a read window.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePlacement {
    pub level: u32,
    /// Linear index used to look the storage tile up in the product.
    pub storage_index: usize,
    pub column: u32,
    pub row: u32,
    /// Nominal size of a storage tile in the grid.
    pub storage_tile_size: Dimensions,
    /// Part of the storage tile covered by the read window, relative to the storage tile origin.
    pub region_in_storage_tile: PixelRect,
    /// Same region in base-resolution image coordinates.
    pub region_in_image: PixelRect,
    /// Decoded size expected on `level`.
    pub level_size: Dimensions,
    /// Translation of the decoded tile in level-scaled output space.
    pub translate: LevelOffset,
}

/// Placements for a read window split into uniform tiles starting at the window origin.
pub fn resolve_uniform(
    level: u32,
    cell: PixelRect,
    tile_size: Dimensions,
    translate: LevelOffset,
) -> Result<Vec<TilePlacement>> {
    cell.validate("read window")?;
    tile_size.validate("tile size")?;
    translate.validate("translate")?;

    let columns = tile_count(cell.width, tile_size.width)?;
    let rows = tile_count(cell.height, tile_size.height)?;
    let total_width = level_size_exact(cell.width, level);
    let total_height = level_size_exact(cell.height, level);

    let mut placements = Vec::with_capacity(columns as usize * rows as usize);
    let mut level_y = 0.0f64;
    for row in 0..rows {
        let offset_y = row * tile_size.height;
        let tile_height =
            if row == rows - 1 { cell.height - offset_y } else { tile_size.height };

        let mut level_x = 0.0f64;
        for column in 0..columns {
            let offset_x = column * tile_size.width;
            let tile_width =
                if column == columns - 1 { cell.width - offset_x } else { tile_size.width };

            placements.push(TilePlacement {
                level,
                storage_index: row as usize * columns as usize + column as usize,
                column,
                row,
                storage_tile_size: tile_size,
                region_in_storage_tile: PixelRect::new(0, 0, tile_width, tile_height),
                region_in_image: PixelRect::new(
                    cell.x + offset_x,
                    cell.y + offset_y,
                    tile_width,
                    tile_height,
                ),
                level_size: Dimensions {
                    width: level_size(tile_width, level),
                    height: level_size(tile_height, level),
                },
                translate: translate + LevelOffset::new(level_x, level_y),
            });

            level_x += level_size_exact(tile_width, level);
        }
        check_axis("width", level_x, total_width, level)?;

        level_y += level_size_exact(tile_height, level);
    }
    check_axis("height", level_y, total_height, level)?;

    debug!(
        target: "mosaic::layout",
        level,
        columns,
        rows,
        "resolved uniform layout for {}x{} window",
        cell.width,
        cell.height
    );
    Ok(placements)
}

/// Placements for a read window over a grid whose tiles are anchored at the image origin.
///
/// The window may start or end mid-tile; the first and last tile on each axis are clipped.
pub fn resolve_decompressed(
    level: u32,
    cell: PixelRect,
    tile_size: Dimensions,
    default_image_width: u32,
    translate: LevelOffset,
) -> Result<Vec<TilePlacement>> {
    cell.validate("read window")?;
    tile_size.validate("tile size")?;
    translate.validate("translate")?;

    let start_column = cell.x / tile_size.width;
    let end_column = end_tile_index(cell.x, cell.width, tile_size.width);
    let start_row = cell.y / tile_size.height;
    let end_row = end_tile_index(cell.y, cell.height, tile_size.height);

    let columns_per_row = tile_count(default_image_width, tile_size.width)?;
    if end_column >= columns_per_row {
        return Err(MosaicError::Precondition(format!(
            "read window ends in tile column {end_column} but the image only has {columns_per_row}"
        )));
    }

    let total_width = level_size_exact(cell.width, level);
    let total_height = level_size_exact(cell.height, level);

    let mut placements = Vec::new();
    let mut level_y = 0.0f64;
    let mut current_top = cell.y;
    for row in start_row..=end_row {
        let tile_height = clipped_tile_size(
            (start_row, end_row),
            row,
            current_top,
            cell.y + cell.height,
            tile_size.height,
        );
        let offset_y = clip_offset(current_top, row, tile_size.height, "Y", level)?;

        let mut level_x = 0.0f64;
        let mut current_left = cell.x;
        for column in start_column..=end_column {
            let tile_width = clipped_tile_size(
                (start_column, end_column),
                column,
                current_left,
                cell.x + cell.width,
                tile_size.width,
            );
            let offset_x = clip_offset(current_left, column, tile_size.width, "X", level)?;

            let storage_index = column as usize + row as usize * columns_per_row as usize;
            trace!(
                target: "mosaic::layout",
                storage_index,
                offset_x,
                offset_y,
                tile_width,
                tile_height,
                "clipped decompressed tile"
            );

            placements.push(TilePlacement {
                level,
                storage_index,
                column,
                row,
                storage_tile_size: tile_size,
                region_in_storage_tile: PixelRect::new(offset_x, offset_y, tile_width, tile_height),
                region_in_image: PixelRect::new(current_left, current_top, tile_width, tile_height),
                level_size: Dimensions {
                    width: level_size(tile_width, level),
                    height: level_size(tile_height, level),
                },
                translate: translate + LevelOffset::new(level_x, level_y),
            });

            level_x += level_size_exact(tile_width, level);
            current_left += tile_width;
        }
        check_axis("width", level_x, total_width, level)?;

        level_y += level_size_exact(tile_height, level);
        current_top += tile_height;
    }
    check_axis("height", level_y, total_height, level)?;

    debug!(
        target: "mosaic::layout",
        level,
        start_column,
        end_column,
        start_row,
        end_row,
        "resolved decompressed layout"
    );
    Ok(placements)
}

/// Index of the last tile touched by `[offset, offset + size)`.
pub fn end_tile_index(offset: u32, size: u32, tile_size: u32) -> u32 {
    let end = offset as u64 + size as u64;
    (end.div_ceil(tile_size as u64) - 1) as u32
}

fn clipped_tile_size(
    (start_index, end_index): (u32, u32),
    index: u32,
    current_offset: u32,
    read_end: u32,
    tile_size: u32,
) -> u32 {
    if index == end_index {
        read_end - current_offset
    } else if index == start_index {
        ((index as u64 + 1) * tile_size as u64 - current_offset as u64) as u32
    } else {
        tile_size
    }
}

fn clip_offset(current_offset: u32, index: u32, tile_size: u32, axis: &str, level: u32) -> Result<u32> {
    let offset = current_offset as i64 - index as i64 * tile_size as i64;
    if offset < 0 {
        return Err(MosaicError::Consistency(format!(
            "tile offset {axis} inside the storage tile is negative ({offset}) on level {level}"
        )));
    }
    Ok(offset as u32)
}

fn check_axis(axis: &str, accumulated: f64, expected: f64, level: u32) -> Result<()> {
    if accumulated != expected {
        return Err(MosaicError::Consistency(format!(
            "invalid translate {axis}: accumulated={accumulated} expected={expected} level={level}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widths_of_first_row(placements: &[TilePlacement]) -> Vec<u32> {
        placements.iter().filter(|p| p.row == placements[0].row).map(|p| p.region_in_image.width).collect()
    }

    #[test]
    fn uniform_grid_truncates_last_row_and_column() {
        let cell = PixelRect::new(0, 0, 1000, 750);
        let placements =
            resolve_uniform(0, cell, Dimensions::new(256, 256), LevelOffset::default()).unwrap();

        assert_eq!(placements.len(), 12);
        assert_eq!(widths_of_first_row(&placements), vec![256, 256, 256, 232]);
        let heights: Vec<u32> =
            placements.iter().filter(|p| p.column == 0).map(|p| p.region_in_image.height).collect();
        assert_eq!(heights, vec![256, 256, 238]);

        let last = placements.last().unwrap();
        assert_eq!(last.region_in_image, PixelRect::new(768, 512, 232, 238));
        assert_eq!(last.storage_index, 11);
        assert_eq!(last.translate, LevelOffset::new(768.0, 512.0));
    }

    #[test]
    fn uniform_placements_are_row_major() {
        let placements = resolve_uniform(
            1,
            PixelRect::new(10, 20, 300, 300),
            Dimensions::new(128, 128),
            LevelOffset::default(),
        )
        .unwrap();
        let order: Vec<(u32, u32)> = placements.iter().map(|p| (p.row, p.column)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2), (2, 0), (2, 1), (2, 2)]);
        assert_eq!(placements[4].region_in_image.offset(), crate::types::PixelOffset::new(138, 148));
    }

    #[test]
    fn uniform_translate_carries_residuals() {
        // 250-pixel tiles at level 2 are 62.5 pixels wide; naive index * ceil would drift.
        let placements = resolve_uniform(
            2,
            PixelRect::new(0, 0, 1000, 250),
            Dimensions::new(250, 250),
            LevelOffset::new(3.0, 0.0),
        )
        .unwrap();
        let xs: Vec<f64> = placements.iter().map(|p| p.translate.x).collect();
        assert_eq!(xs, vec![3.0, 65.5, 128.0, 190.5]);
        assert!(placements.iter().all(|p| p.level_size == Dimensions::new(63, 63)));
    }

    #[test]
    fn uniform_rejects_degenerate_inputs() {
        let err = resolve_uniform(0, PixelRect::new(0, 0, 0, 10), Dimensions::new(8, 8), LevelOffset::default())
            .unwrap_err();
        assert!(err.is_precondition());
        let err = resolve_uniform(0, PixelRect::new(0, 0, 10, 10), Dimensions::new(8, 0), LevelOffset::default())
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn decompressed_window_starting_mid_tile() {
        let placements = resolve_decompressed(
            0,
            PixelRect::new(300, 0, 500, 100),
            Dimensions::new(256, 256),
            1000,
            LevelOffset::default(),
        )
        .unwrap();

        let columns: Vec<u32> = placements.iter().map(|p| p.column).collect();
        assert_eq!(columns, vec![1, 2, 3]);
        assert_eq!(placements[0].region_in_storage_tile, PixelRect::new(44, 0, 212, 100));
        assert_eq!(placements[1].region_in_storage_tile, PixelRect::new(0, 0, 256, 100));
        assert_eq!(placements[2].region_in_storage_tile, PixelRect::new(0, 0, 32, 100));
        assert_eq!(widths_of_first_row(&placements).iter().sum::<u32>(), 500);
    }

    #[test]
    fn decompressed_storage_index_uses_default_width() {
        let placements = resolve_decompressed(
            0,
            PixelRect::new(300, 300, 100, 100),
            Dimensions::new(256, 256),
            1000,
            LevelOffset::default(),
        )
        .unwrap();
        assert_eq!(placements.len(), 1);
        // Column 1 of row 1 in a 4-column grid.
        assert_eq!(placements[0].storage_index, 1 + 4);
        assert_eq!(placements[0].region_in_storage_tile, PixelRect::new(44, 44, 100, 100));
        assert_eq!(placements[0].region_in_image, PixelRect::new(300, 300, 100, 100));
    }

    #[test]
    fn decompressed_small_window_crossing_boundary_uses_both_tiles() {
        let placements = resolve_decompressed(
            0,
            PixelRect::new(200, 0, 100, 50),
            Dimensions::new(256, 256),
            1000,
            LevelOffset::default(),
        )
        .unwrap();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].region_in_storage_tile, PixelRect::new(200, 0, 56, 50));
        assert_eq!(placements[1].region_in_storage_tile, PixelRect::new(0, 0, 44, 50));
        assert_eq!(placements[1].translate, LevelOffset::new(56.0, 0.0));
    }

    #[test]
    fn decompressed_rejects_window_past_default_width() {
        let err = resolve_decompressed(
            0,
            PixelRect::new(900, 0, 200, 10),
            Dimensions::new(256, 256),
            1000,
            LevelOffset::default(),
        )
        .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn end_tile_index_matches_ceiling_formula() {
        assert_eq!(end_tile_index(300, 500, 256), 3);
        assert_eq!(end_tile_index(0, 512, 256), 1);
        assert_eq!(end_tile_index(0, 513, 256), 2);
        assert_eq!(end_tile_index(10, 20, 256), 0);
    }

    #[test]
    fn clip_offset_flags_negative_offsets() {
        let err = clip_offset(100, 1, 256, "X", 0).unwrap_err();
        assert!(err.is_fatal_consistency());
    }

    #[test]
    fn windows_past_pixel_range_are_rejected() {
        let tile = Dimensions::new(64, 64);
        let uniform =
            resolve_uniform(0, PixelRect::new(u32::MAX - 10, 0, 100, 10), tile, LevelOffset::default());
        assert!(uniform.unwrap_err().is_precondition());

        let decompressed = resolve_decompressed(
            0,
            PixelRect::new(0, u32::MAX - 10, 100, 100),
            tile,
            700,
            LevelOffset::default(),
        );
        assert!(decompressed.unwrap_err().is_precondition());
    }

    #[test]
    fn negative_translate_is_rejected() {
        let cell = PixelRect::new(0, 0, 100, 100);
        let tile = Dimensions::new(64, 64);
        let err = resolve_uniform(0, cell, tile, LevelOffset::new(-1.0, 0.0)).unwrap_err();
        assert!(err.is_precondition());
        let err = resolve_decompressed(0, cell, tile, 700, LevelOffset::new(0.0, -0.25)).unwrap_err();
        assert!(err.is_precondition());
    }
}
