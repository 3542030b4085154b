//! Turn tile placements into decoded, validated, positioned tile rasters.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{MosaicError, Result};
use crate::pipeline::layout::TilePlacement;
use crate::pipeline::registry::{TileHandle, TileRegistry};
use crate::raster::Raster;
use crate::stats::MosaicStats;
use crate::types::{Dimensions, LevelOffset, PixelOffset};

/// Format-specific capability producing the decoded pixels of one placement.
///
/// Implementations must return exactly `placement.level_size` pixels or an error; they are never
/// retried by the core.
pub trait TileDecoder: Send + Sync {
    /// Opaque per-product state handed to every decode call.
    type Context: Send + Sync;

    fn decode(&self, placement: &TilePlacement, context: &Self::Context) -> anyhow::Result<Raster>;

    /// Drop decoder-side caches. Called when the owning source is reset.
    fn release(&self) {}
}

/// A registered tile raster and where it sits in level space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedTile {
    pub handle: TileHandle,
    pub storage_index: usize,
    pub translate: LevelOffset,
    pub origin: PixelOffset,
    pub dimensions: Dimensions,
}

/// Decode every placement, validate its size, and register it.
///
/// When `parallel` is set the decodes run on the rayon pool; results keep placement order and
/// nothing is registered unless every decode succeeds.
pub fn synthesize<D: TileDecoder>(
    decoder: &D,
    context: &D::Context,
    placements: &[TilePlacement],
    registry: &mut TileRegistry,
    parallel: bool,
    stats: Option<&MosaicStats>,
) -> Result<Vec<PositionedTile>> {
    let decode = |placement: &TilePlacement| decode_placement(decoder, context, placement, stats);

    let decoded: Vec<Raster> = if parallel {
        placements.par_iter().map(decode).collect::<Result<_>>()?
    } else {
        placements.iter().map(decode).collect::<Result<_>>()?
    };

    let positioned = placements
        .iter()
        .zip(decoded)
        .map(|(placement, raster)| {
            let dimensions = raster.dimensions;
            let handle = registry.register(raster);
            PositionedTile {
                handle,
                storage_index: placement.storage_index,
                translate: placement.translate,
                origin: placement.translate.to_pixel(),
                dimensions,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        target: "mosaic::synth",
        tiles = positioned.len(),
        registered = registry.len(),
        parallel,
        "synthesized tile images"
    );
    Ok(positioned)
}

fn decode_placement<D: TileDecoder>(
    decoder: &D,
    context: &D::Context,
    placement: &TilePlacement,
    stats: Option<&MosaicStats>,
) -> Result<Raster> {
    let started = Instant::now();
    let raster = decoder.decode(placement, context).map_err(|source| {
        warn!(
            target: "mosaic::synth",
            storage_index = placement.storage_index,
            level = placement.level,
            "tile decode failed: {source:#}"
        );
        MosaicError::Decode { storage_index: placement.storage_index, level: placement.level, source }
    })?;
    if let Some(stats) = stats {
        stats.record_decode(started.elapsed());
    }

    validate_tile_size(placement, &raster)?;
    Ok(raster)
}

fn validate_tile_size(placement: &TilePlacement, raster: &Raster) -> Result<()> {
    let expected = placement.level_size;
    if raster.width() != expected.width {
        return Err(MosaicError::Consistency(format!(
            "image tile width {} differs from level tile width {} on level {} (storage tile {})",
            raster.width(),
            expected.width,
            placement.level,
            placement.storage_index
        )));
    }
    if raster.height() != expected.height {
        return Err(MosaicError::Consistency(format!(
            "image tile height {} differs from level tile height {} on level {} (storage tile {})",
            raster.height(),
            expected.height,
            placement.level,
            placement.storage_index
        )));
    }
    Ok(())
}

/// Decoder reading placements out of a full-resolution raster that is already in memory.
///
/// Each tile is cropped from the image region of its placement and decimated to the level.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryTileDecoder;

impl TileDecoder for MemoryTileDecoder {
    type Context = Raster;

    fn decode(&self, placement: &TilePlacement, context: &Raster) -> anyhow::Result<Raster> {
        let tile = context.crop(placement.region_in_image)?;
        Ok(tile.subsample(placement.level))
    }
}
