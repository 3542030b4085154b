//! Multi-level mosaic source: resolves, decodes, and composites pyramid levels on demand.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::Result;
use crate::pipeline::compose::{MosaicImage, MosaicOptions, compose};
use crate::pipeline::layout::{TileLayout, TilePlacement, resolve_decompressed, resolve_uniform};
use crate::pipeline::level::{AffineTransform, GeoTransformProvider, MultiLevelModel};
use crate::pipeline::registry::TileRegistry;
use crate::pipeline::synth::{TileDecoder, synthesize};
use crate::stats::MosaicStats;
use crate::types::{Dimensions, LevelOffset, PixelRect};

#[derive(Debug, Default)]
struct SourceState {
    registry: TileRegistry,
    levels: Vec<Option<Arc<MosaicImage>>>,
}

/// Pyramid over a read window of a tiled product.
///
/// Builds and [`MosaicSource::reset`] share one lock, so a reset never races a build on the same
/// source. Separate sources share nothing.
pub struct MosaicSource<D: TileDecoder> {
    model: MultiLevelModel,
    read_bounds: PixelRect,
    tile_size: Dimensions,
    layout: TileLayout,
    decoder: D,
    context: D::Context,
    options: MosaicOptions,
    parallel: bool,
    stats: Option<Arc<MosaicStats>>,
    state: Mutex<SourceState>,
}

impl<D: TileDecoder> fmt::Debug for MosaicSource<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MosaicSource")
            .field("model", &self.model)
            .field("read_bounds", &self.read_bounds)
            .field("tile_size", &self.tile_size)
            .field("layout", &self.layout)
            .field("options", &self.options)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

impl<D: TileDecoder> MosaicSource<D> {
    pub fn new(
        read_bounds: PixelRect,
        tile_size: Dimensions,
        layout: TileLayout,
        geo: &dyn GeoTransformProvider,
        decoder: D,
        context: D::Context,
    ) -> Result<Self> {
        read_bounds.validate("read bounds")?;
        tile_size.validate("tile size")?;
        let model = MultiLevelModel::from_provider(geo, read_bounds.dimensions())?;

        Ok(Self {
            model,
            read_bounds,
            tile_size,
            layout,
            decoder,
            context,
            options: MosaicOptions::default(),
            parallel: false,
            stats: None,
            state: Mutex::new(SourceState::default()),
        })
    }

    /// Build a source from persisted settings.
    pub fn from_config(
        config: &SourceConfig,
        read_bounds: PixelRect,
        geo: &dyn GeoTransformProvider,
        decoder: D,
        context: D::Context,
    ) -> Result<Self> {
        let source = Self::new(read_bounds, config.tile_size, config.layout, geo, decoder, context)?
            .with_options(config.mosaic.clone())
            .with_parallel(config.parallel_decode);
        Ok(source)
    }

    pub fn with_options(mut self, options: MosaicOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_stats(mut self, stats: Arc<MosaicStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn model(&self) -> &MultiLevelModel {
        &self.model
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn read_bounds(&self) -> PixelRect {
        self.read_bounds
    }

    pub fn level_count(&self) -> u32 {
        self.model.level_count()
    }

    pub fn image_to_model(&self, level: u32) -> AffineTransform {
        self.model.image_to_model(level)
    }

    /// Number of decoded tiles currently owned by the source.
    pub fn registered_tiles(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Cached image for `level`, building it on first request.
    pub fn level_image(&self, level: u32) -> Result<Arc<MosaicImage>> {
        self.model.check_level(level)?;
        let mut state = self.state.lock();
        if let Some(Some(image)) = state.levels.get(level as usize) {
            return Ok(Arc::clone(image));
        }

        let image = Arc::new(self.build_locked(&mut state, level)?);
        let slot = level as usize;
        if state.levels.len() <= slot {
            state.levels.resize(slot + 1, None);
        }
        state.levels[slot] = Some(Arc::clone(&image));
        Ok(image)
    }

    /// Build `level` from scratch, bypassing the level cache.
    pub fn build_level(&self, level: u32) -> Result<MosaicImage> {
        self.model.check_level(level)?;
        let mut state = self.state.lock();
        self.build_locked(&mut state, level)
    }

    /// Placements the source would decode for `level`.
    pub fn placements(&self, level: u32) -> Result<Vec<TilePlacement>> {
        self.model.check_level(level)?;
        let translate = LevelOffset::default();
        match self.layout {
            TileLayout::Uniform => resolve_uniform(level, self.read_bounds, self.tile_size, translate),
            TileLayout::Decompressed { default_image_width } => resolve_decompressed(
                level,
                self.read_bounds,
                self.tile_size,
                default_image_width,
                translate,
            ),
        }
    }

    /// Drop cached level images, release every registered tile, and let the decoder free its caches.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let released = state.registry.len();
        state.levels.clear();
        state.registry.reset();
        self.decoder.release();
        if let Some(stats) = &self.stats {
            stats.record_reset();
        }
        info!(target: "mosaic::source", released, "mosaic source reset");
    }

    fn build_locked(&self, state: &mut SourceState, level: u32) -> Result<MosaicImage> {
        let started = Instant::now();
        let placements = self.placements(level)?;
        let tiles = synthesize(
            &self.decoder,
            &self.context,
            &placements,
            &mut state.registry,
            self.parallel,
            self.stats.as_deref(),
        )?;
        let expected = self.model.level_dimensions(level);
        let image = compose(level, expected, &tiles, &state.registry, &self.options)?;

        if let Some(stats) = &self.stats {
            stats.record_build(started.elapsed());
            stats.update_registry(state.registry.len(), state.registry.bytes_used());
        }
        debug!(
            target: "mosaic::source",
            level,
            tiles = tiles.len(),
            width = expected.width,
            height = expected.height,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built mosaic level"
        );
        Ok(image)
    }
}
