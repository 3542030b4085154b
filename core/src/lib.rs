//! Multi-resolution mosaic over products stored as grids of fixed-size tiles.
//!
//! A [`MosaicSource`] resolves the storage tiles covering a read window at a pyramid level,
//! decodes them through an injected [`TileDecoder`], and overlays them into one level image.

#![deny(missing_debug_implementations)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod fs;
pub mod log;
pub mod pipeline;
pub mod raster;
pub mod stats;
pub mod types;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub use codec::{DecodedTile, ImageTileDecoder};
pub use config::SourceConfig;
pub use error::MosaicError;
pub use fs::TileCatalog;
pub use pipeline::{
    AffineTransform, GeoTransformProvider, MemoryTileDecoder, MosaicImage, MosaicOptions,
    MosaicSource, MultiLevelModel, TileDecoder, TileLayout, TilePlacement,
};
pub use raster::Raster;
pub use stats::{MosaicStats, StatsSnapshot};
pub use types::{CacheBudget, Dimensions, LevelOffset, PixelOffset, PixelRect};

/// Returns the version of the core crate for telemetry and debugging.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
