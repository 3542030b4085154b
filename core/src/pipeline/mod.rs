//! Level geometry, tile layout, synthesis, and compositing of mosaic levels.

pub mod compose;
pub mod layout;
pub mod level;
pub mod registry;
pub mod source;
pub mod synth;

pub use compose::{DEFAULT_SOURCE_THRESHOLD, MosaicImage, MosaicOptions, compose};
pub use layout::{TileLayout, TilePlacement, resolve_decompressed, resolve_uniform};
pub use level::{AffineTransform, GeoTransformProvider, ModelBounds, MultiLevelModel, level_count, level_size};
pub use registry::{TileHandle, TileRegistry};
pub use source::MosaicSource;
pub use synth::{MemoryTileDecoder, PositionedTile, TileDecoder, synthesize};
