//! Arena owning every decoded tile produced while building mosaics.

use tracing::debug;

use crate::error::{MosaicError, Result};
use crate::raster::Raster;

/// Handle to a raster registered in a [`TileRegistry`].
///
/// Handles remember the registry generation they were issued in; they stop resolving once the
/// registry is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileHandle {
    generation: u64,
    index: usize,
}

impl TileHandle {
    /// Creation order within the registry generation.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Creation-ordered store of decoded tiles, released as a unit on [`TileRegistry::reset`].
#[derive(Debug, Default)]
pub struct TileRegistry {
    tiles: Vec<Raster>,
    generation: u64,
    bytes_used: usize,
}

impl TileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, raster: Raster) -> TileHandle {
        self.bytes_used += raster.byte_size();
        let handle = TileHandle { generation: self.generation, index: self.tiles.len() };
        self.tiles.push(raster);
        handle
    }

    pub fn get(&self, handle: TileHandle) -> Result<&Raster> {
        if handle.generation != self.generation {
            return Err(MosaicError::Consistency(format!(
                "tile handle from generation {} used after reset (current generation {})",
                handle.generation, self.generation
            )));
        }
        self.tiles.get(handle.index).ok_or_else(|| {
            MosaicError::Consistency(format!("tile handle {} is not registered", handle.index))
        })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Release every registered tile. Calling this on an empty registry does nothing.
    pub fn reset(&mut self) {
        if self.tiles.is_empty() {
            return;
        }
        debug!(
            target: "mosaic::registry",
            tiles = self.tiles.len(),
            bytes = self.bytes_used,
            "releasing registered tiles"
        );
        self.tiles.clear();
        self.tiles.shrink_to_fit();
        self.bytes_used = 0;
        self.generation = self.generation.wrapping_add(1);
    }
}
