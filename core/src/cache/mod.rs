//! In-memory caching of decoded storage tiles.

pub mod memory;

pub use memory::{MemoryCache, TileKey};

pub type Result<T> = crate::Result<T>;
