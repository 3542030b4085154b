//! Locate storage tiles on disk: plain folders or zip archives.

pub mod catalog;
mod util;

pub use catalog::{CatalogKind, TileCatalog};
pub use util::{NameChunk, is_hidden, is_tile_file, natural_cmp_path, natural_key};

/// Shared result type for fs operations.
pub type Result<T> = crate::Result<T>;
