//! Decoding of image-file storage tiles.

pub mod image;
pub mod resize;

pub use image::{DecodedTile, ImageTileDecoder, decode_tile};

pub type Result<T> = crate::Result<T>;
