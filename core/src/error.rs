//! Failure taxonomy of the mosaic core.

use thiserror::Error;

/// Errors surfaced by layout resolution, tile synthesis, and compositing.
///
/// None of these are retried inside the core. Consistency errors indicate a broken invariant and
/// must be surfaced to the caller untouched.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// The caller passed arguments the core cannot work with.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Internal geometry or state invariant broken.
    #[error("consistency violation: {0}")]
    Consistency(String),

    /// The injected tile decoder could not produce data for a storage tile.
    #[error("failed to decode storage tile {storage_index} on level {level}")]
    Decode {
        storage_index: usize,
        level: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl MosaicError {
    pub fn is_fatal_consistency(&self) -> bool {
        matches!(self, MosaicError::Consistency(_))
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, MosaicError::Precondition(_))
    }
}

pub type Result<T> = std::result::Result<T, MosaicError>;
