//! Imaging Module
//!
//! Band splitting of scanned fichas and re-encoding for storage.
//!
//! Decoding and encoding are CPU bound; the async helpers here move that
//! work onto tokio's blocking pool so batch loops keep their await points.

mod encode;
mod split;

pub use encode::{encode_jpeg, StorageEncoding};
pub use split::{band_geometry, split_image, split_into_bands, Band, BandGeometry, BAND_COUNT};

#[cfg(test)]
pub(crate) use split::tests as split_tests;

use axum::body::Bytes;

use crate::error::FichaError;

/// Split encoded image bytes into bands on the blocking pool
pub async fn split_in_background(data: Bytes, quality: u8) -> Result<Vec<Band>, FichaError> {
    tokio::task::spawn_blocking(move || split_into_bands(&data, quality))
        .await
        .map_err(|e| FichaError::Decode(format!("Split task failed: {}", e)))?
}

/// Re-encode a band for storage on the blocking pool
pub async fn reencode_in_background(
    data: Bytes,
    encoding: StorageEncoding,
) -> Result<Vec<u8>, FichaError> {
    tokio::task::spawn_blocking(move || encoding.reencode(&data))
        .await
        .map_err(|e| FichaError::Encode(format!("Encode task failed: {}", e)))?
}
