//! Band Splitter
//!
//! Cuts a scanned ficha sheet into three horizontal bands. Each band spans
//! the full width of the source; the first two are `floor(H / 3)` tall and
//! the last one takes the remainder, so the heights always sum to `H`.

use axum::body::Bytes;
use image::{DynamicImage, GenericImageView};

use super::encode::encode_jpeg;
use crate::error::FichaError;

/// Number of bands produced per sheet
pub const BAND_COUNT: usize = 3;

/// Vertical placement of one band in the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandGeometry {
    pub y: u32,
    pub height: u32,
}

/// One encoded band
#[derive(Debug, Clone)]
pub struct Band {
    /// Position from the top (0-based)
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// JPEG bytes
    pub data: Bytes,
}

/// Compute band placement for an image of the given height.
///
/// The remainder of `height / 3` goes to the bottom band, which can end up
/// one or two pixels taller than the others.
pub fn band_geometry(height: u32) -> [BandGeometry; BAND_COUNT] {
    let band = height / 3;
    [
        BandGeometry { y: 0, height: band },
        BandGeometry { y: band, height: band },
        BandGeometry {
            y: band * 2,
            height: height - band * 2,
        },
    ]
}

/// Decode `source` and split it into JPEG bands
pub fn split_into_bands(source: &[u8], quality: u8) -> Result<Vec<Band>, FichaError> {
    let img = image::load_from_memory(source).map_err(|e| FichaError::Decode(e.to_string()))?;
    split_image(&img, quality)
}

/// Split an already decoded image into JPEG bands
pub fn split_image(img: &DynamicImage, quality: u8) -> Result<Vec<Band>, FichaError> {
    let (width, height) = img.dimensions();

    if width == 0 || height < BAND_COUNT as u32 {
        return Err(FichaError::Decode(format!(
            "Image {}x{} is too small to split into {} bands",
            width, height, BAND_COUNT
        )));
    }

    let mut bands = Vec::with_capacity(BAND_COUNT);
    for (index, geometry) in band_geometry(height).iter().enumerate() {
        // crop_imm copies into a fresh buffer per band
        let band = img.crop_imm(0, geometry.y, width, geometry.height);
        let data = encode_jpeg(&band, quality)?;

        bands.push(Band {
            index,
            width,
            height: geometry.height,
            data: Bytes::from(data),
        });
    }

    tracing::debug!(width, height, "Split image into {} bands", bands.len());

    Ok(bands)
}
