//! Image encoding helpers

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use serde::Serialize;

use crate::config::{PipelineConfig, StorageFormat};
use crate::error::FichaError;

/// Encode an image as baseline JPEG at the given quality (1-100)
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, FichaError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)))
        .map_err(|e| FichaError::Encode(format!("JPEG: {}", e)))?;
    Ok(buffer)
}

/// Format bands are re-encoded into before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum StorageEncoding {
    /// Lossy JPEG at a fixed quality
    Jpeg { quality: u8 },
    /// Lossless WebP (the `image` encoder has no lossy mode)
    Webp,
}

impl Default for StorageEncoding {
    fn default() -> Self {
        Self::Jpeg { quality: 80 }
    }
}

impl StorageEncoding {
    pub fn from_config(config: &PipelineConfig) -> Self {
        match config.storage_format {
            StorageFormat::Jpeg => Self::Jpeg {
                quality: config.storage_quality,
            },
            StorageFormat::Webp => Self::Webp,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Webp => "webp",
        }
    }

    /// Decode `source` and encode it in this format
    pub fn reencode(&self, source: &[u8]) -> Result<Vec<u8>, FichaError> {
        let img = image::load_from_memory(source).map_err(|e| FichaError::Decode(e.to_string()))?;
        self.encode(&img)
    }

    pub fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, FichaError> {
        match self {
            Self::Jpeg { quality } => encode_jpeg(img, *quality),
            Self::Webp => {
                let rgba = img.to_rgba8();
                let mut buffer = Vec::new();
                rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buffer))
                    .map_err(|e| FichaError::Encode(format!("WebP: {}", e)))?;
                Ok(buffer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 8, Rgba([10, 120, 200, 128])))
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let bytes = encode_jpeg(&sample(), 90).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_reencode_to_webp() {
        let jpeg = encode_jpeg(&sample(), 90).unwrap();
        let webp = StorageEncoding::Webp.reencode(&jpeg).unwrap();
        assert_eq!(image::guess_format(&webp).unwrap(), ImageFormat::WebP);
        assert_eq!(StorageEncoding::Webp.content_type(), "image/webp");
    }

    #[test]
    fn test_from_config() {
        let mut config = crate::config::Config::default().pipeline;
        assert_eq!(
            StorageEncoding::from_config(&config),
            StorageEncoding::Jpeg { quality: 80 }
        );

        config.storage_format = StorageFormat::Webp;
        assert_eq!(StorageEncoding::from_config(&config), StorageEncoding::Webp);
        assert_eq!(StorageEncoding::Webp.extension(), "webp");
    }

    #[test]
    fn test_reencode_garbage_fails_with_decode() {
        let result = StorageEncoding::default().reencode(b"\x00\x01");
        assert!(matches!(result, Err(FichaError::Decode(_))));
    }
}
