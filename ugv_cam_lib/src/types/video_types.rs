use image::{codecs::jpeg::JpegEncoder, ImageFormat, ImageResult, RgbImage};
use std::sync::Arc;

/// JPEG start-of-image marker
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Decoded camera frame.
///
/// Freshness is positional: `frame_id` is the arrival sequence number within
/// one frame source, the image carries no capture timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub frame_id: u64,
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(frame_id: u64, image: RgbImage) -> Self {
        Self {
            frame_id,
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Re-encode for transport (state snapshots, session logs)
    pub fn encode_jpeg(&self, quality: u8) -> ImageResult<Vec<u8>> {
        encode_jpeg(&self.image, quality)
    }
}

/// Decode one complete JPEG image to RGB8
pub fn decode_jpeg(data: &[u8]) -> ImageResult<RgbImage> {
    let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
    Ok(image.to_rgb8())
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut jpeg_data = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_data, quality.clamp(1, 100));
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(jpeg_data)
}
