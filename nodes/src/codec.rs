//! Conversion between the host's pixel buffers and compressed image bytes.

use banana_core::{BananaError, BananaResult};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// Side length of the blank frame returned when a node fails
pub const PLACEHOLDER_SIZE: u32 = 64;

const CHANNELS: usize = 3;

/// A batch of RGB frames, `batch × height × width × 3`, samples in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    batch: usize,
    height: u32,
    width: u32,
    data: Vec<f32>,
}

impl PixelBuffer {
    pub fn new(batch: usize, height: u32, width: u32, data: Vec<f32>) -> BananaResult<Self> {
        let expected = batch * height as usize * width as usize * CHANNELS;
        if data.len() != expected {
            return Err(BananaError::ValidationError(format!(
                "Pixel buffer of {}x{}x{}x3 needs {} samples, got {}",
                batch,
                height,
                width,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            batch,
            height,
            width,
            data,
        })
    }

    pub fn zeros(batch: usize, height: u32, width: u32) -> Self {
        Self {
            batch,
            height,
            width,
            data: vec![0.0; batch * height as usize * width as usize * CHANNELS],
        }
    }

    /// The blank 64×64 frame nodes emit on failure
    pub fn placeholder() -> Self {
        Self::zeros(1, PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn frame_len(&self) -> usize {
        self.height as usize * self.width as usize * CHANNELS
    }

    /// Samples of one frame of the batch
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        if index >= self.batch {
            return None;
        }
        let len = self.frame_len();
        Some(&self.data[index * len..(index + 1) * len])
    }

    /// Stacks buffers along the batch axis; all frames must share dimensions
    pub fn concat(buffers: Vec<PixelBuffer>) -> BananaResult<Self> {
        let mut iter = buffers.into_iter();
        let mut combined = iter
            .next()
            .ok_or_else(|| BananaError::UpstreamError("No images were generated.".to_string()))?;

        for next in iter {
            if next.height != combined.height || next.width != combined.width {
                return Err(BananaError::UpstreamError(format!(
                    "Generated images differ in size: {}x{} vs {}x{}",
                    combined.width, combined.height, next.width, next.height
                )));
            }
            combined.batch += next.batch;
            combined.data.extend(next.data);
        }

        Ok(combined)
    }
}

/// Bidirectional conversion between pixel buffers and encoded images
pub trait ImageCodec: Send + Sync {
    /// Decodes any supported format into a single-frame buffer
    fn decode(&self, bytes: &[u8]) -> BananaResult<PixelBuffer>;

    /// Encodes the first frame as PNG
    fn encode(&self, pixels: &PixelBuffer) -> BananaResult<Vec<u8>>;
}

/// PNG output, PNG/JPEG/WebP input
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl PngCodec {
    pub const MIME_TYPE: &'static str = "image/png";
}

impl ImageCodec for PngCodec {
    fn decode(&self, bytes: &[u8]) -> BananaResult<PixelBuffer> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| BananaError::DecodeError(format!("Failed to decode image: {}", e)))?
            .to_rgb8();

        let (width, height) = image.dimensions();
        let data = image
            .into_raw()
            .into_iter()
            .map(|sample| sample as f32 / 255.0)
            .collect();

        PixelBuffer::new(1, height, width, data)
    }

    fn encode(&self, pixels: &PixelBuffer) -> BananaResult<Vec<u8>> {
        let frame = pixels
            .frame(0)
            .ok_or_else(|| BananaError::ValidationError("Pixel buffer is empty".to_string()))?;

        let raw: Vec<u8> = frame
            .iter()
            .map(|sample| (sample.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        let image = RgbImage::from_raw(pixels.width, pixels.height, raw).ok_or_else(|| {
            BananaError::ValidationError("Pixel buffer does not match its dimensions".to_string())
        })?;

        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| BananaError::DecodeError(format!("Failed to encode PNG: {}", e)))?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.push(x as f32 / 255.0);
                data.push(y as f32 / 255.0);
                data.push(1.0);
            }
        }
        PixelBuffer::new(1, height, width, data).unwrap()
    }

    #[test]
    fn test_placeholder_shape() {
        let blank = PixelBuffer::placeholder();
        assert_eq!((blank.batch(), blank.height(), blank.width()), (1, 64, 64));
        assert!(blank.data().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_png_encode_then_decode_keeps_pixels() {
        let codec = PngCodec;
        let original = gradient(4, 3);

        let png = codec.encode(&original).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");

        let decoded = codec.decode(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            PngCodec.decode(b"definitely not an image"),
            Err(BananaError::DecodeError(_))
        ));
    }

    #[test]
    fn test_wrong_sample_count() {
        assert!(PixelBuffer::new(1, 2, 2, vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_concat() {
        let stacked = PixelBuffer::concat(vec![gradient(2, 2), gradient(2, 2)]).unwrap();
        assert_eq!(stacked.batch(), 2);
        assert_eq!(stacked.frame(1).unwrap(), gradient(2, 2).data());
        assert!(stacked.frame(2).is_none());

        assert!(PixelBuffer::concat(vec![gradient(2, 2), gradient(3, 2)]).is_err());
        assert!(PixelBuffer::concat(Vec::new()).is_err());
    }
}
