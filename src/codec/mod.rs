//! JPEG compression of captured frames
//!
//! Compressed capture formats (MJPG/JPEG) pass through untouched; raw
//! formats are converted to RGB and encoded with the `image` crate at the
//! configured quality.

mod convert;
pub mod jpeg;

pub use convert::{rggb_to_rgb, yuyv_to_rgb};
pub use jpeg::has_start_marker;

use crate::capture::{PixelFormat, RawFrame};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("frame buffer too small: expected {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("empty frame")]
    EmptyFrame,
}

/// Turns a raw capture frame into JPEG bytes
pub trait JpegCodec: Send {
    /// Writes the JPEG encoding of `frame` into `out`, replacing its
    /// contents, and returns the encoded length.
    fn compress(
        &mut self,
        frame: &RawFrame<'_>,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<usize, CodecError>;
}

/// `image`-backed codec with a reusable RGB scratch buffer
#[derive(Debug, Default)]
pub struct ImageJpegCodec {
    rgb: Vec<u8>,
}

impl ImageJpegCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JpegCodec for ImageJpegCodec {
    fn compress(
        &mut self,
        frame: &RawFrame<'_>,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<usize, CodecError> {
        if frame.data.is_empty() {
            return Err(CodecError::EmptyFrame);
        }

        out.clear();

        match frame.format {
            PixelFormat::Mjpeg | PixelFormat::Jpeg => out.extend_from_slice(frame.data),
            PixelFormat::Yuyv => {
                yuyv_to_rgb(frame.data, frame.width, frame.height, &mut self.rgb)?;
                encode_rgb(&self.rgb, frame.width, frame.height, quality, out)?;
            }
            PixelFormat::Rggb => {
                rggb_to_rgb(frame.data, frame.width, frame.height, &mut self.rgb)?;
                encode_rgb(&self.rgb, frame.width, frame.height, quality, out)?;
            }
            PixelFormat::Rgb24 => {
                let expected = PixelFormat::Rgb24.frame_size(frame.width, frame.height);
                convert::ensure_len(frame.data, expected)?;
                encode_rgb(&frame.data[..expected], frame.width, frame.height, quality, out)?;
            }
        }

        Ok(out.len())
    }
}

/// Encodes packed RGB8 pixels as a baseline JPEG appended to `out`.
pub fn encode_rgb(
    rgb: &[u8],
    width: u32,
    height: u32,
    quality: u8,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let mut encoder = JpegEncoder::new_with_quality(out, quality.clamp(1, 100));
    encoder.encode(rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &[u8], width: u32, height: u32, format: PixelFormat) -> RawFrame<'_> {
        RawFrame {
            data,
            width,
            height,
            format,
        }
    }

    #[test]
    fn test_mjpeg_passthrough() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 0xFF, 0xD9];
        let mut codec = ImageJpegCodec::new();
        let mut out = vec![9; 100];

        let len = codec
            .compress(&frame(&jpeg, 8, 8, PixelFormat::Mjpeg), 40, &mut out)
            .unwrap();

        assert_eq!(len, jpeg.len());
        assert_eq!(out, jpeg);
    }

    #[test]
    fn test_yuyv_compress() {
        let yuyv = vec![128u8; 16 * 8 * 2];
        let mut codec = ImageJpegCodec::new();
        let mut out = Vec::new();

        let len = codec
            .compress(&frame(&yuyv, 16, 8, PixelFormat::Yuyv), 80, &mut out)
            .unwrap();

        assert_eq!(len, out.len());
        assert_eq!(&out[0..2], &[0xFF, jpeg::markers::SOI]);
        assert_eq!(&out[out.len() - 2..], &[0xFF, jpeg::markers::EOI]);
    }

    #[test]
    fn test_rggb_compress() {
        let bayer = vec![64u8; 8 * 8];
        let mut codec = ImageJpegCodec::new();
        let mut out = Vec::new();

        codec
            .compress(&frame(&bayer, 8, 8, PixelFormat::Rggb), 50, &mut out)
            .unwrap();
        assert_eq!(&out[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_rgb24_short_frame() {
        let rgb = vec![0u8; 10];
        let mut codec = ImageJpegCodec::new();
        let mut out = Vec::new();

        let result = codec.compress(&frame(&rgb, 4, 4, PixelFormat::Rgb24), 50, &mut out);
        assert!(matches!(result, Err(CodecError::BufferTooSmall { .. })));
    }

    #[test]
    fn test_empty_frame() {
        let mut codec = ImageJpegCodec::new();
        let mut out = Vec::new();
        let result = codec.compress(&frame(&[], 4, 4, PixelFormat::Mjpeg), 50, &mut out);
        assert!(matches!(result, Err(CodecError::EmptyFrame)));
    }
}
