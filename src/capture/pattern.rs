//! Synthetic colour-bar source for running without a camera

use super::{CaptureError, FramePacer, FrameSource, PixelFormat, RawFrame};
use crate::codec;

const BARS: [[u8; 3]; 8] = [
    [235, 235, 235], // white
    [235, 235, 16],  // yellow
    [16, 235, 235],  // cyan
    [16, 235, 16],   // green
    [235, 16, 235],  // magenta
    [235, 16, 16],   // red
    [16, 16, 235],   // blue
    [16, 16, 16],    // black
];

/// Quality used when the pattern itself has to be JPEG-encoded
const PATTERN_JPEG_QUALITY: u8 = 90;

/// Scrolling colour bars in any supported pixel format
pub struct TestPatternSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    pacer: FramePacer,
    frame_count: u64,
    rgb: Vec<u8>,
    buffer: Vec<u8>,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32, format: PixelFormat, fps: u32) -> Self {
        Self {
            width,
            height,
            format,
            pacer: FramePacer::new(fps),
            frame_count: 0,
            rgb: Vec::with_capacity(PixelFormat::Rgb24.frame_size(width, height)),
            buffer: Vec::with_capacity(format.frame_size(width, height)),
        }
    }

    fn render_rgb(&mut self) {
        let (w, h) = (self.width as usize, self.height as usize);
        let bar_width = (w / BARS.len()).max(1);
        let shift = self.frame_count as usize * 4;

        self.rgb.clear();
        for _ in 0..h {
            for x in 0..w {
                let bar = ((x + shift) / bar_width) % BARS.len();
                self.rgb.extend_from_slice(&BARS[bar]);
            }
        }
    }

    fn rgb_to_yuyv(&mut self) {
        self.buffer.clear();
        for pair in self.rgb.chunks(6) {
            let (y0, u, v) = rgb_to_yuv(&pair[0..3]);
            let y1 = if pair.len() == 6 {
                rgb_to_yuv(&pair[3..6]).0
            } else {
                y0
            };
            self.buffer.extend_from_slice(&[y0, u, y1, v]);
        }
    }

    fn rgb_to_rggb(&mut self) {
        let w = self.width as usize;
        self.buffer.clear();
        for (i, pixel) in self.rgb.chunks_exact(3).enumerate() {
            let (x, y) = (i % w, i / w);
            let channel = match (y % 2, x % 2) {
                (0, 0) => 0,
                (1, 1) => 2,
                _ => 1,
            };
            self.buffer.push(pixel[channel]);
        }
    }
}

fn rgb_to_yuv(rgb: &[u8]) -> (u8, u8, u8) {
    let (r, g, b) = (rgb[0] as i32, rgb[1] as i32, rgb[2] as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}

impl FrameSource for TestPatternSource {
    fn grab_frame(&mut self) -> Result<RawFrame<'_>, CaptureError> {
        self.pacer.wait();
        self.render_rgb();

        match self.format {
            PixelFormat::Rgb24 => std::mem::swap(&mut self.buffer, &mut self.rgb),
            PixelFormat::Yuyv => self.rgb_to_yuyv(),
            PixelFormat::Rggb => self.rgb_to_rggb(),
            PixelFormat::Mjpeg | PixelFormat::Jpeg => {
                self.buffer.clear();
                codec::encode_rgb(
                    &self.rgb,
                    self.width,
                    self.height,
                    PATTERN_JPEG_QUALITY,
                    &mut self.buffer,
                )
                .map_err(|e| CaptureError::Device(e.to_string()))?;
            }
        }

        self.frame_count += 1;

        Ok(RawFrame {
            data: &self.buffer,
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn max_frame_size(&self) -> usize {
        self.format.frame_size(self.width, self.height)
    }
}
