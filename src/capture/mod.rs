//! Frame sources feeding the producer thread

mod directory;
mod pattern;
#[cfg(feature = "v4l2")]
mod v4l2;

pub use directory::JpegDirectorySource;
pub use pattern::TestPatternSource;
#[cfg(feature = "v4l2")]
pub use v4l2::V4lSource;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device error: {0}")]
    Device(String),

    #[error("no frames available in {0}")]
    Exhausted(PathBuf),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Motion-JPEG straight from the device
    #[serde(rename = "MJPG")]
    Mjpeg,

    /// Plain JPEG straight from the device
    #[serde(rename = "JPEG")]
    Jpeg,

    /// Packed YUV 4:2:2
    #[serde(rename = "YUYV")]
    Yuyv,

    /// 8-bit Bayer, RGGB order
    #[serde(rename = "RGGB")]
    Rggb,

    /// Packed 8-bit RGB
    #[serde(rename = "RGB24")]
    Rgb24,
}

impl PixelFormat {
    /// Whether frames in this format are already JPEG-compressed
    pub fn is_compressed(self) -> bool {
        matches!(self, PixelFormat::Mjpeg | PixelFormat::Jpeg)
    }

    /// Size in bytes of an uncompressed frame, or the worst-case JPEG size
    /// for compressed formats
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Yuyv => pixels * 2,
            PixelFormat::Rggb => pixels,
            PixelFormat::Rgb24 | PixelFormat::Mjpeg | PixelFormat::Jpeg => pixels * 3,
        }
    }

    /// V4L2 FourCC code
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Mjpeg => *b"MJPG",
            PixelFormat::Jpeg => *b"JPEG",
            PixelFormat::Yuyv => *b"YUYV",
            PixelFormat::Rggb => *b"RGGB",
            PixelFormat::Rgb24 => *b"RGB3",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Mjpeg => "MJPG",
            PixelFormat::Jpeg => "JPEG",
            PixelFormat::Yuyv => "YUYV",
            PixelFormat::Rggb => "RGGB",
            PixelFormat::Rgb24 => "RGB24",
        };
        f.write_str(name)
    }
}

/// A frame borrowed from the source's internal buffer
///
/// Valid until the next `grab_frame` call.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Blocking capture device
///
/// Called from the producer thread only. Any error is fatal to the process.
pub trait FrameSource: Send {
    /// Blocks until the next frame is available
    fn grab_frame(&mut self) -> Result<RawFrame<'_>, CaptureError>;

    /// Format of the frames this source produces
    fn format(&self) -> PixelFormat;

    /// Worst-case size of one frame in bytes, used to size the frame slots
    fn max_frame_size(&self) -> usize;
}

/// Sleeps the calling thread so frames come out at a steady rate
#[derive(Debug)]
pub(crate) struct FramePacer {
    interval: Duration,
    next: Option<Instant>,
}

impl FramePacer {
    pub(crate) fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / fps.max(1),
            next: None,
        }
    }

    /// Blocks until the next frame is due
    pub(crate) fn wait(&mut self) {
        let now = Instant::now();
        let due = self.next.unwrap_or(now);

        if due > now {
            std::thread::sleep(due - now);
        }

        // Don't try to catch up after a stall
        self.next = Some(due.max(now) + self.interval);
    }
}
