//! Video4Linux2 camera capture via memory-mapped streaming

use super::{CaptureError, FrameSource, PixelFormat, RawFrame};
use tracing::{info, warn};
use v4l::{
    buffer::Type,
    io::{mmap::Stream as MmapStream, traits::CaptureStream},
    video::{capture::Parameters, Capture},
    Device, Format, FourCC,
};

const STREAM_BUFFERS: u32 = 4;

pub struct V4lSource {
    stream: MmapStream<'static>,
    width: u32,
    height: u32,
    format: PixelFormat,
    max_size: usize,
}

impl V4lSource {
    /// Opens `path` and negotiates the requested size, format and rate.
    ///
    /// The driver may adjust the size; the negotiated values are what
    /// every frame reports.
    pub fn new(
        path: &str,
        width: u32,
        height: u32,
        format: PixelFormat,
        fps: u32,
    ) -> Result<Self, CaptureError> {
        let device = Device::with_path(path)
            .map_err(|e| CaptureError::Device(format!("{}: {}", path, e)))?;

        let requested = Format::new(width, height, FourCC::new(&format.fourcc()));
        let actual = device.set_format(&requested)?;

        if actual.fourcc.repr != format.fourcc() {
            return Err(CaptureError::Device(format!(
                "{} does not support {} (driver chose {})",
                path, format, actual.fourcc
            )));
        }
        if actual.width != width || actual.height != height {
            warn!(
                "{} adjusted frame size to {}x{} (requested {}x{})",
                path, actual.width, actual.height, width, height
            );
        }

        if let Err(e) = device.set_params(&Parameters::with_fps(fps)) {
            warn!("{} rejected frame rate {}: {}", path, fps, e);
        }

        info!("Camera format set for {}: {}", path, actual);

        let max_size = if actual.size > 0 {
            actual.size as usize
        } else {
            format.frame_size(actual.width, actual.height)
        };

        // MmapStream borrows the device for its whole life
        let device: &'static Device = Box::leak(Box::new(device));
        let stream = MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)?;

        Ok(Self {
            stream,
            width: actual.width,
            height: actual.height,
            format,
            max_size,
        })
    }
}

impl FrameSource for V4lSource {
    fn grab_frame(&mut self) -> Result<RawFrame<'_>, CaptureError> {
        let (width, height, format) = (self.width, self.height, self.format);
        let (buf, meta) = self.stream.next()?;

        let used = (meta.bytesused as usize).min(buf.len());
        if used == 0 {
            return Err(CaptureError::InvalidFrame("driver returned an empty buffer".into()));
        }

        Ok(RawFrame {
            data: &buf[..used],
            width,
            height,
            format,
        })
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn max_frame_size(&self) -> usize {
        self.max_size
    }
}
