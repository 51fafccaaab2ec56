//! Capture-and-compress loop feeding the pipeline

use super::FramePipeline;
use crate::capture::{CaptureError, FrameSource};
use crate::codec::JpegCodec;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Below this rate the producer sleeps one frame interval between grabs
pub const SLOW_FPS_THRESHOLD: u32 = 5;

/// Owns the capture source and codec for the lifetime of the producer thread
pub struct FrameProducer {
    source: Box<dyn FrameSource>,
    codec: Box<dyn JpegCodec>,
    quality: u8,
    fps: u32,
    pipeline: Arc<FramePipeline>,
}

impl FrameProducer {
    pub fn new(
        source: Box<dyn FrameSource>,
        codec: Box<dyn JpegCodec>,
        quality: u8,
        fps: u32,
        pipeline: Arc<FramePipeline>,
    ) -> Self {
        Self {
            source,
            codec,
            quality,
            fps,
            pipeline,
        }
    }

    /// Runs the producer on a dedicated OS thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<Result<(), CaptureError>>> {
        thread::Builder::new()
            .name("frame-producer".into())
            .spawn(move || self.run())
    }

    /// Grabs, compresses and publishes frames until the pipeline stops.
    ///
    /// A capture error is fatal: the pipeline is shut down and the error
    /// returned. Codec errors only cost the frame that caused them.
    pub fn run(mut self) -> Result<(), CaptureError> {
        let pause = (self.fps < SLOW_FPS_THRESHOLD)
            .then(|| Duration::from_secs(1) / self.fps.max(1));

        info!(
            format = %self.source.format(),
            quality = self.quality,
            fps = self.fps,
            "Frame producer started"
        );

        while !self.pipeline.is_stopped() {
            let frame = match self.source.grab_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(error = %e, "Unable to grab frame");
                    self.pipeline.shutdown();
                    return Err(e);
                }
            };

            let codec = &mut self.codec;
            let quality = self.quality;
            match self
                .pipeline
                .produce_next(|buf| codec.compress(&frame, quality, buf))
            {
                Ok(sequence) => trace!(sequence, "Frame produced"),
                Err(e) => warn!(error = %e, "Dropping frame"),
            }

            if let Some(pause) = pause {
                thread::sleep(pause);
            }
        }

        debug!("Frame producer stopped");
        Ok(())
    }
}
