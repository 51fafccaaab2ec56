//! Recording of the produced frames to disk
//!
//! The recorder is one more pipeline consumer. It runs on its own thread
//! and, like a streaming client, only gets the frames it is awake for.

use crate::pipeline::FramePipeline;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for recorded frames
pub trait FrameSink: Send {
    fn write_frame(&mut self, jpeg: &[u8], frame_index: u64) -> Result<(), RecordError>;

    /// Flushes whatever is buffered
    fn finish(&mut self) -> Result<(), RecordError>;
}

/// Raw MJPEG file: the JPEG frames concatenated back to back
#[derive(Debug)]
pub struct MjpegFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
}

impl MjpegFileSink {
    /// Creates or truncates `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| RecordError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            frames: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    fn io_error(&self, source: std::io::Error) -> RecordError {
        RecordError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl FrameSink for MjpegFileSink {
    fn write_frame(&mut self, jpeg: &[u8], _frame_index: u64) -> Result<(), RecordError> {
        self.writer
            .write_all(jpeg)
            .map_err(|e| self.io_error(e))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        self.writer.flush().map_err(|e| self.io_error(e))
    }
}

/// Handle to the recording thread
pub struct Recorder {
    handle: JoinHandle<Result<u64, RecordError>>,
}

impl Recorder {
    /// Starts consuming frames from `pipeline` into `sink` on a new thread.
    ///
    /// `runtime` drives the pipeline waits; the thread stops when the
    /// pipeline does or when the sink fails.
    pub fn spawn<S>(
        mut sink: S,
        pipeline: Arc<FramePipeline>,
        runtime: Handle,
    ) -> std::io::Result<Self>
    where
        S: FrameSink + 'static,
    {
        let handle = thread::Builder::new()
            .name("frame-recorder".into())
            .spawn(move || {
                let mut written = 0u64;

                while let Some(frame) = runtime.block_on(pipeline.await_frame()) {
                    if let Err(e) = sink.write_frame(&frame.data, frame.sequence) {
                        error!(error = %e, "Recording failed");
                        return Err(e);
                    }
                    written += 1;
                    debug!(sequence = frame.sequence, "Frame recorded");
                }

                sink.finish()?;
                info!(frames = written, "Recording finished");
                Ok(written)
            })?;

        Ok(Self { handle })
    }

    /// Waits for the recording thread; returns the number of frames written
    pub fn join(self) -> Result<u64, RecordError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_file_sink_concatenates_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mjpeg");

        let mut sink = MjpegFileSink::create(&path).unwrap();
        sink.write_frame(&[0xFF, 0xD8, 1], 1).unwrap();
        sink.write_frame(&[0xFF, 0xD8, 2], 2).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.frames_written(), 2);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 1, 0xFF, 0xD8, 2]);
    }

    #[test]
    fn test_create_in_missing_directory() {
        let result = MjpegFileSink::create("/nonexistent/dir/out.mjpeg");
        assert!(matches!(result, Err(RecordError::Io { .. })));
    }

    #[derive(Clone, Default)]
    struct MemorySink {
        frames: Arc<parking_lot::Mutex<Vec<(u64, Vec<u8>)>>>,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, jpeg: &[u8], frame_index: u64) -> Result<(), RecordError> {
            self.frames.lock().push((frame_index, jpeg.to_vec()));
            Ok(())
        }

        fn finish(&mut self) -> Result<(), RecordError> {
            Ok(())
        }
    }

    #[test]
    fn test_recorder_stops_with_pipeline() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let pipeline = Arc::new(FramePipeline::new(1, 16));
        let sink = MemorySink::default();

        let recorder =
            Recorder::spawn(sink.clone(), Arc::clone(&pipeline), runtime.handle().clone()).unwrap();

        while sink.frames.lock().len() < 3 {
            pipeline.publish(b"jpeg");
            thread::sleep(Duration::from_millis(5));
        }
        pipeline.shutdown();

        let written = recorder.join().unwrap();
        let frames = sink.frames.lock();
        assert_eq!(written as usize, frames.len());
        assert!(frames.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }
}
