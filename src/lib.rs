//! MJPEG streaming over plain HTTP
//!
//! One producer thread grabs frames from a capture source, compresses them
//! to JPEG and hands them to a small ring of pre-allocated frame slots.
//! Any number of HTTP clients read from that ring, either as a single
//! snapshot or as a `multipart/x-mixed-replace` stream:
//! - `GET /snapshot.jpeg` returns one JPEG
//! - `GET /stream.mjpeg` pushes frames until the client disconnects
//! - optional HTTP Digest authentication
//! - optional recording of the frame stream to a file
//!
//! # Example
//!
//! ```no_run
//! use rust_mjpeg_http::pipeline::FramePipeline;
//! use rust_mjpeg_http::server::{MjpegServer, ServerConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), rust_mjpeg_http::server::ServerError> {
//! let pipeline = Arc::new(FramePipeline::new(3, 640 * 480 * 3));
//! let server = MjpegServer::new(ServerConfig::default(), Arc::clone(&pipeline));
//! // ... start a FrameProducer feeding `pipeline`
//! server.run_until(pipeline.stopped()).await
//! # }
//! ```

pub mod capture;
pub mod codec;
pub mod config;
pub mod http;
pub mod pipeline;
pub mod recorder;
pub mod server;

// Re-exports for convenience
pub use capture::{CaptureError, FrameSource, JpegDirectorySource, PixelFormat, TestPatternSource};
pub use codec::{ImageJpegCodec, JpegCodec};
pub use pipeline::{Frame, FramePipeline, FrameProducer, PipelineStats};
pub use recorder::{FrameSink, MjpegFileSink, Recorder};
pub use server::{MjpegServer, ServerConfig, ServerStats};
