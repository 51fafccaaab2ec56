//! Minimal HTTP/1.0 request handling for the MJPEG server
//!
//! Only what the two routes need: a line reader with a per-line timeout,
//! a request-line parser that keeps the `Authorization` header, Digest
//! authentication and the fixed response texts.

pub mod digest;
mod request;
pub mod response;

pub use digest::{DigestAuthenticator, DigestChallenge};
pub use request::{HttpRequest, HttpRequestReader, RequestKind};

use std::time::Duration;
use thiserror::Error;

/// Multipart boundary token shared by the stream header and every part
pub const BOUNDARY: &str = "arflebarfle";

/// Value of the `Server` response header
pub const SERVER_NAME: &str = "UVC Streamer";

pub const STREAM_URI: &str = "/stream.mjpeg";
pub const SNAPSHOT_URI: &str = "/snapshot.jpeg";

/// Longest request line kept, terminator included
pub const MAX_LINE_LEN: usize = 1024;

/// How long a client may take to send one request line
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no request data within {0:?}")]
    Timeout(Duration),
}
