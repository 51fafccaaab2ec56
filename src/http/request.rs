//! Request reading and classification

use super::{HttpError, MAX_LINE_LEN, READ_TIMEOUT, SNAPSHOT_URI, STREAM_URI};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The parts of a request the server acts on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Option<String>,
    pub uri: Option<String>,
    /// Raw value of the `Authorization` header
    pub authorization: Option<String>,
}

/// Route a request maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Snapshot,
    Stream,
    /// Any other URI
    NotFound,
    /// Request line without a URI
    Invalid,
}

impl RequestKind {
    /// Case-sensitive match against the two fixed routes
    pub fn classify(uri: Option<&str>) -> Self {
        match uri {
            Some(SNAPSHOT_URI) => RequestKind::Snapshot,
            Some(STREAM_URI) => RequestKind::Stream,
            Some(_) => RequestKind::NotFound,
            None => RequestKind::Invalid,
        }
    }
}

impl HttpRequest {
    pub fn kind(&self) -> RequestKind {
        RequestKind::classify(self.uri.as_deref())
    }
}

/// Line-oriented request reader over any async byte stream
#[derive(Debug)]
pub struct HttpRequestReader<R> {
    inner: R,
    timeout: Duration,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> HttpRequestReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            timeout: READ_TIMEOUT,
            max_len: MAX_LINE_LEN,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the line limit; a line is cut after `max_len - 1` bytes.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads one line, without its terminator.
    ///
    /// `\r` is dropped wherever it appears and `\n` ends the line. End of
    /// stream ends the line too, so a closed peer yields whatever was read
    /// so far, possibly nothing. A line reaching `max_len - 1` bytes is
    /// returned truncated; the rest stays in the stream.
    pub async fn read_line(&mut self) -> Result<String, HttpError> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.read_line_inner()).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout(timeout)),
        }
    }

    async fn read_line_inner(&mut self) -> Result<String, HttpError> {
        let limit = self.max_len - 1;
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];

        while line.len() < limit {
            if self.inner.read(&mut byte).await? == 0 {
                break;
            }

            match byte[0] {
                b'\r' => continue,
                b'\n' => break,
                b => line.push(b),
            }
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Reads the request line and headers up to the first empty line.
    ///
    /// Only the method, the request target and the `Authorization` value
    /// are kept. The HTTP version and any body are ignored.
    pub async fn parse_request(&mut self) -> Result<HttpRequest, HttpError> {
        let mut request = HttpRequest::default();
        let mut first = true;

        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                break;
            }

            if first {
                let mut parts = line.split_whitespace();
                request.method = parts.next().map(str::to_owned);
                request.uri = parts.next().map(str::to_owned);
                first = false;
                continue;
            }

            let Some((name, value)) = line.split_once(':') else {
                continue;
            };

            if name.eq_ignore_ascii_case("Authorization") {
                request.authorization = Some(value.trim_start_matches(' ').to_owned());
            }
        }

        Ok(request)
    }
}
