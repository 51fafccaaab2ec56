//! Per-connection request handling
//!
//! A session reads one request, answers it and, for the two frame routes,
//! writes frames from the pipeline until the client goes away or the
//! pipeline stops. There is no keep-alive: every path ends with the
//! connection closed.

use super::stats::ServerCounters;
use crate::codec::has_start_marker;
use crate::http::response::{self, SNAPSHOT_HEADER, STREAM_HEADER, STREAM_PART_HEADER};
use crate::http::{DigestAuthenticator, HttpError, HttpRequest, HttpRequestReader, RequestKind};
use crate::pipeline::FramePipeline;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, trace, warn};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    ParsingRequest,
    Classified,
    Authorizing,
    Responding,
    Streaming,
    Closed,
}

/// Authentication requirement for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Server has no password
    NotRequired,
    /// Password set, client sent no `Authorization`
    Pending,
    /// Password set, client sent an `Authorization` to verify
    Check,
}

impl AuthState {
    pub fn for_request(request: &HttpRequest, auth_enabled: bool) -> Self {
        match (auth_enabled, request.authorization.is_some()) {
            (false, _) => AuthState::NotRequired,
            (true, false) => AuthState::Pending,
            (true, true) => AuthState::Check,
        }
    }
}

/// What to send once the request is understood
#[derive(Debug)]
enum Reply {
    /// Header block followed by frames
    Frames(&'static str),
    /// Complete response, then close
    Final(Cow<'static, str>),
}

pub(crate) struct ClientSession<S> {
    id: u64,
    socket: S,
    peer: SocketAddr,
    pipeline: Arc<FramePipeline>,
    authenticator: Option<Arc<DigestAuthenticator>>,
    read_timeout: Duration,
    counters: Arc<ServerCounters>,
    phase: SessionPhase,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(
        id: u64,
        socket: S,
        peer: SocketAddr,
        pipeline: Arc<FramePipeline>,
        authenticator: Option<Arc<DigestAuthenticator>>,
        read_timeout: Duration,
        counters: Arc<ServerCounters>,
    ) -> Self {
        Self {
            id,
            socket,
            peer,
            pipeline,
            authenticator,
            read_timeout,
            counters,
            phase: SessionPhase::ParsingRequest,
        }
    }

    /// Runs the session to completion and closes the connection.
    ///
    /// An unreadable request closes the connection without a response.
    pub(crate) async fn run(mut self) -> Result<(), HttpError> {
        let result = self.handle().await;
        self.close().await;
        result
    }

    async fn handle(&mut self) -> Result<(), HttpError> {
        let request = {
            let mut reader = HttpRequestReader::new(BufReader::new(&mut self.socket))
                .with_timeout(self.read_timeout);
            reader.parse_request().await?
        };

        let kind = request.kind();
        self.enter(SessionPhase::Classified);
        info!(
            session_id = self.id,
            peer = %self.peer,
            method = request.method.as_deref().unwrap_or("-"),
            uri = request.uri.as_deref().unwrap_or("-"),
            "Request"
        );

        self.enter(SessionPhase::Authorizing);
        let reply = match self.authorize(&request) {
            Some(rejection) => rejection,
            None => self.reply_for(kind, &request),
        };

        self.enter(SessionPhase::Responding);
        match reply {
            Reply::Final(body) => {
                self.socket.write_all(body.as_bytes()).await?;
                Ok(())
            }
            Reply::Frames(header) => {
                self.socket.write_all(header.as_bytes()).await?;
                self.enter(SessionPhase::Streaming);
                self.stream_frames(kind).await
            }
        }
    }

    /// Returns the response that ends the session when authentication fails
    fn authorize(&self, request: &HttpRequest) -> Option<Reply> {
        let auth_state = AuthState::for_request(request, self.authenticator.is_some());

        match (auth_state, self.authenticator.as_deref()) {
            (AuthState::Pending, Some(authenticator)) => {
                debug!(session_id = self.id, "Sending digest challenge");
                Some(Reply::Final(Cow::Owned(response::auth_challenge(
                    authenticator.challenge(),
                ))))
            }
            (AuthState::Check, Some(authenticator)) if !authenticator.verify(request) => {
                warn!(session_id = self.id, peer = %self.peer, "Invalid credentials");
                self.counters.auth_failed();
                Some(Reply::Final(Cow::Owned(response::unauthorized())))
            }
            _ => None,
        }
    }

    fn reply_for(&self, kind: RequestKind, request: &HttpRequest) -> Reply {
        match kind {
            RequestKind::Snapshot => Reply::Frames(SNAPSHOT_HEADER),
            RequestKind::Stream => Reply::Frames(STREAM_HEADER),
            RequestKind::Invalid => Reply::Final(Cow::Owned(response::bad_request())),
            RequestKind::NotFound => Reply::Final(Cow::Owned(response::not_found(
                request.uri.as_deref().unwrap_or(""),
            ))),
        }
    }

    /// Writes one frame for a snapshot, or frames until failure for a stream
    async fn stream_frames(&mut self, kind: RequestKind) -> Result<(), HttpError> {
        while let Some(frame) = self.pipeline.await_frame().await {
            if kind == RequestKind::Stream {
                self.socket.write_all(STREAM_PART_HEADER.as_bytes()).await?;
            }

            if !has_start_marker(&frame.data) {
                warn!(
                    session_id = self.id,
                    sequence = frame.sequence,
                    "Frame does not start with a JPEG marker"
                );
            }

            self.socket.write_all(&frame.data).await?;
            self.counters.frame_sent(frame.data.len());
            trace!(session_id = self.id, sequence = frame.sequence, "Frame sent");

            if kind != RequestKind::Stream {
                break;
            }
        }

        Ok(())
    }

    async fn close(&mut self) {
        self.enter(SessionPhase::Closed);
        if let Err(e) = self.socket.shutdown().await {
            trace!(session_id = self.id, error = %e, "Socket shutdown failed");
        }
    }

    fn enter(&mut self, phase: SessionPhase) {
        trace!(session_id = self.id, from = ?self.phase, to = ?phase, "Session phase");
        self.phase = phase;
    }
}
