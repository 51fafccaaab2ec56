//! MJPEG-over-HTTP server
//!
//! Accepts TCP connections and runs one [`ClientSession`](session) task per
//! connection. Sessions are supervised: on shutdown the listener stops
//! accepting, gives running sessions a grace period to finish and aborts
//! whatever is left.

mod session;
mod stats;

pub use session::{AuthState, SessionPhase};
pub use stats::ServerStats;

use crate::http::{DigestAuthenticator, READ_TIMEOUT};
use crate::pipeline::FramePipeline;
use session::ClientSession;
use stats::ServerCounters;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const LISTEN_BACKLOG: u32 = 10;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("unable to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Server settings, fixed once the server is built
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub username: String,
    /// Digest authentication is required iff a password is set
    pub password: Option<String>,
    /// Concurrent session limit, 0 for unlimited
    pub max_clients: usize,
    pub read_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            username: "uvc_user".to_string(),
            password: None,
            max_clients: 0,
            read_timeout: READ_TIMEOUT,
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    pub fn authenticator(&self) -> Option<DigestAuthenticator> {
        self.password
            .as_ref()
            .map(|password| DigestAuthenticator::new(self.username.clone(), password.clone()))
    }
}

pub struct MjpegServer {
    config: ServerConfig,
    pipeline: Arc<FramePipeline>,
    authenticator: Option<Arc<DigestAuthenticator>>,
    counters: Arc<ServerCounters>,
    next_session_id: AtomicU64,
    client_semaphore: Option<Arc<Semaphore>>,
}

impl MjpegServer {
    pub fn new(config: ServerConfig, pipeline: Arc<FramePipeline>) -> Self {
        let client_semaphore = if config.max_clients > 0 {
            Some(Arc::new(Semaphore::new(config.max_clients)))
        } else {
            None
        };

        Self {
            authenticator: config.authenticator().map(Arc::new),
            config,
            pipeline,
            counters: Arc::new(ServerCounters::default()),
            next_session_id: AtomicU64::new(1),
            client_semaphore,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stats(&self) -> ServerStats {
        self.counters.snapshot()
    }

    /// Opens the listening socket with address reuse enabled
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.bind_addr;
        let bind_error = |source| ServerError::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;

        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        socket.listen(LISTEN_BACKLOG).map_err(bind_error)
    }

    /// Binds and serves until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind()?;
        self.serve(listener, shutdown).await
    }

    /// Accepts connections on `listener` until `shutdown` resolves, then
    /// drains the running sessions.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(
            addr = %listener.local_addr()?,
            auth = self.authenticator.is_some(),
            "MJPEG server listening"
        );

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => self.handle_connection(&mut sessions, socket, peer),
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!(error = %e, "Session task panicked");
                        }
                    }
                }
            }
        }

        drop(listener);
        self.drain(sessions).await;
        Ok(())
    }

    fn handle_connection(&self, sessions: &mut JoinSet<()>, socket: TcpStream, peer: SocketAddr) {
        let permit = match &self.client_semaphore {
            Some(semaphore) => match Arc::clone(semaphore).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(peer = %peer, "Connection rejected: client limit reached");
                    self.counters.session_rejected();
                    return;
                }
            },
            None => None,
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        debug!(session_id, peer = %peer, "New connection");

        let counters = Arc::clone(&self.counters);
        let session = ClientSession::new(
            session_id,
            socket,
            peer,
            Arc::clone(&self.pipeline),
            self.authenticator.clone(),
            self.config.read_timeout,
            Arc::clone(&counters),
        );

        sessions.spawn(async move {
            let _permit = permit;
            let _active = counters.session_started();

            if let Err(e) = session.run().await {
                debug!(session_id, error = %e, "Connection error");
            }

            debug!(session_id, "Connection closed");
        });
    }

    async fn drain(&self, mut sessions: JoinSet<()>) {
        if sessions.is_empty() {
            return;
        }

        debug!(sessions = sessions.len(), "Waiting for sessions to finish");
        let finished = tokio::time::timeout(self.config.shutdown_grace, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            warn!(sessions = sessions.len(), "Aborting sessions still running");
            sessions.shutdown().await;
        }
    }
}

impl std::fmt::Debug for MjpegServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MjpegServer")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
