//! Server statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the server counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerStats {
    /// Connections accepted and handed to a session
    pub sessions_total: u64,

    /// Sessions currently running
    pub sessions_active: u64,

    /// Connections refused because `max_clients` was reached
    pub sessions_rejected: u64,

    /// Requests answered with a 401 body after a bad digest
    pub auth_failures: u64,

    /// JPEG frames written to clients
    pub frames_sent: u64,

    /// Frame payload bytes written to clients, part headers excluded
    pub bytes_sent: u64,
}

impl ServerStats {
    /// Calculates the outgoing frame rate, summed over all clients
    pub fn calculate_fps(&self, previous: &Self, elapsed_secs: f64) -> f64 {
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        let frames_delta = self.frames_sent.saturating_sub(previous.frames_sent);
        frames_delta as f64 / elapsed_secs
    }

    /// Calculates bitrate in kbps based on delta
    pub fn calculate_bitrate_kbps(&self, previous: &Self, elapsed_secs: f64) -> f64 {
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        let bytes_delta = self.bytes_sent.saturating_sub(previous.bytes_sent);
        (bytes_delta as f64 * 8.0) / elapsed_secs / 1000.0
    }
}

/// Live counters shared by the listener and every session
#[derive(Debug, Default)]
pub(crate) struct ServerCounters {
    sessions_total: AtomicU64,
    sessions_active: AtomicU64,
    sessions_rejected: AtomicU64,
    auth_failures: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl ServerCounters {
    pub(crate) fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a new session; the returned guard marks it finished when dropped
    pub(crate) fn session_started(&self) -> ActiveSession<'_> {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
        ActiveSession { counters: self }
    }

    pub(crate) fn auth_failed(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ServerStats {
        ServerStats {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

pub(crate) struct ActiveSession<'a> {
    counters: &'a ServerCounters,
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        self.counters.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }
}
