//! Per-peer admission control
//!
//! A single mutex over a peer -> active-session map. Refusal never waits;
//! the caller surfaces it as 429. Release rides on the permit's `Drop`, so
//! the acquire/release pairing holds on every exit path.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::HeaderMap;

/// Process-wide per-peer concurrency gate.
#[derive(Debug)]
pub struct AdmissionGate {
    max_per_peer: usize,
    active: Mutex<HashMap<String, usize>>,
}

/// Snapshot of the gate for health/metrics.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionStats {
    pub active_peers: usize,
    pub active_sessions: usize,
}

impl AdmissionGate {
    pub fn new(max_per_peer: usize) -> Self {
        Self {
            max_per_peer,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_per_peer(&self) -> usize {
        self.max_per_peer
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim a slot for `peer`. Returns `None` when the peer is at its cap.
    pub fn try_acquire(self: &Arc<Self>, peer: &str) -> Option<AdmissionPermit> {
        {
            let mut table = self.table();
            let active = table.get(peer).copied().unwrap_or(0);
            if active >= self.max_per_peer {
                return None;
            }
            table.insert(peer.to_string(), active + 1);
        }
        Some(AdmissionPermit {
            gate: Arc::clone(self),
            peer: peer.to_string(),
        })
    }

    fn release(&self, peer: &str) {
        let mut table = self.table();
        if let Some(count) = table.get_mut(peer) {
            if *count > 1 {
                *count -= 1;
            } else {
                table.remove(peer);
            }
        }
    }

    pub fn stats(&self) -> AdmissionStats {
        let table = self.table();
        AdmissionStats {
            active_peers: table.len(),
            active_sessions: table.values().sum(),
        }
    }
}

/// One granted admission slot; the slot is returned when this drops.
#[derive(Debug)]
pub struct AdmissionPermit {
    gate: Arc<AdmissionGate>,
    peer: String,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.gate.release(&self.peer);
    }
}

/// Stable peer key for admission accounting: the first forwarded-for entry
/// when present (only the leftmost value; the rest of the chain is trivially
/// spoofable), otherwise the remote IP.
pub fn peer_identity(headers: &HeaderMap, remote: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|first| first.trim().to_string())
        .filter(|first| !first.is_empty())
        .unwrap_or_else(|| remote.ip().to_string())
}
