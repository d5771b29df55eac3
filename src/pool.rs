//! Connection pool: one connection per configured server.
//!
//! The pool opens every configured server at construction, dropping
//! unreachable ones rather than failing, and offers exactly two policies to
//! the client: uniform random selection for outbound submissions, and
//! all-connections readiness waiting for the run loop's poll step. There is
//! no health weighting, no sticky routing, and no mid-run failover.

use std::time::Duration;

use rand::Rng;

use crate::connection::{Connection, ServerSpec};
use crate::error::{GearmanError, Result};

/// Pool of live connections, one per reachable configured server.
pub struct ConnectionPool {
    connections: Vec<Connection>,
}

impl ConnectionPool {
    /// Connect to every server in the list.
    ///
    /// Unreachable servers are logged and skipped; an empty or malformed
    /// server list is a [`GearmanError::Config`], and ending up with zero
    /// live connections is [`GearmanError::NoServers`].
    pub async fn connect(servers: &[String], timeout: Duration) -> Result<Self> {
        if servers.is_empty() {
            return Err(GearmanError::Config("no servers specified".to_string()));
        }

        let mut connections = Vec::with_capacity(servers.len());
        for raw in servers {
            let spec = ServerSpec::parse(raw)?;
            match Connection::connect(&spec, timeout).await {
                Ok(conn) => connections.push(conn),
                Err(e) => {
                    tracing::warn!("dropping unreachable job server {}: {}", spec.addr(), e);
                }
            }
        }

        if connections.is_empty() {
            return Err(GearmanError::NoServers);
        }
        Ok(Self { connections })
    }

    /// Uniform random choice among live connections.
    ///
    /// The sole load-balancing policy; returns the connection's pool index
    /// so callers can come back to the same connection later.
    pub fn pick_random(&self) -> usize {
        rand::thread_rng().gen_range(0..self.connections.len())
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check whether the pool has no live connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Get a connection by pool index.
    pub fn get_mut(&mut self, index: usize) -> &mut Connection {
        &mut self.connections[index]
    }

    /// All live connections, mutably (for the read/route step).
    pub fn connections_mut(&mut self) -> &mut [Connection] {
        &mut self.connections
    }

    /// Whether any connection already holds a decoded, undelivered packet.
    pub fn any_buffered(&self) -> bool {
        self.connections.iter().any(|c| c.has_buffered())
    }

    /// Drop every connection, closing the sockets.
    pub fn close_all(&mut self) {
        self.connections.clear();
    }

    /// Wait until any connection may have data, bounded by `timeout`.
    ///
    /// The multi-socket readiness poll of the run loop. Returns `true` when
    /// at least one connection signalled readiness (or failed, so the read
    /// path can surface the error), `false` on timeout.
    pub async fn wait_readable(&self, timeout: Duration) -> bool {
        if self.connections.is_empty() {
            tokio::time::sleep(timeout).await;
            return false;
        }

        let waits: Vec<_> = self
            .connections
            .iter()
            .map(|c| Box::pin(c.readable()))
            .collect();

        tokio::time::timeout(timeout, futures::future::select_all(waits))
            .await
            .is_ok()
    }
}
