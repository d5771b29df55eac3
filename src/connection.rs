//! One live socket to one job server.
//!
//! A [`Connection`] owns the TCP stream, the read-side [`PacketBuffer`],
//! and the pending-handle queue: the FIFO of tasks that have been submitted
//! on this socket but not yet acknowledged with a `job_created` handle.
//! The server acknowledges creations in submission order per connection, so
//! queue order is the only correlation between a submission and its handle.
//!
//! Reads are readiness-driven: [`Connection::try_read`] drains whatever the
//! socket has without blocking and yields at most one decoded packet per
//! call; [`Connection::readable`] is the future the pool races when waiting
//! for any server to have data.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::{GearmanError, Result};
use crate::protocol::{build_request, Packet, PacketBuffer};

/// Default Gearman job server port.
pub const DEFAULT_PORT: u16 = 4730;

/// Host and port of one configured job server.
///
/// Purely configuration; immutable after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    host: String,
    port: u16,
}

impl ServerSpec {
    /// Parse a `"host"` or `"host:port"` string.
    ///
    /// # Errors
    ///
    /// Empty input, an empty host, or a non-numeric port are configuration
    /// errors; they abort pool construction rather than being skipped.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(GearmanError::Config("empty server address".to_string()));
        }

        let (host, port) = match raw.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    GearmanError::Config(format!("invalid port in {:?}", raw))
                })?;
                (host, port)
            }
            None => (raw, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(GearmanError::Config(format!("empty host in {:?}", raw)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// The `host:port` address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One live connection to a job server.
pub struct Connection {
    stream: TcpStream,
    peer: String,
    buffer: PacketBuffer,
    /// Packets decoded but not yet handed to the caller.
    decoded: VecDeque<Packet>,
    /// Set positions of tasks sent on this socket, awaiting `job_created`.
    pending: VecDeque<usize>,
}

impl Connection {
    /// Attempt a bounded-time connection to the given server.
    ///
    /// # Errors
    ///
    /// [`GearmanError::ConnectTimeout`] if the timeout elapses first,
    /// [`GearmanError::Io`] if the connect itself fails.
    pub async fn connect(spec: &ServerSpec, timeout: Duration) -> Result<Self> {
        let addr = spec.addr();
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| GearmanError::ConnectTimeout(addr.clone()))??;
        stream.set_nodelay(true)?;

        tracing::debug!("connected to job server {}", addr);
        Ok(Self {
            stream,
            peer: addr,
            buffer: PacketBuffer::new(),
            decoded: VecDeque::new(),
            pending: VecDeque::new(),
        })
    }

    /// Connection identity: the peer `host:port` string.
    #[inline]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Encode and send one request packet.
    pub async fn send(&mut self, command: &str, fields: &[&[u8]]) -> Result<()> {
        let bytes = build_request(command, fields)?;
        self.stream.write_all(&bytes).await?;
        Ok(())
    }

    /// Wait until the socket may have data to read.
    pub async fn readable(&self) -> io::Result<()> {
        self.stream.readable().await
    }

    /// Drain available bytes and return the next complete packet, if any.
    ///
    /// Never blocks: reads until the socket would block, feeds the packet
    /// buffer, and pops one decoded packet. Buffered packets are delivered
    /// before a close is reported.
    pub fn try_read(&mut self) -> Result<Option<Packet>> {
        let mut chunk = [0u8; 8 * 1024];
        let mut closed = false;

        loop {
            match self.stream.try_read(&mut chunk) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => {
                    let packets = self.buffer.push(&chunk[..n])?;
                    self.decoded.extend(packets);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(packet) = self.decoded.pop_front() {
            return Ok(Some(packet));
        }
        if closed {
            return Err(GearmanError::ConnectionClosed);
        }
        Ok(None)
    }

    /// Read one packet, waiting up to `timeout` for the socket to become
    /// readable. Returns `None` if the timeout elapses or the data that
    /// arrived does not yet complete a packet.
    pub async fn read_packet(&mut self, timeout: Duration) -> Result<Option<Packet>> {
        if let Some(packet) = self.decoded.pop_front() {
            return Ok(Some(packet));
        }
        match tokio::time::timeout(timeout, self.stream.readable()).await {
            Err(_) => Ok(None),
            Ok(ready) => {
                ready?;
                self.try_read()
            }
        }
    }

    /// Round-trip an `echo_req` and return the echoed text.
    ///
    /// Unrelated packets that arrive first are set aside and re-queued for
    /// the normal read path once the echo comes back. Each read waits up to
    /// `timeout`.
    pub async fn echo(&mut self, text: &[u8], timeout: Duration) -> Result<Bytes> {
        self.send("echo_req", &[text]).await?;

        let mut skipped = Vec::new();
        let result = loop {
            match self.read_packet(timeout).await {
                Ok(Some(packet)) if packet.name() == "echo_res" => {
                    break Ok(packet.field("text").cloned().unwrap_or_default());
                }
                Ok(Some(packet)) => skipped.push(packet),
                Ok(None) => break Err(GearmanError::Deadline("echo_req".to_string())),
                Err(e) => break Err(e),
            }
        };
        for packet in skipped.into_iter().rev() {
            self.decoded.push_front(packet);
        }
        result
    }

    /// Whether a decoded packet is already queued for delivery.
    ///
    /// Draining the socket moves bytes out of the kernel buffer, so a
    /// readiness wait would not wake for them; the run loop checks this
    /// before polling.
    #[inline]
    pub fn has_buffered(&self) -> bool {
        !self.decoded.is_empty()
    }

    /// Append a task (by its set position) to the pending-handle queue.
    #[inline]
    pub fn push_pending(&mut self, task_index: usize) {
        self.pending.push_back(task_index);
    }

    /// Remove and return the oldest pending-handle entry.
    #[inline]
    pub fn pop_pending(&mut self) -> Option<usize> {
        self.pending.pop_front()
    }

    /// Number of submissions still awaiting acknowledgement.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
