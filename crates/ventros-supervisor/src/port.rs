//! Ephemeral port allocation by bounded random probing.

use std::future::Future;
use std::net::Ipv4Addr;

use rand::Rng;
use tracing::debug;

use crate::error::PortError;

/// Attempts made by [`PortAllocator::allocate`] before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Inclusive port range to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// A range containing exactly one port.
    pub fn single(port: u16) -> Self {
        Self::new(port, port)
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }
}

impl Default for PortRange {
    /// The IANA dynamic/private range as used by Linux.
    fn default() -> Self {
        Self {
            start: 32768,
            end: 60999,
        }
    }
}

/// Answers whether a loopback port is currently taken.
pub trait PortProbe: Send + Sync + 'static {
    fn is_in_use(&self, port: u16) -> impl Future<Output = bool> + Send;
}

/// Probes by trying to bind the port on 127.0.0.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackProbe;

impl PortProbe for LoopbackProbe {
    async fn is_in_use(&self, port: u16) -> bool {
        tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .is_err()
    }
}

/// Finds a free port with at most `max_attempts` random draws.
///
/// Every call is independent; previously drawn ports are not remembered.
/// A nearly exhausted range can make allocation fail even though free
/// ports remain.
#[derive(Debug, Clone)]
pub struct PortAllocator<P = LoopbackProbe> {
    range: PortRange,
    max_attempts: usize,
    probe: P,
}

impl PortAllocator<LoopbackProbe> {
    pub fn new(range: PortRange, max_attempts: usize) -> Self {
        Self::with_probe(range, max_attempts, LoopbackProbe)
    }
}

impl Default for PortAllocator<LoopbackProbe> {
    fn default() -> Self {
        Self::new(PortRange::default(), DEFAULT_MAX_ATTEMPTS)
    }
}

impl<P: PortProbe> PortAllocator<P> {
    pub fn with_probe(range: PortRange, max_attempts: usize, probe: P) -> Self {
        Self {
            range,
            max_attempts,
            probe,
        }
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    pub async fn allocate(&self) -> Result<u16, PortError> {
        for attempt in 1..=self.max_attempts {
            let port = rand::rng().random_range(self.range.start..=self.range.end);
            if !self.probe.is_in_use(port).await {
                return Ok(port);
            }
            debug!("Port {port} in use (attempt {attempt}/{})", self.max_attempts);
        }

        Err(PortError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}
